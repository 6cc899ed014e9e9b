//! Core data model for the ingestion and retrieval pipeline.
//!
//! [`Page`] and [`Chunk`] are transient artifacts that live for one
//! ingestion call; [`IndexedDocument`] is the only durable entity and is
//! append-only once written to a vector store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// A successfully fetched and quality-filtered web page.
///
/// Produced at most once per URL within a crawl run and immutable after
/// creation.
#[derive(Clone, Debug)]
pub struct Page {
    pub url: Url,
    pub title: String,
    pub content: String,
    pub crawled_at: DateTime<Utc>,
}

impl Page {
    pub fn new(url: Url, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            url,
            title: title.into(),
            content: content.into(),
            crawled_at: Utc::now(),
        }
    }
}

/// A bounded, overlapping slice of a page's cleaned text — the unit that is
/// embedded and indexed.
///
/// `chunk_index` is zero-based and strictly per source page; concurrent
/// crawls interleave pages, so it is never a run-global ordinal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Chunk {
    pub url: String,
    pub title: String,
    pub content: String,
    pub chunk_index: usize,
    pub crawled_at: DateTime<Utc>,
}

/// Metadata persisted alongside every indexed document.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DocumentMetadata {
    pub url: String,
    pub title: String,
    pub chunk_index: usize,
    pub crawled_at: DateTime<Utc>,
    pub namespace: String,
    /// Set when a backend byte cap forced the stored text to be truncated.
    #[serde(default)]
    pub truncated: bool,
}

/// A vector + text + metadata triple as stored by a backend.
///
/// `id` is derived from the document's position and a hash of its source
/// URL, which keeps ids collision-free within one ingestion run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub id: String,
    pub vector: Vec<f32>,
    pub text: String,
    pub metadata: DocumentMetadata,
}

/// One ranked retrieval result.
///
/// `similarity` is cosine similarity in `[-1, 1]`; backends normalize their
/// native scores into this convention before returning results.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchHit {
    pub text: String,
    pub metadata: DocumentMetadata,
    pub similarity: f32,
}
