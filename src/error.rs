//! Error taxonomy shared across the crawl → chunk → embed → store pipeline.
//!
//! Variants split into two groups:
//!
//! * locally recovered — [`WebloreError::Fetch`],
//!   [`WebloreError::UnsupportedContentType`], and
//!   [`WebloreError::QualityRejected`] only ever drop a single URL from a
//!   crawl run; the crawler logs them and moves on.
//! * propagated — configuration, embedding, and storage failures abort the
//!   calling operation so a requested write is never silently lost.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, WebloreError>;

/// Errors produced by the ingestion and retrieval pipeline.
#[derive(Debug, Error)]
pub enum WebloreError {
    /// Network or HTTP-status failure while fetching one URL.
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// The response was not HTML; the URL is dropped without retry.
    #[error("unsupported content type '{content_type}' at {url}")]
    UnsupportedContentType { url: String, content_type: String },

    /// The page failed the content quality gate.
    #[error("page rejected by quality filter: {0}")]
    QualityRejected(String),

    /// Invalid parameters detected before any work began.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// An embedding batch failed; no partial results are usable.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// Vector store read or write failure.
    #[error("vector store error: {0}")]
    Store(String),

    /// The selected backend could not be constructed.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl WebloreError {
    /// Builds a [`WebloreError::Fetch`] from any displayable cause.
    pub fn fetch(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Builds a [`WebloreError::Store`] from any displayable cause.
    pub fn store(reason: impl std::fmt::Display) -> Self {
        Self::Store(reason.to_string())
    }

    /// Builds a [`WebloreError::Embedding`] from any displayable cause.
    pub fn embedding(reason: impl std::fmt::Display) -> Self {
        Self::Embedding(reason.to_string())
    }
}
