//! Pluggable vector storage.
//!
//! Every backend implements [`VectorBackend`]; [`open_backend`] resolves the
//! closed [`BackendKind`] set once at construction so callers hold a
//! `Box<dyn VectorBackend>` and never branch on backend identity.
//!
//! Similarity convention: embeddings are normalized to unit length before
//! storage, so a raw inner product is cosine similarity in `[-1, 1]`. Cloud
//! backends convert their native relevance scores into the same range
//! before returning results.

pub mod chroma;
pub mod local;
pub mod pinecone;

use std::hash::{DefaultHasher, Hash, Hasher};

use async_trait::async_trait;

use crate::config::{BackendKind, StoreConfig};
use crate::error::{Result, WebloreError};
use crate::types::{Chunk, DocumentMetadata, IndexedDocument, SearchHit};

pub use chroma::ChromaStore;
pub use local::LocalVectorStore;
pub use pinecone::PineconeStore;

/// Maximum sanitized namespace length.
pub const MAX_NAMESPACE_LEN: usize = 64;

/// Uniform contract over the local and cloud vector stores.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Persists chunks with their embeddings, associated pairwise.
    ///
    /// `chunks` and `embeddings` must have equal length. Backends with a
    /// metadata byte cap truncate stored text at a word boundary and mark
    /// the truncation rather than fail the call.
    async fn store_documents(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()>;

    /// Returns at most `top_k` results ordered by descending similarity;
    /// fewer when the namespace holds fewer documents.
    async fn search_similar(&self, query_embedding: &[f32], top_k: usize)
    -> Result<Vec<SearchHit>>;

    /// Current document count for the active namespace.
    async fn get_stats(&self) -> Result<usize>;
}

/// Constructs the configured backend.
///
/// Fails with [`WebloreError::BackendUnavailable`] when the selected
/// backend cannot be built (missing credentials, unusable storage root).
pub async fn open_backend(config: &StoreConfig) -> Result<Box<dyn VectorBackend>> {
    let namespace = sanitize_namespace(config.namespace.as_deref().unwrap_or_default());
    match config.provider {
        BackendKind::Local => {
            let store = LocalVectorStore::open(&config.local_path, &config.collection, &namespace)
                .await?;
            Ok(Box::new(store))
        }
        BackendKind::Pinecone => {
            let store = PineconeStore::new(&config.pinecone, &namespace)?;
            Ok(Box::new(store))
        }
        BackendKind::Chroma => {
            let store =
                ChromaStore::connect(&config.chroma, &config.collection, &namespace).await?;
            Ok(Box::new(store))
        }
    }
}

/// Sanitizes a raw namespace into a storage-safe identifier.
///
/// Keeps alphanumerics, `-`, and `_`; every other character becomes `_`;
/// the result is capped at [`MAX_NAMESPACE_LEN`] and an empty input maps to
/// `default`. Two raw namespaces that sanitize identically are the same
/// namespace — a documented collision policy, not a defect.
pub fn sanitize_namespace(raw: &str) -> String {
    if raw.is_empty() {
        return "default".to_string();
    }
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_NAMESPACE_LEN)
        .collect()
}

/// Scales a vector to unit length; the zero vector is left untouched.
pub fn normalize(vector: &[f32]) -> Vec<f32> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter().map(|v| v / norm).collect()
    } else {
        vector.to_vec()
    }
}

/// Inner product; cosine similarity when both sides are unit length.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Derives a document id from its position and a hash of the source URL.
pub fn document_id(position: usize, url: &str) -> String {
    let mut hasher = DefaultHasher::new();
    url.hash(&mut hasher);
    format!("doc_{position}_{:x}", hasher.finish())
}

/// Pairs chunks with normalized embeddings into storable documents.
///
/// Fails when the two slices differ in length or the embeddings disagree on
/// dimension — a requested write is never silently partial.
pub fn build_documents(
    chunks: &[Chunk],
    embeddings: &[Vec<f32>],
    namespace: &str,
    position_offset: usize,
) -> Result<Vec<IndexedDocument>> {
    if chunks.len() != embeddings.len() {
        return Err(WebloreError::store(format!(
            "{} chunks but {} embeddings",
            chunks.len(),
            embeddings.len()
        )));
    }
    if let Some(first) = embeddings.first() {
        let dimension = first.len();
        if dimension == 0 {
            return Err(WebloreError::store("embeddings have zero dimension"));
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dimension) {
            return Err(WebloreError::store(format!(
                "mixed embedding dimensions ({} and {})",
                dimension,
                bad.len()
            )));
        }
    }
    Ok(chunks
        .iter()
        .zip(embeddings)
        .enumerate()
        .map(|(offset, (chunk, embedding))| {
            let position = position_offset + offset;
            IndexedDocument {
                id: document_id(position, &chunk.url),
                vector: normalize(embedding),
                text: chunk.content.clone(),
                metadata: DocumentMetadata {
                    url: chunk.url.clone(),
                    title: chunk.title.clone(),
                    chunk_index: chunk.chunk_index,
                    crawled_at: chunk.crawled_at,
                    namespace: namespace.to_string(),
                    truncated: false,
                },
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn chunk(url: &str, index: usize) -> Chunk {
        Chunk {
            url: url.to_string(),
            title: "T".into(),
            content: format!("content {index}"),
            chunk_index: index,
            crawled_at: Utc::now(),
        }
    }

    #[test]
    fn sanitization_replaces_and_caps() {
        assert_eq!(sanitize_namespace("user@mail.com"), "user_mail_com");
        assert_eq!(sanitize_namespace("ok-name_7"), "ok-name_7");
        assert_eq!(sanitize_namespace(""), "default");
        let long = "x".repeat(200);
        assert_eq!(sanitize_namespace(&long).len(), MAX_NAMESPACE_LEN);
    }

    #[test]
    fn sanitization_collisions_are_intentional() {
        assert_eq!(sanitize_namespace("a.b"), sanitize_namespace("a_b"));
    }

    #[test]
    fn normalize_produces_unit_vectors() {
        let unit = normalize(&[3.0, 4.0]);
        assert!((dot(&unit, &unit) - 1.0).abs() < 1e-6);
        assert_eq!(normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn build_documents_rejects_length_mismatch() {
        let chunks = vec![chunk("https://a", 0)];
        let err = build_documents(&chunks, &[], "ns", 0).unwrap_err();
        assert!(matches!(err, WebloreError::Store(_)));
    }

    #[test]
    fn build_documents_rejects_mixed_dimensions() {
        let chunks = vec![chunk("https://a", 0), chunk("https://a", 1)];
        let embeddings = vec![vec![1.0, 0.0], vec![1.0, 0.0, 0.0]];
        let err = build_documents(&chunks, &embeddings, "ns", 0).unwrap_err();
        assert!(matches!(err, WebloreError::Store(_)));
    }

    #[test]
    fn document_ids_are_position_and_url_derived() {
        let a = document_id(0, "https://a");
        let b = document_id(1, "https://a");
        let c = document_id(0, "https://b");
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, document_id(0, "https://a"));
    }
}
