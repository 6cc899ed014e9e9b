//! Text-to-vector embedding with pluggable encoders.
//!
//! [`TextEncoder`] is the capability boundary: callers depend on
//! [`EmbeddingGenerator::embed`] and never on which encoder variant is
//! active. The generator feeds the encoder fixed-size batches to bound peak
//! memory and fails the whole call if any batch fails — callers must never
//! treat a partial embedding set as usable.

pub mod hashed;
pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::EmbeddingConfig;
use crate::error::{Result, WebloreError};

pub use hashed::HashEncoder;
pub use openai::OpenAiEncoder;

/// A model that turns text into fixed-dimension vectors.
#[async_trait]
pub trait TextEncoder: Send + Sync {
    /// Encodes one batch, preserving input order with 1:1 cardinality.
    async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Output dimension; fixed for the lifetime of the encoder.
    fn dimension(&self) -> usize;

    /// Human-readable encoder identifier, used in logs.
    fn name(&self) -> &str;
}

/// Batching front-end over a [`TextEncoder`].
#[derive(Clone)]
pub struct EmbeddingGenerator {
    encoder: Arc<dyn TextEncoder>,
    batch_size: usize,
}

impl EmbeddingGenerator {
    pub fn new(encoder: Arc<dyn TextEncoder>, config: EmbeddingConfig) -> Self {
        Self {
            encoder,
            batch_size: config.batch_size.max(1),
        }
    }

    pub fn dimension(&self) -> usize {
        self.encoder.dimension()
    }

    /// Embeds `texts` in configuration-sized batches.
    ///
    /// Returns one vector per input, in input order. If any batch fails the
    /// whole call fails and no embeddings are returned.
    #[tracing::instrument(skip_all, fields(texts = texts.len(), encoder = self.encoder.name()))]
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let encoded = self.encoder.encode_batch(batch).await?;
            if encoded.len() != batch.len() {
                return Err(WebloreError::embedding(format!(
                    "encoder returned {} vectors for a batch of {}",
                    encoded.len(),
                    batch.len()
                )));
            }
            for vector in &encoded {
                if vector.len() != self.encoder.dimension() {
                    return Err(WebloreError::embedding(format!(
                        "encoder returned dimension {} (expected {})",
                        vector.len(),
                        self.encoder.dimension()
                    )));
                }
            }
            vectors.extend(encoded);
        }
        Ok(vectors)
    }

    /// Embeds a single text.
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let input = [text.to_string()];
        let mut vectors = self.embed(&input).await?;
        vectors
            .pop()
            .ok_or_else(|| WebloreError::embedding("encoder returned no vector"))
    }
}
