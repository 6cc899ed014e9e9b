//! Deterministic local encoder based on token feature hashing.
//!
//! No network, no model files: tokens and token bigrams are hashed into a
//! fixed number of buckets and the resulting count vector is L2-normalized.
//! Verbatim text therefore embeds to an identical unit vector, and texts
//! sharing vocabulary land close in cosine space — enough for offline
//! deployments and deterministic tests, while the remote encoder covers
//! model-backed embedding quality.

use std::hash::{DefaultHasher, Hash, Hasher};

use async_trait::async_trait;

use crate::error::Result;

use super::TextEncoder;

pub const DEFAULT_DIMENSION: usize = 384;

/// Offline feature-hashing text encoder.
#[derive(Clone, Debug)]
pub struct HashEncoder {
    dimension: usize,
}

impl Default for HashEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

impl HashEncoder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn bucket(&self, token: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        (hasher.finish() % self.dimension as u64) as usize
    }

    fn encode_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let tokens: Vec<String> = text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect();

        for token in &tokens {
            vector[self.bucket(token)] += 1.0;
        }
        for pair in tokens.windows(2) {
            vector[self.bucket(&format!("{} {}", pair[0], pair[1]))] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl TextEncoder for HashEncoder {
    async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.encode_one(text)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hash-encoder"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn identical_text_embeds_identically() {
        let encoder = HashEncoder::default();
        let texts = vec!["The crawl frontier is a FIFO queue.".to_string(); 2];
        let vectors = encoder.encode_batch(&texts).await.unwrap();
        assert_eq!(vectors[0], vectors[1]);
        assert!((dot(&vectors[0], &vectors[1]) - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn output_is_unit_length() {
        let encoder = HashEncoder::new(128);
        let vectors = encoder
            .encode_batch(&["some moderately long sample text here".to_string()])
            .await
            .unwrap();
        let norm: f32 = vectors[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn related_text_scores_above_unrelated() {
        let encoder = HashEncoder::default();
        let vectors = encoder
            .encode_batch(&[
                "vector index persistence and atomic writes".to_string(),
                "atomic writes for the persisted vector index".to_string(),
                "banana bread recipe with extra walnuts".to_string(),
            ])
            .await
            .unwrap();
        let related = dot(&vectors[0], &vectors[1]);
        let unrelated = dot(&vectors[0], &vectors[2]);
        assert!(related > unrelated);
    }

    #[tokio::test]
    async fn empty_text_embeds_to_zero_vector() {
        let encoder = HashEncoder::new(16);
        let vectors = encoder.encode_batch(&["".to_string()]).await.unwrap();
        assert!(vectors[0].iter().all(|v| *v == 0.0));
    }
}
