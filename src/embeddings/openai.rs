//! Remote encoder for OpenAI-compatible `/embeddings` endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WebloreError};

use super::TextEncoder;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const MAX_RETRIES: usize = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    index: usize,
    embedding: Vec<f32>,
}

/// Async embeddings client for OpenAI-compatible APIs.
#[derive(Clone)]
pub struct OpenAiEncoder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dimension: usize,
}

impl OpenAiEncoder {
    /// Builds a client for the canonical OpenAI endpoint.
    pub fn new(api_key: &str, model: impl Into<String>, dimension: usize) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL, model, dimension)
    }

    /// Builds a client from `OPENAI_API_KEY`, `OPENAI_EMBEDDING_MODEL`, and
    /// `EMBEDDING_DIMENSION` (`.env` honored).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        let model = std::env::var("OPENAI_EMBEDDING_MODEL")
            .unwrap_or_else(|_| "text-embedding-3-small".to_string());
        let dimension = std::env::var("EMBEDDING_DIMENSION")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(1536);
        Self::new(&api_key, model, dimension)
    }

    /// Builds a client for any OpenAI-compatible base URL.
    pub fn with_base_url(
        api_key: &str,
        base_url: &str,
        model: impl Into<String>,
        dimension: usize,
    ) -> Result<Self> {
        let model = model.into();
        if api_key.trim().is_empty() {
            return Err(WebloreError::Configuration(
                "missing embedding API key".into(),
            ));
        }
        if model.trim().is_empty() {
            return Err(WebloreError::Configuration(
                "missing embedding model name".into(),
            ));
        }
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
            .map_err(|_| WebloreError::Configuration("embedding API key is not ASCII".into()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .default_headers(headers)
            .build()
            .map_err(|err| WebloreError::Configuration(format!("http client: {err}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model,
            dimension,
        })
    }

    async fn request_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: Some(self.dimension),
        };

        let mut attempt = 0usize;
        loop {
            let response = self
                .client
                .post(&self.endpoint)
                .json(&request)
                .send()
                .await
                .map_err(WebloreError::embedding)?;
            let status = response.status();

            if status.is_success() {
                let parsed: EmbeddingResponse =
                    response.json().await.map_err(WebloreError::embedding)?;
                if parsed.data.len() != texts.len() {
                    return Err(WebloreError::embedding(format!(
                        "API returned {} embeddings for {} inputs",
                        parsed.data.len(),
                        texts.len()
                    )));
                }
                let mut rows = parsed.data;
                rows.sort_by_key(|row| row.index);
                return Ok(rows.into_iter().map(|row| row.embedding).collect());
            }

            let retryable =
                status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            if retryable && attempt < MAX_RETRIES {
                attempt += 1;
                tracing::warn!(status = %status, attempt, "embedding request retrying");
                tokio::time::sleep(RETRY_BACKOFF * attempt as u32).await;
                continue;
            }
            let body = response.text().await.unwrap_or_default();
            return Err(WebloreError::embedding(format!(
                "embedding API returned {status}: {body}"
            )));
        }
    }
}

#[async_trait]
impl TextEncoder for OpenAiEncoder {
    async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request_batch(texts).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model
    }
}
