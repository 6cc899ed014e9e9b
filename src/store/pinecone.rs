//! Pinecone-compatible serverless index backend.
//!
//! Talks directly to an index host over its data-plane HTTP API: vectors go
//! up through `/vectors/upsert` in fixed-size batches, queries go through
//! `/query` with metadata included, and `/describe_index_stats` backs the
//! document count. The chunk text rides inside vector metadata, which is
//! subject to a per-record byte cap; oversized texts are truncated at a word
//! boundary and flagged so retrieval can tell a clipped passage apart from a
//! whole one.

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::config::PineconeConfig;
use crate::error::{Result, WebloreError};
use crate::types::{Chunk, DocumentMetadata, SearchHit};

use super::{VectorBackend, build_documents};

/// Vectors per upsert request.
const UPSERT_BATCH: usize = 100;
/// Byte budget for chunk text stored in vector metadata, leaving headroom
/// under the service's 40 KiB per-record metadata cap for the other fields.
const MAX_METADATA_TEXT_BYTES: usize = 30_000;
const TRUNCATION_MARKER: &str = " …[truncated]";

/// Client for one index host + namespace pair.
#[derive(Debug)]
pub struct PineconeStore {
    client: reqwest::Client,
    host: String,
    namespace: String,
}

impl PineconeStore {
    /// Builds the client. Fails with [`WebloreError::BackendUnavailable`]
    /// when the API key or index host is missing.
    pub fn new(config: &PineconeConfig, namespace: &str) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(WebloreError::BackendUnavailable(
                "Pinecone API key is not configured".into(),
            ));
        }
        if config.index_host.is_empty() {
            return Err(WebloreError::BackendUnavailable(
                "Pinecone index host is not configured".into(),
            ));
        }

        let mut headers = HeaderMap::new();
        let mut key_value = HeaderValue::from_str(&config.api_key).map_err(|_| {
            WebloreError::BackendUnavailable("Pinecone API key contains invalid characters".into())
        })?;
        key_value.set_sensitive(true);
        headers.insert("Api-Key", key_value);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|err| WebloreError::BackendUnavailable(err.to_string()))?;

        Ok(Self {
            client,
            host: config.index_host.trim_end_matches('/').to_string(),
            namespace: namespace.to_string(),
        })
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R> {
        let url = format!("{}{path}", self.host);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|err| WebloreError::store(format!("request to {path} failed: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(status_error(path, status, &detail));
        }
        response
            .json()
            .await
            .map_err(|err| WebloreError::store(format!("malformed response from {path}: {err}")))
    }
}

fn status_error(path: &str, status: StatusCode, detail: &str) -> WebloreError {
    let detail: String = detail.chars().take(200).collect();
    WebloreError::store(format!("{path} returned {status}: {detail}"))
}

/// Truncates `text` to fit the metadata byte budget, backing up to the last
/// word boundary before the cut so the stored passage never ends mid-word.
fn fit_to_metadata_budget(text: &str) -> (String, bool) {
    if text.len() <= MAX_METADATA_TEXT_BYTES {
        return (text.to_string(), false);
    }
    let budget = MAX_METADATA_TEXT_BYTES - TRUNCATION_MARKER.len();
    let mut cut = budget;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    let head = &text[..cut];
    let head = match head.rfind(char::is_whitespace) {
        Some(boundary) if boundary > 0 => &head[..boundary],
        _ => head,
    };
    (format!("{head}{TRUNCATION_MARKER}"), true)
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<UpsertVector>,
    namespace: &'a str,
}

#[derive(Serialize)]
struct UpsertVector {
    id: String,
    values: Vec<f32>,
    metadata: RecordMetadata,
}

/// Flat metadata schema; the chunk text lives in `content` so queries can
/// return it without a second lookup.
#[derive(Serialize, Deserialize)]
struct RecordMetadata {
    content: String,
    url: String,
    title: String,
    chunk_index: f64,
    crawled_at: String,
    namespace: String,
    truncated: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    namespace: &'a str,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    score: f32,
    metadata: Option<RecordMetadata>,
}

#[derive(Deserialize)]
struct StatsResponse {
    #[serde(default)]
    namespaces: std::collections::HashMap<String, NamespaceStats>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NamespaceStats {
    #[serde(default)]
    vector_count: usize,
}

fn hit_from_match(entry: QueryMatch) -> Option<SearchHit> {
    let meta = entry.metadata?;
    let crawled_at = DateTime::parse_from_rfc3339(&meta.crawled_at)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    Some(SearchHit {
        text: meta.content,
        metadata: DocumentMetadata {
            url: meta.url,
            title: meta.title,
            chunk_index: meta.chunk_index as usize,
            crawled_at,
            namespace: meta.namespace,
            truncated: meta.truncated,
        },
        similarity: entry.score.clamp(-1.0, 1.0),
    })
}

#[async_trait::async_trait]
impl VectorBackend for PineconeStore {
    #[tracing::instrument(skip_all, fields(chunks = chunks.len(), namespace = %self.namespace))]
    async fn store_documents(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()> {
        let documents = build_documents(chunks, embeddings, &self.namespace, 0)?;
        if documents.is_empty() {
            return Ok(());
        }

        let mut vectors = Vec::with_capacity(documents.len());
        for doc in documents {
            let (content, truncated) = fit_to_metadata_budget(&doc.text);
            if truncated {
                tracing::warn!(
                    id = %doc.id,
                    url = %doc.metadata.url,
                    original_bytes = doc.text.len(),
                    "chunk text truncated to fit metadata budget"
                );
            }
            vectors.push(UpsertVector {
                id: doc.id,
                values: doc.vector,
                metadata: RecordMetadata {
                    content,
                    url: doc.metadata.url,
                    title: doc.metadata.title,
                    chunk_index: doc.metadata.chunk_index as f64,
                    crawled_at: doc.metadata.crawled_at.to_rfc3339(),
                    namespace: doc.metadata.namespace,
                    truncated,
                },
            });
        }

        let total = vectors.len();
        let mut upserted = 0usize;
        let mut batch = Vec::with_capacity(UPSERT_BATCH.min(total));
        for vector in vectors {
            batch.push(vector);
            if batch.len() == UPSERT_BATCH {
                let request = UpsertRequest {
                    vectors: std::mem::take(&mut batch),
                    namespace: &self.namespace,
                };
                upserted += request.vectors.len();
                let _: serde_json::Value = self.post("/vectors/upsert", &request).await?;
            }
        }
        if !batch.is_empty() {
            upserted += batch.len();
            let request = UpsertRequest {
                vectors: batch,
                namespace: &self.namespace,
            };
            let _: serde_json::Value = self.post("/vectors/upsert", &request).await?;
        }
        tracing::info!(upserted, "documents upserted");
        Ok(())
    }

    async fn search_similar(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let request = QueryRequest {
            vector: query_embedding,
            top_k,
            include_metadata: true,
            namespace: &self.namespace,
        };
        let response: QueryResponse = self.post("/query", &request).await?;
        Ok(response
            .matches
            .into_iter()
            .filter_map(hit_from_match)
            .collect())
    }

    async fn get_stats(&self) -> Result<usize> {
        let response: StatsResponse = self
            .post("/describe_index_stats", &serde_json::json!({}))
            .await?;
        Ok(response
            .namespaces
            .get(&self.namespace)
            .map(|stats| stats.vector_count)
            .unwrap_or(0))
    }
}
