//! Chroma-style cloud collection backend.
//!
//! Connects to a hosted Chroma deployment over its v2 HTTP API. Each
//! namespace maps to its own collection named `{collection}_{namespace}`,
//! resolved get-or-create at connect time so the first write needs no
//! separate provisioning step. Documents ride in the collection's parallel
//! `documents` array rather than metadata, so there is no byte cap to
//! truncate against. The API reports distances; they are mapped to cosine
//! similarity as `1 - distance` before leaving this module.

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::config::ChromaConfig;
use crate::error::{Result, WebloreError};
use crate::types::{Chunk, DocumentMetadata, SearchHit};

use super::{VectorBackend, build_documents};

/// Records per add request.
const ADD_BATCH: usize = 100;

/// Client bound to one resolved collection.
#[derive(Debug)]
pub struct ChromaStore {
    client: reqwest::Client,
    collection_url: String,
    namespace: String,
}

#[derive(Serialize)]
struct CreateCollectionRequest<'a> {
    name: &'a str,
    get_or_create: bool,
}

#[derive(Deserialize)]
struct CollectionInfo {
    id: String,
}

#[derive(Serialize)]
struct AddRequest {
    ids: Vec<String>,
    embeddings: Vec<Vec<f32>>,
    documents: Vec<String>,
    metadatas: Vec<RecordMetadata>,
}

#[derive(Serialize, Deserialize)]
struct RecordMetadata {
    url: String,
    title: String,
    chunk_index: i64,
    crawled_at: String,
    namespace: String,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    query_embeddings: Vec<&'a [f32]>,
    n_results: usize,
    include: [&'static str; 3],
}

/// Results arrive as one parallel-array group per query embedding; this
/// client always sends exactly one.
#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    documents: Vec<Vec<String>>,
    #[serde(default)]
    metadatas: Vec<Vec<Option<RecordMetadata>>>,
    #[serde(default)]
    distances: Vec<Vec<f32>>,
}

impl ChromaStore {
    /// Connects and resolves (or creates) the namespace's collection.
    ///
    /// Fails with [`WebloreError::BackendUnavailable`] when credentials are
    /// incomplete or the collection cannot be resolved.
    pub async fn connect(
        config: &ChromaConfig,
        collection: &str,
        namespace: &str,
    ) -> Result<Self> {
        for (value, what) in [
            (&config.api_key, "API key"),
            (&config.endpoint, "endpoint"),
            (&config.tenant, "tenant"),
            (&config.database, "database"),
        ] {
            if value.is_empty() {
                return Err(WebloreError::BackendUnavailable(format!(
                    "Chroma {what} is not configured"
                )));
            }
        }

        let mut headers = HeaderMap::new();
        let mut token = HeaderValue::from_str(&config.api_key).map_err(|_| {
            WebloreError::BackendUnavailable("Chroma API key contains invalid characters".into())
        })?;
        token.set_sensitive(true);
        headers.insert("X-Chroma-Token", token);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|err| WebloreError::BackendUnavailable(err.to_string()))?;

        let base = format!(
            "{}/api/v2/tenants/{}/databases/{}",
            config.endpoint.trim_end_matches('/'),
            config.tenant,
            config.database
        );
        let name = format!("{collection}_{namespace}");
        let response = client
            .post(format!("{base}/collections"))
            .json(&CreateCollectionRequest {
                name: &name,
                get_or_create: true,
            })
            .send()
            .await
            .map_err(|err| {
                WebloreError::BackendUnavailable(format!("collection lookup failed: {err}"))
            })?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(WebloreError::BackendUnavailable(format!(
                "collection lookup returned {status}: {}",
                detail.chars().take(200).collect::<String>()
            )));
        }
        let info: CollectionInfo = response.json().await.map_err(|err| {
            WebloreError::BackendUnavailable(format!("malformed collection response: {err}"))
        })?;
        tracing::info!(collection = %name, id = %info.id, "chroma collection resolved");

        Ok(Self {
            client,
            collection_url: format!("{base}/collections/{}", info.id),
            namespace: namespace.to_string(),
        })
    }

    async fn check(path: &str, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let detail = response.text().await.unwrap_or_default();
        Err(status_error(path, status, &detail))
    }
}

fn status_error(path: &str, status: StatusCode, detail: &str) -> WebloreError {
    let detail: String = detail.chars().take(200).collect();
    WebloreError::store(format!("{path} returned {status}: {detail}"))
}

fn hit_from_row(
    document: String,
    metadata: Option<RecordMetadata>,
    distance: f32,
) -> Option<SearchHit> {
    let meta = metadata?;
    let crawled_at = DateTime::parse_from_rfc3339(&meta.crawled_at)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    Some(SearchHit {
        text: document,
        metadata: DocumentMetadata {
            url: meta.url,
            title: meta.title,
            chunk_index: meta.chunk_index.max(0) as usize,
            crawled_at,
            namespace: meta.namespace,
            truncated: false,
        },
        similarity: (1.0 - distance).clamp(-1.0, 1.0),
    })
}

#[async_trait::async_trait]
impl VectorBackend for ChromaStore {
    #[tracing::instrument(skip_all, fields(chunks = chunks.len(), namespace = %self.namespace))]
    async fn store_documents(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()> {
        let documents = build_documents(chunks, embeddings, &self.namespace, 0)?;
        if documents.is_empty() {
            return Ok(());
        }

        let total = documents.len();
        for batch in documents.chunks(ADD_BATCH) {
            let mut request = AddRequest {
                ids: Vec::with_capacity(batch.len()),
                embeddings: Vec::with_capacity(batch.len()),
                documents: Vec::with_capacity(batch.len()),
                metadatas: Vec::with_capacity(batch.len()),
            };
            for doc in batch {
                request.ids.push(doc.id.clone());
                request.embeddings.push(doc.vector.clone());
                request.documents.push(doc.text.clone());
                request.metadatas.push(RecordMetadata {
                    url: doc.metadata.url.clone(),
                    title: doc.metadata.title.clone(),
                    chunk_index: doc.metadata.chunk_index as i64,
                    crawled_at: doc.metadata.crawled_at.to_rfc3339(),
                    namespace: doc.metadata.namespace.clone(),
                });
            }
            let response = self
                .client
                .post(format!("{}/add", self.collection_url))
                .json(&request)
                .send()
                .await
                .map_err(|err| WebloreError::store(format!("add request failed: {err}")))?;
            Self::check("/add", response).await?;
        }
        tracing::info!(stored = total, "documents added");
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
            query_embeddings: vec![query_embedding],
            n_results: top_k,
            include: ["documents", "metadatas", "distances"],
        };
        let response = self
            .client
            .post(format!("{}/query", self.collection_url))
            .json(&request)
            .send()
            .await
            .map_err(|err| WebloreError::store(format!("query request failed: {err}")))?;
        let response = Self::check("/query", response).await?;
        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|err| WebloreError::store(format!("malformed query response: {err}")))?;

        let documents = parsed.documents.into_iter().next().unwrap_or_default();
        let metadatas = parsed.metadatas.into_iter().next().unwrap_or_default();
        let distances = parsed.distances.into_iter().next().unwrap_or_default();

        Ok(documents
            .into_iter()
            .zip(metadatas)
            .zip(distances)
            .filter_map(|((document, metadata), distance)| {
                hit_from_row(document, metadata, distance)
            })
            .collect())
    }

    async fn get_stats(&self) -> Result<usize> {
        let response = self
            .client
            .get(format!("{}/count", self.collection_url))
            .send()
            .await
            .map_err(|err| WebloreError::store(format!("count request failed: {err}")))?;
        let response = Self::check("/count", response).await?;
        response
            .json()
            .await
            .map_err(|err| WebloreError::store(format!("malformed count response: {err}")))
    }
}
