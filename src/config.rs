//! Configuration surface for crawling, chunking, embedding, storage, and
//! retrieval.
//!
//! Every struct here has sensible [`Default`]s, `with_*` builder methods,
//! and a `from_env` constructor that resolves the same environment
//! variables the deployment surface exposes (`.env` files are honored via
//! `dotenvy`). Configs are plain values passed explicitly to the component
//! that needs them — there is no global configuration singleton.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, WebloreError};

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Limits and pacing for one crawl invocation.
#[derive(Clone, Debug)]
pub struct CrawlConfig {
    /// Maximum number of accepted pages per run.
    pub max_pages: usize,
    /// Maximum link depth from the seed URL (seed is depth 0).
    pub max_depth: usize,
    /// Minimum spacing between outbound requests.
    pub delay: Duration,
    /// Bound on concurrently in-flight fetches.
    pub max_concurrent: usize,
    /// Global wall-clock budget for the whole crawl.
    pub timeout: Duration,
    /// Per-request timeout handed to the HTTP client.
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_pages: 100,
            max_depth: 3,
            delay: Duration::from_millis(1000),
            max_concurrent: 5,
            timeout: Duration::from_secs(300),
            request_timeout: Duration::from_secs(30),
            user_agent: concat!("weblore/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl CrawlConfig {
    /// Resolves crawl limits from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();
        Self {
            max_pages: env_parse("MAX_PAGES_TO_CRAWL", defaults.max_pages),
            max_depth: env_parse("CRAWL_DEPTH", defaults.max_depth),
            delay: Duration::from_secs_f64(env_parse("CRAWL_DELAY", 1.0_f64)),
            max_concurrent: env_parse("MAX_CONCURRENT_REQUESTS", defaults.max_concurrent),
            user_agent: env_string("USER_AGENT", &defaults.user_agent),
            ..defaults
        }
    }

    #[must_use]
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    #[must_use]
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Rejects parameter combinations that would make a crawl degenerate.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            return Err(WebloreError::Configuration(
                "max_concurrent must be at least 1".into(),
            ));
        }
        if self.max_pages == 0 {
            return Err(WebloreError::Configuration(
                "max_pages must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Sliding-window chunking parameters.
#[derive(Clone, Copy, Debug)]
pub struct ChunkingConfig {
    /// Window length in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive windows.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
        }
    }

    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();
        Self {
            chunk_size: env_parse("CHUNK_SIZE", defaults.chunk_size),
            overlap: env_parse("CHUNK_OVERLAP", defaults.overlap),
        }
    }

    /// `overlap < chunk_size` is a precondition of the windowing algorithm;
    /// violating it is a configuration error surfaced before any work.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(WebloreError::Configuration(
                "chunk_size must be greater than zero".into(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(WebloreError::Configuration(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Batching policy for the embedding generator.
#[derive(Clone, Copy, Debug)]
pub struct EmbeddingConfig {
    /// Texts per encoder call; bounds peak memory, not caller-visible.
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { batch_size: 32 }
    }
}

impl EmbeddingConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self {
            batch_size: env_parse("EMBEDDING_BATCH_SIZE", Self::default().batch_size),
        }
    }
}

/// Retrieval-time knobs.
#[derive(Clone, Copy, Debug)]
pub struct RetrievalConfig {
    pub top_k: usize,
    /// Minimum cosine similarity for a hit to count as relevant.
    pub similarity_threshold: f32,
    /// Character budget for assembled context; passages are never split to
    /// fit, they are dropped whole.
    pub max_context_len: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            similarity_threshold: 0.3,
            max_context_len: 4000,
        }
    }
}

impl RetrievalConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();
        Self {
            top_k: env_parse("TOP_K_RESULTS", defaults.top_k),
            similarity_threshold: env_parse("SIMILARITY_THRESHOLD", defaults.similarity_threshold),
            max_context_len: env_parse("MAX_CONTEXT_LENGTH", defaults.max_context_len),
        }
    }
}

/// Closed set of vector store backends.
///
/// Selected once at construction via [`crate::store::open_backend`]; callers
/// hold a `Box<dyn VectorBackend>` and never branch on the variant again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    Pinecone,
    Chroma,
}

impl FromStr for BackendKind {
    type Err = WebloreError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "local" | "faiss" => Ok(Self::Local),
            "pinecone" => Ok(Self::Pinecone),
            "chroma" | "chroma_cloud" => Ok(Self::Chroma),
            other => Err(WebloreError::Configuration(format!(
                "unknown vector store provider '{other}'"
            ))),
        }
    }
}

/// Credentials for the Pinecone-style cloud backend.
#[derive(Clone, Debug, Default)]
pub struct PineconeConfig {
    pub api_key: String,
    /// Data-plane host of the target index, e.g. `https://idx-abc.svc.pinecone.io`.
    pub index_host: String,
}

/// Credentials for the Chroma-style cloud backend.
#[derive(Clone, Debug, Default)]
pub struct ChromaConfig {
    pub api_key: String,
    pub endpoint: String,
    pub tenant: String,
    pub database: String,
}

/// Backend selection plus everything needed to construct it.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub provider: BackendKind,
    /// Raw namespace; sanitized by every backend before use.
    pub namespace: Option<String>,
    /// Logical collection name, shared across backends.
    pub collection: String,
    /// Root directory for the local backend's artifacts.
    pub local_path: PathBuf,
    pub pinecone: PineconeConfig,
    pub chroma: ChromaConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            provider: BackendKind::Local,
            namespace: None,
            collection: "web_content".into(),
            local_path: PathBuf::from("./vector_store"),
            pinecone: PineconeConfig::default(),
            chroma: ChromaConfig::default(),
        }
    }
}

impl StoreConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();
        Ok(Self {
            provider: env_string("VECTOR_DB_PROVIDER", "local").parse()?,
            namespace: std::env::var("VECTOR_NAMESPACE")
                .or_else(|_| std::env::var("PINECONE_NAMESPACE"))
                .ok(),
            collection: env_string("COLLECTION_NAME", &defaults.collection),
            local_path: PathBuf::from(env_string("VECTOR_STORE_PATH", "./vector_store")),
            pinecone: PineconeConfig {
                api_key: env_string("PINECONE_API_KEY", ""),
                index_host: env_string("PINECONE_INDEX_HOST", ""),
            },
            chroma: ChromaConfig {
                api_key: env_string("CHROMA_CLOUD_API_KEY", ""),
                endpoint: env_string("CHROMA_CLOUD_ENDPOINT", "https://api.trychroma.com"),
                tenant: env_string("CHROMA_CLOUD_TENANT_ID", ""),
                database: env_string("CHROMA_CLOUD_DATABASE_ID", ""),
            },
        })
    }

    #[must_use]
    pub fn with_provider(mut self, provider: BackendKind) -> Self {
        self.provider = provider;
        self
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    #[must_use]
    pub fn with_local_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_path = path.into();
        self
    }

    #[must_use]
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunking_rejects_overlap_not_smaller_than_size() {
        assert!(ChunkingConfig::new(500, 50).validate().is_ok());
        assert!(ChunkingConfig::new(100, 100).validate().is_err());
        assert!(ChunkingConfig::new(100, 150).validate().is_err());
        assert!(ChunkingConfig::new(0, 0).validate().is_err());
    }

    #[test]
    fn backend_kind_parses_known_providers() {
        assert_eq!("local".parse::<BackendKind>().unwrap(), BackendKind::Local);
        assert_eq!(
            "Pinecone".parse::<BackendKind>().unwrap(),
            BackendKind::Pinecone
        );
        assert_eq!(
            "chroma_cloud".parse::<BackendKind>().unwrap(),
            BackendKind::Chroma
        );
        assert!("weaviate".parse::<BackendKind>().is_err());
    }

    #[test]
    fn crawl_config_rejects_zero_concurrency() {
        let cfg = CrawlConfig::default().with_max_concurrent(0);
        assert!(cfg.validate().is_err());
    }
}
