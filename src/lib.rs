//! ```text
//! Seed URL ──► crawler::Crawler ──► Vec<Page>
//!                  │
//!                  ├─► crawler::policy / frontier / rate_limit
//!                  └─► extract (readable text + quality gate)
//!
//! Page ──► chunker::chunk_page ──► Vec<Chunk>
//!
//! Chunk ──► embeddings::EmbeddingGenerator ──► vectors
//!                  ├─► embeddings::hashed (offline encoder)
//!                  └─► embeddings::openai (remote encoder)
//!
//! (Chunk, vector) ──► store::VectorBackend ──► local / pinecone / chroma
//!
//! Question ──► retrieval::Retriever ──► ranked passages ──► Answer
//! ```
//!
//! [`pipeline::Pipeline`] wires the ingestion half together;
//! [`retrieval::Retriever`] serves the query half against the same store.
pub mod chunker;
pub mod config;
pub mod crawler;
pub mod embeddings;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod retrieval;
pub mod store;
pub mod types;

pub use config::{
    BackendKind, ChunkingConfig, CrawlConfig, EmbeddingConfig, RetrievalConfig, StoreConfig,
};
pub use crawler::Crawler;
pub use embeddings::EmbeddingGenerator;
pub use error::{Result, WebloreError};
pub use pipeline::{IngestReport, Pipeline};
pub use retrieval::{Answer, Generator, Retriever};
pub use store::{VectorBackend, open_backend};
pub use types::{Chunk, Page, SearchHit};
