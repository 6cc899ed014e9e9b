//! End-to-end ingestion: crawl, chunk, embed, store.
//!
//! The pipeline owns one crawler, one embedding generator, and one store
//! handle; configuration problems (bad chunk geometry, bad crawl bounds)
//! surface at construction so an ingestion run never starts with settings
//! that would fail midway. Per-page problems during a run are absorbed by
//! the crawler; an ingestion either stores every produced chunk or fails
//! without storing any.

use std::sync::Arc;

use url::Url;

use crate::chunker::chunk_page;
use crate::config::{ChunkingConfig, RetrievalConfig};
use crate::crawler::Crawler;
use crate::embeddings::EmbeddingGenerator;
use crate::error::Result;
use crate::retrieval::Retriever;
use crate::store::VectorBackend;
use crate::types::{Chunk, Page};

/// Outcome of one ingestion run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Pages that survived fetching and extraction.
    pub pages: usize,
    /// Chunks embedded and written to the store.
    pub chunks_stored: usize,
}

pub struct Pipeline {
    crawler: Crawler,
    chunking: ChunkingConfig,
    embeddings: EmbeddingGenerator,
    store: Arc<dyn VectorBackend>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Fails with [`crate::error::WebloreError::Configuration`] when the
    /// chunk geometry is invalid.
    pub fn new(
        crawler: Crawler,
        chunking: ChunkingConfig,
        embeddings: EmbeddingGenerator,
        store: Arc<dyn VectorBackend>,
    ) -> Result<Self> {
        chunking.validate()?;
        Ok(Self {
            crawler,
            chunking,
            embeddings,
            store,
        })
    }

    /// Crawls from `start_url` and indexes everything it accepts.
    #[tracing::instrument(skip(self), fields(start = %start_url))]
    pub async fn ingest_url(&self, start_url: Url) -> Result<IngestReport> {
        let pages = self.crawler.crawl(start_url).await;
        if pages.is_empty() {
            tracing::warn!("crawl produced no pages, nothing to index");
            return Ok(IngestReport::default());
        }
        self.index_pages(&pages).await
    }

    /// Indexes caller-supplied text through the same chunk/embed/store path
    /// as crawled pages, bypassing the fetcher and the quality gate.
    #[tracing::instrument(skip(self, body))]
    pub async fn ingest_document(&self, title: &str, body: &str) -> Result<IngestReport> {
        if body.trim().is_empty() {
            return Ok(IngestReport::default());
        }
        let url = Url::parse(&format!("upload://{}", slugify(title)))
            .map_err(|err| crate::error::WebloreError::Configuration(err.to_string()))?;
        let page = Page::new(url, title, body);
        self.index_pages(std::slice::from_ref(&page)).await
    }

    async fn index_pages(&self, pages: &[Page]) -> Result<IngestReport> {
        let mut chunks: Vec<Chunk> = Vec::new();
        for page in pages {
            chunks.extend(chunk_page(page, &self.chunking));
        }
        if chunks.is_empty() {
            return Ok(IngestReport {
                pages: pages.len(),
                chunks_stored: 0,
            });
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embeddings.embed(&texts).await?;
        self.store.store_documents(&chunks, &embeddings).await?;

        let report = IngestReport {
            pages: pages.len(),
            chunks_stored: chunks.len(),
        };
        tracing::info!(
            pages = report.pages,
            chunks = report.chunks_stored,
            "ingestion complete"
        );
        Ok(report)
    }

    /// Builds a query-side orchestrator sharing this pipeline's embedding
    /// generator and store.
    pub fn retriever(&self, config: RetrievalConfig) -> Retriever {
        Retriever::new(self.embeddings.clone(), Arc::clone(&self.store), config)
    }
}

/// Lowercased alphanumerics with runs of everything else collapsed to `-`.
fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for ch in title.chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            for lower in ch.to_lowercase() {
                slug.push(lower);
            }
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        slug.push_str("document");
    }
    slug
}
