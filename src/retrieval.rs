//! Query-side orchestration: embed the question, rank stored passages, and
//! hand a bounded context window to an answer generator.
//!
//! The threshold filter keeps weak matches out of the context, with one
//! deliberate escape hatch: when every candidate scores below the threshold
//! but candidates exist, the raw top-k is used instead of returning nothing.
//! An empty result therefore always means the store had nothing at all, not
//! that the threshold was set too high.
//!
//! Generation is a pluggable collaborator behind [`Generator`]; when it
//! fails, [`Retriever::answer`] degrades to a templated extract of the
//! retrieved passages instead of surfacing the error to the caller.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::RetrievalConfig;
use crate::embeddings::EmbeddingGenerator;
use crate::error::Result;
use crate::store::VectorBackend;
use crate::types::SearchHit;

/// Produces an answer from a question and assembled context.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, question: &str, context: &str) -> Result<String>;
}

/// A generated (or degraded) answer plus the passages that informed it.
#[derive(Clone, Debug)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<SearchHit>,
    /// True when the generator failed and the text is a templated extract.
    pub degraded: bool,
}

pub struct Retriever {
    embeddings: EmbeddingGenerator,
    store: Arc<dyn VectorBackend>,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(
        embeddings: EmbeddingGenerator,
        store: Arc<dyn VectorBackend>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embeddings,
            store,
            config,
        }
    }

    /// Returns the passages most similar to `query`, threshold-filtered.
    #[tracing::instrument(skip(self))]
    pub async fn retrieve(&self, query: &str) -> Result<Vec<SearchHit>> {
        let embedding = self.embeddings.embed_one(query).await?;
        let candidates = self
            .store
            .search_similar(&embedding, self.config.top_k)
            .await?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let filtered: Vec<SearchHit> = candidates
            .iter()
            .filter(|hit| hit.similarity >= self.config.similarity_threshold)
            .cloned()
            .collect();
        if filtered.is_empty() {
            tracing::debug!(
                candidates = candidates.len(),
                threshold = self.config.similarity_threshold,
                "all candidates below threshold, falling back to raw top-k"
            );
            return Ok(candidates);
        }
        Ok(filtered)
    }

    /// Retrieves context for `question` and asks `generator` for an answer.
    ///
    /// Never fails on generator errors: those degrade to a templated extract
    /// of the retrieved passages, flagged via [`Answer::degraded`].
    pub async fn answer(&self, question: &str, generator: &dyn Generator) -> Result<Answer> {
        let sources = self.retrieve(question).await?;
        if sources.is_empty() {
            return Ok(Answer {
                text: "I don't have any indexed content relevant to that question.".to_string(),
                sources,
                degraded: false,
            });
        }

        let context = assemble_context(&sources, self.config.max_context_len);
        match generator.generate(question, &context).await {
            Ok(text) => Ok(Answer {
                text,
                sources,
                degraded: false,
            }),
            Err(err) => {
                tracing::warn!(error = %err, "generator failed, returning extracted passages");
                Ok(Answer {
                    text: fallback_answer(&sources),
                    sources,
                    degraded: true,
                })
            }
        }
    }
}

/// Joins whole passages into a context block of at most `max_len` chars.
///
/// Passages are taken in rank order and never split; the first one that does
/// not fit ends assembly.
pub fn assemble_context(hits: &[SearchHit], max_len: usize) -> String {
    let mut context = String::new();
    for hit in hits {
        let block = format!(
            "From {} ({}):\n{}",
            hit.metadata.title, hit.metadata.url, hit.text
        );
        let needed = block.chars().count() + if context.is_empty() { 0 } else { 2 };
        if context.chars().count() + needed > max_len {
            break;
        }
        if !context.is_empty() {
            context.push_str("\n\n");
        }
        context.push_str(&block);
    }
    context
}

/// Templated extract used when the generator is unavailable.
fn fallback_answer(hits: &[SearchHit]) -> String {
    let mut text = String::from("Based on the indexed content:\n");
    for hit in hits {
        let excerpt: String = hit.text.chars().take(200).collect();
        let ellipsis = if hit.text.chars().count() > 200 { "..." } else { "" };
        text.push_str(&format!(
            "\n• From {}: {excerpt}{ellipsis}",
            hit.metadata.title
        ));
    }
    text
}
