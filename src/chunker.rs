//! Deterministic sliding-window chunking of page content.

use crate::config::ChunkingConfig;
use crate::types::{Chunk, Page};

/// Splits a page into overlapping fixed-size windows.
///
/// Window `i` starts at character `i * (chunk_size - overlap)`; emission
/// continues until the window start reaches the end of the content, so the
/// original text is reconstructible from the chunks modulo the overlap
/// region. Indexing is by character, never by byte, so multi-byte text is
/// never split mid-scalar.
///
/// The config must have been validated (`overlap < chunk_size`) before this
/// is called; [`crate::pipeline::Pipeline`] does so at construction.
pub fn chunk_page(page: &Page, cfg: &ChunkingConfig) -> Vec<Chunk> {
    let chars: Vec<char> = page.content.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    // Validation guarantees overlap < chunk_size; the clamp keeps forward
    // progress even for a config that skipped it.
    let stride = cfg.chunk_size.saturating_sub(cfg.overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0usize;
    while start < chars.len() {
        let end = (start + cfg.chunk_size).min(chars.len());
        chunks.push(Chunk {
            url: page.url.to_string(),
            title: page.title.clone(),
            content: chars[start..end].iter().collect(),
            chunk_index: chunks.len(),
            crawled_at: page.crawled_at,
        });
        start += stride;
    }
    chunks
}
