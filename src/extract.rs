//! Content extraction and the quality gate applied to every fetched page.
//!
//! Extraction walks the parsed DOM collecting text segments while skipping
//! non-content subtrees, prefers an article/main container when one exists,
//! and normalizes whitespace before handing the result to the quality gate.
//! Rejected pages produce no output and are never retried.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use crate::error::{Result, WebloreError};
use crate::types::Page;

static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").expect("static selector"));
static CONTAINERS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("article, main, div.content").expect("static selector"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));

/// Elements whose entire subtree is non-content.
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "template", "nav", "header", "footer", "aside", "iframe",
];

/// Substrings that mark placeholder pages with no indexable content.
const PLACEHOLDER_MARKERS: &[&str] = &[
    "page not found",
    "404 error",
    "under construction",
    "coming soon",
    "login required",
    "access denied",
    "enable javascript",
    "checking your browser",
];

/// Limits applied during extraction.
#[derive(Clone, Copy, Debug)]
pub struct ExtractConfig {
    /// Hard cap on stored content length, in characters.
    pub max_content_chars: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            max_content_chars: 15_000,
        }
    }
}

/// Rejects pages whose cleaned text is too short, too long, boilerplate, or
/// navigation-dominated.
#[derive(Clone, Debug)]
pub struct QualityFilter {
    pub min_content_chars: usize,
    pub max_content_chars: usize,
    /// Density checks only apply to pages longer than this.
    pub density_min_page_chars: usize,
    /// Minimum average text-segment length for long pages; link farms and
    /// menu-heavy pages sit well below it.
    pub min_avg_segment_chars: f64,
}

impl Default for QualityFilter {
    fn default() -> Self {
        Self {
            min_content_chars: 200,
            max_content_chars: 20_000,
            density_min_page_chars: 1_000,
            min_avg_segment_chars: 15.0,
        }
    }
}

impl QualityFilter {
    /// Applies the gate to cleaned content; `segment_count` is the number of
    /// DOM text segments the content was assembled from.
    pub fn assess(&self, content: &str, segment_count: usize) -> Result<()> {
        let chars = content.chars().count();
        if chars < self.min_content_chars {
            return Err(WebloreError::QualityRejected(format!(
                "content too short ({chars} chars)"
            )));
        }
        if chars > self.max_content_chars {
            return Err(WebloreError::QualityRejected(format!(
                "content too long ({chars} chars)"
            )));
        }
        let lowered = content.to_lowercase();
        if let Some(marker) = PLACEHOLDER_MARKERS
            .iter()
            .find(|marker| lowered.contains(**marker))
        {
            return Err(WebloreError::QualityRejected(format!(
                "placeholder marker '{marker}'"
            )));
        }
        if chars > self.density_min_page_chars && segment_count > 0 {
            let avg = chars as f64 / segment_count as f64;
            if avg < self.min_avg_segment_chars {
                return Err(WebloreError::QualityRejected(format!(
                    "low content density ({avg:.1} chars/segment)"
                )));
            }
        }
        Ok(())
    }
}

/// Turns raw HTML into a [`Page`], or rejects it.
///
/// Title falls back to the URL host when the document has no `<title>`.
pub fn extract(
    raw_html: &str,
    url: &Url,
    cfg: &ExtractConfig,
    filter: &QualityFilter,
) -> Result<Page> {
    let document = Html::parse_document(raw_html);

    let title = document
        .select(&TITLE)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
        .or_else(|| url.host_str().map(str::to_string))
        .unwrap_or_default();

    // Prefer a dedicated content container, fall back to the whole document.
    let container = document.select(&CONTAINERS).next();
    let segments = match container {
        Some(element) => collect_segments(element),
        None => collect_segments(document.root_element()),
    };

    let joined = segments.join(" ");
    let content = WHITESPACE.replace_all(joined.trim(), " ").into_owned();

    // Truncate before the gate: an overlong page is kept as its head, not
    // rejected outright.
    let content = truncate_chars(&content, cfg.max_content_chars);
    filter.assess(&content, segments.len())?;

    Ok(Page::new(url.clone(), title, content))
}

/// Collects trimmed, non-empty text segments under `root`, skipping
/// non-content subtrees.
fn collect_segments(root: ElementRef<'_>) -> Vec<String> {
    let mut segments = Vec::new();
    for node in root.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let skipped = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| SKIPPED_ELEMENTS.contains(&el.name()))
        });
        if skipped {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            segments.push(trimmed.to_string());
        }
    }
    segments
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
