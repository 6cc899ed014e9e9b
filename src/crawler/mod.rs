//! Bounded breadth-first web crawler.
//!
//! One [`Crawler::crawl`] invocation owns its frontier and visited set
//! outright. Fetches run as a semaphore-gated task set (at most
//! `max_concurrent` in flight), every fetch waits on the shared
//! [`RateLimiter`], and the whole run is bounded by an explicit wall-clock
//! deadline. Per-URL failures only drop that URL — a crawl never aborts, it
//! returns whatever it collected.

pub mod frontier;
pub mod policy;
pub mod rate_limit;

use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio::time::Instant;
use url::Url;

use crate::config::CrawlConfig;
use crate::error::{Result, WebloreError};
use crate::extract::{self, ExtractConfig, QualityFilter};
use crate::types::Page;
use frontier::Frontier;

pub use frontier::FrontierEntry;
pub use policy::{LinkPolicy, extract_links, normalize_link};
pub use rate_limit::RateLimiter;

/// Completed fetch handed back to the dispatch loop.
struct FetchDone {
    url: Url,
    depth: usize,
    result: Result<String>,
}

/// Breadth-first crawler with bounded concurrency and a global deadline.
pub struct Crawler {
    config: CrawlConfig,
    extract_cfg: ExtractConfig,
    filter: QualityFilter,
    policy: LinkPolicy,
    limiter: Arc<RateLimiter>,
    client: reqwest::Client,
}

impl Crawler {
    /// Builds a crawler, validating limits and constructing the HTTP client
    /// up front.
    pub fn new(config: CrawlConfig) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| WebloreError::Configuration(format!("http client: {err}")))?;
        Ok(Self {
            limiter: Arc::new(RateLimiter::new(config.delay)),
            config,
            extract_cfg: ExtractConfig::default(),
            filter: QualityFilter::default(),
            policy: LinkPolicy::default(),
            client,
        })
    }

    #[must_use]
    pub fn with_policy(mut self, policy: LinkPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_quality_filter(mut self, filter: QualityFilter) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn with_extract_config(mut self, extract_cfg: ExtractConfig) -> Self {
        self.extract_cfg = extract_cfg;
        self
    }

    /// Crawls breadth-first from `start_url` and returns the accepted pages.
    ///
    /// Terminates when the frontier empties, `max_pages` pages are
    /// collected, or the global deadline passes — whichever comes first. On
    /// timeout the pages collected so far are returned; in-flight fetches
    /// are abandoned without emitting partial pages.
    #[tracing::instrument(skip(self), fields(start = %start_url))]
    pub async fn crawl(&self, start_url: Url) -> Vec<Page> {
        let deadline = Instant::now() + self.config.timeout;
        // Backpressure: queued + visited may not exceed 2x the page budget.
        let capacity = self.config.max_pages.saturating_mul(2).max(2);
        let mut frontier = Frontier::seeded(start_url, capacity);
        let mut pages: Vec<Page> = Vec::new();

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent));
        let (tx, mut rx) = mpsc::channel::<FetchDone>(self.config.max_concurrent);
        let mut in_flight = 0usize;

        loop {
            if pages.len() >= self.config.max_pages {
                break;
            }
            if Instant::now() >= deadline {
                tracing::warn!("crawl deadline reached");
                break;
            }

            while in_flight < self.config.max_concurrent {
                let Some(entry) = self.next_eligible(&mut frontier) else {
                    break;
                };
                let Ok(permit) = Arc::clone(&semaphore).try_acquire_owned() else {
                    break;
                };
                let client = self.client.clone();
                let limiter = Arc::clone(&self.limiter);
                let tx = tx.clone();
                let FrontierEntry { url, depth } = entry;
                tracing::debug!(url = %url, depth, "dispatching fetch");
                tokio::spawn(async move {
                    let result = fetch_html(&client, &limiter, &url).await;
                    // Receiver gone means the crawl ended; drop the result.
                    let _ = tx.send(FetchDone { url, depth, result }).await;
                    drop(permit);
                });
                in_flight += 1;
            }

            if in_flight == 0 {
                break;
            }

            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Err(_) => {
                    tracing::warn!(in_flight, "crawl deadline reached; abandoning in-flight fetches");
                    break;
                }
                Ok(None) => break,
                Ok(Some(done)) => {
                    in_flight -= 1;
                    self.absorb(done, &mut frontier, &mut pages);
                }
            }
        }

        tracing::info!(
            pages = pages.len(),
            visited = frontier.visited_count(),
            "crawl completed"
        );
        pages
    }

    /// Pops frontier entries until one passes the visited/depth/policy
    /// checks, marking it visited before it is fetched.
    fn next_eligible(&self, frontier: &mut Frontier) -> Option<FrontierEntry> {
        while let Some(entry) = frontier.pop() {
            if frontier.is_visited(&entry.url) {
                continue;
            }
            if entry.depth > self.config.max_depth {
                continue;
            }
            if !self.policy.is_allowed(&entry.url) {
                tracing::debug!(url = %entry.url, "skipped by policy");
                continue;
            }
            frontier.mark_visited(&entry.url);
            return Some(entry);
        }
        None
    }

    /// Folds a completed fetch into the result list and the frontier.
    fn absorb(&self, done: FetchDone, frontier: &mut Frontier, pages: &mut Vec<Page>) {
        let html = match done.result {
            Ok(html) => html,
            Err(err) => {
                tracing::debug!(url = %done.url, error = %err, "fetch dropped");
                return;
            }
        };
        let page = match extract::extract(&html, &done.url, &self.extract_cfg, &self.filter) {
            Ok(page) => page,
            Err(err) => {
                tracing::debug!(url = %done.url, error = %err, "page rejected");
                return;
            }
        };
        tracing::info!(url = %done.url, depth = done.depth, title = %page.title, "page accepted");
        pages.push(page);

        if pages.len() >= self.config.max_pages || done.depth >= self.config.max_depth {
            return;
        }
        for link in extract_links(&html, &done.url) {
            frontier.enqueue(link, done.depth + 1);
        }
    }
}

/// Fetches one URL, applying rate limiting and the HTML-only gate.
async fn fetch_html(
    client: &reqwest::Client,
    limiter: &RateLimiter,
    url: &Url,
) -> Result<String> {
    limiter.wait().await;
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|err| WebloreError::fetch(url.as_str(), err))?;
    let status = response.status();
    if !status.is_success() {
        return Err(WebloreError::fetch(url.as_str(), format!("status {status}")));
    }
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if !content_type.contains("text/html") {
        return Err(WebloreError::UnsupportedContentType {
            url: url.to_string(),
            content_type,
        });
    }
    response
        .text()
        .await
        .map_err(|err| WebloreError::fetch(url.as_str(), err))
}
