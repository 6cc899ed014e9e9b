//! FIFO frontier and visited-set bookkeeping for one crawl invocation.

use std::collections::{HashSet, VecDeque};

use url::Url;

/// A queued, not-yet-fetched URL with the depth it was discovered at.
#[derive(Clone, Debug)]
pub struct FrontierEntry {
    pub url: Url,
    pub depth: usize,
}

/// Breadth-first work queue owned exclusively by a single crawl run.
///
/// The visited set guarantees each URL is fetched at most once per run; the
/// backpressure cap bounds `queued + visited` so link-dense sites cannot fan
/// the frontier out without limit.
#[derive(Debug)]
pub struct Frontier {
    queue: VecDeque<FrontierEntry>,
    visited: HashSet<String>,
    /// Upper bound on `queue.len() + visited.len()` when enqueueing.
    capacity: usize,
}

impl Frontier {
    /// Creates a frontier seeded with `start_url` at depth 0.
    pub fn seeded(start_url: Url, capacity: usize) -> Self {
        let mut queue = VecDeque::new();
        queue.push_back(FrontierEntry {
            url: start_url,
            depth: 0,
        });
        Self {
            queue,
            visited: HashSet::new(),
            capacity,
        }
    }

    /// Pops the earliest-queued entry.
    pub fn pop(&mut self) -> Option<FrontierEntry> {
        self.queue.pop_front()
    }

    /// Marks a URL visited; returns `false` if it was already visited.
    pub fn mark_visited(&mut self, url: &Url) -> bool {
        self.visited.insert(url.as_str().to_string())
    }

    pub fn is_visited(&self, url: &Url) -> bool {
        self.visited.contains(url.as_str())
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Enqueues a discovered link unless it is already visited or the
    /// backpressure cap has been reached. Returns `true` when queued.
    pub fn enqueue(&mut self, url: Url, depth: usize) -> bool {
        if self.is_visited(&url) {
            return false;
        }
        if self.queue.len() + self.visited.len() >= self.capacity {
            return false;
        }
        self.queue.push_back(FrontierEntry { url, depth });
        true
    }
}
