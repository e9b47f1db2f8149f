//! Test doubles for the feed and the citation graph.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::models::SearchRequest;
use crate::sources::{
    CitationLookup, CitationStats, ExternalId, FeedSource, RawAuthor, RawEntry, RawLink,
};

/// A feed that returns predefined entries
#[derive(Debug, Default)]
pub struct MockFeed {
    entries: Mutex<Vec<RawEntry>>,
    fail: Mutex<Option<String>>,
    requests: Mutex<Vec<SearchRequest>>,
}

impl MockFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed returning these entries for every request
    pub fn with_entries(entries: Vec<RawEntry>) -> Self {
        let feed = Self::new();
        feed.set_entries(entries);
        feed
    }

    pub fn set_entries(&self, entries: Vec<RawEntry>) {
        *lock(&self.entries) = entries;
    }

    /// Make every subsequent fetch fail with `SourceUnavailable`
    pub fn fail_with(&self, message: impl Into<String>) {
        *lock(&self.fail) = Some(message.into());
    }

    /// Number of fetches that reached the feed
    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Requests received, in order
    pub fn requests(&self) -> Vec<SearchRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl FeedSource for MockFeed {
    fn name(&self) -> &str {
        "Mock Feed"
    }

    async fn fetch(&self, request: &SearchRequest) -> Result<Vec<RawEntry>> {
        lock(&self.requests).push(request.clone());
        if let Some(message) = lock(&self.fail).clone() {
            return Err(Error::SourceUnavailable(message));
        }
        Ok(lock(&self.entries).clone())
    }
}

/// A citation graph backed by a map
#[derive(Debug, Default)]
pub struct MockCitations {
    stats: Mutex<HashMap<String, CitationStats>>,
    failing: Mutex<HashSet<String>>,
    calls: AtomicUsize,
    lookups: Mutex<Vec<String>>,
}

impl MockCitations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `id` (e.g. `"arXiv:2301.00001"`) with `count` citations
    pub fn insert(&self, id: impl Into<String>, count: u64) -> &Self {
        lock(&self.stats).insert(
            id.into(),
            CitationStats {
                citation_count: count,
                ..CitationStats::default()
            },
        );
        self
    }

    pub fn insert_stats(&self, id: impl Into<String>, stats: CitationStats) -> &Self {
        lock(&self.stats).insert(id.into(), stats);
        self
    }

    /// Make lookups of `id` fail with `EnrichmentUnavailable`
    pub fn fail(&self, id: impl Into<String>) -> &Self {
        lock(&self.failing).insert(id.into());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Identifiers looked up, in call order
    pub fn lookups(&self) -> Vec<String> {
        lock(&self.lookups).clone()
    }
}

#[async_trait]
impl CitationLookup for MockCitations {
    async fn lookup(&self, id: &ExternalId) -> Result<Option<CitationStats>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = id.to_string();
        lock(&self.lookups).push(key.clone());

        if lock(&self.failing).contains(&key) {
            return Err(Error::EnrichmentUnavailable(format!("{}: injected failure", key)));
        }
        Ok(lock(&self.stats).get(&key).cloned())
    }
}

/// Helper to build a feed entry the way arXiv shapes them
pub fn make_entry(arxiv_id: &str, title: &str) -> RawEntry {
    RawEntry {
        id: Some(format!("http://arxiv.org/abs/{}", arxiv_id)),
        title: Some(title.to_string()),
        summary: Some(format!("Abstract of {}", title)),
        published: Some("2024-01-01T00:00:00Z".to_string()),
        updated: None,
        authors: vec![RawAuthor {
            name: Some("Test Author".to_string()),
        }],
        links: vec![RawLink {
            href: format!("http://arxiv.org/abs/{}", arxiv_id),
            link_type: Some("text/html".to_string()),
            title: None,
        }],
        arxiv_doi: None,
        doi: None,
    }
}

// A poisoned mutex in a test double only means another test thread panicked
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
