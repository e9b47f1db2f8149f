//! Library cache fronting the persisted store.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::library::{LibraryBackend, StoredDocument};
use crate::models::Paper;
use crate::normalize::{from_persisted, to_persisted};
use crate::utils::{deduplicate_papers, find_by_key, position_of};

/// The user-visible library
///
/// The cache is authoritative for the session. Every mutation is applied to
/// the cache under the write lock, the lock is released, and the change is
/// then forwarded to the backend. A backend failure is reported as
/// [`Error::PersistenceUnavailable`] but the local change stands.
#[derive(Debug)]
pub struct LibraryStore {
    backend: Arc<dyn LibraryBackend>,
    timeout: Duration,
    cache: RwLock<Vec<Paper>>,
}

impl LibraryStore {
    pub fn new(backend: Arc<dyn LibraryBackend>, timeout: Duration) -> Self {
        Self {
            backend,
            timeout,
            cache: RwLock::new(Vec::new()),
        }
    }

    async fn bounded<T>(&self, action: &str, op: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.timeout, op).await.map_err(|_| {
            Error::PersistenceUnavailable(format!(
                "library store did not answer {} within {:?}",
                action, self.timeout
            ))
        })?
    }

    async fn fetch_remote(&self, user: &str) -> Result<Vec<Paper>> {
        let documents = self.bounded("get_all", self.backend.get_all(user)).await?;
        Ok(documents.iter().filter_map(to_paper).collect())
    }

    /// Replace the cache with the persisted library
    ///
    /// Local favorite and selection flags carry over for records that are
    /// still present. On failure the cache is left as it was.
    pub async fn load_remote(&self, user: &str) -> Result<Vec<Paper>> {
        let mut papers = deduplicate_papers(self.fetch_remote(user).await?);

        let mut cache = self.cache.write().await;
        let flags: HashMap<&str, (bool, bool)> = cache
            .iter()
            .map(|p| (p.id.as_str(), (p.is_favorite, p.is_selected)))
            .collect();
        for paper in &mut papers {
            if let Some((favorite, selected)) = flags.get(paper.id.as_str()) {
                paper.is_favorite = *favorite;
                paper.is_selected = *selected;
            }
        }
        drop(flags);
        *cache = papers;

        tracing::info!(user, count = cache.len(), "Loaded library");
        Ok(cache.clone())
    }

    /// Add a paper
    ///
    /// Papers without an id get a random one, and `dateAdded` is stamped.
    /// Adding a paper that is already cached leaves the cache unchanged; the
    /// cached record is still written to the backend. An id-less paper is
    /// only considered cached when its arXiv id matches.
    pub async fn add(&self, user: &str, paper: Paper) -> Result<Paper> {
        let stored = {
            let mut cache = self.cache.write().await;
            let existing = if paper.id.is_empty() {
                arxiv_position(&cache, &paper)
            } else {
                cache.iter().position(|p| p.id == paper.id)
            };

            match existing {
                Some(idx) => {
                    tracing::debug!(user, paper_id = %cache[idx].id, "Paper already in library");
                    cache[idx].clone()
                }
                None => {
                    let paper = stamp(paper);
                    cache.push(paper.clone());
                    tracing::info!(user, paper_id = %paper.id, "Added paper to library");
                    paper
                }
            }
        };

        self.persist(user, &stored).await?;
        Ok(stored)
    }

    /// Remove a paper by id (or arXiv id, or title)
    ///
    /// On a cache miss the key is resolved against the backend, so the
    /// persisted record is deleted by its stored id either way. Returns
    /// whether a record was found in the cache or the backend.
    pub async fn remove(&self, user: &str, key: &str) -> Result<bool> {
        let removed = {
            let mut cache = self.cache.write().await;
            find_by_key(&cache, key).map(|idx| cache.remove(idx))
        };

        let target = match removed {
            Some(paper) => {
                tracing::info!(user, paper_id = %paper.id, "Removed paper from library");
                Some(paper)
            }
            None => {
                tracing::debug!(user, key, "Paper not cached, resolving against the persisted store");
                let mut remote = self.fetch_remote(user).await?;
                find_by_key(&remote, key).map(|idx| remote.swap_remove(idx))
            }
        };

        let id = target.as_ref().map_or(key, |p| p.id.as_str());
        self.bounded("delete", self.backend.delete(user, id)).await?;
        Ok(target.is_some())
    }

    /// Find a paper, trying the cache before the backend
    ///
    /// A record found only in the backend is returned without being cached.
    pub async fn lookup(&self, user: &str, key: &str) -> Result<Option<Paper>> {
        {
            let cache = self.cache.read().await;
            if let Some(idx) = find_by_key(&cache, key) {
                return Ok(Some(cache[idx].clone()));
            }
        }

        tracing::debug!(user, key, "Library cache miss, asking the persisted store");
        let remote = self.fetch_remote(user).await?;
        Ok(find_by_key(&remote, key).map(|idx| remote[idx].clone()))
    }

    /// All cached papers, in insertion order
    pub async fn list(&self) -> Vec<Paper> {
        self.cache.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }

    /// Mark or unmark a favorite; local only
    pub async fn set_favorite(&self, key: &str, favorite: bool) -> bool {
        self.update_flag(key, |p| p.is_favorite = favorite).await
    }

    /// Select or deselect a paper; local only
    pub async fn set_selected(&self, key: &str, selected: bool) -> bool {
        self.update_flag(key, |p| p.is_selected = selected).await
    }

    /// Ids of the selected papers, in insertion order
    pub async fn selected_ids(&self) -> Vec<String> {
        self.cache
            .read()
            .await
            .iter()
            .filter(|p| p.is_selected)
            .map(|p| p.id.clone())
            .collect()
    }

    async fn update_flag(&self, key: &str, update: impl FnOnce(&mut Paper)) -> bool {
        let mut cache = self.cache.write().await;
        match find_by_key(&cache, key) {
            Some(idx) => {
                update(&mut cache[idx]);
                true
            }
            None => false,
        }
    }

    /// Upsert a freshly analyzed paper
    ///
    /// An existing record is overlaid with the analyzed fields; otherwise the
    /// paper is added. The result is written to the backend either way.
    pub async fn merge_analyzed(&self, user: &str, analyzed: Paper) -> Result<Paper> {
        let merged = {
            let mut cache = self.cache.write().await;
            let existing = if analyzed.id.is_empty() {
                arxiv_position(&cache, &analyzed)
            } else {
                position_of(&cache, &analyzed)
            };
            match existing {
                Some(idx) => {
                    overlay(&mut cache[idx], analyzed);
                    cache[idx].clone()
                }
                None => {
                    let paper = stamp(analyzed);
                    cache.push(paper.clone());
                    paper
                }
            }
        };

        tracing::info!(user, paper_id = %merged.id, "Merged analyzed paper into library");
        self.persist(user, &merged).await?;
        Ok(merged)
    }

    /// Library records followed by search results not already in the library
    pub async fn merged_view(&self, search_results: &[Paper]) -> Vec<Paper> {
        let mut view = self.list().await;
        for paper in search_results {
            if position_of(&view, paper).is_none() {
                view.push(paper.clone());
            }
        }
        view
    }

    async fn persist(&self, user: &str, paper: &Paper) -> Result<()> {
        let document = to_persisted(paper);
        self.bounded("set", self.backend.set(user, &paper.id, &document))
            .await
            .inspect_err(|e| {
                tracing::warn!(user, paper_id = %paper.id, error = %e, "Library write not persisted");
            })
    }
}

/// Id-less records are matched on arXiv id alone; titles are not unique
fn arxiv_position(papers: &[Paper], paper: &Paper) -> Option<usize> {
    let arxiv_id = paper.arxiv_id.as_deref()?;
    papers
        .iter()
        .position(|p| p.arxiv_id.as_deref() == Some(arxiv_id))
}

fn to_paper(document: &StoredDocument) -> Option<Paper> {
    let mut paper = from_persisted(&document.data)?;
    if paper.id.is_empty() {
        paper.id = document.id.clone();
    }
    Some(paper)
}

fn stamp(mut paper: Paper) -> Paper {
    if paper.id.is_empty() {
        paper.id = uuid::Uuid::new_v4().to_string();
    }
    if paper.date_added.is_none() {
        paper.date_added = Some(chrono::Utc::now().to_rfc3339());
    }
    paper
}

/// Present analyzed values win; identity, provenance and local flags stay
fn overlay(existing: &mut Paper, analyzed: Paper) {
    existing.title = analyzed.title;
    if !analyzed.authors.is_empty() {
        existing.authors = analyzed.authors;
    }
    existing.summary = analyzed.summary.or(existing.summary.take());
    existing.published = analyzed.published.or(existing.published.take());
    existing.updated = analyzed.updated.or(existing.updated.take());
    existing.pdf_url = analyzed.pdf_url.or(existing.pdf_url.take());
    existing.arxiv_id = existing.arxiv_id.take().or(analyzed.arxiv_id);
    existing.doi = existing.doi.take().or(analyzed.doi);
    existing.venue = analyzed.venue.or(existing.venue.take());
    if !analyzed.fields_of_study.is_empty() {
        existing.fields_of_study = analyzed.fields_of_study;
    }
    existing.citation_count = existing.citation_count.max(analyzed.citation_count);
    existing.influential_citation_count = existing
        .influential_citation_count
        .max(analyzed.influential_citation_count);
    if analyzed.insights.is_some() {
        existing.insights = analyzed.insights;
    }
}
