//! Citation enrichment and popularity sorting.
//!
//! Each paper is looked up by arXiv id, then by DOI. A lookup that errors,
//! times out, or finds nothing only affects its own paper: that paper keeps
//! zero citation counts and the rest of the batch proceeds.

use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CitationConfig;
use crate::models::{Paper, PaperSource};
use crate::sources::{CitationLookup, CitationStats, ExternalId};

/// Augments papers with citation statistics
#[derive(Debug, Clone)]
pub struct Enricher {
    lookup: Arc<dyn CitationLookup>,
    concurrency: usize,
    timeout: Duration,
}

impl Enricher {
    pub fn new(lookup: Arc<dyn CitationLookup>, concurrency: usize, timeout: Duration) -> Self {
        Self {
            lookup,
            concurrency: concurrency.max(1),
            timeout,
        }
    }

    pub fn from_config(lookup: Arc<dyn CitationLookup>, config: &CitationConfig) -> Self {
        Self::new(lookup, config.concurrency, config.timeout())
    }

    /// Enrich a batch; same length, same order
    pub async fn enrich(&self, papers: Vec<Paper>) -> Vec<Paper> {
        let total = papers.len();
        let enriched: Vec<Paper> = stream::iter(papers.into_iter().map(|p| self.enrich_one(p)))
            .buffered(self.concurrency)
            .collect()
            .await;

        let found = enriched
            .iter()
            .filter(|p| p.source == PaperSource::Enrichment)
            .count();
        tracing::info!(count = total, enriched = found, "Citation enrichment finished");
        enriched
    }

    /// Enrich, then sort by citation count
    pub async fn enrich_by_popularity(&self, papers: Vec<Paper>) -> Vec<Paper> {
        let mut papers = self.enrich(papers).await;
        sort_by_popularity(&mut papers);
        papers
    }

    async fn enrich_one(&self, mut paper: Paper) -> Paper {
        for id in lookup_ids(&paper) {
            match tokio::time::timeout(self.timeout, self.lookup.lookup(&id)).await {
                Ok(Ok(Some(stats))) => {
                    apply(&mut paper, stats);
                    return paper;
                }
                Ok(Ok(None)) => {
                    tracing::debug!(paper_id = %paper.id, %id, "No citation record");
                }
                Ok(Err(error)) => {
                    tracing::warn!(paper_id = %paper.id, %id, %error, "Citation lookup failed");
                }
                Err(_) => {
                    tracing::warn!(paper_id = %paper.id, %id, timeout = ?self.timeout, "Citation lookup timed out");
                }
            }
        }
        paper
    }
}

/// Identifiers to try, in order
fn lookup_ids(paper: &Paper) -> Vec<ExternalId> {
    let mut ids = Vec::with_capacity(2);
    if let Some(arxiv_id) = paper.arxiv_id.as_deref().filter(|s| !s.trim().is_empty()) {
        ids.push(ExternalId::Arxiv(strip_version(arxiv_id.trim()).to_string()));
    }
    if let Some(doi) = paper.doi.as_deref().filter(|s| !s.trim().is_empty()) {
        ids.push(ExternalId::Doi(doi.trim().to_string()));
    }
    ids
}

/// `2301.12345v2` -> `2301.12345`; the citation graph indexes unversioned ids
fn strip_version(arxiv_id: &str) -> &str {
    match arxiv_id.rfind('v') {
        Some(pos)
            if pos > 0
                && pos + 1 < arxiv_id.len()
                && arxiv_id[pos + 1..].bytes().all(|b| b.is_ascii_digit()) =>
        {
            &arxiv_id[..pos]
        }
        _ => arxiv_id,
    }
}

fn apply(paper: &mut Paper, stats: CitationStats) {
    paper.citation_count = stats.citation_count;
    paper.influential_citation_count = stats.influential_citation_count;
    if stats.venue.is_some() {
        paper.venue = stats.venue;
    }
    if !stats.fields_of_study.is_empty() {
        paper.fields_of_study = stats.fields_of_study;
    }
    paper.source = PaperSource::Enrichment;
}

/// Sort by citation count descending; ties keep their current order
pub fn sort_by_popularity(papers: &mut [Paper]) {
    papers.sort_by(|a, b| b.citation_count.cmp(&a.citation_count));
}
