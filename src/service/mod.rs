//! The outbound surface: search, analysis, and library operations.
//!
//! [`PaperService`] wires the feed, the enricher, the analysis orchestrator
//! and the library together for one user.

use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::analysis::{
    completed_paper, AnalysisOrchestrator, AnalysisService, ChatReply, ChatRequest,
    HttpAnalysisService, PollPolicy,
};
use crate::config::Config;
use crate::enrichment::Enricher;
use crate::error::{Error, Result};
use crate::library::{FileLibraryBackend, LibraryBackend, LibraryStore};
use crate::models::{AnalysisJob, Paper, SearchRequest};
use crate::normalize::normalize_all;
use crate::sources::{ArxivFeed, CitationLookup, FeedSource, SemanticScholarClient};

/// Collaborators a [`PaperService`] is built from
#[derive(Debug, Clone)]
pub struct Collaborators {
    pub feed: Arc<dyn FeedSource>,
    pub citations: Arc<dyn CitationLookup>,
    pub analysis: Arc<dyn AnalysisService>,
    pub library: Arc<dyn LibraryBackend>,
}

/// Paper discovery and analysis for one user
#[derive(Debug)]
pub struct PaperService {
    user: String,
    feed: Arc<dyn FeedSource>,
    enricher: Enricher,
    analysis: Arc<dyn AnalysisService>,
    orchestrator: AnalysisOrchestrator,
    library: LibraryStore,
    max_results_cap: usize,
}

impl PaperService {
    /// Build from explicit collaborators
    pub fn new(collaborators: Collaborators, config: &Config, user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            feed: collaborators.feed,
            enricher: Enricher::from_config(collaborators.citations, &config.citations),
            orchestrator: AnalysisOrchestrator::new(
                collaborators.analysis.clone(),
                PollPolicy::from(&config.analysis),
            ),
            analysis: collaborators.analysis,
            library: LibraryStore::new(collaborators.library, config.library.timeout()),
            max_results_cap: config.feed.max_results_cap.max(1),
        }
    }

    /// Build the production stack: arXiv, Semantic Scholar, the HTTP
    /// analysis service and the file-backed library
    pub fn from_config(config: &Config, user: impl Into<String>) -> Result<Self> {
        let collaborators = Collaborators {
            feed: Arc::new(ArxivFeed::new(&config.feed)?),
            citations: Arc::new(SemanticScholarClient::new(&config.citations)?),
            analysis: Arc::new(HttpAnalysisService::new(&config.analysis)?),
            library: Arc::new(FileLibraryBackend::new(&config.library.directory)),
        };
        Ok(Self::new(collaborators, config, user))
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn feed_name(&self) -> &str {
        self.feed.name()
    }

    /// Search the feed
    ///
    /// Citation enrichment runs only for the `popular` sort, which then
    /// orders by citation count. Invalid requests fail before any call.
    pub async fn search(&self, request: SearchRequest) -> Result<Vec<Paper>> {
        request.validate()?;
        let request = if request.max_results > self.max_results_cap {
            tracing::debug!(
                requested = request.max_results,
                cap = self.max_results_cap,
                "Clamping max_results"
            );
            let cap = self.max_results_cap;
            request.max_results(cap)
        } else {
            request
        };

        let entries = self.feed.fetch(&request).await?;
        let papers = normalize_all(entries);
        tracing::info!(count = papers.len(), sort = %request.sort, "Search finished");

        if request.wants_enrichment() {
            Ok(self.enricher.enrich_by_popularity(papers).await)
        } else {
            Ok(papers)
        }
    }

    /// Search from a loosely-typed payload (`mode` is `query` or `category`)
    pub async fn search_params(&self, mode: &str, params: &Value) -> Result<Vec<Paper>> {
        self.search(SearchRequest::from_params(mode, params)?).await
    }

    /// Submit a paper for analysis
    pub async fn submit_analysis(&self, paper: &Paper) -> Result<AnalysisJob> {
        self.orchestrator.submit(paper, Some(&self.user)).await
    }

    /// One status check for a job
    pub async fn poll_status(&self, job_id: &str) -> Result<AnalysisJob> {
        self.orchestrator.poll_status(job_id).await
    }

    /// Wait for a submitted job, then merge the analyzed paper into the library
    pub async fn complete_analysis<F>(
        &self,
        submitted: &Paper,
        job: AnalysisJob,
        cancel: &CancellationToken,
        on_update: F,
    ) -> Result<Paper>
    where
        F: FnMut(&AnalysisJob),
    {
        let job = self.orchestrator.wait(job, cancel, on_update).await?;
        let analyzed = completed_paper(submitted, &job);

        match self.library.merge_analyzed(&self.user, analyzed.clone()).await {
            Ok(merged) => Ok(merged),
            Err(Error::PersistenceUnavailable(reason)) => {
                tracing::warn!(
                    job_id = %job.job_id,
                    %reason,
                    "Analyzed paper kept in session library only"
                );
                self.library
                    .lookup(&self.user, &analyzed.id)
                    .await
                    .ok()
                    .flatten()
                    .map_or(Ok(analyzed), Ok)
            }
            Err(e) => Err(e),
        }
    }

    /// Submit, wait, and merge into the library
    pub async fn analyze<F>(
        &self,
        paper: &Paper,
        cancel: &CancellationToken,
        on_update: F,
    ) -> Result<Paper>
    where
        F: FnMut(&AnalysisJob),
    {
        let job = self.submit_analysis(paper).await?;
        self.complete_analysis(paper, job, cancel, on_update).await
    }

    /// Analyze a local PDF file
    pub async fn analyze_upload<F>(
        &self,
        path: &Path,
        title: Option<&str>,
        cancel: &CancellationToken,
        on_update: F,
    ) -> Result<Paper>
    where
        F: FnMut(&AnalysisJob),
    {
        let (job, placeholder) = self
            .orchestrator
            .submit_upload(path, title, Some(&self.user))
            .await?;
        self.complete_analysis(&placeholder, job, cancel, on_update)
            .await
    }

    /// First search result that can be analyzed
    pub async fn first_analyzable(&self, request: SearchRequest) -> Result<Paper> {
        let papers = self.search(request).await?;
        match papers.iter().find(|p| p.is_analyzable()) {
            Some(paper) => Ok(paper.clone()),
            None => match papers.into_iter().next() {
                Some(first) => Err(Error::MissingPdf { title: first.title }),
                None => Err(Error::invalid("search returned no papers to analyze")),
            },
        }
    }

    /// Load the persisted library into the session cache
    pub async fn library_load(&self) -> Result<Vec<Paper>> {
        self.library.load_remote(&self.user).await
    }

    pub async fn library_add(&self, paper: Paper) -> Result<Paper> {
        self.library.add(&self.user, paper).await
    }

    pub async fn library_remove(&self, key: &str) -> Result<bool> {
        self.library.remove(&self.user, key).await
    }

    pub async fn library_list(&self) -> Vec<Paper> {
        self.library.list().await
    }

    pub async fn library_get(&self, key: &str) -> Result<Option<Paper>> {
        self.library.lookup(&self.user, key).await
    }

    pub async fn library_set_favorite(&self, key: &str, favorite: bool) -> bool {
        self.library.set_favorite(key, favorite).await
    }

    pub async fn library_set_selected(&self, key: &str, selected: bool) -> bool {
        self.library.set_selected(key, selected).await
    }

    /// Library records followed by search results not already saved
    pub async fn library_view(&self, search_results: &[Paper]) -> Vec<Paper> {
        self.library.merged_view(search_results).await
    }

    /// Ask a question about the selected library papers
    ///
    /// Selected papers are sent as context, in library order. With nothing
    /// selected the service answers from everything it has analyzed.
    pub async fn chat(&self, message: &str) -> Result<ChatReply> {
        let message = message.trim();
        if message.is_empty() {
            return Err(Error::invalid("chat message must not be empty"));
        }

        let request = ChatRequest {
            uid: Some(self.user.clone()),
            message: message.to_string(),
            context_ids: self.library.selected_ids().await,
        };
        tracing::info!(user = %self.user, context = request.context_ids.len(), "Sending chat question");

        let reply = self
            .analysis
            .chat(&request)
            .await
            .map_err(|e| Error::ChatFailed(e.to_string()))?;
        tracing::debug!(sources = reply.sources.len(), "Chat answered");
        Ok(reply)
    }
}
