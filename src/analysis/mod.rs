//! Paper analysis jobs.
//!
//! The analysis engine itself is an external service reached through
//! [`AnalysisService`]. [`AnalysisOrchestrator`] owns the client side of the
//! job lifecycle: submission, polling with cancellation and bounded waiting,
//! and turning a completed result into a canonical paper. The same service
//! answers questions about analyzed papers ([`ChatRequest`]).

mod chat;
mod client;
pub mod mock;
mod orchestrator;

pub use chat::{ChatReply, ChatRequest, ChatSource};
pub use client::HttpAnalysisService;
pub use mock::MockAnalysisService;
pub use orchestrator::{completed_paper, AnalysisOrchestrator, PollPolicy};

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::PathBuf;

use crate::models::StatusReport;

/// Transport-level failures talking to the analysis service
#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceError {
    #[error("analysis service unreachable: {0}")]
    Unreachable(String),

    #[error("analysis service returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("unexpected response from analysis service: {0}")]
    Malformed(String),
}

/// Where the service should read the PDF from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfSource {
    Url(String),
    LocalPath(PathBuf),
}

/// One submission to the analysis service
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSubmission {
    pub pdf: PdfSource,
    pub metadata: Value,
    pub uid: Option<String>,
}

impl AnalysisSubmission {
    /// The JSON body sent to the submission endpoint
    pub fn to_payload(&self) -> Value {
        let mut payload = match &self.pdf {
            PdfSource::Url(url) => json!({ "pdfUrl": url }),
            PdfSource::LocalPath(path) => json!({ "pdfSourcePath": path.to_string_lossy() }),
        };
        payload["metadata"] = self.metadata.clone();
        if let Some(uid) = &self.uid {
            payload["uid"] = json!(uid);
        }
        payload
    }
}

/// The external analysis service
#[async_trait]
pub trait AnalysisService: Send + Sync + std::fmt::Debug {
    /// Submit a paper; returns the job id assigned by the service
    async fn submit(&self, submission: &AnalysisSubmission) -> Result<String, ServiceError>;

    /// Fetch the current status of a job
    async fn status(&self, job_id: &str) -> Result<StatusReport, ServiceError>;

    /// Ask a question grounded in previously analyzed papers
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, ServiceError>;
}
