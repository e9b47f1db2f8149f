//! Client side of the analysis job lifecycle.
//!
//! ```text
//! queued -> processing -> completed
//!                      -> failed
//! queued -> failed
//! ```
//!
//! Each [`AnalysisOrchestrator::wait`] call owns its job and drives it with a
//! cancellable sleep-then-poll loop. The loop ends on a terminal status, on
//! cancellation, on a transport failure, or when the poll budget runs out.
//! It never retries a lost poll.

use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{sleep, timeout_at, Instant};
use tokio_util::sync::CancellationToken;

use crate::analysis::{AnalysisService, AnalysisSubmission, PdfSource};
use crate::config::AnalysisConfig;
use crate::error::{Error, Result};
use crate::models::{AnalysisJob, JobStatus, Paper, PaperSource, Transition};
use crate::normalize::from_analysis;

/// Bounds on how a job is polled
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_polls: u32,
    pub max_wait: Duration,
    /// Bound on a single status request
    pub request_timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from(&AnalysisConfig::default())
    }
}

impl From<&AnalysisConfig> for PollPolicy {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            max_polls: config.max_polls.max(1),
            max_wait: config.max_wait(),
            request_timeout: config.timeout(),
        }
    }
}

/// Submits papers for analysis and follows the resulting jobs
#[derive(Debug)]
pub struct AnalysisOrchestrator {
    service: Arc<dyn AnalysisService>,
    policy: PollPolicy,
    // Latest snapshot per job; wait loops never read their state back from here
    tracked: Mutex<HashMap<String, AnalysisJob>>,
}

impl AnalysisOrchestrator {
    pub fn new(service: Arc<dyn AnalysisService>, policy: PollPolicy) -> Self {
        Self {
            service,
            policy,
            tracked: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Submit a paper by its PDF URL
    ///
    /// A paper without a PDF URL is rejected before anything is sent.
    pub async fn submit(&self, paper: &Paper, uid: Option<&str>) -> Result<AnalysisJob> {
        let pdf_url = match paper.pdf_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => {
                return Err(Error::MissingPdf {
                    title: paper.title.clone(),
                })
            }
        };

        let metadata = json!({
            "id": paper.id,
            "title": paper.title,
            "authors": paper.author_line(),
            "pdf_url": pdf_url,
            "published": paper.published,
            "arxiv_id": paper.arxiv_id,
            "doi": paper.doi,
            "source": paper.source.id(),
        });

        self.send(AnalysisSubmission {
            pdf: PdfSource::Url(pdf_url),
            metadata,
            uid: uid.map(str::to_string),
        })
        .await
    }

    /// Submit a local PDF file
    ///
    /// Returns the job together with the placeholder paper the analysis
    /// result will be laid over. The title defaults to the file stem.
    pub async fn submit_upload(
        &self,
        path: &Path,
        title: Option<&str>,
        uid: Option<&str>,
    ) -> Result<(AnalysisJob, Paper)> {
        let is_file = tokio::fs::metadata(path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(Error::invalid(format!(
                "upload path '{}' is not a readable file",
                path.display()
            )));
        }

        let path = tokio::fs::canonicalize(path)
            .await
            .map_err(|e| Error::invalid(format!("upload path '{}': {}", path.display(), e)))?;

        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_default();
        let paper = Paper::new("", title, PaperSource::Upload);

        let job = self
            .send(AnalysisSubmission {
                pdf: PdfSource::LocalPath(path),
                metadata: json!({ "title": paper.title, "source": "upload" }),
                uid: uid.map(str::to_string),
            })
            .await?;

        Ok((job, paper))
    }

    async fn send(&self, submission: AnalysisSubmission) -> Result<AnalysisJob> {
        let job_id = self
            .service
            .submit(&submission)
            .await
            .map_err(|e| Error::SubmissionFailed(e.to_string()))?;

        let job = AnalysisJob::queued(job_id);
        tracing::info!(job_id = %job.job_id, "Analysis job submitted");
        self.track(&job);
        Ok(job)
    }

    /// One status check
    ///
    /// Jobs already seen in a terminal state are answered from the tracker
    /// without contacting the service.
    pub async fn poll_status(&self, job_id: &str) -> Result<AnalysisJob> {
        let known = self.tracked_job(job_id);
        if let Some(job) = known.as_ref().filter(|j| j.is_terminal()) {
            return Ok(job.clone());
        }

        let report = tokio::time::timeout(self.policy.request_timeout, self.service.status(job_id))
            .await
            .map_err(|_| Error::polling_lost(job_id, "status request timed out"))?
            .map_err(|e| Error::polling_lost(job_id, e.to_string()))?;

        let mut job = known.unwrap_or_else(|| AnalysisJob::queued(job_id));
        job.apply(report);
        self.track(&job);
        Ok(job)
    }

    /// Poll until the job reaches a terminal state
    ///
    /// `on_update` is called once for every observed change in status or
    /// progress, including the terminal one. Returns the completed job, or
    /// [`Error::JobFailed`], [`Error::PollingLost`], or [`Error::Cancelled`].
    pub async fn wait<F>(
        &self,
        mut job: AnalysisJob,
        cancel: &CancellationToken,
        mut on_update: F,
    ) -> Result<AnalysisJob>
    where
        F: FnMut(&AnalysisJob),
    {
        let deadline = Instant::now() + self.policy.max_wait;
        let mut polls = 0u32;

        loop {
            if job.is_terminal() {
                return self.finish(job);
            }

            if polls >= self.policy.max_polls {
                tracing::warn!(job_id = %job.job_id, polls, "Poll budget exhausted");
                return Err(Error::polling_lost(
                    &job.job_id,
                    format!("no terminal status after {} polls", polls),
                ));
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancelled(&job)),
                _ = sleep(self.policy.interval) => {}
            }

            if Instant::now() >= deadline {
                tracing::warn!(job_id = %job.job_id, polls, "Wait time exhausted");
                return Err(Error::polling_lost(
                    &job.job_id,
                    format!("no terminal status within {:?}", self.policy.max_wait),
                ));
            }

            polls += 1;
            let request_deadline = deadline.min(Instant::now() + self.policy.request_timeout);
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancelled(&job)),
                outcome = timeout_at(request_deadline, self.service.status(&job.job_id)) => outcome,
            };

            let report = match outcome {
                Ok(Ok(report)) => report,
                Ok(Err(error)) => {
                    tracing::warn!(job_id = %job.job_id, %error, "Lost contact with analysis job");
                    self.track(&job);
                    return Err(Error::polling_lost(&job.job_id, error.to_string()));
                }
                Err(_) => {
                    self.track(&job);
                    return Err(Error::polling_lost(&job.job_id, "status request timed out"));
                }
            };

            match job.apply(report) {
                Transition::Advanced | Transition::Completed | Transition::Failed => {
                    tracing::debug!(
                        job_id = %job.job_id,
                        status = %job.status,
                        progress = job.progress,
                        "Analysis job advanced"
                    );
                    self.track(&job);
                    on_update(&job);
                }
                Transition::Unchanged | Transition::Ignored => {}
            }
        }
    }

    /// Submit, wait, and return the analyzed paper
    pub async fn run<F>(
        &self,
        paper: &Paper,
        uid: Option<&str>,
        cancel: &CancellationToken,
        on_update: F,
    ) -> Result<Paper>
    where
        F: FnMut(&AnalysisJob),
    {
        let job = self.submit(paper, uid).await?;
        let job = self.wait(job, cancel, on_update).await?;
        Ok(completed_paper(paper, &job))
    }

    fn finish(&self, job: AnalysisJob) -> Result<AnalysisJob> {
        match job.status {
            JobStatus::Completed => {
                tracing::info!(job_id = %job.job_id, "Analysis job completed");
                Ok(job)
            }
            _ => {
                let message = job.error.clone().unwrap_or_default();
                tracing::warn!(job_id = %job.job_id, %message, "Analysis job failed");
                Err(Error::JobFailed {
                    job_id: job.job_id,
                    message,
                })
            }
        }
    }

    fn cancelled(&self, job: &AnalysisJob) -> Error {
        tracing::info!(job_id = %job.job_id, "Stopped waiting for analysis job");
        Error::Cancelled {
            job_id: job.job_id.clone(),
        }
    }

    fn track(&self, job: &AnalysisJob) {
        self.tracked
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(job.job_id.clone(), job.clone());
    }

    /// Latest known snapshot of a job
    pub fn tracked_job(&self, job_id: &str) -> Option<AnalysisJob> {
        self.tracked
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(job_id)
            .cloned()
    }
}

/// The analyzed record for a completed job
///
/// A job without a result leaves the submitted paper unchanged.
pub fn completed_paper(submitted: &Paper, job: &AnalysisJob) -> Paper {
    match &job.result {
        Some(result) => from_analysis(submitted, result),
        None => submitted.clone(),
    }
}
