//! Analysis job state machine.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Lifecycle state of an analysis job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Completed and failed jobs never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One status response from the analysis service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: JobStatus,
    #[serde(default, deserialize_with = "progress_from_number")]
    pub progress: Option<u8>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl StatusReport {
    pub fn processing(progress: u8) -> Self {
        Self {
            status: JobStatus::Processing,
            progress: Some(progress),
            result: None,
            error: None,
        }
    }

    pub fn completed(result: Value) -> Self {
        Self {
            status: JobStatus::Completed,
            progress: Some(100),
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            progress: None,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Accept integer or fractional progress, clamped to 0..=100
fn progress_from_number<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<f64> = Option::deserialize(deserializer)?;
    Ok(raw
        .filter(|p| p.is_finite())
        .map(|p| p.round().clamp(0.0, 100.0) as u8))
}

/// What applying a report did to a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing observable changed
    Unchanged,
    /// Status or progress moved forward
    Advanced,
    /// The job completed with a result
    Completed,
    /// The job failed
    Failed,
    /// The job was already terminal; the report was dropped
    Ignored,
}

/// Client-side view of an analysis job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisJob {
    pub job_id: String,
    pub status: JobStatus,
    /// 0..=100; never decreases
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisJob {
    /// A freshly submitted job
    pub fn queued(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Queued,
            progress: 0,
            result: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Fold one status report into the job
    pub fn apply(&mut self, report: StatusReport) -> Transition {
        if self.is_terminal() {
            return Transition::Ignored;
        }

        match report.status {
            JobStatus::Queued => Transition::Unchanged,
            JobStatus::Processing => {
                let before = (self.status, self.progress);
                self.status = JobStatus::Processing;
                if let Some(progress) = report.progress {
                    if progress < self.progress {
                        tracing::debug!(
                            job_id = %self.job_id,
                            reported = progress,
                            current = self.progress,
                            "Ignoring progress regression"
                        );
                    }
                    self.progress = self.progress.max(progress);
                }
                if before == (self.status, self.progress) {
                    Transition::Unchanged
                } else {
                    Transition::Advanced
                }
            }
            JobStatus::Completed => match report.result {
                Some(result) => {
                    self.status = JobStatus::Completed;
                    self.progress = 100;
                    self.result = Some(result);
                    Transition::Completed
                }
                None => {
                    self.status = JobStatus::Failed;
                    self.error =
                        Some("analysis service reported completion without a result".to_string());
                    Transition::Failed
                }
            },
            JobStatus::Failed => {
                self.status = JobStatus::Failed;
                self.error = Some(
                    report
                        .error
                        .unwrap_or_else(|| "analysis service gave no reason".to_string()),
                );
                Transition::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_progress_never_decreases() {
        let mut job = AnalysisJob::queued("j1");
        assert_eq!(job.apply(StatusReport::processing(40)), Transition::Advanced);
        assert_eq!(job.apply(StatusReport::processing(30)), Transition::Unchanged);
        assert_eq!(job.progress, 40);
        assert_eq!(job.apply(StatusReport::processing(55)), Transition::Advanced);
        assert_eq!(job.progress, 55);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut job = AnalysisJob::queued("j1");
        job.apply(StatusReport::completed(json!({ "summary": {} })));
        assert_eq!(job.status, JobStatus::Completed);

        assert_eq!(job.apply(StatusReport::failed("late")), Transition::Ignored);
        assert_eq!(job.apply(StatusReport::processing(10)), Transition::Ignored);
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.error.is_none());
    }

    #[test]
    fn test_queued_to_failed() {
        let mut job = AnalysisJob::queued("j1");
        assert_eq!(job.apply(StatusReport::failed("bad pdf")), Transition::Failed);
        assert_eq!(job.error.as_deref(), Some("bad pdf"));
    }

    #[test]
    fn test_completed_without_result_fails() {
        let mut job = AnalysisJob::queued("j1");
        let report = StatusReport {
            status: JobStatus::Completed,
            progress: None,
            result: None,
            error: None,
        };
        assert_eq!(job.apply(report), Transition::Failed);
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[test]
    fn test_report_deserialization() {
        let report: StatusReport =
            serde_json::from_value(json!({ "status": "processing", "progress": 42.6 })).unwrap();
        assert_eq!(report.progress, Some(43));

        let report: StatusReport =
            serde_json::from_value(json!({ "status": "processing", "progress": 250 })).unwrap();
        assert_eq!(report.progress, Some(100));

        let report: StatusReport =
            serde_json::from_value(json!({ "status": "failed", "error": "boom" })).unwrap();
        assert_eq!(report.error.as_deref(), Some("boom"));
        assert_eq!(report.progress, None);
    }
}
