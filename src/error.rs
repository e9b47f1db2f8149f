//! Error types shared by every component.
//!
//! Each variant corresponds to one failure class the caller can act on. Per-record
//! failures ([`Error::EnrichmentUnavailable`]) are produced by adapters but absorbed
//! by the enricher; everything else propagates.

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by paperlens operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad caller input, detected before any network call
    #[error("Invalid search parameters: {0}")]
    InvalidParameters(String),

    /// The bibliographic feed could not be reached or its document could not be read
    #[error("Paper feed unavailable: {0}")]
    SourceUnavailable(String),

    /// Citation data could not be fetched for a single record
    #[error("Citation data unavailable: {0}")]
    EnrichmentUnavailable(String),

    /// The paper has no PDF URL and cannot be sent for analysis
    #[error("Paper '{title}' has no PDF link and cannot be analyzed")]
    MissingPdf { title: String },

    /// The analysis service rejected the submission or could not be reached
    #[error("Analysis submission failed: {0}")]
    SubmissionFailed(String),

    /// Contact with a running job was lost (transport failure or poll budget exhausted)
    #[error("Lost contact with analysis job {job_id}: {reason}")]
    PollingLost { job_id: String, reason: String },

    /// The analysis service reported that the job itself failed
    #[error("Analysis job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },

    /// The caller stopped waiting for a job
    #[error("Stopped waiting for analysis job {job_id}")]
    Cancelled { job_id: String },

    /// The analysis service could not answer a chat question
    #[error("Chat request failed: {0}")]
    ChatFailed(String),

    /// The persisted library store could not be reached
    #[error("Library store unavailable: {0}")]
    PersistenceUnavailable(String),

    /// The shared HTTP client could not be constructed
    #[error("Failed to initialize HTTP client: {0}")]
    HttpClient(String),
}

/// Coarse grouping of errors, used for exit codes and log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The caller supplied something unusable
    Caller,
    /// A whole-batch boundary call failed
    Boundary,
    /// A single record degraded
    PerRecord,
    /// A job ended without a result
    Job,
}

impl Error {
    /// Categorize this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidParameters(_) | Error::MissingPdf { .. } => ErrorCategory::Caller,
            Error::SourceUnavailable(_)
            | Error::SubmissionFailed(_)
            | Error::ChatFailed(_)
            | Error::PersistenceUnavailable(_)
            | Error::HttpClient(_) => ErrorCategory::Boundary,
            Error::EnrichmentUnavailable(_) => ErrorCategory::PerRecord,
            Error::PollingLost { .. } | Error::JobFailed { .. } | Error::Cancelled { .. } => {
                ErrorCategory::Job
            }
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidParameters(message.into())
    }

    pub(crate) fn polling_lost(job_id: &str, reason: impl Into<String>) -> Self {
        Error::PollingLost {
            job_id: job_id.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_specific() {
        let errors = [
            Error::invalid("sort must be one of all, recent, popular"),
            Error::SourceUnavailable("connection refused".to_string()),
            Error::EnrichmentUnavailable("arXiv:2301.00001".to_string()),
            Error::MissingPdf {
                title: "A Paper".to_string(),
            },
            Error::SubmissionFailed("HTTP 422".to_string()),
            Error::polling_lost("job-1", "timed out"),
            Error::JobFailed {
                job_id: "job-1".to_string(),
                message: "PDF could not be parsed".to_string(),
            },
            Error::Cancelled {
                job_id: "job-1".to_string(),
            },
            Error::ChatFailed("HTTP 500".to_string()),
            Error::PersistenceUnavailable("disk full".to_string()),
        ];

        let mut seen = std::collections::HashSet::new();
        for err in &errors {
            let message = err.to_string();
            assert!(!message.to_lowercase().contains("something went wrong"));
            let prefix = message.split(':').next().unwrap_or_default().to_string();
            assert!(seen.insert(prefix), "duplicate message prefix: {}", message);
        }
    }

    #[test]
    fn test_job_failed_carries_service_message() {
        let err = Error::JobFailed {
            job_id: "abc".to_string(),
            message: "Out of memory while embedding".to_string(),
        };
        assert!(err.to_string().ends_with("Out of memory while embedding"));
        assert_eq!(err.category(), ErrorCategory::Job);
    }

    #[test]
    fn test_categories() {
        assert_eq!(Error::invalid("x").category(), ErrorCategory::Caller);
        assert_eq!(
            Error::SourceUnavailable("x".into()).category(),
            ErrorCategory::Boundary
        );
        assert_eq!(
            Error::EnrichmentUnavailable("x".into()).category(),
            ErrorCategory::PerRecord
        );
        assert_eq!(
            Error::polling_lost("j", "x").category(),
            ErrorCategory::Job
        );
    }
}
