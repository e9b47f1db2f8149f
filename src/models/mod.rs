//! Core data models for papers, searches, and analysis jobs.

mod job;
mod paper;
mod search;

pub use job::{AnalysisJob, JobStatus, StatusReport, Transition};
pub use paper::{Paper, PaperBuilder, PaperSource, UNKNOWN_AUTHOR, UNTITLED};
pub use search::{SearchMode, SearchRequest, SortHint, DEFAULT_MAX_RESULTS};
