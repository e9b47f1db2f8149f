//! # paperlens
//!
//! Search the arXiv feed, enrich results with Semantic Scholar citation data,
//! drive PDF analysis jobs on an external service, and keep the analyzed
//! papers in a per-user library.
//!
//! ## Architecture
//!
//! - [`models`]: Core data structures (Paper, SearchRequest, AnalysisJob)
//! - [`sources`]: Feed and citation adapters behind the `FeedSource` and `CitationLookup` traits
//! - [`normalize`]: Conversion of feed entries, persisted records and analysis results into papers
//! - [`enrichment`]: Concurrent citation enrichment and popularity ordering
//! - [`analysis`]: Analysis service client and the job orchestrator
//! - [`library`]: Session cache over a persisted document store
//! - [`service`]: `PaperService`, the entry point tying everything together
//! - [`utils`]: HTTP client, retry, and deduplication helpers
//! - [`config`]: Configuration management

pub mod analysis;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod library;
pub mod models;
pub mod normalize;
pub mod service;
pub mod sources;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, ErrorCategory, Result};
pub use models::{AnalysisJob, JobStatus, Paper, PaperSource, SearchRequest, SortHint};
pub use service::{Collaborators, PaperService};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
