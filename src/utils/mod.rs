//! Utility modules shared by the adapters and stores.
//!
//! - [`HttpClient`]: reqwest client with bounded request timeouts
//! - [`with_retry`]: execute an operation with automatic retry on transient errors
//! - [`find_by_key`], [`is_same_paper`], [`deduplicate_papers`]: paper identity rules
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use paperlens::utils::{with_retry, RetryConfig};
//!
//! # async fn fetch() -> Result<String, reqwest::Error> { Ok("data".to_string()) }
//! # #[tokio::main]
//! # async fn main() -> Result<(), reqwest::Error> {
//! let config = RetryConfig::default().max_attempts(3);
//! let _body = with_retry(config, fetch).await?;
//! # Ok(())
//! # }
//! ```

mod dedup;
mod http;
mod retry;

pub use dedup::{deduplicate_papers, find_by_key, is_same_paper, normalize_title, position_of};
pub use http::HttpClient;
pub use retry::{with_retry, RetryConfig, Transient};
