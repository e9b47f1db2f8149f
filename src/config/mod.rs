//! Configuration management.
//!
//! Configuration is read from a TOML file and overridden by environment
//! variables of the form `PAPERLENS__<SECTION>__<KEY>`:
//!
//! ```toml
//! [feed]
//! base_url = "http://export.arxiv.org/api/query"
//! timeout_secs = 30
//! max_results_cap = 200
//!
//! [citations]
//! api_key = "your-api-key"
//! concurrency = 4
//!
//! [analysis]
//! base_url = "http://127.0.0.1:8000"
//! poll_interval_ms = 1000
//! max_polls = 900
//!
//! [library]
//! directory = "~/.local/share/paperlens/library"
//!
//! [logging]
//! level = "info"
//! format = "plain"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::RetryConfig;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "PAPERLENS";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub citations: CitationConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub library: LibraryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Bibliographic feed settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_feed_url")]
    pub base_url: String,

    #[serde(default = "default_feed_timeout")]
    pub timeout_secs: u64,

    /// Requests for more results than this are clamped
    #[serde(default = "default_max_results_cap")]
    pub max_results_cap: usize,

    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_initial_delay_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: default_feed_url(),
            timeout_secs: default_feed_timeout(),
            max_results_cap: default_max_results_cap(),
            retry_attempts: default_retry_attempts(),
            retry_initial_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl FeedConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig::default()
            .max_attempts(self.retry_attempts)
            .initial_delay(Duration::from_millis(self.retry_initial_delay_ms))
    }
}

fn default_feed_url() -> String {
    "http://export.arxiv.org/api/query".to_string()
}

fn default_feed_timeout() -> u64 {
    30
}

fn default_max_results_cap() -> usize {
    200
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

/// Citation graph settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationConfig {
    #[serde(default = "default_citation_url")]
    pub base_url: String,

    /// Semantic Scholar API key (optional, for higher rate limits)
    #[serde(default = "default_api_key")]
    pub api_key: Option<String>,

    #[serde(default = "default_citation_timeout")]
    pub timeout_secs: u64,

    /// Maximum lookups in flight for one batch
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for CitationConfig {
    fn default() -> Self {
        Self {
            base_url: default_citation_url(),
            api_key: default_api_key(),
            timeout_secs: default_citation_timeout(),
            concurrency: default_concurrency(),
        }
    }
}

impl CitationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_citation_url() -> String {
    "https://api.semanticscholar.org/graph/v1".to_string()
}

fn default_api_key() -> Option<String> {
    std::env::var("SEMANTIC_SCHOLAR_API_KEY").ok()
}

fn default_citation_timeout() -> u64 {
    10
}

fn default_concurrency() -> usize {
    4
}

/// Analysis service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_analysis_url")]
    pub base_url: String,

    #[serde(default = "default_analysis_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Polls before giving up on a job
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,

    /// Wall-clock bound on waiting for a job
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            base_url: default_analysis_url(),
            timeout_secs: default_analysis_timeout(),
            poll_interval_ms: default_poll_interval_ms(),
            max_polls: default_max_polls(),
            max_wait_secs: default_max_wait_secs(),
        }
    }
}

impl AnalysisConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }
}

fn default_analysis_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_analysis_timeout() -> u64 {
    30
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_polls() -> u32 {
    900
}

fn default_max_wait_secs() -> u64 {
    1800
}

/// Persisted library settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    #[serde(default = "default_library_dir")]
    pub directory: PathBuf,

    #[serde(default = "default_library_timeout")]
    pub timeout_secs: u64,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            directory: default_library_dir(),
            timeout_secs: default_library_timeout(),
        }
    }
}

impl LibraryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Default library directory
pub fn default_library_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("paperlens")
        .join("library")
}

fn default_library_timeout() -> u64 {
    10
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to render configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl Config {
    /// Reject settings that would make calls unbounded or impossible
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("feed.base_url", &self.feed.base_url),
            ("citations.base_url", &self.citations.base_url),
            ("analysis.base_url", &self.analysis.base_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| ConfigError::Invalid(format!("{} '{}': {}", name, value, e)))?;
        }

        for (name, value) in [
            ("feed.timeout_secs", self.feed.timeout_secs),
            ("citations.timeout_secs", self.citations.timeout_secs),
            ("analysis.timeout_secs", self.analysis.timeout_secs),
            ("analysis.max_wait_secs", self.analysis.max_wait_secs),
            ("library.timeout_secs", self.library.timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} must be greater than 0", name)));
            }
        }

        if self.citations.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "citations.concurrency must be greater than 0".to_string(),
            ));
        }
        if self.analysis.max_polls == 0 {
            return Err(ConfigError::Invalid(
                "analysis.max_polls must be greater than 0".to_string(),
            ));
        }
        if self.feed.max_results_cap == 0 {
            return Err(ConfigError::Invalid(
                "feed.max_results_cap must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Render as TOML, for writing a starter file
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Load configuration from a file, with environment overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?;

    let config: Config = settings.try_deserialize()?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from environment variables and defaults only
pub fn load_from_env() -> Result<Config, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?;

    let config: Config = settings.try_deserialize()?;
    config.validate()?;
    Ok(config)
}

/// Find a configuration file in the default locations
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("paperlens.toml");
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("paperlens").join("config.toml"))
        .filter(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.feed.max_results_cap, 200);
        assert_eq!(config.analysis.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.citations.concurrency, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("paperlens.toml");

        let toml_content = r#"
[feed]
base_url = "http://localhost:9000/api/query"
max_results_cap = 50

[citations]
api_key = "test-key"
concurrency = 2

[analysis]
poll_interval_ms = 250
max_polls = 10

[library]
directory = "/tmp/paperlens-test"

[logging]
level = "debug"
format = "json"
"#;

        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(toml_content.as_bytes()).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.feed.base_url, "http://localhost:9000/api/query");
        assert_eq!(config.feed.max_results_cap, 50);
        assert_eq!(config.feed.timeout_secs, 30);
        assert_eq!(config.citations.api_key.as_deref(), Some("test-key"));
        assert_eq!(config.analysis.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.analysis.max_polls, 10);
        assert_eq!(config.library.directory, PathBuf::from("/tmp/paperlens-test"));
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_config_round_trip_through_toml() {
        let mut config = Config::default();
        config.citations.api_key = None;
        config.analysis.max_polls = 42;

        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, config.to_toml().unwrap()).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.analysis.max_polls, 42);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.analysis.base_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.analysis.max_polls = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.citations.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_file_nonexistent() {
        let result = load_config(Path::new("/nonexistent/paperlens.toml"));
        assert!(result.is_err());
    }
}
