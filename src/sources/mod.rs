//! External data sources.
//!
//! Two boundaries live here:
//!
//! - [`FeedSource`]: the bibliographic feed, returning raw entries in the
//!   feed's native shape. [`ArxivFeed`] speaks the arXiv Atom API.
//! - [`CitationLookup`]: the citation graph, keyed by an [`ExternalId`].
//!   [`SemanticScholarClient`] speaks the Semantic Scholar graph API.
//!
//! Raw entries are turned into canonical papers by [`crate::normalize`].

mod arxiv;
pub mod mock;
mod semantic;

pub use arxiv::{parse_feed, ArxivFeed};
pub use mock::{MockCitations, MockFeed};
pub use semantic::SemanticScholarClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::SearchRequest;

/// One author element of a feed entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAuthor {
    pub name: Option<String>,
}

/// One link element of a feed entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLink {
    pub href: String,
    pub link_type: Option<String>,
    pub title: Option<String>,
}

/// A feed entry before normalization
///
/// Every field is optional; the feed omits whatever it likes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntry {
    pub id: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub published: Option<String>,
    pub updated: Option<String>,
    pub authors: Vec<RawAuthor>,
    pub links: Vec<RawLink>,
    /// The feed's own DOI extension element (`arxiv:doi`)
    pub arxiv_doi: Option<String>,
    /// A generic, unprefixed `doi` element
    pub doi: Option<String>,
}

/// The bibliographic feed
#[async_trait]
pub trait FeedSource: Send + Sync + std::fmt::Debug {
    /// Human-readable name of the feed
    fn name(&self) -> &str;

    /// Execute a validated search and return raw entries in feed order
    ///
    /// Any transport or parse failure fails the whole request with
    /// [`crate::Error::SourceUnavailable`].
    async fn fetch(&self, request: &SearchRequest) -> Result<Vec<RawEntry>>;
}

/// Identifier namespaces understood by the citation graph
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExternalId {
    Arxiv(String),
    Doi(String),
}

impl std::fmt::Display for ExternalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExternalId::Arxiv(id) => write!(f, "arXiv:{}", id),
            ExternalId::Doi(doi) => write!(f, "DOI:{}", doi),
        }
    }
}

/// Citation statistics for one paper
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CitationStats {
    pub citation_count: u64,
    pub influential_citation_count: u64,
    pub venue: Option<String>,
    pub fields_of_study: Vec<String>,
}

/// The citation graph
#[async_trait]
pub trait CitationLookup: Send + Sync + std::fmt::Debug {
    /// Look up one paper
    ///
    /// `Ok(None)` means the graph has no record for this identifier.
    /// Transport failures are [`crate::Error::EnrichmentUnavailable`].
    async fn lookup(&self, id: &ExternalId) -> Result<Option<CitationStats>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_id_namespaces() {
        assert_eq!(
            ExternalId::Arxiv("2301.00001v2".to_string()).to_string(),
            "arXiv:2301.00001v2"
        );
        assert_eq!(
            ExternalId::Doi("10.1000/xyz".to_string()).to_string(),
            "DOI:10.1000/xyz"
        );
    }
}
