//! Semantic Scholar citation graph client.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::CitationConfig;
use crate::error::{Error, Result};
use crate::sources::{CitationLookup, CitationStats, ExternalId};
use crate::utils::HttpClient;

/// Fields requested for every lookup
const LOOKUP_FIELDS: &str = "citationCount,influentialCitationCount,venue,year,fieldsOfStudy";

/// Semantic Scholar graph API client
///
/// An API key is optional; without one the public rate limits apply.
#[derive(Debug, Clone)]
pub struct SemanticScholarClient {
    client: HttpClient,
    base_url: String,
    api_key: Option<String>,
}

impl SemanticScholarClient {
    /// Create a client from configuration
    pub fn new(config: &CitationConfig) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(config.timeout())?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config
                .api_key
                .clone()
                .filter(|key| !key.trim().is_empty()),
        })
    }

    /// The namespace colon and DOI slashes stay literal in the path
    fn build_url(&self, id: &ExternalId) -> String {
        let encoded = urlencoding::encode(&id.to_string())
            .replace("%3A", ":")
            .replace("%2F", "/");
        format!("{}/paper/{}?fields={}", self.base_url, encoded, LOOKUP_FIELDS)
    }

    /// Add API key to request headers if available
    fn add_api_key_if_present(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(ref key) = self.api_key {
            builder.header("x-api-key", key)
        } else {
            builder
        }
    }
}

#[async_trait]
impl CitationLookup for SemanticScholarClient {
    async fn lookup(&self, id: &ExternalId) -> Result<Option<CitationStats>> {
        let url = self.build_url(id);

        let response = self
            .add_api_key_if_present(self.client.get(&url))
            .send()
            .await
            .map_err(|e| Error::EnrichmentUnavailable(format!("{}: {}", id, e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(%id, "No citation record");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Error::EnrichmentUnavailable(format!(
                "{}: Semantic Scholar returned status {}",
                id, status
            )));
        }

        let data: S2Paper = response
            .json()
            .await
            .map_err(|e| Error::EnrichmentUnavailable(format!("{}: invalid response: {}", id, e)))?;

        Ok(Some(data.into()))
    }
}

// ===== Semantic Scholar API Types =====

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct S2Paper {
    citation_count: Option<u64>,
    influential_citation_count: Option<u64>,
    venue: Option<String>,
    fields_of_study: Option<Vec<String>>,
}

impl From<S2Paper> for CitationStats {
    fn from(data: S2Paper) -> Self {
        Self {
            citation_count: data.citation_count.unwrap_or(0),
            influential_citation_count: data.influential_citation_count.unwrap_or(0),
            venue: data.venue.filter(|v| !v.trim().is_empty()),
            fields_of_study: data.fields_of_study.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client(base: &str, api_key: Option<&str>) -> SemanticScholarClient {
        SemanticScholarClient::new(&CitationConfig {
            base_url: base.to_string(),
            api_key: api_key.map(str::to_string),
            timeout_secs: 5,
            concurrency: 2,
        })
        .unwrap()
    }

    #[test]
    fn test_build_url_keeps_doi_path() {
        let c = client("http://s2.test/graph/v1/", None);
        assert_eq!(
            c.build_url(&ExternalId::Doi("10.18653/v1/N18-3011".into())),
            format!(
                "http://s2.test/graph/v1/paper/DOI:10.18653/v1/N18-3011?fields={}",
                LOOKUP_FIELDS
            )
        );
    }

    #[tokio::test]
    async fn test_lookup_arxiv() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/paper/arXiv:2301.12345v1")
            .match_query(Matcher::UrlEncoded("fields".into(), LOOKUP_FIELDS.into()))
            .match_header("x-api-key", "secret")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"paperId":"abc","citationCount":120,"influentialCitationCount":7,
                    "venue":"NeurIPS","year":2023,"fieldsOfStudy":["Computer Science"]}"#,
            )
            .create_async()
            .await;

        let stats = client(&server.url(), Some("secret"))
            .lookup(&ExternalId::Arxiv("2301.12345v1".into()))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(stats.citation_count, 120);
        assert_eq!(stats.influential_citation_count, 7);
        assert_eq!(stats.venue.as_deref(), Some("NeurIPS"));
        assert_eq!(stats.fields_of_study, vec!["Computer Science"]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_lookup_not_found_is_no_data() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", Matcher::Regex(r"^/paper/DOI:".into()))
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error":"Paper with id DOI:10.1/x not found"}"#)
            .create_async()
            .await;

        let result = client(&server.url(), None)
            .lookup(&ExternalId::Doi("10.1/x".into()))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_lookup_null_counts_default_to_zero() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/paper/arXiv:1")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"citationCount":null,"venue":""}"#)
            .create_async()
            .await;

        let stats = client(&server.url(), None)
            .lookup(&ExternalId::Arxiv("1".into()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats, CitationStats::default());
    }

    #[tokio::test]
    async fn test_lookup_server_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/paper/arXiv:1")
            .match_query(Matcher::Any)
            .with_status(429)
            .create_async()
            .await;

        let result = client(&server.url(), None)
            .lookup(&ExternalId::Arxiv("1".into()))
            .await;
        assert!(matches!(result, Err(Error::EnrichmentUnavailable(_))));
    }
}
