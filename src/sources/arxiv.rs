//! arXiv Atom feed adapter.

use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;

use crate::config::FeedConfig;
use crate::error::{Error, Result};
use crate::models::{SearchMode, SearchRequest, SortHint};
use crate::sources::{FeedSource, RawAuthor, RawEntry, RawLink};
use crate::utils::{with_retry, HttpClient, RetryConfig, Transient};

/// Namespace of the arXiv Atom extensions (`arxiv:doi`, `arxiv:comment`, ...)
const ARXIV_NS: &[u8] = b"http://arxiv.org/schema/2008/an";

/// arXiv search API client
#[derive(Debug, Clone)]
pub struct ArxivFeed {
    client: HttpClient,
    base_url: String,
    max_results_cap: usize,
    retry: RetryConfig,
}

/// Failure of a single fetch attempt
#[derive(Debug, thiserror::Error)]
enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("arXiv API returned status {0}")]
    Status(reqwest::StatusCode),
}

impl Transient for FetchError {
    fn is_transient(&self) -> bool {
        match self {
            FetchError::Transport(e) => e.is_transient(),
            FetchError::Status(status) => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
        }
    }
}

impl ArxivFeed {
    /// Create a feed client from configuration
    pub fn new(config: &FeedConfig) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(config.timeout())?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_results_cap: config.max_results_cap.max(1),
            retry: config.retry(),
        })
    }

    /// Build the `search_query` expression
    ///
    /// Free text becomes a conjunction of per-token all-field terms. There is
    /// no phrase search and no operator escaping: a token such as `OR` is
    /// passed through as a search term.
    fn build_search_query(mode: &SearchMode) -> String {
        match mode {
            SearchMode::Query(text) => text
                .split_whitespace()
                .map(|token| format!("all:{}", token))
                .collect::<Vec<_>>()
                .join(" AND "),
            SearchMode::Category(code) => format!("cat:{}", code.trim()),
        }
    }

    fn build_url(&self, request: &SearchRequest) -> String {
        let mut url = format!(
            "{}?search_query={}&start=0&max_results={}",
            self.base_url,
            urlencoding::encode(&Self::build_search_query(&request.mode)),
            request.max_results.min(self.max_results_cap)
        );

        if request.sort == SortHint::Recent {
            url.push_str("&sortBy=submittedDate&sortOrder=descending");
        }

        url
    }

    async fn fetch_once(&self, url: &str) -> std::result::Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/atom+xml")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl FeedSource for ArxivFeed {
    fn name(&self) -> &str {
        "arXiv"
    }

    async fn fetch(&self, request: &SearchRequest) -> Result<Vec<RawEntry>> {
        request.validate()?;

        let url = self.build_url(request);
        tracing::debug!(%url, "Querying arXiv");

        let body = with_retry(self.retry, || self.fetch_once(&url))
            .await
            .map_err(|e| Error::SourceUnavailable(e.to_string()))?;

        let entries = parse_feed(&body)?;
        tracing::info!(count = entries.len(), "arXiv returned entries");
        Ok(entries)
    }
}

/// Fields captured from text content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Id,
    Title,
    Summary,
    Published,
    Updated,
    AuthorName,
    ArxivDoi,
    Doi,
}

/// Parse an Atom document into raw entries
///
/// Zero, one, or many `entry` elements all come back as a list. A document
/// whose root element is not `feed` is rejected.
pub fn parse_feed(xml: &str) -> Result<Vec<RawEntry>> {
    let mut reader = NsReader::from_str(xml);
    let mut buf = Vec::new();

    let mut entries = Vec::new();
    let mut saw_root = false;
    let mut entry: Option<RawEntry> = None;
    let mut author: Option<RawAuthor> = None;
    // Depth inside the current entry; the entry element itself is 1
    let mut depth = 0usize;
    let mut field: Option<(Field, usize)> = None;
    let mut text = String::new();

    loop {
        buf.clear();
        let (ns, event) = reader
            .read_resolved_event_into(&mut buf)
            .map_err(|e| Error::SourceUnavailable(format!("malformed feed XML: {}", e)))?;
        let in_arxiv_ns = matches!(ns, ResolveResult::Bound(Namespace(n)) if n == ARXIV_NS);

        match event {
            Event::Start(ref e) => {
                if !saw_root {
                    check_root(e)?;
                    saw_root = true;
                } else if let Some(current) = entry.as_mut() {
                    depth += 1;
                    let local = e.local_name();
                    let captured = match (depth, local.as_ref()) {
                        (2, b"id") => Some(Field::Id),
                        (2, b"title") => Some(Field::Title),
                        (2, b"summary") => Some(Field::Summary),
                        (2, b"published") => Some(Field::Published),
                        (2, b"updated") => Some(Field::Updated),
                        (2, b"doi") if in_arxiv_ns => Some(Field::ArxivDoi),
                        (2, b"doi") => Some(Field::Doi),
                        (2, b"author") => {
                            author = Some(RawAuthor::default());
                            None
                        }
                        (2, b"link") => {
                            current.links.extend(parse_link(e));
                            None
                        }
                        (3, b"name") if author.is_some() => Some(Field::AuthorName),
                        _ => None,
                    };
                    if let Some(f) = captured {
                        field = Some((f, depth));
                        text.clear();
                    }
                } else if e.local_name().as_ref() == b"entry" {
                    entry = Some(RawEntry::default());
                    depth = 1;
                }
            }
            Event::Empty(ref e) => {
                if !saw_root {
                    check_root(e)?;
                    saw_root = true;
                } else if let Some(current) = entry.as_mut() {
                    if depth == 1 {
                        match e.local_name().as_ref() {
                            b"link" => current.links.extend(parse_link(e)),
                            b"author" => current.authors.push(RawAuthor::default()),
                            _ => {}
                        }
                    }
                } else if e.local_name().as_ref() == b"entry" {
                    entries.push(RawEntry::default());
                }
            }
            Event::Text(ref e) => {
                if field.is_some() {
                    let chunk = e
                        .unescape()
                        .map_err(|e| Error::SourceUnavailable(format!("malformed feed text: {}", e)))?;
                    text.push_str(&chunk);
                }
            }
            Event::CData(e) => {
                if field.is_some() {
                    text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::End(ref e) if entry.is_some() => {
                if let Some((f, at)) = field {
                    if at == depth {
                        let value = std::mem::take(&mut text);
                        if let Some(current) = entry.as_mut() {
                            assign(current, author.as_mut(), f, value);
                        }
                        field = None;
                    }
                }

                if depth == 2 && e.local_name().as_ref() == b"author" {
                    if let (Some(current), Some(done)) = (entry.as_mut(), author.take()) {
                        current.authors.push(done);
                    }
                }

                if depth == 1 {
                    if let Some(done) = entry.take() {
                        entries.push(done);
                    }
                    depth = 0;
                } else {
                    depth -= 1;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(Error::SourceUnavailable(
            "feed response contained no XML document".to_string(),
        ));
    }

    Ok(entries)
}

fn check_root(e: &BytesStart<'_>) -> Result<()> {
    if e.local_name().as_ref() == b"feed" {
        Ok(())
    } else {
        Err(Error::SourceUnavailable(format!(
            "expected an Atom feed, got <{}>",
            String::from_utf8_lossy(e.name().as_ref())
        )))
    }
}

fn assign(entry: &mut RawEntry, author: Option<&mut RawAuthor>, field: Field, value: String) {
    match field {
        Field::Id => entry.id = Some(value),
        Field::Title => entry.title = Some(value),
        Field::Summary => entry.summary = Some(value),
        Field::Published => entry.published = Some(value),
        Field::Updated => entry.updated = Some(value),
        Field::ArxivDoi => entry.arxiv_doi = Some(value),
        Field::Doi => entry.doi = Some(value),
        Field::AuthorName => {
            if let Some(author) = author {
                author.name = Some(value);
            }
        }
    }
}

/// Read a link element; links without `href` are dropped
fn parse_link(e: &BytesStart<'_>) -> Option<RawLink> {
    let href = get_attr(e, "href")?;
    Some(RawLink {
        href,
        link_type: get_attr(e, "type"),
        title: get_attr(e, "title"),
    })
}

fn get_attr(e: &BytesStart<'_>, attr_name: &str) -> Option<String> {
    e.attributes()
        .filter_map(|a| a.ok())
        .find(|a| a.key.local_name().as_ref() == attr_name.as_bytes())
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const FEED_TWO_ENTRIES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schema/2008/an">
  <title>arXiv Query Results</title>
  <id>http://arxiv.org/api/query-id</id>
  <link href="http://arxiv.org/api/query" rel="self" type="application/atom+xml"/>
  <entry>
    <id>http://arxiv.org/abs/2301.12345v1</id>
    <updated>2023-01-16T10:00:00Z</updated>
    <published>2023-01-15T10:00:00Z</published>
    <title>Attention Is
      All You Need</title>
    <summary>  We propose a new
      architecture. </summary>
    <author><name>Ashish Vaswani</name><arxiv:affiliation>Google</arxiv:affiliation></author>
    <author><name>Noam Shazeer</name></author>
    <arxiv:doi>10.1234/attention</arxiv:doi>
    <link href="http://arxiv.org/abs/2301.12345v1" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/2301.12345v1" rel="related" type="application/pdf"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2302.00002v3</id>
    <title>Second &amp; Last</title>
    <author><name>Solo Author</name></author>
    <doi>10.5555/generic</doi>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_feed_entries() {
        let entries = parse_feed(FEED_TWO_ENTRIES).unwrap();
        assert_eq!(entries.len(), 2);

        let first = &entries[0];
        assert_eq!(first.id.as_deref(), Some("http://arxiv.org/abs/2301.12345v1"));
        assert!(first.title.as_deref().unwrap().starts_with("Attention Is"));
        assert_eq!(first.published.as_deref(), Some("2023-01-15T10:00:00Z"));
        assert_eq!(first.authors.len(), 2);
        assert_eq!(first.authors[0].name.as_deref(), Some("Ashish Vaswani"));
        assert_eq!(first.arxiv_doi.as_deref(), Some("10.1234/attention"));
        assert_eq!(first.doi, None);
        assert_eq!(first.links.len(), 2);
        assert_eq!(first.links[1].link_type.as_deref(), Some("application/pdf"));

        let second = &entries[1];
        assert_eq!(second.title.as_deref(), Some("Second & Last"));
        assert_eq!(second.arxiv_doi, None);
        assert_eq!(second.doi.as_deref(), Some("10.5555/generic"));
        assert!(second.links.is_empty());
    }

    #[test]
    fn test_parse_feed_single_entry_is_a_list() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
            <entry><id>http://arxiv.org/abs/1</id><title>Only</title></entry>
        </feed>"#;
        let entries = parse_feed(xml).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title.as_deref(), Some("Only"));
    }

    #[test]
    fn test_parse_feed_empty() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>No results</title></feed>"#;
        assert!(parse_feed(xml).unwrap().is_empty());
        assert!(parse_feed(r#"<feed xmlns="http://www.w3.org/2005/Atom"/>"#)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_parse_feed_rejects_non_feed() {
        assert!(matches!(
            parse_feed("<html><body>Service Unavailable</body></html>"),
            Err(Error::SourceUnavailable(_))
        ));
        assert!(matches!(parse_feed(""), Err(Error::SourceUnavailable(_))));
        assert!(matches!(
            parse_feed("<feed><entry><title>broken</entry></feed>"),
            Err(Error::SourceUnavailable(_))
        ));
    }

    #[test]
    fn test_build_search_query() {
        assert_eq!(
            ArxivFeed::build_search_query(&SearchMode::Query("  neural   networks ".into())),
            "all:neural AND all:networks"
        );
        assert_eq!(
            ArxivFeed::build_search_query(&SearchMode::Category("cs.AI".into())),
            "cat:cs.AI"
        );
    }

    fn feed_config(base: &str) -> FeedConfig {
        FeedConfig {
            base_url: format!("{}/api/query", base),
            timeout_secs: 5,
            max_results_cap: 50,
            retry_attempts: 2,
            retry_initial_delay_ms: 1,
        }
    }

    #[tokio::test]
    async fn test_fetch_category_recent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/query")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("search_query".into(), "cat:cs.AI".into()),
                Matcher::UrlEncoded("start".into(), "0".into()),
                Matcher::UrlEncoded("max_results".into(), "50".into()),
                Matcher::UrlEncoded("sortBy".into(), "submittedDate".into()),
                Matcher::UrlEncoded("sortOrder".into(), "descending".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/atom+xml")
            .with_body(FEED_TWO_ENTRIES)
            .create_async()
            .await;

        let feed = ArxivFeed::new(&feed_config(&server.url())).unwrap();
        let request = SearchRequest::category("cs.AI")
            .sort(SortHint::Recent)
            .max_results(500);
        let entries = feed.fetch(&request).await.unwrap();

        assert_eq!(entries.len(), 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_query_without_sort() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/query")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("search_query".into(), "all:graph AND all:learning".into()),
                Matcher::UrlEncoded("max_results".into(), "5".into()),
            ]))
            .with_status(200)
            .with_body(FEED_TWO_ENTRIES)
            .create_async()
            .await;

        let feed = ArxivFeed::new(&feed_config(&server.url())).unwrap();
        let request = SearchRequest::query("graph learning").max_results(5);
        assert_eq!(feed.fetch(&request).await.unwrap().len(), 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_retries_then_fails() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/query")
            .match_query(Matcher::Any)
            .with_status(503)
            .expect(2)
            .create_async()
            .await;

        let feed = ArxivFeed::new(&feed_config(&server.url())).unwrap();
        let result = feed.fetch(&SearchRequest::category("cs.AI")).await;

        assert!(matches!(result, Err(Error::SourceUnavailable(_))));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_client_error_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/query")
            .match_query(Matcher::Any)
            .with_status(400)
            .expect(1)
            .create_async()
            .await;

        let feed = ArxivFeed::new(&feed_config(&server.url())).unwrap();
        let result = feed.fetch(&SearchRequest::category("cs.AI")).await;

        assert!(matches!(result, Err(Error::SourceUnavailable(_))));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_validates_before_network() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/query")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let feed = ArxivFeed::new(&feed_config(&server.url())).unwrap();
        let result = feed.fetch(&SearchRequest::query("   ")).await;

        assert!(matches!(result, Err(Error::InvalidParameters(_))));
        mock.assert_async().await;
    }
}
