//! Canonical paper record shared by every component.

use serde::{Deserialize, Serialize};

/// Title used when a source omits one
pub const UNTITLED: &str = "Untitled Paper";

/// Author name used when a source omits one
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Where a paper record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperSource {
    /// Bibliographic feed search result
    #[default]
    Feed,
    /// Feed result augmented with citation statistics
    Enrichment,
    /// PDF uploaded by the user
    Upload,
    /// Loaded from the user's persisted library
    Library,
}

impl PaperSource {
    /// Returns the display name of the source
    pub fn name(&self) -> &str {
        match self {
            PaperSource::Feed => "arXiv",
            PaperSource::Enrichment => "arXiv + Semantic Scholar",
            PaperSource::Upload => "Upload",
            PaperSource::Library => "Library",
        }
    }

    /// Returns the tag stored with persisted records
    pub fn id(&self) -> &str {
        match self {
            PaperSource::Feed => "feed",
            PaperSource::Enrichment => "enrichment",
            PaperSource::Upload => "upload",
            PaperSource::Library => "library",
        }
    }

    /// Parse a persisted tag; unknown tags map to `None`
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "feed" | "arxiv" => Some(PaperSource::Feed),
            "enrichment" => Some(PaperSource::Enrichment),
            "upload" => Some(PaperSource::Upload),
            "library" | "persisted" => Some(PaperSource::Library),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaperSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A research paper in canonical form
///
/// `id` is the primary key. It may be empty for records that have not been
/// stored yet; the library assigns one on insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paper {
    /// Stable identifier (for feed records, the entry's id URI)
    #[serde(default)]
    pub id: String,

    /// arXiv identifier extracted from the entry id, including any version suffix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arxiv_id: Option<String>,

    /// Digital Object Identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,

    /// Paper title, never empty
    pub title: String,

    /// Author display names, in source order
    #[serde(default)]
    pub authors: Vec<String>,

    /// Abstract text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Publication timestamp, passed through unparsed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,

    /// Last update timestamp, passed through unparsed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,

    /// Direct PDF URL; papers without one cannot be analyzed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,

    /// Citation count
    #[serde(default)]
    pub citation_count: u64,

    /// Influential citation count
    #[serde(default)]
    pub influential_citation_count: u64,

    /// Publication venue reported by the citation graph
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,

    /// Fields of study reported by the citation graph
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields_of_study: Vec<String>,

    /// Structured analysis output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insights: Option<serde_json::Value>,

    /// Provenance
    #[serde(default)]
    pub source: PaperSource,

    /// When the paper entered the library (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_added: Option<String>,

    /// Local-only favorite flag
    #[serde(skip)]
    pub is_favorite: bool,

    /// Local-only selection flag
    #[serde(skip)]
    pub is_selected: bool,
}

impl Paper {
    /// Create a new paper with required fields
    pub fn new(id: impl Into<String>, title: impl Into<String>, source: PaperSource) -> Self {
        let title = title.into();
        Self {
            id: id.into(),
            arxiv_id: None,
            doi: None,
            title: if title.trim().is_empty() {
                UNTITLED.to_string()
            } else {
                title
            },
            authors: Vec::new(),
            summary: None,
            published: None,
            updated: None,
            pdf_url: None,
            citation_count: 0,
            influential_citation_count: 0,
            venue: None,
            fields_of_study: Vec::new(),
            insights: None,
            source,
            date_added: None,
            is_favorite: false,
            is_selected: false,
        }
    }

    /// Whether the paper can be submitted for analysis
    pub fn is_analyzable(&self) -> bool {
        self.pdf_url.as_deref().is_some_and(|url| !url.trim().is_empty())
    }

    /// Authors joined for display
    pub fn author_line(&self) -> String {
        self.authors.join(", ")
    }

    /// Publication year, if the timestamp starts with one
    pub fn year(&self) -> Option<&str> {
        self.published
            .as_deref()
            .and_then(|p| p.get(..4))
            .filter(|y| y.chars().all(|c| c.is_ascii_digit()))
    }
}

/// Builder for constructing Paper objects
#[derive(Debug, Clone)]
pub struct PaperBuilder {
    paper: Paper,
}

impl PaperBuilder {
    /// Create a new builder with required fields
    pub fn new(id: impl Into<String>, title: impl Into<String>, source: PaperSource) -> Self {
        Self {
            paper: Paper::new(id, title, source),
        }
    }

    pub fn arxiv_id(mut self, arxiv_id: impl Into<String>) -> Self {
        self.paper.arxiv_id = Some(arxiv_id.into());
        self
    }

    pub fn doi(mut self, doi: impl Into<String>) -> Self {
        self.paper.doi = Some(doi.into());
        self
    }

    pub fn authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paper.authors = authors.into_iter().map(Into::into).collect();
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.paper.summary = Some(summary.into());
        self
    }

    pub fn published(mut self, date: impl Into<String>) -> Self {
        self.paper.published = Some(date.into());
        self
    }

    pub fn pdf_url(mut self, url: impl Into<String>) -> Self {
        self.paper.pdf_url = Some(url.into());
        self
    }

    pub fn citations(mut self, count: u64) -> Self {
        self.paper.citation_count = count;
        self
    }

    pub fn insights(mut self, insights: serde_json::Value) -> Self {
        self.paper.insights = Some(insights);
        self
    }

    /// Build the Paper
    pub fn build(self) -> Paper {
        self.paper
    }
}
