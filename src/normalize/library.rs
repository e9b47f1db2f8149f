//! Persisted library record normalization.
//!
//! Stored documents come in several generations of shape: `snake_case` or
//! `camelCase` keys, authors as a comma-joined string or an array, `insights`
//! as an object or a JSON string, and metadata either at the top level or
//! nested one level deeper under `metadata`. When a field appears in both
//! places, the top-level value wins.

use serde_json::{Map, Value};

use crate::models::{Paper, PaperSource};
use crate::normalize::{authors_from_value, count_from_value, meaningful, non_empty, parse_insights};

struct Record<'a> {
    top: &'a Map<String, Value>,
    nested: Option<&'a Map<String, Value>>,
}

impl<'a> Record<'a> {
    /// First value present under any of `keys`, top level before nested
    fn get(&self, keys: &[&str]) -> Option<&'a Value> {
        let lookup = |map: &'a Map<String, Value>| {
            keys.iter()
                .filter_map(|k| map.get(*k))
                .find(|v| !v.is_null())
        };
        lookup(self.top).or_else(|| self.nested.and_then(lookup))
    }

    fn text(&self, keys: &[&str]) -> Option<&'a str> {
        self.get(keys).and_then(Value::as_str)
    }
}

/// Convert a persisted document into a canonical paper
///
/// Returns `None` only when the document is not a JSON object.
pub fn from_persisted(value: &Value) -> Option<Paper> {
    let top = value.as_object()?;
    let record = Record {
        top,
        nested: top.get("metadata").and_then(Value::as_object),
    };

    let id = match record.get(&["id", "paperId", "paper_id"]) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };

    let source = record
        .text(&["source"])
        .and_then(PaperSource::from_tag)
        .unwrap_or(PaperSource::Library);

    let title = non_empty(record.text(&["title"])).unwrap_or_default();
    let mut paper = Paper::new(id, title, source);

    paper.arxiv_id = meaningful(record.text(&["arxivId", "arxiv_id"]));
    paper.doi = meaningful(record.text(&["doi"]));
    paper.authors = authors_from_value(record.get(&["authors"]));
    paper.summary = meaningful(record.text(&["summary", "abstract"]));
    paper.published = meaningful(record.text(&["published", "publishedDate", "published_date"]));
    paper.updated = meaningful(record.text(&["updated", "updatedDate", "updated_date"]));
    paper.pdf_url = meaningful(record.text(&["pdfUrl", "pdf_url"]));
    paper.citation_count = count_from_value(record.get(&["citationCount", "citation_count"]));
    paper.influential_citation_count = count_from_value(
        record.get(&["influentialCitationCount", "influential_citation_count"]),
    );
    paper.venue = meaningful(record.text(&["venue"]));
    paper.fields_of_study = match record.get(&["fieldsOfStudy", "fields_of_study"]) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| non_empty(v.as_str()))
            .collect(),
        _ => Vec::new(),
    };
    paper.insights = parse_insights(record.get(&["insights"]));
    paper.date_added = meaningful(record.text(&["dateAdded", "date_added"]));

    Some(paper)
}

/// The document stored for a paper
///
/// Local-only flags are never part of it.
pub fn to_persisted(paper: &Paper) -> Value {
    serde_json::to_value(paper).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UNTITLED;
    use serde_json::json;

    #[test]
    fn test_nested_metadata_top_level_wins() {
        let doc = json!({
            "id": "p1",
            "title": "Top Title",
            "metadata": {
                "title": "Nested Title",
                "authors": "Ada Lovelace, Charles Babbage",
                "pdf_url": "https://example.org/p1.pdf",
                "published": "2020-05-01"
            }
        });

        let paper = from_persisted(&doc).unwrap();
        assert_eq!(paper.title, "Top Title");
        assert_eq!(paper.authors, vec!["Ada Lovelace", "Charles Babbage"]);
        assert_eq!(paper.pdf_url.as_deref(), Some("https://example.org/p1.pdf"));
        assert_eq!(paper.published.as_deref(), Some("2020-05-01"));
        assert_eq!(paper.source, PaperSource::Library);
    }

    #[test]
    fn test_string_insights_and_array_authors() {
        let doc = json!({
            "id": "p2",
            "title": "T",
            "authors": ["A", "B"],
            "insights": "{\"findings\": [\"f1\"], \"methods\": []}",
            "citationCount": 9,
            "source": "upload"
        });

        let paper = from_persisted(&doc).unwrap();
        assert_eq!(paper.authors, vec!["A", "B"]);
        assert_eq!(paper.insights.unwrap()["findings"][0], "f1");
        assert_eq!(paper.citation_count, 9);
        assert_eq!(paper.source, PaperSource::Upload);
    }

    #[test]
    fn test_placeholders_are_absent() {
        let doc = json!({
            "title": "",
            "pdf_url": "N/A",
            "published": "Unknown",
            "insights": "oops"
        });

        let paper = from_persisted(&doc).unwrap();
        assert_eq!(paper.id, "");
        assert_eq!(paper.title, UNTITLED);
        assert_eq!(paper.pdf_url, None);
        assert_eq!(paper.published, None);
        assert_eq!(paper.insights, None);
        assert!(paper.authors.is_empty());
    }

    #[test]
    fn test_both_key_spellings() {
        let snake = json!({"id": "x", "title": "T", "arxiv_id": "1", "date_added": "2024-01-01T00:00:00Z"});
        let camel = json!({"id": "x", "title": "T", "arxivId": "1", "dateAdded": "2024-01-01T00:00:00Z"});
        assert_eq!(from_persisted(&snake), from_persisted(&camel));
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(from_persisted(&json!("just a string")).is_none());
        assert!(from_persisted(&json!([1, 2])).is_none());
    }

    #[test]
    fn test_persisted_shape_reads_back() {
        let mut paper = Paper::new("p9", "Stored", PaperSource::Enrichment);
        paper.citation_count = 4;
        paper.fields_of_study = vec!["Physics".into()];
        paper.is_favorite = true;

        let doc = to_persisted(&paper);
        assert!(doc.get("isFavorite").is_none());

        let back = from_persisted(&doc).unwrap();
        assert_eq!(back.citation_count, 4);
        assert_eq!(back.fields_of_study, vec!["Physics"]);
        assert_eq!(back.source, PaperSource::Enrichment);
        assert!(!back.is_favorite);
    }
}
