//! Analysis result normalization.

use serde_json::{Map, Value};

use crate::models::{Paper, UNKNOWN_AUTHOR};
use crate::normalize::{authors_from_value, meaningful, parse_insights};

/// Lay a completed analysis result over the paper that was submitted
///
/// The result carries `summary.meta` (title, authors, pdf_url, published) and
/// a structured `insights` object, either beside `summary` or inside it. Meta
/// and insights are merged with insights keys taking precedence, and the
/// merged fields overlay the submitted paper. The submitted paper's identity
/// (`id`, `arxivId`, `doi`) is kept, as is its `pdfUrl` when it had one.
pub fn from_analysis(submitted: &Paper, result: &Value) -> Paper {
    let summary = result.get("summary");
    let insights = parse_insights(result.get("insights"))
        .or_else(|| parse_insights(summary.and_then(|s| s.get("insights"))));

    let mut merged: Map<String, Value> = summary
        .and_then(|s| s.get("meta"))
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    if let Some(Value::Object(fields)) = &insights {
        for (key, value) in fields {
            merged.insert(key.clone(), value.clone());
        }
    }

    let text = |key: &str| meaningful(merged.get(key).and_then(Value::as_str));

    let mut paper = submitted.clone();

    if let Some(title) = text("title") {
        paper.title = title;
    }

    let authors = authors_from_value(merged.get("authors"));
    if !authors.is_empty() && authors.iter().any(|a| a != UNKNOWN_AUTHOR) {
        paper.authors = authors;
    }

    if let Some(published) = text("published") {
        paper.published = Some(published);
    }

    if paper.pdf_url.is_none() {
        paper.pdf_url = text("pdf_url").or_else(|| text("pdfUrl"));
    }

    if let Some(abstract_text) = summary
        .and_then(|s| s.get("abstract"))
        .and_then(|a| meaningful(a.as_str()))
    {
        paper.summary = Some(abstract_text);
    }

    if insights.is_some() {
        paper.insights = insights;
    }

    paper
}
