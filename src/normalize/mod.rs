//! Conversion of source-specific record shapes into canonical [`Paper`]s.
//!
//! Each input shape has its own parse function, and all of them return a fresh
//! canonical record:
//!
//! - [`normalize`]: a raw feed entry
//! - [`from_persisted`]: a document from the persisted library
//! - [`from_analysis`]: a completed analysis result, laid over the submitted paper
//!
//! None of them fail. Malformed or absent fields degrade to defaults.
//!
//! [`Paper`]: crate::models::Paper

mod analysis;
mod feed;
mod library;

pub use analysis::from_analysis;
pub use feed::{extract_arxiv_id, normalize, normalize_all};
pub use library::{from_persisted, to_persisted};

use serde_json::Value;

use crate::models::UNKNOWN_AUTHOR;

/// Placeholder strings the persisted store and analysis service use for "no value"
const PLACEHOLDERS: &[&str] = &["n/a", "unknown", "untitled", "none", "null"];

/// Collapse runs of whitespace (Atom text is line-wrapped)
pub(crate) fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cleaned text, or `None` when it is empty
pub(crate) fn non_empty(text: Option<&str>) -> Option<String> {
    text.map(clean_text).filter(|t| !t.is_empty())
}

/// Cleaned text, or `None` when it is empty or a placeholder
pub(crate) fn meaningful(text: Option<&str>) -> Option<String> {
    non_empty(text).filter(|t| !PLACEHOLDERS.contains(&t.to_lowercase().as_str()))
}

/// Authors from a string (comma separated) or an array of names or objects
pub(crate) fn authors_from_value(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => s.split(',').filter_map(|a| non_empty(Some(a))).collect(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                let name = match item {
                    Value::String(s) => Some(s.as_str()),
                    Value::Object(obj) => obj.get("name").and_then(Value::as_str),
                    _ => None,
                };
                non_empty(name).unwrap_or_else(|| UNKNOWN_AUTHOR.to_string())
            })
            .collect(),
        Some(Value::Object(obj)) => vec![non_empty(obj.get("name").and_then(Value::as_str))
            .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string())],
        _ => Vec::new(),
    }
}

/// Insights given as an object, or as a string holding JSON
///
/// Empty, null, or unparseable insights are treated as absent.
pub(crate) fn parse_insights(value: Option<&Value>) -> Option<Value> {
    let parsed = match value? {
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            match serde_json::from_str::<Value>(s) {
                Ok(v) => v,
                Err(e) => {
                    tracing::debug!(error = %e, "Dropping unparseable insights");
                    return None;
                }
            }
        }
        other => other.clone(),
    };

    match &parsed {
        Value::Object(map) if !map.is_empty() => Some(parsed),
        Value::Array(items) if !items.is_empty() => Some(parsed),
        _ => None,
    }
}

/// Non-negative count from a number or numeric string
pub(crate) fn count_from_value(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  Deep\n   Residual\tLearning "), "Deep Residual Learning");
    }

    #[test]
    fn test_meaningful_drops_placeholders() {
        assert_eq!(meaningful(Some("N/A")), None);
        assert_eq!(meaningful(Some(" Unknown ")), None);
        assert_eq!(meaningful(Some("")), None);
        assert_eq!(meaningful(Some("2024-01-01")), Some("2024-01-01".to_string()));
    }

    #[test]
    fn test_authors_shapes() {
        assert_eq!(
            authors_from_value(Some(&json!("Jane Doe, John Roe ,"))),
            vec!["Jane Doe", "John Roe"]
        );
        assert_eq!(
            authors_from_value(Some(&json!(["A", {"name": "B"}, {}, null]))),
            vec!["A", "B", "Unknown", "Unknown"]
        );
        assert_eq!(authors_from_value(Some(&json!({"name": "Solo"}))), vec!["Solo"]);
        assert!(authors_from_value(None).is_empty());
    }

    #[test]
    fn test_parse_insights_shapes() {
        let object = json!({"findings": ["x"]});
        assert_eq!(parse_insights(Some(&object)), Some(object.clone()));
        assert_eq!(
            parse_insights(Some(&json!(r#"{"findings": ["x"]}"#))),
            Some(object)
        );
        assert_eq!(parse_insights(Some(&json!("not json"))), None);
        assert_eq!(parse_insights(Some(&json!("{}"))), None);
        assert_eq!(parse_insights(Some(&json!(null))), None);
        assert_eq!(parse_insights(None), None);
    }

    #[test]
    fn test_count_from_value() {
        assert_eq!(count_from_value(Some(&json!(12))), 12);
        assert_eq!(count_from_value(Some(&json!(3.7))), 3);
        assert_eq!(count_from_value(Some(&json!(-4))), 0);
        assert_eq!(count_from_value(Some(&json!("15"))), 15);
        assert_eq!(count_from_value(Some(&json!("many"))), 0);
    }
}
