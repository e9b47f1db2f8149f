//! Search request models and parameter validation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Default number of results when the caller does not say
pub const DEFAULT_MAX_RESULTS: usize = 10;

/// Ordering requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortHint {
    /// Feed default ordering
    #[default]
    All,
    /// Newest submissions first
    Recent,
    /// Most cited first (requires enrichment)
    Popular,
}

impl SortHint {
    /// Parse a sort hint, rejecting anything outside the known set
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "all" => Ok(SortHint::All),
            "recent" => Ok(SortHint::Recent),
            "popular" => Ok(SortHint::Popular),
            other => Err(Error::invalid(format!(
                "sort must be one of all, recent, popular (got '{}')",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortHint::All => "all",
            SortHint::Recent => "recent",
            SortHint::Popular => "popular",
        }
    }
}

impl std::fmt::Display for SortHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to search for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "lowercase")]
pub enum SearchMode {
    /// Free text, matched token by token across all fields
    Query(String),
    /// A feed category code such as `cs.AI`
    Category(String),
}

/// A validated search request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub mode: SearchMode,
    pub sort: SortHint,
    pub max_results: usize,
}

impl SearchRequest {
    /// Free-text search with default sort and size
    pub fn query(text: impl Into<String>) -> Self {
        Self {
            mode: SearchMode::Query(text.into()),
            sort: SortHint::All,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    /// Category search with default sort and size
    pub fn category(code: impl Into<String>) -> Self {
        Self {
            mode: SearchMode::Category(code.into()),
            sort: SortHint::All,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    pub fn sort(mut self, sort: SortHint) -> Self {
        self.sort = sort;
        self
    }

    pub fn max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    /// Whether the request needs citation enrichment
    pub fn wants_enrichment(&self) -> bool {
        self.sort == SortHint::Popular
    }

    /// Check the request before anything touches the network
    pub fn validate(&self) -> Result<()> {
        match &self.mode {
            SearchMode::Query(text) => {
                if text.split_whitespace().next().is_none() {
                    return Err(Error::invalid("query must contain at least one search term"));
                }
            }
            SearchMode::Category(code) => {
                let code = code.trim();
                if code.is_empty() {
                    return Err(Error::invalid("category must not be empty"));
                }
                if code.chars().any(char::is_whitespace) {
                    return Err(Error::invalid(format!(
                        "category '{}' must not contain whitespace",
                        code
                    )));
                }
            }
        }

        if self.max_results == 0 {
            return Err(Error::invalid("max_results must be at least 1"));
        }

        Ok(())
    }

    /// Build a request from a loosely-typed JSON payload
    ///
    /// `mode` is `"query"` or `"category"`. The payload carries `query` or
    /// `category` (string), optional `sort` (string) and optional `max_results`
    /// (number).
    pub fn from_params(mode: &str, params: &Value) -> Result<Self> {
        let params = params
            .as_object()
            .ok_or_else(|| Error::invalid("search parameters must be an object"))?;

        let text_field = match mode {
            "query" => "query",
            "category" => "category",
            other => {
                return Err(Error::invalid(format!(
                    "mode must be 'query' or 'category' (got '{}')",
                    other
                )))
            }
        };

        let text = match params.get(text_field) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => {
                return Err(Error::invalid(format!(
                    "{} must be a string (got {})",
                    text_field,
                    type_name(other)
                )))
            }
            None => return Err(Error::invalid(format!("{} is required", text_field))),
        };

        let sort = match params.get("sort") {
            None | Some(Value::Null) => SortHint::All,
            Some(Value::String(s)) => SortHint::parse(s)?,
            Some(other) => {
                return Err(Error::invalid(format!(
                    "sort must be a string (got {})",
                    type_name(other)
                )))
            }
        };

        let max_results = match params.get("max_results") {
            None | Some(Value::Null) => DEFAULT_MAX_RESULTS,
            Some(Value::Number(n)) => match n.as_u64() {
                Some(v) => usize::try_from(v)
                    .map_err(|_| Error::invalid("max_results is too large"))?,
                None => match n.as_f64() {
                    Some(f) if f.is_finite() && f >= 0.0 => f.trunc() as usize,
                    _ => return Err(Error::invalid("max_results must be a non-negative number")),
                },
            },
            Some(other) => {
                return Err(Error::invalid(format!(
                    "max_results must be a number (got {})",
                    type_name(other)
                )))
            }
        };

        let mode = if text_field == "query" {
            SearchMode::Query(text)
        } else {
            SearchMode::Category(text)
        };

        let request = Self {
            mode,
            sort,
            max_results,
        };
        request.validate()?;
        Ok(request)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sort_hint_parse() {
        assert_eq!(SortHint::parse("recent").unwrap(), SortHint::Recent);
        assert!(matches!(
            SortHint::parse("relevance"),
            Err(Error::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_from_params_category() {
        let request = SearchRequest::from_params(
            "category",
            &json!({ "category": "cs.AI", "sort": "popular", "max_results": 5 }),
        )
        .unwrap();

        assert_eq!(request.mode, SearchMode::Category("cs.AI".to_string()));
        assert_eq!(request.sort, SortHint::Popular);
        assert_eq!(request.max_results, 5);
        assert!(request.wants_enrichment());
    }

    #[test]
    fn test_from_params_defaults() {
        let request =
            SearchRequest::from_params("query", &json!({ "query": "graph neural networks" }))
                .unwrap();
        assert_eq!(request.sort, SortHint::All);
        assert_eq!(request.max_results, DEFAULT_MAX_RESULTS);
    }

    #[test]
    fn test_from_params_rejects_wrong_types() {
        let cases = [
            ("query", json!({ "query": 42 })),
            ("category", json!({ "category": ["cs.AI"] })),
            ("category", json!({ "category": "cs.AI", "sort": "hot" })),
            ("category", json!({ "category": "cs.AI", "sort": 1 })),
            ("category", json!({ "category": "cs.AI", "max_results": "five" })),
            ("category", json!({ "category": "cs.AI", "max_results": 0 })),
            ("title", json!({ "title": "x" })),
            ("query", json!("just a string")),
        ];

        for (mode, params) in cases {
            let result = SearchRequest::from_params(mode, &params);
            assert!(
                matches!(result, Err(Error::InvalidParameters(_))),
                "expected InvalidParameters for {} {}",
                mode,
                params
            );
        }
    }

    #[test]
    fn test_validate_blank_query() {
        assert!(SearchRequest::query("   ").validate().is_err());
        assert!(SearchRequest::category("cs AI").validate().is_err());
        assert!(SearchRequest::category("cs.AI").validate().is_ok());
    }
}
