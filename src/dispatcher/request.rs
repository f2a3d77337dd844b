//! Inbound request payloads.

use serde::Deserialize;
use serde_json::{Map, Value};

use super::DispatchError;

#[derive(Debug, Deserialize)]
struct RawRequest {
    #[serde(default, alias = "scraper")]
    engine: Option<String>,
    #[serde(default, alias = "method", alias = "category")]
    operation: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    html: Option<String>,
}

/// A validated search request.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchRequest {
    pub engine: String,
    /// Requested operation, unparsed; `web` when absent.
    pub operation: String,
    pub params: Map<String, Value>,
    /// Captured page to replay instead of fetching.
    pub html: Option<String>,
}

impl DispatchRequest {
    /// Parse and validate a JSON body.
    pub fn from_json(body: &str) -> Result<Self, DispatchError> {
        let raw: RawRequest = serde_json::from_str(body)
            .map_err(|e| DispatchError::MalformedInput(format!("invalid JSON: {}", e)))?;

        let engine = raw
            .engine
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| DispatchError::MalformedInput("missing engine".to_string()))?;

        let params = match raw.params {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            // Empty JSON arrays stand in for empty objects in some clients
            Some(Value::Array(a)) if a.is_empty() => Map::new(),
            Some(_) => {
                return Err(DispatchError::MalformedInput(
                    "params must be an object".to_string(),
                ))
            }
        };

        Ok(Self {
            engine,
            operation: raw.operation.unwrap_or_else(|| "web".to_string()),
            params,
            html: raw.html.filter(|h| !h.is_empty()),
        })
    }
}

/// A filter-discovery request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FilterRequest {
    #[serde(alias = "scraper")]
    pub engine: String,
    #[serde(default = "default_page")]
    pub page: String,
}

fn default_page() -> String {
    "web".to_string()
}

impl FilterRequest {
    pub fn from_json(body: &str) -> Result<Self, DispatchError> {
        serde_json::from_str(body)
            .map_err(|e| DispatchError::MalformedInput(format!("invalid JSON: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_request() {
        let req = DispatchRequest::from_json(r#"{"engine": "mojeek"}"#).unwrap();
        assert_eq!(req.engine, "mojeek");
        assert_eq!(req.operation, "web");
        assert!(req.params.is_empty());
        assert_eq!(req.html, None);
    }

    #[test]
    fn test_aliases() {
        let req = DispatchRequest::from_json(
            r#"{"scraper": "ddg", "method": "images", "params": {"s": "cats"}, "html": "<p>x</p>"}"#,
        )
        .unwrap();
        assert_eq!(req.engine, "ddg");
        assert_eq!(req.operation, "images");
        assert_eq!(req.params["s"], "cats");
        assert_eq!(req.html.as_deref(), Some("<p>x</p>"));

        let req = DispatchRequest::from_json(r#"{"engine": "e", "category": "news"}"#).unwrap();
        assert_eq!(req.operation, "news");
    }

    #[test]
    fn test_malformed() {
        for body in [
            "not json",
            "{}",
            r#"{"engine": "   "}"#,
            r#"{"engine": "e", "params": "s=x"}"#,
            "[]",
        ] {
            assert!(
                matches!(
                    DispatchRequest::from_json(body),
                    Err(DispatchError::MalformedInput(_))
                ),
                "{}",
                body
            );
        }
    }

    #[test]
    fn test_filter_request() {
        let req = FilterRequest::from_json(r#"{"engine": "ddg"}"#).unwrap();
        assert_eq!(req.page, "web");
        assert!(FilterRequest::from_json("{}").is_err());
    }
}
