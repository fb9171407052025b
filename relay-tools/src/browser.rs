use crate::error::{Result, ToolError};
use crate::traits::{Tool, ToolSpec, optional_string, require_string};
use async_trait::async_trait;

/// Guided browser actions. No live browser runtime is attached; the tool
/// echoes a structured plan so a human (or a future runtime) can act on it.
pub struct BrowserActionTool;

#[async_trait]
impl Tool for BrowserActionTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "browser_action".to_string(),
            description: "Perform high-level browser actions (navigate, click, extract) in guided mode.".to_string(),
            parameters_schema: serde_json::json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "goal": { "type": "string" },
                    "url": { "type": "string" },
                    "notes": { "type": "string" }
                },
                "required": ["goal"]
            }),
            default_needs_approval: false,
        }
    }

    #[tracing::instrument(level = "info", skip_all)]
    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value> {
        let goal = require_string(&arguments, "goal")?;
        let url = optional_string(&arguments, "url")?;
        let notes = optional_string(&arguments, "notes")?;

        Ok(serde_json::json!({
            "goal": goal,
            "url": url,
            "notes": notes,
            "message": "Browser runtime not connected. Provide steps and selectors so a human can execute, or attach a runtime.",
        }))
    }
}

/// Chromium automation through a cloud task service. Requires an API key;
/// without one the call reports how to connect instead of failing the run.
pub struct CloudBrowserTool {
    api_key: Option<String>,
    base_url: String,
    http: reqwest::Client,
}

impl CloudBrowserTool {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.browser-use.com/api/v1";

    pub fn new(api_key: Option<String>, base_url: Option<String>) -> Self {
        Self {
            api_key,
            base_url: base_url
                .unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Tool for CloudBrowserTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "cloud_browser_task".to_string(),
            description: "Run a cloud browser automation task (Chromium). Provide a clear goal and optional starting URL.".to_string(),
            parameters_schema: serde_json::json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "task": { "type": "string" },
                    "url": { "type": "string" },
                    "notes": { "type": "string" }
                },
                "required": ["task"]
            }),
            default_needs_approval: true,
        }
    }

    #[tracing::instrument(level = "info", skip_all)]
    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value> {
        let task = require_string(&arguments, "task")?;
        let url = optional_string(&arguments, "url")?;

        let Some(api_key) = self.api_key.as_ref() else {
            return Err(ToolError::NotConnected(
                "no cloud browser API key is configured; set one in the cloud_browser_task \
                 settings or via CLOUD_BROWSER_API_KEY"
                    .to_string(),
            ));
        };

        let task_text = match &url {
            Some(u) => format!("{task} (start at {u})"),
            None => task.clone(),
        };
        let response = self
            .http
            .post(format!("{}/run-task", self.base_url))
            .bearer_auth(api_key)
            .json(&serde_json::json!({ "task": task_text }))
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("cloud browser request: {e}")))?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .unwrap_or_else(|_| serde_json::json!({}));
        if !status.is_success() {
            return Err(ToolError::ExecutionFailed(format!(
                "cloud browser task failed (status {status}): {body}"
            )));
        }

        Ok(serde_json::json!({
            "task": task,
            "url": url,
            "output": body,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn browser_action_echoes_a_structured_plan() {
        let out = BrowserActionTool
            .execute(serde_json::json!({ "goal": "extract titles", "url": "https://example.com" }))
            .await
            .unwrap();
        assert_eq!(out["goal"], "extract titles");
        assert!(out["message"].as_str().unwrap().contains("not connected"));
    }

    #[tokio::test]
    async fn cloud_browser_without_key_reports_not_connected() {
        let tool = CloudBrowserTool::new(None, None);
        let err = tool
            .execute(serde_json::json!({ "task": "open example.com" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotConnected(_)));
        assert!(err.to_string().contains("CLOUD_BROWSER_API_KEY"));
    }
}
