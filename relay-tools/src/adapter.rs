use crate::credentials::{AdapterCredential, CredentialResolver};
use crate::error::{Result, ToolError};
use crate::traits::{Tool, ToolSpec, require_string};
use async_trait::async_trait;

const USER_AGENT: &str = "relay-agent";
const GITHUB_DEFAULT_BASE_URL: &str = "https://api.github.com";

/// A connectable external service. `env_var` is the explicit environment
/// override the credential resolver checks before the stored record.
pub struct AdapterEntry {
    pub id: &'static str,
    pub name: &'static str,
    pub env_var: &'static str,
    pub description: &'static str,
}

pub const ADAPTER_DIRECTORY: [AdapterEntry; 3] = [
    AdapterEntry {
        id: "github",
        name: "GitHub",
        env_var: "GITHUB_TOKEN",
        description: "List repositories and fetch repository metadata",
    },
    AdapterEntry {
        id: "notion",
        name: "Notion",
        env_var: "NOTION_TOKEN",
        description: "Read and write Notion pages (not yet wired)",
    },
    AdapterEntry {
        id: "google-drive",
        name: "Google Drive",
        env_var: "GOOGLE_DRIVE_TOKEN",
        description: "List and read Drive documents (not yet wired)",
    },
];

/// Call an external adapter with a resolved bearer credential. GitHub is
/// fully wired; the other directory entries authenticate but answer with a
/// placeholder until their integrations land.
pub struct AdapterCallTool {
    resolver: CredentialResolver,
    http: reqwest::Client,
    github_base_url: String,
}

impl AdapterCallTool {
    pub fn new(resolver: CredentialResolver, github_base_url: Option<String>) -> Self {
        Self {
            resolver,
            http: reqwest::Client::new(),
            github_base_url: github_base_url
                .unwrap_or_else(|| GITHUB_DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    async fn call_github(
        &self,
        credential: &AdapterCredential,
        action: &str,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let url = match action {
            "list_repositories" => format!("{}/user/repos?per_page=20", self.github_base_url),
            "repository_info" => {
                let full_name = payload
                    .get("full_name")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| {
                        ToolError::InvalidArguments(
                            "repository_info requires payload.full_name (owner/repo)".to_string(),
                        )
                    })?;
                format!("{}/repos/{full_name}", self.github_base_url)
            }
            other => {
                return Err(ToolError::InvalidArguments(format!(
                    "unsupported action {other:?} for adapter 'github'; \
                     supported: list_repositories, repository_info"
                )));
            }
        };

        let response = self
            .http
            .get(&url)
            .bearer_auth(&credential.token)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("github request: {e}")))?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .unwrap_or_else(|_| serde_json::json!({}));
        if !status.is_success() {
            return Err(ToolError::ExecutionFailed(format!(
                "github responded with status {status}: {body}"
            )));
        }

        Ok(serde_json::json!({
            "adapter": "github",
            "action": action,
            "data": body,
        }))
    }
}

#[async_trait]
impl Tool for AdapterCallTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "adapter_call".to_string(),
            description: "Call a connected external adapter (github, notion, google-drive) with a named action.".to_string(),
            parameters_schema: serde_json::json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "adapter_id": { "type": "string" },
                    "action": { "type": "string" },
                    "payload": { "type": "object" }
                },
                "required": ["adapter_id", "action"]
            }),
            default_needs_approval: true,
        }
    }

    #[tracing::instrument(level = "info", skip_all)]
    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value> {
        let adapter_id = require_string(&arguments, "adapter_id")?;
        let action = require_string(&arguments, "action")?;
        let payload = arguments.get("payload").cloned().unwrap_or_default();

        let Some(entry) = ADAPTER_DIRECTORY.iter().find(|a| a.id == adapter_id) else {
            return Err(ToolError::InvalidArguments(format!(
                "unknown adapter {adapter_id:?}; known adapters: {}",
                ADAPTER_DIRECTORY.map(|a| a.id).join(", ")
            )));
        };

        let credential = self
            .resolver
            .resolve(entry.id, Some(entry.env_var))
            .await?
            .ok_or_else(|| {
                ToolError::NotConnected(format!(
                    "adapter '{}' is not connected; connect it in the admin panel or set {}",
                    entry.id, entry.env_var
                ))
            })?;

        match entry.id {
            "github" => self.call_github(&credential, &action, &payload).await,
            _ => Ok(serde_json::json!({
                "adapter": entry.id,
                "action": action,
                "payload": payload,
                "message": format!("The {} adapter is connected but its actions are not yet wired.", entry.name),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_store::{ConfigStore, MemoryStore};
    use std::sync::Arc;

    fn tool_with(store: MemoryStore) -> AdapterCallTool {
        AdapterCallTool::new(CredentialResolver::new(Arc::new(store)), None)
    }

    #[tokio::test]
    async fn unknown_adapter_is_rejected_with_directory() {
        let tool = tool_with(MemoryStore::new());
        let err = tool
            .execute(serde_json::json!({ "adapter_id": "jira", "action": "list" }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("github, notion, google-drive"));
    }

    #[tokio::test]
    async fn disconnected_adapter_yields_guidance_not_a_fault() {
        let tool = tool_with(MemoryStore::new());
        let err = tool
            .execute(serde_json::json!({
                "adapter_id": "notion",
                "action": "search"
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotConnected(_)));
        assert!(err.to_string().contains("NOTION_TOKEN"));
    }

    #[tokio::test]
    async fn unsupported_github_action_is_rejected_before_any_request() {
        let store = MemoryStore::new();
        store
            .upsert_credential("adapter-github", "gho_test", true)
            .await
            .unwrap();
        let tool = tool_with(store);
        let err = tool
            .execute(serde_json::json!({ "adapter_id": "github", "action": "delete_repo" }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unsupported action"));
    }

    #[tokio::test]
    async fn repository_info_requires_full_name() {
        let store = MemoryStore::new();
        store
            .upsert_credential("adapter-github", "gho_test", true)
            .await
            .unwrap();
        let tool = tool_with(store);
        let err = tool
            .execute(serde_json::json!({ "adapter_id": "github", "action": "repository_info" }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("full_name"));
    }

    #[tokio::test]
    async fn connected_placeholder_adapter_answers_without_network() {
        let store = MemoryStore::new();
        store
            .upsert_credential("adapter-notion", "secret", true)
            .await
            .unwrap();
        let tool = tool_with(store);
        let out = tool
            .execute(serde_json::json!({ "adapter_id": "notion", "action": "search" }))
            .await
            .unwrap();
        assert!(out["message"].as_str().unwrap().contains("not yet wired"));
    }
}
