use crate::error::{Result, ToolError};
use crate::traits::{Tool, ToolSpec, optional_string, require_string};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

/// Read, write, and list files inside a workspace root. Writes are
/// irreversible, so the catalog default requires approval for every
/// operation; administrators can relax that per deployment.
pub struct FilesystemTool {
    workspace_root: PathBuf,
    file_bytes_max: usize,
    list_entries_max: usize,
}

impl FilesystemTool {
    pub fn new(workspace_root: impl AsRef<Path>) -> Result<Self> {
        let workspace_root = workspace_root.as_ref().to_path_buf();
        if workspace_root.as_os_str().is_empty() {
            return Err(ToolError::InvalidArguments(
                "workspace_root is required".to_string(),
            ));
        }
        Ok(Self {
            workspace_root,
            file_bytes_max: 1_000_000,
            list_entries_max: 200,
        })
    }

    fn resolve_path(&self, user_path: &str) -> Result<PathBuf> {
        let rel = Path::new(user_path);
        if rel.is_absolute() {
            return Err(ToolError::Unauthorized(
                "absolute paths are not allowed; use paths relative to the workspace".to_string(),
            ));
        }

        for component in rel.components() {
            match component {
                Component::ParentDir => {
                    return Err(ToolError::Unauthorized(
                        "path traversal is not allowed".to_string(),
                    ));
                }
                Component::CurDir | Component::Normal(_) => {}
                Component::RootDir | Component::Prefix(_) => {
                    return Err(ToolError::Unauthorized("invalid path".to_string()));
                }
            }
        }

        Ok(self.workspace_root.join(rel))
    }

    async fn read(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path).await?;
        if bytes.len() > self.file_bytes_max {
            return Err(ToolError::ExecutionFailed(format!(
                "file too large: {} bytes (max {})",
                bytes.len(),
                self.file_bytes_max
            )));
        }
        Ok(String::from_utf8_lossy(&bytes).to_string())
    }

    async fn write(&self, path: &Path, content: &str) -> Result<usize> {
        if content.len() > self.file_bytes_max {
            return Err(ToolError::ExecutionFailed(format!(
                "content too large: {} bytes (max {})",
                content.len(),
                self.file_bytes_max
            )));
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, content).await?;
        Ok(content.len())
    }

    async fn list(&self, path: &Path) -> Result<Vec<serde_json::Value>> {
        let mut out = Vec::new();
        let mut rd = tokio::fs::read_dir(path).await?;
        while let Some(entry) = rd.next_entry().await? {
            let kind = match entry.file_type().await {
                Ok(t) if t.is_dir() => "directory",
                Ok(_) => "file",
                Err(_) => continue,
            };
            out.push(serde_json::json!({
                "name": entry.file_name().to_string_lossy(),
                "type": kind,
            }));
            if out.len() >= self.list_entries_max {
                break;
            }
        }
        out.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));
        Ok(out)
    }
}

#[async_trait]
impl Tool for FilesystemTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "filesystem".to_string(),
            description: "Read, write, or list files within the workspace. Writes create parent directories as needed.".to_string(),
            parameters_schema: serde_json::json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "operation": { "type": "string", "enum": ["read", "write", "list"] },
                    "path": { "type": "string" },
                    "content": { "type": "string" }
                },
                "required": ["operation", "path"]
            }),
            default_needs_approval: true,
        }
    }

    #[tracing::instrument(level = "info", skip_all)]
    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value> {
        let operation = require_string(&arguments, "operation")?;
        let path = require_string(&arguments, "path")?;
        let resolved = self.resolve_path(&path)?;

        match operation.as_str() {
            "read" => {
                let content = self.read(&resolved).await?;
                Ok(serde_json::json!({
                    "operation": "read",
                    "path": path,
                    "content": content,
                }))
            }
            "write" => {
                let content = optional_string(&arguments, "content")?.ok_or_else(|| {
                    ToolError::InvalidArguments(
                        "content is required for write operations".to_string(),
                    )
                })?;
                let bytes = self.write(&resolved, &content).await?;
                Ok(serde_json::json!({
                    "operation": "write",
                    "path": path,
                    "bytes": bytes,
                }))
            }
            "list" => {
                let entries = self.list(&resolved).await?;
                Ok(serde_json::json!({
                    "operation": "list",
                    "path": path,
                    "entries": entries,
                }))
            }
            other => Err(ToolError::InvalidArguments(format!(
                "unknown operation: {other}"
            ))),
        }
    }
}
