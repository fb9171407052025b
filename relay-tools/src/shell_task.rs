use crate::command_guard::{COMMAND_ALLOWLIST, CommandGuard};
use crate::error::Result;
use crate::traits::{Tool, ToolSpec, optional_string, optional_u64, require_string};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Shell task over the command allowlist. The guard does the vetting; this
/// tool supplies the workspace default directory and the result shape.
pub struct ShellTaskTool {
    guard: CommandGuard,
    workspace_root: PathBuf,
}

impl ShellTaskTool {
    pub fn new(workspace_root: impl AsRef<Path>) -> Self {
        Self {
            guard: CommandGuard::default(),
            workspace_root: workspace_root.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl Tool for ShellTaskTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "shell_task".to_string(),
            description: format!(
                "Run a read-only shell command in the workspace. Allowed commands: {}.",
                COMMAND_ALLOWLIST.join(", ")
            ),
            parameters_schema: serde_json::json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "command": { "type": "string" },
                    "workdir": { "type": "string" },
                    "intent": { "type": "string" },
                    "timeout_ms": { "type": "integer", "minimum": 100, "maximum": 60000 }
                },
                "required": ["command"]
            }),
            default_needs_approval: true,
        }
    }

    #[tracing::instrument(level = "info", skip_all)]
    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value> {
        let command = require_string(&arguments, "command")?;
        let intent = optional_string(&arguments, "intent")?;
        let timeout = optional_u64(&arguments, "timeout_ms")?.map(Duration::from_millis);
        let workdir = match optional_string(&arguments, "workdir")? {
            Some(dir) => self.workspace_root.join(dir),
            None => self.workspace_root.clone(),
        };

        let output = self.guard.run(&command, Some(&workdir), timeout).await?;
        Ok(serde_json::json!({
            "intent": intent,
            "workdir": workdir.display().to_string(),
            "command": command,
            "exit_code": output.exit_code,
            "stdout": output.stdout,
            "stderr": output.stderr,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shell_task_runs_allowed_command_in_workspace() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("marker.txt"), "x").unwrap();

        let tool = ShellTaskTool::new(tmp.path());
        let out = tool
            .execute(serde_json::json!({ "command": "ls", "intent": "inspect workspace" }))
            .await
            .unwrap();
        assert_eq!(out["exit_code"], 0);
        assert!(out["stdout"].as_str().unwrap().contains("marker.txt"));
        assert_eq!(out["intent"], "inspect workspace");
    }

    #[tokio::test]
    async fn shell_task_refuses_disallowed_commands() {
        let tmp = tempfile::tempdir().unwrap();
        let tool = ShellTaskTool::new(tmp.path());
        let err = tool
            .execute(serde_json::json!({ "command": "curl https://example.com" }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("'curl' is not allowed"));
    }
}
