use crate::error::Result;
use crate::traits::{Tool, ToolSpec};
use async_trait::async_trait;

/// Always-available utility tool: reports what this deployment can do.
/// Merged into every registry regardless of mode or policy, so the model
/// can orient itself even in a locked-down configuration.
pub struct DiagnosticsTool {
    mode: String,
    tool_ids: Vec<String>,
}

impl DiagnosticsTool {
    pub fn new(mode: impl Into<String>, tool_ids: Vec<String>) -> Self {
        Self {
            mode: mode.into(),
            tool_ids,
        }
    }
}

#[async_trait]
impl Tool for DiagnosticsTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "diagnostics".to_string(),
            description: "Report the agent version, execution mode, and the tools available in this run.".to_string(),
            parameters_schema: serde_json::json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {}
            }),
            default_needs_approval: false,
        }
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<serde_json::Value> {
        Ok(serde_json::json!({
            "agent": "relay",
            "version": env!("CARGO_PKG_VERSION"),
            "mode": self.mode,
            "tools": self.tool_ids,
        }))
    }
}
