use crate::error::Result;
use crate::traits::{Tool, ToolSpec};
use async_trait::async_trait;

/// A capability the catalog advertises but does not implement yet. The
/// approval default is declared here, per entry, where it can be reviewed —
/// never inferred from the capability's name.
pub struct StubCapability {
    pub name: &'static str,
    pub description: &'static str,
    pub needs_approval: bool,
}

/// Manifest of stub capabilities merged into every registry after the real
/// tools, as inert placeholders. Entries whose names collide with a mapped
/// tool are skipped at build time.
pub const STUB_CAPABILITIES: [StubCapability; 8] = [
    StubCapability {
        name: "message_notify_user",
        description: "Send a short out-of-band notification to the user.",
        needs_approval: false,
    },
    StubCapability {
        name: "file_write_text",
        description: "Write a text file outside the workspace sandbox.",
        needs_approval: true,
    },
    StubCapability {
        name: "shell_exec_command",
        description: "Execute an arbitrary shell command without the allowlist.",
        needs_approval: true,
    },
    StubCapability {
        name: "browser_navigate",
        description: "Drive a live browser session to a URL.",
        needs_approval: true,
    },
    StubCapability {
        name: "deploy_expose_port",
        description: "Expose a local port through a public tunnel.",
        needs_approval: true,
    },
    StubCapability {
        name: "data_delete_records",
        description: "Delete records from a connected datastore.",
        needs_approval: true,
    },
    StubCapability {
        name: "image_generate",
        description: "Generate an image from a text prompt.",
        needs_approval: false,
    },
    StubCapability {
        name: "schedule_reminder",
        description: "Schedule a reminder for a future time.",
        needs_approval: false,
    },
];

/// Inert placeholder: echoes its input back with a marker so the model can
/// tell the capability is advertised but not wired.
pub struct PlaceholderTool {
    name: &'static str,
    description: &'static str,
    needs_approval: bool,
}

impl PlaceholderTool {
    pub fn from_capability(capability: &StubCapability) -> Self {
        Self {
            name: capability.name,
            description: capability.description,
            needs_approval: capability.needs_approval,
        }
    }
}

#[async_trait]
impl Tool for PlaceholderTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.to_string(),
            description: self.description.to_string(),
            parameters_schema: serde_json::json!({
                "type": "object",
                "additionalProperties": true
            }),
            default_needs_approval: self.needs_approval,
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value> {
        Ok(serde_json::json!({
            "tool": self.name,
            "input": arguments,
            "note": "This capability is not implemented; map it to a concrete integration to enable it.",
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn placeholder_echoes_input_with_marker() {
        let tool = PlaceholderTool::from_capability(&STUB_CAPABILITIES[0]);
        let out = tool
            .execute(serde_json::json!({ "text": "hello" }))
            .await
            .unwrap();
        assert_eq!(out["input"]["text"], "hello");
        assert!(out["note"].as_str().unwrap().contains("not implemented"));
    }

    #[test]
    fn destructive_stubs_default_to_approval() {
        let by_name = |name: &str| {
            STUB_CAPABILITIES
                .iter()
                .find(|c| c.name == name)
                .unwrap()
                .needs_approval
        };
        assert!(by_name("shell_exec_command"));
        assert!(by_name("data_delete_records"));
        assert!(!by_name("message_notify_user"));
    }
}
