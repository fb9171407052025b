use crate::error::{Result, ToolError};
use crate::traits::{Tool, ToolSpec, optional_u64, require_string};
use async_trait::async_trait;

const LANGUAGES: [&str; 3] = ["javascript", "python", "bash"];
const TIMEOUT_DEFAULT_SECS: u64 = 30;

/// Code execution capability. No sandbox runtime ships with relay; this
/// validates the request and returns a marker result until a runtime is
/// attached, while keeping the approval gate and result shape in place.
pub struct CodeExecutionTool;

#[async_trait]
impl Tool for CodeExecutionTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "code_execution".to_string(),
            description: "Execute code in a sandboxed environment. Supports javascript, python, and bash.".to_string(),
            parameters_schema: serde_json::json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "language": { "type": "string", "enum": ["javascript", "python", "bash"] },
                    "code": { "type": "string" },
                    "timeout": { "type": "integer", "minimum": 1, "maximum": 300 }
                },
                "required": ["language", "code"]
            }),
            default_needs_approval: true,
        }
    }

    #[tracing::instrument(level = "info", skip_all)]
    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value> {
        let language = require_string(&arguments, "language")?;
        if !LANGUAGES.contains(&language.as_str()) {
            return Err(ToolError::InvalidArguments(format!(
                "unsupported language {language:?}; supported: {}",
                LANGUAGES.join(", ")
            )));
        }
        let code = require_string(&arguments, "code")?;
        let timeout = optional_u64(&arguments, "timeout")?.unwrap_or(TIMEOUT_DEFAULT_SECS);

        Ok(serde_json::json!({
            "language": language,
            "timeout": timeout,
            "output": format!(
                "No sandbox runtime is attached; the {language} snippet ({} bytes) was not run. \
                 Attach an execution runtime to enable this capability.",
                code.len()
            ),
            "executed": false,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unsupported_language_is_rejected() {
        let err = CodeExecutionTool
            .execute(serde_json::json!({ "language": "cobol", "code": "x" }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unsupported language"));
    }

    #[tokio::test]
    async fn valid_request_returns_unexecuted_marker() {
        let out = CodeExecutionTool
            .execute(serde_json::json!({ "language": "python", "code": "print(1)" }))
            .await
            .unwrap();
        assert_eq!(out["executed"], false);
        assert_eq!(out["timeout"], 30);
    }
}
