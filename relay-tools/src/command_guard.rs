use crate::error::{Result, ToolError};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// The only executables the guard will spawn. Read-only inspection commands;
/// membership is checked against the first whitespace-delimited token of the
/// command string, nothing else.
pub const COMMAND_ALLOWLIST: [&str; 8] =
    ["ls", "cat", "pwd", "stat", "find", "head", "tail", "grep"];

const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

#[derive(Debug, Clone, Serialize)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Validates and executes allow-listed commands. No shell is involved: the
/// base executable is spawned directly with the remaining tokens as
/// arguments, so pipes, redirects, and chaining have no meaning here.
#[derive(Debug, Clone)]
pub struct CommandGuard {
    default_timeout: Duration,
}

impl Default for CommandGuard {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl CommandGuard {
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }

    #[tracing::instrument(level = "info", skip_all, fields(command = %command))]
    pub async fn run(
        &self,
        command: &str,
        workdir: Option<&Path>,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput> {
        let mut tokens = command.split_whitespace();
        let Some(base) = tokens.next() else {
            return Err(ToolError::InvalidArguments(
                "command must not be empty".to_string(),
            ));
        };

        if !COMMAND_ALLOWLIST.contains(&base) {
            return Err(ToolError::Unauthorized(format!(
                "command '{base}' is not allowed; allowed commands: {}",
                COMMAND_ALLOWLIST.join(", ")
            )));
        }

        let workdir: PathBuf = match workdir {
            Some(dir) => dir.to_path_buf(),
            None => std::env::current_dir()
                .map_err(|e| ToolError::ExecutionFailed(format!("resolve cwd: {e}")))?,
        };

        let mut cmd = Command::new(base);
        cmd.args(tokens)
            .current_dir(&workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let timeout = timeout.unwrap_or(self.default_timeout);
        let output = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| {
                ToolError::Timeout(format!(
                    "command '{base}' exceeded {} ms",
                    timeout.as_millis()
                ))
            })?
            .map_err(|e| ToolError::ExecutionFailed(format!("spawn '{base}': {e}")))?;

        // A non-zero exit code is data, not an error.
        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}
