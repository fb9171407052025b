//! Relay configuration loader: TOML file, then environment overrides, then
//! validation. A missing file is not an error; defaults serve local use.

use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_step_budget")]
    pub step_budget: usize,
}

fn default_model() -> String {
    "chat-model".to_string()
}

fn default_system_prompt() -> String {
    "You are Relay, an autonomous task-execution assistant. Use the available \
     tools when they help; report tool failures plainly and keep answers concise."
        .to_string()
}

fn default_step_budget() -> usize {
    20
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            system_prompt: default_system_prompt(),
            step_budget: default_step_budget(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_port() -> u16 {
    8080
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecurityConfig {
    /// Bearer token required on every route except health. Empty means the
    /// server answers unauthenticated requests (local development).
    #[serde(default)]
    pub gateway_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkspaceConfig {
    /// Root directory the filesystem and shell tools operate in.
    #[serde(default)]
    pub root: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path; empty means in-memory (nothing survives a
    /// restart, including pending approvals).
    #[serde(default)]
    pub db_path: Option<String>,
}

impl RelayConfig {
    pub async fn load(path: Option<PathBuf>) -> anyhow::Result<Self> {
        let path = path.unwrap_or_else(default_config_path);
        let mut cfg: RelayConfig = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| anyhow::anyhow!("read config {}: {e}", path.display()))?;
            toml::from_str(&contents)
                .map_err(|e| anyhow::anyhow!("parse config {}: {e}", path.display()))?
        } else {
            tracing::info!(path = %path.display(), "no config file; using defaults");
            RelayConfig::default()
        };

        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("RELAY_MODEL") {
            if !v.trim().is_empty() {
                self.general.default_model = v;
            }
        }
        if let Ok(v) = std::env::var("RELAY_GATEWAY_TOKEN") {
            if !v.trim().is_empty() {
                self.security.gateway_token = Some(v);
            }
        }
        if let Ok(v) = std::env::var("RELAY_WORKSPACE_ROOT") {
            if !v.trim().is_empty() {
                self.workspace.root = Some(v);
            }
        }
        if let Ok(v) = std::env::var("RELAY_DB_PATH") {
            if !v.trim().is_empty() {
                self.storage.db_path = Some(v);
            }
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.general.default_model.trim().is_empty() {
            return Err(anyhow::anyhow!("general.default_model is required"));
        }
        if self.general.step_budget == 0 {
            return Err(anyhow::anyhow!("general.step_budget must be > 0"));
        }
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("server.port must be > 0"));
        }
        Ok(())
    }

    pub fn workspace_root(&self) -> PathBuf {
        match self.workspace.root.as_ref().filter(|r| !r.trim().is_empty()) {
            Some(root) => PathBuf::from(root),
            None => default_workspace_dir(),
        }
    }
}

pub fn default_config_path() -> PathBuf {
    relay_home().join("config.toml")
}

pub fn default_workspace_dir() -> PathBuf {
    relay_home().join("workspace")
}

fn relay_home() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".relay")
}
