//! Persistence collaborators for Relay: tool policy + credential records and
//! durable run state. The orchestration layer only ever sees these traits;
//! SQLite backs them in production, a lock-guarded map in tests.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("store task failed: {0}")]
    Task(String),
}

/// Administrator-configured enablement and approval override for one tool.
/// `needs_approval: None` means "use the tool's catalog default".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolPolicy {
    pub tool_id: String,
    pub enabled: bool,
    #[serde(default)]
    pub needs_approval: Option<bool>,
    #[serde(default = "empty_settings")]
    pub settings: serde_json::Value,
}

impl ToolPolicy {
    pub fn new(tool_id: impl Into<String>) -> Self {
        Self {
            tool_id: tool_id.into(),
            enabled: true,
            needs_approval: None,
            settings: empty_settings(),
        }
    }

    pub fn disabled(tool_id: impl Into<String>) -> Self {
        Self {
            enabled: false,
            ..Self::new(tool_id)
        }
    }

    pub fn with_needs_approval(mut self, needs_approval: bool) -> Self {
        self.needs_approval = Some(needs_approval);
        self
    }

    pub fn with_settings(mut self, settings: serde_json::Value) -> Self {
        self.settings = settings;
        self
    }
}

fn empty_settings() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// A stored secret, keyed by an opaque name (adapter credentials use
/// `adapter-{adapter_id}`). Inactive records are kept but never resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    pub value: String,
    pub active: bool,
}

/// Key-value record of tool policy and stored credentials.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn all_tool_policies(&self) -> Result<Vec<ToolPolicy>>;
    async fn upsert_tool_policy(&self, policy: ToolPolicy) -> Result<()>;
    async fn credential(&self, key: &str) -> Result<Option<StoredCredential>>;
    async fn upsert_credential(&self, key: &str, value: &str, active: bool) -> Result<()>;
}

/// Serialized run state, durable so a suspended run can resume out of band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub status: String,
    /// JSON-encoded run state; the store does not interpret it.
    pub payload: String,
}

#[async_trait]
pub trait RunStore: Send + Sync {
    async fn save_run(&self, record: RunRecord) -> Result<()>;
    async fn load_run(&self, id: &str) -> Result<Option<RunRecord>>;
    async fn delete_run(&self, id: &str) -> Result<()>;
}
