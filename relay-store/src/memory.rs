use crate::{ConfigStore, Result, RunRecord, RunStore, StoredCredential, ToolPolicy};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory store for tests and ephemeral deployments. Lock-guarded so
/// admin writes and in-flight orchestration reads can race safely.
#[derive(Default)]
pub struct MemoryStore {
    policies: RwLock<HashMap<String, ToolPolicy>>,
    credentials: RwLock<HashMap<String, StoredCredential>>,
    runs: RwLock<HashMap<String, RunRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn all_tool_policies(&self) -> Result<Vec<ToolPolicy>> {
        let policies = self.policies.read().expect("policy map lock");
        let mut out: Vec<ToolPolicy> = policies.values().cloned().collect();
        out.sort_by(|a, b| a.tool_id.cmp(&b.tool_id));
        Ok(out)
    }

    async fn upsert_tool_policy(&self, policy: ToolPolicy) -> Result<()> {
        self.policies
            .write()
            .expect("policy map lock")
            .insert(policy.tool_id.clone(), policy);
        Ok(())
    }

    async fn credential(&self, key: &str) -> Result<Option<StoredCredential>> {
        Ok(self
            .credentials
            .read()
            .expect("credential map lock")
            .get(key)
            .cloned())
    }

    async fn upsert_credential(&self, key: &str, value: &str, active: bool) -> Result<()> {
        self.credentials.write().expect("credential map lock").insert(
            key.to_string(),
            StoredCredential {
                value: value.to_string(),
                active,
            },
        );
        Ok(())
    }
}

#[async_trait]
impl RunStore for MemoryStore {
    async fn save_run(&self, record: RunRecord) -> Result<()> {
        self.runs
            .write()
            .expect("run map lock")
            .insert(record.id.clone(), record);
        Ok(())
    }

    async fn load_run(&self, id: &str) -> Result<Option<RunRecord>> {
        Ok(self.runs.read().expect("run map lock").get(id).cloned())
    }

    async fn delete_run(&self, id: &str) -> Result<()> {
        self.runs.write().expect("run map lock").remove(id);
        Ok(())
    }
}
