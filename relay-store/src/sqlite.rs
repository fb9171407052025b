use crate::{
    ConfigStore, Result, RunRecord, RunStore, StoreError, StoredCredential, ToolPolicy,
};
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// SQLite-backed store. The connection sits behind a mutex and every call
/// runs on the blocking pool, so async callers never hold the lock across an
/// await point.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        tracing::debug!(path = %path.as_ref().display(), "opening sqlite store");
        let conn =
            Connection::open(path.as_ref()).map_err(|e| StoreError::Database(e.to_string()))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Database(e.to_string()))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
CREATE TABLE IF NOT EXISTS tool_policy (
    tool_id        TEXT PRIMARY KEY,
    enabled        INTEGER NOT NULL DEFAULT 1,
    needs_approval INTEGER,
    settings       TEXT NOT NULL DEFAULT '{}',
    updated_at     TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS credential (
    key        TEXT PRIMARY KEY,
    value      TEXT NOT NULL,
    active     INTEGER NOT NULL DEFAULT 1,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS run (
    id         TEXT PRIMARY KEY,
    status     TEXT NOT NULL,
    payload    TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#,
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection lock poisoned".to_string()))
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreError::Database("connection lock poisoned".to_string()))?;
            f(&guard).map_err(|e| StoreError::Database(e.to_string()))
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn parse_settings(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw)
        .unwrap_or_else(|_| serde_json::Value::Object(serde_json::Map::new()))
}

#[async_trait]
impl ConfigStore for SqliteStore {
    async fn all_tool_policies(&self) -> Result<Vec<ToolPolicy>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT tool_id, enabled, needs_approval, settings
                   FROM tool_policy ORDER BY tool_id",
            )?;
            let rows = stmt.query_map([], |row| {
                let needs_approval: Option<i64> = row.get(2)?;
                let settings: String = row.get(3)?;
                Ok(ToolPolicy {
                    tool_id: row.get(0)?,
                    enabled: row.get::<_, i64>(1)? != 0,
                    needs_approval: needs_approval.map(|v| v != 0),
                    settings: parse_settings(&settings),
                })
            })?;
            rows.collect()
        })
        .await
    }

    async fn upsert_tool_policy(&self, policy: ToolPolicy) -> Result<()> {
        let settings = serde_json::to_string(&policy.settings)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO tool_policy (tool_id, enabled, needs_approval, settings, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(tool_id) DO UPDATE SET
                    enabled = excluded.enabled,
                    needs_approval = excluded.needs_approval,
                    settings = excluded.settings,
                    updated_at = excluded.updated_at",
                params![
                    policy.tool_id,
                    policy.enabled as i64,
                    policy.needs_approval.map(|v| v as i64),
                    settings,
                    now(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn credential(&self, key: &str) -> Result<Option<StoredCredential>> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT value, active FROM credential WHERE key = ?1",
                params![key],
                |row| {
                    Ok(StoredCredential {
                        value: row.get(0)?,
                        active: row.get::<_, i64>(1)? != 0,
                    })
                },
            )
            .optional()
        })
        .await
    }

    async fn upsert_credential(&self, key: &str, value: &str, active: bool) -> Result<()> {
        let key = key.to_string();
        let value = value.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO credential (key, value, active, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    active = excluded.active,
                    updated_at = excluded.updated_at",
                params![key, value, active as i64, now()],
            )?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl RunStore for SqliteStore {
    async fn save_run(&self, record: RunRecord) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO run (id, status, payload, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    status = excluded.status,
                    payload = excluded.payload,
                    updated_at = excluded.updated_at",
                params![record.id, record.status, record.payload, now()],
            )?;
            Ok(())
        })
        .await
    }

    async fn load_run(&self, id: &str) -> Result<Option<RunRecord>> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, status, payload FROM run WHERE id = ?1",
                params![id],
                |row| {
                    Ok(RunRecord {
                        id: row.get(0)?,
                        status: row.get(1)?,
                        payload: row.get(2)?,
                    })
                },
            )
            .optional()
        })
        .await
    }

    async fn delete_run(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM run WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn policy_upsert_and_null_needs_approval_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .upsert_tool_policy(
                ToolPolicy::new("filesystem")
                    .with_settings(serde_json::json!({ "root": "/tmp/ws" })),
            )
            .await
            .unwrap();
        store
            .upsert_tool_policy(ToolPolicy::new("search").with_needs_approval(true))
            .await
            .unwrap();

        let policies = store.all_tool_policies().await.unwrap();
        assert_eq!(policies.len(), 2);
        let fs = policies.iter().find(|p| p.tool_id == "filesystem").unwrap();
        assert_eq!(fs.needs_approval, None);
        assert_eq!(fs.settings["root"], "/tmp/ws");
        let search = policies.iter().find(|p| p.tool_id == "search").unwrap();
        assert_eq!(search.needs_approval, Some(true));
    }

    #[tokio::test]
    async fn run_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .save_run(RunRecord {
                    id: "run-1".to_string(),
                    status: "awaiting_approval".to_string(),
                    payload: "{}".to_string(),
                })
                .await
                .unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        let record = store.load_run("run-1").await.unwrap().unwrap();
        assert_eq!(record.status, "awaiting_approval");

        store.delete_run("run-1").await.unwrap();
        assert!(store.load_run("run-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn credential_upsert_overwrites_value_and_active() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .upsert_credential("adapter-github", "old", true)
            .await
            .unwrap();
        store
            .upsert_credential("adapter-github", "new", false)
            .await
            .unwrap();
        let cred = store.credential("adapter-github").await.unwrap().unwrap();
        assert_eq!(cred.value, "new");
        assert!(!cred.active);
    }
}
