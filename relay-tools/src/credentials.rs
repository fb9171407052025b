use crate::error::Result;
use relay_store::ConfigStore;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialSource {
    Env,
    Stored,
}

/// A resolved bearer credential. Lives only as long as the call that asked
/// for it; the resolver never caches.
#[derive(Debug, Clone)]
pub struct AdapterCredential {
    pub adapter_id: String,
    pub token: String,
    pub source: CredentialSource,
    /// The parsed stored payload, when the record was structured JSON.
    pub raw: Option<serde_json::Value>,
}

/// Resolves a bearer credential for a named adapter: explicit environment
/// override first, then the stored `adapter-{id}` record, else not
/// connected. `None` is an answer, not an error — callers turn it into
/// actionable guidance.
#[derive(Clone)]
pub struct CredentialResolver {
    store: Arc<dyn ConfigStore>,
}

impl CredentialResolver {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn resolve(
        &self,
        adapter_id: &str,
        env_var: Option<&str>,
    ) -> Result<Option<AdapterCredential>> {
        if let Some(name) = env_var {
            if let Ok(value) = std::env::var(name) {
                if !value.trim().is_empty() {
                    return Ok(Some(AdapterCredential {
                        adapter_id: adapter_id.to_string(),
                        token: value,
                        source: CredentialSource::Env,
                        raw: None,
                    }));
                }
            }
        }

        let key = format!("adapter-{adapter_id}");
        let stored = match self.store.credential(&key).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(%key, error = %e, "credential store read failed");
                None
            }
        };
        let Some(record) = stored.filter(|r| r.active) else {
            return Ok(None);
        };

        Ok(Some(from_stored_record(adapter_id, &record.value)))
    }
}

fn from_stored_record(adapter_id: &str, value: &str) -> AdapterCredential {
    if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(value) {
        let token = parsed
            .get("accessToken")
            .or_else(|| parsed.get("token"))
            .and_then(|v| v.as_str());
        if let Some(token) = token {
            return AdapterCredential {
                adapter_id: adapter_id.to_string(),
                token: token.to_string(),
                source: CredentialSource::Stored,
                raw: Some(parsed),
            };
        }
    }

    // Not JSON (or JSON without a token field): the raw string is the token.
    AdapterCredential {
        adapter_id: adapter_id.to_string(),
        token: value.trim().to_string(),
        source: CredentialSource::Stored,
        raw: None,
    }
}
