use crate::error::{LlmError, Result};
use crate::openai::OpenAiCompatBackend;
use crate::types::{ChatMessage, ChatResponse, ToolDefinition};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// The model-execution seam. The orchestrator never looks past this trait.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn chat(
        &self,
        model_id: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse>;
}

impl std::fmt::Debug for dyn LanguageModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn LanguageModel")
    }
}

/// Map a catalog model id to its provider id.
///
/// Ids are prefixed with their provider ("openai-gpt-4o"); bare "claude-*"
/// ids are accepted as anthropic for compatibility with raw API names.
pub fn provider_for_model(model_id: &str) -> &'static str {
    let m = model_id.to_ascii_lowercase();
    if m.starts_with("anthropic-") || m.starts_with("claude-") {
        return "anthropic";
    }
    if m.starts_with("google-") || m.starts_with("gemini-") {
        return "google";
    }
    "openai"
}

/// Backends keyed by provider id, registered once at startup.
///
/// A provider whose credentials are absent is simply not in the map; callers
/// get `UnknownProvider` instead of a call-time credential probe.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn LanguageModel>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register providers for which an API key is available.
    pub fn from_env() -> Self {
        let mut registry = Self::new();

        if let Some(key) = non_empty_env("OPENAI_API_KEY") {
            registry.register(
                "openai",
                Arc::new(OpenAiCompatBackend::new("https://api.openai.com/v1", &key)),
            );
        }
        if let Some(key) = non_empty_env("GEMINI_API_KEY") {
            // Gemini exposes an OpenAI-compatible chat surface.
            registry.register(
                "google",
                Arc::new(OpenAiCompatBackend::new(
                    "https://generativelanguage.googleapis.com/v1beta/openai",
                    &key,
                )),
            );
        }

        tracing::info!(
            providers = ?registry.provider_ids(),
            "language model backends registered"
        );
        registry
    }

    pub fn register(&mut self, provider_id: impl Into<String>, backend: Arc<dyn LanguageModel>) {
        self.backends.insert(provider_id.into(), backend);
    }

    pub fn resolve(&self, model_id: &str) -> Result<Arc<dyn LanguageModel>> {
        let provider = provider_for_model(model_id);
        self.backends
            .get(provider)
            .cloned()
            .ok_or_else(|| LlmError::UnknownProvider(provider.to_string()))
    }

    pub fn provider_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.backends.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedBackend;

    #[test]
    fn provider_detection_uses_id_prefix() {
        assert_eq!(provider_for_model("openai-gpt-4o"), "openai");
        assert_eq!(provider_for_model("anthropic-claude-sonnet-4"), "anthropic");
        assert_eq!(provider_for_model("claude-3-haiku"), "anthropic");
        assert_eq!(provider_for_model("google-gemini-2.5-flash"), "google");
        assert_eq!(provider_for_model("gpt-4o-mini"), "openai");
    }

    #[test]
    fn resolve_fails_for_unregistered_provider() {
        let registry = BackendRegistry::new();
        let err = registry.resolve("google-gemini-3-pro").unwrap_err();
        assert!(matches!(err, LlmError::UnknownProvider(p) if p == "google"));
    }

    #[test]
    fn registered_backend_resolves_by_model_prefix() {
        let mut registry = BackendRegistry::new();
        registry.register("google", Arc::new(ScriptedBackend::empty()));
        assert!(registry.resolve("google-gemini-3-pro").is_ok());
        assert!(registry.resolve("openai-gpt-4o").is_err());
    }
}
