use serde::Serialize;

/// The bare default chat model id. Selecting it is treated as "let the
/// router decide", same as the explicit auto sentinels.
pub const DEFAULT_CHAT_MODEL: &str = "chat-model";

/// Model ids that defer to the router rather than pinning a model.
pub const ROUTER_SENTINELS: [&str; 3] = ["auto", "auto-model", DEFAULT_CHAT_MODEL];

/// Designated model ids per routing outcome.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    pub browser: String,
    pub cli: String,
    pub vision: String,
    pub reasoning: String,
    pub fast: String,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self {
            browser: "google-gemini-3-pro".to_string(),
            cli: "google-gemini-3-pro".to_string(),
            vision: "google-gemini-3-pro".to_string(),
            reasoning: "google-gemini-3-pro".to_string(),
            fast: "google-gemini-2.5-flash".to_string(),
        }
    }
}

impl ModelCatalog {
    pub fn is_router_sentinel(model_id: &str) -> bool {
        ROUTER_SENTINELS.contains(&model_id)
    }
}

/// A selectable model, as surfaced to clients.
#[derive(Debug, Clone, Serialize)]
pub struct ModelEntry {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub provider: &'static str,
}

pub fn chat_models() -> &'static [ModelEntry] {
    &[
        ModelEntry {
            id: "chat-model",
            name: "Relay Auto",
            description: "Routes each request to the best available model",
            provider: "relay",
        },
        ModelEntry {
            id: "google-gemini-3-pro",
            name: "Gemini 3 Pro",
            description: "High-capability multimodal model for reasoning, vision, and tool use",
            provider: "Google",
        },
        ModelEntry {
            id: "google-gemini-2.5-flash",
            name: "Gemini 2.5 Flash",
            description: "Fast default for short conversational turns",
            provider: "Google",
        },
        ModelEntry {
            id: "openai-gpt-4o",
            name: "GPT-4o",
            description: "OpenAI multimodal model",
            provider: "OpenAI",
        },
        ModelEntry {
            id: "openai-gpt-4o-mini",
            name: "GPT-4o Mini",
            description: "Fast and efficient OpenAI model",
            provider: "OpenAI",
        },
        ModelEntry {
            id: "anthropic-claude-sonnet-4",
            name: "Claude Sonnet 4",
            description: "Balanced performance and speed from Anthropic",
            provider: "Anthropic",
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_cover_auto_and_default() {
        assert!(ModelCatalog::is_router_sentinel("auto"));
        assert!(ModelCatalog::is_router_sentinel("auto-model"));
        assert!(ModelCatalog::is_router_sentinel("chat-model"));
        assert!(!ModelCatalog::is_router_sentinel("openai-gpt-4o"));
    }

    #[test]
    fn catalog_lists_the_default_model() {
        assert!(chat_models().iter().any(|m| m.id == DEFAULT_CHAT_MODEL));
    }
}
