use crate::catalog::ModelCatalog;
use crate::types::{ChatMessage, ExecutionMode};
use serde::{Deserialize, Serialize};

const REASONING_KEYWORDS: [&str; 6] = [
    "plan",
    "architecture",
    "design",
    "strategy",
    "analyze",
    "analysis",
];

const REASONING_LENGTH_THRESHOLD: usize = 800;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouteReason {
    UserSelected,
    ForcedMode,
    VisionInput,
    Reasoning,
    Fast,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutedModel {
    pub model_id: String,
    pub reason: RouteReason,
}

/// Pick the model serving this request. Pure function; the decision order is
/// part of the contract: explicit choice, forced mode, vision, reasoning
/// signal, fast fallback.
pub fn route(
    explicit_model_id: Option<&str>,
    messages: &[ChatMessage],
    has_vision_input: bool,
    forced_mode: Option<ExecutionMode>,
    catalog: &ModelCatalog,
) -> RoutedModel {
    if let Some(id) = explicit_model_id {
        let id = id.trim();
        if !id.is_empty() && !ModelCatalog::is_router_sentinel(id) {
            return RoutedModel {
                model_id: id.to_string(),
                reason: RouteReason::UserSelected,
            };
        }
    }

    let last_message_text = messages.last().map(|m| m.content.trim()).unwrap_or("");
    let has_reasoning_signal = reasoning_signal(last_message_text);

    if forced_mode == Some(ExecutionMode::Browser) {
        return RoutedModel {
            model_id: catalog.browser.clone(),
            reason: RouteReason::ForcedMode,
        };
    }

    if forced_mode == Some(ExecutionMode::Cli) {
        return RoutedModel {
            model_id: catalog.cli.clone(),
            reason: RouteReason::ForcedMode,
        };
    }

    if has_vision_input {
        return RoutedModel {
            model_id: catalog.vision.clone(),
            reason: RouteReason::VisionInput,
        };
    }

    if has_reasoning_signal {
        return RoutedModel {
            model_id: catalog.reasoning.clone(),
            reason: RouteReason::Reasoning,
        };
    }

    RoutedModel {
        model_id: catalog.fast.clone(),
        reason: RouteReason::Fast,
    }
}

fn reasoning_signal(text: &str) -> bool {
    if text.chars().count() > REASONING_LENGTH_THRESHOLD {
        return true;
    }
    let lowered = text.to_lowercase();
    REASONING_KEYWORDS.iter().any(|kw| lowered.contains(kw))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ModelCatalog {
        ModelCatalog::default()
    }

    fn user(text: &str) -> Vec<ChatMessage> {
        vec![ChatMessage::user(text)]
    }

    #[test]
    fn explicit_non_sentinel_model_always_wins() {
        let routed = route(
            Some("openai-gpt-4o"),
            &user("please analyze the architecture of this plan"),
            true,
            Some(ExecutionMode::Browser),
            &catalog(),
        );
        assert_eq!(routed.model_id, "openai-gpt-4o");
        assert_eq!(routed.reason, RouteReason::UserSelected);
    }

    #[test]
    fn sentinel_with_forced_browser_mode_routes_to_browser_model() {
        let routed = route(
            Some("auto"),
            &user("open the page"),
            false,
            Some(ExecutionMode::Browser),
            &catalog(),
        );
        assert_eq!(routed.model_id, catalog().browser);
        assert_eq!(routed.reason, RouteReason::ForcedMode);
    }

    #[test]
    fn forced_cli_mode_routes_to_cli_model() {
        let routed = route(
            None,
            &user("list files"),
            false,
            Some(ExecutionMode::Cli),
            &catalog(),
        );
        assert_eq!(routed.model_id, catalog().cli);
        assert_eq!(routed.reason, RouteReason::ForcedMode);
    }

    #[test]
    fn forced_mode_outranks_vision_and_reasoning() {
        let routed = route(
            None,
            &user("analyze this design strategy in depth"),
            true,
            Some(ExecutionMode::Browser),
            &catalog(),
        );
        assert_eq!(routed.reason, RouteReason::ForcedMode);
    }

    #[test]
    fn vision_input_routes_to_vision_model() {
        let routed = route(None, &user("what is in this picture"), true, None, &catalog());
        assert_eq!(routed.model_id, catalog().vision);
        assert_eq!(routed.reason, RouteReason::VisionInput);
    }

    #[test]
    fn reasoning_keyword_is_case_insensitive() {
        let routed = route(None, &user("DESIGN me a schema"), false, None, &catalog());
        assert_eq!(routed.reason, RouteReason::Reasoning);
    }

    #[test]
    fn long_message_triggers_reasoning_signal() {
        let routed = route(None, &user(&"x".repeat(801)), false, None, &catalog());
        assert_eq!(routed.reason, RouteReason::Reasoning);
    }

    #[test]
    fn short_plain_message_routes_fast() {
        let routed = route(None, &user("hi there"), false, None, &catalog());
        assert_eq!(routed.model_id, catalog().fast);
        assert_eq!(routed.reason, RouteReason::Fast);
    }

    #[test]
    fn empty_history_routes_fast() {
        let routed = route(None, &[], false, None, &catalog());
        assert_eq!(routed.reason, RouteReason::Fast);
    }

    #[test]
    fn default_chat_model_id_defers_to_router() {
        let routed = route(Some("chat-model"), &user("hello"), false, None, &catalog());
        assert_eq!(routed.reason, RouteReason::Fast);
    }
}
