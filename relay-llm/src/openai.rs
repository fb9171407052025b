use crate::backend::LanguageModel;
use crate::error::{LlmError, Result};
use crate::types::{ChatMessage, ChatResponse, Role, ToolCall, ToolDefinition, Usage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Chat backend for any OpenAI-compatible completions endpoint.
///
/// Catalog model ids carry a provider prefix ("google-gemini-3-pro"); the
/// prefix is stripped before the id goes on the wire.
#[derive(Clone)]
pub struct OpenAiCompatBackend {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiCompatBackend {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(%e, "reqwest client build failed; falling back to default client");
                reqwest::Client::new()
            });
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatBackend {
    #[tracing::instrument(level = "info", skip_all, fields(model_id = %model_id))]
    async fn chat(
        &self,
        model_id: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse> {
        let request = WireChatRequest::new(api_model_name(model_id), messages, tools);

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: WireChatResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::InvalidResponse(format!("chat completion json: {e}")))?;
        parsed.into_chat_response()
    }
}

fn api_model_name(model_id: &str) -> &str {
    for prefix in ["openai-", "google-", "anthropic-"] {
        if let Some(stripped) = model_id.strip_prefix(prefix) {
            return stripped;
        }
    }
    model_id
}

#[derive(Debug, Serialize)]
struct WireChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
}

impl WireChatRequest {
    fn new(model: &str, messages: &[ChatMessage], tools: &[ToolDefinition]) -> Self {
        let tools: Vec<WireTool> = tools
            .iter()
            .map(|t| WireTool {
                r#type: "function".to_string(),
                function: WireToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect();
        Self {
            model: model.to_string(),
            messages: messages.iter().map(WireMessage::from_chat).collect(),
            tool_choice: (!tools.is_empty()).then(|| "auto".to_string()),
            tools,
        }
    }
}

#[derive(Debug, Serialize)]
struct WireTool {
    r#type: String,
    function: WireToolFunction,
}

#[derive(Debug, Serialize)]
struct WireToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl WireMessage {
    fn from_chat(message: &ChatMessage) -> Self {
        let role = match message.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        Self {
            role: role.to_string(),
            content: message.content.clone(),
            tool_calls: message
                .tool_calls
                .iter()
                .map(|tc| WireToolCall {
                    id: tc.id.clone(),
                    r#type: "function".to_string(),
                    function: WireToolCallFunction {
                        name: tc.name.clone(),
                        arguments: tc.arguments.clone(),
                    },
                })
                .collect(),
            tool_call_id: message.tool_call_id.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    r#type: String,
    function: WireToolCallFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCallFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireChatResponse {
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: Option<u64>,
    #[serde(default)]
    completion_tokens: Option<u64>,
}

impl WireChatResponse {
    fn into_chat_response(mut self) -> Result<ChatResponse> {
        if self.choices.is_empty() {
            return Err(LlmError::InvalidResponse(
                "chat completion had no choices".to_string(),
            ));
        }
        let choice = self.choices.remove(0);

        let tool_calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .into_iter()
            .map(|tc| ToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect();

        let usage = self
            .usage
            .map(|u| Usage {
                prompt_tokens: u.prompt_tokens.unwrap_or(0) as u32,
                completion_tokens: u.completion_tokens.unwrap_or(0) as u32,
            })
            .unwrap_or_default();

        Ok(ChatResponse {
            message: ChatMessage {
                role: Role::Assistant,
                content: choice.message.content.unwrap_or_default(),
                tool_calls,
                tool_call_id: None,
            },
            usage,
            finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_prefix_is_stripped_for_the_wire() {
        assert_eq!(api_model_name("google-gemini-3-pro"), "gemini-3-pro");
        assert_eq!(api_model_name("openai-gpt-4o"), "gpt-4o");
        assert_eq!(api_model_name("gpt-4o-mini"), "gpt-4o-mini");
    }

    #[test]
    fn response_parsing_extracts_tool_calls_and_usage() {
        let body = serde_json::json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": { "name": "search", "arguments": "{\"query\":\"x\"}" }
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 3 }
        });
        let parsed: WireChatResponse = serde_json::from_value(body).unwrap();
        let response = parsed.into_chat_response().unwrap();
        assert_eq!(response.message.tool_calls.len(), 1);
        assert_eq!(response.message.tool_calls[0].name, "search");
        assert_eq!(response.usage.prompt_tokens, 12);
        assert_eq!(response.finish_reason, "tool_calls");
    }

    #[test]
    fn empty_choices_is_an_invalid_response() {
        let parsed: WireChatResponse =
            serde_json::from_value(serde_json::json!({ "choices": [] })).unwrap();
        assert!(matches!(
            parsed.into_chat_response(),
            Err(LlmError::InvalidResponse(_))
        ));
    }
}
