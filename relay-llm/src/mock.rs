use crate::backend::LanguageModel;
use crate::error::Result;
use crate::types::{ChatMessage, ChatResponse, ToolCall, ToolDefinition, Usage};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Deterministic backend for tests and offline development: returns queued
/// responses in order, then a plain final message once the queue drains.
pub struct ScriptedBackend {
    responses: Mutex<VecDeque<ChatResponse>>,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(responses: Vec<ChatResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Queue an assistant turn that requests a single tool call.
    pub fn tool_call_turn(name: &str, arguments: serde_json::Value) -> ChatResponse {
        Self::tool_calls_turn(vec![(name.to_string(), arguments)])
    }

    /// Queue an assistant turn that requests several tool calls in one step.
    pub fn tool_calls_turn(calls: Vec<(String, serde_json::Value)>) -> ChatResponse {
        let tool_calls = calls
            .into_iter()
            .enumerate()
            .map(|(i, (name, arguments))| ToolCall {
                id: format!("call_{i}"),
                name,
                arguments: arguments.to_string(),
            })
            .collect();
        ChatResponse {
            message: ChatMessage {
                role: crate::types::Role::Assistant,
                content: String::new(),
                tool_calls,
                tool_call_id: None,
            },
            usage: Usage::default(),
            finish_reason: "tool_calls".to_string(),
        }
    }

    /// Queue a final assistant turn with no tool calls.
    pub fn final_turn(content: &str) -> ChatResponse {
        ChatResponse {
            message: ChatMessage::assistant(content),
            usage: Usage::default(),
            finish_reason: "stop".to_string(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for ScriptedBackend {
    async fn chat(
        &self,
        _model_id: &str,
        _messages: &[ChatMessage],
        _tools: &[ToolDefinition],
    ) -> Result<ChatResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .responses
            .lock()
            .expect("scripted backend queue lock")
            .pop_front();
        Ok(next.unwrap_or_else(|| Self::final_turn("(scripted backend queue exhausted)")))
    }
}
