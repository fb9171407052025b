//! In-memory conversation state, keyed by conversation id. Durable state
//! (suspended runs) lives in the run store; sessions only give multi-turn
//! requests their accumulated history.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use relay_llm::{ChatMessage, Usage};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub history: Vec<ChatMessage>,
    pub usage_totals: Usage,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl Session {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            history: Vec::new(),
            usage_totals: Usage::default(),
            created_at: now,
            last_active: now,
        }
    }
}

#[derive(Default)]
pub struct SessionManager {
    sessions: DashMap<String, Session>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self, conversation_id: &str) -> Vec<ChatMessage> {
        self.sessions
            .get(conversation_id)
            .map(|s| s.history.clone())
            .unwrap_or_default()
    }

    pub fn finish_turn(&self, conversation_id: &str, history: Vec<ChatMessage>, usage: &Usage) {
        let mut session = self
            .sessions
            .entry(conversation_id.to_string())
            .or_insert_with(Session::new);
        session.history = history;
        session.usage_totals.prompt_tokens += usage.prompt_tokens;
        session.usage_totals.completion_tokens += usage.completion_tokens;
        session.last_active = Utc::now();
    }

    pub fn reset(&self, conversation_id: &str) {
        self.sessions.remove(conversation_id);
    }
}
