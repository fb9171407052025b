//! Durable run state. A run that suspends for approval is written here in
//! full, so the decision can arrive from a different process or much later
//! and execution still resumes where it left off.

use crate::approvals::ApprovalRequest;
use chrono::{DateTime, Utc};
use relay_llm::{ChatMessage, ExecutionMode, RoutedModel, ToolCall, Usage};
use relay_store::{RunRecord, StoreError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    AwaitingApproval,
    Completed,
    Discarded,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AwaitingApproval => "awaiting_approval",
            Self::Completed => "completed",
            Self::Discarded => "discarded",
        }
    }
}

/// The gated tool call a run is suspended on, plus the rest of the tool
/// calls from the same assistant step, to be dispatched after the decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingToolCall {
    pub approval: ApprovalRequest,
    pub tool_call: ToolCall,
    #[serde(default)]
    pub deferred: Vec<ToolCall>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    pub id: Uuid,
    pub conversation_id: String,
    pub mode: ExecutionMode,
    pub model: RoutedModel,
    pub history: Vec<ChatMessage>,
    pub steps_used: usize,
    #[serde(default)]
    pub usage: Usage,
    pub status: RunStatus,
    #[serde(default)]
    pub pending: Option<PendingToolCall>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RunState {
    pub fn new(
        conversation_id: impl Into<String>,
        mode: ExecutionMode,
        model: RoutedModel,
        history: Vec<ChatMessage>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            conversation_id: conversation_id.into(),
            mode,
            model,
            history,
            steps_used: 0,
            usage: Usage::default(),
            status: RunStatus::Completed,
            pending: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn to_record(&self) -> Result<RunRecord, StoreError> {
        let payload =
            serde_json::to_string(self).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(RunRecord {
            id: self.id.to_string(),
            status: self.status.as_str().to_string(),
            payload,
        })
    }

    pub fn from_record(record: &RunRecord) -> Result<Self, StoreError> {
        serde_json::from_str(&record.payload)
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
