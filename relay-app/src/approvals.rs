//! Approval-gate state machine. One state per gated invocation; transitions
//! are monotonic and terminal once a decision lands.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    Pending,
    Approved,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approve,
    Deny,
}

impl ApprovalState {
    /// Apply a human decision. Only `Pending` accepts one; Approved and
    /// Denied are terminal.
    pub fn apply(self, decision: ApprovalDecision) -> Result<Self, ApprovalStateError> {
        match self {
            Self::Pending => Ok(match decision {
                ApprovalDecision::Approve => Self::Approved,
                ApprovalDecision::Deny => Self::Denied,
            }),
            resolved => Err(ApprovalStateError::AlreadyResolved(resolved)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApprovalStateError {
    #[error("approval already resolved as {0:?}")]
    AlreadyResolved(ApprovalState),
}

/// What the orchestrator surfaces to the approval channel: just enough to
/// render a decision prompt and key the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: Uuid,
    pub tool_id: String,
    pub input: serde_json::Value,
    pub state: ApprovalState,
}

impl ApprovalRequest {
    pub fn pending(tool_id: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            tool_id: tool_id.into(),
            input,
            state: ApprovalState::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_accepts_either_decision() {
        assert_eq!(
            ApprovalState::Pending.apply(ApprovalDecision::Approve).unwrap(),
            ApprovalState::Approved
        );
        assert_eq!(
            ApprovalState::Pending.apply(ApprovalDecision::Deny).unwrap(),
            ApprovalState::Denied
        );
    }

    #[test]
    fn resolved_states_are_terminal() {
        assert!(ApprovalState::Approved.apply(ApprovalDecision::Deny).is_err());
        assert!(ApprovalState::Denied.apply(ApprovalDecision::Approve).is_err());
    }

    #[test]
    fn each_request_gets_a_fresh_id() {
        let a = ApprovalRequest::pending("shell_task", serde_json::json!({}));
        let b = ApprovalRequest::pending("shell_task", serde_json::json!({}));
        assert_ne!(a.id, b.id);
        assert_eq!(a.state, ApprovalState::Pending);
    }
}
