//! The tool-loop driver: route the model, assemble the registry for the
//! requested mode, then advance a bounded step loop. Tools whose effective
//! policy requires approval suspend the run; `resume` picks it back up once
//! a decision arrives, possibly from another process entirely.

use crate::approvals::{ApprovalDecision, ApprovalRequest, ApprovalState};
use crate::config::RelayConfig;
use crate::runs::{PendingToolCall, RunState, RunStatus};
use crate::session::SessionManager;
use anyhow::{Result, anyhow};
use relay_llm::{
    Attachment, BackendRegistry, ChatMessage, ExecutionMode, ModelCatalog, RoutedModel, ToolCall,
    route,
};
use relay_store::{ConfigStore, RunStore, ToolPolicy};
use relay_tools::{CatalogContext, RegisteredTool, ToolRegistry, build};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct TurnRequest {
    pub conversation_id: String,
    pub message: String,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub mode: ExecutionMode,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TurnOutcome {
    Completed {
        run_id: Uuid,
        conversation_id: String,
        model: RoutedModel,
        reply: String,
        steps_used: usize,
    },
    AwaitingApproval {
        run_id: Uuid,
        conversation_id: String,
        model: RoutedModel,
        approval: ApprovalRequest,
    },
}

pub struct Orchestrator {
    backends: BackendRegistry,
    store: Arc<dyn ConfigStore>,
    runs: Arc<dyn RunStore>,
    sessions: Arc<SessionManager>,
    catalog_ctx: CatalogContext,
    model_catalog: ModelCatalog,
    default_model: String,
    system_prompt: String,
    step_budget: usize,
}

impl Orchestrator {
    pub fn new(
        cfg: &RelayConfig,
        backends: BackendRegistry,
        store: Arc<dyn ConfigStore>,
        runs: Arc<dyn RunStore>,
        sessions: Arc<SessionManager>,
    ) -> Self {
        Self {
            backends,
            catalog_ctx: CatalogContext {
                workspace_root: cfg.workspace_root(),
                store: store.clone(),
            },
            store,
            runs,
            sessions,
            model_catalog: ModelCatalog::default(),
            default_model: cfg.general.default_model.clone(),
            system_prompt: cfg.general.system_prompt.clone(),
            step_budget: cfg.general.step_budget,
        }
    }

    #[tracing::instrument(
        level = "info",
        skip_all,
        fields(conversation_id = %request.conversation_id, mode = request.mode.as_str())
    )]
    pub async fn run_turn(&self, request: TurnRequest) -> Result<TurnOutcome> {
        let forced_mode = (request.mode != ExecutionMode::Auto).then_some(request.mode);
        let has_vision_input = request.attachments.iter().any(Attachment::is_image);

        let prior = self.sessions.history(&request.conversation_id);
        let mut history = Vec::with_capacity(prior.len() + 2);
        history.push(ChatMessage::system(&self.system_prompt));
        history.extend(prior);
        history.push(ChatMessage::user(&request.message));

        let explicit_model_id = request
            .model_id
            .clone()
            .unwrap_or_else(|| self.default_model.clone());
        let routed = route(
            Some(&explicit_model_id),
            &history,
            has_vision_input,
            forced_mode,
            &self.model_catalog,
        );
        tracing::info!(
            model_id = %routed.model_id,
            reason = ?routed.reason,
            history_messages = history.len(),
            "model routed"
        );

        let policies = self.policy_snapshot().await;
        let registry = build(request.mode, &policies, &self.catalog_ctx);

        let mut run = RunState::new(request.conversation_id, request.mode, routed, history);
        self.drive(&mut run, &registry).await
    }

    /// Continue a suspended run with a human decision, supplied out of band.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn resume(
        &self,
        run_id: Uuid,
        approval_id: Uuid,
        decision: ApprovalDecision,
    ) -> Result<TurnOutcome> {
        let mut run = self.load_run(run_id).await?;
        if run.status != RunStatus::AwaitingApproval {
            return Err(anyhow!(
                "run {run_id} is not awaiting approval (status: {})",
                run.status.as_str()
            ));
        }
        let Some(mut pending) = run.pending.clone() else {
            return Err(anyhow!("run {run_id} has no pending tool call"));
        };
        if pending.approval.id != approval_id {
            return Err(anyhow!(
                "approval {approval_id} does not match the pending approval for run {run_id}"
            ));
        }
        pending.approval.state = pending.approval.state.apply(decision)?;

        // A fresh snapshot: this is the next registry build, so admin policy
        // changes made while the run was suspended apply from here on.
        let policies = self.policy_snapshot().await;
        let registry = build(run.mode, &policies, &self.catalog_ctx);

        run.pending = None;
        let message = match pending.approval.state {
            ApprovalState::Denied => {
                tracing::info!(
                    tool_name = %pending.tool_call.name,
                    %approval_id,
                    "tool call denied"
                );
                ChatMessage::tool_result(
                    &pending.tool_call.id,
                    json!({ "error": "tool call denied", "approval_id": approval_id }).to_string(),
                )
            }
            ApprovalState::Approved => self.execute_approved(&registry, &pending).await,
            ApprovalState::Pending => unreachable!("apply() always leaves a terminal state"),
        };
        run.history.push(message);

        let deferred: VecDeque<ToolCall> = pending.deferred.into();
        if let Some(outcome) = self.dispatch_queue(&mut run, &registry, deferred).await? {
            return Ok(outcome);
        }
        self.drive(&mut run, &registry).await
    }

    /// Abandon a run. Its pending approval is never executed; the record is
    /// kept, marked discarded.
    pub async fn discard(&self, run_id: Uuid) -> Result<()> {
        let mut run = self.load_run(run_id).await?;
        if run.status == RunStatus::Completed {
            return Err(anyhow!("run {run_id} already completed"));
        }
        run.status = RunStatus::Discarded;
        run.touch();
        self.save(&run).await?;
        tracing::info!(%run_id, "run discarded");
        Ok(())
    }

    async fn drive(&self, run: &mut RunState, registry: &ToolRegistry) -> Result<TurnOutcome> {
        let backend = self
            .backends
            .resolve(&run.model.model_id)
            .map_err(|e| anyhow!("{e}; configure the provider's API key and restart"))?;
        let tool_defs = registry.tool_definitions();

        loop {
            if run.steps_used >= self.step_budget {
                tracing::warn!(
                    run_id = %run.id,
                    step_budget = self.step_budget,
                    "step budget exhausted"
                );
                let notice =
                    "I hit the step limit for this task before finishing; the progress so far is reflected above.";
                run.history.push(ChatMessage::assistant(notice));
                return self.complete(run, notice.to_string()).await;
            }
            run.steps_used += 1;

            let started = Instant::now();
            let response = backend
                .chat(&run.model.model_id, &run.history, &tool_defs)
                .await
                .map_err(|e| anyhow!("model call failed: {e}"))?;
            run.usage.prompt_tokens += response.usage.prompt_tokens;
            run.usage.completion_tokens += response.usage.completion_tokens;
            tracing::info!(
                run_id = %run.id,
                step = run.steps_used,
                latency_ms = started.elapsed().as_millis() as u64,
                tool_calls = response.message.tool_calls.len(),
                "model step completed"
            );

            let tool_calls = response.message.tool_calls.clone();
            let content = response.message.content.clone();
            run.history.push(response.message);

            if tool_calls.is_empty() {
                return self.complete(run, content).await;
            }
            if let Some(outcome) = self
                .dispatch_queue(run, registry, tool_calls.into())
                .await?
            {
                return Ok(outcome);
            }
        }
    }

    /// Process a step's tool calls in order. Returns the suspension outcome
    /// if one of them needs approval; the rest of the queue rides along in
    /// the run's pending state.
    async fn dispatch_queue(
        &self,
        run: &mut RunState,
        registry: &ToolRegistry,
        mut queue: VecDeque<ToolCall>,
    ) -> Result<Option<TurnOutcome>> {
        while let Some(call) = queue.pop_front() {
            let Some(registered) = registry.get(&call.name) else {
                tracing::warn!(tool_name = %call.name, "model requested unknown tool");
                run.history.push(ChatMessage::tool_result(
                    &call.id,
                    json!({ "error": format!("unknown tool: {}", call.name) }).to_string(),
                ));
                continue;
            };

            let input = match parse_arguments(&call.arguments) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(tool_name = %call.name, error = %e, "invalid tool arguments");
                    run.history.push(ChatMessage::tool_result(
                        &call.id,
                        json!({ "error": format!("invalid arguments: {e}") }).to_string(),
                    ));
                    continue;
                }
            };

            if registered.needs_approval {
                let approval = ApprovalRequest::pending(call.name.clone(), input);
                tracing::info!(
                    run_id = %run.id,
                    tool_name = %call.name,
                    approval_id = %approval.id,
                    deferred = queue.len(),
                    "tool call requires approval; suspending run"
                );
                run.pending = Some(PendingToolCall {
                    approval: approval.clone(),
                    tool_call: call,
                    deferred: queue.into(),
                });
                run.status = RunStatus::AwaitingApproval;
                run.touch();
                self.save(run).await?;
                return Ok(Some(TurnOutcome::AwaitingApproval {
                    run_id: run.id,
                    conversation_id: run.conversation_id.clone(),
                    model: run.model.clone(),
                    approval,
                }));
            }

            let message = self.execute_tool(registered, &call, input).await;
            run.history.push(message);
        }
        Ok(None)
    }

    async fn execute_tool(
        &self,
        registered: &RegisteredTool,
        call: &ToolCall,
        input: serde_json::Value,
    ) -> ChatMessage {
        let started = Instant::now();
        match registered.tool.execute(input).await {
            Ok(output) => {
                tracing::info!(
                    tool_name = %call.name,
                    latency_ms = started.elapsed().as_millis() as u64,
                    "tool call executed"
                );
                ChatMessage::tool_result(&call.id, output.to_string())
            }
            Err(e) => {
                tracing::warn!(tool_name = %call.name, error = %e, "tool call failed");
                ChatMessage::tool_result(&call.id, json!({ "error": e.to_string() }).to_string())
            }
        }
    }

    /// Run the capability an approval was granted for, exactly once, tagging
    /// the result with the approval id for audit.
    async fn execute_approved(
        &self,
        registry: &ToolRegistry,
        pending: &PendingToolCall,
    ) -> ChatMessage {
        let approval_id = pending.approval.id;
        let Some(registered) = registry.get(&pending.tool_call.name) else {
            // Disabled by an admin while suspended; the grant does not
            // outrank the newer policy.
            tracing::warn!(
                tool_name = %pending.tool_call.name,
                %approval_id,
                "approved tool no longer enabled; skipping execution"
            );
            return ChatMessage::tool_result(
                &pending.tool_call.id,
                json!({
                    "error": format!("tool {} was disabled before the approval arrived", pending.tool_call.name),
                    "approval_id": approval_id,
                })
                .to_string(),
            );
        };

        match registered.tool.execute(pending.approval.input.clone()).await {
            Ok(mut output) => {
                tracing::info!(
                    tool_name = %pending.tool_call.name,
                    %approval_id,
                    "approved tool call executed"
                );
                if let Some(map) = output.as_object_mut() {
                    map.insert("approval_id".to_string(), json!(approval_id));
                } else {
                    output = json!({ "result": output, "approval_id": approval_id });
                }
                ChatMessage::tool_result(&pending.tool_call.id, output.to_string())
            }
            Err(e) => {
                tracing::warn!(
                    tool_name = %pending.tool_call.name,
                    %approval_id,
                    error = %e,
                    "approved tool call failed"
                );
                ChatMessage::tool_result(
                    &pending.tool_call.id,
                    json!({ "error": e.to_string(), "approval_id": approval_id }).to_string(),
                )
            }
        }
    }

    async fn complete(&self, run: &mut RunState, reply: String) -> Result<TurnOutcome> {
        run.status = RunStatus::Completed;
        run.pending = None;
        run.touch();
        self.save(run).await?;

        // Session history excludes the system message; it is rebuilt fresh
        // each turn.
        let history: Vec<ChatMessage> = run.history.iter().skip(1).cloned().collect();
        self.sessions
            .finish_turn(&run.conversation_id, history, &run.usage);

        tracing::info!(
            run_id = %run.id,
            steps_used = run.steps_used,
            reply_len = reply.len(),
            "run completed"
        );
        Ok(TurnOutcome::Completed {
            run_id: run.id,
            conversation_id: run.conversation_id.clone(),
            model: run.model.clone(),
            reply,
            steps_used: run.steps_used,
        })
    }

    async fn policy_snapshot(&self) -> HashMap<String, ToolPolicy> {
        match self.store.all_tool_policies().await {
            Ok(policies) => policies
                .into_iter()
                .map(|p| (p.tool_id.clone(), p))
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "policy store unavailable; using catalog defaults");
                HashMap::new()
            }
        }
    }

    async fn load_run(&self, run_id: Uuid) -> Result<RunState> {
        let record = self
            .runs
            .load_run(&run_id.to_string())
            .await
            .map_err(|e| anyhow!("load run {run_id}: {e}"))?
            .ok_or_else(|| anyhow!("run not found: {run_id}"))?;
        Ok(RunState::from_record(&record)?)
    }

    async fn save(&self, run: &RunState) -> Result<()> {
        self.runs
            .save_run(run.to_record()?)
            .await
            .map_err(|e| anyhow!("save run {}: {e}", run.id))?;
        Ok(())
    }
}

fn parse_arguments(raw: &str) -> std::result::Result<serde_json::Value, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(serde_json::Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_llm::ScriptedBackend;
    use relay_store::{MemoryStore, StoreError, StoredCredential};

    struct Harness {
        orchestrator: Orchestrator,
        store: Arc<MemoryStore>,
        workspace: tempfile::TempDir,
    }

    fn harness(responses: Vec<relay_llm::ChatResponse>) -> Harness {
        harness_with(responses, RelayConfig::default())
    }

    fn harness_with(responses: Vec<relay_llm::ChatResponse>, mut cfg: RelayConfig) -> Harness {
        let workspace = tempfile::tempdir().unwrap();
        cfg.workspace.root = Some(workspace.path().display().to_string());

        let store = Arc::new(MemoryStore::new());
        let mut backends = BackendRegistry::new();
        // The default catalog routes sentinel requests to google-* models.
        backends.register("google", Arc::new(ScriptedBackend::new(responses)));

        let orchestrator = Orchestrator::new(
            &cfg,
            backends,
            store.clone(),
            store.clone(),
            Arc::new(SessionManager::new()),
        );
        Harness {
            orchestrator,
            store,
            workspace,
        }
    }

    fn turn(mode: ExecutionMode, message: &str) -> TurnRequest {
        TurnRequest {
            conversation_id: "conv-1".to_string(),
            message: message.to_string(),
            model_id: None,
            mode,
            attachments: vec![],
        }
    }

    fn pending_parts(outcome: &TurnOutcome) -> (Uuid, Uuid, String) {
        match outcome {
            TurnOutcome::AwaitingApproval {
                run_id, approval, ..
            } => (*run_id, approval.id, approval.tool_id.clone()),
            TurnOutcome::Completed { .. } => panic!("expected a suspended run"),
        }
    }

    #[tokio::test]
    async fn plain_reply_completes_in_one_step() {
        let h = harness(vec![ScriptedBackend::final_turn("hello there")]);
        let outcome = h
            .orchestrator
            .run_turn(turn(ExecutionMode::Coding, "hi"))
            .await
            .unwrap();
        match outcome {
            TurnOutcome::Completed {
                reply, steps_used, ..
            } => {
                assert_eq!(reply, "hello there");
                assert_eq!(steps_used, 1);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        // The turn landed in the session for the next request.
        assert_eq!(h.orchestrator.sessions.history("conv-1").len(), 2);
    }

    #[tokio::test]
    async fn unapproved_tool_executes_inline_and_feeds_the_next_step() {
        let h = harness(vec![
            ScriptedBackend::tool_call_turn("search", serde_json::json!({ "query": "rust" })),
            ScriptedBackend::final_turn("found it"),
        ]);
        let outcome = h
            .orchestrator
            .run_turn(turn(ExecutionMode::Coding, "look this up"))
            .await
            .unwrap();
        match outcome {
            TurnOutcome::Completed {
                reply, steps_used, ..
            } => {
                assert_eq!(reply, "found it");
                assert_eq!(steps_used, 2);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        let history = h.orchestrator.sessions.history("conv-1");
        assert!(
            history
                .iter()
                .any(|m| m.tool_call_id.is_some() && m.content.contains("results"))
        );
    }

    #[tokio::test]
    async fn gated_tool_suspends_without_executing() {
        let h = harness(vec![
            ScriptedBackend::tool_call_turn(
                "filesystem",
                serde_json::json!({ "operation": "write", "path": "out.txt", "content": "hi" }),
            ),
            ScriptedBackend::final_turn("done"),
        ]);
        let outcome = h
            .orchestrator
            .run_turn(turn(ExecutionMode::Coding, "write the file"))
            .await
            .unwrap();

        let (_run_id, _approval_id, tool_id) = pending_parts(&outcome);
        assert_eq!(tool_id, "filesystem");
        // The capability must not have run.
        assert!(!h.workspace.path().join("out.txt").exists());
    }

    #[tokio::test]
    async fn denied_approval_has_zero_side_effects_and_the_loop_continues() {
        let h = harness(vec![
            ScriptedBackend::tool_call_turn(
                "filesystem",
                serde_json::json!({ "operation": "write", "path": "out.txt", "content": "hi" }),
            ),
            ScriptedBackend::final_turn("acknowledged"),
        ]);
        let outcome = h
            .orchestrator
            .run_turn(turn(ExecutionMode::Coding, "write the file"))
            .await
            .unwrap();
        let (run_id, approval_id, _) = pending_parts(&outcome);

        let resumed = h
            .orchestrator
            .resume(run_id, approval_id, ApprovalDecision::Deny)
            .await
            .unwrap();
        match resumed {
            TurnOutcome::Completed { reply, .. } => assert_eq!(reply, "acknowledged"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(!h.workspace.path().join("out.txt").exists());
        let history = h.orchestrator.sessions.history("conv-1");
        assert!(history.iter().any(|m| m.content.contains("tool call denied")));
    }

    #[tokio::test]
    async fn approved_tool_executes_exactly_once_with_audit_tag() {
        let h = harness(vec![
            ScriptedBackend::tool_call_turn(
                "filesystem",
                serde_json::json!({ "operation": "write", "path": "out.txt", "content": "hi" }),
            ),
            ScriptedBackend::final_turn("written"),
        ]);
        let outcome = h
            .orchestrator
            .run_turn(turn(ExecutionMode::Coding, "write the file"))
            .await
            .unwrap();
        let (run_id, approval_id, _) = pending_parts(&outcome);

        let resumed = h
            .orchestrator
            .resume(run_id, approval_id, ApprovalDecision::Approve)
            .await
            .unwrap();
        assert!(matches!(resumed, TurnOutcome::Completed { .. }));

        let written = std::fs::read_to_string(h.workspace.path().join("out.txt")).unwrap();
        assert_eq!(written, "hi");
        let history = h.orchestrator.sessions.history("conv-1");
        assert!(
            history
                .iter()
                .any(|m| m.content.contains(&approval_id.to_string()))
        );

        // The decision is terminal: resuming again fails and nothing re-runs.
        let err = h
            .orchestrator
            .resume(run_id, approval_id, ApprovalDecision::Approve)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not awaiting approval"));
    }

    #[tokio::test]
    async fn mismatched_approval_id_leaves_the_run_suspended() {
        let h = harness(vec![ScriptedBackend::tool_call_turn(
            "filesystem",
            serde_json::json!({ "operation": "write", "path": "out.txt", "content": "hi" }),
        )]);
        let outcome = h
            .orchestrator
            .run_turn(turn(ExecutionMode::Coding, "write the file"))
            .await
            .unwrap();
        let (run_id, _approval_id, _) = pending_parts(&outcome);

        let err = h
            .orchestrator
            .resume(run_id, Uuid::new_v4(), ApprovalDecision::Approve)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not match"));
        assert!(!h.workspace.path().join("out.txt").exists());

        let record = h.store.load_run(&run_id.to_string()).await.unwrap().unwrap();
        assert_eq!(record.status, "awaiting_approval");
    }

    #[tokio::test]
    async fn discarded_run_never_executes_its_pending_capability() {
        let h = harness(vec![ScriptedBackend::tool_call_turn(
            "filesystem",
            serde_json::json!({ "operation": "write", "path": "out.txt", "content": "hi" }),
        )]);
        let outcome = h
            .orchestrator
            .run_turn(turn(ExecutionMode::Coding, "write the file"))
            .await
            .unwrap();
        let (run_id, approval_id, _) = pending_parts(&outcome);

        h.orchestrator.discard(run_id).await.unwrap();
        let err = h
            .orchestrator
            .resume(run_id, approval_id, ApprovalDecision::Approve)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not awaiting approval"));
        assert!(!h.workspace.path().join("out.txt").exists());
    }

    #[tokio::test]
    async fn unknown_tool_becomes_a_structured_error_message() {
        let h = harness(vec![
            ScriptedBackend::tool_call_turn("teleport", serde_json::json!({})),
            ScriptedBackend::final_turn("sorry"),
        ]);
        let outcome = h
            .orchestrator
            .run_turn(turn(ExecutionMode::Coding, "go"))
            .await
            .unwrap();
        assert!(matches!(outcome, TurnOutcome::Completed { .. }));
        let history = h.orchestrator.sessions.history("conv-1");
        assert!(
            history
                .iter()
                .any(|m| m.content.contains("unknown tool: teleport"))
        );
    }

    #[tokio::test]
    async fn step_budget_terminates_a_tool_hungry_model() {
        let mut cfg = RelayConfig::default();
        cfg.general.step_budget = 2;
        let h = harness_with(
            vec![
                ScriptedBackend::tool_call_turn("search", serde_json::json!({ "query": "a" })),
                ScriptedBackend::tool_call_turn("search", serde_json::json!({ "query": "b" })),
                ScriptedBackend::tool_call_turn("search", serde_json::json!({ "query": "c" })),
            ],
            cfg,
        );
        let outcome = h
            .orchestrator
            .run_turn(turn(ExecutionMode::Coding, "search forever"))
            .await
            .unwrap();
        match outcome {
            TurnOutcome::Completed {
                reply, steps_used, ..
            } => {
                assert_eq!(steps_used, 2);
                assert!(reply.contains("step limit"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn second_tool_call_in_a_step_is_deferred_across_the_suspension() {
        let h = harness(vec![
            ScriptedBackend::tool_calls_turn(vec![
                (
                    "filesystem".to_string(),
                    serde_json::json!({ "operation": "write", "path": "out.txt", "content": "hi" }),
                ),
                ("search".to_string(), serde_json::json!({ "query": "next" })),
            ]),
            ScriptedBackend::final_turn("all done"),
        ]);
        let outcome = h
            .orchestrator
            .run_turn(turn(ExecutionMode::Coding, "write then search"))
            .await
            .unwrap();
        let (run_id, approval_id, _) = pending_parts(&outcome);

        let resumed = h
            .orchestrator
            .resume(run_id, approval_id, ApprovalDecision::Approve)
            .await
            .unwrap();
        assert!(matches!(resumed, TurnOutcome::Completed { .. }));
        let history = h.orchestrator.sessions.history("conv-1");
        // The deferred search ran after the approval.
        assert!(
            history
                .iter()
                .any(|m| m.tool_call_id.is_some() && m.content.contains("next"))
        );
    }

    #[tokio::test]
    async fn explicit_model_choice_is_recorded_on_the_run() {
        let h = harness(vec![ScriptedBackend::final_turn("ok")]);
        let mut request = turn(ExecutionMode::Coding, "hi");
        request.model_id = Some("google-gemini-3-pro".to_string());
        let outcome = h.orchestrator.run_turn(request).await.unwrap();
        match outcome {
            TurnOutcome::Completed { model, .. } => {
                assert_eq!(model.model_id, "google-gemini-3-pro");
                assert_eq!(model.reason, relay_llm::RouteReason::UserSelected);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn disabled_search_round_trips_into_an_unknown_tool_error() {
        let h = harness(vec![
            ScriptedBackend::tool_call_turn("search", serde_json::json!({ "query": "x" })),
            ScriptedBackend::final_turn("could not search"),
        ]);
        h.store
            .upsert_tool_policy(relay_store::ToolPolicy::disabled("search"))
            .await
            .unwrap();

        let outcome = h
            .orchestrator
            .run_turn(turn(ExecutionMode::Coding, "search please"))
            .await
            .unwrap();
        assert!(matches!(outcome, TurnOutcome::Completed { .. }));
        let history = h.orchestrator.sessions.history("conv-1");
        assert!(
            history
                .iter()
                .any(|m| m.content.contains("unknown tool: search"))
        );
    }

    // A config store that always fails, to prove registry assembly degrades
    // to catalog defaults instead of aborting the turn.
    struct BrokenStore;

    #[async_trait::async_trait]
    impl ConfigStore for BrokenStore {
        async fn all_tool_policies(&self) -> relay_store::Result<Vec<ToolPolicy>> {
            Err(StoreError::Database("connection refused".to_string()))
        }
        async fn upsert_tool_policy(&self, _policy: ToolPolicy) -> relay_store::Result<()> {
            Err(StoreError::Database("connection refused".to_string()))
        }
        async fn credential(&self, _key: &str) -> relay_store::Result<Option<StoredCredential>> {
            Err(StoreError::Database("connection refused".to_string()))
        }
        async fn upsert_credential(
            &self,
            _key: &str,
            _value: &str,
            _active: bool,
        ) -> relay_store::Result<()> {
            Err(StoreError::Database("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn unreachable_policy_store_degrades_to_catalog_defaults() {
        let workspace = tempfile::tempdir().unwrap();
        let mut cfg = RelayConfig::default();
        cfg.workspace.root = Some(workspace.path().display().to_string());

        let runs = Arc::new(MemoryStore::new());
        let mut backends = BackendRegistry::new();
        backends.register(
            "google",
            Arc::new(ScriptedBackend::new(vec![
                ScriptedBackend::tool_call_turn("search", serde_json::json!({ "query": "x" })),
                ScriptedBackend::final_turn("searched anyway"),
            ])),
        );
        let orchestrator = Orchestrator::new(
            &cfg,
            backends,
            Arc::new(BrokenStore),
            runs,
            Arc::new(SessionManager::new()),
        );

        let outcome = orchestrator
            .run_turn(turn(ExecutionMode::Coding, "search please"))
            .await
            .unwrap();
        match outcome {
            TurnOutcome::Completed { reply, .. } => assert_eq!(reply, "searched anyway"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn empty_and_missing_arguments_parse_to_an_empty_object() {
        assert_eq!(parse_arguments("").unwrap(), serde_json::json!({}));
        assert_eq!(
            parse_arguments(r#"{"a":1}"#).unwrap(),
            serde_json::json!({ "a": 1 })
        );
        assert!(parse_arguments("{not json").is_err());
    }
}
