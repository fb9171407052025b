//! HTTP surface: chat turns, approval resolution, run discard, and the
//! admin policy/credential endpoints.

use crate::approvals::ApprovalDecision;
use crate::http_auth::AuthPolicy;
use crate::orchestrator::{Orchestrator, TurnRequest};
use crate::session::SessionManager;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use relay_store::{ConfigStore, ToolPolicy};
use relay_tools::ToolSettings;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

pub struct AppState {
    pub orchestrator: Orchestrator,
    pub store: Arc<dyn ConfigStore>,
    pub sessions: Arc<SessionManager>,
    pub auth: AuthPolicy,
}

pub fn router(state: Arc<AppState>) -> Router {
    let authed = Router::new()
        .route("/api/v1/chat", post(chat))
        .route(
            "/api/v1/runs/{run_id}/approvals/{approval_id}",
            post(resolve_approval),
        )
        .route("/api/v1/runs/{run_id}", delete(discard_run))
        .route("/api/v1/conversations/{conversation_id}", delete(reset_conversation))
        .route("/api/v1/admin/tools", get(list_tool_policies).post(upsert_tool_policy))
        .route("/api/v1/admin/credentials", post(upsert_credential))
        .route("/api/v1/models", get(list_models))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/api/v1/health", get(health))
        .merge(authed)
        .with_state(state)
}

async fn require_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if let Err(e) = state.auth.authorize(request.headers()) {
        tracing::warn!(path = %request.uri().path(), error = %e, "request rejected");
        return ApiError(StatusCode::UNAUTHORIZED, "unauthorized".to_string()).into_response();
    }
    next.run(request).await
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TurnRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if request.message.trim().is_empty() {
        return Err(ApiError(
            StatusCode::BAD_REQUEST,
            "message must not be empty".to_string(),
        ));
    }
    let outcome = state.orchestrator.run_turn(request).await?;
    Ok(Json(serde_json::to_value(outcome).map_err(internal)?))
}

#[derive(Debug, Deserialize)]
struct ApprovalBody {
    approved: bool,
}

async fn resolve_approval(
    State(state): State<Arc<AppState>>,
    Path((run_id, approval_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<ApprovalBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let decision = if body.approved {
        ApprovalDecision::Approve
    } else {
        ApprovalDecision::Deny
    };
    let outcome = state
        .orchestrator
        .resume(run_id, approval_id, decision)
        .await?;
    Ok(Json(serde_json::to_value(outcome).map_err(internal)?))
}

async fn discard_run(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.orchestrator.discard(run_id).await?;
    Ok(Json(json!({ "run_id": run_id, "status": "discarded" })))
}

async fn reset_conversation(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> Json<serde_json::Value> {
    state.sessions.reset(&conversation_id);
    Json(json!({ "conversation_id": conversation_id, "status": "reset" }))
}

async fn list_tool_policies(State(state): State<Arc<AppState>>) -> Json<Vec<ToolPolicy>> {
    match state.store.all_tool_policies().await {
        Ok(policies) => Json(policies),
        Err(e) => {
            // A broken store degrades the admin view, never the server.
            tracing::warn!(error = %e, "policy store unavailable; returning empty list");
            Json(Vec::new())
        }
    }
}

#[derive(Debug, Deserialize)]
struct ToolPolicyBody {
    tool_id: String,
    #[serde(default)]
    enabled: Option<bool>,
    #[serde(default)]
    needs_approval: Option<bool>,
    #[serde(default)]
    settings: Option<serde_json::Value>,
}

async fn upsert_tool_policy(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ToolPolicyBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.tool_id.trim().is_empty() {
        return Err(ApiError(
            StatusCode::BAD_REQUEST,
            "tool_id is required".to_string(),
        ));
    }
    let settings = body
        .settings
        .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));
    // Settings are validated here, at the configuration boundary.
    ToolSettings::parse(&body.tool_id, &settings)
        .map_err(|e| ApiError(StatusCode::BAD_REQUEST, e.to_string()))?;

    let mut policy = ToolPolicy::new(body.tool_id).with_settings(settings);
    policy.enabled = body.enabled.unwrap_or(true);
    policy.needs_approval = body.needs_approval;

    match state.store.upsert_tool_policy(policy).await {
        Ok(()) => Ok(Json(json!({ "success": true }))),
        Err(e) => {
            tracing::warn!(error = %e, "tool policy upsert failed; catalog defaults stay in effect");
            Ok(Json(json!({
                "success": true,
                "warning": "store unavailable, catalog defaults remain in effect"
            })))
        }
    }
}

#[derive(Debug, Deserialize)]
struct CredentialBody {
    key: String,
    value: String,
    #[serde(default = "default_true")]
    active: bool,
}

fn default_true() -> bool {
    true
}

async fn upsert_credential(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CredentialBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.key.trim().is_empty() {
        return Err(ApiError(
            StatusCode::BAD_REQUEST,
            "key is required".to_string(),
        ));
    }
    state
        .store
        .upsert_credential(&body.key, &body.value, body.active)
        .await
        .map_err(|e| internal(e))?;
    Ok(Json(json!({ "success": true })))
}

async fn list_models() -> Json<serde_json::Value> {
    Json(json!({
        "default": relay_llm::DEFAULT_CHAT_MODEL,
        "models": relay_llm::chat_models(),
    }))
}

pub struct ApiError(pub StatusCode, pub String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        let message = e.to_string();
        // Caller mistakes surface as 4xx; anything else is a server fault.
        let status = if message.contains("not found") {
            StatusCode::NOT_FOUND
        } else if message.contains("not awaiting approval")
            || message.contains("does not match")
            || message.contains("already completed")
        {
            StatusCode::CONFLICT
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        ApiError(status, message)
    }
}

fn internal(e: impl std::fmt::Display) -> ApiError {
    ApiError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
