use crate::config::RelayConfig;
use crate::http_auth::AuthPolicy;
use crate::orchestrator::Orchestrator;
use crate::routes::{self, AppState};
use crate::session::SessionManager;
use anyhow::{Context, Result};
use relay_llm::BackendRegistry;
use relay_store::{ConfigStore, MemoryStore, RunStore, SqliteStore};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    let cfg = RelayConfig::load(config_path).await?;
    let state = build_state(&cfg).await?;

    let addr = format!("{}:{}", cfg.server.bind, cfg.server.port);
    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!(%addr, "relay listening");
    axum::serve(listener, app).await.context("serve")?;
    Ok(())
}

async fn build_state(cfg: &RelayConfig) -> Result<Arc<AppState>> {
    let workspace_root = cfg.workspace_root();
    tokio::fs::create_dir_all(&workspace_root)
        .await
        .with_context(|| format!("create workspace root {}", workspace_root.display()))?;

    let (config_store, run_store): (Arc<dyn ConfigStore>, Arc<dyn RunStore>) =
        match cfg.storage.db_path.as_ref().filter(|p| !p.trim().is_empty()) {
            Some(db_path) => {
                let path = PathBuf::from(db_path);
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .with_context(|| format!("create data dir {}", parent.display()))?;
                }
                let store = SqliteStore::open(&path)
                    .map_err(|e| anyhow::anyhow!("open store {}: {e}", path.display()))?;
                tracing::info!(db_path = %path.display(), "sqlite store opened");
                (Arc::new(store.clone()), Arc::new(store))
            }
            None => {
                tracing::warn!(
                    "no storage.db_path configured; runs and policies are in-memory and \
                     pending approvals will not survive a restart"
                );
                let store = Arc::new(MemoryStore::new());
                (store.clone(), store)
            }
        };

    let backends = BackendRegistry::from_env();
    if backends.is_empty() {
        tracing::warn!(
            "no language-model backends registered; set OPENAI_API_KEY or GEMINI_API_KEY"
        );
    }

    let auth = AuthPolicy::from_config(cfg);
    if !auth.requires_auth() {
        tracing::warn!(
            "security.gateway_token is not set; the API answers unauthenticated requests"
        );
    }

    let sessions = Arc::new(SessionManager::new());
    let orchestrator = Orchestrator::new(
        cfg,
        backends,
        config_store.clone(),
        run_store,
        sessions.clone(),
    );

    Ok(Arc::new(AppState {
        orchestrator,
        store: config_store,
        sessions,
        auth,
    }))
}

/// Validate config and report what this deployment can reach.
pub async fn doctor(config_path: Option<PathBuf>) -> Result<()> {
    let cfg = RelayConfig::load(config_path).await?;
    let backends = BackendRegistry::from_env();

    println!("relay doctor");
    println!("  default model: {}", cfg.general.default_model);
    println!("  step budget:   {}", cfg.general.step_budget);
    println!("  workspace:     {}", cfg.workspace_root().display());
    println!(
        "  storage:       {}",
        cfg.storage
            .db_path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or("(in-memory; approvals will not survive restarts)")
    );
    println!(
        "  auth:          {}",
        if AuthPolicy::from_config(&cfg).requires_auth() {
            "gateway token required"
        } else {
            "open (no gateway token)"
        }
    );
    let providers = backends.provider_ids();
    if providers.is_empty() {
        println!("  backends:      none (set OPENAI_API_KEY or GEMINI_API_KEY)");
    } else {
        println!("  backends:      {}", providers.join(", "));
    }
    Ok(())
}
