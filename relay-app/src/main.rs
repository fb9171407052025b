//! Relay binary: serve the agent API, or inspect the deployment.

mod approvals;
mod config;
mod http_auth;
mod orchestrator;
mod routes;
mod runs;
mod server;
mod session;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Debug, Parser)]
#[command(name = "relay", version, about = "Relay conversational task-execution agent")]
struct Cli {
    /// Path to config.toml (default: ~/.relay/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the relay server (default).
    Serve,
    /// Validate config and report backend/credential presence.
    Doctor,
    /// Write a starter config to ~/.relay/config.toml (idempotent).
    Init,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;
    install_panic_hook();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => server::serve(cli.config).await,
        Command::Doctor => server::doctor(cli.config).await,
        Command::Init => init_config(cli.config).await,
    }
}

async fn init_config(path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = path.unwrap_or_else(config::default_config_path);
    if path.exists() {
        println!("relay init: config already exists at {}", path.display());
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, STARTER_CONFIG).await?;
    println!("relay init: wrote {}", path.display());
    println!("next: set an API key (OPENAI_API_KEY or GEMINI_API_KEY) and run `relay serve`");
    Ok(())
}

const STARTER_CONFIG: &str = r#"[general]
default_model = "chat-model"
step_budget = 20

[server]
bind = "127.0.0.1"
port = 8080

[security]
# gateway_token = "change-me"

[workspace]
# root = "/path/to/workspace"

[storage]
# db_path = "/path/to/relay.db"
"#;

fn init_tracing() -> anyhow::Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(v) => v,
        Err(_) => EnvFilter::new("info,relay=debug,relay_app=debug,relay_llm=debug,relay_tools=debug,tower_http=info"),
    };
    let log_format = std::env::var("RELAY_LOG_FORMAT")
        .unwrap_or_else(|_| "compact".to_string())
        .to_ascii_lowercase();

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
                .with_target(true)
                .json()
                .flatten_event(true)
                .init();
        }
        "pretty" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
                .with_target(true)
                .pretty()
                .init();
        }
        "compact" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .compact()
                .init();
        }
        other => {
            return Err(anyhow::anyhow!(
                "unsupported RELAY_LOG_FORMAT={other:?}; expected one of: json, pretty, compact"
            ));
        }
    }
    Ok(())
}

fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = panic_payload_to_string(panic_info.payload());
        tracing::error!(
            panic_location = %location,
            panic_payload = %payload,
            "panic captured"
        );
        default_hook(panic_info);
    }));
}

fn panic_payload_to_string(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        return msg.to_string();
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }
    "non-string panic payload".to_string()
}
