use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use supplydrop_server::prompt_loader;
use supplydrop_server::{router, AppState, Config};
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Address to bind, overriding HOST
    #[arg(long)]
    host: Option<std::net::IpAddr>,
    /// Port to listen on, overriding PORT
    #[arg(long)]
    port: Option<u16>,
    /// System prompt file, overriding PROMPTS_PATH
    #[arg(long)]
    prompts: Option<PathBuf>,
    /// Directory for per-call logs, overriding LOGS_DIR
    #[arg(long)]
    logs_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let args = Cli::parse();
    let mut config = Config::from_env().context("Failed to load application configuration")?;
    if let Some(host) = args.host {
        config.bind_address.set_ip(host);
    }
    if let Some(port) = args.port {
        config.bind_address.set_port(port);
    }
    if let Some(prompts) = args.prompts {
        config.prompts_path = prompts;
    }
    if let Some(logs_dir) = args.logs_dir {
        config.logs_dir = logs_dir;
    }

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    tracing::info!("Configuration loaded successfully. Starting Supply Drop voice server...");

    // --- 3. Prepare Call Logs and Prompts ---
    std::fs::create_dir_all(&config.logs_dir).with_context(|| {
        format!("Failed to create logs directory {}", config.logs_dir.display())
    })?;
    let prompts = prompt_loader::load_prompts(&config.prompts_path);
    tracing::info!(
        path = %config.prompts_path.display(),
        "Loaded system prompt ({} characters)",
        prompts.system_message.len()
    );

    // --- 4. Serve ---
    let addr = config.bind_address;
    let app = router(AppState {
        config: Arc::new(config),
        prompts: Arc::new(prompts),
    });

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for Ctrl-C: {}", e);
            }
            tracing::info!("Received Ctrl-C, shutting down...");
        })
        .await?;

    Ok(())
}
