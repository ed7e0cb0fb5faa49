use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use chat_relay::config::{self, CliOverrides};
use chat_relay::{AppState, RelayConfig, Variant};

#[derive(Parser)]
#[command(name = "chat-relay")]
#[command(about = "WebSocket chat relay for testing the browser chat page without hardware")]
struct Args {
    /// Config file (TOML); missing file is ignored
    #[arg(short, long, default_value = config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Relay variant
    #[arg(long, value_enum)]
    variant: Option<Variant>,

    /// Host to bind to
    #[arg(short = 'b', long)]
    host: Option<String>,

    /// Port to listen on (0 for automatic)
    #[arg(short, long)]
    port: Option<u16>,

    /// Log verbosity (error, warn, info, debug, trace)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Drop inbound messages larger than this many bytes
    #[arg(long)]
    max_message_bytes: Option<usize>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            variant: self.variant,
            host: self.host.clone(),
            port: self.port,
            log_level: self.log_level.clone(),
            max_message_bytes: self.max_message_bytes,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let figment = config::load_config(&args.config, &args.overrides());
    let config = RelayConfig::from_figment(&figment)?;

    // Setup logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_directive(args.debug)));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    info!("Starting chat relay ({:?} variant)", config.variant);
    if let Some(limit) = config.max_message_bytes {
        info!("Dropping messages larger than {} bytes", limit);
    }

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    let actual_addr = listener.local_addr()?;

    info!("Listening on http://{}", actual_addr);
    info!("");
    info!("Endpoints:");
    info!("  GET  /            - Chat page");
    info!("  GET  /ws          - WebSocket relay");
    info!("  GET  /api/history - Accepted messages");
    info!("  GET  /health      - Health status");
    info!("  GET  /metrics     - Relay counters");

    let state = AppState::new(config);
    chat_relay::serve(listener, state, shutdown_signal()).await?;

    info!("Chat relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal, exiting gracefully"),
        Err(e) => {
            // Without a signal handler, run until the process is killed
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
