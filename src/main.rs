//! Relay gateway.
//!
//! A small edge service in front of voice and chat providers.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────────┐
//!                 │                      RELAY GATEWAY                        │
//!                 │                                                           │
//!   Client        │  ┌────────┐   ┌──────────┐   ┌──────────────┐             │
//!   ──────────────┼─▶│  http  │──▶│ security │──▶│ relay        │◀──── WS ────┼──▶ Voice upstream
//!   (WS / HTTP)   │  │ server │   │  gate    │   │ session      │             │
//!                 │  └────────┘   └────┬─────┘   └──────────────┘             │
//!                 │                    │         ┌──────────────┐             │
//!                 │                    └────────▶│ streaming    │◀─── HTTP ───┼──▶ Chat upstream
//!                 │                              │ + degradation│             │
//!                 │                              └──────────────┘             │
//!                 │   config · observability · lifecycle · admin              │
//!                 └──────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use relay_gateway::config::{load_config, validation::validate_config, ConfigError, Credentials, GatewayConfig};
use relay_gateway::lifecycle::{wait_for_signal, Shutdown};
use relay_gateway::observability::{logging, metrics};
use relay_gateway::HttpServer;

#[derive(Debug, Parser)]
#[command(name = "relay-gateway", version, about = "WebSocket relay and streaming gateway")]
struct Args {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

fn resolve_config(args: &Args) -> Result<GatewayConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(bind) = &args.bind {
        config.listener.bind_address = bind.clone();
    }
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = resolve_config(&args)?;

    logging::init_logging(config.observability.log_format);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "relay-gateway starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        relay_routes = config.relay.routes.len(),
        tenant_auth = config.auth.enabled,
        request_timeout_secs = config.timeouts.request_secs,
        dial_timeout_ms = config.timeouts.dial_ms,
        "Configuration loaded"
    );

    let credentials = Credentials::from_env(&config);

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, credentials)?;
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    let signal = wait_for_signal().await;
    tracing::info!(signal, "Shutdown signal received");
    shutdown.trigger();

    server_task.await??;
    tracing::info!("Shutdown complete");
    Ok(())
}
