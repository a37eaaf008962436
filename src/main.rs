#![cfg_attr(not(test), deny(clippy::panic))]

use clap::Parser;
use signal_relay::config;
use signal_relay::logging;
use signal_relay::server::RelayServer;
use signal_relay::websocket;
use std::net::SocketAddr;
use std::sync::Arc;

/// Signal Relay -- forwards WebRTC-style signaling between connected clients
#[derive(Parser, Debug)]
#[command(name = "signal-relay")]
#[command(about = "A real-time WebSocket signaling relay")]
#[command(version)]
struct Cli {
    /// Validate configuration and exit without starting the server.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,

    /// Listen on this port instead of the configured one.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cfg = config::load();
    if let Some(port) = cli.port {
        cfg.port = port;
    }

    if cli.print_config {
        let json = serde_json::to_string_pretty(&cfg)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    let validation_result = config::validate_config(&cfg);

    if cli.validate_config {
        match validation_result {
            Ok(()) => {
                println!("Configuration validation passed");
                println!();
                println!("Configuration summary:");
                println!("  Port: {}", cfg.port);
                println!("  Malformed policy: {}", cfg.relay.malformed_policy);
                println!("  Outbound queue: {}", cfg.relay.outbound_queue_capacity);
                println!("  Client timeout: {}s", cfg.relay.client_timeout_secs);
                println!("  Max message size: {}", cfg.websocket.max_message_size);
                println!(
                    "  Metrics auth required: {}",
                    cfg.security.require_metrics_auth
                );
                return Ok(());
            }
            Err(e) => {
                eprintln!("Configuration validation failed:\n{e}");
                std::process::exit(1);
            }
        }
    }

    validation_result?;

    let _log_guard = logging::init_with_config(&cfg.logging);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    tracing::info!(%addr, "Starting signal relay");

    let server = RelayServer::new((&cfg).into());

    let cleanup_server = server.clone();
    tokio::spawn(async move {
        cleanup_server.cleanup_task().await;
    });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let shutdown_server = server.clone();
    websocket::serve(listener, server, &cfg.security.cors_origins, async move {
        shutdown_signal().await;
        shutdown_server.shutdown();
    })
    .await?;

    tracing::info!("Signal relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C"),
        () = terminate => tracing::info!("Received SIGTERM"),
    }
}
