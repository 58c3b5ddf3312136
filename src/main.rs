//! Joystick Relay Server - joystick input relay and authoritative game state
//!
//! This is the main entry point. It runs:
//! - Samplers for locally attached joysticks (serial or GPIO)
//! - The relay task forwarding joystick events to every client
//! - The game state aggregator and its broadcast fan-out
//! - HTTP/WebSocket endpoints for clients

mod app;
mod config;
mod game;
mod hardware;
mod http;
mod relay;
mod util;
mod ws;

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::AppState;
use crate::config::Config;
use crate::http::build_router;
use crate::relay::{run_relay, start_samplers};
use crate::util::time::init_server_time;

/// Relay channel depth; publishers drop samples rather than wait on it
const RELAY_BUFFER: usize = 32;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    // Initialize server time tracking
    init_server_time();

    info!("Starting Joystick Relay Server");
    info!("Server address: {}", config.server_addr);

    // Create application state and spawn the aggregator
    let (state, aggregator) = AppState::new(config.clone());
    tokio::spawn(aggregator.run());

    // Spawn relay and samplers
    let (event_tx, event_rx) = mpsc::channel(RELAY_BUFFER);
    tokio::spawn(run_relay(event_rx, state.fanout.clone()));

    let samplers = start_samplers(&config, &event_tx).await;
    drop(event_tx);
    info!(samplers = samplers.len(), "Joystick samplers running");

    // Build router
    let router = build_router(state);

    // Start server
    let addr: SocketAddr = config.server_addr;
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Dropping the samplers releases their hardware
    for sampler in samplers {
        sampler.abort();
        let _ = sampler.await;
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
