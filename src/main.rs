use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ws_relay::{
    api,
    config::RelayConfig,
    error::{RelayError, RelayResult},
    state::AppState,
    shutdown, status, tunnel, ws,
};

#[tokio::main]
async fn main() -> RelayResult<()> {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ws_relay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting relay...");

    let config = RelayConfig::from_env();
    let ws_addr = config.ws_addr();
    let api_addr = config.api_addr();
    let status_console = config.status_console;

    let state = Arc::new(AppState::new(config));

    // Resolve the public address in the background; the relay works without it
    tunnel::spawn_provisioner(state.clone());

    if status_console {
        status::spawn_status_printer(state.clone());
    }

    let relay_app = ws::router(state.clone());

    let api_app = api::router(state);

    let shutdown_rx = shutdown::spawn_shutdown_listener(tokio::signal::ctrl_c());

    tokio::try_join!(
        serve(ws_addr, relay_app, shutdown_rx.clone()),
        serve(api_addr, api_app, shutdown_rx),
    )?;

    tracing::info!("Relay stopped");
    Ok(())
}

async fn serve(
    addr: SocketAddr,
    app: Router,
    mut shutdown_rx: watch::Receiver<bool>,
) -> RelayResult<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| RelayError::Bind { addr, source })?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        })
        .await?;
    Ok(())
}
