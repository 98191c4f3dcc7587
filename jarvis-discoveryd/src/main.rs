mod api;
mod config;
mod directory;
mod directory_manager;
mod mdns;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use mdns_sd::ServiceDaemon;
use anyhow::{Context, Result};
use crate::directory::Directory;
use crate::directory_manager::DirectoryHandle;
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("jarvis_discoveryd=info"))
        )
        .init();

    tracing::info!("Starting jarvis-discoveryd");

    // Optional TOML config file, then environment overrides
    let mut config = match std::env::args().nth(1) {
        Some(config_path) => {
            let config = Config::load(&config_path)
                .with_context(|| format!("Failed to load config from {}", config_path))?;
            tracing::info!("Loaded config from {}", config_path);
            config
        }
        None => Config::default(),
    };
    config.apply_env()?;

    let default_filter = config.discovery.default_filter();
    tracing::info!(
        "Discovery initialized. Service name filter: {}",
        default_filter.as_deref().unwrap_or("<none>")
    );

    // Start directory task
    let (directory, summary_rx) = DirectoryHandle::spawn(Directory::new(default_filter));

    let mdns_daemon = ServiceDaemon::new()
        .context("Failed to create mDNS daemon")?;

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Spawn mDNS browser task
    let (browser_tx, browser_rx) = mpsc::channel(256);
    let browser_cancel = cancel.clone();
    let browser_daemon = mdns_daemon.clone();
    let browse_type = config.discovery.browse_type.clone();
    let browser_handle = tokio::spawn(async move {
        if let Err(e) = mdns::browser::run_browser(browser_daemon, browse_type, browser_tx, browser_cancel).await {
            tracing::error!("mDNS browser error: {}", e);
        }
    });

    // Spawn directory manager task
    let mgr_cancel = cancel.clone();
    let mgr_directory = directory.clone();
    let mgr_handle = tokio::spawn(async move {
        if let Err(e) = directory_manager::run(mgr_directory, browser_rx, mgr_cancel).await {
            tracing::error!("Directory manager error: {}", e);
        }
    });

    // Build API router
    let app_state = api::routes::AppState {
        directory: directory.clone(),
        summary_rx,
    };
    let app = api::routes::router(app_state);

    // Bind HTTP server
    let listen_addr = config.api.listen_addr();
    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", listen_addr))?;

    tracing::info!("Discovery server listening on http://{}", listen_addr);

    // Run server with graceful shutdown
    let server_cancel = cancel.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_cancel.cancelled().await })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down discovery server...");

    // Trigger cancellation
    cancel.cancel();

    // Wait for all tasks to complete
    let _ = tokio::join!(browser_handle, mgr_handle, server_handle);

    // Stop directory task
    if let Err(e) = directory.shutdown().await {
        tracing::error!("Failed to shutdown directory: {}", e);
    }

    // Shutdown mDNS daemon
    if let Err(e) = mdns_daemon.shutdown() {
        tracing::error!("Failed to shutdown mDNS daemon: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
