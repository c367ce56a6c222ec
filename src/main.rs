//! Dual Cache admin server
//!
//! Runs a cache manager built from the environment and exposes its admin
//! endpoints over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dual_cache::api::create_router;
use dual_cache::{spawn_cleanup_task, AppState, CacheManager, Config};

/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load and validate configuration from environment variables
/// 3. Build the cache manager and probe the remote tier
/// 4. Start background TTL sweeper
/// 5. Serve the admin router until SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dual_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Dual Cache");

    let config = Config::from_env().context("loading configuration")?;
    info!(
        "Configuration loaded: namespace={}, default_ttl={}s, remote={}, port={}",
        config.namespace,
        config.default_ttl,
        config.remote_endpoint.as_deref().unwrap_or("none"),
        config.server_port
    );

    let cache = Arc::new(CacheManager::from_config(&config).context("building cache manager")?);
    match cache.is_remote_healthy().await {
        Some(true) => info!("Remote tier '{}' reachable", cache.backend_name()),
        Some(false) => warn!(
            "Remote tier '{}' unreachable, serving from local until it recovers",
            cache.backend_name()
        ),
        None => info!("No remote configured, running local-only"),
    }

    let cleanup_handle = spawn_cleanup_task(cache.local_store(), config.cleanup_interval);
    info!("Background TTL sweeper started");

    let app = create_router(AppState::new(cache));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Admin server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cleanup_handle))
        .await
        .context("serving admin API")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for Ctrl+C or SIGTERM, then stops the sweeper.
async fn shutdown_signal(cleanup_handle: tokio::task::JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    cleanup_handle.abort();
    warn!("TTL sweeper aborted");
}
