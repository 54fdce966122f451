//! StyleSwap server
//!
//! Single binary serving two listeners:
//! 1. Public API: style catalog, pricing, and image generation
//! 2. Admin API: catalog, settings, and credential pool management
//!
//! Generation fails over across the credential pool stored in the settings
//! record; the catalog is served cache-first from a local snapshot.

mod admin;
mod config;
mod error;
mod metrics;
mod routes;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::Router;
use catalog_sync::{ConfigStore, ContentCache};
use key_pool::{CredentialPool, FailoverDispatcher};
use provider::GeminiGenerator;
use remote_store::{LocalStore, MemoryStore, RemoteStore, RestStore};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::admin::{AdminState, build_admin_router};
use crate::config::{Backend, Config, RemoteConfig};
use crate::routes::{AppState, build_router};

/// How long in-flight requests may run after a shutdown signal.
/// Generation calls are slow, so this is generous.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting styleswap-server");

    // Recorder first, so library counters emitted during startup are kept
    let prometheus = metrics::install_recorder().context("failed to install metrics recorder")?;

    let args: Vec<String> = std::env::args().collect();
    let config_path = Config::resolve_path(config_arg(&args));
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        admin_listen_addr = %config.server.admin_listen_addr,
        backend = ?config.remote.backend,
        model = %config.generator.model,
        fallback_key = config.generator.fallback_key.is_some(),
        "configuration loaded"
    );

    let client = reqwest::Client::new();
    let remote = build_remote(&config.remote, client.clone())?;
    let local = LocalStore::load(config.local.state_path.clone())
        .await
        .with_context(|| {
            format!(
                "failed to open local state at {}",
                config.local.state_path.display()
            )
        })?;

    let settings = Arc::new(ConfigStore::new(
        remote.clone(),
        config.defaults.to_settings(),
    ));
    let cache = ContentCache::new(remote, Arc::new(local));
    let pool = Arc::new(CredentialPool::new(
        settings.clone(),
        config.generator.fallback_key.clone(),
    ));
    let generator = Arc::new(GeminiGenerator::new(
        client,
        config.generator.base_url.clone(),
        config.generator.model.clone(),
        Duration::from_secs(config.generator.timeout_secs),
    ));
    let dispatcher = Arc::new(FailoverDispatcher::new(pool.clone(), generator));

    // Warm the snapshot; on a fresh deployment this seeds the catalog
    let styles = cache.read(false).await;
    info!(styles = styles.len(), "catalog ready");
    if pool.active().await.is_empty() {
        warn!("no active generation credentials; /generate will fail until one is added");
    }

    let app = build_router(
        AppState {
            cache: cache.clone(),
            settings: settings.clone(),
            dispatcher,
            prometheus,
            started_at: Instant::now(),
            max_upload_bytes: config.server.max_upload_bytes,
        },
        config.server.max_connections,
    );
    let admin_app = build_admin_router(AdminState::new(cache, settings, pool));

    let listener = TcpListener::bind(config.server.listen_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.server.listen_addr))?;
    let admin_listener = TcpListener::bind(config.server.admin_listen_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.server.admin_listen_addr))?;
    info!(
        addr = %config.server.listen_addr,
        admin_addr = %config.server.admin_listen_addr,
        "accepting requests"
    );

    // The drain timeout starts at signal receipt, not at server start
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let public = tokio::spawn(serve(listener, app, shutdown_rx.clone()));
    let admin = tokio::spawn(serve(admin_listener, admin_app, shutdown_rx));

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    match tokio::time::timeout(DRAIN_TIMEOUT, async { tokio::join!(public, admin) }).await {
        Ok(results) => {
            for (name, result) in [("public", results.0), ("admin", results.1)] {
                match result {
                    Ok(Ok(())) => info!(listener = name, "listener drained"),
                    Ok(Err(e)) => error!(listener = name, error = %e, "server error during shutdown"),
                    Err(e) => error!(listener = name, error = %e, "server task panicked"),
                }
            }
        }
        Err(_) => warn!(
            drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "drain timeout exceeded, forcing shutdown"
        ),
    }

    info!("shutdown complete");
    Ok(())
}

/// Value following `--config`, if any.
fn config_arg(args: &[String]) -> Option<&str> {
    args.iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn build_remote(config: &RemoteConfig, client: reqwest::Client) -> Result<Arc<dyn RemoteStore>> {
    match config.backend {
        Backend::Memory => {
            warn!("using in-memory remote store; catalog and settings are lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        Backend::Rest => {
            let (Some(url), Some(key)) = (config.url.as_deref(), config.api_key.clone()) else {
                anyhow::bail!("rest backend needs remote.url and a store key");
            };
            Ok(Arc::new(RestStore::new(
                client,
                url,
                key,
                Duration::from_secs(config.timeout_secs),
            )))
        }
    }
}

/// Serve until the shutdown flag flips, then drain.
async fn serve(
    listener: TcpListener,
    app: Router,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await
}

/// Wait for SIGTERM or SIGINT.
///
/// If a handler cannot be installed, that branch never fires and the other
/// one still can.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
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
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
