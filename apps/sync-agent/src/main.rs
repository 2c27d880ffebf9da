//! # Norko Sync Agent
//!
//! Headless process that keeps a register's offline store reconciled with
//! the store server.
//!
//! ## Startup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  1. tracing (RUST_LOG, default "info,norko=debug,sqlx=warn")            │
//! │  2. SyncConfig: sync.toml (or argv[1]) + NORKO_* overrides              │
//! │  3. local store; on failure run online-only with UnavailableStore       │
//! │  4. probe the server once for the initial connectivity state            │
//! │  5. start SyncEngine + ConnectivityProbe                                │
//! │  6. wait for Ctrl+C / SIGTERM, then shut both down                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use norko_db::{Database, DbConfig};
use norko_sync::{
    probe_once, ConnectivityProbe, HttpRemoteApi, LocalStore, SyncConfig, SyncEngineBuilder,
    TracingEmitter, UnavailableStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting Norko sync agent...");

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = SyncConfig::load_or_default(config_path);
    info!(
        device_id = %config.device_id(),
        server = %config.server.base_url,
        "Configuration loaded"
    );

    let store = open_store(&config).await;

    let remote = Arc::new(
        HttpRemoteApi::from_config(&config).context("Failed to create HTTP client")?,
    );
    let initial = probe_once(remote.as_ref()).await;
    info!(state = %initial, "Initial connectivity probed");

    let engine = SyncEngineBuilder::new(config.clone())
        .with_store(store)
        .with_remote(remote.clone())
        .with_emitter(Arc::new(TracingEmitter))
        .with_initial_connectivity(initial)
        .build()
        .context("Failed to build sync engine")?
        .start()
        .await;

    let probe = ConnectivityProbe::spawn(remote, engine.clone(), &config.connectivity);

    shutdown_signal().await;

    if let Err(e) = probe.shutdown().await {
        warn!(error = %e, "Connectivity probe already stopped");
    }
    engine
        .shutdown()
        .await
        .context("Failed to stop sync engine")?;

    info!("Sync agent shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=norko=trace` - Show trace for norko crates only
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,norko=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Opens the SQLite store, falling back to online-only mode.
async fn open_store(config: &SyncConfig) -> Arc<dyn LocalStore> {
    let path = match config.database_path() {
        Ok(path) => path,
        Err(e) => {
            error!(error = %e, "No local store path, offline mode disabled");
            return Arc::new(UnavailableStore::new(e.to_string()));
        }
    };

    match Database::new(DbConfig::new(&path)).await {
        Ok(db) => {
            info!(path = %path.display(), "Local store opened");
            Arc::new(db)
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to open local store, offline mode disabled");
            Arc::new(UnavailableStore::new(e.to_string()))
        }
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
