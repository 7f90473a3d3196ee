//! monstra strategy cache
//!
//! This service:
//! - Rebuilds the judge → strategies snapshot on a fixed interval
//! - Optionally merges strategies from a partner HTTP feed
//! - Serves each judge its share over HTTP
//! - Deletes strategies whose scope node was removed

use std::sync::Arc;

use anyhow::Result;
use monstra_hashring::RendezvousRing;
use monstra_scache::{
    api,
    cache::StraCache,
    cleanup::{CleanupWorker, CleanupWorkerConfig},
    config::Config,
    state::AppState,
    store::{Database, PgStore},
    sync::{
        RemoteStraClient, ScopeExpander, Sharder, StraLoader, SyncWorker, SyncWorkerConfig,
    },
};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to SCACHE_LOG_LEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting monstra strategy cache");
    info!(
        listen_addr = %config.listen_addr,
        sync_interval_secs = config.sync_interval.as_secs(),
        judge_count = config.judges.len(),
        remote_enabled = config.remote.is_some(),
        "Configuration loaded"
    );

    if config.judges.is_empty() {
        warn!("No judges configured (SCACHE_JUDGES); every strategy will be skipped");
    }

    let db = match Database::connect(&config.database).await {
        Ok(db) => db,
        Err(e) => {
            error!(error = %e, "Failed to connect to database");
            return Err(e.into());
        }
    };

    if config.dev_mode {
        info!("Running database migrations (dev mode)");
        db.run_migrations().await?;
    }

    let store = Arc::new(PgStore::new(db.pool().clone()));
    let cache = Arc::new(StraCache::new());
    let ring = Arc::new(RendezvousRing::new(config.judges.clone()));

    let mut loader = StraLoader::new(store.clone());
    if let Some(remote) = &config.remote {
        loader = loader.with_remote(RemoteStraClient::new(&remote.url, remote.timeout)?);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sync_worker = SyncWorker::new(
        loader,
        ScopeExpander::new(store.clone()),
        Sharder::new(ring),
        cache.clone(),
        SyncWorkerConfig {
            interval: config.sync_interval,
        },
    );
    let sync_handle = tokio::spawn({
        let shutdown_rx = shutdown_rx.clone();
        async move {
            sync_worker.run(shutdown_rx).await;
        }
    });

    let cleanup_worker = CleanupWorker::new(store, CleanupWorkerConfig::default());
    let cleanup_handle = tokio::spawn({
        let shutdown_rx = shutdown_rx.clone();
        async move {
            cleanup_worker.run(shutdown_rx).await;
        }
    });

    let app = api::create_router(AppState::new(cache));
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Listening for connections");

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let mut shutdown_rx = shutdown_rx;
                while !*shutdown_rx.borrow() {
                    if shutdown_rx.changed().await.is_err() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = server_handle => {
            match result {
                Ok(Ok(())) => info!("Server exited normally"),
                Ok(Err(e)) => error!(error = %e, "Server error"),
                Err(e) => error!(error = %e, "Server task panicked"),
            }
        }
    }

    let _ = shutdown_tx.send(true);

    info!("Waiting for workers to shut down...");
    let shutdown_timeout = std::time::Duration::from_secs(10);

    if tokio::time::timeout(shutdown_timeout, sync_handle).await.is_err() {
        warn!("Sync worker did not shut down in time");
    }
    if tokio::time::timeout(shutdown_timeout, cleanup_handle).await.is_err() {
        warn!("Cleanup worker did not shut down in time");
    }

    info!("Strategy cache stopped");
    Ok(())
}
