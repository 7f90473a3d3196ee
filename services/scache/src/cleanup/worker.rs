use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

use crate::store::{StoreError, StraStore};

/// Interval between cleanup passes.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct CleanupWorkerConfig {
    pub interval: Duration,
}

impl Default for CleanupWorkerConfig {
    fn default() -> Self {
        Self {
            interval: CLEANUP_INTERVAL,
        }
    }
}

/// Outcome of one cleanup pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupStats {
    pub examined: usize,
    pub deleted: usize,
    /// Node lookup failed, strategy kept.
    pub inconclusive: usize,
    pub delete_failed: usize,
}

/// Deletes strategies whose scope node no longer exists.
///
/// Only a definitive "not found" deletes; a failed lookup keeps the
/// strategy until a later pass can decide.
pub struct CleanupWorker {
    store: Arc<dyn StraStore>,
    config: CleanupWorkerConfig,
}

impl CleanupWorker {
    pub fn new(store: Arc<dyn StraStore>, config: CleanupWorkerConfig) -> Self {
        Self { store, config }
    }

    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            "Starting cleanup worker"
        );

        let mut interval = tokio::time::interval(self.config.interval);
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.run_cleanup().await {
                        Ok(stats) => {
                            if stats.deleted > 0 || stats.inconclusive > 0 {
                                info!(
                                    examined = stats.examined,
                                    deleted = stats.deleted,
                                    inconclusive = stats.inconclusive,
                                    delete_failed = stats.delete_failed,
                                    "Cleanup pass complete"
                                );
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to list strategies for cleanup");
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Cleanup worker shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Run a single cleanup pass over every persisted strategy.
    pub async fn run_cleanup(&self) -> Result<CleanupStats, StoreError> {
        let stras = self.store.list_all().await?;
        let mut stats = CleanupStats {
            examined: stras.len(),
            ..Default::default()
        };

        for stra in stras {
            match self.store.get_node(stra.nid).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    info!(stra_id = stra.id, nid = stra.nid, "Deleting strategy of missing node");
                    match self.store.delete_stra(stra.id).await {
                        Ok(()) => stats.deleted += 1,
                        Err(e) => {
                            warn!(stra_id = stra.id, error = %e, "Failed to delete strategy");
                            stats.delete_failed += 1;
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        stra_id = stra.id,
                        nid = stra.nid,
                        error = %e,
                        "Node lookup failed; keeping strategy"
                    );
                    stats.inconclusive += 1;
                }
            }
        }

        Ok(stats)
    }
}
