//! Sync background worker.
//!
//! Runs one sync cycle immediately on start, then every `interval`. A
//! cycle that cannot list strategies publishes nothing; the next tick
//! retries.

use std::time::Duration;

use monstra_model::Strategy;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument, warn};

use super::{
    ScopeExpander, Sharder, SkipReason, Skipped, StraLoader, StraSource, SyncReport,
};
use crate::cache::{SharedStraCache, SnapshotBuilder};
use crate::store::StoreError;

#[derive(Debug, Clone)]
pub struct SyncWorkerConfig {
    pub interval: Duration,
}

impl Default for SyncWorkerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(9),
        }
    }
}

/// Periodically rebuilds and publishes the strategy snapshot.
pub struct SyncWorker {
    loader: StraLoader,
    expander: ScopeExpander,
    sharder: Sharder,
    cache: SharedStraCache,
    config: SyncWorkerConfig,
}

impl SyncWorker {
    pub fn new(
        loader: StraLoader,
        expander: ScopeExpander,
        sharder: Sharder,
        cache: SharedStraCache,
        config: SyncWorkerConfig,
    ) -> Self {
        Self {
            loader,
            expander,
            sharder,
            cache,
            config,
        }
    }

    /// Run the sync worker until shutdown is signaled.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            remote_enabled = self.loader.remote_enabled(),
            "Starting sync worker"
        );

        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.run_cycle().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Sync worker shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn run_cycle(&self) {
        match self.sync_once().await {
            Ok(report) => {
                info!(
                    generation = report.generation,
                    published = report.published,
                    remote_published = report.remote_published,
                    skipped = report.skipped.len(),
                    remote_failed = report.remote_error.is_some(),
                    "Sync cycle complete"
                );
            }
            Err(e) => {
                error!(
                    error = %e,
                    generation = self.cache.generation(),
                    "Sync cycle aborted; keeping previous snapshot"
                );
            }
        }
    }

    /// Run a single sync cycle and publish its snapshot.
    ///
    /// Only a failure to list the enabled strategies is returned as an
    /// error; everything else is recorded in the report.
    pub async fn sync_once(&self) -> Result<SyncReport, StoreError> {
        let stras = self.loader.load_active().await?;

        let mut report = SyncReport::default();
        let mut builder = SnapshotBuilder::new();

        for stra in stras {
            let stra_id = stra.id;
            match self.place_native(stra).await {
                Ok((judge, stra)) => builder.push(judge, stra),
                Err(reason) => report.skip(stra_id, StraSource::Native, reason),
            }
        }

        match self.loader.load_supplementary().await {
            None => {}
            Some(Ok(stras)) => {
                for stra in stras {
                    match self.sharder.assign(StraSource::Remote, &stra) {
                        Ok(judge) => {
                            builder.push(judge, stra);
                            report.remote_published += 1;
                        }
                        Err(reason) => report.skip(stra.id, StraSource::Remote, reason),
                    }
                }
            }
            Some(Err(e)) => {
                error!(error = %e, "Failed to fetch partner strategies; continuing without them");
                report.remote_error = Some(e);
            }
        }

        report.published = builder.len();
        report.generation = self.cache.publish(builder).generation;

        Ok(report)
    }

    async fn place_native(&self, stra: Strategy) -> Result<(String, Strategy), SkipReason> {
        let stra = self.expander.expand(stra).await?;
        let judge = self.sharder.assign(StraSource::Native, &stra)?;
        Ok((judge, stra))
    }
}

impl SyncReport {
    fn skip(&mut self, stra_id: i64, source: StraSource, reason: SkipReason) {
        warn!(
            stra_id,
            source = %source,
            error = %reason,
            "Strategy left out of this cycle"
        );
        self.skipped.push(Skipped {
            stra_id,
            source,
            reason,
        });
    }
}
