//! Removal of strategies whose scope node was deleted.

mod worker;

pub use worker::{CleanupStats, CleanupWorker, CleanupWorkerConfig, CLEANUP_INTERVAL};
