//! Strategy sync cycle.
//!
//! Each cycle:
//! 1. Loads enabled strategies from the store (failure aborts the cycle)
//! 2. Resolves each strategy's scope against the service tree
//! 3. Assigns each strategy to a judge through the hash ring
//! 4. Appends partner strategies fetched over HTTP, when enabled
//! 5. Publishes the result as one snapshot
//!
//! Failures in steps 2 to 4 only drop the affected strategy (or the
//! partner set) for this cycle and are recorded in the [`SyncReport`].

mod expand;
mod loader;
mod remote;
mod shard;
mod worker;

use monstra_hashring::RingError;
use thiserror::Error;

use crate::store::StoreError;

pub use expand::ScopeExpander;
pub use loader::StraLoader;
pub use remote::{RemoteError, RemoteStraClient, RemoteStraResponse, MAX_ERROR_BODY_BYTES};
pub use shard::{Sharder, StraSource, REMOTE_KEY_PREFIX};
pub use worker::{SyncWorker, SyncWorkerConfig};

/// Why a strategy was left out of a cycle's snapshot.
#[derive(Debug, Error)]
pub enum SkipReason {
    /// Descendant nodes of an inheriting strategy could not be resolved.
    #[error("resolve related nodes of {nid}: {source}")]
    RelatedNodes {
        nid: i64,
        #[source]
        source: StoreError,
    },

    /// Leaf nodes of a leaf-enumerating strategy could not be resolved.
    #[error("resolve leaf nodes of {nid}: {source}")]
    LeafNodes {
        nid: i64,
        #[source]
        source: StoreError,
    },

    /// Hosts of one of the strategy's leaves could not be listed.
    #[error("list hosts under leaf {leaf}: {source}")]
    Hosts {
        leaf: i64,
        #[source]
        source: StoreError,
    },

    /// The hash ring could not place the strategy.
    #[error("assign judge for key {key}: {source}")]
    Assign {
        key: String,
        #[source]
        source: RingError,
    },
}

/// A strategy dropped from the current cycle.
#[derive(Debug)]
pub struct Skipped {
    pub stra_id: i64,
    pub source: StraSource,
    pub reason: SkipReason,
}

/// Outcome of one successful sync cycle.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Snapshot generation that was published.
    pub generation: u64,

    /// Strategies placed in the snapshot.
    pub published: usize,

    /// Partner strategies among `published`.
    pub remote_published: usize,

    /// Strategies dropped from this cycle.
    pub skipped: Vec<Skipped>,

    /// Partner fetch failure, if the integration is enabled and failed.
    pub remote_error: Option<RemoteError>,
}
