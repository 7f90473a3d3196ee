//! Published strategy snapshot.
//!
//! The sync worker accumulates one cycle's assignments in a private
//! [`SnapshotBuilder`] and hands it to [`StraCache::publish`], which swaps
//! the whole snapshot in with a single pointer store. Judges read through
//! [`StraCache::load`] and always see one complete cycle.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use monstra_model::Strategy;
use tracing::info;

/// Immutable judge → strategies mapping for one sync cycle.
#[derive(Debug, Default)]
pub struct StraSnapshot {
    /// Number of snapshots published before and including this one.
    /// The empty boot snapshot has generation 0.
    pub generation: u64,

    /// When this snapshot was published.
    pub generated_at: Option<DateTime<Utc>>,

    by_judge: HashMap<String, Vec<Strategy>>,
}

impl StraSnapshot {
    /// Strategies assigned to `judge`, in assignment order.
    pub fn for_judge(&self, judge: &str) -> &[Strategy] {
        self.by_judge.get(judge).map(Vec::as_slice).unwrap_or_default()
    }

    /// Judge labels with at least one strategy.
    pub fn judges(&self) -> impl Iterator<Item = &str> {
        self.by_judge.keys().map(String::as_str)
    }

    /// Per-judge strategy counts.
    pub fn counts(&self) -> HashMap<String, usize> {
        self.by_judge
            .iter()
            .map(|(judge, stras)| (judge.clone(), stras.len()))
            .collect()
    }

    /// Total number of strategies across all judges.
    pub fn len(&self) -> usize {
        self.by_judge.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_judge.is_empty()
    }
}

/// Private accumulator for the next snapshot.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    by_judge: HashMap<String, Vec<Strategy>>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `stra` to the list of `judge`.
    pub fn push(&mut self, judge: String, stra: Strategy) {
        self.by_judge.entry(judge).or_default().push(stra);
    }

    pub fn len(&self) -> usize {
        self.by_judge.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_judge.is_empty()
    }
}

/// Holder of the currently published snapshot.
///
/// Single writer (the sync worker), any number of lock-free readers.
pub struct StraCache {
    snapshot: ArcSwap<StraSnapshot>,
}

impl StraCache {
    /// Create a cache holding the empty generation-0 snapshot.
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(StraSnapshot::default()),
        }
    }

    /// Replace the published snapshot with the contents of `builder`.
    pub fn publish(&self, builder: SnapshotBuilder) -> Arc<StraSnapshot> {
        let generation = self.snapshot.load().generation + 1;
        let snapshot = Arc::new(StraSnapshot {
            generation,
            generated_at: Some(Utc::now()),
            by_judge: builder.by_judge,
        });

        self.snapshot.store(Arc::clone(&snapshot));

        info!(
            generation,
            judge_count = snapshot.by_judge.len(),
            stra_count = snapshot.len(),
            "Strategy snapshot published"
        );

        snapshot
    }

    /// Take a consistent point-in-time reference to the current snapshot.
    pub fn load(&self) -> Arc<StraSnapshot> {
        self.snapshot.load_full()
    }

    /// Strategies currently assigned to `judge`.
    pub fn get(&self, judge: &str) -> Vec<Strategy> {
        self.snapshot.load().for_judge(judge).to_vec()
    }

    pub fn generation(&self) -> u64 {
        self.snapshot.load().generation
    }
}

impl Default for StraCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared cache reference.
pub type SharedStraCache = Arc<StraCache>;
