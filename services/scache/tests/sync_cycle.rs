//! Integration tests for the sync cycle.
//!
//! These tests drive full cycles against the in-memory store:
//! 1. Strategies are loaded and their scopes resolved
//! 2. Each strategy is placed on a judge through the rendezvous ring
//! 3. The snapshot is published atomically
//!
//! Worker loop timing runs on tokio's paused clock.

use std::sync::Arc;
use std::time::Duration;

use monstra_hashring::{HashRing, RendezvousRing};
use monstra_model::{Expression, Strategy, CATEGORY_INHERIT};
use monstra_scache::cache::{StraCache, StraSnapshot};
use monstra_scache::cleanup::{CleanupWorker, CleanupWorkerConfig};
use monstra_scache::store::MemoryStore;
use monstra_scache::sync::{
    ScopeExpander, Sharder, SkipReason, StraLoader, StraSource, SyncWorker, SyncWorkerConfig,
};
use tokio::sync::watch;

const JUDGES: [&str; 3] = ["judge-a:6036", "judge-b:6036", "judge-c:6036"];

struct Harness {
    store: Arc<MemoryStore>,
    cache: Arc<StraCache>,
    worker: SyncWorker,
}

fn harness_with_ring(store: Arc<MemoryStore>, ring: RendezvousRing) -> Harness {
    let cache = Arc::new(StraCache::new());
    let worker = SyncWorker::new(
        StraLoader::new(store.clone()),
        ScopeExpander::new(store.clone()),
        Sharder::new(Arc::new(ring)),
        cache.clone(),
        SyncWorkerConfig {
            interval: Duration::from_secs(10),
        },
    );

    Harness {
        store,
        cache,
        worker,
    }
}

async fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    store.insert_node(10, "corp", false).await;
    store.insert_node(20, "corp.web", true).await;
    store.insert_node(21, "corp.db", true).await;
    store.bind_hosts(20, ["h1", "h2"]).await;
    store.bind_hosts(21, ["h2", "h3"]).await;

    harness_with_ring(store, RendezvousRing::new(JUDGES))
}

fn cpu_stra() -> Strategy {
    let mut stra = Strategy::new(1, 10, CATEGORY_INHERIT);
    stra.exprs = vec![Expression::metric("cpu.busy")];
    stra
}

/// Every (judge, strategy) pair in a snapshot.
fn placements(snapshot: &StraSnapshot) -> Vec<(String, Strategy)> {
    let mut out: Vec<(String, Strategy)> = snapshot
        .judges()
        .flat_map(|judge| {
            snapshot
                .for_judge(judge)
                .iter()
                .map(move |s| (judge.to_string(), s.clone()))
        })
        .collect();
    out.sort_by_key(|(_, s)| s.id);
    out
}

#[tokio::test]
async fn test_inheriting_strategy_end_to_end() {
    let h = harness().await;
    h.store.insert_stra(cpu_stra()).await;

    let report = h.worker.sync_once().await.unwrap();
    assert_eq!(report.published, 1);
    assert!(report.skipped.is_empty());

    let snapshot = h.cache.load();
    let placed = placements(&snapshot);
    assert_eq!(placed.len(), 1);

    let (judge, stra) = &placed[0];
    assert_eq!(stra.nids, vec!["20", "21", "10"]);
    assert_eq!(
        *judge,
        RendezvousRing::new(JUDGES).assign("1").unwrap(),
        "placement must follow the ring key of the strategy id"
    );

    // Identical cycles place the strategy identically.
    for _ in 0..3 {
        h.worker.sync_once().await.unwrap();
        let again = placements(&h.cache.load());
        assert_eq!(again, placed);
    }
    assert_eq!(h.cache.generation(), 4);
}

#[tokio::test]
async fn test_leaf_strategy_end_to_end() {
    let h = harness().await;
    h.store.insert_stra(Strategy::new(2, 10, 1)).await;

    h.worker.sync_once().await.unwrap();

    let placed = placements(&h.cache.load());
    assert_eq!(placed.len(), 1);
    assert_eq!(placed[0].1.endpoints, vec!["h1", "h2", "h3"]);
    assert_eq!(placed[0].1.leaf_nids, vec![20, 21]);
    assert!(placed[0].1.nids.is_empty());
}

#[tokio::test]
async fn test_listing_failure_keeps_previous_snapshot() {
    let h = harness().await;
    h.store.insert_stra(cpu_stra()).await;
    h.worker.sync_once().await.unwrap();
    let before = h.cache.load();

    h.store.set_fail_listing(true).await;
    assert!(h.worker.sync_once().await.is_err());

    let after = h.cache.load();
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(after.len(), 1);

    // The next successful cycle heals.
    h.store.set_fail_listing(false).await;
    h.worker.sync_once().await.unwrap();
    assert_eq!(h.cache.generation(), 2);
}

#[tokio::test]
async fn test_one_bad_strategy_does_not_abort_cycle() {
    let h = harness().await;
    h.store.insert_stra(cpu_stra()).await;
    h.store.insert_stra(Strategy::new(2, 10, 1)).await;
    // Scope node 77 does not exist.
    h.store.insert_stra(Strategy::new(3, 77, 1)).await;
    // Leaf 31's hosts cannot be listed, failing strategy 4 only.
    h.store.insert_node(30, "ops", false).await;
    h.store.insert_node(31, "ops.lb", true).await;
    h.store.fail_node(31).await;
    h.store.insert_stra(Strategy::new(4, 30, 1)).await;

    let report = h.worker.sync_once().await.unwrap();

    assert_eq!(report.published, 2);
    assert_eq!(report.skipped.len(), 2);
    assert!(report
        .skipped
        .iter()
        .all(|s| s.source == StraSource::Native));
    assert!(matches!(
        report.skipped[0].reason,
        SkipReason::LeafNodes { nid: 77, .. }
    ));
    assert!(matches!(
        report.skipped[1].reason,
        SkipReason::Hosts { leaf: 31, .. }
    ));

    let ids: Vec<i64> = placements(&h.cache.load())
        .into_iter()
        .map(|(_, s)| s.id)
        .collect();
    assert_eq!(ids, vec![1, 2]);
}

#[tokio::test]
async fn test_empty_ring_publishes_empty_snapshot() {
    let store = Arc::new(MemoryStore::new());
    store.insert_node(10, "corp", false).await;
    store.insert_stra(cpu_stra()).await;
    let h = harness_with_ring(store, RendezvousRing::default());

    let report = h.worker.sync_once().await.unwrap();
    assert_eq!(report.published, 0);
    assert!(matches!(
        report.skipped[0].reason,
        SkipReason::Assign { ref key, .. } if key == "1"
    ));
    assert_eq!(h.cache.generation(), 1);
    assert!(h.cache.load().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_worker_syncs_immediately_then_on_interval() {
    let h = harness().await;
    h.store.insert_stra(cpu_stra()).await;
    let cache = h.cache.clone();
    let worker = h.worker;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(async move { worker.run(shutdown_rx).await });

    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(cache.generation(), 1);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(cache.generation(), 2);

    tokio::time::sleep(Duration::from_secs(25)).await;
    assert_eq!(cache.generation(), 4);

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_cleanup_worker_waits_one_interval() {
    let store = Arc::new(MemoryStore::new());
    store.insert_node(10, "corp", false).await;
    store.insert_stra(Strategy::new(1, 10, 2)).await;
    store.insert_stra(Strategy::new(2, 11, 2)).await;

    let worker = CleanupWorker::new(store.clone(), CleanupWorkerConfig::default());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move { worker.run(shutdown_rx).await });

    tokio::time::sleep(Duration::from_secs(299)).await;
    assert_eq!(store.stra_ids().await, vec![1, 2]);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(store.stra_ids().await, vec![1]);

    // Node removal is picked up on a later pass.
    store.remove_node(10).await;
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert!(store.stra_ids().await.is_empty());

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();
}
