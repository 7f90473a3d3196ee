//! Scope resolution.
//!
//! Inheriting strategies (category 2) resolve to the ids of every node
//! below their scope node plus the scope node itself, which is always
//! last. Strategies with a "no data" condition skip the descendants and
//! resolve to the scope node alone.
//!
//! All other strategies resolve to the leaf nodes below their scope node
//! and the union of the hosts bound to those leaves, deduplicated in
//! first-seen order.

use std::collections::HashSet;
use std::sync::Arc;

use monstra_model::{ResolvedScope, Strategy};

use super::SkipReason;
use crate::store::Topology;

/// Resolves strategy scopes against the service tree.
pub struct ScopeExpander {
    topology: Arc<dyn Topology>,
}

impl ScopeExpander {
    pub fn new(topology: Arc<dyn Topology>) -> Self {
        Self { topology }
    }

    /// Resolve `stra` and return it with its derived scope fields filled.
    pub async fn expand(&self, stra: Strategy) -> Result<Strategy, SkipReason> {
        let scope = self.resolve(&stra).await?;
        Ok(stra.with_scope(scope))
    }

    /// Resolve the scope of `stra` for the current cycle.
    pub async fn resolve(&self, stra: &Strategy) -> Result<ResolvedScope, SkipReason> {
        if stra.is_inheriting() {
            self.resolve_inherited(stra).await
        } else {
            self.resolve_leaves(stra).await
        }
    }

    async fn resolve_inherited(&self, stra: &Strategy) -> Result<ResolvedScope, SkipReason> {
        let mut nids = Vec::new();

        if stra.inherits_descendants() {
            let related = self
                .topology
                .related_ids(stra.nid, &stra.excl_nid)
                .await
                .map_err(|source| SkipReason::RelatedNodes {
                    nid: stra.nid,
                    source,
                })?;

            let mut seen = HashSet::new();
            nids.extend(
                related
                    .into_iter()
                    .filter(|id| *id != stra.nid && seen.insert(*id))
                    .map(|id| id.to_string()),
            );
        }

        nids.push(stra.nid.to_string());
        Ok(ResolvedScope::Inherited { nids })
    }

    async fn resolve_leaves(&self, stra: &Strategy) -> Result<ResolvedScope, SkipReason> {
        let leaf_nids = self
            .topology
            .leaf_ids(stra.nid, &stra.excl_nid)
            .await
            .map_err(|source| SkipReason::LeafNodes {
                nid: stra.nid,
                source,
            })?;

        let mut seen = HashSet::new();
        let mut endpoints = Vec::new();
        for &leaf in &leaf_nids {
            let hosts = self
                .topology
                .hosts_under(leaf)
                .await
                .map_err(|source| SkipReason::Hosts { leaf, source })?;

            endpoints.extend(hosts.into_iter().filter(|h| seen.insert(h.clone())));
        }

        Ok(ResolvedScope::Leaves {
            leaf_nids,
            endpoints,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreError};
    use async_trait::async_trait;
    use monstra_model::{Expression, CATEGORY_INHERIT, NODATA_METRIC};
    use proptest::prelude::*;
    use rstest::rstest;

    /// Topology whose `related_ids` echoes the scope node back first.
    struct SelfIncludingTopology;

    #[async_trait]
    impl Topology for SelfIncludingTopology {
        async fn related_ids(&self, nid: i64, _excl: &[i64]) -> Result<Vec<i64>, StoreError> {
            Ok(vec![nid, 30, 31, 30])
        }

        async fn leaf_ids(&self, _nid: i64, _excl: &[i64]) -> Result<Vec<i64>, StoreError> {
            Ok(Vec::new())
        }

        async fn hosts_under(&self, _leaf_id: i64) -> Result<Vec<String>, StoreError> {
            Ok(Vec::new())
        }
    }

    async fn tree() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.insert_node(10, "corp", false).await;
        store.insert_node(20, "corp.web", true).await;
        store.insert_node(21, "corp.db", true).await;
        store.bind_hosts(20, ["h1", "h2"]).await;
        store.bind_hosts(21, ["h2", "h3"]).await;
        store
    }

    fn inheriting(metrics: &[&str]) -> Strategy {
        let mut stra = Strategy::new(1, 10, CATEGORY_INHERIT);
        stra.exprs = metrics.iter().map(|m| Expression::metric(*m)).collect();
        stra
    }

    #[tokio::test]
    async fn test_inherited_scope_lists_descendants_then_self() {
        let expander = ScopeExpander::new(tree().await);

        let stra = expander.expand(inheriting(&["cpu.busy"])).await.unwrap();
        assert_eq!(stra.nids, vec!["20", "21", "10"]);
        assert!(stra.endpoints.is_empty());
        assert!(stra.leaf_nids.is_empty());
    }

    #[rstest]
    #[case(&[NODATA_METRIC])]
    #[case(&["cpu.busy", NODATA_METRIC])]
    #[tokio::test]
    async fn test_nodata_scope_is_self_only(#[case] metrics: &[&str]) {
        let expander = ScopeExpander::new(tree().await);

        let stra = expander.expand(inheriting(metrics)).await.unwrap();
        assert_eq!(stra.nids, vec!["10"]);
    }

    #[tokio::test]
    async fn test_nodata_scope_does_not_touch_topology() {
        let store = tree().await;
        store.fail_node(10).await;
        let expander = ScopeExpander::new(store);

        let stra = expander.expand(inheriting(&[NODATA_METRIC])).await.unwrap();
        assert_eq!(stra.nids, vec!["10"]);
    }

    #[tokio::test]
    async fn test_inherited_scope_on_bare_node_is_self() {
        let store = Arc::new(MemoryStore::new());
        store.insert_node(10, "corp", false).await;
        let expander = ScopeExpander::new(store);

        let stra = expander.expand(inheriting(&["cpu.busy"])).await.unwrap();
        assert_eq!(stra.nids, vec!["10"]);
    }

    #[tokio::test]
    async fn test_inherited_scope_dedups_and_keeps_self_last() {
        let expander = ScopeExpander::new(Arc::new(SelfIncludingTopology));

        let stra = expander.expand(inheriting(&["cpu.busy"])).await.unwrap();
        assert_eq!(stra.nids, vec!["30", "31", "10"]);
    }

    #[tokio::test]
    async fn test_leaf_scope_dedups_hosts() {
        let expander = ScopeExpander::new(tree().await);

        let stra = expander.expand(Strategy::new(2, 10, 1)).await.unwrap();
        assert_eq!(stra.leaf_nids, vec![20, 21]);
        assert_eq!(stra.endpoints, vec!["h1", "h2", "h3"]);
        assert!(stra.nids.is_empty());
    }

    #[tokio::test]
    async fn test_excluded_leaf_hosts_are_dropped() {
        let expander = ScopeExpander::new(tree().await);

        let mut stra = Strategy::new(2, 10, 1);
        stra.excl_nid = vec![21];
        let stra = expander.expand(stra).await.unwrap();
        assert_eq!(stra.leaf_nids, vec![20]);
        assert_eq!(stra.endpoints, vec!["h1", "h2"]);
    }

    #[tokio::test]
    async fn test_resolution_failures_skip_strategy() {
        let store = tree().await;
        store.fail_node(21).await;
        let expander = ScopeExpander::new(store);

        assert!(matches!(
            expander.expand(Strategy::new(2, 10, 1)).await,
            Err(SkipReason::Hosts { leaf: 21, .. })
        ));

        let mut missing = inheriting(&["cpu.busy"]);
        missing.nid = 99;
        assert!(matches!(
            expander.expand(missing).await,
            Err(SkipReason::RelatedNodes { nid: 99, .. })
        ));

        assert!(matches!(
            expander.expand(Strategy::new(3, 99, 1)).await,
            Err(SkipReason::LeafNodes { nid: 99, .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_endpoints_are_unique(
            leaves in proptest::collection::vec(
                proptest::collection::vec("h[0-4]", 0..6),
                1..5,
            )
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let stra = rt.block_on(async {
                let store = Arc::new(MemoryStore::new());
                store.insert_node(1, "root", false).await;
                for (i, hosts) in leaves.iter().enumerate() {
                    let id = 100 + i as i64;
                    store.insert_node(id, &format!("root.l{i}"), true).await;
                    store.bind_hosts(id, hosts.clone()).await;
                }
                ScopeExpander::new(store)
                    .expand(Strategy::new(1, 1, 1))
                    .await
                    .unwrap()
            });

            let unique: HashSet<&String> = stra.endpoints.iter().collect();
            prop_assert_eq!(unique.len(), stra.endpoints.len());

            let every: HashSet<&String> = leaves.iter().flatten().collect();
            prop_assert_eq!(unique, every);
        }
    }
}
