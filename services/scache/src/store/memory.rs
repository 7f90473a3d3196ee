//! In-memory store and topology.
//!
//! Used by tests and for running the cache without a database. Individual
//! nodes and the strategy listing can be made to fail to exercise the
//! error paths of the sync and cleanup workers.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use monstra_model::{Node, Strategy};
use tokio::sync::RwLock;
use tracing::debug;

use super::{StoreError, StraStore, Topology};

#[derive(Default)]
struct MemoryState {
    nodes: BTreeMap<i64, Node>,
    endpoints: BTreeMap<i64, Vec<String>>,
    stras: BTreeMap<i64, StoredStra>,
    failing_nodes: HashSet<i64>,
    failing_deletes: HashSet<i64>,
    fail_listing: bool,
}

struct StoredStra {
    stra: Strategy,
    enabled: bool,
}

/// In-memory [`StraStore`] and [`Topology`].
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. `path` is the dot-joined ident chain from the root.
    pub async fn insert_node(&self, id: i64, path: &str, leaf: bool) {
        let mut state = self.state.write().await;
        let pid = path
            .rsplit_once('.')
            .and_then(|(parent, _)| state.nodes.values().find(|n| n.path == parent))
            .map(|n| n.id)
            .unwrap_or(0);
        let ident = path.rsplit('.').next().unwrap_or(path).to_string();

        state.nodes.insert(
            id,
            Node {
                id,
                pid,
                name: ident.clone(),
                ident,
                path: path.to_string(),
                leaf,
            },
        );
    }

    /// Remove a node (its strategies are left in place).
    pub async fn remove_node(&self, id: i64) {
        let mut state = self.state.write().await;
        state.nodes.remove(&id);
        state.endpoints.remove(&id);
    }

    /// Bind hosts to a node, in the given order.
    pub async fn bind_hosts<I, S>(&self, node_id: i64, hosts: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.state.write().await;
        state
            .endpoints
            .entry(node_id)
            .or_default()
            .extend(hosts.into_iter().map(Into::into));
    }

    /// Add or replace an enabled strategy.
    pub async fn insert_stra(&self, stra: Strategy) {
        self.insert_stra_with_state(stra, true).await;
    }

    /// Add or replace a strategy with an explicit enabled flag.
    pub async fn insert_stra_with_state(&self, stra: Strategy, enabled: bool) {
        let mut state = self.state.write().await;
        state.stras.insert(stra.id, StoredStra { stra, enabled });
    }

    /// Make every lookup touching `node_id` fail with [`StoreError::Unavailable`].
    pub async fn fail_node(&self, node_id: i64) {
        self.state.write().await.failing_nodes.insert(node_id);
    }

    /// Make deleting strategy `stra_id` fail with [`StoreError::Unavailable`].
    pub async fn fail_delete(&self, stra_id: i64) {
        self.state.write().await.failing_deletes.insert(stra_id);
    }

    /// Make strategy listings fail (or succeed again).
    pub async fn set_fail_listing(&self, fail: bool) {
        self.state.write().await.fail_listing = fail;
    }

    /// Ids of all stored strategies.
    pub async fn stra_ids(&self) -> Vec<i64> {
        self.state.read().await.stras.keys().copied().collect()
    }
}

impl MemoryState {
    fn check_node(&self, id: i64) -> Result<(), StoreError> {
        if self.failing_nodes.contains(&id) {
            return Err(StoreError::Unavailable(format!("node {id} lookup failed")));
        }
        Ok(())
    }

    fn check_listing(&self) -> Result<(), StoreError> {
        if self.fail_listing {
            return Err(StoreError::Unavailable("strategy listing failed".to_string()));
        }
        Ok(())
    }

    fn descendants(
        &self,
        nid: i64,
        excl: &[i64],
        leaf_only: bool,
    ) -> Result<Vec<i64>, StoreError> {
        self.check_node(nid)?;
        let root = self.nodes.get(&nid).ok_or(StoreError::NodeNotFound(nid))?;

        if leaf_only && root.leaf {
            return Ok(if excl.contains(&root.id) {
                Vec::new()
            } else {
                vec![root.id]
            });
        }

        let excluded: Vec<&Node> = excl.iter().filter_map(|id| self.nodes.get(id)).collect();

        Ok(self
            .nodes
            .values()
            .filter(|n| n.is_descendant_of(root))
            .filter(|n| !leaf_only || n.leaf)
            .filter(|n| !excluded.iter().any(|x| x.id == n.id || n.is_descendant_of(x)))
            .map(|n| n.id)
            .collect())
    }
}

#[async_trait]
impl StraStore for MemoryStore {
    async fn list_effective(&self) -> Result<Vec<Strategy>, StoreError> {
        let state = self.state.read().await;
        state.check_listing()?;
        Ok(state
            .stras
            .values()
            .filter(|s| s.enabled)
            .map(|s| s.stra.clone())
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<Strategy>, StoreError> {
        let state = self.state.read().await;
        state.check_listing()?;
        Ok(state.stras.values().map(|s| s.stra.clone()).collect())
    }

    async fn delete_stra(&self, id: i64) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.failing_deletes.contains(&id) {
            return Err(StoreError::Unavailable(format!("delete of strategy {id} failed")));
        }
        let removed = state.stras.remove(&id).is_some();
        debug!(stra_id = id, removed, "[MEMORY] Deleted strategy");
        Ok(())
    }

    async fn get_node(&self, id: i64) -> Result<Option<Node>, StoreError> {
        let state = self.state.read().await;
        state.check_node(id)?;
        Ok(state.nodes.get(&id).cloned())
    }
}

#[async_trait]
impl Topology for MemoryStore {
    async fn related_ids(&self, nid: i64, excl: &[i64]) -> Result<Vec<i64>, StoreError> {
        self.state.read().await.descendants(nid, excl, false)
    }

    async fn leaf_ids(&self, nid: i64, excl: &[i64]) -> Result<Vec<i64>, StoreError> {
        self.state.read().await.descendants(nid, excl, true)
    }

    async fn hosts_under(&self, leaf_id: i64) -> Result<Vec<String>, StoreError> {
        let state = self.state.read().await;
        state.check_node(leaf_id)?;
        Ok(state.endpoints.get(&leaf_id).cloned().unwrap_or_default())
    }
}
