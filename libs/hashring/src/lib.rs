//! Consistent hashing of keys onto judge nodes.
//!
//! The cache only depends on the [`HashRing`] contract. [`RendezvousRing`]
//! is the implementation the service ships with:
//!
//! - Deterministic: same key and membership always yield the same label
//! - Stable across processes: scores come from SHA-256, not the std hasher
//! - Minimal disruption: removing a member only moves that member's keys

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Hash ring errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RingError {
    /// The ring has no members to assign to.
    #[error("hash ring is empty")]
    Empty,
}

/// Maps a key to the label of the node that owns it.
pub trait HashRing: Send + Sync {
    /// Return the owning node label for `key`.
    fn assign(&self, key: &str) -> Result<String, RingError>;
}

/// Rendezvous (highest random weight) ring over judge labels.
#[derive(Debug, Clone, Default)]
pub struct RendezvousRing {
    /// Members, sorted and deduplicated.
    nodes: Vec<String>,
}

impl RendezvousRing {
    /// Create a ring with the given member labels.
    pub fn new<I, S>(nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut nodes: Vec<String> = nodes
            .into_iter()
            .map(Into::into)
            .filter(|n| !n.is_empty())
            .collect();
        nodes.sort();
        nodes.dedup();
        Self { nodes }
    }

    /// Member labels in sorted order.
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn score(key: &str, node: &str) -> u64 {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
        hasher.update(node.as_bytes());
        let digest = hasher.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(head)
    }
}

impl HashRing for RendezvousRing {
    fn assign(&self, key: &str) -> Result<String, RingError> {
        // Ties go to the lexically smallest label since `nodes` is sorted and
        // max_by_key keeps the last maximum; iterate in reverse to flip that.
        self.nodes
            .iter()
            .rev()
            .max_by_key(|node| Self::score(key, node))
            .cloned()
            .ok_or(RingError::Empty)
    }
}
