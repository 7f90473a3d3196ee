//! Service tree nodes.

use serde::{Deserialize, Serialize};

/// A node in the service tree.
///
/// `path` is the dot-joined chain of idents from the root, so a node's
/// descendants are exactly the nodes whose path extends it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: i64,
    #[serde(default)]
    pub pid: i64,
    pub ident: String,
    #[serde(default)]
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub leaf: bool,
}

impl Node {
    /// Returns true if `self` sits strictly below `ancestor`.
    pub fn is_descendant_of(&self, ancestor: &Node) -> bool {
        self.path.len() > ancestor.path.len()
            && self.path.starts_with(&ancestor.path)
            && self.path.as_bytes()[ancestor.path.len()] == b'.'
    }
}
