//! Judge assignment.

use std::fmt;
use std::sync::Arc;

use monstra_hashring::HashRing;
use monstra_model::Strategy;

use super::SkipReason;

/// Ring key prefix for partner strategies.
pub const REMOTE_KEY_PREFIX: &str = "oc";

/// Where a strategy came from.
///
/// Each source hashes in its own key namespace, so a native and a partner
/// strategy sharing a numeric id are placed independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StraSource {
    Native,
    Remote,
}

impl StraSource {
    /// Hash ring key for strategy `id` from this source.
    pub fn ring_key(self, id: i64) -> String {
        match self {
            Self::Native => id.to_string(),
            Self::Remote => format!("{REMOTE_KEY_PREFIX}{id}"),
        }
    }
}

impl fmt::Display for StraSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => f.write_str("native"),
            Self::Remote => f.write_str("remote"),
        }
    }
}

/// Places strategies on judges through a hash ring.
pub struct Sharder {
    ring: Arc<dyn HashRing>,
}

impl Sharder {
    pub fn new(ring: Arc<dyn HashRing>) -> Self {
        Self { ring }
    }

    /// Judge label for `stra` from `source`.
    pub fn assign(&self, source: StraSource, stra: &Strategy) -> Result<String, SkipReason> {
        let key = source.ring_key(stra.id);
        self.ring
            .assign(&key)
            .map_err(|source| SkipReason::Assign { key, source })
    }
}
