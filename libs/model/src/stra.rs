//! Strategy (alert rule) definitions.

use chrono::{DateTime, FixedOffset, Local};
use serde::{Deserialize, Deserializer, Serialize};

/// Category value for strategies whose scope is inherited by descendant nodes.
pub const CATEGORY_INHERIT: i32 = 2;

/// Metric name of "no data" conditions.
pub const NODATA_METRIC: &str = "nodata";

/// A single trigger condition of a strategy.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Expression {
    #[serde(default)]
    pub eopt: String,
    #[serde(default)]
    pub func: String,
    pub metric: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub params: Vec<i64>,
    #[serde(default)]
    pub threshold: f64,
}

impl Expression {
    /// Create an expression that only names its metric.
    pub fn metric(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            ..Default::default()
        }
    }
}

/// Tag filter attached to a strategy.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tag {
    pub tkey: String,
    #[serde(default)]
    pub topt: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tval: Vec<String>,
}

/// An alert strategy.
///
/// `nids`, `leaf_nids` and `endpoints` are derived per sync cycle and are
/// only written through [`Strategy::with_scope`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: i32,
    pub nid: i64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub excl_nid: Vec<i64>,
    #[serde(default)]
    pub alert_dur: i32,
    #[serde(default)]
    pub recovery_dur: i32,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub callback: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub exprs: Vec<Expression>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub creator: String,
    #[serde(default)]
    pub created: DateTime<FixedOffset>,
    #[serde(default)]
    pub last_updator: String,
    #[serde(default)]
    pub last_updated: DateTime<FixedOffset>,

    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub nids: Vec<String>,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub leaf_nids: Vec<i64>,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub endpoints: Vec<String>,
}

impl Strategy {
    /// Create a bare strategy with the given identity and scope.
    pub fn new(id: i64, nid: i64, category: i32) -> Self {
        Self {
            id,
            name: String::new(),
            category,
            nid,
            excl_nid: Vec::new(),
            alert_dur: 0,
            recovery_dur: 0,
            priority: 0,
            callback: String::new(),
            exprs: Vec::new(),
            tags: Vec::new(),
            creator: String::new(),
            created: DateTime::default(),
            last_updator: String::new(),
            last_updated: DateTime::default(),
            nids: Vec::new(),
            leaf_nids: Vec::new(),
            endpoints: Vec::new(),
        }
    }

    /// Returns true if this strategy uses the inheriting scope policy.
    pub fn is_inheriting(&self) -> bool {
        self.category == CATEGORY_INHERIT
    }

    /// Returns true if any expression is a "no data" condition.
    pub fn has_nodata(&self) -> bool {
        self.exprs.iter().any(|e| e.metric == NODATA_METRIC)
    }

    /// Returns true if descendant nodes should be pulled into the scope.
    ///
    /// "No data" conditions never inherit: evaluated over an inherited
    /// scope they fire at every level of the tree.
    pub fn inherits_descendants(&self) -> bool {
        self.is_inheriting() && !self.has_nodata()
    }

    /// Replace the derived scope fields with a freshly resolved scope.
    pub fn with_scope(mut self, scope: ResolvedScope) -> Self {
        match scope {
            ResolvedScope::Inherited { nids } => {
                self.nids = nids;
                self.leaf_nids.clear();
                self.endpoints.clear();
            }
            ResolvedScope::Leaves {
                leaf_nids,
                endpoints,
            } => {
                self.nids.clear();
                self.leaf_nids = leaf_nids;
                self.endpoints = endpoints;
            }
        }
        self
    }

    /// Convert timestamps to the local time zone.
    pub fn localize(mut self) -> Self {
        self.created = to_local(self.created);
        self.last_updated = to_local(self.last_updated);
        self
    }
}

/// Accept `null` wherever a list is expected; partner payloads encode
/// empty lists that way.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn to_local(ts: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    ts.with_timezone(&Local).fixed_offset()
}

/// The outcome of resolving a strategy's scope for one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedScope {
    /// Node ids (decimal strings) the strategy applies to, self id last.
    Inherited { nids: Vec<String> },

    /// Leaf node ids and the deduplicated hosts bound to them.
    Leaves {
        leaf_nids: Vec<i64>,
        endpoints: Vec<String>,
    },
}
