//! # monstra-model
//!
//! Data model shared by the strategy cache and its consumers.
//!
//! ## Concepts
//!
//! - A **strategy** is an alert rule scoped to a topology node (`nid`)
//! - A **node** is an entry in the service tree; leaf nodes carry hosts
//! - A strategy's scope is resolved once per sync cycle into either a list
//!   of inherited node ids or a list of leaf ids plus host endpoints
//!
//! The wire format (JSON field names) is shared with the judges that poll
//! the cache and with the remote partner system that supplies extra
//! strategies, so field names are kept stable.

mod node;
mod stra;

pub use node::Node;
pub use stra::*;
