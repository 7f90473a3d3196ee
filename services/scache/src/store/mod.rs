//! Persistent state consumed by the cache.
//!
//! Two seams are defined here:
//! - [`StraStore`]: the strategy table and node lookup
//! - [`Topology`]: service tree expansion (descendants, leaves, hosts)
//!
//! [`PgStore`] implements both on Postgres via SQLx. [`MemoryStore`] is an
//! in-process implementation for tests and local development.

mod db;
mod memory;
mod postgres;

use async_trait::async_trait;
use monstra_model::{Node, Strategy};
use thiserror::Error;

pub use db::{Database, DbConfig};
pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Store and topology errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to connect to the database.
    #[error("failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    /// Failed to execute a query.
    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),

    /// Failed to run migrations.
    #[error("migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),

    /// Migration directory not found in the current environment.
    #[error("migration directory not found; tried {tried}. Last error: {last_error}")]
    MigrationDirNotFound { tried: String, last_error: String },

    /// A node referenced by a topology query does not exist.
    #[error("node not found: {0}")]
    NodeNotFound(i64),

    /// The backing store could not answer (transient).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Strategy table and node lookup.
#[async_trait]
pub trait StraStore: Send + Sync {
    /// List strategies that are currently enabled.
    async fn list_effective(&self) -> Result<Vec<Strategy>, StoreError>;

    /// List every persisted strategy, enabled or not.
    async fn list_all(&self) -> Result<Vec<Strategy>, StoreError>;

    /// Delete a strategy by id.
    async fn delete_stra(&self, id: i64) -> Result<(), StoreError>;

    /// Look up a node. `Ok(None)` means the node definitively does not exist.
    async fn get_node(&self, id: i64) -> Result<Option<Node>, StoreError>;
}

/// Service tree expansion.
///
/// `excl` lists node ids whose subtrees (the nodes themselves included)
/// are removed from the result.
#[async_trait]
pub trait Topology: Send + Sync {
    /// All descendants of `nid`, ordered by id.
    async fn related_ids(&self, nid: i64, excl: &[i64]) -> Result<Vec<i64>, StoreError>;

    /// Leaf descendants of `nid`, ordered by id. A leaf `nid` resolves to itself.
    async fn leaf_ids(&self, nid: i64, excl: &[i64]) -> Result<Vec<i64>, StoreError>;

    /// Hosts bound to a leaf node.
    async fn hosts_under(&self, leaf_id: i64) -> Result<Vec<String>, StoreError>;
}
