//! monstra strategy cache.
//!
//! Loads alert strategies, resolves their scope against the service tree,
//! shards them across judge nodes and serves each judge its share from an
//! atomically published snapshot. A separate worker deletes strategies
//! whose scope node no longer exists.

pub mod api;
pub mod cache;
pub mod cleanup;
pub mod config;
pub mod state;
pub mod store;
pub mod sync;
