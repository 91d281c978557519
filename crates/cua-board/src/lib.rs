//! cua-board
//!
//! Key-addressed storage shared with the forwarder.
//!
//! - Discovery list (`images` by default): written by the forwarder's DAQ
//!   scan, read and then cleared by the reconciliation cycle.
//! - Job set (`catchup_jobs` by default): written only by the
//!   reconciliation cycle. Jobs are never removed; each cycle intersects
//!   the set with the jobs it computed itself.
//!
//! [`RedisBoard`] implements both stores on the forwarder's redis
//! database; [`MemoryBoard`] implements them in process.

mod memory;
mod redis_store;

pub use memory::MemoryBoard;
pub use redis_store::{redis_url, RedisBoard};

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;

/// Ordered list store holding raw discovered image ids.
#[async_trait::async_trait]
pub trait DiscoveryStore: Send + Sync {
    /// Whole list at `key`, in insertion order. Missing key reads as empty.
    async fn list_range(&self, key: &str) -> Result<Vec<String>>;

    /// Delete `key`. Deleting a missing key is not an error.
    async fn clear(&self, key: &str) -> Result<()>;
}

/// Set store holding catch-up job ids.
#[async_trait::async_trait]
pub trait JobStore: Send + Sync {
    /// Add `ids` to the set at `key`. Returns how many were new.
    async fn add_members(&self, key: &str, ids: &[String]) -> Result<usize>;

    /// Members of the set at `key`. Missing key reads as empty.
    async fn members(&self, key: &str) -> Result<BTreeSet<String>>;
}

#[async_trait::async_trait]
impl<T: DiscoveryStore + ?Sized> DiscoveryStore for Arc<T> {
    async fn list_range(&self, key: &str) -> Result<Vec<String>> {
        (**self).list_range(key).await
    }

    async fn clear(&self, key: &str) -> Result<()> {
        (**self).clear(key).await
    }
}

#[async_trait::async_trait]
impl<T: JobStore + ?Sized> JobStore for Arc<T> {
    async fn add_members(&self, key: &str, ids: &[String]) -> Result<usize> {
        (**self).add_members(key, ids).await
    }

    async fn members(&self, key: &str) -> Result<BTreeSet<String>> {
        (**self).members(key).await
    }
}
