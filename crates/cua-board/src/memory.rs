use std::collections::{BTreeSet, HashMap};

use anyhow::Result;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{DiscoveryStore, JobStore};

/// In-process board: lists and sets keyed by name.
///
/// Used by tests and by `store.backend: memory`; the forwarder side of the
/// protocol appends discoveries with [`MemoryBoard::push_discovered`].
#[derive(Debug, Default)]
pub struct MemoryBoard {
    lists: RwLock<HashMap<String, Vec<String>>>,
    sets: RwLock<HashMap<String, BTreeSet<String>>>,
}

impl MemoryBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append ids to the list at `key` (the forwarder's write).
    pub async fn push_discovered<I, S>(&self, key: &str, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut lists = self.lists.write().await;
        lists
            .entry(key.to_string())
            .or_default()
            .extend(ids.into_iter().map(Into::into));
    }

    /// Whether a list exists at `key`.
    pub async fn has_list(&self, key: &str) -> bool {
        self.lists.read().await.contains_key(key)
    }
}

#[async_trait::async_trait]
impl DiscoveryStore for MemoryBoard {
    async fn list_range(&self, key: &str) -> Result<Vec<String>> {
        Ok(self
            .lists
            .read()
            .await
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    async fn clear(&self, key: &str) -> Result<()> {
        let removed = self.lists.write().await.remove(key);
        debug!(key, existed = removed.is_some(), "discovery list cleared");
        Ok(())
    }
}

#[async_trait::async_trait]
impl JobStore for MemoryBoard {
    async fn add_members(&self, key: &str, ids: &[String]) -> Result<usize> {
        let mut sets = self.sets.write().await;
        let set = sets.entry(key.to_string()).or_default();
        Ok(ids.iter().filter(|id| set.insert((*id).clone())).count())
    }

    async fn members(&self, key: &str) -> Result<BTreeSet<String>> {
        Ok(self
            .sets
            .read()
            .await
            .get(key)
            .cloned()
            .unwrap_or_default())
    }
}
