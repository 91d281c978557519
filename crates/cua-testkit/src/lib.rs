//! cua-testkit
//!
//! Scripted collaborators and fixtures for scenario tests.
//!
//! - [`StaticEfd`]: ingestion query service answering from canned rows.
//! - [`RecordingPublisher`]: publisher that keeps every message.
//! - [`FailingStore`]: discovery/job store whose every call fails.
//! - Config and message fixtures built from the shipped base config.

mod efd;
mod fixtures;
mod publisher;

pub use efd::{ScanGate, StaticEfd};
pub use fixtures::{
    base_config, forwarder_ack, fully_confirmed, msg, BASE_CONFIG_YAML,
};
pub use publisher::RecordingPublisher;

use std::collections::BTreeSet;

use anyhow::{bail, Result};
use cua_board::{DiscoveryStore, JobStore};

/// Store that refuses every operation.
#[derive(Debug, Default)]
pub struct FailingStore;

#[async_trait::async_trait]
impl DiscoveryStore for FailingStore {
    async fn list_range(&self, key: &str) -> Result<Vec<String>> {
        bail!("store unavailable: list_range {key}")
    }

    async fn clear(&self, key: &str) -> Result<()> {
        bail!("store unavailable: clear {key}")
    }
}

#[async_trait::async_trait]
impl JobStore for FailingStore {
    async fn add_members(&self, key: &str, _ids: &[String]) -> Result<usize> {
        bail!("store unavailable: add_members {key}")
    }

    async fn members(&self, key: &str) -> Result<BTreeSet<String>> {
        bail!("store unavailable: members {key}")
    }
}
