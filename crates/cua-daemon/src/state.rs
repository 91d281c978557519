//! Shared runtime state for cua-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The director owns the
//! mutable status; this module only describes it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::director::Director;

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// DaemonStatus
// ---------------------------------------------------------------------------

/// Summary of the last completed reconciliation cycle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub cycle_id: Uuid,
    pub finished_at_utc: DateTime<Utc>,
    /// Distinct discovered images (0 when discovery was empty).
    pub discovered: usize,
    pub jobs: Vec<String>,
}

/// The active handshake slot, as seen by operators.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub image_id: String,
    /// Debug name of the handshake state.
    pub state: String,
    pub started_ms: i64,
    pub last_transition_ms: i64,
    /// Transfer parameters from the start ack.
    pub target_dir: Option<String>,
    pub filename: Option<String>,
    /// Header URL, once the large-file-object record was found.
    pub lfoa_url: Option<String>,
}

/// Point-in-time daemon status, returned by GET /v1/status.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub daemon_uptime_secs: u64,
    pub camera: String,
    pub config_hash: String,
    pub cycles_completed: u64,
    pub last_cycle: Option<CycleSummary>,
    /// Last cycle failure; cleared by the next successful cycle.
    pub fault: Option<String>,
    pub session: Option<SessionSnapshot>,
    pub last_health_ack_utc: Option<DateTime<Utc>>,
    /// Association key last echoed by the forwarder.
    pub forwarder_association_key: Option<String>,
    pub dropped_messages: u64,
}

impl DaemonStatus {
    pub fn new(camera: impl Into<String>, config_hash: impl Into<String>) -> Self {
        Self {
            camera: camera.into(),
            config_hash: config_hash.into(),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Shared handle for all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub build: BuildInfo,
    pub director: Arc<Director>,
}

impl AppState {
    pub fn new(director: Arc<Director>) -> Self {
        Self {
            build: BuildInfo {
                service: "cua-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            director,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Spawn a background task that dispatches a `SCAN` request every
/// `interval`, exactly as if the archive controller had sent one.
///
/// The first scan fires immediately.
pub fn spawn_scan_tick(director: Arc<Director>, interval: Duration) {
    info!(interval_secs = interval.as_secs(), "scan ticker started");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            director.dispatch(&json!({ "MSG_TYPE": "SCAN" })).await;
        }
    });
}
