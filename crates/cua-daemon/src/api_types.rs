//! Request and response types for cua-daemon HTTP endpoints.
//!
//! No business logic lives here.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// /v1/scan  /v1/messages
// ---------------------------------------------------------------------------

/// Body returned by the dispatch endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResponse {
    /// "handled" | "dropped" | "failed"
    pub outcome: String,
    pub tag: Option<String>,
    /// Drop reason or failure description.
    pub detail: Option<String>,
}
