//! cua-reconcile
//!
//! Catch-up reconciliation engine (set-diff job discovery).
//!
//! Architectural decisions:
//! - Every discovered image is expanded into one expected row per
//!   (raft, sensor) of the static camera geometry
//! - Expected rows are outer-joined against ingestion confirmations on the
//!   full (image, raft, sensor, statusCode) key
//! - An image becomes a catch-up job iff at least one expected row is
//!   unmatched; statusCode is categorical and never summed
//! - Lookback windows are expressed in TAI
//!
//! Deterministic, pure logic. No IO, no wall-clock. Callers provide `now`.

mod engine;
mod types;
mod window;

pub use engine::{diff_unconfirmed, expand_discovered};
pub use types::*;
pub use window::{ScanWindow, TaiInstant, WindowError, TAI_MINUS_UTC_SECS};
