//! Lookback window for ingestion queries.
//!
//! # Invariants
//!
//! - **Non-empty**: a window of zero minutes is rejected; it would make every
//!   discovered image look unconfirmed.
//! - **Closed interval**: `[now - window, now]`; the query bounds are both
//!   inclusive (`>=`/`<=`).
//! - **TAI**: bounds are TAI clock readings. The offset to UTC is fixed at
//!   [`TAI_MINUS_UTC_SECS`] (no leap second has been announced since 2017).
//! - **Pure**: `now` is supplied by the caller.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};

/// TAI - UTC, in seconds.
pub const TAI_MINUS_UTC_SECS: i64 = 37;

/// A TAI clock reading.
///
/// Stored as a `DateTime<Utc>` whose wall value is the TAI reading; use
/// [`TaiInstant::to_utc`] to get the corresponding UTC instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaiInstant(DateTime<Utc>);

impl TaiInstant {
    pub fn from_utc(utc: DateTime<Utc>) -> Self {
        Self(utc + TimeDelta::seconds(TAI_MINUS_UTC_SECS))
    }

    pub fn to_utc(&self) -> DateTime<Utc> {
        self.0 - TimeDelta::seconds(TAI_MINUS_UTC_SECS)
    }

    /// Raw TAI reading.
    pub fn reading(&self) -> DateTime<Utc> {
        self.0
    }
}

impl fmt::Display for TaiInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} TAI", self.0.format("%Y-%m-%dT%H:%M:%S%.3f"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WindowError {
    ZeroWindow,
}

impl fmt::Display for WindowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowError::ZeroWindow => write!(f, "lookback window must be > 0 minutes"),
        }
    }
}

impl std::error::Error for WindowError {}

/// `[now - minutes, now]` in TAI.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanWindow {
    pub start: TaiInstant,
    pub end: TaiInstant,
    minutes: u32,
}

impl ScanWindow {
    pub fn lookback(now_utc: DateTime<Utc>, minutes: u32) -> Result<Self, WindowError> {
        if minutes == 0 {
            return Err(WindowError::ZeroWindow);
        }
        let end = TaiInstant::from_utc(now_utc);
        let start = TaiInstant::from_utc(now_utc - TimeDelta::minutes(i64::from(minutes)));
        Ok(Self {
            start,
            end,
            minutes,
        })
    }

    pub fn minutes(&self) -> u32 {
        self.minutes
    }
}

impl fmt::Display for ScanWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}
