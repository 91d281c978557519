use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// statusCode carried by expected rows. An ingestion row only confirms a
/// sensor when it reports exactly this code.
pub const CONFIRMED_STATUS: i64 = 0;

/// Number of sensors read out per geometry location.
pub const SENSORS_PER_LOCATION: u8 = 3;

/// Opaque, immutable name of one exposure.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(String);

impl ImageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ImageId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ImageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One (image, raft, sensor, statusCode) row.
///
/// Both sides of the join share this shape: discovery rows are synthesized
/// from the geometry table, ingestion rows come from the time series.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SensorRow {
    pub image_id: ImageId,
    pub raft: String,
    pub sensor: String,
    pub status_code: i64,
}

impl SensorRow {
    pub fn new(
        image_id: impl Into<ImageId>,
        raft: impl Into<String>,
        sensor: impl Into<String>,
        status_code: i64,
    ) -> Self {
        Self {
            image_id: image_id.into(),
            raft: raft.into(),
            sensor: sensor.into(),
            status_code,
        }
    }
}

/// Expected row derived from a discovered image id.
pub type DiscoveredImage = SensorRow;

/// Confirmation row reported by the ingestion time series.
pub type IngestionRecord = SensorRow;

// ---------------------------------------------------------------------------
// Camera geometry
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GeometryError {
    /// No locations configured: every image would expand to zero rows and
    /// could never be detected as missing.
    NoLocations,
    /// A location must carry at least two characters (raft prefix).
    LocationTooShort { location: String },
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryError::NoLocations => write!(f, "camera geometry has no locations"),
            GeometryError::LocationTooShort { location } => write!(
                f,
                "camera geometry location '{location}' is shorter than 2 characters"
            ),
        }
    }
}

impl std::error::Error for GeometryError {}

/// Static camera geometry table: locations x [`SENSORS_PER_LOCATION`].
///
/// A location `L` yields `raft = L[0..2]` and
/// `sensor = L[last] + index` for index in `0..SENSORS_PER_LOCATION`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraGeometry {
    locations: Vec<String>,
}

impl CameraGeometry {
    pub fn new<I, S>(locations: I) -> Result<Self, GeometryError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let locations: Vec<String> = locations.into_iter().map(Into::into).collect();
        if locations.is_empty() {
            return Err(GeometryError::NoLocations);
        }
        for loc in &locations {
            if loc.chars().count() < 2 {
                return Err(GeometryError::LocationTooShort {
                    location: loc.clone(),
                });
            }
        }
        Ok(Self { locations })
    }

    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    /// Number of expected rows per discovered image.
    pub fn rows_per_image(&self) -> usize {
        self.locations.len() * SENSORS_PER_LOCATION as usize
    }

    /// Expand one image into its expected rows, in geometry order.
    pub fn expand(&self, image_id: &ImageId) -> Vec<DiscoveredImage> {
        let mut rows = Vec::with_capacity(self.rows_per_image());
        for loc in &self.locations {
            let raft: String = loc.chars().take(2).collect();
            // Non-empty: validated in `new`.
            let bay = loc.chars().last().unwrap_or_default();
            for i in 0..SENSORS_PER_LOCATION {
                rows.push(SensorRow {
                    image_id: image_id.clone(),
                    raft: raft.clone(),
                    sensor: format!("{bay}{i}"),
                    status_code: CONFIRMED_STATUS,
                });
            }
        }
        rows
    }
}

// ---------------------------------------------------------------------------
// Diff report
// ---------------------------------------------------------------------------

/// Result of one set-diff pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatchupDiff {
    /// Distinct discovered image ids considered.
    pub discovered: usize,
    /// Expected rows synthesized from the geometry table.
    pub expected_rows: usize,
    /// Expected rows with no matching ingestion row (sorted).
    pub unmatched: Vec<SensorRow>,
    /// Distinct ids referenced by `unmatched`: the catch-up jobs.
    pub jobs: BTreeSet<ImageId>,
}

impl CatchupDiff {
    pub fn empty() -> Self {
        Self {
            discovered: 0,
            expected_rows: 0,
            unmatched: Vec::new(),
            jobs: BTreeSet::new(),
        }
    }

    /// `true` when every discovered image is fully confirmed.
    pub fn is_clean(&self) -> bool {
        self.jobs.is_empty()
    }
}
