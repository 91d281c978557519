use std::collections::{BTreeSet, HashSet};

use crate::{CameraGeometry, CatchupDiff, DiscoveredImage, ImageId, IngestionRecord};

/// Expand a raw discovered-id list into expected rows.
///
/// Ids are de-duplicated first; the DAQ list may repeat an image across
/// partial scans. Output is sorted by image id, then geometry order.
pub fn expand_discovered(discovered: &[ImageId], geometry: &CameraGeometry) -> Vec<DiscoveredImage> {
    let distinct: BTreeSet<&ImageId> = discovered.iter().collect();
    distinct
        .into_iter()
        .flat_map(|id| geometry.expand(id))
        .collect()
}

/// Set-diff of expected discovery rows against ingestion confirmations.
///
/// Left outer join on the full (image, raft, sensor, statusCode) key,
/// keeping only left rows with no match. The reduction to jobs is
/// "distinct image ids with at least one unmatched row".
///
/// Ingestion rows for images outside the discovery list never create jobs.
pub fn diff_unconfirmed(
    discovered: &[ImageId],
    geometry: &CameraGeometry,
    ingested: &[IngestionRecord],
) -> CatchupDiff {
    let expected = expand_discovered(discovered, geometry);
    if expected.is_empty() {
        return CatchupDiff::empty();
    }

    let confirmed: HashSet<&IngestionRecord> = ingested.iter().collect();

    let mut unmatched: Vec<DiscoveredImage> = expected
        .iter()
        .filter(|row| !confirmed.contains(row))
        .cloned()
        .collect();
    unmatched.sort();

    let jobs: BTreeSet<ImageId> = unmatched.iter().map(|r| r.image_id.clone()).collect();

    let discovered_distinct = expected.len() / geometry.rows_per_image();

    CatchupDiff {
        discovered: discovered_distinct,
        expected_rows: expected.len(),
        unmatched,
        jobs,
    }
}
