use anyhow::{anyhow, Context, Result};
use cua_reconcile::{ImageId, IngestionRecord, ScanWindow};
use serde_json::Value;
use tracing::debug;

use crate::{IngestionQuery, QueryTable};

/// Columns read from the ingestion-confirmation topic.
pub const IMAGE_IN_OODS_FIELDS: [&str; 4] = ["obsid", "raft", "sensor", "statusCode"];

/// Columns read from the large-file-object topic.
pub const LFOA_FIELDS: [&str; 2] = ["id", "url"];

/// Large-file-object-available record: the header for `id` is at `url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LfoaRecord {
    pub id: String,
    pub url: String,
}

/// Topic-aware lookups over an [`IngestionQuery`].
pub struct EfdCurator<Q> {
    query: Q,
    image_in_oods: String,
    large_file_object_available: String,
}

impl<Q: IngestionQuery> EfdCurator<Q> {
    pub fn new(
        query: Q,
        image_in_oods: impl Into<String>,
        large_file_object_available: impl Into<String>,
    ) -> Self {
        Self {
            query,
            image_in_oods: image_in_oods.into(),
            large_file_object_available: large_file_object_available.into(),
        }
    }

    /// Ingestion confirmations recorded within `window`.
    pub async fn image_in_oods(&self, window: &ScanWindow) -> Result<Vec<IngestionRecord>> {
        let table = self
            .query
            .select_time_series(
                &self.image_in_oods,
                &IMAGE_IN_OODS_FIELDS,
                window.start,
                window.end,
            )
            .await?;
        let rows = decode_ingestion(&table)?;
        debug!(%window, rows = rows.len(), "imageInOODS rows fetched");
        Ok(rows)
    }

    /// First large-file-object record for `image_id`, if any.
    pub async fn large_file_object_available(&self, image_id: &ImageId) -> Result<Option<LfoaRecord>> {
        let table = self
            .query
            .point_query(
                &self.large_file_object_available,
                &LFOA_FIELDS,
                "id",
                image_id.as_str(),
            )
            .await?;
        decode_first_lfoa(&table)
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

fn require_column(table: &QueryTable, name: &str) -> Result<usize> {
    table
        .column(name)
        .with_context(|| format!("efd result missing column {name} (have {:?})", table.columns))
}

fn cell_string(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// statusCode arrives as an integer, a float-typed field, or a string
/// depending on how the topic schema was registered.
fn cell_status(v: Option<&Value>) -> Option<i64> {
    match v? {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn decode_ingestion(table: &QueryTable) -> Result<Vec<IngestionRecord>> {
    if table.is_empty() {
        return Ok(Vec::new());
    }
    let obsid = require_column(table, "obsid")?;
    let raft = require_column(table, "raft")?;
    let sensor = require_column(table, "sensor")?;
    let status = require_column(table, "statusCode")?;

    let mut out = Vec::with_capacity(table.len());
    for (i, row) in table.rows.iter().enumerate() {
        match decode_ingestion_row(row, [obsid, raft, sensor, status]) {
            Some(r) => out.push(r),
            // A row with null fields cannot confirm anything; skipping it
            // keeps the image unconfirmed.
            None => debug!(row = i, "skipping imageInOODS row with missing fields"),
        }
    }
    Ok(out)
}

fn decode_ingestion_row(row: &[Value], [obsid, raft, sensor, status]: [usize; 4]) -> Option<IngestionRecord> {
    Some(IngestionRecord::new(
        cell_string(row.get(obsid))?,
        cell_string(row.get(raft))?,
        cell_string(row.get(sensor))?,
        cell_status(row.get(status))?,
    ))
}

fn decode_first_lfoa(table: &QueryTable) -> Result<Option<LfoaRecord>> {
    if table.is_empty() {
        return Ok(None);
    }
    let id = require_column(table, "id")?;
    let url = require_column(table, "url")?;
    let id = cell_string(table.cell(0, id)).ok_or_else(|| anyhow!("lfoa row has no id"))?;
    let url = cell_string(table.cell(0, url)).ok_or_else(|| anyhow!("lfoa row has no url"))?;
    Ok(Some(LfoaRecord { id, url }))
}
