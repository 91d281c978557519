//! cua-efd
//!
//! Read-only access to the engineering facility database (EFD), the time
//! series that records confirmed archive ingestion and header availability.
//!
//! - [`IngestionQuery`] is the seam the daemon depends on.
//! - [`EfdClient`] implements it over the InfluxDB 1.x `/query` HTTP API.
//! - [`EfdCurator`] maps the configured topics to typed lookups.
//!
//! Window bounds are TAI readings; the client renders them as UTC.

mod client;
mod curator;
mod influxql;
mod table;

pub use client::EfdClient;
pub use curator::{EfdCurator, LfoaRecord, IMAGE_IN_OODS_FIELDS, LFOA_FIELDS};
pub use influxql::{point_query, quote_ident, quote_literal, select_time_series};
pub use table::QueryTable;

use anyhow::Result;
use cua_reconcile::TaiInstant;

/// Query surface over the ingestion time series.
#[async_trait::async_trait]
pub trait IngestionQuery: Send + Sync {
    /// Rows of `fields` from `topic` with `start <= time <= end`.
    async fn select_time_series(
        &self,
        topic: &str,
        fields: &[&str],
        start: TaiInstant,
        end: TaiInstant,
    ) -> Result<QueryTable>;

    /// Rows of `fields` from `topic` where `key_field = key`.
    async fn point_query(
        &self,
        topic: &str,
        fields: &[&str],
        key_field: &str,
        key: &str,
    ) -> Result<QueryTable>;
}

#[async_trait::async_trait]
impl<T: IngestionQuery + ?Sized> IngestionQuery for std::sync::Arc<T> {
    async fn select_time_series(
        &self,
        topic: &str,
        fields: &[&str],
        start: TaiInstant,
        end: TaiInstant,
    ) -> Result<QueryTable> {
        (**self).select_time_series(topic, fields, start, end).await
    }

    async fn point_query(
        &self,
        topic: &str,
        fields: &[&str],
        key_field: &str,
        key: &str,
    ) -> Result<QueryTable> {
        (**self).point_query(topic, fields, key_field, key).await
    }
}
