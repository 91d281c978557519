use anyhow::{anyhow, Context, Result};
use cua_reconcile::TaiInstant;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::{influxql, IngestionQuery, QueryTable};

/// InfluxDB 1.x `/query` client.
///
/// Credentials, when the deployment needs them, belong in `base_url`
/// user-info supplied from the environment; do not log the URL verbatim.
#[derive(Debug, Clone)]
pub struct EfdClient {
    http: reqwest::Client,
    base_url: String,
    database: String,
}

impl EfdClient {
    pub fn new(base_url: impl Into<String>, database: impl Into<String>) -> Self {
        Self::with_http(reqwest::Client::new(), base_url, database)
    }

    pub fn with_http(
        http: reqwest::Client,
        base_url: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            database: database.into(),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    fn query_url(&self) -> String {
        format!("{}/query", self.base_url.trim_end_matches('/'))
    }

    /// Run one InfluxQL statement and return its first series.
    pub async fn query(&self, q: &str) -> Result<QueryTable> {
        debug!(db = %self.database, query = %q, "efd query");

        let resp = self
            .http
            .get(self.query_url())
            .query(&[
                ("db", self.database.as_str()),
                ("q", q),
                ("epoch", "ns"),
            ])
            .send()
            .await
            .context("efd request failed")?;

        let status = resp.status();
        let body = resp.text().await.context("efd response read failed")?;

        if !status.is_success() {
            let message = serde_json::from_str::<InfluxResponse>(&body)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or_else(|| truncate(&body, 200));
            return Err(anyhow!(
                "efd http error status={} message={}",
                status.as_u16(),
                message
            ));
        }

        let parsed: InfluxResponse =
            serde_json::from_str(&body).context("efd response json decode failed")?;
        parsed.into_table()
    }
}

#[async_trait::async_trait]
impl IngestionQuery for EfdClient {
    async fn select_time_series(
        &self,
        topic: &str,
        fields: &[&str],
        start: TaiInstant,
        end: TaiInstant,
    ) -> Result<QueryTable> {
        self.query(&influxql::select_time_series(topic, fields, start, end))
            .await
            .with_context(|| format!("efd time-series query on {topic} failed"))
    }

    async fn point_query(
        &self,
        topic: &str,
        fields: &[&str],
        key_field: &str,
        key: &str,
    ) -> Result<QueryTable> {
        self.query(&influxql::point_query(topic, fields, key_field, key))
            .await
            .with_context(|| format!("efd point query on {topic} failed"))
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Response shape
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct InfluxResponse {
    #[serde(default)]
    results: Vec<InfluxResult>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InfluxResult {
    #[serde(default)]
    series: Vec<InfluxSeries>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InfluxSeries {
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl InfluxResponse {
    fn into_table(self) -> Result<QueryTable> {
        if let Some(err) = self.error {
            return Err(anyhow!("efd error: {err}"));
        }
        let Some(result) = self.results.into_iter().next() else {
            return Ok(QueryTable::empty());
        };
        if let Some(err) = result.error {
            return Err(anyhow!("efd query error: {err}"));
        }
        // No GROUP BY is ever issued, so there is at most one series.
        Ok(result
            .series
            .into_iter()
            .next()
            .map(|s| QueryTable::new(s.columns, s.values))
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(body: &str) -> Result<QueryTable> {
        serde_json::from_str::<InfluxResponse>(body)
            .unwrap()
            .into_table()
    }

    #[test]
    fn result_without_series_is_empty_table() {
        let t = decode(r#"{"results":[{"statement_id":0}]}"#).unwrap();
        assert!(t.is_empty());
    }

    #[test]
    fn statement_error_surfaces() {
        let err = decode(r#"{"results":[{"statement_id":0,"error":"measurement not found"}]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("measurement not found"));
    }

    #[test]
    fn top_level_error_surfaces() {
        assert!(decode(r#"{"error":"database not found: efd"}"#).is_err());
    }

    #[test]
    fn first_series_decoded() {
        let t = decode(
            r#"{"results":[{"series":[{"name":"t","columns":["time","id"],"values":[[1,"a"],[2,"b"]]}]}]}"#,
        )
        .unwrap();
        assert_eq!(t.columns, vec!["time", "id"]);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("ab", 3), "ab");
        assert_eq!(truncate("ééé", 2), "éé...");
    }
}
