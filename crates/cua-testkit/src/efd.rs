use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use cua_efd::{IngestionQuery, QueryTable};
use cua_reconcile::{IngestionRecord, TaiInstant};
use serde_json::json;
use tokio::sync::{Mutex, Notify};

/// Pauses a time-series query until the test releases it.
///
/// `entered` is notified when the query starts; the query then waits on
/// `release`.
#[derive(Debug, Clone, Default)]
pub struct ScanGate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

/// Ingestion query service answering from canned data.
#[derive(Debug, Default)]
pub struct StaticEfd {
    ingestion: Mutex<Vec<IngestionRecord>>,
    lfoa: Mutex<HashMap<String, String>>,
    time_series_failure: Mutex<Option<String>>,
    point_failure: Mutex<Option<String>>,
    gate: Option<ScanGate>,
    time_series_calls: AtomicUsize,
    point_calls: AtomicUsize,
}

impl StaticEfd {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ingestion(self, rows: Vec<IngestionRecord>) -> Self {
        Self {
            ingestion: Mutex::new(rows),
            ..self
        }
    }

    pub fn with_lfoa(self, image_id: &str, url: &str) -> Self {
        let mut lfoa = self.lfoa.into_inner();
        lfoa.insert(image_id.to_string(), url.to_string());
        Self {
            lfoa: Mutex::new(lfoa),
            ..self
        }
    }

    /// Every time-series query blocks on the returned gate.
    pub fn gated(self) -> (Self, ScanGate) {
        let gate = ScanGate::default();
        (
            Self {
                gate: Some(gate.clone()),
                ..self
            },
            gate,
        )
    }

    pub async fn set_ingestion(&self, rows: Vec<IngestionRecord>) {
        *self.ingestion.lock().await = rows;
    }

    pub async fn add_lfoa(&self, image_id: &str, url: &str) {
        self.lfoa
            .lock()
            .await
            .insert(image_id.to_string(), url.to_string());
    }

    /// `Some(msg)`: time-series queries fail with `msg` until reset.
    pub async fn fail_time_series(&self, failure: Option<&str>) {
        *self.time_series_failure.lock().await = failure.map(str::to_string);
    }

    /// `Some(msg)`: point queries fail with `msg` until reset.
    pub async fn fail_point_queries(&self, failure: Option<&str>) {
        *self.point_failure.lock().await = failure.map(str::to_string);
    }

    pub fn time_series_calls(&self) -> usize {
        self.time_series_calls.load(Ordering::SeqCst)
    }

    pub fn point_calls(&self) -> usize {
        self.point_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IngestionQuery for StaticEfd {
    async fn select_time_series(
        &self,
        topic: &str,
        _fields: &[&str],
        _start: TaiInstant,
        _end: TaiInstant,
    ) -> Result<QueryTable> {
        self.time_series_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        if let Some(msg) = self.time_series_failure.lock().await.clone() {
            bail!("{msg} (topic {topic})");
        }

        let rows = self
            .ingestion
            .lock()
            .await
            .iter()
            .enumerate()
            .map(|(i, r)| {
                vec![
                    json!(i),
                    json!(r.image_id.as_str()),
                    json!(r.raft),
                    json!(r.sensor),
                    json!(r.status_code),
                ]
            })
            .collect();
        Ok(QueryTable::new(
            ["time", "obsid", "raft", "sensor", "statusCode"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            rows,
        ))
    }

    async fn point_query(
        &self,
        topic: &str,
        _fields: &[&str],
        _key_field: &str,
        key: &str,
    ) -> Result<QueryTable> {
        self.point_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(msg) = self.point_failure.lock().await.clone() {
            bail!("{msg} (topic {topic})");
        }
        let Some(url) = self.lfoa.lock().await.get(key).cloned() else {
            return Ok(QueryTable::empty());
        };
        Ok(QueryTable::new(
            vec!["time".into(), "id".into(), "url".into()],
            vec![vec![json!(0), json!(key), json!(url)]],
        ))
    }
}
