use std::collections::BTreeSet;

use anyhow::{Context, Result};
use cua_reconcile::{diff_unconfirmed, ImageId, ScanWindow, SensorRow};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::Director;
use crate::state::CycleSummary;

/// Result of one reconciliation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Discovery list was empty; nothing to do.
    NoDiscoveredImages,
    Reconciled {
        cycle_id: Uuid,
        discovered: usize,
        expected_rows: usize,
        /// Images with at least one unconfirmed sensor row (sorted).
        jobs: BTreeSet<ImageId>,
        unmatched_rows: Vec<SensorRow>,
    },
    /// Another cycle holds the scan guard; no store was touched.
    ScanInFlight,
}

impl ReconcileOutcome {
    pub fn jobs(&self) -> BTreeSet<ImageId> {
        match self {
            ReconcileOutcome::Reconciled { jobs, .. } => jobs.clone(),
            ReconcileOutcome::NoDiscoveredImages | ReconcileOutcome::ScanInFlight => {
                BTreeSet::new()
            }
        }
    }
}

impl Director {
    /// Run one reconciliation cycle over `[now - expiration, now]`.
    ///
    /// A failure aborts this cycle only and is recorded as the fault; the
    /// next successful cycle clears it.
    pub async fn reconcile(&self) -> Result<ReconcileOutcome> {
        let Ok(_guard) = self.scan_guard.try_lock() else {
            warn!("reconciliation already in flight; scan ignored");
            return Ok(ReconcileOutcome::ScanInFlight);
        };

        let cycle_id = Uuid::new_v4();
        match self.run_cycle(cycle_id).await {
            Ok(outcome) => {
                self.record_cycle(cycle_id, &outcome).await;
                Ok(outcome)
            }
            Err(e) => {
                error!(%cycle_id, error = %format!("{e:#}"), "reconciliation cycle failed");
                self.status.write().await.fault = Some(format!("cycle {cycle_id}: {e:#}"));
                Err(e)
            }
        }
    }

    async fn run_cycle(&self, cycle_id: Uuid) -> Result<ReconcileOutcome> {
        let settings = &self.cfg.catchup;
        let window = ScanWindow::lookback(self.now(), settings.expiration_minutes)
            .context("invalid lookback window")?;
        let key = settings.discovery_key.as_str();

        info!(%cycle_id, %window, "reconciliation cycle started");

        let (discovered, ingested) = tokio::join!(
            self.discovery.list_range(key),
            self.efd.image_in_oods(&window)
        );

        // Nothing was consumed if the list could not be read; leave it.
        let discovered = discovered.with_context(|| format!("read discovery list {key}"))?;

        let ingested = match ingested {
            Ok(rows) => rows,
            Err(e) => {
                // The list was consumed; never let it leak into the next cycle.
                if let Err(clear_err) = self.discovery.clear(key).await {
                    error!(%cycle_id, error = %format!("{clear_err:#}"), "discovery clear failed");
                }
                return Err(e.context("ingestion query failed"));
            }
        };

        if discovered.is_empty() {
            warn!(%cycle_id, key, "no images from the DAQ catalog to catch up");
            return Ok(ReconcileOutcome::NoDiscoveredImages);
        }

        let ids: Vec<ImageId> = discovered.into_iter().map(ImageId::from).collect();
        let diff = diff_unconfirmed(&ids, &self.cfg.geometry, &ingested);

        let job_ids: Vec<String> = diff.jobs.iter().map(ToString::to_string).collect();
        let written = if job_ids.is_empty() {
            Ok(0)
        } else {
            self.jobs.add_members(&settings.jobs_key, &job_ids).await
        };
        let cleared = self.discovery.clear(key).await;

        let added = written.with_context(|| format!("write jobs to {}", settings.jobs_key))?;
        cleared.with_context(|| format!("clear discovery list {key}"))?;

        info!(
            %cycle_id,
            discovered = diff.discovered,
            ingested = ingested.len(),
            unmatched_rows = diff.unmatched.len(),
            jobs = diff.jobs.len(),
            new_jobs = added,
            "reconciliation cycle finished"
        );

        Ok(ReconcileOutcome::Reconciled {
            cycle_id,
            discovered: diff.discovered,
            expected_rows: diff.expected_rows,
            jobs: diff.jobs,
            unmatched_rows: diff.unmatched,
        })
    }

    async fn record_cycle(&self, cycle_id: Uuid, outcome: &ReconcileOutcome) {
        let discovered = match outcome {
            ReconcileOutcome::Reconciled { discovered, .. } => *discovered,
            ReconcileOutcome::NoDiscoveredImages | ReconcileOutcome::ScanInFlight => 0,
        };
        let summary = CycleSummary {
            cycle_id,
            finished_at_utc: self.now(),
            discovered,
            jobs: outcome.jobs().iter().map(ToString::to_string).collect(),
        };
        let mut st = self.status.write().await;
        st.cycles_completed += 1;
        st.last_cycle = Some(summary);
        st.fault = None;
    }
}
