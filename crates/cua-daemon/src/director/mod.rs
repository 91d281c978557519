//! Catch-up director: the single inbound surface.
//!
//! Every inbound message, whether from a queue consumer, the scan ticker or
//! the HTTP surface, goes through [`Director::dispatch`], which classifies
//! it into a [`MessageTag`] and routes it with one exhaustive match.
//! Handler failures are caught here: `dispatch` never returns an error and
//! never panics.

mod cycle;
mod sequencer;

pub use cycle::ReconcileOutcome;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use cua_board::{DiscoveryStore, JobStore};
use cua_bus::{Message, MessageHandler, Publisher};
use cua_config::CatchupConfig;
use cua_efd::{EfdCurator, IngestionQuery};
use cua_handshake::HandshakeSession;
use cua_schemas::{InboundMessage, MessageTag, ScanRequest};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::state::{uptime_secs, DaemonStatus, SessionSnapshot};

/// Wall-clock source. Injected so tests can move time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// External collaborators the director talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub discovery: Arc<dyn DiscoveryStore>,
    pub jobs: Arc<dyn JobStore>,
    pub efd: Arc<dyn IngestionQuery>,
    pub publisher: Arc<dyn Publisher>,
}

/// Result of routing one inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Handled { tag: String },
    /// Unroutable payload: no handler ran.
    Dropped { reason: String },
    /// A handler ran and failed; the failure is recorded as the fault.
    Failed { tag: String, error: String },
}

impl DispatchOutcome {
    pub fn is_handled(&self) -> bool {
        matches!(self, DispatchOutcome::Handled { .. })
    }
}

pub struct Director {
    cfg: CatchupConfig,
    discovery: Arc<dyn DiscoveryStore>,
    jobs: Arc<dyn JobStore>,
    efd: EfdCurator<Arc<dyn IngestionQuery>>,
    publisher: Arc<dyn Publisher>,
    clock: Clock,
    /// Held for the whole reconciliation cycle; a second cycle does not wait.
    scan_guard: Mutex<()>,
    /// The one active handshake, if any.
    session: Mutex<Option<HandshakeSession>>,
    status: RwLock<DaemonStatus>,
}

impl Director {
    pub fn new(cfg: CatchupConfig, config_hash: impl Into<String>, io: Collaborators) -> Self {
        let efd = EfdCurator::new(
            io.efd,
            cfg.efd.topics.image_in_oods.clone(),
            cfg.efd.topics.large_file_object_available.clone(),
        );
        let status = DaemonStatus::new(cfg.camera_name.clone(), config_hash);
        Self {
            cfg,
            discovery: io.discovery,
            jobs: io.jobs,
            efd,
            publisher: io.publisher,
            clock: Arc::new(Utc::now),
            scan_guard: Mutex::new(()),
            session: Mutex::new(None),
            status: RwLock::new(status),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &CatchupConfig {
        &self.cfg
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Current status, including the active handshake slot.
    pub async fn status(&self) -> DaemonStatus {
        let session = self.session.lock().await.as_ref().map(|s| {
            let transfer = s.transfer().cloned().unwrap_or_default();
            SessionSnapshot {
                image_id: s.image_id().to_string(),
                state: s.state().to_string(),
                started_ms: s.created_ms(),
                last_transition_ms: s.last_transition_ms(),
                target_dir: transfer.target_dir,
                filename: transfer.filename,
                lfoa_url: s.lfoa_url().map(str::to_string),
            }
        });
        let mut snap = self.status.read().await.clone();
        snap.daemon_uptime_secs = uptime_secs();
        snap.session = session;
        snap
    }

    // -----------------------------------------------------------------------
    // Routing
    // -----------------------------------------------------------------------

    /// Route one inbound message to its handler.
    pub async fn dispatch(&self, raw: &Value) -> DispatchOutcome {
        let msg = match InboundMessage::parse(raw, &self.cfg.messages.ack_prefix) {
            Ok(msg) => msg,
            Err(reason) => {
                warn!(%reason, "inbound message dropped");
                self.status.write().await.dropped_messages += 1;
                return DispatchOutcome::Dropped {
                    reason: reason.to_string(),
                };
            }
        };

        let tag = msg.tag;
        let result = match tag {
            MessageTag::Scan => self.on_scan().await,
            MessageTag::ScanAck => self.on_scan_ack().await,
            MessageTag::NewCatchupArchiveItemAck => {
                info!(fields = ?msg.fields, "new catch-up archive item acknowledged");
                Ok(())
            }
            MessageTag::ArchiveHealthCheckAck => self.on_health_check_ack().await,
            MessageTag::AssociatedAck => self.on_associated_ack(&msg).await,
            MessageTag::ForwarderAck(phase) => {
                self.on_forwarder_ack(phase, msg.ack_payload()).await
            }
        };

        match result {
            Ok(()) => DispatchOutcome::Handled {
                tag: tag.to_string(),
            },
            Err(e) => {
                let error = format!("{e:#}");
                error!(%tag, %error, "handler failed");
                self.status.write().await.fault = Some(format!("{tag}: {error}"));
                DispatchOutcome::Failed {
                    tag: tag.to_string(),
                    error,
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Handlers
    // -----------------------------------------------------------------------

    /// Ask the forwarder to scan the DAQ catalog into the discovery key.
    async fn on_scan(&self) -> Result<()> {
        let req = ScanRequest::new(
            self.cfg.catchup.expiration_minutes,
            self.cfg.catchup.discovery_key.clone(),
            self.cfg.queues.forwarder_publish.clone(),
        );
        let queue = &self.cfg.queues.forwarder_consume;
        self.publisher
            .publish(queue, req.to_fields())
            .await
            .with_context(|| format!("publish SCAN to {queue}"))?;
        info!(queue = %queue, minutes = req.minutes, "scan requested");
        Ok(())
    }

    /// Discovery is populated: reconcile, then drive one job.
    async fn on_scan_ack(&self) -> Result<()> {
        match self.reconcile().await? {
            ReconcileOutcome::Reconciled { jobs, .. } => self.begin_next_job(&jobs).await,
            ReconcileOutcome::NoDiscoveredImages | ReconcileOutcome::ScanInFlight => Ok(()),
        }
    }

    async fn on_health_check_ack(&self) -> Result<()> {
        let now = self.now();
        self.status.write().await.last_health_ack_utc = Some(now);
        info!(at = %now, "archive health check acknowledged");
        Ok(())
    }

    async fn on_associated_ack(&self, msg: &InboundMessage) -> Result<()> {
        let echoed = msg.association_key();
        match echoed.as_deref() {
            Some(k) if k == self.cfg.association_key => {
                info!(association_key = %k, "forwarder association confirmed");
            }
            Some(k) => warn!(
                expected = %self.cfg.association_key,
                got = %k,
                "forwarder association key mismatch"
            ),
            None => warn!("ASSOCIATED_ACK without ASSOCIATION_KEY"),
        }
        self.status.write().await.forwarder_association_key = echoed;
        Ok(())
    }
}

#[async_trait::async_trait]
impl MessageHandler for Director {
    async fn on_message(&self, queue: &str, message: Message) {
        let outcome = self.dispatch(&Value::Object(message)).await;
        if !outcome.is_handled() {
            warn!(queue, ?outcome, "queue message not handled");
        }
    }
}
