use std::collections::BTreeSet;
use std::ops::Bound;

use anyhow::{Context, Result};
use cua_bus::Message;
use cua_handshake::{
    AckPayload, AckPhase, Directive, HandshakeEvent, HandshakeSession, TransferParams,
};
use cua_reconcile::ImageId;
use cua_schemas::{HeaderReady, NewArchiveItem, TransferRequest};
use tracing::{debug, error, info, warn};

use super::Director;

/// First candidate after `previous` in id order, wrapping to the smallest.
///
/// A job that never finishes (stalls, aborts, or loses its slot) must not
/// starve the ids behind it.
pub(super) fn rotate_after<'a>(
    candidates: &'a BTreeSet<ImageId>,
    previous: Option<&ImageId>,
) -> Option<&'a ImageId> {
    let after = previous.and_then(|p| {
        candidates
            .range((Bound::Excluded(p), Bound::Unbounded))
            .next()
    });
    after.or_else(|| candidates.iter().next())
}

impl Director {
    fn handshake_timeout_ms(&self) -> i64 {
        i64::try_from(self.cfg.catchup.handshake_timeout_secs.saturating_mul(1000))
            .unwrap_or(i64::MAX)
    }

    /// Start a handshake for one job that this cycle computed and the job
    /// store holds. At most one handshake runs at a time.
    pub(super) async fn begin_next_job(&self, cycle_jobs: &BTreeSet<ImageId>) -> Result<()> {
        if cycle_jobs.is_empty() {
            info!("no catch-up jobs this cycle");
            return Ok(());
        }

        let key = &self.cfg.catchup.jobs_key;
        let members = self
            .jobs
            .members(key)
            .await
            .with_context(|| format!("read jobs from {key}"))?;
        let candidates: BTreeSet<ImageId> = cycle_jobs
            .iter()
            .filter(|id| members.contains(id.as_str()))
            .cloned()
            .collect();

        let now_ms = self.now().timestamp_millis();
        let mut slot = self.session.lock().await;

        let previous = slot.as_ref().map(|s| s.image_id().clone());
        let Some(job) = rotate_after(&candidates, previous.as_ref()).cloned() else {
            warn!(key = %key, "computed jobs are missing from the job store");
            return Ok(());
        };

        if let Some(active) = slot.as_ref() {
            if !active.is_replaceable(now_ms, self.handshake_timeout_ms()) {
                info!(
                    active = %active.image_id(),
                    state = %active.state(),
                    deferred = %job,
                    "handshake in progress; job deferred"
                );
                return Ok(());
            }
            if active.is_expired(now_ms, self.handshake_timeout_ms()) {
                warn!(
                    image_id = %active.image_id(),
                    state = %active.state(),
                    "handshake abandoned after timeout"
                );
            }
        }

        let mut session = HandshakeSession::new(job.clone(), now_ms);
        let directive = session.apply(HandshakeEvent::Begin, now_ms)?;
        info!(image_id = %job, previous = ?previous, "catch-up handshake started");
        *slot = Some(session);
        self.execute(&mut slot, directive, now_ms).await
    }

    /// Feed a forwarder acknowledgement to the active handshake.
    pub(super) async fn on_forwarder_ack(&self, phase: AckPhase, payload: AckPayload) -> Result<()> {
        let now_ms = self.now().timestamp_millis();
        let mut slot = self.session.lock().await;

        let Some(session) = slot.as_mut() else {
            info!(?phase, image_id = ?payload.image_id, "ack with no active handshake ignored");
            return Ok(());
        };

        match session.apply(HandshakeEvent::Ack { phase, payload }, now_ms) {
            Ok(directive) => self.execute(&mut slot, directive, now_ms).await,
            Err(e) if e.is_violation() => {
                // Logged, not retried: the session is now Aborted.
                error!(error = %e, "handshake aborted");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "ack not applicable");
                Ok(())
            }
        }
    }

    /// Publish one handshake message. A failed send empties the slot: the
    /// forwarder never saw the phase, so no ack will ever come for it, and
    /// the job is retried from the start by the next cycle.
    async fn send(
        &self,
        slot: &mut Option<HandshakeSession>,
        queue: &str,
        message: Message,
        what: &str,
    ) -> Result<()> {
        if let Err(e) = self.publisher.publish(queue, message).await {
            if let Some(dropped) = slot.take() {
                warn!(
                    image_id = %dropped.image_id(),
                    state = %dropped.state(),
                    "handshake released after send failure"
                );
            }
            return Err(e.context(format!("publish {what} to {queue}")));
        }
        Ok(())
    }

    /// Perform the IO a transition asked for, feeding lookup results back
    /// into the session until it waits on the forwarder again.
    async fn execute(
        &self,
        slot: &mut Option<HandshakeSession>,
        mut directive: Directive,
        now_ms: i64,
    ) -> Result<()> {
        let queue = &self.cfg.queues.forwarder_consume;
        let reply = &self.cfg.queues.forwarder_publish;
        let msgs = &self.cfg.messages;

        loop {
            let Some(session) = slot.as_mut() else {
                return Ok(());
            };
            let image_id = session.image_id().clone();

            match directive {
                Directive::SendStart => {
                    let req = TransferRequest::placeholder(&msgs.xfer_params, image_id.as_str(), reply);
                    self.send(slot, queue, req.to_fields(), &msgs.xfer_params).await?;
                    info!(%image_id, queue = %queue, "start message sent");
                    return Ok(());
                }
                Directive::SendEndReadout => {
                    let req = TransferRequest::placeholder(&msgs.end_readout, image_id.as_str(), reply);
                    self.send(slot, queue, req.to_fields(), &msgs.end_readout).await?;
                    info!(%image_id, queue = %queue, "end-readout message sent");
                    return Ok(());
                }
                Directive::LookupLfoa => {
                    match self.efd.large_file_object_available(&image_id).await {
                        Ok(Some(record)) => {
                            directive = session.apply(HandshakeEvent::LfoaFound { url: record.url }, now_ms)?;
                        }
                        Ok(None) => {
                            directive = session.apply(HandshakeEvent::LfoaMissing, now_ms)?;
                        }
                        Err(e) => {
                            // Stall rather than wedge the slot in LookingUpLfoa.
                            session.apply(HandshakeEvent::LfoaMissing, now_ms)?;
                            return Err(e.context(format!("large file object lookup for {image_id}")));
                        }
                    }
                }
                Directive::SendLfoa { url } => {
                    let msg = HeaderReady::new(&msgs.header_ready, image_id.as_str(), url.as_str(), reply);
                    self.send(slot, queue, msg.to_fields(), &msgs.header_ready).await?;
                    info!(%image_id, %url, "large file object message sent");
                    return Ok(());
                }
                Directive::Stall => {
                    warn!(%image_id, "no large file object in the EFD; handshake stalled");
                    return Ok(());
                }
                Directive::Complete => {
                    let transfer = session.transfer().cloned().unwrap_or_default();
                    info!(%image_id, "catch-up handshake complete");
                    return self.announce_archive_item(&image_id, transfer).await;
                }
                Directive::Ignore(reason) => {
                    debug!(%image_id, ?reason, "ack ignored");
                    return Ok(());
                }
            }
        }
    }

    /// Tell the archive controller about a finished catch-up image. The
    /// session is already Done, so a failed send leaves the slot free.
    async fn announce_archive_item(
        &self,
        image_id: &ImageId,
        transfer: TransferParams,
    ) -> Result<()> {
        let queue = &self.cfg.queues.archive_ctrl_consume;
        let item = NewArchiveItem::new(
            image_id.as_str(),
            transfer.target_dir,
            transfer.filename,
            self.cfg.queues.archive_ctrl_publish.clone(),
        );
        self.publisher
            .publish(queue, item.to_fields())
            .await
            .with_context(|| format!("publish {} to {queue}", NewArchiveItem::MSG_TYPE))?;
        info!(%image_id, queue = %queue, "archive controller notified");
        Ok(())
    }
}
