//! Handshake state machine
//!
//! # Design
//!
//! One [`HandshakeSession`] per catch-up job. Every input is applied via
//! [`HandshakeSession::apply`], which enforces three invariants:
//!
//! 1. **Strict phase order.** Phase N+1 is never requested before the ack
//!    for phase N has been observed. An ack for a phase that has not been
//!    sent yet is a protocol violation and aborts the session.
//! 2. **At-least-once tolerance.** A duplicate ack for a phase already
//!    passed, or an ack naming a different image, is ignored without any
//!    state change.
//! 3. **Stall is not failure.** When the large-file-object record is not
//!    available yet the session parks in [`HandshakeState::Stalled`], which
//!    is non-terminal.
//!
//! # State diagram
//!
//! ```text
//!   Idle ──Begin──► AwaitingStartAck ──start ack──► AwaitingEndReadoutAck
//!                                                          │
//!                                                   end-readout ack
//!                                                          ▼
//!                      Stalled ◄──LfoaMissing── LookingUpLfoa
//!                                                          │
//!                                                      LfoaFound
//!                                                          ▼
//!                             Done ◄──lfoa ack── AwaitingLfoaAck
//!
//!   any non-terminal state ──violation──► Aborted
//! ```

use std::fmt;

use cua_reconcile::ImageId;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// HandshakeState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandshakeState {
    /// Created, nothing sent.
    Idle,
    /// Start message sent.
    AwaitingStartAck,
    /// End-readout message sent.
    AwaitingEndReadoutAck,
    /// End-readout acked; large-file-object lookup outstanding.
    LookingUpLfoa,
    /// Lookup found nothing. Non-terminal; no further transmission.
    Stalled,
    /// Large-file-object-available message sent.
    AwaitingLfoaAck,
    /// All three phases acked. **Terminal.**
    Done,
    /// Protocol violation observed. **Terminal.**
    Aborted,
}

impl HandshakeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }

    /// `true` while the forwarder owes us an acknowledgement.
    pub fn is_awaiting_ack(&self) -> bool {
        matches!(
            self,
            Self::AwaitingStartAck | Self::AwaitingEndReadoutAck | Self::AwaitingLfoaAck
        )
    }

    /// Number of outbound phases transmitted in this state.
    fn phases_sent(&self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::AwaitingStartAck => 1,
            Self::AwaitingEndReadoutAck | Self::LookingUpLfoa | Self::Stalled => 2,
            Self::AwaitingLfoaAck | Self::Done => 3,
            // Unused: acks on terminal sessions are filtered first.
            Self::Aborted => 0,
        }
    }

    /// Number of outbound phases acknowledged in this state.
    fn phases_acked(&self) -> u8 {
        match self {
            Self::Idle | Self::AwaitingStartAck => 0,
            Self::AwaitingEndReadoutAck => 1,
            Self::LookingUpLfoa | Self::Stalled | Self::AwaitingLfoaAck => 2,
            Self::Done => 3,
            Self::Aborted => 0,
        }
    }
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ---------------------------------------------------------------------------
// Acks
// ---------------------------------------------------------------------------

/// Which outbound phase an acknowledgement refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckPhase {
    /// `*_XFER_PARAMS_ACK`
    Start,
    /// `*_END_READOUT_ACK`
    EndReadout,
    /// `*_HEADER_READY_ACK`
    Lfoa,
}

impl AckPhase {
    fn ordinal(&self) -> u8 {
        match self {
            AckPhase::Start => 1,
            AckPhase::EndReadout => 2,
            AckPhase::Lfoa => 3,
        }
    }
}

/// Fields of an acknowledgement the state machine cares about.
///
/// `image_id` is required; absence is a protocol violation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckPayload {
    pub image_id: Option<String>,
    pub target_dir: Option<String>,
    pub filename: Option<String>,
}

impl AckPayload {
    pub fn for_image(image_id: impl Into<String>) -> Self {
        Self {
            image_id: Some(image_id.into()),
            ..Self::default()
        }
    }
}

/// Transfer parameters echoed by the forwarder on the start ack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferParams {
    pub target_dir: Option<String>,
    pub filename: Option<String>,
}

/// Why an input was accepted without a state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoredAck {
    /// Ack for a phase already acknowledged (redelivery).
    Duplicate { phase: AckPhase },
    /// Ack names another image (stale delivery from an earlier session).
    ForeignImage { got: String },
    /// Session already finished.
    AfterTerminal { state: HandshakeState },
}

// ---------------------------------------------------------------------------
// Events / directives
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum HandshakeEvent {
    /// Start the session.
    Begin,
    /// Acknowledgement from the forwarder.
    Ack { phase: AckPhase, payload: AckPayload },
    /// Large-file-object lookup returned a record.
    LfoaFound { url: String },
    /// Large-file-object lookup returned no rows.
    LfoaMissing,
}

/// IO the caller must perform after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Transmit the start (transfer params) message.
    SendStart,
    /// Transmit the end-readout message.
    SendEndReadout,
    /// Query the large-file-object record for this image, then feed back
    /// `LfoaFound` or `LfoaMissing`.
    LookupLfoa,
    /// Transmit the large-file-object-available message.
    SendLfoa { url: String },
    /// Session stalled; send nothing.
    Stall,
    /// Session completed.
    Complete,
    /// No-op.
    Ignore(IgnoredAck),
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// Malformed or out-of-order ack. The session is now `Aborted`.
    Violation {
        image_id: ImageId,
        from: HandshakeState,
        reason: String,
    },
    /// Event not applicable in the current state (caller bug). The session
    /// state is unchanged.
    IllegalEvent {
        image_id: ImageId,
        from: HandshakeState,
        event: String,
    },
}

impl HandshakeError {
    pub fn is_violation(&self) -> bool {
        matches!(self, HandshakeError::Violation { .. })
    }
}

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeError::Violation {
                image_id,
                from,
                reason,
            } => write!(
                f,
                "handshake protocol violation image={image_id} state={from}: {reason}"
            ),
            HandshakeError::IllegalEvent {
                image_id,
                from,
                event,
            } => write!(
                f,
                "illegal handshake event image={image_id} state={from}: {event}"
            ),
        }
    }
}

impl std::error::Error for HandshakeError {}

// ---------------------------------------------------------------------------
// HandshakeSession
// ---------------------------------------------------------------------------

/// Transient state of one job's handshake. Never persisted.
///
/// Timestamps are caller-supplied epoch milliseconds; the machine reads no
/// clock.
#[derive(Debug, Clone)]
pub struct HandshakeSession {
    image_id: ImageId,
    state: HandshakeState,
    transfer: Option<TransferParams>,
    lfoa_url: Option<String>,
    created_ms: i64,
    last_transition_ms: i64,
}

impl HandshakeSession {
    pub fn new(image_id: ImageId, now_ms: i64) -> Self {
        Self {
            image_id,
            state: HandshakeState::Idle,
            transfer: None,
            lfoa_url: None,
            created_ms: now_ms,
            last_transition_ms: now_ms,
        }
    }

    pub fn image_id(&self) -> &ImageId {
        &self.image_id
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn transfer(&self) -> Option<&TransferParams> {
        self.transfer.as_ref()
    }

    pub fn lfoa_url(&self) -> Option<&str> {
        self.lfoa_url.as_deref()
    }

    pub fn created_ms(&self) -> i64 {
        self.created_ms
    }

    pub fn last_transition_ms(&self) -> i64 {
        self.last_transition_ms
    }

    /// `true` when the forwarder has owed an ack for longer than `timeout_ms`.
    pub fn is_expired(&self, now_ms: i64, timeout_ms: i64) -> bool {
        self.state.is_awaiting_ack() && now_ms.saturating_sub(self.last_transition_ms) > timeout_ms
    }

    /// Whether a new session may take this one's slot.
    pub fn is_replaceable(&self, now_ms: i64, timeout_ms: i64) -> bool {
        self.state.is_terminal()
            || self.state == HandshakeState::Stalled
            || self.state == HandshakeState::Idle
            || self.is_expired(now_ms, timeout_ms)
    }

    /// Apply one input.
    ///
    /// # Errors
    /// - [`HandshakeError::Violation`]: the session moves to `Aborted`.
    /// - [`HandshakeError::IllegalEvent`]: the session is unchanged.
    pub fn apply(
        &mut self,
        event: HandshakeEvent,
        now_ms: i64,
    ) -> Result<Directive, HandshakeError> {
        use HandshakeEvent::*;
        use HandshakeState::*;

        let directive = match (self.state, event) {
            (Idle, Begin) => {
                self.state = AwaitingStartAck;
                Directive::SendStart
            }

            (_, Ack { phase, payload }) => return self.apply_ack(phase, payload, now_ms),

            (LookingUpLfoa, LfoaFound { url }) => {
                self.lfoa_url = Some(url.clone());
                self.state = AwaitingLfoaAck;
                Directive::SendLfoa { url }
            }

            (LookingUpLfoa, LfoaMissing) => {
                self.state = Stalled;
                Directive::Stall
            }

            (state, ev) => {
                return Err(HandshakeError::IllegalEvent {
                    image_id: self.image_id.clone(),
                    from: state,
                    event: format!("{ev:?}"),
                });
            }
        };

        self.last_transition_ms = now_ms;
        Ok(directive)
    }

    fn apply_ack(
        &mut self,
        phase: AckPhase,
        payload: AckPayload,
        now_ms: i64,
    ) -> Result<Directive, HandshakeError> {
        if self.state.is_terminal() {
            return Ok(Directive::Ignore(IgnoredAck::AfterTerminal { state: self.state }));
        }

        let acked_image = match payload.image_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return Err(self.abort(format!("{phase:?} ack missing IMAGE_ID"))),
        };
        if acked_image != self.image_id.as_str() {
            return Ok(Directive::Ignore(IgnoredAck::ForeignImage { got: acked_image }));
        }

        let p = phase.ordinal();
        if p <= self.state.phases_acked() {
            return Ok(Directive::Ignore(IgnoredAck::Duplicate { phase }));
        }
        if p != self.state.phases_sent() {
            return Err(self.abort(format!(
                "{phase:?} ack arrived before that phase was sent"
            )));
        }

        let directive = match phase {
            AckPhase::Start => {
                self.transfer = Some(TransferParams {
                    target_dir: payload.target_dir,
                    filename: payload.filename,
                });
                self.state = HandshakeState::AwaitingEndReadoutAck;
                Directive::SendEndReadout
            }
            AckPhase::EndReadout => {
                self.state = HandshakeState::LookingUpLfoa;
                Directive::LookupLfoa
            }
            AckPhase::Lfoa => {
                self.state = HandshakeState::Done;
                Directive::Complete
            }
        };
        self.last_transition_ms = now_ms;
        Ok(directive)
    }

    fn abort(&mut self, reason: String) -> HandshakeError {
        let from = self.state;
        self.state = HandshakeState::Aborted;
        HandshakeError::Violation {
            image_id: self.image_id.clone(),
            from,
            reason,
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
