//! cua-handshake
//!
//! Per-image handshake with the forwarder.
//!
//! Three outbound phases, each gated on the acknowledgement of the previous:
//! start (transfer params) -> end-readout -> large-file-object-available.
//! Transitions are explicit and pure; the caller performs the IO named by
//! the returned [`Directive`].

pub mod state_machine;

pub use state_machine::{
    AckPayload, AckPhase, Directive, HandshakeError, HandshakeEvent, HandshakeSession,
    HandshakeState, IgnoredAck, TransferParams,
};
