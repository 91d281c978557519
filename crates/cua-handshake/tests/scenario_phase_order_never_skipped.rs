//! Scenario: handshake phases are strictly ordered.
//!
//! # Invariants under test
//!
//! 1. An end-readout ack delivered before the start ack never yields
//!    `SendLfoa` (or `LookupLfoa`); the session aborts instead.
//! 2. An lfoa ack delivered while the start ack is outstanding aborts.
//! 3. After an abort every further input is ignored and nothing is sent.
//! 4. For every ordering of the three acks, `SendLfoa` can only follow a
//!    lookup that was triggered by an in-order end-readout ack.

use cua_handshake::*;
use cua_reconcile::ImageId;

fn ack(phase: AckPhase) -> HandshakeEvent {
    HandshakeEvent::Ack {
        phase,
        payload: AckPayload::for_image("img1"),
    }
}

fn begun() -> HandshakeSession {
    let mut s = HandshakeSession::new(ImageId::from("img1"), 0);
    s.apply(HandshakeEvent::Begin, 0).expect("begin from idle");
    s
}

#[test]
fn end_readout_ack_before_start_ack_aborts_without_lfoa() {
    let mut s = begun();

    let err = s.apply(ack(AckPhase::EndReadout), 1).unwrap_err();
    assert!(err.is_violation());
    assert_eq!(s.state(), HandshakeState::Aborted);

    // The late start ack must not revive the session.
    let d = s.apply(ack(AckPhase::Start), 2).unwrap();
    assert!(matches!(d, Directive::Ignore(IgnoredAck::AfterTerminal { .. })));
    assert_eq!(s.state(), HandshakeState::Aborted);
}

#[test]
fn lfoa_ack_while_awaiting_start_aborts() {
    let mut s = begun();
    let err = s.apply(ack(AckPhase::Lfoa), 1).unwrap_err();
    assert!(err.is_violation());
    assert_eq!(s.state(), HandshakeState::Aborted);
}

#[test]
fn lfoa_ack_while_awaiting_end_readout_aborts() {
    let mut s = begun();
    s.apply(ack(AckPhase::Start), 1).unwrap();
    let err = s.apply(ack(AckPhase::Lfoa), 2).unwrap_err();
    assert!(err.is_violation());
}

#[test]
fn lfoa_ack_while_stalled_aborts() {
    let mut s = begun();
    s.apply(ack(AckPhase::Start), 1).unwrap();
    s.apply(ack(AckPhase::EndReadout), 2).unwrap();
    s.apply(HandshakeEvent::LfoaMissing, 3).unwrap();

    let err = s.apply(ack(AckPhase::Lfoa), 4).unwrap_err();
    assert!(err.is_violation(), "lfoa was never sent from a stalled session");
}

#[test]
fn no_ack_permutation_sends_lfoa_out_of_order() {
    let phases = [AckPhase::Start, AckPhase::EndReadout, AckPhase::Lfoa];
    let perms: [[usize; 3]; 6] = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];

    for perm in perms {
        let mut s = begun();
        let mut acked: Vec<AckPhase> = Vec::new();
        let mut t = 1;

        for idx in perm {
            let phase = phases[idx];
            let result = s.apply(ack(phase), t);
            t += 1;

            match result {
                Ok(Directive::LookupLfoa) => {
                    assert_eq!(acked, vec![AckPhase::Start], "perm={perm:?}");
                    let d = s
                        .apply(HandshakeEvent::LfoaFound { url: "u".into() }, t)
                        .unwrap();
                    assert_eq!(d, Directive::SendLfoa { url: "u".into() });
                    t += 1;
                }
                Ok(Directive::SendEndReadout) => assert!(acked.is_empty(), "perm={perm:?}"),
                Ok(Directive::Complete) => {
                    assert_eq!(acked, vec![AckPhase::Start, AckPhase::EndReadout]);
                }
                Ok(_) | Err(_) => {}
            }
            if matches!(s.state(), HandshakeState::Aborted) {
                break;
            }
            acked.push(phase);
        }

        let in_order = perm == [0, 1, 2];
        assert_eq!(
            s.state() == HandshakeState::Done,
            in_order,
            "only the in-order delivery completes; perm={perm:?}"
        );
    }
}
