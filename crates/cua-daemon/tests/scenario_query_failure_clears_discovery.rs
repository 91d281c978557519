//! Scenario: collaborator failures abort the current cycle only.
//!
//! # Invariants under test
//!
//! 1. Ingestion query failure: no jobs are written, the discovery list is
//!    still cleared, the fault is recorded, and `SCAN_ACK` reports `Failed`.
//! 2. The next cycle runs normally and clears the fault.
//! 3. Discovery read failure: the job store is untouched.
//! 4. Job store write failure: the discovery list is still cleared, the
//!    fault names the job key, and no handshake starts.

use std::sync::Arc;

use cua_board::{JobStore, MemoryBoard};
use cua_daemon::director::{Collaborators, DispatchOutcome, Director};
use cua_testkit::{base_config, msg, FailingStore, RecordingPublisher, StaticEfd};

#[tokio::test]
async fn ingestion_failure_clears_discovery_and_records_fault() {
    let board = Arc::new(MemoryBoard::new());
    let efd = Arc::new(StaticEfd::new());
    let publisher = Arc::new(RecordingPublisher::new());
    let director = Director::new(
        base_config(&[]).unwrap(),
        "h",
        Collaborators {
            discovery: board.clone(),
            jobs: board.clone(),
            efd: efd.clone(),
            publisher: publisher.clone(),
        },
    );

    board.push_discovered("images", ["img1"]).await;
    efd.fail_time_series(Some("efd unreachable")).await;

    let outcome = director.dispatch(&msg("SCAN_ACK")).await;
    let DispatchOutcome::Failed { tag, error } = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert_eq!(tag, "SCAN_ACK");
    assert!(error.contains("efd unreachable"), "got: {error}");

    assert!(!board.has_list("images").await, "discovery must not leak");
    assert!(board.members("catchup_jobs").await.unwrap().is_empty());
    assert!(publisher.published().await.is_empty(), "no handshake may start");
    let fault = director.status().await.fault;
    assert!(fault.unwrap().contains("efd unreachable"));

    // Next cycle is unaffected.
    efd.fail_time_series(None).await;
    board.push_discovered("images", ["img1"]).await;
    assert!(director.dispatch(&msg("SCAN_ACK")).await.is_handled());
    assert_eq!(
        board.members("catchup_jobs").await.unwrap().len(),
        1,
        "img1 has no confirmations"
    );
    assert!(director.status().await.fault.is_none());
}

#[tokio::test]
async fn discovery_read_failure_writes_no_jobs() {
    let jobs = Arc::new(MemoryBoard::new());
    let director = Director::new(
        base_config(&[]).unwrap(),
        "h",
        Collaborators {
            discovery: Arc::new(FailingStore),
            jobs: jobs.clone(),
            efd: Arc::new(StaticEfd::new()),
            publisher: Arc::new(RecordingPublisher::new()),
        },
    );

    let err = director.reconcile().await.unwrap_err();
    assert!(format!("{err:#}").contains("read discovery list images"));
    assert!(jobs.members("catchup_jobs").await.unwrap().is_empty());
    assert!(director.status().await.fault.is_some());
}

#[tokio::test]
async fn job_write_failure_still_clears_discovery() {
    let discovery = Arc::new(MemoryBoard::new());
    let publisher = Arc::new(RecordingPublisher::new());
    let director = Director::new(
        base_config(&[]).unwrap(),
        "h",
        Collaborators {
            discovery: discovery.clone(),
            jobs: Arc::new(FailingStore),
            efd: Arc::new(StaticEfd::new()),
            publisher: publisher.clone(),
        },
    );

    discovery.push_discovered("images", ["img1", "img2"]).await;

    let outcome = director.dispatch(&msg("SCAN_ACK")).await;
    let DispatchOutcome::Failed { error, .. } = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert!(error.contains("write jobs to catchup_jobs"), "got: {error}");

    assert!(!discovery.has_list("images").await, "discovery must not leak");
    assert!(publisher.published().await.is_empty());
    let fault = director.status().await.fault.unwrap();
    assert!(fault.contains("store unavailable"), "got: {fault}");
}
