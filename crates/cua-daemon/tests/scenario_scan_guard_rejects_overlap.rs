//! Scenario: reconciliation cycles never overlap.
//!
//! # Invariants under test
//!
//! 1. A cycle attempted while another is in flight returns `ScanInFlight`
//!    immediately and touches neither store.
//! 2. The in-flight cycle completes normally afterwards.

use std::sync::Arc;

use cua_board::{JobStore, MemoryBoard};
use cua_daemon::director::{Collaborators, Director, ReconcileOutcome};
use cua_testkit::{base_config, RecordingPublisher, StaticEfd};

#[tokio::test]
async fn overlapping_cycle_reports_scan_in_flight() {
    let board = Arc::new(MemoryBoard::new());
    let (efd, gate) = StaticEfd::new().gated();
    let efd = Arc::new(efd);
    let director = Arc::new(Director::new(
        base_config(&[]).unwrap(),
        "h",
        Collaborators {
            discovery: board.clone(),
            jobs: board.clone(),
            efd: efd.clone(),
            publisher: Arc::new(RecordingPublisher::new()),
        },
    ));
    board.push_discovered("images", ["img1"]).await;

    let first = {
        let director = Arc::clone(&director);
        tokio::spawn(async move { director.reconcile().await })
    };
    gate.entered.notified().await;

    let second = director.reconcile().await.unwrap();
    assert_eq!(second, ReconcileOutcome::ScanInFlight);
    assert_eq!(efd.time_series_calls(), 1, "second cycle must not query");
    assert!(board.has_list("images").await, "second cycle must not clear");

    gate.release.notify_one();
    let first = first.await.unwrap().unwrap();
    assert_eq!(first.jobs().len(), 1);
    assert_eq!(board.members("catchup_jobs").await.unwrap().len(), 1);
    assert!(!board.has_list("images").await);
}
