//! Scenario: reconciliation cycle job discovery and idempotence.
//!
//! # Invariants under test
//!
//! 1. Jobs are exactly the discovered images with at least one expected
//!    sensor row unconfirmed in the window; fully confirmed images yield no
//!    job.
//! 2. The discovery list is cleared after every diff, whether or not jobs
//!    resulted.
//! 3. Two consecutive cycles over unchanged data yield the job set, then
//!    nothing (the second cycle finds no discoveries).
//! 4. An empty discovery list is a no-op, not an error.

use std::collections::BTreeSet;
use std::sync::Arc;

use cua_board::{DiscoveryStore, JobStore, MemoryBoard};
use cua_daemon::director::{Collaborators, Director, ReconcileOutcome};
use cua_reconcile::{ImageId, IngestionRecord};
use cua_testkit::{base_config, fully_confirmed, RecordingPublisher, StaticEfd};

struct Rig {
    director: Director,
    board: Arc<MemoryBoard>,
}

fn rig(efd: StaticEfd) -> Rig {
    let board = Arc::new(MemoryBoard::new());
    let director = Director::new(
        base_config(&[]).unwrap(),
        "h",
        Collaborators {
            discovery: board.clone(),
            jobs: board.clone(),
            efd: Arc::new(efd),
            publisher: Arc::new(RecordingPublisher::new()),
        },
    );
    Rig { director, board }
}

fn ids(v: &[&str]) -> BTreeSet<ImageId> {
    v.iter().map(|s| ImageId::from(*s)).collect()
}

#[tokio::test]
async fn fully_confirmed_image_yields_no_job() {
    let geometry = base_config(&[]).unwrap().geometry;
    let r = rig(StaticEfd::new().with_ingestion(fully_confirmed("img1", &geometry)));
    r.board.push_discovered("images", ["img1"]).await;

    let outcome = r.director.reconcile().await.unwrap();
    assert!(outcome.jobs().is_empty());
    assert!(matches!(
        outcome,
        ReconcileOutcome::Reconciled {
            discovered: 1,
            expected_rows: 3,
            ..
        }
    ));
    assert!(r.board.members("catchup_jobs").await.unwrap().is_empty());
    assert!(!r.board.has_list("images").await, "discovery must be cleared");
}

#[tokio::test]
async fn one_missing_row_creates_one_job() {
    let r = rig(StaticEfd::new().with_ingestion(vec![
        IngestionRecord::new("img1", "00", "00", 0),
        IngestionRecord::new("img1", "00", "01", 0),
    ]));
    r.board.push_discovered("images", ["img1"]).await;

    let outcome = r.director.reconcile().await.unwrap();
    assert_eq!(outcome.jobs(), ids(&["img1"]));
    let ReconcileOutcome::Reconciled { unmatched_rows, .. } = outcome else {
        panic!("expected a reconciled cycle");
    };
    assert_eq!(unmatched_rows, vec![IngestionRecord::new("img1", "00", "02", 0)]);
    assert_eq!(
        r.board.members("catchup_jobs").await.unwrap(),
        BTreeSet::from(["img1".to_string()])
    );
}

#[tokio::test]
async fn second_cycle_over_unchanged_data_is_empty() {
    let geometry = base_config(&[]).unwrap().geometry;
    let mut confirmed = fully_confirmed("img1", &geometry);
    confirmed.push(IngestionRecord::new("img2", "00", "00", 0));
    let r = rig(StaticEfd::new().with_ingestion(confirmed));
    r.board.push_discovered("images", ["img2", "img1", "img3", "img2"]).await;

    let first = r.director.reconcile().await.unwrap();
    assert_eq!(first.jobs(), ids(&["img2", "img3"]));

    let second = r.director.reconcile().await.unwrap();
    assert_eq!(second, ReconcileOutcome::NoDiscoveredImages);
    assert!(second.jobs().is_empty());

    // Jobs persist; the job store is a set.
    assert_eq!(r.board.members("catchup_jobs").await.unwrap().len(), 2);
    let st = r.director.status().await;
    assert_eq!(st.cycles_completed, 2);
    assert!(st.fault.is_none());
}

#[tokio::test]
async fn empty_discovery_is_a_no_op() {
    let r = rig(StaticEfd::new());
    let outcome = r.director.reconcile().await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::NoDiscoveredImages);
    assert!(r.board.list_range("images").await.unwrap().is_empty());
}
