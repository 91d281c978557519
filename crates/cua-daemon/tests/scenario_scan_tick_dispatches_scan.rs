//! Scenario: the scan ticker behaves like an archive controller.
//!
//! GREEN when:
//! - the first SCAN request is published immediately after spawn;
//! - requests keep coming at the configured interval.

use std::sync::Arc;
use std::time::Duration;

use cua_board::MemoryBoard;
use cua_daemon::{
    director::{Collaborators, Director},
    state::spawn_scan_tick,
};
use cua_testkit::{base_config, RecordingPublisher, StaticEfd};

#[tokio::test]
async fn ticker_publishes_scan_requests() {
    let board = Arc::new(MemoryBoard::new());
    let publisher = Arc::new(RecordingPublisher::new());
    let director = Arc::new(Director::new(
        base_config(&[]).unwrap(),
        "h",
        Collaborators {
            discovery: board.clone(),
            jobs: board,
            efd: Arc::new(StaticEfd::new()),
            publisher: publisher.clone(),
        },
    ));

    spawn_scan_tick(director, Duration::from_millis(20));

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if publisher.published().await.len() >= 2 {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "ticker did not publish twice in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let types = publisher.msg_types().await;
    assert!(types.iter().all(|t| t == "SCAN"), "got {types:?}");
}
