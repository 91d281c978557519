//! Scenario: store and transport follow the configuration.
//!
//! # Invariants under test
//!
//! 1. Without a transport URL the bus is standalone: outbound queues are
//!    drained, so any number of SCAN requests publish without filling up.
//! 2. With a transport URL the publisher is the HTTP bridge and no queue
//!    consumers are attached.
//! 3. A redis backend that cannot be reached fails at start, not on the
//!    first cycle.

use std::sync::Arc;

use cua_bus::QUEUE_CAPACITY;
use cua_daemon::director::{Collaborators, Director};
use cua_daemon::transport::{connect_boards, Transport};
use cua_testkit::{base_config, msg, StaticEfd};

#[tokio::test]
async fn standalone_bus_never_fills() {
    let cfg = base_config(&["store:\n  backend: memory\n"]).unwrap();
    let boards = connect_boards(&cfg).await.unwrap();
    let transport = Transport::from_config(&cfg);
    let Transport::Local(bus) = &transport else {
        panic!("expected the standalone bus");
    };

    let director = Arc::new(Director::new(
        cfg.clone(),
        "h",
        Collaborators {
            discovery: boards.discovery,
            jobs: boards.jobs,
            efd: Arc::new(StaticEfd::new()),
            publisher: transport.publisher(),
        },
    ));
    let tasks = transport.attach(&cfg, director.clone()).await.unwrap();
    assert_eq!(tasks.len(), 5);

    for _ in 0..(QUEUE_CAPACITY * 2) {
        let outcome = director.dispatch(&msg("SCAN")).await;
        assert!(outcome.is_handled(), "{outcome:?}");
        tokio::task::yield_now().await;
    }
    assert!(bus.depth(&cfg.queues.forwarder_consume).await < QUEUE_CAPACITY);
}

#[tokio::test]
async fn transport_url_selects_http_bridge() {
    let cfg = base_config(&[
        "store:\n  backend: memory\n",
        "transport:\n  base_url: \"http://127.0.0.1:9/\"\n",
    ])
    .unwrap();
    let transport = Transport::from_config(&cfg);
    assert!(matches!(transport, Transport::Http(_)));

    let boards = connect_boards(&cfg).await.unwrap();
    let director = Arc::new(Director::new(
        cfg.clone(),
        "h",
        Collaborators {
            discovery: boards.discovery,
            jobs: boards.jobs,
            efd: Arc::new(StaticEfd::new()),
            publisher: transport.publisher(),
        },
    ));
    assert!(transport.attach(&cfg, director).await.unwrap().is_empty());
}

#[tokio::test]
async fn unreachable_redis_fails_at_start() {
    let port = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap().port()
    };
    let overlay = format!("store:\n  backend: redis\n  host: \"127.0.0.1:{port}\"\n");
    let cfg = base_config(&[overlay.as_str()]).unwrap();
    let err = connect_boards(&cfg).await.err().unwrap();
    assert!(format!("{err:#}").contains("connect to redis"), "got: {err:#}");
}
