//! Store and transport selection for one daemon instance.
//!
//! - `store.backend: redis` shares the discovery list and job set with the
//!   forwarder; `memory` keeps them in process.
//! - `transport.base_url` set: outbound messages go to the HTTP queue
//!   bridge and inbound ones arrive on `POST /v1/messages`.
//! - Unset: standalone. Outbound queues are drained into the log, inbound
//!   queues feed the director from in-process peers.

use std::sync::Arc;

use anyhow::Result;
use cua_board::{DiscoveryStore, JobStore, MemoryBoard, RedisBoard};
use cua_bus::{spawn_consumer, spawn_egress_log, HttpPublisher, LocalBus, Publisher};
use cua_config::{CatchupConfig, StoreBackend};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::director::Director;

pub struct Boards {
    pub discovery: Arc<dyn DiscoveryStore>,
    pub jobs: Arc<dyn JobStore>,
}

/// Open the configured board. A redis backend must be reachable at start.
pub async fn connect_boards(cfg: &CatchupConfig) -> Result<Boards> {
    match cfg.store.backend {
        StoreBackend::Redis => {
            let board = Arc::new(RedisBoard::connect(&cfg.store.host, cfg.store.db).await?);
            Ok(Boards {
                discovery: board.clone(),
                jobs: board,
            })
        }
        StoreBackend::Memory => {
            warn!("memory board: the forwarder cannot write discoveries to this instance");
            let board = Arc::new(MemoryBoard::new());
            Ok(Boards {
                discovery: board.clone(),
                jobs: board,
            })
        }
    }
}

pub enum Transport {
    Http(Arc<HttpPublisher>),
    Local(Arc<LocalBus>),
}

impl Transport {
    pub fn from_config(cfg: &CatchupConfig) -> Self {
        match &cfg.transport.base_url {
            Some(url) => Self::Http(Arc::new(HttpPublisher::new(url.clone()))),
            None => Self::Local(Arc::new(LocalBus::new())),
        }
    }

    pub fn publisher(&self) -> Arc<dyn Publisher> {
        match self {
            Self::Http(p) => p.clone(),
            Self::Local(bus) => bus.clone(),
        }
    }

    /// Attach queue consumers. Nothing to attach for the HTTP bridge.
    pub async fn attach(
        &self,
        cfg: &CatchupConfig,
        director: Arc<Director>,
    ) -> Result<Vec<JoinHandle<()>>> {
        let Self::Local(bus) = self else {
            info!("outbound via queue bridge; inbound via POST /v1/messages");
            return Ok(Vec::new());
        };

        let q = &cfg.queues;
        let mut tasks = Vec::new();
        for queue in [&q.archive_ctrl_publish, &q.forwarder_publish, &q.telemetry] {
            tasks.push(spawn_consumer(bus, queue, director.clone()).await?);
        }
        for queue in [&q.forwarder_consume, &q.archive_ctrl_consume] {
            tasks.push(spawn_egress_log(bus, queue).await?);
        }
        info!("standalone transport: outbound queues drain into the log");
        Ok(tasks)
    }
}
