use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{Message, MessageHandler, Publisher};

/// Messages buffered per queue before publishers are refused.
pub const QUEUE_CAPACITY: usize = 1024;

struct Queue {
    tx: mpsc::Sender<Message>,
    // Handed out once, to the single consumer.
    rx: Option<mpsc::Receiver<Message>>,
}

impl Queue {
    fn new() -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        Self { tx, rx: Some(rx) }
    }
}

/// In-process queue bus.
///
/// Queues are created on first use by either side, so a publisher may run
/// before its consumer is attached; messages wait in the queue.
#[derive(Default)]
pub struct LocalBus {
    queues: Mutex<HashMap<String, Queue>>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the receiving end of `queue`. Each queue has one consumer.
    pub async fn consume(&self, queue: &str) -> Result<mpsc::Receiver<Message>> {
        let mut queues = self.queues.lock().await;
        let q = queues.entry(queue.to_string()).or_insert_with(Queue::new);
        q.rx
            .take()
            .ok_or_else(|| anyhow!("queue {queue} already has a consumer"))
    }

    /// Messages waiting in `queue` (0 for unknown queues).
    pub async fn depth(&self, queue: &str) -> usize {
        let queues = self.queues.lock().await;
        queues
            .get(queue)
            .map(|q| QUEUE_CAPACITY - q.tx.capacity())
            .unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl Publisher for LocalBus {
    async fn publish(&self, queue: &str, message: Message) -> Result<()> {
        let tx = {
            let mut queues = self.queues.lock().await;
            queues
                .entry(queue.to_string())
                .or_insert_with(Queue::new)
                .tx
                .clone()
        };
        match tx.try_send(message) {
            Ok(()) => {
                debug!(queue, "message published");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                bail!("queue {queue} is full ({QUEUE_CAPACITY} messages)")
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                bail!("queue {queue} consumer has shut down")
            }
        }
    }
}

/// Attach `handler` as the consumer of `queue`. The task runs until the
/// bus is dropped.
pub async fn spawn_consumer(
    bus: &LocalBus,
    queue: &str,
    handler: Arc<dyn MessageHandler>,
) -> Result<JoinHandle<()>> {
    let mut rx = bus.consume(queue).await?;
    let queue = queue.to_string();
    info!(queue = %queue, "consumer attached");
    Ok(tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            handler.on_message(&queue, message).await;
        }
        warn!(queue = %queue, "consumer stopped: queue closed");
    }))
}

/// Terminal consumer for an outbound queue nobody else reads: each message
/// is logged and dropped.
struct EgressLog;

#[async_trait::async_trait]
impl MessageHandler for EgressLog {
    async fn on_message(&self, queue: &str, message: Message) {
        let msg_type = message
            .get("MSG_TYPE")
            .and_then(|v| v.as_str())
            .unwrap_or("<untyped>");
        info!(queue, msg_type, fields = ?message, "outbound message (standalone)");
    }
}

/// Drain `queue` into the log so a standalone bus never fills up.
pub async fn spawn_egress_log(bus: &LocalBus, queue: &str) -> Result<JoinHandle<()>> {
    spawn_consumer(bus, queue, Arc::new(EgressLog)).await
}
