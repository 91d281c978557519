use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{bail, Result};
use cua_bus::{Message, Publisher};
use tokio::sync::Mutex;

/// Publisher that records `(queue, message)` pairs in order.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    sent: Mutex<Vec<(String, Message)>>,
    failing: AtomicBool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent publish fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn published(&self) -> Vec<(String, Message)> {
        self.sent.lock().await.clone()
    }

    /// `MSG_TYPE` of every recorded message, in order.
    pub async fn msg_types(&self) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter_map(|(_, m)| m.get("MSG_TYPE")?.as_str().map(str::to_string))
            .collect()
    }

    pub async fn clear(&self) {
        self.sent.lock().await.clear();
    }
}

#[async_trait::async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, queue: &str, message: Message) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("transport down: cannot publish to {queue}");
        }
        self.sent.lock().await.push((queue.to_string(), message));
        Ok(())
    }
}
