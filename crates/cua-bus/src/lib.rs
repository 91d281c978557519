//! cua-bus
//!
//! Named-queue message transport.
//!
//! A message is a flat JSON field map. Delivery is at-least-once: consumers
//! must tolerate redelivery.
//!
//! - [`LocalBus`]: in-process transport, one bounded FIFO per queue name and
//!   one consumer per queue. Outbound queues with no peer are drained with
//!   [`spawn_egress_log`].
//! - [`HttpPublisher`]: hands outbound messages to an HTTP queue bridge.

mod http;
mod local;

pub use http::HttpPublisher;
pub use local::{spawn_consumer, spawn_egress_log, LocalBus, QUEUE_CAPACITY};

use std::sync::Arc;

use anyhow::Result;
use serde_json::{Map, Value};

/// Wire message: field name -> value.
pub type Message = Map<String, Value>;

/// Sends a message to a named queue.
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, queue: &str, message: Message) -> Result<()>;
}

/// Consumer callback for one queue.
#[async_trait::async_trait]
pub trait MessageHandler: Send + Sync {
    async fn on_message(&self, queue: &str, message: Message);
}

#[async_trait::async_trait]
impl<T: Publisher + ?Sized> Publisher for Arc<T> {
    async fn publish(&self, queue: &str, message: Message) -> Result<()> {
        (**self).publish(queue, message).await
    }
}
