use anyhow::{bail, Context, Result};
use tracing::debug;

use crate::{Message, Publisher};

/// Publisher that hands each message to an HTTP queue bridge:
/// `POST {base_url}/queues/{queue}` with the field map as the JSON body.
///
/// Any 2xx counts as enqueued. The bridge owns delivery from there.
#[derive(Debug, Clone)]
pub struct HttpPublisher {
    http: reqwest::Client,
    base_url: String,
}

impl HttpPublisher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_http(reqwest::Client::new(), base_url)
    }

    pub fn with_http(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    fn queue_url(&self, queue: &str) -> String {
        format!("{}/queues/{queue}", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait::async_trait]
impl Publisher for HttpPublisher {
    async fn publish(&self, queue: &str, message: Message) -> Result<()> {
        let resp = self
            .http
            .post(self.queue_url(queue))
            .json(&message)
            .send()
            .await
            .with_context(|| format!("queue bridge unreachable for {queue}"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let body: String = body.chars().take(200).collect();
            bail!(
                "queue bridge refused {queue}: status={} body={}",
                status.as_u16(),
                body
            );
        }
        debug!(queue, "message handed to queue bridge");
        Ok(())
    }
}
