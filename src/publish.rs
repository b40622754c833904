//! Outbound publishing of aggregate records.
//!
//! Publishing is fire-and-forget: the engine hands a record to the
//! publisher and moves on. Retries, ordering, and delivery guarantees
//! belong to the channel behind the publisher, not to the engine.

use crate::engine::stats::AggregateRecord;
use tokio::sync::mpsc;

/// Sink for per-cycle aggregate records.
pub trait Publisher: Send + Sync {
    /// Hand one record to the output channel. Must not block.
    fn publish(&self, record: AggregateRecord);
}

/// Publisher backed by an in-process channel.
///
/// The channel is unbounded: the output side exerts no back-pressure on
/// flushing.
pub struct ChannelPublisher {
    sender: mpsc::UnboundedSender<AggregateRecord>,
}

impl ChannelPublisher {
    /// Create a publisher and the receiving half of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AggregateRecord>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Publisher for ChannelPublisher {
    fn publish(&self, record: AggregateRecord) {
        if self.sender.send(record).is_err() {
            tracing::debug!("aggregate receiver dropped, discarding record");
        }
    }
}

/// Publisher that POSTs each record to a webhook URL as JSON.
pub struct WebhookPublisher {
    url: String,
    client: reqwest::Client,
}

impl WebhookPublisher {
    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to create HTTP client");

        Self {
            url: url.into(),
            client,
        }
    }
}

impl Publisher for WebhookPublisher {
    fn publish(&self, record: AggregateRecord) {
        let url = self.url.clone();
        let client = self.client.clone();
        let key = record.key.clone();

        // One-shot delivery attempt; failures are logged and dropped.
        tokio::spawn(async move {
            match client.post(&url).json(&record).send().await {
                Ok(response) if !response.status().is_success() => {
                    tracing::warn!(
                        key,
                        status = %response.status(),
                        "webhook rejected aggregate record"
                    );
                }
                Ok(_) => {
                    tracing::debug!(key, "published aggregate record to webhook");
                }
                Err(e) => {
                    tracing::warn!(key, error = %e, "webhook publish failed");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn record(key: &str) -> AggregateRecord {
        AggregateRecord {
            key: key.to_string(),
            as_of: Utc::now(),
            window_size_secs: 30,
            percentile: 75.0,
            fields: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_channel_publisher_delivers() {
        let (publisher, mut receiver) = ChannelPublisher::new();
        publisher.publish(record("a"));
        publisher.publish(record("b"));

        assert_eq!(receiver.recv().await.unwrap().key, "a");
        assert_eq!(receiver.recv().await.unwrap().key, "b");
    }

    #[tokio::test]
    async fn test_channel_publisher_survives_dropped_receiver() {
        let (publisher, receiver) = ChannelPublisher::new();
        drop(receiver);

        // Must not panic or block.
        publisher.publish(record("a"));
    }
}
