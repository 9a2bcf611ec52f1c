//! Broker consumer seam. Workers consume through the `AlertSource` trait so
//! the loop can be exercised without a live broker; the production
//! implementation wraps one exclusive Kafka consumer per worker.

use crate::config::BrokerConfig;
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::Message;
use std::time::Duration;

#[derive(Debug)]
pub enum SourceError {
    /// Broker unreachable or subscription rejected at worker start.
    Connect(String),
    /// Per-message delivery error; the message is dropped, never retried.
    Delivery(String),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Connect(e) => write!(f, "broker connect failed: {}", e),
            SourceError::Delivery(e) => write!(f, "delivery error: {}", e),
        }
    }
}

impl std::error::Error for SourceError {}

#[async_trait]
pub trait AlertSource: Send {
    /// Wait up to `timeout` for the next message payload. `Ok(None)` means
    /// the poll timed out with nothing pending: the consumer has caught up
    /// and the run can end cleanly.
    async fn poll(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, SourceError>;

    /// Drain and close the consumer. Offsets beyond what the group's
    /// auto-commit provides are not committed; delivery is at-least-once.
    async fn close(&mut self);
}

pub struct KafkaAlertSource {
    consumer: StreamConsumer,
}

impl KafkaAlertSource {
    pub fn connect(cfg: &BrokerConfig) -> Result<Self, SourceError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &cfg.host)
            .set("group.id", &cfg.group)
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "true")
            .create()
            .map_err(|e| SourceError::Connect(e.to_string()))?;

        consumer
            .subscribe(&[cfg.topic.as_str()])
            .map_err(|e| SourceError::Connect(e.to_string()))?;

        Ok(Self { consumer })
    }
}

#[async_trait]
impl AlertSource for KafkaAlertSource {
    async fn poll(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, SourceError> {
        match tokio::time::timeout(timeout, self.consumer.recv()).await {
            Err(_) => Ok(None),
            Ok(Err(e)) => Err(SourceError::Delivery(e.to_string())),
            Ok(Ok(msg)) => match msg.payload() {
                Some(payload) => Ok(Some(payload.to_vec())),
                None => Err(SourceError::Delivery("empty payload".to_string())),
            },
        }
    }

    async fn close(&mut self) {
        self.consumer.unsubscribe();
    }
}
