//! Domain event publishing
//!
//! Events go to NATS when a connection is configured, one subject per
//! event kind. Without one they are only logged.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::events::DomainEvent;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Event encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Publish failed: {0}")]
    Transport(String),
}

/// Wire format: the event plus a time-ordered id consumers can dedupe on.
#[derive(Debug, Serialize)]
pub struct EventEnvelope<'a> {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: &'a DomainEvent,
}

impl<'a> EventEnvelope<'a> {
    pub fn new(event: &'a DomainEvent) -> Self {
        Self { event_id: Uuid::now_v7(), occurred_at: Utc::now(), event }
    }
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError>;
}

pub struct NatsPublisher { client: async_nats::Client }

impl NatsPublisher {
    pub fn new(client: async_nats::Client) -> Self { Self { client } }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(&EventEnvelope::new(event))?;
        self.client.publish(event.subject().to_string(), payload.into()).await
            .map_err(|e| PublishError::Transport(e.to_string()))
    }
}

#[derive(Debug, Default)]
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_string(&EventEnvelope::new(event))?;
        tracing::info!(subject = event.subject(), %payload, "event (no broker configured)");
        Ok(())
    }
}

/// Publishes every event, logging failures. Returns how many were delivered.
pub async fn publish_all(publisher: &dyn EventPublisher, events: &[DomainEvent]) -> usize {
    let mut delivered = 0;
    for event in events {
        match publisher.publish(event).await {
            Ok(()) => delivered += 1,
            Err(e) => tracing::warn!(subject = event.subject(), error = %e, "event not published"),
        }
    }
    delivered
}
