//! Publishers: HTTP event bus envelope and the log-only fallback.

use super::{CheckpointEvent, EventPublisher, PublishError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

const PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct Envelope<'a> {
    source: &'a str,
    #[serde(flatten)]
    event: &'a CheckpointEvent,
}

/// Publishes checkpoint envelopes to an HTTP event bus endpoint.
pub struct HttpEventBus {
    http: Client,
    url: String,
    source: String,
}

impl HttpEventBus {
    /// Build a publisher posting to `url` with the given source attribute.
    pub fn new(url: String, source: String) -> Result<Self, PublishError> {
        let http = Client::builder()
            .user_agent("wordcollect/events")
            .timeout(PUBLISH_TIMEOUT)
            .build()?;
        Ok(Self { http, url, source })
    }
}

#[async_trait]
impl EventPublisher for HttpEventBus {
    async fn publish(&self, event: &CheckpointEvent) -> Result<(), PublishError> {
        let envelope = Envelope {
            source: &self.source,
            event,
        };
        let body = serde_json::to_vec(&envelope)?;
        let response = self
            .http
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Rejected { status, body });
        }

        tracing::debug!(
            event_id = %event.id,
            detail_type = event.checkpoint.detail_type(),
            document = event.checkpoint.document_ref(),
            "Checkpoint published"
        );
        Ok(())
    }
}

/// Publisher that only writes checkpoints to the log.
pub struct LogEventPublisher {
    source: String,
}

impl LogEventPublisher {
    /// Build a log-only publisher.
    pub fn new(source: String) -> Self {
        Self { source }
    }
}

#[async_trait]
impl EventPublisher for LogEventPublisher {
    async fn publish(&self, event: &CheckpointEvent) -> Result<(), PublishError> {
        tracing::info!(
            source = %self.source,
            event_id = %event.id,
            detail_type = event.checkpoint.detail_type(),
            document = event.checkpoint.document_ref(),
            "Checkpoint"
        );
        Ok(())
    }
}
