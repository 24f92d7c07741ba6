//! Checkpoint events announced while a workflow progresses.
//!
//! Delivery is at-least-once: a publish may be retried, and every retry carries the same
//! event id so subscribers can discard redeliveries.

mod bus;

pub use bus::{HttpEventBus, LogEventPublisher};

use crate::config::Config;
use crate::fetch::status_class;
use crate::pipeline::Classification;
use crate::pipeline::error::{ClassifiedError, ErrorClass};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised while publishing checkpoint events.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Event bus could not be reached.
    #[error("Event bus request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Event bus rejected the event.
    #[error("Event bus returned {status}: {body}")]
    Rejected {
        /// HTTP status returned by the bus.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Event could not be encoded.
    #[error("Event could not be encoded: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl ClassifiedError for PublishError {
    fn class(&self) -> ErrorClass {
        match self {
            Self::Http(error) if error.is_builder() => ErrorClass::Validation,
            Self::Http(_) => ErrorClass::TransientInfrastructure,
            Self::Rejected { status, .. } => match status_class(*status) {
                ErrorClass::NotFound => ErrorClass::Validation,
                other => other,
            },
            Self::Encoding(_) => ErrorClass::Validation,
        }
    }
}

/// Lifecycle checkpoint and its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "detailType", content = "detail", rename_all_fields = "camelCase")]
pub enum Checkpoint {
    /// The upload was fetched and accepted for analysis.
    UploadReceived {
        /// Correlation key.
        document_ref: String,
        /// Uploader, when derivable.
        owner_id: Option<String>,
    },
    /// Classification is about to run.
    AnalysisStarted {
        /// Correlation key.
        document_ref: String,
        /// Uploader, when derivable.
        owner_id: Option<String>,
    },
    /// The document type is known.
    ClassificationCompleted {
        /// Correlation key.
        document_ref: String,
        /// Uploader, when derivable.
        owner_id: Option<String>,
        /// Label assigned by the classifier.
        classification: Classification,
    },
    /// Extraction finished.
    AnalysisCompleted {
        /// Correlation key.
        document_ref: String,
        /// Uploader, when derivable.
        owner_id: Option<String>,
    },
    /// The deduplicated result is persisted and readable.
    AnalysisReady {
        /// Correlation key.
        document_ref: String,
        /// Uploader, when derivable.
        owner_id: Option<String>,
        /// Persisted term string.
        result: String,
    },
}

impl Checkpoint {
    /// Name of the checkpoint as it appears on the bus.
    pub fn detail_type(&self) -> &'static str {
        match self {
            Self::UploadReceived { .. } => "UploadReceived",
            Self::AnalysisStarted { .. } => "AnalysisStarted",
            Self::ClassificationCompleted { .. } => "ClassificationCompleted",
            Self::AnalysisCompleted { .. } => "AnalysisCompleted",
            Self::AnalysisReady { .. } => "AnalysisReady",
        }
    }

    /// Correlation key carried by every checkpoint.
    pub fn document_ref(&self) -> &str {
        match self {
            Self::UploadReceived { document_ref, .. }
            | Self::AnalysisStarted { document_ref, .. }
            | Self::ClassificationCompleted { document_ref, .. }
            | Self::AnalysisCompleted { document_ref, .. }
            | Self::AnalysisReady { document_ref, .. } => document_ref,
        }
    }
}

/// Checkpoint stamped with a stable identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckpointEvent {
    /// Identifier reused by every delivery attempt of this checkpoint.
    pub id: String,
    /// RFC 3339 time the checkpoint was reached.
    pub time: String,
    /// Checkpoint payload.
    #[serde(flatten)]
    pub checkpoint: Checkpoint,
}

impl CheckpointEvent {
    /// Stamp a checkpoint with a fresh id and the current time.
    pub fn new(checkpoint: Checkpoint) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            time: crate::store::current_timestamp_rfc3339(),
            checkpoint,
        }
    }
}

/// Sink for checkpoint events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish one event. Implementations must tolerate redelivery of the same id.
    async fn publish(&self, event: &CheckpointEvent) -> Result<(), PublishError>;
}

/// Build the publisher selected by configuration.
pub fn get_event_publisher(config: &Config) -> Result<Arc<dyn EventPublisher>, PublishError> {
    match config.event_bus_url.as_deref() {
        Some(url) => {
            tracing::info!(url, source = %config.event_source, "Publishing checkpoints to event bus");
            Ok(Arc::new(HttpEventBus::new(
                url.to_string(),
                config.event_source.clone(),
            )?))
        }
        None => {
            tracing::info!("EVENT_BUS_URL unset; checkpoints are logged only");
            Ok(Arc::new(LogEventPublisher::new(config.event_source.clone())))
        }
    }
}
