//! Orchestrator driving one document through the workflow state machine.

use crate::{
    config::{Config, get_config},
    events::{Checkpoint, CheckpointEvent, EventPublisher, PublishError, get_event_publisher},
    fetch::{ContentFetcher, FetchError, HttpObjectStore, ObjectStore},
    generation::{GenerationError, TextGenerator, get_text_generator},
    metrics::{MetricsSnapshot, WorkflowMetrics},
    pipeline::{
        Classification, WorkflowRecord,
        classify::Classifier,
        dedupe::{dedupe, term_count},
        error::{ClassifiedError, ErrorClass, FailureReason, StageError, WorkflowFailure},
        extract::ExtractorTable,
        retry::RetryPolicy,
        route::route,
        state::{WorkflowState, next_state},
        trigger::{ObjectCreatedNotification, Trigger},
    },
    store::{FileResultStore, PersistAck, ResultStore, StoreError},
};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tracing::Instrument;

/// Collaborators the orchestrator sequences.
#[derive(Clone)]
pub struct WorkflowComponents {
    /// Source of uploaded documents.
    pub object_store: Arc<dyn ObjectStore>,
    /// Gateway shared by the classifier and the extractors.
    pub generator: Arc<dyn TextGenerator>,
    /// Destination of deduplicated results.
    pub result_store: Arc<dyn ResultStore>,
    /// Sink for checkpoint events.
    pub publisher: Arc<dyn EventPublisher>,
}

/// Tunables applied to every workflow instance.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Key prefix eligible for analysis.
    pub raw_prefix: String,
    /// Per-stage retry policy.
    pub retry: RetryPolicy,
    /// Whole-workflow deadline.
    pub workflow_timeout: Duration,
    /// Classifier output budget.
    pub classification_max_tokens: u32,
    /// Extractor output budget.
    pub extraction_max_tokens: u32,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            raw_prefix: "raw/".into(),
            retry: RetryPolicy::default(),
            workflow_timeout: Duration::from_secs(600),
            classification_max_tokens: 10,
            extraction_max_tokens: 4096,
        }
    }
}

impl OrchestratorSettings {
    /// Settings described by configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            raw_prefix: config.raw_prefix.clone(),
            retry: RetryPolicy::from_config(config),
            workflow_timeout: config.workflow_timeout(),
            classification_max_tokens: config.classification_max_tokens,
            extraction_max_tokens: config.extraction_max_tokens,
        }
    }
}

/// Errors raised while wiring collaborators from configuration.
#[derive(Debug, Error)]
pub enum SetupError {
    /// Object store client could not be built.
    #[error(transparent)]
    ObjectStore(#[from] FetchError),
    /// Generation client could not be built.
    #[error(transparent)]
    Generation(#[from] GenerationError),
    /// Result store could not be opened.
    #[error(transparent)]
    ResultStore(#[from] StoreError),
    /// Event publisher could not be built.
    #[error(transparent)]
    Publisher(#[from] PublishError),
}

/// Terminal success of a workflow instance.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSuccess {
    /// Document reference of the instance.
    pub document_ref: String,
    /// Uploader, when derivable.
    pub owner_id: Option<String>,
    /// Classification that selected the extractor.
    pub classification: Classification,
    /// Persisted, deduplicated term string.
    pub result: String,
    /// Confirmation returned by the result store.
    pub persist_ack: PersistAck,
    /// States entered, in order.
    pub visited: Vec<WorkflowState>,
}

/// What happened to a trigger.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum TriggerOutcome {
    /// The key is not eligible; no workflow was started.
    Ignored {
        /// Object key of the notification.
        key: String,
    },
    /// The workflow reached `Succeed`.
    Succeeded(WorkflowSuccess),
    /// The workflow reached a terminal failure.
    Failed(WorkflowFailure),
}

/// Abstraction over the orchestrator used by external surfaces (HTTP, CLI).
#[async_trait]
pub trait WorkflowApi: Send + Sync {
    /// Accept or ignore an object-created notification, running the workflow when accepted.
    async fn handle_notification(&self, notification: ObjectCreatedNotification)
    -> TriggerOutcome;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Sequences fetch, classification, routing, extraction, post-processing, persistence and
/// notification for one document at a time.
///
/// The orchestrator holds no per-workflow state; construct it once near process start and
/// share it through an `Arc`. Concurrent workflows only meet in the result store.
pub struct Orchestrator {
    fetcher: ContentFetcher,
    classifier: Classifier,
    extractors: ExtractorTable,
    result_store: Arc<dyn ResultStore>,
    publisher: Arc<dyn EventPublisher>,
    settings: OrchestratorSettings,
    metrics: Arc<WorkflowMetrics>,
}

impl Orchestrator {
    /// Wire the orchestrator from explicit collaborators.
    pub fn new(components: WorkflowComponents, settings: OrchestratorSettings) -> Self {
        let WorkflowComponents {
            object_store,
            generator,
            result_store,
            publisher,
        } = components;
        Self {
            fetcher: ContentFetcher::new(object_store),
            classifier: Classifier::new(generator.clone(), settings.classification_max_tokens),
            extractors: ExtractorTable::standard(generator, settings.extraction_max_tokens),
            result_store,
            publisher,
            settings,
            metrics: Arc::new(WorkflowMetrics::new()),
        }
    }

    /// Wire the orchestrator from the global configuration.
    pub async fn from_config() -> Result<Self, SetupError> {
        let config = get_config();
        tracing::info!("Initializing workflow collaborators");
        let components = WorkflowComponents {
            object_store: Arc::new(HttpObjectStore::new()?),
            generator: get_text_generator(config)?,
            result_store: Arc::new(FileResultStore::new().await?),
            publisher: get_event_publisher(config)?,
        };
        tracing::info!(
            raw_prefix = %config.raw_prefix,
            max_attempts = config.retry_max_attempts,
            timeout_secs = config.workflow_timeout_secs,
            "Orchestrator ready"
        );
        Ok(Self::new(components, OrchestratorSettings::from_config(config)))
    }

    /// Replace the extractor dispatch table.
    pub fn with_extractors(mut self, extractors: ExtractorTable) -> Self {
        self.extractors = extractors;
        self
    }

    /// Current counters.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Accept or ignore a notification, running the workflow when accepted.
    pub async fn handle_notification(
        &self,
        notification: &ObjectCreatedNotification,
    ) -> TriggerOutcome {
        match Trigger::from_notification(notification, &self.settings.raw_prefix) {
            Some(trigger) => match self.run(trigger).await {
                Ok(success) => TriggerOutcome::Succeeded(success),
                Err(failure) => TriggerOutcome::Failed(failure),
            },
            None => {
                let key = notification.detail.object.key.clone();
                self.metrics.record_ignored();
                tracing::info!(
                    key = %key,
                    raw_prefix = %self.settings.raw_prefix,
                    "Ignoring object outside raw prefix"
                );
                TriggerOutcome::Ignored { key }
            }
        }
    }

    /// Run one workflow instance to a terminal state under the whole-workflow deadline.
    pub async fn run(&self, trigger: Trigger) -> Result<WorkflowSuccess, WorkflowFailure> {
        let document_ref = trigger.document_ref.to_string();
        let span = tracing::info_span!("workflow", document = %document_ref);
        let visited = Mutex::new(Vec::new());
        self.metrics.record_started();

        let deadline = self.settings.workflow_timeout;
        let outcome = tokio::time::timeout(deadline, self.drive(trigger, &visited))
            .instrument(span.clone())
            .await;

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(_) => {
                let visited = visited.lock().unwrap_or_else(PoisonError::into_inner).clone();
                Err(WorkflowFailure {
                    document_ref,
                    failed_in: visited.last().copied().unwrap_or(WorkflowState::START),
                    reason: FailureReason::TimedOut,
                    error_class: ErrorClass::Timeout,
                    message: format!("workflow exceeded its {}s deadline", deadline.as_secs_f64()),
                    visited,
                })
            }
        };

        span.in_scope(|| match &outcome {
            Ok(success) => {
                let terms = term_count(&success.result);
                self.metrics.record_succeeded(terms as u64);
                tracing::info!(
                    classification = %success.classification,
                    terms,
                    replaced = success.persist_ack.replaced,
                    "Workflow succeeded"
                );
            }
            Err(failure) => {
                self.metrics.record_failed();
                tracing::warn!(
                    failed_in = %failure.failed_in,
                    reason = ?failure.reason,
                    error_class = ?failure.error_class,
                    error = %failure.message,
                    "Workflow failed"
                );
            }
        });
        outcome
    }

    async fn drive(
        &self,
        trigger: Trigger,
        visited: &Mutex<Vec<WorkflowState>>,
    ) -> Result<WorkflowSuccess, WorkflowFailure> {
        let document_ref = trigger.document_ref.to_string();
        let mut record = WorkflowRecord::new(trigger.document_ref, trigger.owner_id);
        let mut state = WorkflowState::START;

        loop {
            enter(visited, state);
            tracing::debug!(state = %state, "Entered state");
            if state.is_terminal() {
                return finish(record, snapshot(visited))
                    .map_err(|error| fail(&document_ref, state, error, snapshot(visited)));
            }
            record = self
                .step(state, record)
                .await
                .map_err(|error| fail(&document_ref, state, error, snapshot(visited)))?;
            state = next_state(state, &record)
                .map_err(|error| fail(&document_ref, state, error, snapshot(visited)))?;
        }
    }

    async fn step(
        &self,
        state: WorkflowState,
        record: WorkflowRecord,
    ) -> Result<WorkflowRecord, StageError> {
        let retry = self.settings.retry;
        match state {
            WorkflowState::Fetch => {
                let fetcher = &self.fetcher;
                let document = record.document_ref();
                let fetched = retry
                    .run("fetch", move || fetcher.fetch(document))
                    .await?;
                Ok(record.with_document(fetched.content, fetched.format, fetched.name))
            }
            WorkflowState::EmitUploadReceived => {
                let (document_ref, owner_id) = correlation(&record);
                self.emit(Checkpoint::UploadReceived {
                    document_ref,
                    owner_id,
                })
                .await?;
                Ok(record)
            }
            WorkflowState::EmitAnalysisStarted => {
                let (document_ref, owner_id) = correlation(&record);
                self.emit(Checkpoint::AnalysisStarted {
                    document_ref,
                    owner_id,
                })
                .await?;
                Ok(record)
            }
            WorkflowState::Classify => {
                let classifier = &self.classifier;
                let document = record.document_input();
                let classification = retry
                    .run("classify", move || classifier.classify(document))
                    .await?;
                record
                    .with_classification(classification)
                    .map_err(|_| StageError::RecordInvariant("classification already set"))
            }
            WorkflowState::EmitClassificationCompleted => {
                let classification = record
                    .classification()
                    .ok_or(StageError::RecordInvariant("classification missing"))?;
                let (document_ref, owner_id) = correlation(&record);
                self.emit(Checkpoint::ClassificationCompleted {
                    document_ref,
                    owner_id,
                    classification,
                })
                .await?;
                Ok(record)
            }
            WorkflowState::Route => {
                let variant = route(record.classification())?;
                self.extractors.get(variant)?;
                tracing::debug!(variant = %variant, "Extractor selected");
                Ok(record)
            }
            WorkflowState::Extract(variant) => {
                let extractor = self.extractors.get(variant)?;
                let extractor = extractor.as_ref();
                let document = record.document_input();
                let raw = retry
                    .run("extract", move || extractor.extract(document))
                    .await?;
                tracing::debug!(variant = %variant, bytes = raw.len(), "Raw terms extracted");
                Ok(record.with_extracted_terms(raw))
            }
            WorkflowState::EmitAnalysisCompleted => {
                let (document_ref, owner_id) = correlation(&record);
                self.emit(Checkpoint::AnalysisCompleted {
                    document_ref,
                    owner_id,
                })
                .await?;
                Ok(record)
            }
            WorkflowState::DropRawContent => Ok(record.without_content()),
            WorkflowState::PostProcess => {
                let raw = record
                    .extracted_terms
                    .as_deref()
                    .ok_or(StageError::RecordInvariant("extracted terms missing"))?;
                let clean = dedupe(raw);
                Ok(record.with_extracted_terms(clean))
            }
            WorkflowState::Persist => {
                let store = self.result_store.as_ref();
                let pk = record.document_ref().pk();
                let result = record
                    .extracted_terms
                    .as_deref()
                    .ok_or(StageError::RecordInvariant("extracted terms missing"))?;
                let ack = retry
                    .run("persist", move || store.put(pk, result))
                    .await?;
                Ok(record.with_persist_ack(ack))
            }
            WorkflowState::NotifyReady => {
                if record.persist_ack.is_none() {
                    return Err(StageError::RecordInvariant("result not persisted"));
                }
                let result = record
                    .extracted_terms
                    .clone()
                    .ok_or(StageError::RecordInvariant("extracted terms missing"))?;
                let (document_ref, owner_id) = correlation(&record);
                self.emit(Checkpoint::AnalysisReady {
                    document_ref,
                    owner_id,
                    result,
                })
                .await?;
                Ok(record)
            }
            WorkflowState::Succeed => Ok(record),
        }
    }

    /// Publish one checkpoint. The event id is fixed before the first attempt.
    async fn emit(&self, checkpoint: Checkpoint) -> Result<(), StageError> {
        let event = CheckpointEvent::new(checkpoint);
        let publisher = self.publisher.as_ref();
        let event_ref = &event;
        self.settings
            .retry
            .run("publish", move || publisher.publish(event_ref))
            .await?;
        tracing::debug!(
            event_id = %event.id,
            detail_type = event.checkpoint.detail_type(),
            "Checkpoint emitted"
        );
        Ok(())
    }
}

#[async_trait]
impl WorkflowApi for Orchestrator {
    async fn handle_notification(
        &self,
        notification: ObjectCreatedNotification,
    ) -> TriggerOutcome {
        Orchestrator::handle_notification(self, &notification).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        Orchestrator::metrics_snapshot(self)
    }
}

fn correlation(record: &WorkflowRecord) -> (String, Option<String>) {
    (record.document_ref().key.clone(), record.owner_id.clone())
}

fn enter(visited: &Mutex<Vec<WorkflowState>>, state: WorkflowState) {
    visited
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(state);
}

fn snapshot(visited: &Mutex<Vec<WorkflowState>>) -> Vec<WorkflowState> {
    visited
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

fn fail(
    document_ref: &str,
    state: WorkflowState,
    error: StageError,
    visited: Vec<WorkflowState>,
) -> WorkflowFailure {
    WorkflowFailure {
        document_ref: document_ref.to_string(),
        failed_in: state,
        reason: error.failure_reason(),
        error_class: error.class(),
        message: error.to_string(),
        visited,
    }
}

fn finish(
    record: WorkflowRecord,
    visited: Vec<WorkflowState>,
) -> Result<WorkflowSuccess, StageError> {
    let classification = record
        .classification()
        .ok_or(StageError::RecordInvariant("classification missing"))?;
    let document_ref = record.document_ref().key.clone();
    let WorkflowRecord {
        owner_id,
        extracted_terms,
        persist_ack,
        ..
    } = record;
    Ok(WorkflowSuccess {
        document_ref,
        owner_id,
        classification,
        result: extracted_terms.ok_or(StageError::RecordInvariant("extracted terms missing"))?,
        persist_ack: persist_ack.ok_or(StageError::RecordInvariant("result not persisted"))?,
        visited,
    })
}
