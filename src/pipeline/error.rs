//! Failure taxonomy shared by every stage of the workflow.

use serde::Serialize;
use thiserror::Error;

use crate::events::PublishError;
use crate::fetch::FetchError;
use crate::generation::GenerationError;
use crate::pipeline::state::WorkflowState;
use crate::store::StoreError;

/// Taxonomy label attached to every failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorClass {
    /// Timeouts, throttling, 5xx responses, unreachable collaborators. Retried.
    TransientInfrastructure,
    /// An upstream invariant broke, e.g. a label outside the enumeration.
    ContractViolation,
    /// The triggering object no longer exists.
    NotFound,
    /// The request itself is unacceptable and would fail again unchanged.
    Validation,
    /// The whole-workflow deadline elapsed.
    Timeout,
}

impl ErrorClass {
    /// Only transient infrastructure failures are worth another attempt.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::TransientInfrastructure)
    }
}

/// Errors that know where they sit in the taxonomy.
pub trait ClassifiedError: std::error::Error {
    /// Taxonomy label for this failure.
    fn class(&self) -> ErrorClass;
}

/// Failure produced by a single workflow state.
#[derive(Debug, Error)]
pub enum StageError {
    /// Reading the uploaded object failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// The generation gateway failed during classification or extraction.
    #[error(transparent)]
    Generation(#[from] GenerationError),
    /// The classifier answered with a label outside the enumeration.
    #[error("Unrecognized classification label '{0}'")]
    UnrecognizedClassification(String),
    /// The router had no extractor for the record's classification.
    #[error("No extractor available for document type {0}")]
    UnknownDocType(String),
    /// A state tried to overwrite a field it does not own.
    #[error("Workflow record invariant violated: {0}")]
    RecordInvariant(&'static str),
    /// Writing the result failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Publishing a checkpoint event failed.
    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl ClassifiedError for StageError {
    fn class(&self) -> ErrorClass {
        match self {
            Self::Fetch(error) => error.class(),
            Self::Generation(error) => error.class(),
            Self::Store(error) => error.class(),
            Self::Publish(error) => error.class(),
            Self::UnrecognizedClassification(_)
            | Self::UnknownDocType(_)
            | Self::RecordInvariant(_) => ErrorClass::ContractViolation,
        }
    }
}

impl StageError {
    /// Terminal reason recorded when this error ends the workflow.
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            Self::UnrecognizedClassification(_) | Self::UnknownDocType(_) => {
                FailureReason::UnknownDocType
            }
            _ => FailureReason::StageFailed,
        }
    }
}

/// Why a workflow instance reached its terminal failure state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    /// Classification produced no routable document type.
    UnknownDocType,
    /// A stage failed permanently or exhausted its retry budget.
    StageFailed,
    /// The whole-workflow deadline elapsed.
    TimedOut,
}

/// Terminal failure of a workflow instance.
#[derive(Debug, Clone, Error, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("workflow for {document_ref} failed in {failed_in:?} ({reason:?}, {error_class:?}): {message}")]
pub struct WorkflowFailure {
    /// Document reference of the failed instance.
    pub document_ref: String,
    /// State that was active when the failure happened.
    pub failed_in: WorkflowState,
    /// Terminal reason.
    pub reason: FailureReason,
    /// Taxonomy label of the originating error.
    pub error_class: ErrorClass,
    /// Human-readable description of the originating error.
    pub message: String,
    /// States entered, in order, ending with the one that failed.
    pub visited: Vec<WorkflowState>,
}
