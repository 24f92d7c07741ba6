//! Orchestration pipeline: typed workflow states, stage implementations, and the
//! orchestrator that sequences them for one document at a time.

pub mod classify;
pub mod dedupe;
pub mod error;
pub mod extract;
pub mod orchestrator;
pub mod prompts;
pub mod retry;
pub mod route;
pub mod state;
pub mod trigger;
mod types;

pub use classify::Classifier;
pub use dedupe::dedupe;
pub use error::{ClassifiedError, ErrorClass, FailureReason, StageError, WorkflowFailure};
pub use extract::{Extractor, ExtractorTable};
pub use orchestrator::{
    Orchestrator, OrchestratorSettings, SetupError, TriggerOutcome, WorkflowApi,
    WorkflowComponents, WorkflowSuccess,
};
pub use retry::RetryPolicy;
pub use route::{ExtractorVariant, route, route_label};
pub use state::{WorkflowState, next_state};
pub use trigger::{ObjectCreatedNotification, Trigger};
pub use types::{
    Classification, DocumentFormat, DocumentInput, DocumentRef, UnknownLabel, WorkflowRecord,
};
