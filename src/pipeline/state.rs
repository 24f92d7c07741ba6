//! Typed workflow states and the pure transition function between them.

use serde::Serialize;
use std::fmt;

use super::WorkflowRecord;
use super::error::StageError;
use super::route::{ExtractorVariant, route};

/// Every state a workflow instance can occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "state", content = "variant")]
pub enum WorkflowState {
    /// Load the uploaded object.
    Fetch,
    /// Announce that the upload was received.
    EmitUploadReceived,
    /// Announce that analysis is starting.
    EmitAnalysisStarted,
    /// Label the document's structure.
    Classify,
    /// Announce the classification.
    EmitClassificationCompleted,
    /// Select the extractor for the classification.
    Route,
    /// Run the selected extractor.
    Extract(ExtractorVariant),
    /// Announce that extraction finished.
    EmitAnalysisCompleted,
    /// Release the raw document bytes.
    DropRawContent,
    /// Deduplicate the extracted terms.
    PostProcess,
    /// Write the result under the document reference.
    Persist,
    /// Announce that the result is ready.
    NotifyReady,
    /// Terminal success.
    Succeed,
}

impl WorkflowState {
    /// Initial state of every instance.
    pub const START: WorkflowState = WorkflowState::Fetch;

    /// Whether the state ends the workflow.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeed)
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extract(variant) => write!(f, "Extract({variant})"),
            other => fmt::Debug::fmt(other, f),
        }
    }
}

/// Successor of `state` given the record produced by that state.
///
/// `Route` is the only branch point; every other state has exactly one successor.
/// `Succeed` has none and maps to itself.
pub fn next_state(
    state: WorkflowState,
    record: &WorkflowRecord,
) -> Result<WorkflowState, StageError> {
    use WorkflowState::*;
    let next = match state {
        Fetch => EmitUploadReceived,
        EmitUploadReceived => EmitAnalysisStarted,
        EmitAnalysisStarted => Classify,
        Classify => EmitClassificationCompleted,
        EmitClassificationCompleted => Route,
        Route => Extract(route(record.classification())?),
        Extract(_) => EmitAnalysisCompleted,
        EmitAnalysisCompleted => DropRawContent,
        DropRawContent => PostProcess,
        PostProcess => Persist,
        Persist => NotifyReady,
        NotifyReady => Succeed,
        Succeed => Succeed,
    };
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Classification, DocumentRef};

    fn walk(record: &WorkflowRecord) -> Result<Vec<WorkflowState>, StageError> {
        let mut state = WorkflowState::START;
        let mut visited = vec![state];
        while !state.is_terminal() {
            state = next_state(state, record)?;
            visited.push(state);
        }
        Ok(visited)
    }

    fn classified(classification: Classification) -> WorkflowRecord {
        WorkflowRecord::new(DocumentRef::new("b", "raw/u/doc"), None)
            .with_classification(classification)
            .expect("classified")
    }

    #[test]
    fn vocabulary_lists_walk_the_full_sequence() {
        let visited = walk(&classified(Classification::VocabList)).expect("walk");
        assert_eq!(
            visited,
            vec![
                WorkflowState::Fetch,
                WorkflowState::EmitUploadReceived,
                WorkflowState::EmitAnalysisStarted,
                WorkflowState::Classify,
                WorkflowState::EmitClassificationCompleted,
                WorkflowState::Route,
                WorkflowState::Extract(ExtractorVariant::VocabularyList),
                WorkflowState::EmitAnalysisCompleted,
                WorkflowState::DropRawContent,
                WorkflowState::PostProcess,
                WorkflowState::Persist,
                WorkflowState::NotifyReady,
                WorkflowState::Succeed,
            ]
        );
    }

    #[test]
    fn route_branches_on_classification() {
        for classification in Classification::ALL {
            let next = next_state(WorkflowState::Route, &classified(classification)).expect("next");
            assert_eq!(
                next,
                WorkflowState::Extract(ExtractorVariant::for_classification(classification))
            );
        }
    }

    #[test]
    fn unclassified_record_cannot_be_routed() {
        let record = WorkflowRecord::new(DocumentRef::new("b", "raw/u/doc"), None);
        let error = next_state(WorkflowState::Route, &record).expect_err("unroutable");
        assert!(matches!(error, StageError::UnknownDocType(_)));
        assert_eq!(
            next_state(WorkflowState::Classify, &record).expect("linear"),
            WorkflowState::EmitClassificationCompleted
        );
    }

    #[test]
    fn states_serialize_with_variant_payload() {
        let value = serde_json::to_value(WorkflowState::Extract(ExtractorVariant::KindleExport))
            .expect("json");
        assert_eq!(
            value,
            serde_json::json!({ "state": "Extract", "variant": "kindle-export" })
        );
        let value = serde_json::to_value(WorkflowState::Persist).expect("json");
        assert_eq!(value, serde_json::json!({ "state": "Persist" }));
    }
}
