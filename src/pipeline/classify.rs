//! Classifier stage: asks the generation gateway for one label and parses it strictly.

use std::sync::Arc;

use super::error::StageError;
use super::prompts::CLASSIFICATION;
use super::{Classification, DocumentInput};
use crate::generation::{DecodingParams, GenerationRequest, TextGenerator};

/// Labels a document's dominant structure through the generation gateway.
#[derive(Clone)]
pub struct Classifier {
    generator: Arc<dyn TextGenerator>,
    max_tokens: u32,
}

impl Classifier {
    /// Build a classifier with the given output budget.
    pub fn new(generator: Arc<dyn TextGenerator>, max_tokens: u32) -> Self {
        Self {
            generator,
            max_tokens,
        }
    }

    /// Classify the document. The trimmed answer must be an exact enumeration member.
    pub async fn classify(&self, document: DocumentInput<'_>) -> Result<Classification, StageError> {
        let answer = self
            .generator
            .generate(GenerationRequest {
                system: CLASSIFICATION.system,
                user: CLASSIFICATION.user,
                document,
                decoding: DecodingParams::greedy(self.max_tokens),
            })
            .await?;
        let label = answer.trim();
        let classification = label
            .parse::<Classification>()
            .map_err(|error| StageError::UnrecognizedClassification(error.0))?;
        tracing::debug!(document = document.name, %classification, "Document classified");
        Ok(classification)
    }
}
