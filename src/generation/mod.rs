//! Text-generation gateway used by the classifier and the extractors.
//!
//! Every caller goes through the single [`TextGenerator::generate`] capability so the
//! pipeline can be exercised against deterministic stubs. Two HTTP backends are provided:
//! a local Ollama runtime and the Anthropic Messages API. Decoding is always greedy;
//! only the output budget varies per call site.

mod anthropic;
mod ollama;

pub use anthropic::AnthropicGenerator;
pub use ollama::OllamaGenerator;

use crate::config::{Config, GenerationProvider};
use crate::fetch::status_class;
use crate::pipeline::DocumentInput;
use crate::pipeline::error::{ClassifiedError, ErrorClass};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by generation backends.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Provider could not be reached or did not answer in time.
    #[error("Generation provider unavailable: {0}")]
    Unavailable(String),
    /// Provider answered with a non-success status.
    #[error("Generation provider returned {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Provider response could not be decoded.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
    /// The backend cannot read documents of this format.
    #[error("Document format {0} is not supported by this provider")]
    UnsupportedDocument(String),
    /// Client could not be constructed from configuration.
    #[error("Invalid generation client configuration: {0}")]
    Configuration(String),
}

impl ClassifiedError for GenerationError {
    fn class(&self) -> ErrorClass {
        match self {
            Self::Unavailable(_) | Self::InvalidResponse(_) => ErrorClass::TransientInfrastructure,
            Self::UnexpectedStatus { status, .. } => match status_class(*status) {
                // A missing model or endpoint is a configuration problem, not a missing upload.
                ErrorClass::NotFound => ErrorClass::Validation,
                other => other,
            },
            Self::UnsupportedDocument(_) | Self::Configuration(_) => ErrorClass::Validation,
        }
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_builder() {
            Self::Configuration(error.to_string())
        } else if error.is_decode() {
            Self::InvalidResponse(error.to_string())
        } else {
            Self::Unavailable(error.to_string())
        }
    }
}

/// Decoding parameters sent with every call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodingParams {
    /// Sampling temperature.
    pub temperature: f32,
    /// Nucleus sampling mass.
    pub top_p: f32,
    /// Top-k cutoff.
    pub top_k: u32,
    /// Output token budget.
    pub max_tokens: u32,
}

impl DecodingParams {
    /// Greedy, reproducible decoding with the given output budget.
    pub const fn greedy(max_tokens: u32) -> Self {
        Self {
            temperature: 0.0,
            top_p: 1.0,
            top_k: 1,
            max_tokens,
        }
    }
}

/// One prompted call: instructions, user prompt, attached document.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    /// System instruction set.
    pub system: &'a str,
    /// User instruction preceding the document.
    pub user: &'a str,
    /// Document the instructions apply to.
    pub document: DocumentInput<'a>,
    /// Decoding parameters for this call site.
    pub decoding: DecodingParams,
}

/// Capability wrapping a prompted call to a generative model.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Run the prompt against the document and return the model's raw text.
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, GenerationError>;
}

/// Build the generation backend selected by configuration.
pub fn get_text_generator(config: &Config) -> Result<Arc<dyn TextGenerator>, GenerationError> {
    let generator: Arc<dyn TextGenerator> = match config.generation_provider {
        GenerationProvider::Ollama => Arc::new(OllamaGenerator::new(
            config.ollama_base_url().to_string(),
            config.generation_model.clone(),
            config.generation_timeout(),
        )?),
        GenerationProvider::Anthropic => {
            let api_key = config.anthropic_api_key.clone().ok_or_else(|| {
                GenerationError::Configuration("ANTHROPIC_API_KEY is not set".into())
            })?;
            Arc::new(AnthropicGenerator::new(
                config.anthropic_base_url().to_string(),
                api_key,
                config.generation_model.clone(),
                config.generation_timeout(),
            )?)
        }
    };
    tracing::info!(
        provider = ?config.generation_provider,
        model = %config.generation_model,
        "Generation client initialized"
    );
    Ok(generator)
}

/// Wrap a text document in a delimited envelope for providers without document blocks.
pub(crate) fn inline_document(document: &DocumentInput<'_>) -> String {
    let text = String::from_utf8_lossy(document.content);
    format!(
        "<document name=\"{}\" format=\"{}\">\n{}\n</document>",
        document.name, document.format, text
    )
}
