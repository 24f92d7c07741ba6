//! Ollama chat backend for local models.

use super::{GenerationError, GenerationRequest, TextGenerator, inline_document};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Generation backend talking to a local Ollama runtime via `/api/chat`.
pub struct OllamaGenerator {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaGenerator {
    /// Build a client for the given runtime and model.
    pub fn new(base_url: String, model: String, timeout: Duration) -> Result<Self, GenerationError> {
        let http = Client::builder()
            .user_agent("wordcollect/generate")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url,
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/chat", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    content: String,
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, GenerationError> {
        if request.document.format.is_binary() {
            return Err(GenerationError::UnsupportedDocument(
                request.document.format.to_string(),
            ));
        }

        let user = format!("{}\n\n{}", request.user.trim(), inline_document(&request.document));
        let payload = json!({
            "model": self.model,
            "stream": false,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": user },
            ],
            "options": {
                "temperature": request.decoding.temperature,
                "top_p": request.decoding.top_p,
                "top_k": request.decoding.top_k,
                "num_predict": request.decoding.max_tokens,
            }
        });

        tracing::debug!(
            model = %self.model,
            document = request.document.name,
            max_tokens = request.decoding.max_tokens,
            "Sending Ollama chat request"
        );

        let response = self.http.post(self.endpoint()).json(&payload).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::UnexpectedStatus { status, body });
        }

        let body: OllamaChatResponse = response.json().await.map_err(|error| {
            GenerationError::InvalidResponse(format!("failed to decode Ollama response: {error}"))
        })?;

        if !body.done {
            return Err(GenerationError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        if body.done_reason.as_deref() == Some("length") {
            return Err(GenerationError::InvalidResponse(format!(
                "Ollama response truncated at {} output tokens",
                request.decoding.max_tokens
            )));
        }

        Ok(body.message.content)
    }
}
