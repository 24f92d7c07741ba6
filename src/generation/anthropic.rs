//! Anthropic Messages API backend.

use super::{GenerationError, GenerationRequest, TextGenerator};
use crate::pipeline::DocumentInput;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Generation backend using the Anthropic Messages API with native document blocks.
pub struct AnthropicGenerator {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AnthropicGenerator {
    /// Build a client for the given endpoint, key, and model.
    pub fn new(
        base_url: String,
        api_key: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let http = Client::builder()
            .user_agent("wordcollect/generate")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url,
            api_key,
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

/// PDFs travel as base64; every other format as a plain-text source.
fn document_block(document: &DocumentInput<'_>) -> Value {
    let source = if document.format.is_binary() {
        json!({
            "type": "base64",
            "media_type": document.format.media_type(),
            "data": STANDARD.encode(document.content),
        })
    } else {
        json!({
            "type": "text",
            "media_type": "text/plain",
            "data": String::from_utf8_lossy(document.content),
        })
    };
    json!({
        "type": "document",
        "title": document.name,
        "source": source,
    })
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl TextGenerator for AnthropicGenerator {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, GenerationError> {
        let payload = json!({
            "model": self.model,
            "max_tokens": request.decoding.max_tokens,
            "temperature": request.decoding.temperature,
            "top_p": request.decoding.top_p,
            "top_k": request.decoding.top_k,
            "system": request.system,
            "messages": [
                {
                    "role": "user",
                    "content": [
                        document_block(&request.document),
                        { "type": "text", "text": request.user },
                    ]
                }
            ]
        });

        tracing::debug!(
            model = %self.model,
            document = request.document.name,
            format = %request.document.format,
            max_tokens = request.decoding.max_tokens,
            "Sending Anthropic messages request"
        );

        let response = self
            .http
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::UnexpectedStatus { status, body });
        }

        let body: MessagesResponse = response.json().await.map_err(|error| {
            GenerationError::InvalidResponse(format!(
                "failed to decode Anthropic response: {error}"
            ))
        })?;

        let stop_reason = body.stop_reason.as_deref().unwrap_or("none");
        if stop_reason == "max_tokens" {
            return Err(GenerationError::InvalidResponse(format!(
                "Anthropic response truncated at {} output tokens",
                request.decoding.max_tokens
            )));
        }

        body.content
            .iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text.clone())
            .ok_or_else(|| {
                GenerationError::InvalidResponse(format!(
                    "Anthropic response carried no text block (stop_reason: {stop_reason})"
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::DecodingParams;
    use crate::pipeline::DocumentFormat;
    use httpmock::{Method::POST, MockServer};

    fn generator(server: &MockServer) -> AnthropicGenerator {
        AnthropicGenerator::new(
            server.base_url(),
            "test-key".into(),
            "claude-test".into(),
            Duration::from_secs(5),
        )
        .expect("client")
    }

    #[test]
    fn pdf_documents_are_base64_encoded() {
        let block = document_block(&DocumentInput {
            format: DocumentFormat::Pdf,
            name: "book.pdf",
            content: b"%PDF",
        });
        assert_eq!(block["source"]["type"], "base64");
        assert_eq!(block["source"]["media_type"], "application/pdf");
        assert_eq!(block["source"]["data"], "JVBERg==");
        assert_eq!(block["title"], "book.pdf");
    }

    #[test]
    fn text_documents_use_plain_text_source() {
        let block = document_block(&DocumentInput {
            format: DocumentFormat::Html,
            name: "notes.html",
            content: b"<p>laconic</p>",
        });
        assert_eq!(block["source"]["type"], "text");
        assert_eq!(block["source"]["media_type"], "text/plain");
        assert_eq!(block["source"]["data"], "<p>laconic</p>");
    }

    #[tokio::test]
    async fn returns_first_text_block() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/messages")
                    .header("x-api-key", "test-key")
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .body_contains("\"max_tokens\":4096");
                then.status(200).json_body(json!({
                    "content": [{ "type": "text", "text": "ebullient,laconic,laconic" }],
                    "stop_reason": "end_turn"
                }));
            })
            .await;

        let text = generator(&server)
            .generate(GenerationRequest {
                system: "Extract.",
                user: "Extract the vocabulary terms:",
                document: DocumentInput {
                    format: DocumentFormat::Text,
                    name: "list.txt",
                    content: b"1. ebullient",
                },
                decoding: DecodingParams::greedy(4096),
            })
            .await
            .expect("generation");

        mock.assert();
        assert_eq!(text, "ebullient,laconic,laconic");
    }

    fn classify_request() -> GenerationRequest<'static> {
        GenerationRequest {
            system: "Classify.",
            user: "Classify:",
            document: DocumentInput {
                format: DocumentFormat::Text,
                name: "a.txt",
                content: b"text",
            },
            decoding: DecodingParams::greedy(10),
        }
    }

    #[tokio::test]
    async fn response_without_text_is_retryable_error() {
        use crate::pipeline::error::{ClassifiedError, ErrorClass};

        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/messages");
                then.status(200)
                    .json_body(json!({ "content": [], "stop_reason": "refusal" }));
            })
            .await;

        let error = generator(&server)
            .generate(classify_request())
            .await
            .expect_err("no text block");

        assert!(matches!(error, GenerationError::InvalidResponse(_)));
        assert!(error.to_string().contains("refusal"));
        assert_eq!(error.class(), ErrorClass::TransientInfrastructure);
    }

    #[tokio::test]
    async fn truncated_response_is_rejected() {
        use crate::pipeline::error::{ClassifiedError, ErrorClass};

        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/messages");
                then.status(200).json_body(json!({
                    "content": [{ "type": "text", "text": "ebullient,lac" }],
                    "stop_reason": "max_tokens"
                }));
            })
            .await;

        let error = generator(&server)
            .generate(classify_request())
            .await
            .expect_err("truncated");

        assert!(matches!(error, GenerationError::InvalidResponse(_)));
        assert_eq!(error.class(), ErrorClass::TransientInfrastructure);
    }

    #[tokio::test]
    async fn overloaded_provider_is_transient() {
        use crate::pipeline::error::{ClassifiedError, ErrorClass};

        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/messages");
                then.status(529).body("overloaded");
            })
            .await;

        let error = generator(&server)
            .generate(classify_request())
            .await
            .expect_err("overloaded");

        assert_eq!(error.class(), ErrorClass::TransientInfrastructure);
    }
}
