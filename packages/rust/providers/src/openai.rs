//! OpenAI REST client implementing both provider traits.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use lexibase_shared::{LexibaseError, Result};

use crate::{ChatClient, ChatRequest, EmbeddingClient};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-backed embedding and chat client.
pub struct OpenAiClient {
    api_key: String,
    embed_model: String,
    base_url: String,
    client: Client,
}

impl OpenAiClient {
    /// Create a client for the public OpenAI API.
    pub fn new(api_key: impl Into<String>, embed_model: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| LexibaseError::Model(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key: api_key.into(),
            embed_model: embed_model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client,
        })
    }

    /// Point the client at a different API root (mock servers in tests,
    /// OpenAI-compatible gateways in production).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.api_key.trim())
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiClient {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(count = texts.len(), model = %self.embed_model, "embedding batch");

        let body = EmbeddingsRequest {
            model: &self.embed_model,
            input: texts,
        };

        let resp = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await
            .map_err(|e| LexibaseError::Embedding(format!("embeddings request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(LexibaseError::Embedding(format!(
                "embeddings returned {status}: {text}"
            )));
        }

        let parsed: EmbeddingsResponse = resp
            .json()
            .await
            .map_err(|e| LexibaseError::Embedding(format!("invalid embeddings response: {e}")))?;

        if parsed.data.len() != texts.len() {
            return Err(LexibaseError::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }

        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl ChatClient for OpenAiClient {
    async fn complete(&self, request: &ChatRequest<'_>) -> Result<String> {
        debug!(model = %request.model, json = request.json_response, "chat completion");

        let response_format = request
            .json_response
            .then(|| ResponseFormat { kind: "json_object" });

        let body = ChatCompletionRequest {
            model: request.model,
            temperature: request.temperature,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: request.system,
                },
                ChatMessage {
                    role: "user",
                    content: request.user,
                },
            ],
            response_format,
        };

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await
            .map_err(|e| LexibaseError::Model(format!("chat request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(LexibaseError::Model(format!(
                "chat completions returned {status}: {text}"
            )));
        }

        let parsed: ChatCompletionResponse = resp
            .json()
            .await
            .map_err(|e| LexibaseError::Model(format!("invalid chat response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| LexibaseError::Model("chat response contained no choices".into()))
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> OpenAiClient {
        OpenAiClient::new("sk-test", "text-embedding-3-small")
            .unwrap()
            .with_base_url(server.uri())
    }

    #[tokio::test]
    async fn embed_batch_preserves_input_order() {
        let server = MockServer::start().await;

        // Rows intentionally out of order; the client must sort by index.
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("Authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "text-embedding-3-small",
                "input": ["alpha", "beta"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    { "index": 1, "embedding": [0.0, 1.0] },
                    { "index": 0, "embedding": [1.0, 0.0] }
                ]
            })))
            .mount(&server)
            .await;

        let vectors = client(&server)
            .embed_batch(&["alpha".into(), "beta".into()])
            .await
            .unwrap();

        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn embed_batch_empty_input_skips_the_network() {
        let server = MockServer::start().await;
        let vectors = client(&server).embed_batch(&[]).await.unwrap();
        assert!(vectors.is_empty());
    }

    #[tokio::test]
    async fn embed_batch_surfaces_provider_errors() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let err = client(&server)
            .embed_batch(&["text".into()])
            .await
            .unwrap_err();

        assert!(matches!(err, LexibaseError::Embedding(_)));
        assert!(err.to_string().contains("429"));
    }

    #[tokio::test]
    async fn embed_batch_rejects_count_mismatch() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "index": 0, "embedding": [0.5] }]
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .embed_batch(&["one".into(), "two".into()])
            .await
            .unwrap_err();

        assert!(err.to_string().contains("expected 2 embeddings"));
    }

    #[tokio::test]
    async fn complete_sends_messages_and_reads_content() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({
                "model": "gpt-4.1-mini",
                "messages": [
                    { "role": "system", "content": "be brief" },
                    { "role": "user", "content": "hello" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [
                    { "message": { "role": "assistant", "content": "hi there" } }
                ]
            })))
            .mount(&server)
            .await;

        let answer = client(&server)
            .complete(&ChatRequest {
                model: "gpt-4.1-mini",
                system: "be brief",
                user: "hello",
                temperature: 0.2,
                json_response: false,
            })
            .await
            .unwrap();

        assert_eq!(answer, "hi there");
    }

    #[tokio::test]
    async fn complete_requests_json_mode_when_asked() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({
                "response_format": { "type": "json_object" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [
                    { "message": { "role": "assistant", "content": "{\"intent\":\"updates\"}" } }
                ]
            })))
            .mount(&server)
            .await;

        let answer = client(&server)
            .complete(&ChatRequest {
                model: "gpt-4o-mini",
                system: "classify",
                user: "what changed?",
                temperature: 0.0,
                json_response: true,
            })
            .await
            .unwrap();

        assert!(answer.contains("updates"));
    }

    #[tokio::test]
    async fn complete_surfaces_provider_errors() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = client(&server)
            .complete(&ChatRequest {
                model: "gpt-4o-mini",
                system: "s",
                user: "u",
                temperature: 0.0,
                json_response: false,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, LexibaseError::Model(_)));
    }
}
