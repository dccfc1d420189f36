//! Model provider clients: text embeddings and chat completions.
//!
//! Components take the [`EmbeddingClient`] and [`ChatClient`] traits as
//! explicit dependencies so tests can substitute scripted fakes. The provider
//! behind them is a configuration choice; [`OpenAiClient`] implements both.

mod openai;

use async_trait::async_trait;

use lexibase_shared::Result;

pub use openai::OpenAiClient;

/// Converts texts into fixed-dimension vectors, one per input, same order.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embed a batch of texts. Batching amortizes call overhead; callers keep
    /// batches small to stay within provider payload limits.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// A single chat-completion exchange.
#[derive(Debug, Clone)]
pub struct ChatRequest<'a> {
    /// Model id to invoke.
    pub model: &'a str,
    /// System prompt.
    pub system: &'a str,
    /// User message.
    pub user: &'a str,
    /// Sampling temperature.
    pub temperature: f32,
    /// Ask the provider to force a JSON object response.
    pub json_response: bool,
}

/// Invokes a chat model and returns the assistant message text.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, request: &ChatRequest<'_>) -> Result<String>;
}
