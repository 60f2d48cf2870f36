use async_trait::async_trait;

use super::types::{ChatMessage, LlmReply};
use crate::core::errors::ApiError;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g. "ollama").
    fn name(&self) -> &str;

    /// Whether the provider endpoint is reachable.
    async fn health_check(&self) -> Result<bool, ApiError>;

    /// Chat completion (non-streaming).
    async fn chat(&self, messages: Vec<ChatMessage>, model_id: &str)
        -> Result<LlmReply, ApiError>;

    /// Generate embeddings, one vector per input.
    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, ApiError>;
}
