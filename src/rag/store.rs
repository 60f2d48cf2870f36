//! Abstract interface over the rule-document embedding index. The pipeline
//! depends only on this seam, so retrieval backends can be swapped (or
//! mocked) without touching orchestration.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;

/// A rule document held by the semantic index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDoc {
    pub doc_id: String,
    pub content: String,
    /// Where the document came from (file name, circular number, ...).
    pub source: String,
}

#[async_trait]
pub trait RuleIndex: Send + Sync {
    /// Top-k most similar rule snippets for a free-text query, best first.
    async fn top_k_similar(&self, query: &str, k: usize) -> Result<Vec<String>, ApiError>;

    /// Embed and store documents, replacing any with the same id.
    async fn index_documents(&self, docs: Vec<RuleDoc>) -> Result<(), ApiError>;

    /// Number of stored documents.
    async fn count(&self) -> Result<usize, ApiError>;
}
