//! SQLite-backed rule index.
//!
//! Stores rule-document embeddings as little-endian f32 blobs and ranks
//! matches by brute-force cosine similarity. Query vectors come from the
//! LLM provider's embedding endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use super::store::{RuleDoc, RuleIndex};
use crate::core::errors::ApiError;
use crate::llm::provider::LlmProvider;

pub struct SqliteRuleIndex {
    pool: SqlitePool,
    provider: Arc<dyn LlmProvider>,
    embedding_model: String,
}

impl SqliteRuleIndex {
    pub async fn new(
        pool: SqlitePool,
        provider: Arc<dyn LlmProvider>,
        embedding_model: impl Into<String>,
    ) -> Result<Self, ApiError> {
        let index = Self {
            pool,
            provider,
            embedding_model: embedding_model.into(),
        };
        index.init_schema().await?;
        Ok(index)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS rule_docs (
                doc_id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                source TEXT NOT NULL DEFAULT '',
                embedding BLOB NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        let denom = norm_a * norm_b;

        if denom <= f32::EPSILON {
            0.0
        } else {
            dot / denom
        }
    }
}

#[async_trait]
impl RuleIndex for SqliteRuleIndex {
    async fn top_k_similar(&self, query: &str, k: usize) -> Result<Vec<String>, ApiError> {
        let embeddings = self
            .provider
            .embed(&[query.to_string()], &self.embedding_model)
            .await?;
        let Some(query_embedding) = embeddings.into_iter().next() else {
            return Ok(Vec::new());
        };

        let rows = sqlx::query("SELECT content, embedding FROM rule_docs")
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        let mut scored: Vec<(String, f32)> = rows
            .iter()
            .filter_map(|row| {
                let bytes: Vec<u8> = row.get("embedding");
                if bytes.is_empty() {
                    return None;
                }
                let stored = Self::deserialize_embedding(&bytes);
                let score = Self::cosine_similarity(&query_embedding, &stored);
                Some((row.get::<String, _>("content"), score))
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored.into_iter().map(|(content, _)| content).collect())
    }

    async fn index_documents(&self, docs: Vec<RuleDoc>) -> Result<(), ApiError> {
        if docs.is_empty() {
            return Ok(());
        }

        let contents: Vec<String> = docs.iter().map(|d| d.content.clone()).collect();
        let embeddings = self.provider.embed(&contents, &self.embedding_model).await?;
        if embeddings.len() != docs.len() {
            return Err(ApiError::Upstream(format!(
                "expected {} embeddings, got {}",
                docs.len(),
                embeddings.len()
            )));
        }

        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;

        for (doc, embedding) in docs.iter().zip(embeddings.iter()) {
            let blob = Self::serialize_embedding(embedding);
            sqlx::query(
                "INSERT OR REPLACE INTO rule_docs (doc_id, content, source, embedding)
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(&doc.doc_id)
            .bind(&doc.content)
            .bind(&doc.source)
            .bind(&blob)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        }

        tx.commit().await.map_err(ApiError::internal)?;
        Ok(())
    }

    async fn count(&self) -> Result<usize, ApiError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rule_docs")
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::llm::types::{ChatMessage, LlmReply};

    /// Embeds by keyword presence so similarity is deterministic:
    /// axis 0 = "conference", axis 1 = "journal", axis 2 = anything else.
    struct KeywordEmbedder;

    #[async_trait]
    impl LlmProvider for KeywordEmbedder {
        fn name(&self) -> &str {
            "keyword-embedder"
        }

        async fn health_check(&self) -> Result<bool, ApiError> {
            Ok(true)
        }

        async fn chat(
            &self,
            _messages: Vec<ChatMessage>,
            _model_id: &str,
        ) -> Result<LlmReply, ApiError> {
            Err(ApiError::Upstream("chat not available in tests".to_string()))
        }

        async fn embed(
            &self,
            inputs: &[String],
            _model_id: &str,
        ) -> Result<Vec<Vec<f32>>, ApiError> {
            Ok(inputs
                .iter()
                .map(|text| {
                    let lowered = text.to_lowercase();
                    let conference = lowered.contains("conference") as u8 as f32;
                    let journal = lowered.contains("journal") as u8 as f32;
                    let other = (conference == 0.0 && journal == 0.0) as u8 as f32;
                    vec![conference, journal, other]
                })
                .collect())
        }
    }

    async fn test_index() -> SqliteRuleIndex {
        let tmp = std::env::temp_dir().join(format!("vero-rag-test-{}.db", uuid::Uuid::new_v4()));
        let pool = db::connect(&tmp).await.unwrap();
        SqliteRuleIndex::new(pool, Arc::new(KeywordEmbedder), "test-embed")
            .await
            .unwrap()
    }

    fn doc(id: &str, content: &str) -> RuleDoc {
        RuleDoc {
            doc_id: id.to_string(),
            content: content.to_string(),
            source: "pbas-handbook".to_string(),
        }
    }

    #[tokio::test]
    async fn ranks_by_cosine_and_truncates_to_k() {
        let index = test_index().await;
        index
            .index_documents(vec![
                doc("d1", "Conference presentations earn 10 points"),
                doc("d2", "Journal publications earn 15 points"),
                doc("d3", "Seminar attendance earns 2 points"),
            ])
            .await
            .unwrap();
        assert_eq!(index.count().await.unwrap(), 3);

        let hits = index
            .top_k_similar("points for a conference talk", 2)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].contains("Conference"));
    }

    #[tokio::test]
    async fn reindexing_replaces_documents_by_id() {
        let index = test_index().await;
        index
            .index_documents(vec![doc("d1", "Conference rule, first draft")])
            .await
            .unwrap();
        index
            .index_documents(vec![doc("d1", "Conference rule, revised")])
            .await
            .unwrap();

        assert_eq!(index.count().await.unwrap(), 1);
        let hits = index.top_k_similar("conference", 3).await.unwrap();
        assert_eq!(hits, vec!["Conference rule, revised".to_string()]);
    }
}
