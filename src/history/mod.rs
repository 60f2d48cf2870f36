//! Conversational storage: chat sessions and their messages.

use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::core::errors::ApiError;

pub const DEFAULT_CATEGORY: &str = "general";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub user_id: i64,
    pub category: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: i64,
    pub session_id: String,
    pub role: String,
    pub content: String,
    pub created_at: String,
}

#[derive(Clone)]
pub struct HistoryStore {
    pool: SqlitePool,
}

impl HistoryStore {
    pub async fn new(pool: SqlitePool) -> Result<Self, ApiError> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chat_sessions (
                session_id TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL,
                category TEXT NOT NULL DEFAULT 'general',
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chat_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY(session_id) REFERENCES chat_sessions(session_id)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chat_messages_session ON chat_messages(session_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(())
    }

    /// Atomic and idempotent: a second call for the same session id is a no-op.
    pub async fn ensure_session(&self, session_id: &str, user_id: i64) -> Result<(), ApiError> {
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT OR IGNORE INTO chat_sessions (session_id, user_id, category, created_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(session_id)
        .bind(user_id)
        .bind(DEFAULT_CATEGORY)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(())
    }

    pub async fn create_session(&self, user_id: i64) -> Result<String, ApiError> {
        let session_id = Uuid::new_v4().to_string();
        self.ensure_session(&session_id, user_id).await?;
        Ok(session_id)
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<SessionInfo>, ApiError> {
        let row = sqlx::query(
            "SELECT session_id, user_id, category, created_at
             FROM chat_sessions
             WHERE session_id = ?1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(row.map(|row| SessionInfo {
            session_id: row.get("session_id"),
            user_id: row.get("user_id"),
            category: row.get("category"),
            created_at: row.get("created_at"),
        }))
    }

    /// Appends one message. When a user id is supplied the session is created
    /// first if missing, so saving a message can never orphan itself.
    pub async fn append_message(
        &self,
        session_id: &str,
        role: &str,
        content: &str,
        user_id: Option<i64>,
    ) -> Result<i64, ApiError> {
        let now = chrono::Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;

        if let Some(user_id) = user_id {
            sqlx::query(
                "INSERT OR IGNORE INTO chat_sessions (session_id, user_id, category, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(session_id)
            .bind(user_id)
            .bind(DEFAULT_CATEGORY)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        }

        let result = sqlx::query(
            "INSERT INTO chat_messages (session_id, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(session_id)
        .bind(role)
        .bind(content)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::internal)?;

        tx.commit().await.map_err(ApiError::internal)?;

        Ok(result.last_insert_rowid())
    }

    /// The most recent `limit` messages in chronological order: newest-first
    /// window, re-ordered ascending. Rowid breaks timestamp ties.
    pub async fn recent_messages(
        &self,
        session_id: &str,
        limit: i64,
    ) -> Result<Vec<StoredMessage>, ApiError> {
        let rows = sqlx::query(
            "SELECT id, session_id, role, content, created_at FROM
                 (SELECT id, session_id, role, content, created_at
                  FROM chat_messages
                  WHERE session_id = ?1
                  ORDER BY created_at DESC, id DESC
                  LIMIT ?2)
             ORDER BY created_at ASC, id ASC",
        )
        .bind(session_id)
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(rows
            .iter()
            .map(|row| StoredMessage {
                id: row.get("id"),
                session_id: row.get("session_id"),
                role: row.get("role"),
                content: row.get("content"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    /// Returns false when no session row was touched, so callers can observe
    /// the missing-session case instead of a silent no-op.
    pub async fn set_session_category(
        &self,
        session_id: &str,
        category: &str,
    ) -> Result<bool, ApiError> {
        let result = sqlx::query("UPDATE chat_sessions SET category = ?1 WHERE session_id = ?2")
            .bind(category)
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn test_store() -> HistoryStore {
        let tmp =
            std::env::temp_dir().join(format!("vero-history-test-{}.db", Uuid::new_v4()));
        let pool = db::connect(&tmp).await.unwrap();
        HistoryStore::new(pool).await.unwrap()
    }

    #[tokio::test]
    async fn ensure_session_is_idempotent() {
        let store = test_store().await;

        store.ensure_session("s1", 7).await.unwrap();
        store.ensure_session("s1", 7).await.unwrap();

        let session = store.get_session("s1").await.unwrap().unwrap();
        assert_eq!(session.user_id, 7);
        assert_eq!(session.category, DEFAULT_CATEGORY);
    }

    #[tokio::test]
    async fn create_session_returns_resolvable_id() {
        let store = test_store().await;

        let session_id = store.create_session(3).await.unwrap();
        let session = store.get_session(&session_id).await.unwrap().unwrap();
        assert_eq!(session.session_id, session_id);
        assert_eq!(session.category, "general");
    }

    #[tokio::test]
    async fn append_message_creates_session_as_by_product() {
        let store = test_store().await;

        store
            .append_message("s2", "user", "hello", Some(11))
            .await
            .unwrap();

        let session = store.get_session("s2").await.unwrap().unwrap();
        assert_eq!(session.user_id, 11);

        let messages = store.recent_messages("s2", 5).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "hello");
    }

    #[tokio::test]
    async fn recent_messages_windows_and_orders_chronologically() {
        let store = test_store().await;
        store.ensure_session("s3", 1).await.unwrap();

        for i in 0..7 {
            store
                .append_message("s3", "user", &format!("m{}", i), None)
                .await
                .unwrap();
        }

        let messages = store.recent_messages("s3", 5).await.unwrap();
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4", "m5", "m6"]);
    }

    #[tokio::test]
    async fn set_category_reports_missing_session() {
        let store = test_store().await;
        store.ensure_session("s4", 1).await.unwrap();

        assert!(store.set_session_category("s4", "scoring").await.unwrap());
        assert!(!store.set_session_category("ghost", "scoring").await.unwrap());

        let session = store.get_session("s4").await.unwrap().unwrap();
        assert_eq!(session.category, "scoring");
    }
}
