//! Read-mostly accessors for the appraisal catalog: the per-user stats view,
//! the PBAS rule table, promotion thresholds, and submission audit logs.
//!
//! `user_profile_stats` is maintained by the appraisal system itself; this
//! service only reads it. The schema here exists so a fresh database (and the
//! tests) have the right shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{Row, SqlitePool};

use crate::core::errors::ApiError;

/// Per-user totals from the externally maintained stats view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: i64,
    pub total_score: i64,
    pub rank: Option<String>,
    pub academic_level: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub rule_id: i64,
    pub activity_name: String,
    pub points: i64,
    pub max_points: i64,
}

#[derive(Clone)]
pub struct AppraisalStore {
    pool: SqlitePool,
}

impl AppraisalStore {
    pub async fn new(pool: SqlitePool) -> Result<Self, ApiError> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS user_profile_stats (
                user_id INTEGER PRIMARY KEY,
                total_score INTEGER NOT NULL DEFAULT 0,
                rank TEXT,
                academic_level INTEGER
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS pbas_rules (
                rule_id INTEGER PRIMARY KEY,
                activity_name TEXT NOT NULL,
                points INTEGER NOT NULL,
                max_points INTEGER NOT NULL,
                min_academic_level INTEGER
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS promotion_rules (
                rank TEXT PRIMARY KEY,
                required_score INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS audit_logs (
                submission_id TEXT PRIMARY KEY,
                audit_metadata TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(())
    }

    pub async fn user_profile(&self, user_id: i64) -> Result<Option<UserProfile>, ApiError> {
        let row = sqlx::query(
            "SELECT user_id, total_score, rank, academic_level
             FROM user_profile_stats
             WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(row.map(|row| UserProfile {
            user_id: row.get("user_id"),
            total_score: row.get("total_score"),
            rank: row.get("rank"),
            academic_level: row.get("academic_level"),
        }))
    }

    /// Case-insensitive substring match on the activity name. A rule applies
    /// when its level floor is unset or at most the user's level.
    pub async fn search_rules(
        &self,
        keyword: &str,
        academic_level: i64,
    ) -> Result<Vec<Rule>, ApiError> {
        let rows = sqlx::query(
            "SELECT rule_id, activity_name, points, max_points
             FROM pbas_rules
             WHERE LOWER(activity_name) LIKE '%' || LOWER(?1) || '%'
               AND (min_academic_level IS NULL OR min_academic_level <= ?2)",
        )
        .bind(keyword)
        .bind(academic_level)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(rows
            .iter()
            .map(|row| Rule {
                rule_id: row.get("rule_id"),
                activity_name: row.get("activity_name"),
                points: row.get("points"),
                max_points: row.get("max_points"),
            })
            .collect())
    }

    pub async fn promotion_threshold(&self, rank: &str) -> Result<Option<i64>, ApiError> {
        sqlx::query_scalar("SELECT required_score FROM promotion_rules WHERE rank = ?1")
            .bind(rank)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::internal)
    }

    /// JSON-decoded audit metadata for a submission. A malformed payload is a
    /// decode error, never silently passed through; a missing row is `None`.
    pub async fn audit_metadata(&self, submission_id: &str) -> Result<Option<Value>, ApiError> {
        let raw: Option<String> =
            sqlx::query_scalar("SELECT audit_metadata FROM audit_logs WHERE submission_id = ?1")
                .bind(submission_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(ApiError::internal)?;

        match raw {
            Some(text) => {
                let value = serde_json::from_str(&text).map_err(|e| {
                    ApiError::Decode(format!("audit metadata for {}: {}", submission_id, e))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn test_store() -> AppraisalStore {
        let tmp = std::env::temp_dir().join(format!(
            "vero-appraisal-test-{}.db",
            uuid::Uuid::new_v4()
        ));
        let pool = db::connect(&tmp).await.unwrap();
        AppraisalStore::new(pool).await.unwrap()
    }

    async fn seed_rule(
        store: &AppraisalStore,
        rule_id: i64,
        name: &str,
        points: i64,
        min_level: Option<i64>,
    ) {
        sqlx::query(
            "INSERT INTO pbas_rules (rule_id, activity_name, points, max_points, min_academic_level)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(rule_id)
        .bind(name)
        .bind(points)
        .bind(points * 3)
        .bind(min_level)
        .execute(&store.pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn profile_lookup_and_not_found() {
        let store = test_store().await;

        sqlx::query(
            "INSERT INTO user_profile_stats (user_id, total_score, rank, academic_level)
             VALUES (7, 40, 'Lecturer', 2)",
        )
        .execute(&store.pool)
        .await
        .unwrap();

        let profile = store.user_profile(7).await.unwrap().unwrap();
        assert_eq!(profile.total_score, 40);
        assert_eq!(profile.rank.as_deref(), Some("Lecturer"));
        assert_eq!(profile.academic_level, Some(2));

        assert!(store.user_profile(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rule_search_is_case_insensitive_and_level_filtered() {
        let store = test_store().await;
        seed_rule(&store, 1, "International Conference Presentation", 10, None).await;
        seed_rule(&store, 2, "National conference attendance", 5, Some(3)).await;
        seed_rule(&store, 3, "Journal publication", 15, Some(1)).await;

        let rules = store.search_rules("CONFERENCE", 2).await.unwrap();
        let ids: Vec<i64> = rules.iter().map(|r| r.rule_id).collect();
        // Rule 2 has a level floor of 3, above the user's level 2.
        assert_eq!(ids, vec![1]);

        let rules = store.search_rules("conference", 3).await.unwrap();
        assert_eq!(rules.len(), 2);
    }

    #[tokio::test]
    async fn promotion_threshold_lookup() {
        let store = test_store().await;

        sqlx::query("INSERT INTO promotion_rules (rank, required_score) VALUES ('Lecturer', 60)")
            .execute(&store.pool)
            .await
            .unwrap();

        assert_eq!(store.promotion_threshold("Lecturer").await.unwrap(), Some(60));
        assert_eq!(store.promotion_threshold("Dean").await.unwrap(), None);
    }

    #[tokio::test]
    async fn audit_metadata_decodes_or_fails_loudly() {
        let store = test_store().await;

        sqlx::query(
            "INSERT INTO audit_logs (submission_id, audit_metadata)
             VALUES ('101', '{\"reason\": \"missing certificate\"}'),
                    ('102', 'not valid json')",
        )
        .execute(&store.pool)
        .await
        .unwrap();

        let metadata = store.audit_metadata("101").await.unwrap().unwrap();
        assert_eq!(metadata["reason"], "missing certificate");

        assert!(store.audit_metadata("404").await.unwrap().is_none());
        assert!(matches!(
            store.audit_metadata("102").await,
            Err(ApiError::Decode(_))
        ));
    }
}
