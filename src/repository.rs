// src/repository.rs

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::models::{AssessmentAttempt, AttemptSummary};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored attempt is not valid JSON: {0}")]
    Document(#[from] serde_json::Error),

    #[error("attempt {0} already exists")]
    Duplicate(String),
}

/// Persistence layer for scored attempts. Attempts are written once and never updated.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    async fn insert(&self, attempt: &AssessmentAttempt) -> Result<(), RepositoryError>;

    async fn get(
        &self,
        user_id: &str,
        attempt_id: &str,
    ) -> Result<Option<AssessmentAttempt>, RepositoryError>;

    /// Newest first.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<AttemptSummary>, RepositoryError>;

    /// Every attempt in a retake chain, oldest first.
    async fn list_for_root(
        &self,
        user_id: &str,
        root_assessment_id: &str,
    ) -> Result<Vec<AssessmentAttempt>, RepositoryError>;
}

/// Stores each attempt as a JSON document next to a few indexed columns.
#[derive(Clone)]
pub struct SqliteAttemptRepository {
    pool: SqlitePool,
}

impl SqliteAttemptRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttemptRepository for SqliteAttemptRepository {
    async fn insert(&self, attempt: &AssessmentAttempt) -> Result<(), RepositoryError> {
        let document = serde_json::to_string(attempt)?;

        sqlx::query(
            r#"
            INSERT INTO assessment_attempts
                (id, user_id, assessment_id, root_assessment_id, role_id,
                 started_at, submitted_at, final_score, document)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&attempt.id)
        .bind(&attempt.user_id)
        .bind(&attempt.assessment_id)
        .bind(&attempt.root_assessment_id)
        .bind(&attempt.role_id)
        .bind(attempt.started_at)
        .bind(attempt.submitted_at)
        .bind(attempt.final_score)
        .bind(document)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint") {
                RepositoryError::Duplicate(attempt.id.clone())
            } else {
                tracing::error!("Failed to insert attempt: {:?}", e);
                RepositoryError::Database(e)
            }
        })?;

        Ok(())
    }

    async fn get(
        &self,
        user_id: &str,
        attempt_id: &str,
    ) -> Result<Option<AssessmentAttempt>, RepositoryError> {
        let document: Option<String> = sqlx::query_scalar(
            "SELECT document FROM assessment_attempts WHERE user_id = ? AND id = ?",
        )
        .bind(user_id)
        .bind(attempt_id)
        .fetch_optional(&self.pool)
        .await?;

        document
            .map(|d| serde_json::from_str(&d))
            .transpose()
            .map_err(Into::into)
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<AttemptSummary>, RepositoryError> {
        let rows = sqlx::query_as::<_, AttemptSummary>(
            r#"
            SELECT id, assessment_id, root_assessment_id, role_id, submitted_at, final_score
            FROM assessment_attempts
            WHERE user_id = ?
            ORDER BY submitted_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn list_for_root(
        &self,
        user_id: &str,
        root_assessment_id: &str,
    ) -> Result<Vec<AssessmentAttempt>, RepositoryError> {
        let documents: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT document FROM assessment_attempts
            WHERE user_id = ? AND root_assessment_id = ?
            ORDER BY submitted_at ASC
            "#,
        )
        .bind(user_id)
        .bind(root_assessment_id)
        .fetch_all(&self.pool)
        .await?;

        documents
            .iter()
            .map(|d| serde_json::from_str(d).map_err(Into::into))
            .collect()
    }
}
