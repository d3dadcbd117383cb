//! Persistence Gateway — the only resource shared across sessions.
//!
//! The workflow engine consumes the [`PersistenceGateway`] trait; `PgGateway`
//! is the production sqlx/PostgreSQL implementation. Per-record atomicity is
//! the gateway's contract: each call either fully succeeds or fully fails, and
//! the engine never assumes any transaction boundary wider than one call.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use thiserror::Error;

use crate::models::chat::ChatTranscript;
use crate::models::job::JobRow;
use crate::models::user::UserSummary;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("stored payload is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Number of stored users matching the identity (0 or 1).
    async fn user_exists(&self, identity: &str) -> Result<i64, GatewayError>;

    /// Creates the user record, or refreshes its documents on re-upload.
    /// Atomic from the caller's perspective: no partial record can exist.
    async fn create_user(
        &self,
        identity: &str,
        resume_text: &str,
        profile_text: &str,
    ) -> Result<(), GatewayError>;

    /// Returns `(resume_text, profile_text)` for an existing identity.
    async fn get_user_info(&self, identity: &str) -> Result<(String, String), GatewayError>;

    async fn list_users(&self) -> Result<Vec<UserSummary>, GatewayError>;

    /// Persists a new job description and returns its assigned id.
    async fn create_job(&self, identity: &str, job_text: &str) -> Result<i64, GatewayError>;

    async fn list_jobs(&self, identity: &str) -> Result<Vec<JobRow>, GatewayError>;

    /// Overwrites the job's generated result (last-write-wins).
    async fn save_generated_result(
        &self,
        identity: &str,
        job_id: i64,
        result: &Value,
    ) -> Result<(), GatewayError>;

    async fn get_chat_history(
        &self,
        identity: &str,
        job_id: i64,
    ) -> Result<Option<ChatTranscript>, GatewayError>;

    /// Replaces the stored transcript snapshot for `(identity, job_id)`.
    async fn save_chat_history(
        &self,
        identity: &str,
        job_id: i64,
        transcript: &ChatTranscript,
    ) -> Result<(), GatewayError>;
}

pub struct PgGateway {
    pool: PgPool,
}

impl PgGateway {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PersistenceGateway for PgGateway {
    async fn user_exists(&self, identity: &str) -> Result<i64, GatewayError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE identity = $1")
                .bind(identity)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn create_user(
        &self,
        identity: &str,
        resume_text: &str,
        profile_text: &str,
    ) -> Result<(), GatewayError> {
        sqlx::query(
            r#"
            INSERT INTO users (identity, resume_text, profile_text, last_modified)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (identity) DO UPDATE
                SET resume_text = EXCLUDED.resume_text,
                    profile_text = EXCLUDED.profile_text,
                    last_modified = now()
            "#,
        )
        .bind(identity)
        .bind(resume_text)
        .bind(profile_text)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_user_info(&self, identity: &str) -> Result<(String, String), GatewayError> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT resume_text, profile_text FROM users WHERE identity = $1")
                .bind(identity)
                .fetch_optional(&self.pool)
                .await?;
        row.ok_or_else(|| GatewayError::NotFound(format!("user '{identity}'")))
    }

    async fn list_users(&self) -> Result<Vec<UserSummary>, GatewayError> {
        let users = sqlx::query_as(
            "SELECT identity, last_modified FROM users ORDER BY last_modified DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn create_job(&self, identity: &str, job_text: &str) -> Result<i64, GatewayError> {
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO jobs (identity, job_text) VALUES ($1, $2) RETURNING id",
        )
        .bind(identity)
        .bind(job_text)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn list_jobs(&self, identity: &str) -> Result<Vec<JobRow>, GatewayError> {
        let jobs = sqlx::query_as(
            r#"
            SELECT id, identity, job_text, generated_result, created_at, updated_at
            FROM jobs
            WHERE identity = $1
            ORDER BY updated_at DESC
            "#,
        )
        .bind(identity)
        .fetch_all(&self.pool)
        .await?;
        Ok(jobs)
    }

    async fn save_generated_result(
        &self,
        identity: &str,
        job_id: i64,
        result: &Value,
    ) -> Result<(), GatewayError> {
        let updated = sqlx::query(
            r#"
            UPDATE jobs
            SET generated_result = $1, updated_at = now()
            WHERE id = $2 AND identity = $3
            "#,
        )
        .bind(result)
        .bind(job_id)
        .bind(identity)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(GatewayError::NotFound(format!(
                "job {job_id} for user '{identity}'"
            )));
        }
        Ok(())
    }

    async fn get_chat_history(
        &self,
        identity: &str,
        job_id: i64,
    ) -> Result<Option<ChatTranscript>, GatewayError> {
        let row: Option<(Value,)> = sqlx::query_as(
            "SELECT transcript FROM chat_histories WHERE identity = $1 AND job_id = $2",
        )
        .bind(identity)
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((value,)) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn save_chat_history(
        &self,
        identity: &str,
        job_id: i64,
        transcript: &ChatTranscript,
    ) -> Result<(), GatewayError> {
        let payload = serde_json::to_value(transcript)?;
        sqlx::query(
            r#"
            INSERT INTO chat_histories (identity, job_id, transcript, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (identity, job_id) DO UPDATE
                SET transcript = EXCLUDED.transcript,
                    updated_at = now()
            "#,
        )
        .bind(identity)
        .bind(job_id)
        .bind(payload)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
