//! Data Access Layer
//!
//! This module contains all the functions for interacting with the PostgreSQL database.
//! It uses `sqlx` runtime-checked queries and connection pooling, and implements the
//! orchestrator's `SessionStore` so transcripts and feedback land in `interview_sessions`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use interview_core::{
    feedback::Feedback, persistence::SessionStore, transcript::TranscriptMessage,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Session, SessionStatus};

const SESSION_COLUMNS: &str = "id, user_id, job_role, job_level, language, status, \
     transcript_json, overall_score, created_at, updated_at, completed_at";

/// A wrapper around the `PgPool` to provide a clear data access interface.
#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    /// Creates a new `Db` instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs all pending `sqlx` migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Creates a new in-progress interview session.
    pub async fn create_session(
        &self,
        user_id: &str,
        job_role: &str,
        job_level: &str,
        language: &str,
    ) -> Result<Session> {
        let query = format!(
            "INSERT INTO interview_sessions (user_id, job_role, job_level, language) \
             VALUES ($1, $2, $3, $4) RETURNING {SESSION_COLUMNS}"
        );
        let session = sqlx::query_as::<_, Session>(&query)
            .bind(user_id)
            .bind(job_role)
            .bind(job_level)
            .bind(language)
            .fetch_one(&self.pool)
            .await?;
        Ok(session)
    }

    /// Retrieves a single session by its ID, scoped to a specific user.
    pub async fn get_session(&self, session_id: Uuid, user_id: &str) -> Result<Option<Session>> {
        let query = format!(
            "SELECT {SESSION_COLUMNS} FROM interview_sessions WHERE id = $1 AND user_id = $2"
        );
        let session = sqlx::query_as::<_, Session>(&query)
            .bind(session_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    /// Retrieves a single session by its ID regardless of owner.
    pub async fn find_session(&self, session_id: Uuid) -> Result<Option<Session>> {
        let query = format!("SELECT {SESSION_COLUMNS} FROM interview_sessions WHERE id = $1");
        let session = sqlx::query_as::<_, Session>(&query)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    /// Lists all sessions for a given user, ordered by most recent.
    pub async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>> {
        let query = format!(
            "SELECT {SESSION_COLUMNS} FROM interview_sessions \
             WHERE user_id = $1 ORDER BY created_at DESC"
        );
        let sessions = sqlx::query_as::<_, Session>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(sessions)
    }

    /// Retrieves the stored feedback of a completed session, scoped to a user.
    pub async fn get_feedback(&self, session_id: Uuid, user_id: &str) -> Result<Option<Feedback>> {
        let feedback_json = sqlx::query_scalar::<_, Option<serde_json::Value>>(
            "SELECT feedback_json FROM interview_sessions WHERE id = $1 AND user_id = $2",
        )
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match feedback_json.flatten() {
            Some(value) => {
                let feedback: Feedback =
                    serde_json::from_value(value).context("Stored feedback is malformed")?;
                Ok(Some(feedback))
            }
            None => Ok(None),
        }
    }

    /// Replaces the stored transcript of a session.
    pub async fn update_transcript(
        &self,
        session_id: Uuid,
        transcript: &[TranscriptMessage],
    ) -> Result<()> {
        let transcript_json = serde_json::to_value(transcript)?;
        sqlx::query(
            "UPDATE interview_sessions SET transcript_json = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(transcript_json)
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Stores the final transcript and feedback and marks the session completed.
    pub async fn complete_session(
        &self,
        session_id: Uuid,
        transcript: &[TranscriptMessage],
        feedback: &Feedback,
    ) -> Result<()> {
        let transcript_json = serde_json::to_value(transcript)?;
        let feedback_json = serde_json::to_value(feedback)?;
        sqlx::query(
            "UPDATE interview_sessions \
             SET transcript_json = $1, feedback_json = $2, overall_score = $3, \
                 status = $4, completed_at = NOW(), updated_at = NOW() \
             WHERE id = $5",
        )
        .bind(transcript_json)
        .bind(feedback_json)
        .bind(i32::from(feedback.overall_score))
        .bind(SessionStatus::Completed)
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for Db {
    async fn save_transcript(
        &self,
        session_id: Uuid,
        transcript: &[TranscriptMessage],
    ) -> Result<()> {
        self.update_transcript(session_id, transcript).await
    }

    async fn save_feedback(
        &self,
        session_id: Uuid,
        transcript: &[TranscriptMessage],
        feedback: &Feedback,
    ) -> Result<()> {
        self.complete_session(session_id, transcript, feedback)
            .await
    }
}
