//! API and Database Models
//!
//! This module defines the core data structures used for both database mapping
//! with `sqlx` and for generating OpenAPI documentation with `utoipa`.

use chrono::{DateTime, Utc};
use interview_core::feedback::Feedback;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(sqlx::Type, Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq)]
#[sqlx(type_name = "session_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::InProgress => write!(f, "in_progress"),
            SessionStatus::Completed => write!(f, "completed"),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, FromRow, Debug, Clone)]
pub struct Session {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    pub user_id: String,
    #[schema(example = "Backend Engineer")]
    pub job_role: String,
    #[schema(example = "senior")]
    pub job_level: String,
    #[schema(example = "en")]
    pub language: String,
    #[schema(value_type = String, example = "in_progress")]
    pub status: SessionStatus,
    /// The transcript as `[{role, content, timestamp}]`.
    #[schema(value_type = Object)]
    pub transcript_json: serde_json::Value,
    pub overall_score: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateSessionPayload {
    #[schema(example = "Backend Engineer")]
    pub job_role: String,
    /// One of `junior`, `mid`, `senior`, `lead`, `architect`.
    #[schema(example = "mid")]
    pub job_level: String,
    /// `tr`, `en`, `es`, `fr` or `de`. Anything else falls back to `en`.
    #[schema(example = "en")]
    pub language: Option<String>,
}

/// The final assessment of a completed interview.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct FeedbackResponse {
    #[schema(value_type = String, format = Uuid)]
    pub session_id: Uuid,
    pub overall_score: u8,
    pub technical_score: u8,
    pub communication_score: u8,
    pub problem_solving_score: u8,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub opportunities: Vec<String>,
    pub threats: Vec<String>,
    pub recommendations: Vec<String>,
    pub overall_assessment: String,
    pub swot_analysis: String,
}

impl FeedbackResponse {
    pub fn new(session_id: Uuid, feedback: Feedback) -> Self {
        Self {
            session_id,
            overall_score: feedback.overall_score,
            technical_score: feedback.technical_score,
            communication_score: feedback.communication_score,
            problem_solving_score: feedback.problem_solving_score,
            strengths: feedback.strengths,
            weaknesses: feedback.weaknesses,
            opportunities: feedback.opportunities,
            threats: feedback.threats,
            recommendations: feedback.recommendations,
            overall_assessment: feedback.overall_assessment,
            swot_analysis: feedback.swot_analysis,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json;

    fn sample_session(status: SessionStatus) -> Session {
        let created = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        Session {
            id: Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap(),
            user_id: "user_123".to_string(),
            job_role: "Backend Engineer".to_string(),
            job_level: "senior".to_string(),
            language: "tr".to_string(),
            status,
            transcript_json: serde_json::json!([]),
            overall_score: None,
            created_at: created,
            updated_at: created,
            completed_at: None,
        }
    }

    #[test]
    fn test_session_status_serialization() {
        assert_eq!(
            serde_json::to_string(&SessionStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(
            serde_json::to_string(&SessionStatus::Completed).unwrap(),
            "\"completed\""
        );
        let parsed: SessionStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(parsed, SessionStatus::Completed);
        assert!(serde_json::from_str::<SessionStatus>("\"Active\"").is_err());
    }

    #[test]
    fn test_session_status_display_matches_serde() {
        for status in [SessionStatus::InProgress, SessionStatus::Completed] {
            assert_eq!(
                serde_json::to_string(&status).unwrap(),
                format!("\"{}\"", status)
            );
        }
    }

    #[test]
    fn test_session_serialization() {
        let session = sample_session(SessionStatus::InProgress);
        let json = serde_json::to_value(&session).unwrap();

        assert_eq!(json["job_role"], "Backend Engineer");
        assert_eq!(json["status"], "in_progress");
        assert_eq!(json["language"], "tr");
        assert!(json["overall_score"].is_null());
        assert!(json["completed_at"].is_null());
        assert_eq!(json["created_at"], "2024-01-15T10:30:00Z");
    }

    #[test]
    fn test_create_session_payload_deserialization() {
        let json = r#"{"job_role": "Data Engineer", "job_level": "lead"}"#;
        let payload: CreateSessionPayload = serde_json::from_str(json).unwrap();

        assert_eq!(payload.job_role, "Data Engineer");
        assert_eq!(payload.job_level, "lead");
        assert_eq!(payload.language, None);
    }

    #[test]
    fn test_create_session_payload_missing_field() {
        let result: Result<CreateSessionPayload, _> =
            serde_json::from_str(r#"{"job_role": "Data Engineer"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_feedback_response_carries_every_axis() {
        let id = Uuid::new_v4();
        let response = FeedbackResponse::new(id, Feedback::neutral());

        assert_eq!(response.session_id, id);
        assert_eq!(response.overall_score, 75);
        assert_eq!(response.communication_score, 80);
        assert_eq!(response.problem_solving_score, 70);
        assert_eq!(response.strengths.len(), 2);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["technical_score"], 75);
        assert!(json["swot_analysis"].is_string());
    }

    #[test]
    fn test_error_response_serialization() {
        let error = ErrorResponse {
            message: "Session not found".to_string(),
        };

        let json = serde_json::to_string(&error).unwrap();
        assert_eq!(json, r#"{"message":"Session not found"}"#);
    }
}
