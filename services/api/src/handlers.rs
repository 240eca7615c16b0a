//! Axum Handlers for the REST API
//!
//! This module contains the logic for handling HTTP requests for session management.
//! It uses `utoipa` doc comments to generate OpenAPI documentation.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use interview_core::language::{Language, Level, ParseLevelError};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    models::{CreateSessionPayload, ErrorResponse, FeedbackResponse, Session, SessionStatus},
    state::AppState,
};

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

fn user_id(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("x-user-id header is required".to_string()))
}

/// Create a new interview session.
#[utoipa::path(
    post,
    path = "/sessions",
    request_body = CreateSessionPayload,
    responses(
        (status = 201, description = "Session created successfully", body = Session),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("x-user-id" = String, Header, description = "The ID of the user creating the session")
    )
)]
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateSessionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = user_id(&headers)?;

    let job_role = payload.job_role.trim();
    if job_role.is_empty() {
        return Err(ApiError::BadRequest("job_role must not be empty".to_string()));
    }
    let level: Level = payload
        .job_level
        .parse()
        .map_err(|e: ParseLevelError| ApiError::BadRequest(e.to_string()))?;
    let language = payload
        .language
        .as_deref()
        .map(Language::from_code)
        .unwrap_or_default();

    let session = state
        .db
        .create_session(user_id, job_role, level.as_str(), language.code())
        .await?;
    info!(session_id = %session.id, %user_id, %level, "Interview session created");

    Ok((StatusCode::CREATED, Json(session)))
}

/// List all sessions for a user.
#[utoipa::path(
    get,
    path = "/sessions",
    responses(
        (status = 200, description = "List of sessions", body = [Session]),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("x-user-id" = String, Header, description = "The ID of the user")
    )
)]
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Session>>, ApiError> {
    let user_id = user_id(&headers)?;
    let sessions = state.db.list_sessions(user_id).await?;
    Ok(Json(sessions))
}

/// Get a specific session by its ID.
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    responses(
        (status = 200, description = "Session details", body = Session),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID"),
        ("x-user-id" = String, Header, description = "The ID of the user")
    )
)]
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = user_id(&headers)?;

    let session = state
        .db
        .get_session(id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Session with id '{}' not found", id)))?;

    Ok((StatusCode::OK, Json(session)))
}

/// Get the final feedback of a completed session.
#[utoipa::path(
    get,
    path = "/sessions/{id}/feedback",
    responses(
        (status = 200, description = "Interview feedback", body = FeedbackResponse),
        (status = 404, description = "Session not found or not yet completed", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID"),
        ("x-user-id" = String, Header, description = "The ID of the user")
    )
)]
pub async fn get_feedback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<FeedbackResponse>, ApiError> {
    let user_id = user_id(&headers)?;

    let session = state
        .db
        .get_session(id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Session with id '{}' not found", id)))?;
    if session.status != SessionStatus::Completed {
        return Err(ApiError::NotFound(format!(
            "Session '{}' has not been completed yet",
            id
        )));
    }

    let feedback = state
        .db
        .get_feedback(id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No feedback stored for session '{}'", id)))?;

    Ok(Json(FeedbackResponse::new(id, feedback)))
}
