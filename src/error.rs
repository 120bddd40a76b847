use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::models::SentimentTier;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("User {user_id} already has an open comparison session")]
    SessionConflict { user_id: String },

    #[error("User {0} has no open comparison session")]
    NoActiveSession(String),

    #[error("Invalid comparison answer: {0}")]
    InvalidComparisonAnswer(String),

    #[error("User {user_id} has not ranked title {title_id}")]
    EntryNotFound { user_id: String, title_id: String },

    #[error("Aggregate write conflict: {0}")]
    AggregateWriteConflict(String),

    #[error("Rank indices for user {user_id} in tier {tier} are not dense: {detail}")]
    TierInvariantViolation {
        user_id: String,
        tier: SentimentTier,
        detail: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable error kind for API clients
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database",
            AppError::Cache(_) => "cache",
            AppError::HttpClient(_) => "http_client",
            AppError::Serialization(_) => "serialization",
            AppError::SessionConflict { .. } => "session_conflict",
            AppError::NoActiveSession(_) => "no_active_session",
            AppError::InvalidComparisonAnswer(_) => "invalid_comparison_answer",
            AppError::EntryNotFound { .. } => "entry_not_found",
            AppError::AggregateWriteConflict(_) => "aggregate_write_conflict",
            AppError::TierInvariantViolation { .. } => "tier_invariant_violation",
            AppError::NotFound(_) => "not_found",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::Internal(_) => "internal",
        }
    }

    /// Whether retrying the same storage operation may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::AggregateWriteConflict(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::SessionConflict { .. } => StatusCode::CONFLICT,
            AppError::NoActiveSession(_)
            | AppError::EntryNotFound { .. }
            | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidComparisonAnswer(_) | AppError::InvalidInput(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::AggregateWriteConflict(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_)
            | AppError::Cache(_)
            | AppError::Serialization(_)
            | AppError::TierInvariantViolation { .. }
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, kind = self.kind(), "Request failed");
        }

        let body = Json(json!({
            "error": self.to_string(),
            "kind": self.kind(),
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_conflict_maps_to_409() {
        let err = AppError::SessionConflict {
            user_id: "u1".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.kind(), "session_conflict");
    }

    #[test]
    fn test_entry_not_found_message() {
        let err = AppError::EntryNotFound {
            user_id: "u1".to_string(),
            title_id: "tt1375666".to_string(),
        };
        assert_eq!(err.to_string(), "User u1 has not ranked title tt1375666");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_only_aggregate_conflicts_are_transient() {
        assert!(AppError::AggregateWriteConflict("busy".to_string()).is_transient());
        assert!(!AppError::Internal("boom".to_string()).is_transient());
        assert!(!AppError::InvalidComparisonAnswer("maybe".to_string()).is_transient());
    }

    #[test]
    fn test_aggregate_conflict_is_service_unavailable() {
        let err = AppError::AggregateWriteConflict("retries exhausted".to_string());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
