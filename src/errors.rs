use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("goal not found")]
    GoalNotFound,

    #[error("motivation not found")]
    MotivationNotFound,

    #[error("access token not found")]
    TokenNotFound,

    #[error("access token already used")]
    AlreadyUsed,

    #[error("access token expired")]
    Expired,

    #[error("invalid access secret")]
    InvalidSecret,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code, msg) = match &self {
            AppError::GoalNotFound => (
                StatusCode::NOT_FOUND,
                "not_found_error",
                "goal_not_found",
                "goal not found".to_string(),
            ),
            AppError::MotivationNotFound => (
                StatusCode::NOT_FOUND,
                "not_found_error",
                "motivation_not_found",
                "motivation not found".to_string(),
            ),
            AppError::TokenNotFound => (
                StatusCode::NOT_FOUND,
                "not_found_error",
                "token_not_found",
                "unknown access token".to_string(),
            ),
            AppError::AlreadyUsed => (
                StatusCode::CONFLICT,
                "access_error",
                "token_already_used",
                "access token has already been used".to_string(),
            ),
            AppError::Expired => (
                StatusCode::GONE,
                "access_error",
                "token_expired",
                "access token has expired".to_string(),
            ),
            AppError::InvalidSecret => (
                StatusCode::UNAUTHORIZED,
                "authorization_error",
                "invalid_secret",
                "invalid access credentials".to_string(),
            ),
            AppError::InvalidInput(reason) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "invalid_input",
                reason.clone(),
            ),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": code,
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    /// Status mapping contract for the HTTP boundary.
    #[test]
    fn error_kinds_map_to_expected_statuses() {
        assert_eq!(status_of(AppError::GoalNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_of(AppError::TokenNotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(AppError::MotivationNotFound),
            StatusCode::NOT_FOUND
        );
        assert_eq!(status_of(AppError::AlreadyUsed), StatusCode::CONFLICT);
        assert_eq!(status_of(AppError::Expired), StatusCode::GONE);
        assert_eq!(status_of(AppError::InvalidSecret), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of(AppError::InvalidInput("bad ttl".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AppError::Internal(anyhow::anyhow!("boom"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn invalid_input_carries_the_reason() {
        let err = AppError::InvalidInput("ttl must be positive".into());
        assert_eq!(format!("{}", err), "invalid input: ttl must be positive");
    }
}
