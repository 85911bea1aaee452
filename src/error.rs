use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::auth::{jwt::TokenError, password::PasswordError, repo::RepoError};

/// Errors surfaced by request handlers.
///
/// Client errors carry their message to the caller. Storage and crypto
/// failures are logged in full and answered with a generic 500.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("email already registered")]
    Conflict,

    /// Login failure. Identical for unknown email and wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Missing, malformed, expired or otherwise rejected bearer token.
    #[error("unauthorized")]
    Unauthorized,

    #[error("storage failure: {0}")]
    Persistence(#[source] RepoError),

    #[error("token signing failed: {0}")]
    Signing(#[from] TokenError),

    #[error("password hashing failed: {0}")]
    Hashing(#[from] PasswordError),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict => StatusCode::CONFLICT,
            AppError::InvalidCredentials | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Persistence(_) | AppError::Signing(_) | AppError::Hashing(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::Conflict => AppError::Conflict,
            other => AppError::Persistence(other),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!(error = %self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(err: AppError) -> (StatusCode, serde_json::Value) {
        let res = err.into_response();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), 64 * 1024)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            AppError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::Conflict.status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::InvalidCredentials.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::Hashing(PasswordError::Empty).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Signing(TokenError::MissingSecret).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn repo_conflict_becomes_conflict() {
        assert!(matches!(
            AppError::from(RepoError::Conflict),
            AppError::Conflict
        ));
        assert!(matches!(
            AppError::from(RepoError::Database(sqlx::Error::PoolTimedOut)),
            AppError::Persistence(_)
        ));
    }

    #[tokio::test]
    async fn server_errors_hide_details() {
        let (status, body) =
            body_of(AppError::from(RepoError::Database(sqlx::Error::PoolTimedOut))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "internal server error");
    }

    #[tokio::test]
    async fn client_errors_carry_message() {
        let (status, body) = body_of(AppError::Validation("invalid email".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid email");
    }
}
