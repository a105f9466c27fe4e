//! API error types

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use docman_auth::AuthError;
use docman_db::DbError;
use docman_storage::StorageError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid data")]
    InvalidData,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Payload too large")]
    PayloadTooLarge,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!("Rejected JSON body: {}", rejection.body_text());
        ApiError::InvalidData
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::BadRequest(err.body_text())
        }
    }
}

const INTERNAL: &str = "Internal server error";

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Auth(e) => return e.into_response(),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::InvalidData => (StatusCode::BAD_REQUEST, "Invalid data".to_string()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::PayloadTooLarge => {
                (StatusCode::PAYLOAD_TOO_LARGE, "File too large".to_string())
            }
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string())
            }
            ApiError::Database(e) => match e {
                DbError::Duplicate(_) => (
                    StatusCode::CONFLICT,
                    "A user with this name or email already exists".to_string(),
                ),
                DbError::LastMaster => (
                    StatusCode::CONFLICT,
                    "Cannot delete the last master account".to_string(),
                ),
                DbError::Connection(e) => {
                    error!("Database error: {}", e);
                    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string())
                }
            },
            ApiError::Storage(e) => match e {
                StorageError::NotFound(_) => (StatusCode::NOT_FOUND, "File not found".to_string()),
                e => {
                    error!("Storage error: {}", e);
                    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string())
                }
            },
        };

        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn render(err: ApiError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_auth_errors_keep_their_shape() {
        let (status, body) = render(ApiError::Auth(AuthError::MissingToken)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Missing token");

        let (status, body) = render(ApiError::Auth(AuthError::InvalidCredentials)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid credentials");
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let (status, body) = render(ApiError::Internal("disk on fire".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");

        let io = std::io::Error::other("permission denied on /data");
        let (status, body) = render(ApiError::Storage(StorageError::Io(io))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
    }

    #[tokio::test]
    async fn test_database_mapping() {
        let (status, _) = render(ApiError::Database(DbError::LastMaster)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = render(ApiError::Database(DbError::Duplicate("alice".into()))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = render(ApiError::Storage(StorageError::NotFound("x".into()))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "File not found");
    }
}
