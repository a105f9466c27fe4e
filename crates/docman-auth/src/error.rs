//! Authentication error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Missing token")]
    MissingToken,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Stored password hash is malformed")]
    MalformedHash,

    #[error("JWT signing key is not configured")]
    MissingSigningKey,

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("JWT signing error: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, key, message) = match &self {
            // The guard reports a missing token under "message", everything else under "error"
            AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "message", "Missing token"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "error", "Invalid token"),
            AuthError::InvalidCredentials | AuthError::MalformedHash => {
                (StatusCode::UNAUTHORIZED, "error", "Invalid credentials")
            }
            AuthError::InsufficientPermissions => {
                (StatusCode::FORBIDDEN, "error", "Insufficient permissions")
            }
            AuthError::MissingSigningKey
            | AuthError::PasswordHash(_)
            | AuthError::Signing(_) => {
                error!("Authentication failure: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "error",
                    "Internal server error",
                )
            }
        };

        let mut body = Map::new();
        body.insert(key.to_string(), Value::from(message));
        (status, axum::Json(Value::Object(body))).into_response()
    }
}
