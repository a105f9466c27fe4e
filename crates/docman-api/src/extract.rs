//! Request extractors with JSON error bodies

use axum::extract::FromRequest;
use uuid::Uuid;

use crate::error::ApiError;

/// `axum::Json` whose rejection is the API's `Invalid data` error
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

/// Parse a path segment as a resource id
pub fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest("Invalid ID".to_string()))
}
