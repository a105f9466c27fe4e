//! Request/Response DTOs

use docman_db::utils::format_bytes;
use docman_db::{Document, ListOptions, User};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

/// Default page size for list endpoints
const DEFAULT_LIMIT: i64 = 10;
/// Largest page a client may request
const MAX_LIMIT: i64 = 100;

// ==================== Auth Types ====================

/// Login request
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username_or_email: String,
    pub password: String,
}

/// Login response
#[derive(Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserResponse,
}

/// Refresh request
#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Refresh response
#[derive(Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

// ==================== User Types ====================

/// Create user request
#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Update user request
#[derive(Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// User response (without password)
#[derive(Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub master: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            master: user.is_master,
            created_at: user.created_at.to_rfc3339(),
            updated_at: user.updated_at.to_rfc3339(),
        }
    }
}

/// Paginated users response
#[derive(Serialize)]
pub struct UsersListResponse {
    pub users: Vec<UserResponse>,
    pub total: i64,
    pub start: i64,
    pub limit: i64,
}

/// Updated user response
#[derive(Serialize)]
pub struct UserUpdatedResponse {
    pub message: String,
    pub user: UserResponse,
}

/// Plain acknowledgement
#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

// ==================== Document Types ====================

/// Document metadata response
#[derive(Serialize)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub owner_id: Uuid,
    pub owner_name: String,
    pub file_name: String,
    pub content_type: String,
    pub size: i64,
    pub size_human: String,
    pub checksum: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Document> for DocumentResponse {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id,
            title: doc.title,
            description: doc.description,
            owner_id: doc.owner_id,
            owner_name: doc.owner_name,
            file_name: doc.file_name,
            content_type: doc.content_type,
            size: doc.size,
            size_human: format_bytes(doc.size),
            checksum: doc.checksum,
            created_at: doc.created_at.to_rfc3339(),
            updated_at: doc.updated_at.to_rfc3339(),
        }
    }
}

/// Paginated documents response
#[derive(Serialize)]
pub struct DocumentsListResponse {
    pub documents: Vec<DocumentResponse>,
    pub total: i64,
    pub start: i64,
    pub limit: i64,
}

/// Update document metadata request
#[derive(Deserialize)]
pub struct UpdateDocumentRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Updated document response
#[derive(Serialize)]
pub struct DocumentUpdatedResponse {
    pub message: String,
    pub document: DocumentResponse,
}

// ==================== Query Types ====================

/// Pagination and sorting query parameters.
///
/// Kept as raw strings so bad values produce the API's own error messages.
#[derive(Deserialize, Default)]
pub struct ListQuery {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub limit: Option<String>,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub dir: Option<String>,
}

impl ListQuery {
    /// Resolve into list options; unknown sort keys and directions fall back to defaults
    pub fn into_options<S: Default>(
        self,
        parse_sort: fn(&str) -> Option<S>,
    ) -> Result<ListOptions<S>, ApiError> {
        let offset = parse_non_negative(self.start.as_deref(), 0, "start")?;
        let limit = parse_non_negative(self.limit.as_deref(), DEFAULT_LIMIT, "limit")?.min(MAX_LIMIT);
        let sort = self.sort.as_deref().and_then(parse_sort).unwrap_or_default();
        let descending = self
            .dir
            .as_deref()
            .is_some_and(|d| d.eq_ignore_ascii_case("desc"));

        Ok(ListOptions {
            offset,
            limit,
            sort,
            descending,
        })
    }
}

fn parse_non_negative(raw: Option<&str>, default: i64, name: &str) -> Result<i64, ApiError> {
    match raw {
        None | Some("") => Ok(default),
        Some(raw) => raw
            .parse::<i64>()
            .ok()
            .filter(|v| *v >= 0)
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid '{}' parameter", name))),
    }
}
