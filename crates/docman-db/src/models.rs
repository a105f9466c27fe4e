//! Database models

use crate::utils::{parse_datetime_or_now, parse_uuid};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use uuid::Uuid;

/// User model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_master: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New user (for insertion)
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub is_master: bool,
}

/// Partial user update; `None` leaves the column unchanged
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

impl UpdateUser {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.password_hash.is_none()
    }
}

/// Document metadata; the file itself lives in the storage backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub owner_id: Uuid,
    pub owner_name: String,
    pub file_name: String,
    pub content_type: String,
    pub size: i64,
    /// SHA-256 of the stored file, hex encoded
    pub checksum: String,
    #[serde(skip_serializing)]
    pub storage_path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New document (for insertion)
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub owner_id: Uuid,
    pub owner_name: String,
    pub file_name: String,
    pub content_type: String,
    pub size: i64,
    pub checksum: String,
    pub storage_path: String,
}

/// Partial document metadata update
#[derive(Debug, Clone, Default)]
pub struct UpdateDocument {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Replacement file details for an existing document
#[derive(Debug, Clone)]
pub struct DocumentFile {
    pub file_name: String,
    pub content_type: String,
    pub size: i64,
    pub checksum: String,
    pub storage_path: String,
}

// ==================== TryFrom Implementations ====================

impl TryFrom<&sqlx::sqlite::SqliteRow> for User {
    type Error = sqlx::Error;

    fn try_from(row: &sqlx::sqlite::SqliteRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: parse_uuid(&row.try_get::<String, _>("id")?)?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            is_master: row.try_get("is_master")?,
            created_at: parse_datetime_or_now(&row.try_get::<String, _>("created_at")?),
            updated_at: parse_datetime_or_now(&row.try_get::<String, _>("updated_at")?),
        })
    }
}

impl TryFrom<&sqlx::sqlite::SqliteRow> for Document {
    type Error = sqlx::Error;

    fn try_from(row: &sqlx::sqlite::SqliteRow) -> Result<Self, Self::Error> {
        Ok(Document {
            id: parse_uuid(&row.try_get::<String, _>("id")?)?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            owner_id: parse_uuid(&row.try_get::<String, _>("owner_id")?)?,
            owner_name: row.try_get("owner_name")?,
            file_name: row.try_get("file_name")?,
            content_type: row.try_get("content_type")?,
            size: row.try_get("size")?,
            checksum: row.try_get("checksum")?,
            storage_path: row.try_get("storage_path")?,
            created_at: parse_datetime_or_now(&row.try_get::<String, _>("created_at")?),
            updated_at: parse_datetime_or_now(&row.try_get::<String, _>("updated_at")?),
        })
    }
}
