//! Database repository implementation

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbError;

mod documents;
mod users;

/// Database connection and operations
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

/// Column a listing can be ordered by
pub trait SortColumn {
    fn column(&self) -> &'static str;
}

/// Sort keys accepted for user listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UserSort {
    #[default]
    Id,
    Name,
    Email,
}

impl UserSort {
    pub fn from_param(s: &str) -> Option<Self> {
        match s {
            "id" => Some(UserSort::Id),
            "name" => Some(UserSort::Name),
            "email" => Some(UserSort::Email),
            _ => None,
        }
    }
}

impl SortColumn for UserSort {
    fn column(&self) -> &'static str {
        match self {
            UserSort::Id => "id",
            UserSort::Name => "name",
            UserSort::Email => "email",
        }
    }
}

/// Sort keys accepted for document listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DocumentSort {
    #[default]
    Id,
    Title,
    Owner,
}

impl DocumentSort {
    pub fn from_param(s: &str) -> Option<Self> {
        match s {
            "id" => Some(DocumentSort::Id),
            "title" => Some(DocumentSort::Title),
            "owner" => Some(DocumentSort::Owner),
            _ => None,
        }
    }
}

impl SortColumn for DocumentSort {
    fn column(&self) -> &'static str {
        match self {
            DocumentSort::Id => "id",
            DocumentSort::Title => "title",
            DocumentSort::Owner => "owner_name",
        }
    }
}

/// Pagination and ordering for list queries
#[derive(Debug, Clone, Copy)]
pub struct ListOptions<S> {
    pub offset: i64,
    pub limit: i64,
    pub sort: S,
    pub descending: bool,
}

impl<S: Default> Default for ListOptions<S> {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 10,
            sort: S::default(),
            descending: false,
        }
    }
}

impl<S: SortColumn> ListOptions<S> {
    /// `ORDER BY` clause built only from whitelisted column names
    pub(crate) fn order_clause(&self) -> String {
        let direction = if self.descending { "DESC" } else { "ASC" };
        format!("ORDER BY {} {}", self.sort.column(), direction)
    }
}

impl Database {
    /// Create a new database connection
    pub async fn new(database_url: &str) -> Result<Self, DbError> {
        info!("Connecting to database: {}", database_url);

        let pool = SqlitePool::connect(database_url).await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Round-trip a trivial query to check the pool can reach the database
    pub async fn ping(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<(), DbError> {
        info!("Running database migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                is_master INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_users_is_master ON users(is_master)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                owner_id TEXT NOT NULL,
                owner_name TEXT NOT NULL,
                file_name TEXT NOT NULL,
                content_type TEXT NOT NULL,
                size INTEGER NOT NULL,
                checksum TEXT NOT NULL,
                storage_path TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_documents_owner_id ON documents(owner_id)
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Database migrations completed");
        Ok(())
    }
}
