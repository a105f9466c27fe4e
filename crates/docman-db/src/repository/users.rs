//! User operations

use chrono::Utc;
use sqlx::Row;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{NewUser, UpdateUser, User};
use crate::repository::{Database, ListOptions, UserSort};

const USER_COLUMNS: &str = "id, name, email, password_hash, is_master, created_at, updated_at";

impl Database {
    /// Insert a new user
    pub async fn insert_user(&self, user: NewUser) -> Result<User, DbError> {
        let now = Utc::now();

        if self.user_exists_with(&user.name, &user.email).await? {
            return Err(DbError::Duplicate(format!(
                "User '{}' or email '{}' already exists",
                user.name, user.email
            )));
        }

        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, is_master, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_master)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from_write(e, &user.name))?;

        Ok(User {
            id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            is_master: user.is_master,
            created_at: now,
            updated_at: now,
        })
    }

    async fn user_exists_with(&self, name: &str, email: &str) -> Result<bool, DbError> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM users WHERE name = ? OR email = ?")
            .bind(name)
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = row.get("count");
        Ok(count > 0)
    }

    /// Get a user by ID
    pub async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>, DbError> {
        let result = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        result.map(|row| User::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// Find a user by login handle, which may be either the email or the name.
    /// An email match wins over a name match.
    pub async fn find_user_by_login(&self, handle: &str) -> Result<Option<User>, DbError> {
        let result = sqlx::query(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE email = ?1 OR name = ?1
            ORDER BY (email = ?1) DESC
            LIMIT 1
            "#
        ))
        .bind(handle)
        .fetch_optional(&self.pool)
        .await?;

        result.map(|row| User::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// List users page by page
    pub async fn list_users(&self, options: ListOptions<UserSort>) -> Result<Vec<User>, DbError> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users {} LIMIT ? OFFSET ?",
            options.order_clause()
        ))
        .bind(options.limit)
        .bind(options.offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| User::try_from(row).map_err(DbError::from))
            .collect()
    }

    /// Apply a partial update; returns the updated user, or `None` if it does not exist
    pub async fn update_user(&self, id: Uuid, update: UpdateUser) -> Result<Option<User>, DbError> {
        let now = Utc::now();
        let conflict = update.name.clone().unwrap_or_else(|| id.to_string());
        let result = sqlx::query(
            r#"
            UPDATE users
            SET name = COALESCE(?, name),
                email = COALESCE(?, email),
                password_hash = COALESCE(?, password_hash),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(update.name)
        .bind(update.email)
        .bind(update.password_hash)
        .bind(now.to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from_write(e, &conflict))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_user_by_id(id).await
    }

    /// Delete a non-master user. Master accounts are left untouched and
    /// reported as not deleted.
    pub async fn delete_regular_user(&self, id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ? AND is_master = 0")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete any user while keeping at least one master account.
    ///
    /// The master count is checked inside the DELETE statement itself, so two
    /// concurrent deletions cannot remove the last two masters.
    pub async fn delete_user_keeping_master(&self, id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query(
            r#"
            DELETE FROM users
            WHERE id = ?
              AND (is_master = 0 OR (SELECT COUNT(*) FROM users WHERE is_master = 1) > 1)
            "#,
        )
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        match self.get_user_by_id(id).await? {
            Some(_) => Err(DbError::LastMaster),
            None => Ok(false),
        }
    }

    /// Count all users
    pub async fn count_users(&self) -> Result<i64, DbError> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("count"))
    }

    /// Count master accounts
    pub async fn count_masters(&self) -> Result<i64, DbError> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM users WHERE is_master = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("count"))
    }
}
