//! Document metadata operations

use chrono::Utc;
use sqlx::Row;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{Document, DocumentFile, NewDocument, UpdateDocument};
use crate::repository::{Database, DocumentSort, ListOptions};

const DOCUMENT_COLUMNS: &str = "id, title, description, owner_id, owner_name, file_name, \
     content_type, size, checksum, storage_path, created_at, updated_at";

impl Database {
    /// Insert document metadata after its file has been stored
    pub async fn insert_document(&self, doc: NewDocument) -> Result<Document, DbError> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO documents (id, title, description, owner_id, owner_name, file_name,
                                   content_type, size, checksum, storage_path, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(doc.id.to_string())
        .bind(&doc.title)
        .bind(&doc.description)
        .bind(doc.owner_id.to_string())
        .bind(&doc.owner_name)
        .bind(&doc.file_name)
        .bind(&doc.content_type)
        .bind(doc.size)
        .bind(&doc.checksum)
        .bind(&doc.storage_path)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from_write(e, &doc.id.to_string()))?;

        Ok(Document {
            id: doc.id,
            title: doc.title,
            description: doc.description,
            owner_id: doc.owner_id,
            owner_name: doc.owner_name,
            file_name: doc.file_name,
            content_type: doc.content_type,
            size: doc.size,
            checksum: doc.checksum,
            storage_path: doc.storage_path,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get a document by ID
    pub async fn get_document(&self, id: Uuid) -> Result<Option<Document>, DbError> {
        let result = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        result
            .map(|row| Document::try_from(&row).map_err(DbError::from))
            .transpose()
    }

    /// List documents page by page
    pub async fn list_documents(
        &self,
        options: ListOptions<DocumentSort>,
    ) -> Result<Vec<Document>, DbError> {
        let rows = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents {} LIMIT ? OFFSET ?",
            options.order_clause()
        ))
        .bind(options.limit)
        .bind(options.offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| Document::try_from(row).map_err(DbError::from))
            .collect()
    }

    /// Count all documents
    pub async fn count_documents(&self) -> Result<i64, DbError> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM documents")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("count"))
    }

    /// Update title and/or description; returns `None` if the document does not exist
    pub async fn update_document(
        &self,
        id: Uuid,
        update: UpdateDocument,
    ) -> Result<Option<Document>, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET title = COALESCE(?, title),
                description = COALESCE(?, description),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(update.title)
        .bind(update.description)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_document(id).await
    }

    /// Point a document at a newly stored file, applying any title or
    /// description change in the same statement
    pub async fn replace_document_file(
        &self,
        id: Uuid,
        file: DocumentFile,
        update: UpdateDocument,
    ) -> Result<Option<Document>, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET file_name = ?, content_type = ?, size = ?, checksum = ?, storage_path = ?,
                title = COALESCE(?, title),
                description = COALESCE(?, description),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&file.file_name)
        .bind(&file.content_type)
        .bind(file.size)
        .bind(&file.checksum)
        .bind(&file.storage_path)
        .bind(update.title)
        .bind(update.description)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_document(id).await
    }

    /// Delete a document row
    pub async fn delete_document(&self, id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
