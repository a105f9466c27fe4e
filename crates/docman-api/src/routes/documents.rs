//! Document routes

use axum::{
    Extension, Json, Router,
    body::Body,
    extract::{
        Multipart, Path, Query, State,
        multipart::{Field, MultipartRejection},
    },
    http::{StatusCode, header},
    response::Response,
    routing::{get, post, put},
};
use bytes::Bytes;
use docman_auth::AuthUser;
use docman_db::{Document, DocumentFile, DocumentSort, NewDocument, UpdateDocument};
use docman_storage::{StorageBackend, StorageError, StoredObject};
use futures::{SinkExt, channel::mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::{AppJson, parse_id};
use crate::state::AppState;

use super::types::{
    DocumentResponse, DocumentUpdatedResponse, DocumentsListResponse, ListQuery,
    MessageResponse, UpdateDocumentRequest,
};

/// Chunks buffered between the multipart reader and the storage writer
const UPLOAD_CHANNEL_DEPTH: usize = 8;

// ==================== Multipart Handling ====================

/// Fields collected from an upload form
#[derive(Default)]
struct UploadForm {
    title: Option<String>,
    description: Option<String>,
    file: Option<UploadedFile>,
}

struct UploadedFile {
    file_name: String,
    content_type: String,
    stored: StoredObject,
}

/// Keep only the final path component and drop characters that would
/// break a `Content-Disposition` header
fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control() && *c != '"')
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned.to_string()
    }
}

fn resolve_content_type(declared: Option<&str>, file_name: &str) -> String {
    match declared {
        Some(ct) if !ct.is_empty() => ct.to_string(),
        _ => mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .to_string(),
    }
}

/// Stream one multipart field into storage under `key`
async fn store_field(
    storage: &dyn StorageBackend,
    key: &str,
    mut field: Field<'_>,
) -> Result<StoredObject, ApiError> {
    let (mut tx, rx) = mpsc::channel::<Result<Bytes, StorageError>>(UPLOAD_CHANNEL_DEPTH);

    let pump = async move {
        loop {
            match field.chunk().await {
                Ok(Some(chunk)) => {
                    // Writer gone; its own error is reported below
                    if tx.send(Ok(chunk)).await.is_err() {
                        break Ok(());
                    }
                }
                Ok(None) => break Ok(()),
                Err(e) => {
                    let _ = tx.send(Err(StorageError::Stream(e.body_text()))).await;
                    break Err(e);
                }
            }
        }
    };

    let (pumped, stored) = tokio::join!(pump, storage.write_stream(key, Box::pin(rx)));
    pumped?;
    Ok(stored?)
}

async fn read_upload_form(
    storage: &dyn StorageBackend,
    key: &str,
    multipart: &mut Multipart,
) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => form.title = Some(field.text().await?),
            "description" => form.description = Some(field.text().await?),
            "file" => {
                let file_name = sanitize_file_name(field.file_name().unwrap_or_default());
                let content_type = resolve_content_type(field.content_type(), &file_name);
                let stored = store_field(storage, key, field).await?;
                debug!("Received file {} ({} bytes)", file_name, stored.size);
                form.file = Some(UploadedFile {
                    file_name,
                    content_type,
                    stored,
                });
            }
            other => debug!("Ignoring multipart field: {}", other),
        }
    }

    Ok(form)
}

/// Remove a stored file after a failed upload
async fn discard_file(state: &AppState, key: &str) {
    if let Err(e) = state.storage.delete(key).await {
        warn!("Failed to clean up document file {}: {}", key, e);
    }
}

fn non_empty_title(title: Option<String>) -> Result<Option<String>, ApiError> {
    match title {
        Some(t) if t.trim().is_empty() => {
            Err(ApiError::BadRequest("Title cannot be empty".to_string()))
        }
        other => Ok(other),
    }
}

async fn load_document(state: &AppState, id: Uuid) -> Result<Document, ApiError> {
    state
        .db
        .get_document(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Document not found".to_string()))
}

fn ensure_can_modify(caller: &AuthUser, doc: &Document) -> Result<(), ApiError> {
    if !caller.can_act_on(doc.owner_id) {
        return Err(ApiError::Forbidden(
            "You can only modify your own documents".to_string(),
        ));
    }
    Ok(())
}

// ==================== Document Routes ====================

/// GET /documents
async fn list_documents(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<DocumentsListResponse>, ApiError> {
    let options = query.into_options(DocumentSort::from_param)?;
    let documents = state.db.list_documents(options).await?;
    let total = state.db.count_documents().await?;

    Ok(Json(DocumentsListResponse {
        documents: documents.into_iter().map(DocumentResponse::from).collect(),
        total,
        start: options.offset,
        limit: options.limit,
    }))
}

/// GET /documents/{id}
async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DocumentResponse>, ApiError> {
    let doc = load_document(&state, parse_id(&id)?).await?;
    Ok(Json(doc.into()))
}

/// GET /documents/file/{id}
async fn download_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let doc = load_document(&state, parse_id(&id)?).await?;
    let key = doc.id.to_string();

    let size = state.storage.size(&key).await?;
    let stream = state.storage.stream(&key).await?;

    debug!("Serving document {} ({} bytes)", doc.id, size);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, &doc.content_type)
        .header(header::CONTENT_LENGTH, size)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", sanitize_file_name(&doc.file_name)),
        )
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// POST /documents/upload
async fn upload_document(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<DocumentResponse>), ApiError> {
    let mut multipart = multipart?;
    let id = Uuid::new_v4();
    let key = id.to_string();

    let form = match read_upload_form(state.storage.as_ref(), &key, &mut multipart).await {
        Ok(form) => form,
        Err(e) => {
            discard_file(&state, &key).await;
            return Err(e);
        }
    };

    let result = insert_uploaded(&state, &caller, id, form).await;
    if result.is_err() {
        discard_file(&state, &key).await;
    }
    let doc = result?;

    metrics::counter!("docman_documents_uploaded_total").increment(1);
    info!("Uploaded document {} ({}) for user {}", doc.id, doc.title, caller.id);

    Ok((StatusCode::CREATED, Json(doc.into())))
}

async fn insert_uploaded(
    state: &AppState,
    caller: &AuthUser,
    id: Uuid,
    form: UploadForm,
) -> Result<Document, ApiError> {
    let title = non_empty_title(form.title)?
        .ok_or_else(|| ApiError::BadRequest("Title is required".to_string()))?;
    let file = form
        .file
        .ok_or_else(|| ApiError::BadRequest("File is required".to_string()))?;

    let owner = state
        .db
        .get_user_by_id(caller.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let doc = state
        .db
        .insert_document(NewDocument {
            id,
            title,
            description: form.description.unwrap_or_default(),
            owner_id: owner.id,
            owner_name: owner.name,
            file_name: file.file_name,
            content_type: file.content_type,
            size: file.stored.size as i64,
            checksum: file.stored.checksum,
            storage_path: file.stored.path,
        })
        .await?;

    Ok(doc)
}

/// PUT /documents/{id} (owner or master)
async fn update_document(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
    AppJson(request): AppJson<UpdateDocumentRequest>,
) -> Result<Json<DocumentUpdatedResponse>, ApiError> {
    let doc = load_document(&state, parse_id(&id)?).await?;
    ensure_can_modify(&caller, &doc)?;

    let update = UpdateDocument {
        title: non_empty_title(request.title)?,
        description: request.description,
    };
    if update.title.is_none() && update.description.is_none() {
        return Err(ApiError::BadRequest("Nothing to update".to_string()));
    }

    let doc = state
        .db
        .update_document(doc.id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound("Document not found".to_string()))?;

    info!("Updated document {}", doc.id);
    Ok(Json(DocumentUpdatedResponse {
        message: "Document updated successfully".to_string(),
        document: doc.into(),
    }))
}

/// PUT /documents/upload/{id} (owner or master)
///
/// The new file is staged under a fresh key and only moved onto the
/// document once the form is valid and the metadata row is updated.
async fn replace_document(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DocumentUpdatedResponse>, ApiError> {
    let doc = load_document(&state, parse_id(&id)?).await?;
    ensure_can_modify(&caller, &doc)?;
    let mut multipart = multipart?;
    let staging = Uuid::new_v4().to_string();

    let form = match read_upload_form(state.storage.as_ref(), &staging, &mut multipart).await {
        Ok(form) => form,
        Err(e) => {
            discard_file(&state, &staging).await;
            return Err(e);
        }
    };

    let result = apply_replacement(&state, &doc, &staging, form).await;
    if result.is_err() {
        discard_file(&state, &staging).await;
    }
    let updated = result?;

    info!("Replaced file of document {}", updated.id);
    Ok(Json(DocumentUpdatedResponse {
        message: "Document updated successfully".to_string(),
        document: updated.into(),
    }))
}

async fn apply_replacement(
    state: &AppState,
    doc: &Document,
    staging: &str,
    form: UploadForm,
) -> Result<Document, ApiError> {
    let update = UpdateDocument {
        title: non_empty_title(form.title)?,
        description: form.description,
    };
    let file = form
        .file
        .ok_or_else(|| ApiError::BadRequest("File is required".to_string()))?;

    // The key is unchanged, so the file keeps its storage path
    let updated = state
        .db
        .replace_document_file(
            doc.id,
            DocumentFile {
                file_name: file.file_name,
                content_type: file.content_type,
                size: file.stored.size as i64,
                checksum: file.stored.checksum,
                storage_path: doc.storage_path.clone(),
            },
            update,
        )
        .await?
        .ok_or_else(|| ApiError::NotFound("Document not found".to_string()))?;

    if let Err(e) = state.storage.rename(staging, &doc.id.to_string()).await {
        restore_metadata(state, doc).await;
        return Err(e.into());
    }

    Ok(updated)
}

/// Put back the metadata of a document whose file was left untouched
async fn restore_metadata(state: &AppState, doc: &Document) {
    let previous = DocumentFile {
        file_name: doc.file_name.clone(),
        content_type: doc.content_type.clone(),
        size: doc.size,
        checksum: doc.checksum.clone(),
        storage_path: doc.storage_path.clone(),
    };
    let update = UpdateDocument {
        title: Some(doc.title.clone()),
        description: Some(doc.description.clone()),
    };
    if let Err(e) = state.db.replace_document_file(doc.id, previous, update).await {
        warn!("Failed to restore metadata of document {}: {}", doc.id, e);
    }
}

/// DELETE /documents/{id} (owner or master)
async fn delete_document(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let doc = load_document(&state, parse_id(&id)?).await?;
    ensure_can_modify(&caller, &doc)?;

    if !state.db.delete_document(doc.id).await? {
        return Err(ApiError::NotFound("Document not found".to_string()));
    }

    match state.storage.delete(&doc.id.to_string()).await {
        Ok(true) => {}
        Ok(false) => warn!("File for document {} was already missing", doc.id),
        Err(e) => warn!("Failed to delete file for document {}: {}", doc.id, e),
    }

    info!("Deleted document {}", doc.id);
    Ok(Json(MessageResponse::new("Document deleted successfully")))
}

/// Create document routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/documents", get(list_documents))
        .route("/documents/upload", post(upload_document))
        .route("/documents/upload/{id}", put(replace_document))
        .route("/documents/file/{id}", get(download_document))
        .route(
            "/documents/{id}",
            get(get_document).put(update_document).delete(delete_document),
        )
}
