//! User management routes

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use docman_auth::AuthUser;
use docman_db::{NewUser, UpdateUser, UserSort};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::extract::{AppJson, parse_id};
use crate::state::AppState;

use super::types::{
    CreateUserRequest, ListQuery, MessageResponse, UpdateUserRequest, UserResponse,
    UserUpdatedResponse, UsersListResponse,
};

// ==================== Input Validation ====================

/// Maximum allowed name length
const MAX_NAME_LENGTH: usize = 64;
/// Maximum allowed email length
const MAX_EMAIL_LENGTH: usize = 254;
/// Minimum allowed password length
const MIN_PASSWORD_LENGTH: usize = 8;
/// Maximum allowed password length
const MAX_PASSWORD_LENGTH: usize = 256;

fn validate_name(name: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::BadRequest("Name cannot be empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Name exceeds maximum length of {} characters",
            MAX_NAME_LENGTH
        )));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    if email.len() > MAX_EMAIL_LENGTH || !email.contains('@') {
        return Err(ApiError::BadRequest("Invalid email address".to_string()));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        )));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Password exceeds maximum length of {} characters",
            MAX_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

// ==================== User Routes ====================

async fn create_account(
    state: &AppState,
    request: CreateUserRequest,
    is_master: bool,
) -> Result<UserResponse, ApiError> {
    validate_name(&request.name)?;
    validate_email(&request.email)?;
    validate_password(&request.password)?;

    debug!("Creating user: {} (master: {})", request.name, is_master);

    let password_hash = state.hash_password(request.password).await?;
    let user = state
        .db
        .insert_user(NewUser {
            name: request.name,
            email: request.email,
            password_hash,
            is_master,
        })
        .await?;

    info!("Created user: {}", user.name);
    Ok(user.into())
}

/// POST /users (public sign-up)
async fn create_user(
    State(state): State<AppState>,
    AppJson(request): AppJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let user = create_account(&state, request, false).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /usersMaster (master only)
async fn create_master(
    State(state): State<AppState>,
    AppJson(request): AppJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let user = create_account(&state, request, true).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /users
async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<UsersListResponse>, ApiError> {
    let options = query.into_options(UserSort::from_param)?;
    let users = state.db.list_users(options).await?;
    let total = state.db.count_users().await?;

    Ok(Json(UsersListResponse {
        users: users.into_iter().map(UserResponse::from).collect(),
        total,
        start: options.offset,
        limit: options.limit,
    }))
}

/// GET /users/{id}
async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let id = parse_id(&id)?;
    let user = state
        .db
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(user.into()))
}

/// PUT /users/{id} (self or master)
async fn update_user(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
    AppJson(request): AppJson<UpdateUserRequest>,
) -> Result<Json<UserUpdatedResponse>, ApiError> {
    let id = parse_id(&id)?;
    if !caller.can_act_on(id) {
        return Err(ApiError::Forbidden(
            "You can only update your own account".to_string(),
        ));
    }

    if let Some(name) = &request.name {
        validate_name(name)?;
    }
    if let Some(email) = &request.email {
        validate_email(email)?;
    }
    let password_hash = match request.password {
        Some(password) => {
            validate_password(&password)?;
            Some(state.hash_password(password).await?)
        }
        None => None,
    };

    let update = UpdateUser {
        name: request.name,
        email: request.email,
        password_hash,
    };
    if update.is_empty() {
        return Err(ApiError::BadRequest("Nothing to update".to_string()));
    }

    debug!("Updating user: {}", id);
    let user = state
        .db
        .update_user(id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    info!("Updated user: {}", user.name);
    Ok(Json(UserUpdatedResponse {
        message: "User updated successfully".to_string(),
        user: user.into(),
    }))
}

/// DELETE /users/{id} (self or master; never a master account)
async fn delete_user(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_id(&id)?;
    if !caller.can_act_on(id) {
        return Err(ApiError::Forbidden(
            "You can only delete your own account".to_string(),
        ));
    }

    let user = state
        .db
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    if user.is_master {
        return Err(ApiError::Forbidden(
            "You cannot delete a user master".to_string(),
        ));
    }

    if !state.db.delete_regular_user(id).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    info!("Deleted user: {}", user.name);
    Ok(Json(MessageResponse::new("User deleted successfully")))
}

/// DELETE /usersMaster/{id} (master only; keeps at least one master)
async fn delete_any_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_id(&id)?;

    if !state.db.delete_user_keeping_master(id).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    info!("Deleted user {} via master route", id);
    Ok(Json(MessageResponse::new("User deleted successfully")))
}

/// Routes open to anyone
pub fn public_routes() -> Router<AppState> {
    Router::new().route("/users", post(create_user))
}

/// Routes for any authenticated user
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route(
            "/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
}

/// Routes for master accounts
pub fn master_routes() -> Router<AppState> {
    Router::new()
        .route("/usersMaster", post(create_master))
        .route("/usersMaster/{id}", delete(delete_any_user))
}
