//! Login and token refresh routes

use axum::{Json, Router, extract::State, routing::post};
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::extract::AppJson;
use crate::state::AppState;

use super::types::{LoginRequest, LoginResponse, RefreshRequest, RefreshResponse};

/// Maximum accepted password length
const MAX_PASSWORD_LENGTH: usize = 256;

/// POST /login
async fn login(
    State(state): State<AppState>,
    AppJson(request): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if request.username_or_email.is_empty()
        || request.password.is_empty()
        || request.password.len() > MAX_PASSWORD_LENGTH
    {
        return Err(ApiError::InvalidData);
    }

    debug!("Login attempt for: {}", request.username_or_email);

    let user = state.db.find_user_by_login(&request.username_or_email).await?;
    let hash = user.as_ref().map(|u| u.password_hash.clone());

    if let Err(e) = state.verify_password(request.password, hash).await {
        metrics::counter!("docman_login_attempts_total", "outcome" => "failure").increment(1);
        warn!("Failed login for: {}", request.username_or_email);
        return Err(e);
    }
    let Some(user) = user else {
        return Err(docman_auth::AuthError::InvalidCredentials.into());
    };

    let pair = state.jwt.issue_pair(user.id, user.is_master)?;

    metrics::counter!("docman_login_attempts_total", "outcome" => "success").increment(1);
    info!("User {} logged in", user.name);

    Ok(Json(LoginResponse {
        message: "Login successful".to_string(),
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        user: user.into(),
    }))
}

/// POST /refresh-token
async fn refresh_token(
    State(state): State<AppState>,
    AppJson(request): AppJson<RefreshRequest>,
) -> Result<Json<RefreshResponse>, ApiError> {
    if request.refresh_token.is_empty() {
        return Err(ApiError::InvalidData);
    }

    match state.jwt.refresh(&request.refresh_token) {
        Ok(access_token) => {
            metrics::counter!("docman_token_refresh_total", "outcome" => "success").increment(1);
            Ok(Json(RefreshResponse { access_token }))
        }
        Err(e) => {
            metrics::counter!("docman_token_refresh_total", "outcome" => "failure").increment(1);
            Err(e.into())
        }
    }
}

/// Create auth routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/refresh-token", post(refresh_token))
}
