//! Access and master guards for Axum
//!
//! The raw `Authorization` header value is the token; there is no
//! `Bearer ` prefix to strip.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::AuthError;
use crate::jwt::{Claims, JwtManager};

/// Authenticated user information
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub is_master: bool,
}

impl AuthUser {
    /// Create from JWT claims
    pub fn from_claims(claims: &Claims) -> Self {
        Self {
            id: claims.user_id,
            is_master: claims.is_master,
        }
    }

    /// Whether this user may act on a resource belonging to `owner`
    pub fn can_act_on(&self, owner: Uuid) -> bool {
        self.is_master || self.id == owner
    }
}

/// Resolve the caller from request headers
pub fn authenticate(jwt: &JwtManager, headers: &HeaderMap) -> Result<AuthUser, AuthError> {
    let header = match headers.get(AUTHORIZATION) {
        Some(value) if !value.is_empty() => value,
        _ => return Err(AuthError::MissingToken),
    };

    let token = header.to_str().map_err(|_| AuthError::InvalidToken)?;
    let claims = jwt.validate_access_token(token)?;
    let user = AuthUser::from_claims(&claims);

    debug!("Authenticated user: {} (master: {})", user.id, user.is_master);
    Ok(user)
}

/// Guard for routes that need any authenticated user.
///
/// On success the `AuthUser` is added to request extensions.
pub async fn auth_guard(
    State(jwt): State<Arc<JwtManager>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = authenticate(&jwt, request.headers())?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Guard for routes restricted to master accounts
pub async fn master_guard(
    State(jwt): State<Arc<JwtManager>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = authenticate(&jwt, request.headers())?;
    if !user.is_master {
        debug!("Rejected non-master user {} on master route", user.id);
        return Err(AuthError::InsufficientPermissions);
    }

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
