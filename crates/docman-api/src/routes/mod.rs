//! API routes

mod auth;
mod documents;
mod health;
pub mod metrics;
mod types;
mod users;

use axum::{Router, extract::DefaultBodyLimit, middleware};
use docman_auth::{auth_guard, master_guard};
use std::sync::Arc;

use crate::state::{AppState, MetricsHandle};

pub use types::*;

/// Create the main router
///
/// Public routes need no token; everything else sits behind the access
/// guard, and the `/usersMaster` routes behind the master guard.
pub fn create_router(state: AppState, metrics_handle: Option<Arc<MetricsHandle>>) -> Router {
    let jwt = state.jwt.clone();
    let body_limit = state.max_upload_bytes;

    let public = Router::new()
        .merge(health::routes())
        .merge(auth::routes())
        .merge(users::public_routes());

    let guarded = Router::new()
        .merge(users::routes())
        .merge(documents::routes())
        .route_layer(middleware::from_fn_with_state(jwt.clone(), auth_guard));

    let master = users::master_routes()
        .route_layer(middleware::from_fn_with_state(jwt, master_guard));

    let mut router = public
        .merge(guarded)
        .merge(master)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit));

    if let Some(handle) = metrics_handle {
        router = router.merge(metrics::routes(handle));
    }

    router
}
