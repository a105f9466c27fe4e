//! Liveness and readiness endpoints

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;
use tracing::warn;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,
}

/// Reports `healthy` while the database answers, `degraded` with a 503 otherwise
async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (code, status, database) = match state.db.ping().await {
        Ok(()) => (StatusCode::OK, "healthy", "ok"),
        Err(e) => {
            warn!("Health check could not reach the database: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "degraded", "unreachable")
        }
    };
    metrics::counter!("docman_health_checks_total", "status" => status).increment(1);

    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            database,
        }),
    )
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
}
