//! Prometheus metrics endpoint

use axum::{Router, extract::State, routing::get};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::sync::Arc;

use crate::state::MetricsHandle;

/// Install the global Prometheus recorder; may only succeed once per process
pub fn install_recorder() -> Result<MetricsHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Create metrics routes with the Prometheus handle
pub fn routes(handle: Arc<MetricsHandle>) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(handle)
}

/// GET /metrics
async fn render_metrics(State(handle): State<Arc<MetricsHandle>>) -> String {
    handle.render()
}
