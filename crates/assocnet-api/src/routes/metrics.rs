//! Prometheus scrape endpoint

use axum::{
    Router,
    extract::State,
    http::header::CONTENT_TYPE,
    response::IntoResponse,
    routing::get,
};
use std::sync::Arc;

use crate::state::MetricsHandle;

/// Prometheus text exposition format
const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// `/metrics`, rendered from the installed recorder's handle
pub fn routes(handle: Arc<MetricsHandle>) -> Router {
    Router::new()
        .route("/metrics", get(render))
        .with_state(handle)
}

async fn render(State(handle): State<Arc<MetricsHandle>>) -> impl IntoResponse {
    ([(CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)], handle.render())
}
