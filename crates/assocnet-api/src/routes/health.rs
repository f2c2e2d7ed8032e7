//! Health check endpoints

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;
use tracing::warn;

use crate::state::AppState;

/// Health status response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub version: &'static str,
}

/// Healthy only while the database answers; 503 otherwise
async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    metrics::counter!("assocnet_health_checks_total").increment(1);

    let (code, status, database) = match state.db.ping().await {
        Ok(()) => (StatusCode::OK, "healthy", "ok"),
        Err(e) => {
            warn!("Health check failed: {}", e);
            metrics::counter!("assocnet_health_check_failures_total").increment(1);
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy", "unavailable")
        }
    };

    (
        code,
        Json(HealthResponse {
            status,
            database,
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

/// Create health routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
}
