//! Application state

use assocnet_auth::{AuthService, JwtManager};
use assocnet_db::Database;
use std::sync::Arc;

/// Prometheus handle used to render `/metrics`
pub type MetricsHandle = metrics_exporter_prometheus::PrometheusHandle;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub auth: Arc<AuthService>,
    pub jwt: Arc<JwtManager>,
}

impl AppState {
    pub fn new(db: Database, auth: Arc<AuthService>) -> Self {
        let jwt = auth.jwt();
        Self { db, auth, jwt }
    }
}
