//! assocnet REST API
//!
//! This crate provides the Axum-based HTTP API for assocnet: the auth
//! endpoints, association and user CRUD, health and metrics.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::{AppState, MetricsHandle};
