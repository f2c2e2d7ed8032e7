//! User management routes (bearer token required)

use assocnet_auth::AuthError;
use assocnet_db::UpdateUser;
use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::AppState;

use super::auth::{RequireAuth, validate_contact};
use super::types::{UpdateUserRequest, UserResponse};

// ==================== User Routes ====================

/// GET /users
async fn list_users(
    RequireAuth(caller): RequireAuth,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    debug!("User list requested by {}", caller.username);

    let users = state.db.list_users().await?;
    if users.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let users: Vec<UserResponse> = users.into_iter().map(UserResponse::from).collect();
    Ok(Json(users).into_response())
}

/// GET /users/{id}
async fn get_user(
    _auth: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state
        .db
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User: {}", id)))?;

    Ok(Json(UserResponse::from(user)))
}

/// PUT /users/{id}
async fn update_user(
    _auth: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let Json(request) = body?;
    validate_contact("Email", request.email.as_deref())?;
    validate_contact("Phone number", request.phone_number.as_deref())?;

    debug!("Updating user: {}", id);

    let update = UpdateUser {
        email: request.email.map(Some),
        phone_number: request.phone_number.map(Some),
        active: request.active,
    };
    if !state.db.update_user(id, update).await? {
        return Err(ApiError::NotFound(format!("User: {}", id)));
    }

    let user = state
        .db
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User: {}", id)))?;

    info!("Updated user: {}", user.username);
    Ok(Json(UserResponse::from(user)))
}

/// DELETE /users/{id}
///
/// Soft-deletes the user and revokes their refresh token.
async fn delete_user(
    _auth: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    debug!("Deleting user: {}", id);

    if !state.db.trash_user(id).await? {
        return Err(ApiError::NotFound(format!("User: {}", id)));
    }

    match state.auth.revoke_user(id).await {
        Ok(_) | Err(AuthError::UnknownUser(_)) => {}
        Err(e) => return Err(e.into()),
    }

    info!("Deleted user: {}", id);
    Ok(StatusCode::NO_CONTENT)
}

/// Create user routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{id}", get(get_user).put(update_user).delete(delete_user))
}
