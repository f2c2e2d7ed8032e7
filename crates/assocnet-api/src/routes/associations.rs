//! Association routes

use assocnet_db::AssociationInput;
use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    routing::get,
};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::AppState;

use super::types::{AssociationRequest, AssociationResponse};

/// Maximum association name length
const MAX_NAME_LENGTH: usize = 256;
/// Maximum website length
const MAX_WEBSITE_LENGTH: usize = 450;

fn validate(request: AssociationRequest) -> Result<AssociationInput, ApiError> {
    let name = request.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Name cannot be empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Name exceeds maximum length of {} characters",
            MAX_NAME_LENGTH
        )));
    }
    if request.website.chars().count() > MAX_WEBSITE_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Website exceeds maximum length of {} characters",
            MAX_WEBSITE_LENGTH
        )));
    }

    Ok(AssociationInput {
        name,
        website: request.website.trim().to_string(),
        active: request.active,
    })
}

/// GET /associations
async fn list_associations(
    State(state): State<AppState>,
) -> Result<Json<Vec<AssociationResponse>>, ApiError> {
    let associations = state.db.list_associations().await?;
    Ok(Json(
        associations
            .into_iter()
            .map(AssociationResponse::from)
            .collect(),
    ))
}

/// GET /associations/{id}
async fn get_association(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<AssociationResponse>, ApiError> {
    let association = state
        .db
        .get_association(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Association: {}", id)))?;

    Ok(Json(AssociationResponse::from(association)))
}

/// POST /associations
async fn create_association(
    State(state): State<AppState>,
    body: Result<Json<AssociationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AssociationResponse>), ApiError> {
    let Json(request) = body?;
    let input = validate(request)?;
    debug!("Creating association: {}", input.name);

    let association = state.db.insert_association(input).await?;

    info!("Created association {} ({})", association.name, association.id);
    Ok((StatusCode::CREATED, Json(AssociationResponse::from(association))))
}

/// PUT /associations/{id}
async fn update_association(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Result<Json<AssociationRequest>, JsonRejection>,
) -> Result<Json<AssociationResponse>, ApiError> {
    let Json(request) = body?;
    let input = validate(request)?;

    if state.db.update_association(id, input).await? == 0 {
        return Err(ApiError::NotFound(format!("Association: {}", id)));
    }

    let association = state
        .db
        .get_association(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Association: {}", id)))?;

    info!("Updated association: {}", id);
    Ok(Json(AssociationResponse::from(association)))
}

/// DELETE /associations/{id}
async fn delete_association(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if state.db.trash_association(id).await? == 0 {
        return Err(ApiError::NotFound(format!("Association: {}", id)));
    }

    info!("Deleted association: {}", id);
    Ok(StatusCode::NO_CONTENT)
}

/// Create association routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/associations", get(list_associations).post(create_association))
        .route(
            "/associations/{id}",
            get(get_association)
                .put(update_association)
                .delete(delete_association),
        )
}
