//! Tag API endpoints
//!
//! - GET /api/tags - All tags
//! - GET /api/tags/{id} - One tag

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState};
use crate::models::Tag;

/// Build the tags router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tags", get(list_tags))
        .route("/tags/{id}", get(get_tag))
}

async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<Tag>>, ApiError> {
    Ok(Json(state.catalog_service.list_tags().await?))
}

async fn get_tag(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Tag>, ApiError> {
    Ok(Json(state.catalog_service.get_tag(id).await?))
}
