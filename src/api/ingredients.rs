//! Ingredient API endpoints
//!
//! - GET /api/ingredients?name= - Catalog, optionally filtered by a
//!   case-insensitive name prefix
//! - GET /api/ingredients/{id} - One ingredient

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState};
use crate::models::Ingredient;

#[derive(Debug, Default, Deserialize)]
pub struct IngredientQuery {
    pub name: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ingredients", get(list_ingredients))
        .route("/ingredients/{id}", get(get_ingredient))
}

async fn list_ingredients(
    State(state): State<AppState>,
    Query(query): Query<IngredientQuery>,
) -> Result<Json<Vec<Ingredient>>, ApiError> {
    let ingredients = state
        .catalog_service
        .list_ingredients(query.name.as_deref())
        .await?;
    Ok(Json(ingredients))
}

async fn get_ingredient(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Ingredient>, ApiError> {
    Ok(Json(state.catalog_service.get_ingredient(id).await?))
}
