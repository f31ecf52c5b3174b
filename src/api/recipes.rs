//! Recipe API endpoints
//!
//! - GET /api/recipes - List, newest first
//! - POST /api/recipes - Create
//! - GET /api/recipes/{id} - Read
//! - PATCH /api/recipes/{id} - Update (author only)
//! - DELETE /api/recipes/{id} - Delete (author only)
//! - POST|DELETE /api/recipes/{id}/favorite
//! - POST|DELETE /api/recipes/{id}/shopping_cart
//! - GET /api/recipes/download_shopping_cart
//!
//! List filters: `author`, `tags` (repeatable or comma separated slugs),
//! `is_favorited`, `is_in_shopping_cart`, plus `page` / `limit`.

use axum::{
    extract::{Path, RawQuery, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::api::common::{parse_flag, parse_number, parse_query_pairs, Paginated};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, MaybeUser};
use crate::db::repositories::MembershipKind;
use crate::models::{
    CreateRecipeInput, ListParams, RecipeDetail, RecipeFilter, RecipeSummary, UpdateRecipeInput,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes).post(create_recipe))
        .route("/recipes/download_shopping_cart", get(download_shopping_cart))
        .route(
            "/recipes/{id}",
            get(get_recipe).patch(update_recipe).delete(delete_recipe),
        )
        .route(
            "/recipes/{id}/favorite",
            post(add_favorite).delete(remove_favorite),
        )
        .route(
            "/recipes/{id}/shopping_cart",
            post(add_to_cart).delete(remove_from_cart),
        )
}

/// Turn the raw query string into pagination and filter settings
fn parse_list_query(
    raw: Option<&str>,
    default_page_size: u32,
) -> Result<(ListParams, RecipeFilter), ApiError> {
    let mut page = 1;
    let mut limit = default_page_size;
    let mut filter = RecipeFilter::default();

    for (key, value) in parse_query_pairs(raw) {
        match key.as_str() {
            "page" => page = parse_number("page", &value)?,
            "limit" => limit = parse_number("limit", &value)?,
            "author" => filter.author = Some(parse_number("author", &value)?),
            "tags" => filter.tags.extend(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|slug| !slug.is_empty())
                    .map(str::to_string),
            ),
            "is_favorited" => filter.is_favorited = parse_flag(&value),
            "is_in_shopping_cart" => filter.is_in_shopping_cart = parse_flag(&value),
            _ => {}
        }
    }

    Ok((ListParams::new(page, limit), filter))
}

async fn list_recipes(
    State(state): State<AppState>,
    viewer: MaybeUser,
    RawQuery(raw): RawQuery,
) -> Result<Json<Paginated<RecipeDetail>>, ApiError> {
    let (params, filter) = parse_list_query(raw.as_deref(), state.page_size)?;
    let page = state
        .recipe_service
        .list(&filter, &params, viewer.id())
        .await?;
    Ok(Json(page.into()))
}

async fn get_recipe(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(id): Path<i64>,
) -> Result<Json<RecipeDetail>, ApiError> {
    Ok(Json(state.recipe_service.get(id, viewer.id()).await?))
}

async fn create_recipe(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<CreateRecipeInput>,
) -> Result<(StatusCode, Json<RecipeDetail>), ApiError> {
    let recipe = state.recipe_service.create(&user, body).await?;
    Ok((StatusCode::CREATED, Json(recipe)))
}

async fn update_recipe(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateRecipeInput>,
) -> Result<Json<RecipeDetail>, ApiError> {
    Ok(Json(state.recipe_service.update(&user, id, body).await?))
}

async fn delete_recipe(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.recipe_service.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Favorites and shopping cart
// ============================================================================

async fn add_member(
    state: &AppState,
    kind: MembershipKind,
    user_id: i64,
    recipe_id: i64,
) -> Result<(StatusCode, Json<RecipeSummary>), ApiError> {
    let summary = state
        .membership_service
        .add(kind, user_id, recipe_id)
        .await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

async fn remove_member(
    state: &AppState,
    kind: MembershipKind,
    user_id: i64,
    recipe_id: i64,
) -> Result<StatusCode, ApiError> {
    state
        .membership_service
        .remove(kind, user_id, recipe_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_favorite(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<RecipeSummary>), ApiError> {
    add_member(&state, MembershipKind::Favorite, user.id, id).await
}

async fn remove_favorite(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    remove_member(&state, MembershipKind::Favorite, user.id, id).await
}

async fn add_to_cart(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<RecipeSummary>), ApiError> {
    add_member(&state, MembershipKind::ShoppingCart, user.id, id).await
}

async fn remove_from_cart(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    remove_member(&state, MembershipKind::ShoppingCart, user.id, id).await
}

async fn download_shopping_cart(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let file = state.membership_service.shopping_list(&user).await?;

    let disposition = format!("attachment; filename=\"{}\"", file.filename);
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.content,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_query_defaults() {
        let (params, filter) = parse_list_query(None, 6).unwrap();
        assert_eq!(params, ListParams::new(1, 6));
        assert_eq!(filter, RecipeFilter::default());
    }

    #[test]
    fn test_parse_list_query_filters() {
        let (params, filter) = parse_list_query(
            Some("page=2&limit=3&author=5&tags=lunch&tags=dinner,breakfast&is_favorited=1&is_in_shopping_cart=0"),
            6,
        )
        .unwrap();

        assert_eq!(params, ListParams::new(2, 3));
        assert_eq!(filter.author, Some(5));
        assert_eq!(filter.tags, vec!["lunch", "dinner", "breakfast"]);
        assert!(filter.is_favorited);
        assert!(!filter.is_in_shopping_cart);
    }

    #[test]
    fn test_parse_list_query_rejects_bad_numbers() {
        let err = parse_list_query(Some("author=chef"), 6).unwrap_err();
        assert_eq!(err.error.code, "VALIDATION_ERROR");
    }
}
