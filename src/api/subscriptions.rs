//! Subscription API endpoints
//!
//! - GET /api/users/subscriptions - Authors the current user follows
//! - POST /api/users/{id}/subscribe - Follow
//! - DELETE /api/users/{id}/subscribe - Unfollow

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::Paginated;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{ListParams, SubscriptionProfile};

#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub recipes_limit: Option<i64>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/subscriptions", get(list_subscriptions))
        .route("/users/{id}/subscribe", post(subscribe).delete(unsubscribe))
}

async fn list_subscriptions(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<SubscriptionQuery>,
) -> Result<Json<Paginated<SubscriptionProfile>>, ApiError> {
    let params = ListParams::new(
        query.page.unwrap_or(1),
        query.limit.unwrap_or(state.page_size),
    );
    let page = state
        .subscription_service
        .list_subscriptions(user.id, &params, query.recipes_limit)
        .await?;
    Ok(Json(page.into()))
}

async fn subscribe(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(author_id): Path<i64>,
    Query(query): Query<SubscriptionQuery>,
) -> Result<(StatusCode, Json<SubscriptionProfile>), ApiError> {
    let profile = state
        .subscription_service
        .subscribe(user.id, author_id, query.recipes_limit)
        .await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

async fn unsubscribe(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(author_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state
        .subscription_service
        .unsubscribe(user.id, author_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
