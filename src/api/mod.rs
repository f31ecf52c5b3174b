//! API layer - HTTP handlers and routing
//!
//! All endpoints live under `/api`:
//! - Users, tokens and subscriptions
//! - Tags and ingredients (read-only catalog)
//! - Recipes, favorites, shopping cart and the shopping list download

pub mod common;
pub mod ingredients;
pub mod middleware;
pub mod recipes;
pub mod subscriptions;
pub mod tags;
pub mod users;


use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware, Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub use middleware::{ApiError, AppState, AuthenticatedUser, MaybeUser};

/// Build the `/api` routes
pub fn build_api_router() -> Router<AppState> {
    Router::new()
        .merge(users::router())
        .merge(subscriptions::router())
        .merge(tags::router())
        .merge(ingredients::router())
        .merge(recipes::router())
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> anyhow::Result<Router> {
    let origin = if cors_origin == "*" {
        AllowOrigin::any()
    } else {
        let value = cors_origin
            .parse::<HeaderValue>()
            .with_context(|| format!("Invalid CORS origin: {}", cors_origin))?;
        AllowOrigin::exact(value)
    };

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Ok(Router::new()
        .nest("/api", build_api_router())
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::resolve_session,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}
