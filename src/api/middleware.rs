//! API middleware
//!
//! Contains:
//! - Shared application state
//! - The JSON error type and the mapping from service errors
//! - Session token resolution and the user extractors

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;

use crate::config::Config;
use crate::db::repositories::{
    SqlxIngredientRepository, SqlxMembershipRepository, SqlxRecipeRepository,
    SqlxSessionRepository, SqlxSubscriptionRepository, SqlxTagRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::User;
use crate::services::{
    CatalogService, CatalogServiceError, MembershipService, MembershipServiceError,
    RecipeService, RecipeServiceError, SubscriptionService, SubscriptionServiceError,
    UserService, UserServiceError,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub catalog_service: Arc<CatalogService>,
    pub recipe_service: Arc<RecipeService>,
    pub membership_service: Arc<MembershipService>,
    pub subscription_service: Arc<SubscriptionService>,
    /// Page size used when a list request carries no `limit`
    pub page_size: u32,
}

impl AppState {
    /// Wire every repository and service onto one pool
    pub fn new(pool: DynDatabasePool, config: &Config) -> Self {
        let users = SqlxUserRepository::boxed(pool.clone());
        let sessions = SqlxSessionRepository::boxed(pool.clone());
        let tags = SqlxTagRepository::boxed(pool.clone());
        let ingredients = SqlxIngredientRepository::boxed(pool.clone());
        let recipes = SqlxRecipeRepository::boxed(pool.clone());
        let memberships = SqlxMembershipRepository::boxed(pool.clone());
        let subscriptions = SqlxSubscriptionRepository::boxed(pool.clone());

        Self {
            user_service: Arc::new(UserService::new(
                users.clone(),
                sessions,
                subscriptions.clone(),
                config.auth.session_days,
            )),
            catalog_service: Arc::new(CatalogService::new(tags.clone(), ingredients.clone())),
            recipe_service: Arc::new(RecipeService::new(
                recipes.clone(),
                tags,
                ingredients,
                users.clone(),
                memberships.clone(),
                subscriptions.clone(),
            )),
            membership_service: Arc::new(MembershipService::new(recipes.clone(), memberships)),
            subscription_service: Arc::new(SubscriptionService::new(users, subscriptions, recipes)),
            page_size: config.pagination.page_size,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    /// Validation error naming the offending field
    pub fn field_error(field: &str, message: impl Into<String>) -> Self {
        Self::with_details("VALIDATION_ERROR", message, json!({ "field": field }))
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    /// Log the cause and hide it from the client
    pub fn internal(err: anyhow::Error) -> Self {
        tracing::error!(error = ?err, "Request failed");
        Self::new("INTERNAL_ERROR", "Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

// ============================================================================
// Service error mapping
// ============================================================================

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::AuthenticationError(msg) => Self::unauthorized(msg),
            UserServiceError::ValidationError { field, message } => {
                Self::field_error(field, message)
            }
            UserServiceError::UserExists { field, message } => {
                Self::with_details("CONFLICT", message, json!({ "field": field }))
            }
            UserServiceError::NotFound(_) => Self::not_found(err.to_string()),
            UserServiceError::InternalError(e) => Self::internal(e),
        }
    }
}

impl From<CatalogServiceError> for ApiError {
    fn from(err: CatalogServiceError) -> Self {
        match err {
            CatalogServiceError::TagNotFound(_) | CatalogServiceError::IngredientNotFound(_) => {
                Self::not_found(err.to_string())
            }
            CatalogServiceError::InternalError(e) => Self::internal(e),
        }
    }
}

impl From<RecipeServiceError> for ApiError {
    fn from(err: RecipeServiceError) -> Self {
        match err {
            RecipeServiceError::ValidationError { field, message } => {
                Self::field_error(field, message)
            }
            RecipeServiceError::IngredientNotFound(id) => Self::with_details(
                "NOT_FOUND",
                err.to_string(),
                json!({ "field": "ingredients", "id": id }),
            ),
            RecipeServiceError::NotFound(_) => Self::not_found(err.to_string()),
            RecipeServiceError::PermissionDenied(msg) => Self::forbidden(msg),
            RecipeServiceError::InternalError(e) => Self::internal(e),
        }
    }
}

impl From<MembershipServiceError> for ApiError {
    fn from(err: MembershipServiceError) -> Self {
        match err {
            MembershipServiceError::RecipeNotFound(_) => Self::not_found(err.to_string()),
            MembershipServiceError::AlreadyMember(_) => Self::conflict(err.to_string()),
            MembershipServiceError::NotMember(_) | MembershipServiceError::EmptyCart => {
                Self::validation_error(err.to_string())
            }
            MembershipServiceError::InternalError(e) => Self::internal(e),
        }
    }
}

impl From<SubscriptionServiceError> for ApiError {
    fn from(err: SubscriptionServiceError) -> Self {
        match err {
            SubscriptionServiceError::UserNotFound(_) => Self::not_found(err.to_string()),
            SubscriptionServiceError::SelfSubscription
            | SubscriptionServiceError::AlreadySubscribed
            | SubscriptionServiceError::NotSubscribed => Self::validation_error(err.to_string()),
            SubscriptionServiceError::InternalError(e) => Self::internal(e),
        }
    }
}

// ============================================================================
// Authentication
// ============================================================================

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// The requesting user, if any
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl MaybeUser {
    pub fn id(&self) -> Option<i64> {
        self.0.as_ref().map(|u| u.id)
    }
}

/// Extract the session token from `Authorization: Token <t>` or
/// `Authorization: Bearer <t>`
pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value
        .strip_prefix("Token ")
        .or_else(|| value.strip_prefix("Bearer "))?
        .trim();

    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Resolve the session token, if any, into an [`AuthenticatedUser`]
/// request extension. Never rejects; handlers decide whether a user is
/// required through their extractors.
pub async fn resolve_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_session_token(request.headers()) {
        match state.user_service.validate_session(&token).await {
            Ok(Some(user)) => {
                request.extensions_mut().insert(AuthenticatedUser(user));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Session validation failed"),
        }
    }
    next.run(request).await
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication credentials were not provided"))
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(
            parts
                .extensions
                .get::<AuthenticatedUser>()
                .map(|au| au.0.clone()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::MembershipKind;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_extract_token_scheme() {
        assert_eq!(
            extract_session_token(&headers_with("Token abc123")),
            Some("abc123".to_string())
        );
        assert_eq!(
            extract_session_token(&headers_with("Bearer abc123")),
            Some("abc123".to_string())
        );
    }

    #[test]
    fn test_extract_token_rejects_other_schemes() {
        assert!(extract_session_token(&headers_with("Basic dXNlcjpwYXNz")).is_none());
        assert!(extract_session_token(&headers_with("Token ")).is_none());
        assert!(extract_session_token(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::validation_error("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::conflict("x").status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::new("SOMETHING_ELSE", "x").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_field_error_details() {
        let error: ApiError = RecipeServiceError::ValidationError {
            field: "cooking_time",
            message: "too short".to_string(),
        }
        .into();

        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(json["error"]["details"]["field"], "cooking_time");
    }

    #[test]
    fn test_membership_error_mapping() {
        let conflict: ApiError = MembershipServiceError::AlreadyMember(MembershipKind::Favorite).into();
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        let missing: ApiError = MembershipServiceError::NotMember(MembershipKind::ShoppingCart).into();
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_internal_error_hides_cause() {
        let error: ApiError =
            SubscriptionServiceError::InternalError(anyhow::anyhow!("db exploded")).into();
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!error.error.message.contains("exploded"));
    }
}
