//! User and token API endpoints
//!
//! - POST /api/users - Register
//! - GET /api/users - List profiles
//! - GET /api/users/me - Current user
//! - GET /api/users/{id} - One profile
//! - POST /api/users/set_password - Change password
//! - POST /api/auth/token/login - Obtain a token
//! - POST /api/auth/token/logout - Revoke the current token

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{Paginated, PaginationQuery};
use crate::api::middleware::{
    extract_session_token, ApiError, AppState, AuthenticatedUser, MaybeUser,
};
use crate::models::{CreateUserInput, User, UserProfile};

/// Response for a newly registered user
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub auth_token: String,
}

#[derive(Debug, Deserialize)]
pub struct SetPasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Build the users and token router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", post(register).get(list_users))
        .route("/users/me", get(me))
        .route("/users/{id}", get(get_user))
        .route("/users/set_password", post(set_password))
        .route("/auth/token/login", post(login))
        .route("/auth/token/logout", post(logout))
}

/// POST /api/users
async fn register(
    State(state): State<AppState>,
    Json(body): Json<CreateUserInput>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let user = state.user_service.register(body).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// GET /api/users
async fn list_users(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Paginated<UserProfile>>, ApiError> {
    let params = query.to_params(state.page_size);
    let page = state.user_service.list_users(&params, viewer.id()).await?;
    Ok(Json(page.into()))
}

/// GET /api/users/{id}
async fn get_user(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(id): Path<i64>,
) -> Result<Json<UserProfile>, ApiError> {
    let profile = state.user_service.get_user(id, viewer.id()).await?;
    Ok(Json(profile))
}

/// GET /api/users/me
async fn me(AuthenticatedUser(user): AuthenticatedUser) -> Json<UserProfile> {
    Json(UserProfile::new(&user, false))
}

/// POST /api/users/set_password
async fn set_password(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<SetPasswordRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .user_service
        .set_password(&user, &body.current_password, &body.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/auth/token/login
async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let session = state.user_service.login(&body.email, &body.password).await?;
    tracing::info!(user_id = session.user_id, "User logged in");
    Ok(Json(TokenResponse {
        auth_token: session.token,
    }))
}

/// POST /api/auth/token/logout
async fn logout(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    if let Some(token) = extract_session_token(&headers) {
        state.user_service.logout(&token).await?;
    }
    tracing::info!(user_id = user.id, "User logged out");
    Ok(StatusCode::NO_CONTENT)
}
