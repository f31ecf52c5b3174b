//! User service
//!
//! Accounts and sessions:
//! - Registration with field validation
//! - Token login / logout
//! - Session validation (expired sessions are removed on sight)
//! - Password change
//! - Public profiles, with `is_subscribed` computed for the viewer

use crate::db::repositories::{SessionRepository, SubscriptionRepository, UserRepository};
use crate::models::{CreateUserInput, ListParams, PagedResult, Session, User, UserProfile};
use crate::services::password::{hash_password, verify_password};
use crate::services::subscription::viewer_follows;
use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

const MAX_USERNAME_LEN: usize = 150;

/// Reserved because `/users/me` addresses the current user.
const RESERVED_USERNAME: &str = "me";

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\w.@+-]+$").expect("username pattern is valid")
});

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Bad credentials or unusable session
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// Invalid input, tagged with the offending field
    #[error("{message}")]
    ValidationError {
        field: &'static str,
        message: String,
    },

    /// Username or email already taken
    #[error("{message}")]
    UserExists {
        field: &'static str,
        message: String,
    },

    #[error("User not found: {0}")]
    NotFound(i64),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl UserServiceError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field,
            message: message.into(),
        }
    }
}

/// User service for managing accounts and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    subscription_repo: Arc<dyn SubscriptionRepository>,
    session_expiration_days: i64,
}

impl UserService {
    /// Create a user service; sessions live for `session_expiration_days`
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        subscription_repo: Arc<dyn SubscriptionRepository>,
        session_expiration_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            subscription_repo,
            session_expiration_days,
        }
    }

    /// Register a new account
    ///
    /// # Errors
    ///
    /// - `ValidationError` for malformed fields
    /// - `UserExists` if the username or email is taken
    pub async fn register(&self, input: CreateUserInput) -> Result<User, UserServiceError> {
        validate_register_input(&input)?;

        if self
            .user_repo
            .get_by_username(&input.username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::UserExists {
                field: "username",
                message: format!("Username '{}' is already taken", input.username),
            });
        }

        if self
            .user_repo
            .get_by_email(&input.email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::UserExists {
                field: "email",
                message: format!("Email '{}' is already registered", input.email),
            });
        }

        let password_hash = hash_password(&input.password)?;
        let user = User::new(
            input.email,
            input.username,
            input.first_name,
            input.last_name,
            password_hash,
        );

        let created = self
            .user_repo
            .create(&user)
            .await
            .context("Failed to create user")?;

        tracing::info!(user_id = created.id, username = %created.username, "User registered");
        Ok(created)
    }

    /// Exchange email and password for a new session
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, UserServiceError> {
        let invalid =
            || UserServiceError::AuthenticationError("Invalid email or password".to_string());

        let user = self
            .user_repo
            .get_by_email(email)
            .await
            .context("Failed to look up user")?
            .ok_or_else(invalid)?;

        if !verify_password(password, &user.password_hash)? {
            tracing::debug!(user_id = user.id, "Login rejected: wrong password");
            return Err(invalid());
        }

        let session = Session::issue(user.id, self.session_expiration_days);
        let session = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;

        Ok(session)
    }

    /// Invalidate a session token. Unknown tokens are not an error.
    pub async fn logout(&self, token: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(token)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a session token to its user
    ///
    /// Returns `None` for unknown or expired tokens; expired ones are deleted.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_token(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            self.session_repo
                .delete(token)
                .await
                .context("Failed to delete expired session")?;
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(user)
    }

    /// Change the password of `user` after checking the current one
    pub async fn set_password(
        &self,
        user: &User,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), UserServiceError> {
        if new_password.is_empty() {
            return Err(UserServiceError::invalid(
                "new_password",
                "Password cannot be empty",
            ));
        }

        if !verify_password(current_password, &user.password_hash)? {
            return Err(UserServiceError::invalid(
                "current_password",
                "Current password is incorrect",
            ));
        }

        let hash = hash_password(new_password)?;
        self.user_repo
            .update_password(user.id, &hash)
            .await
            .context("Failed to update password")?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        let user = self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?;
        Ok(user)
    }

    /// Public profile of user `id` as seen by `viewer`
    pub async fn get_user(
        &self,
        id: i64,
        viewer: Option<i64>,
    ) -> Result<UserProfile, UserServiceError> {
        let user = self
            .get_by_id(id)
            .await?
            .ok_or(UserServiceError::NotFound(id))?;
        self.profile(&user, viewer).await
    }

    /// Page of public profiles ordered by id
    pub async fn list_users(
        &self,
        params: &ListParams,
        viewer: Option<i64>,
    ) -> Result<PagedResult<UserProfile>, UserServiceError> {
        let total = self.user_repo.count().await.context("Failed to count users")?;
        let users = self
            .user_repo
            .list(params.offset(), params.limit())
            .await
            .context("Failed to list users")?;

        let mut profiles = Vec::with_capacity(users.len());
        for user in &users {
            profiles.push(self.profile(user, viewer).await?);
        }

        Ok(PagedResult::new(profiles, total, params))
    }

    /// Project a user for `viewer`
    pub async fn profile(
        &self,
        user: &User,
        viewer: Option<i64>,
    ) -> Result<UserProfile, UserServiceError> {
        let is_subscribed = viewer_follows(self.subscription_repo.as_ref(), viewer, user.id).await?;
        Ok(UserProfile::new(user, is_subscribed))
    }

    /// Delete all expired sessions, returning how many were removed
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        let count = self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?;
        Ok(count)
    }
}

// ============================================================================
// Validation
// ============================================================================

fn validate_register_input(input: &CreateUserInput) -> Result<(), UserServiceError> {
    if !input.email.contains('@') {
        return Err(UserServiceError::invalid("email", "Invalid email format"));
    }

    validate_username(&input.username)?;
    validate_person_name("first_name", &input.first_name)?;
    validate_person_name("last_name", &input.last_name)?;

    if input.password.is_empty() {
        return Err(UserServiceError::invalid("password", "Password cannot be empty"));
    }

    Ok(())
}

fn validate_username(username: &str) -> Result<(), UserServiceError> {
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(UserServiceError::invalid(
            "username",
            format!("Username cannot exceed {} characters", MAX_USERNAME_LEN),
        ));
    }
    if !USERNAME_RE.is_match(username) {
        return Err(UserServiceError::invalid(
            "username",
            "Username may only contain letters, digits and . @ + - _",
        ));
    }
    if username == RESERVED_USERNAME {
        return Err(UserServiceError::invalid(
            "username",
            format!("Username '{}' is reserved", RESERVED_USERNAME),
        ));
    }
    Ok(())
}

fn validate_person_name(field: &'static str, value: &str) -> Result<(), UserServiceError> {
    if value.trim().is_empty() {
        return Err(UserServiceError::invalid(field, "Name cannot be empty"));
    }
    if value.chars().any(|c| c.is_numeric()) {
        return Err(UserServiceError::invalid(field, "Name cannot contain digits"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxSessionRepository, SqlxSubscriptionRepository, SqlxUserRepository,
    };
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use chrono::{Duration, Utc};
    use proptest::prelude::*;

    async fn setup_test_service() -> (DynDatabasePool, UserService) {
        let pool = create_test_pool()
            .await
            .expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let service = UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
            SqlxSubscriptionRepository::boxed(pool.clone()),
            7,
        );
        (pool, service)
    }

    fn input(username: &str) -> CreateUserInput {
        CreateUserInput::new(
            format!("{}@example.com", username),
            username,
            "Anna",
            "Smith",
            "password123",
        )
    }

    fn field_of(err: UserServiceError) -> &'static str {
        match err {
            UserServiceError::ValidationError { field, .. } => field,
            UserServiceError::UserExists { field, .. } => field,
            other => panic!("unexpected error: {other:?}"),
        }
    }

    // ========================================================================
    // Registration
    // ========================================================================

    #[tokio::test]
    async fn test_register_stores_hashed_password() {
        let (_pool, service) = setup_test_service().await;

        let user = service.register(input("anna")).await.expect("register");
        assert!(user.id > 0);
        assert_eq!(user.username, "anna");
        assert!(user.password_hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_register_duplicates_conflict() {
        let (_pool, service) = setup_test_service().await;
        service.register(input("anna")).await.unwrap();

        let mut same_name = input("anna");
        same_name.email = "other@example.com".into();
        let err = service.register(same_name).await.unwrap_err();
        assert!(matches!(err, UserServiceError::UserExists { field: "username", .. }));

        let mut same_email = input("bob");
        same_email.email = "anna@example.com".into();
        let err = service.register(same_email).await.unwrap_err();
        assert!(matches!(err, UserServiceError::UserExists { field: "email", .. }));
    }

    #[tokio::test]
    async fn test_register_field_rules() {
        let (_pool, service) = setup_test_service().await;

        let err = service.register(input("me")).await.unwrap_err();
        assert_eq!(field_of(err), "username");

        let err = service.register(input("bad name")).await.unwrap_err();
        assert_eq!(field_of(err), "username");

        let mut digits = input("anna");
        digits.last_name = "Smith2".into();
        assert_eq!(field_of(service.register(digits).await.unwrap_err()), "last_name");

        let mut blank = input("anna");
        blank.first_name = "  ".into();
        assert_eq!(field_of(service.register(blank).await.unwrap_err()), "first_name");

        let mut no_at = input("anna");
        no_at.email = "anna.example.com".into();
        assert_eq!(field_of(service.register(no_at).await.unwrap_err()), "email");

        let mut no_password = input("anna");
        no_password.password = String::new();
        assert_eq!(field_of(service.register(no_password).await.unwrap_err()), "password");
    }

    #[test]
    fn test_username_length_limit() {
        assert!(validate_username(&"a".repeat(150)).is_ok());
        assert!(validate_username(&"a".repeat(151)).is_err());
        assert!(validate_username("chef.anna+1@home-kitchen").is_ok());
    }

    proptest! {
        #[test]
        fn prop_username_charset(name in "[A-Za-z0-9_.@+-]{1,150}") {
            prop_assume!(name != "me");
            prop_assert!(validate_username(&name).is_ok());
        }

        #[test]
        fn prop_username_rejects_other_chars(
            prefix in "[a-z]{0,5}",
            bad in "[ /#!?%&*()]",
            suffix in "[a-z]{0,5}",
        ) {
            let name = format!("{}{}{}", prefix, bad, suffix);
            prop_assert!(validate_username(&name).is_err());
        }
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    #[tokio::test]
    async fn test_login_and_validate_session() {
        let (_pool, service) = setup_test_service().await;
        let user = service.register(input("anna")).await.unwrap();

        let session = service
            .login("anna@example.com", "password123")
            .await
            .expect("login");
        assert_eq!(session.user_id, user.id);

        let resolved = service.validate_session(&session.token).await.unwrap();
        assert_eq!(resolved.map(|u| u.id), Some(user.id));
    }

    #[tokio::test]
    async fn test_login_bad_credentials() {
        let (_pool, service) = setup_test_service().await;
        service.register(input("anna")).await.unwrap();

        let wrong_password = service.login("anna@example.com", "nope").await;
        assert!(matches!(wrong_password, Err(UserServiceError::AuthenticationError(_))));

        let unknown = service.login("ghost@example.com", "password123").await;
        assert!(matches!(unknown, Err(UserServiceError::AuthenticationError(_))));
    }

    #[tokio::test]
    async fn test_logout_invalidates_session() {
        let (_pool, service) = setup_test_service().await;
        service.register(input("anna")).await.unwrap();
        let session = service.login("anna@example.com", "password123").await.unwrap();

        service.logout(&session.token).await.unwrap();
        assert!(service.validate_session(&session.token).await.unwrap().is_none());

        // A second logout with the same token is harmless.
        service.logout(&session.token).await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_session_is_removed() {
        let (pool, service) = setup_test_service().await;
        let user = service.register(input("anna")).await.unwrap();

        let sessions = SqlxSessionRepository::new(pool);
        let mut stale = Session::issue(user.id, 1);
        stale.expires_at = Utc::now() - Duration::hours(1);
        sessions.create(&stale).await.unwrap();

        assert!(service.validate_session(&stale.token).await.unwrap().is_none());
        assert!(sessions.get_by_token(&stale.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cleanup_expired_sessions() {
        let (pool, service) = setup_test_service().await;
        let user = service.register(input("anna")).await.unwrap();
        service.login("anna@example.com", "password123").await.unwrap();

        let sessions = SqlxSessionRepository::new(pool);
        for _ in 0..2 {
            let mut stale = Session::issue(user.id, 1);
            stale.expires_at = Utc::now() - Duration::days(2);
            sessions.create(&stale).await.unwrap();
        }

        assert_eq!(service.cleanup_expired_sessions().await.unwrap(), 2);
        assert_eq!(service.cleanup_expired_sessions().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_set_password() {
        let (_pool, service) = setup_test_service().await;
        let user = service.register(input("anna")).await.unwrap();

        let err = service
            .set_password(&user, "wrong", "newpass")
            .await
            .unwrap_err();
        assert_eq!(field_of(err), "current_password");

        service
            .set_password(&user, "password123", "newpass")
            .await
            .expect("set_password");

        assert!(service.login("anna@example.com", "password123").await.is_err());
        assert!(service.login("anna@example.com", "newpass").await.is_ok());
    }

    // ========================================================================
    // Profiles
    // ========================================================================

    #[tokio::test]
    async fn test_profiles_reflect_viewer() {
        let (pool, service) = setup_test_service().await;
        let anna = service.register(input("anna")).await.unwrap();
        let bob = service.register(input("bob")).await.unwrap();

        SqlxSubscriptionRepository::new(pool)
            .add(bob.id, anna.id)
            .await
            .unwrap();

        assert!(service.get_user(anna.id, Some(bob.id)).await.unwrap().is_subscribed);
        assert!(!service.get_user(anna.id, None).await.unwrap().is_subscribed);
        assert!(!service.get_user(anna.id, Some(anna.id)).await.unwrap().is_subscribed);
        assert!(!service.get_user(bob.id, Some(anna.id)).await.unwrap().is_subscribed);

        assert!(matches!(
            service.get_user(999, None).await,
            Err(UserServiceError::NotFound(999))
        ));
    }

    #[tokio::test]
    async fn test_list_users_paginates() {
        let (_pool, service) = setup_test_service().await;
        for name in ["u1", "u2", "u3"] {
            service.register(input(name)).await.unwrap();
        }

        let page = service
            .list_users(&ListParams::new(2, 2), None)
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages(), 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].username, "u3");
    }
}
