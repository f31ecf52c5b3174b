//! User model
//!
//! Registered users, their public profile projection and the
//! subscription-list projection (profile plus recipes).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RecipeSummary;

/// User entity representing a registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Email address, used as the login identity (unique)
    pub email: String,
    /// Username (unique)
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Registration timestamp
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new User with an already hashed password.
    ///
    /// Use `services::password::hash_password()` to produce `password_hash`.
    pub fn new(
        email: String,
        username: String,
        first_name: String,
        last_name: String,
        password_hash: String,
    ) -> Self {
        Self {
            id: 0, // Will be set by the database
            email,
            username,
            first_name,
            last_name,
            password_hash,
            created_at: Utc::now(),
        }
    }

    /// Only the author may modify a recipe.
    pub fn can_edit(&self, author_id: i64) -> bool {
        self.id == author_id
    }
}

/// Public view of a user, as seen by a particular viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// Whether the viewer follows this user
    pub is_subscribed: bool,
}

impl UserProfile {
    pub fn new(user: &User, is_subscribed: bool) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            is_subscribed,
        }
    }
}

/// A followed author together with (a prefix of) their recipes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionProfile {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub recipes: Vec<RecipeSummary>,
    /// Total number of recipes, independent of `recipes_limit`
    pub recipes_count: i64,
}

/// Input for creating a new user (before password hashing)
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserInput {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// Plaintext password (will be hashed)
    pub password: String,
}

impl CreateUserInput {
    pub fn new(
        email: impl Into<String>,
        username: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            username: username.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            password: password.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        let mut user = User::new(
            "cook@example.com".to_string(),
            "cook".to_string(),
            "Julia".to_string(),
            "Child".to_string(),
            "$argon2id$hash".to_string(),
        );
        user.id = 7;
        user
    }

    #[test]
    fn test_user_new_has_unassigned_id() {
        let user = User::new(
            "a@b.c".to_string(),
            "a".to_string(),
            "A".to_string(),
            "B".to_string(),
            "hash".to_string(),
        );
        assert_eq!(user.id, 0);
    }

    #[test]
    fn test_can_edit_only_own_content() {
        let user = sample_user();
        assert!(user.can_edit(7));
        assert!(!user.can_edit(8));
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let json = serde_json::to_value(sample_user()).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["username"], "cook");
    }

    #[test]
    fn test_subscription_profile_flattens_user_fields() {
        let profile = SubscriptionProfile {
            profile: UserProfile::new(&sample_user(), true),
            recipes: vec![],
            recipes_count: 3,
        };

        let json = serde_json::to_value(profile).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["is_subscribed"], true);
        assert_eq!(json["recipes_count"], 3);
    }
}
