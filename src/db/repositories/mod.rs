//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository owns the queries for one table or relation.

pub mod ingredient;
pub mod membership;
pub mod recipe;
pub mod session;
pub mod subscription;
pub mod tag;
pub mod user;

pub use ingredient::{IngredientRepository, SqlxIngredientRepository};
pub use membership::{MembershipKind, MembershipRepository, SqlxMembershipRepository};
pub use recipe::{RecipeRepository, SqlxRecipeRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use subscription::{SqlxSubscriptionRepository, SubscriptionRepository};
pub use tag::{SqlxTagRepository, TagRepository};
pub use user::{SqlxUserRepository, UserRepository};

/// Whether an insert failed only because the row's unique key already exists
pub(crate) fn is_duplicate_key(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}
