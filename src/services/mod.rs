//! Services layer - Business logic
//!
//! Services sit between the HTTP handlers and the repositories. They are
//! responsible for:
//! - Validating input and enforcing ownership
//! - Coordinating several repositories for one operation
//! - Building the per-viewer read projections

pub mod catalog;
pub mod membership;
pub mod password;
pub mod recipe;
pub mod shopping_list;
pub mod subscription;
pub mod user;

pub use catalog::{CatalogService, CatalogServiceError};
pub use membership::{MembershipService, MembershipServiceError};
pub use password::{hash_password, verify_password};
pub use recipe::{validate_recipe_fields, RecipeService, RecipeServiceError};
pub use shopping_list::{render_shopping_list, shopping_list_filename, ShoppingListFile};
pub use subscription::{SubscriptionService, SubscriptionServiceError};
pub use user::{UserService, UserServiceError};
