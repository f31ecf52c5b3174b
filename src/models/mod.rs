//! Data models
//!
//! Data structures used throughout the Foodgram backend:
//! - Database entities (User, Session, Ingredient, Tag, Recipe)
//! - Write payloads and per-viewer read projections
//! - Pagination helpers

mod ingredient;
mod pagination;
mod recipe;
mod session;
mod tag;
mod user;

pub use ingredient::{Ingredient, ShoppingListItem};
pub use pagination::{ListParams, PagedResult};
pub use recipe::{
    CreateRecipeInput, IngredientAmount, Recipe, RecipeDetail, RecipeFilter, RecipeIngredient,
    RecipeSummary, UpdateRecipeInput,
};
pub use session::Session;
pub use tag::Tag;
pub use user::{CreateUserInput, SubscriptionProfile, User, UserProfile};
