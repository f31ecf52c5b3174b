//! Recipe model
//!
//! A recipe is stored as one `recipes` row plus its ordered ingredient lines
//! and its tag set. The read projections (`RecipeDetail`, `RecipeSummary`)
//! are assembled per viewer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Tag, UserProfile};

/// Recipe entity (the `recipes` row only)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recipe {
    pub id: i64,
    pub author_id: i64,
    pub name: String,
    /// Free-text description / instructions
    pub text: String,
    /// Opaque image payload as sent by the client (usually a data URL)
    pub image: String,
    /// Minutes, at least 1
    pub cooking_time: i32,
    pub pub_date: DateTime<Utc>,
}

/// One ingredient line of a write payload: ingredient id plus amount.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngredientAmount {
    /// Ingredient id
    pub id: i64,
    pub amount: i32,
}

impl IngredientAmount {
    pub fn new(id: i64, amount: i32) -> Self {
        Self { id, amount }
    }
}

/// One ingredient line of a recipe as read back, with the ingredient's
/// name and unit resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecipeIngredient {
    /// Ingredient id
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

/// Full write payload for a recipe.
///
/// Also the shape an update is resolved to once missing scalar fields
/// have been filled from the stored recipe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRecipeInput {
    pub name: String,
    pub text: String,
    pub image: String,
    pub cooking_time: i32,
    /// Tag ids; must be non-empty and free of duplicates
    pub tags: Vec<i64>,
    /// Ingredient lines in display order
    pub ingredients: Vec<IngredientAmount>,
}

/// Partial update payload. Scalars may be omitted; tags and ingredients are
/// required and replace the stored sets wholesale.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRecipeInput {
    pub name: Option<String>,
    pub text: Option<String>,
    pub image: Option<String>,
    pub cooking_time: Option<i32>,
    pub tags: Option<Vec<i64>>,
    pub ingredients: Option<Vec<IngredientAmount>>,
}

/// Filters for listing recipes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    /// Only recipes by this author
    pub author: Option<i64>,
    /// Recipes carrying any of these tag slugs
    pub tags: Vec<String>,
    /// Only recipes the viewer has favorited
    pub is_favorited: bool,
    /// Only recipes in the viewer's shopping cart
    pub is_in_shopping_cart: bool,
}

/// Recipe as returned to a viewer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeDetail {
    pub id: i64,
    pub tags: Vec<Tag>,
    pub author: UserProfile,
    pub ingredients: Vec<RecipeIngredient>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

/// Short projection returned by favorite / cart endpoints and embedded in
/// subscription listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecipeSummary {
    pub id: i64,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

impl From<&Recipe> for RecipeSummary {
    fn from(recipe: &Recipe) -> Self {
        Self {
            id: recipe.id,
            name: recipe.name.clone(),
            image: recipe.image.clone(),
            cooking_time: recipe.cooking_time,
        }
    }
}
