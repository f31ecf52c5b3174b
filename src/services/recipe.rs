//! Recipe service
//!
//! Owns the recipe aggregate: the `recipes` row, its ordered ingredient lines
//! and its tag set are validated together and written in one transaction.
//!
//! Validation runs in a fixed order and the first failure wins:
//!
//! 1. field checks (name, text, image, cooking time, amounts)
//! 2. name differs from text
//! 3. tags present and distinct
//! 4. ingredients present and distinct
//! 5. every ingredient exists (not found otherwise)
//! 6. every tag exists
//! 7. the author has no other recipe with this name
//!
//! Reads are projected per viewer: author subscription state and the
//! favorite / cart flags depend on who is asking.

use crate::db::repositories::{
    IngredientRepository, MembershipKind, MembershipRepository, RecipeRepository,
    SubscriptionRepository, TagRepository, UserRepository,
};
use crate::models::{
    CreateRecipeInput, ListParams, PagedResult, Recipe, RecipeDetail, RecipeFilter,
    UpdateRecipeInput, User, UserProfile,
};
use crate::services::subscription::viewer_follows;
use anyhow::{anyhow, Context};
use std::collections::HashSet;
use std::sync::Arc;

pub const MAX_NAME_LEN: usize = 200;

/// Error types for recipe service operations
#[derive(Debug, thiserror::Error)]
pub enum RecipeServiceError {
    /// Invalid input, tagged with the offending field
    #[error("{message}")]
    ValidationError {
        field: &'static str,
        message: String,
    },

    #[error("Ingredient not found: {0}")]
    IngredientNotFound(i64),

    #[error("Recipe not found: {0}")]
    NotFound(i64),

    /// Only the author may modify a recipe
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl RecipeServiceError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field,
            message: message.into(),
        }
    }
}

/// Recipe service
pub struct RecipeService {
    recipe_repo: Arc<dyn RecipeRepository>,
    tag_repo: Arc<dyn TagRepository>,
    ingredient_repo: Arc<dyn IngredientRepository>,
    user_repo: Arc<dyn UserRepository>,
    membership_repo: Arc<dyn MembershipRepository>,
    subscription_repo: Arc<dyn SubscriptionRepository>,
}

impl RecipeService {
    pub fn new(
        recipe_repo: Arc<dyn RecipeRepository>,
        tag_repo: Arc<dyn TagRepository>,
        ingredient_repo: Arc<dyn IngredientRepository>,
        user_repo: Arc<dyn UserRepository>,
        membership_repo: Arc<dyn MembershipRepository>,
        subscription_repo: Arc<dyn SubscriptionRepository>,
    ) -> Self {
        Self {
            recipe_repo,
            tag_repo,
            ingredient_repo,
            user_repo,
            membership_repo,
            subscription_repo,
        }
    }

    /// Create a recipe authored by `author`
    ///
    /// Nothing is written unless the whole aggregate validates.
    pub async fn create(
        &self,
        author: &User,
        input: CreateRecipeInput,
    ) -> Result<RecipeDetail, RecipeServiceError> {
        self.validate(author.id, &input, None).await?;

        let recipe = self
            .recipe_repo
            .create(author.id, &input)
            .await
            .context("Failed to create recipe")?;

        tracing::info!(recipe_id = recipe.id, author_id = author.id, "Recipe created");
        self.detail(&recipe, Some(author.id)).await
    }

    /// Update a recipe
    ///
    /// Omitted scalar fields keep their stored values. Tags and ingredients
    /// are required and replace the stored sets.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the recipe does not exist
    /// - `PermissionDenied` if `user` is not the author
    /// - any validation error from [`RecipeService::create`]
    pub async fn update(
        &self,
        user: &User,
        id: i64,
        input: UpdateRecipeInput,
    ) -> Result<RecipeDetail, RecipeServiceError> {
        let existing = self.require_recipe(id).await?;
        if !user.can_edit(existing.author_id) {
            return Err(RecipeServiceError::PermissionDenied(
                "Only the author can edit this recipe".to_string(),
            ));
        }

        let resolved = resolve_update(&existing, input)?;
        self.validate(existing.author_id, &resolved, Some(id)).await?;

        let recipe = self
            .recipe_repo
            .update(id, &resolved)
            .await
            .context("Failed to update recipe")?;

        tracing::info!(recipe_id = id, "Recipe updated");
        self.detail(&recipe, Some(user.id)).await
    }

    /// Delete a recipe together with its lines, tag links and memberships
    pub async fn delete(&self, user: &User, id: i64) -> Result<(), RecipeServiceError> {
        let existing = self.require_recipe(id).await?;
        if !user.can_edit(existing.author_id) {
            return Err(RecipeServiceError::PermissionDenied(
                "Only the author can delete this recipe".to_string(),
            ));
        }

        self.recipe_repo
            .delete(id)
            .await
            .context("Failed to delete recipe")?;

        tracing::info!(recipe_id = id, "Recipe deleted");
        Ok(())
    }

    pub async fn get(
        &self,
        id: i64,
        viewer: Option<i64>,
    ) -> Result<RecipeDetail, RecipeServiceError> {
        let recipe = self.require_recipe(id).await?;
        self.detail(&recipe, viewer).await
    }

    /// Page of recipes, newest first
    pub async fn list(
        &self,
        filter: &RecipeFilter,
        params: &ListParams,
        viewer: Option<i64>,
    ) -> Result<PagedResult<RecipeDetail>, RecipeServiceError> {
        let total = self
            .recipe_repo
            .count(filter, viewer)
            .await
            .context("Failed to count recipes")?;
        let recipes = self
            .recipe_repo
            .list(filter, viewer, params.offset(), params.limit())
            .await
            .context("Failed to list recipes")?;

        let mut items = Vec::with_capacity(recipes.len());
        for recipe in &recipes {
            items.push(self.detail(recipe, viewer).await?);
        }

        Ok(PagedResult::new(items, total, params))
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    async fn require_recipe(&self, id: i64) -> Result<Recipe, RecipeServiceError> {
        self.recipe_repo
            .get_by_id(id)
            .await
            .context("Failed to get recipe")?
            .ok_or(RecipeServiceError::NotFound(id))
    }

    async fn validate(
        &self,
        author_id: i64,
        input: &CreateRecipeInput,
        existing_id: Option<i64>,
    ) -> Result<(), RecipeServiceError> {
        validate_recipe_fields(input)?;

        for line in &input.ingredients {
            if self
                .ingredient_repo
                .get_by_id(line.id)
                .await
                .context("Failed to get ingredient")?
                .is_none()
            {
                return Err(RecipeServiceError::IngredientNotFound(line.id));
            }
        }

        for tag_id in &input.tags {
            if self
                .tag_repo
                .get_by_id(*tag_id)
                .await
                .context("Failed to get tag")?
                .is_none()
            {
                return Err(RecipeServiceError::invalid(
                    "tags",
                    format!("Tag {} does not exist", tag_id),
                ));
            }
        }

        if self
            .recipe_repo
            .name_taken(author_id, &input.name, existing_id)
            .await
            .context("Failed to check recipe name")?
        {
            return Err(RecipeServiceError::invalid(
                "name",
                "You already have a recipe with this name",
            ));
        }

        Ok(())
    }

    async fn detail(
        &self,
        recipe: &Recipe,
        viewer: Option<i64>,
    ) -> Result<RecipeDetail, RecipeServiceError> {
        let author = self
            .user_repo
            .get_by_id(recipe.author_id)
            .await
            .context("Failed to get recipe author")?
            .ok_or_else(|| anyhow!("Author {} of recipe {} is missing", recipe.author_id, recipe.id))?;
        let is_subscribed =
            viewer_follows(self.subscription_repo.as_ref(), viewer, author.id).await?;

        let tags = self
            .tag_repo
            .list_for_recipe(recipe.id)
            .await
            .context("Failed to get recipe tags")?;
        let ingredients = self
            .recipe_repo
            .ingredients(recipe.id)
            .await
            .context("Failed to get recipe ingredients")?;

        let (is_favorited, is_in_shopping_cart) = match viewer {
            Some(viewer_id) => (
                self.membership_repo
                    .contains(MembershipKind::Favorite, viewer_id, recipe.id)
                    .await
                    .context("Failed to check favorites")?,
                self.membership_repo
                    .contains(MembershipKind::ShoppingCart, viewer_id, recipe.id)
                    .await
                    .context("Failed to check shopping cart")?,
            ),
            None => (false, false),
        };

        Ok(RecipeDetail {
            id: recipe.id,
            tags,
            author: UserProfile::new(&author, is_subscribed),
            ingredients,
            is_favorited,
            is_in_shopping_cart,
            name: recipe.name.clone(),
            image: recipe.image.clone(),
            text: recipe.text.clone(),
            cooking_time: recipe.cooking_time,
        })
    }
}

/// Fill omitted scalars from the stored recipe
fn resolve_update(
    existing: &Recipe,
    input: UpdateRecipeInput,
) -> Result<CreateRecipeInput, RecipeServiceError> {
    let tags = input
        .tags
        .ok_or_else(|| RecipeServiceError::invalid("tags", "This field is required"))?;
    let ingredients = input
        .ingredients
        .ok_or_else(|| RecipeServiceError::invalid("ingredients", "This field is required"))?;

    Ok(CreateRecipeInput {
        name: input.name.unwrap_or_else(|| existing.name.clone()),
        text: input.text.unwrap_or_else(|| existing.text.clone()),
        image: input.image.unwrap_or_else(|| existing.image.clone()),
        cooking_time: input.cooking_time.unwrap_or(existing.cooking_time),
        tags,
        ingredients,
    })
}

/// Checks that need no storage access
pub fn validate_recipe_fields(input: &CreateRecipeInput) -> Result<(), RecipeServiceError> {
    if input.name.trim().is_empty() {
        return Err(RecipeServiceError::invalid("name", "Name cannot be empty"));
    }
    if input.name.chars().count() > MAX_NAME_LEN {
        return Err(RecipeServiceError::invalid(
            "name",
            format!("Name cannot exceed {} characters", MAX_NAME_LEN),
        ));
    }
    if input.text.trim().is_empty() {
        return Err(RecipeServiceError::invalid("text", "Text cannot be empty"));
    }
    if input.image.is_empty() {
        return Err(RecipeServiceError::invalid("image", "Image is required"));
    }
    if input.cooking_time < 1 {
        return Err(RecipeServiceError::invalid(
            "cooking_time",
            "Cooking time must be at least 1 minute",
        ));
    }
    if input.ingredients.iter().any(|line| line.amount < 1) {
        return Err(RecipeServiceError::invalid(
            "ingredients",
            "Ingredient amount must be at least 1",
        ));
    }

    if input.name == input.text {
        return Err(RecipeServiceError::invalid(
            "name",
            "Name and text must be different",
        ));
    }

    if input.tags.is_empty() {
        return Err(RecipeServiceError::invalid("tags", "At least one tag is required"));
    }
    if has_duplicates(input.tags.iter().copied()) {
        return Err(RecipeServiceError::invalid("tags", "Tags must not repeat"));
    }

    if input.ingredients.is_empty() {
        return Err(RecipeServiceError::invalid(
            "ingredients",
            "At least one ingredient is required",
        ));
    }
    if has_duplicates(input.ingredients.iter().map(|line| line.id)) {
        return Err(RecipeServiceError::invalid(
            "ingredients",
            "Ingredients must not repeat",
        ));
    }

    Ok(())
}

fn has_duplicates(mut ids: impl Iterator<Item = i64>) -> bool {
    let mut seen = HashSet::new();
    ids.any(|id| !seen.insert(id))
}
