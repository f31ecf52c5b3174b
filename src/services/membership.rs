//! Favorites and shopping cart
//!
//! Both relations behave the same way: adding a recipe twice is a conflict,
//! removing one that is not there is a bad request, and a missing recipe is
//! not found in either case.

use crate::db::repositories::{MembershipKind, MembershipRepository, RecipeRepository};
use crate::models::{RecipeSummary, User};
use crate::services::shopping_list::ShoppingListFile;
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum MembershipServiceError {
    #[error("Recipe not found: {0}")]
    RecipeNotFound(i64),

    #[error("Recipe is already in {0}")]
    AlreadyMember(MembershipKind),

    #[error("Recipe is not in {0}")]
    NotMember(MembershipKind),

    #[error("Shopping cart is empty")]
    EmptyCart,

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct MembershipService {
    recipe_repo: Arc<dyn RecipeRepository>,
    membership_repo: Arc<dyn MembershipRepository>,
}

impl MembershipService {
    pub fn new(
        recipe_repo: Arc<dyn RecipeRepository>,
        membership_repo: Arc<dyn MembershipRepository>,
    ) -> Self {
        Self {
            recipe_repo,
            membership_repo,
        }
    }

    /// Put a recipe into the user's favorites or cart
    pub async fn add(
        &self,
        kind: MembershipKind,
        user_id: i64,
        recipe_id: i64,
    ) -> Result<RecipeSummary, MembershipServiceError> {
        let recipe = self
            .recipe_repo
            .get_by_id(recipe_id)
            .await
            .context("Failed to get recipe")?
            .ok_or(MembershipServiceError::RecipeNotFound(recipe_id))?;

        let inserted = self
            .membership_repo
            .add(kind, user_id, recipe_id)
            .await
            .with_context(|| format!("Failed to add recipe to {}", kind))?;
        if !inserted {
            return Err(MembershipServiceError::AlreadyMember(kind));
        }

        Ok(RecipeSummary::from(&recipe))
    }

    pub async fn remove(
        &self,
        kind: MembershipKind,
        user_id: i64,
        recipe_id: i64,
    ) -> Result<(), MembershipServiceError> {
        if self
            .recipe_repo
            .get_by_id(recipe_id)
            .await
            .context("Failed to get recipe")?
            .is_none()
        {
            return Err(MembershipServiceError::RecipeNotFound(recipe_id));
        }

        let removed = self
            .membership_repo
            .remove(kind, user_id, recipe_id)
            .await
            .with_context(|| format!("Failed to remove recipe from {}", kind))?;
        if !removed {
            return Err(MembershipServiceError::NotMember(kind));
        }

        Ok(())
    }

    /// Build the downloadable shopping list for everything in the cart
    pub async fn shopping_list(&self, user: &User) -> Result<ShoppingListFile, MembershipServiceError> {
        let items = self
            .membership_repo
            .shopping_list(user.id)
            .await
            .context("Failed to build shopping list")?;

        // Every recipe has at least one line, so no items means no cart.
        if items.is_empty() {
            return Err(MembershipServiceError::EmptyCart);
        }

        Ok(ShoppingListFile::new(&user.username, &items))
    }
}
