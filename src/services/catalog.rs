//! Catalog service
//!
//! Read-only access to tags and ingredients.

use crate::db::repositories::{IngredientRepository, TagRepository};
use crate::models::{Ingredient, Tag};
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum CatalogServiceError {
    #[error("Tag not found: {0}")]
    TagNotFound(i64),

    #[error("Ingredient not found: {0}")]
    IngredientNotFound(i64),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CatalogService {
    tag_repo: Arc<dyn TagRepository>,
    ingredient_repo: Arc<dyn IngredientRepository>,
}

impl CatalogService {
    pub fn new(
        tag_repo: Arc<dyn TagRepository>,
        ingredient_repo: Arc<dyn IngredientRepository>,
    ) -> Self {
        Self {
            tag_repo,
            ingredient_repo,
        }
    }

    /// All tags ordered by name
    pub async fn list_tags(&self) -> Result<Vec<Tag>, CatalogServiceError> {
        let tags = self.tag_repo.list().await.context("Failed to list tags")?;
        Ok(tags)
    }

    pub async fn get_tag(&self, id: i64) -> Result<Tag, CatalogServiceError> {
        self.tag_repo
            .get_by_id(id)
            .await
            .context("Failed to get tag")?
            .ok_or(CatalogServiceError::TagNotFound(id))
    }

    /// Ingredients ordered by name. A blank `name_prefix` lists everything.
    pub async fn list_ingredients(
        &self,
        name_prefix: Option<&str>,
    ) -> Result<Vec<Ingredient>, CatalogServiceError> {
        let prefix = name_prefix.map(str::trim).filter(|p| !p.is_empty());
        let ingredients = self
            .ingredient_repo
            .list(prefix)
            .await
            .context("Failed to list ingredients")?;
        Ok(ingredients)
    }

    pub async fn get_ingredient(&self, id: i64) -> Result<Ingredient, CatalogServiceError> {
        self.ingredient_repo
            .get_by_id(id)
            .await
            .context("Failed to get ingredient")?
            .ok_or(CatalogServiceError::IngredientNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxIngredientRepository, SqlxTagRepository};
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> CatalogService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let ingredients = SqlxIngredientRepository::boxed(pool.clone());
        for (name, unit) in [("butter", "g"), ("Buttermilk", "ml"), ("milk", "ml")] {
            ingredients.create(&Ingredient::new(name, unit)).await.unwrap();
        }

        CatalogService::new(SqlxTagRepository::boxed(pool), ingredients)
    }

    #[tokio::test]
    async fn test_tags() {
        let service = setup().await;

        let tags = service.list_tags().await.unwrap();
        assert_eq!(tags.len(), 3);

        let first = service.get_tag(tags[0].id).await.unwrap();
        assert_eq!(first, tags[0]);
        assert!(matches!(
            service.get_tag(77).await,
            Err(CatalogServiceError::TagNotFound(77))
        ));
    }

    #[tokio::test]
    async fn test_ingredient_search() {
        let service = setup().await;

        assert_eq!(service.list_ingredients(None).await.unwrap().len(), 3);
        assert_eq!(service.list_ingredients(Some("  ")).await.unwrap().len(), 3);
        assert_eq!(service.list_ingredients(Some("BUTT")).await.unwrap().len(), 2);
        assert!(service.list_ingredients(Some("cheese")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_ingredient() {
        let service = setup().await;
        let milk = service.list_ingredients(Some("milk")).await.unwrap().remove(0);

        assert_eq!(service.get_ingredient(milk.id).await.unwrap().name, "milk");
        assert!(matches!(
            service.get_ingredient(0).await,
            Err(CatalogServiceError::IngredientNotFound(0))
        ));
    }
}
