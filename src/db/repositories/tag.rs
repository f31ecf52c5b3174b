//! Tag repository
//!
//! Database operations for tags and their recipe links.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Tag;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

/// Tag repository trait
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Get tag by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>>;

    /// List all tags ordered by name
    async fn list(&self) -> Result<Vec<Tag>>;

    /// Tags attached to a recipe, ordered by name
    async fn list_for_recipe(&self, recipe_id: i64) -> Result<Vec<Tag>>;
}

/// SQLx-based tag repository implementation
pub struct SqlxTagRepository {
    pool: DynDatabasePool,
}

impl SqlxTagRepository {
    /// Create a new SQLx tag repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TagRepository> {
        Arc::new(Self::new(pool))
    }
}

const GET_TAG: &str = "SELECT id, name, color, slug FROM tags WHERE id = ?";
const LIST_TAGS: &str = "SELECT id, name, color, slug FROM tags ORDER BY name";
const LIST_RECIPE_TAGS: &str = r#"
    SELECT t.id, t.name, t.color, t.slug
    FROM tags t
    INNER JOIN recipe_tags rt ON rt.tag_id = t.id
    WHERE rt.recipe_id = ?
    ORDER BY t.name
"#;

// Row mapping shared by the SQLite and MySQL row types.
macro_rules! row_to_tag {
    ($row:expr) => {
        Tag {
            id: $row.get("id"),
            name: $row.get("name"),
            color: $row.get("color"),
            slug: $row.get("slug"),
        }
    };
}

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>> {
        let tag = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(GET_TAG)
                .bind(id)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get tag")?
                .map(|row| row_to_tag!(row)),
            DatabaseDriver::Mysql => sqlx::query(GET_TAG)
                .bind(id)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get tag")?
                .map(|row| row_to_tag!(row)),
        };
        Ok(tag)
    }

    async fn list(&self) -> Result<Vec<Tag>> {
        let tags = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(LIST_TAGS)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list tags")?
                .iter()
                .map(|row| row_to_tag!(row))
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(LIST_TAGS)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to list tags")?
                .iter()
                .map(|row| row_to_tag!(row))
                .collect(),
        };
        Ok(tags)
    }

    async fn list_for_recipe(&self, recipe_id: i64) -> Result<Vec<Tag>> {
        let tags = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(LIST_RECIPE_TAGS)
                .bind(recipe_id)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list recipe tags")?
                .iter()
                .map(|row| row_to_tag!(row))
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(LIST_RECIPE_TAGS)
                .bind(recipe_id)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to list recipe tags")?
                .iter()
                .map(|row| row_to_tag!(row))
                .collect(),
        };
        Ok(tags)
    }
}
