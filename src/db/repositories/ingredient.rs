//! Ingredient repository
//!
//! Read access to the ingredient catalog, plus `create` for seeding.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Ingredient;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Ingredient repository trait
#[async_trait]
pub trait IngredientRepository: Send + Sync {
    /// Insert a catalog entry
    async fn create(&self, ingredient: &Ingredient) -> Result<Ingredient>;

    /// Get ingredient by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Ingredient>>;

    /// List ingredients ordered by name, optionally restricted to a
    /// case-insensitive name prefix
    async fn list(&self, name_prefix: Option<&str>) -> Result<Vec<Ingredient>>;
}

/// SQLx-based ingredient repository implementation
pub struct SqlxIngredientRepository {
    pool: DynDatabasePool,
}

impl SqlxIngredientRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn IngredientRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl IngredientRepository for SqlxIngredientRepository {
    async fn create(&self, ingredient: &Ingredient) -> Result<Ingredient> {
        let sql = "INSERT INTO ingredients (name, measurement_unit) VALUES (?, ?)";
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(&ingredient.name)
                .bind(&ingredient.measurement_unit)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create ingredient")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(&ingredient.name)
                .bind(&ingredient.measurement_unit)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create ingredient")?
                .last_insert_id() as i64,
        };

        Ok(Ingredient {
            id,
            ..ingredient.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Ingredient>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_ingredient_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_ingredient_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn list(&self, name_prefix: Option<&str>) -> Result<Vec<Ingredient>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_ingredients_sqlite(self.pool.sqlite()?, name_prefix).await
            }
            DatabaseDriver::Mysql => {
                let pattern = name_prefix.map(like_prefix_pattern);
                list_ingredients_mysql(self.pool.mysql()?, pattern).await
            }
        }
    }
}

/// Build a lowercase `LIKE` pattern matching names that start with `prefix`,
/// with `\` as the escape character.
fn like_prefix_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.to_lowercase().chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn get_ingredient_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Ingredient>> {
    let row = sqlx::query("SELECT id, name, measurement_unit FROM ingredients WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get ingredient")?;

    Ok(row.as_ref().map(row_to_ingredient_sqlite))
}

// SQLite's LIKE only folds ASCII case. The leading ASCII part of the prefix
// narrows the scan in SQL; the full Unicode-aware match runs here.
async fn list_ingredients_sqlite(
    pool: &SqlitePool,
    name_prefix: Option<&str>,
) -> Result<Vec<Ingredient>> {
    let rows = match name_prefix.and_then(ascii_prefix_pattern) {
        Some(pattern) => {
            sqlx::query(
                "SELECT id, name, measurement_unit FROM ingredients \
                 WHERE name LIKE ? ESCAPE '\\' ORDER BY name, measurement_unit",
            )
            .bind(pattern)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query(
                "SELECT id, name, measurement_unit FROM ingredients ORDER BY name, measurement_unit",
            )
            .fetch_all(pool)
            .await
        }
    }
    .context("Failed to list ingredients")?;

    let prefix = name_prefix.map(str::to_lowercase);
    Ok(rows
        .iter()
        .map(row_to_ingredient_sqlite)
        .filter(|ingredient| match &prefix {
            Some(prefix) => ingredient.name.to_lowercase().starts_with(prefix.as_str()),
            None => true,
        })
        .collect())
}

/// `LIKE` pattern for the ASCII head of `prefix`, or `None` when the prefix
/// starts with a non-ASCII character
fn ascii_prefix_pattern(prefix: &str) -> Option<String> {
    let head: String = prefix.chars().take_while(char::is_ascii).collect();
    (!head.is_empty()).then(|| like_prefix_pattern(&head))
}

fn row_to_ingredient_sqlite(row: &sqlx::sqlite::SqliteRow) -> Ingredient {
    Ingredient {
        id: row.get("id"),
        name: row.get("name"),
        measurement_unit: row.get("measurement_unit"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn get_ingredient_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Ingredient>> {
    let row = sqlx::query("SELECT id, name, measurement_unit FROM ingredients WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get ingredient")?;

    Ok(row.as_ref().map(row_to_ingredient_mysql))
}

async fn list_ingredients_mysql(
    pool: &MySqlPool,
    pattern: Option<String>,
) -> Result<Vec<Ingredient>> {
    let rows = match pattern {
        Some(pattern) => sqlx::query(
            r#"
            SELECT id, name, measurement_unit FROM ingredients
            WHERE LOWER(name) LIKE ? ESCAPE '\\'
            ORDER BY name, measurement_unit
            "#,
        )
        .bind(pattern)
        .fetch_all(pool)
        .await,
        None => sqlx::query(
            "SELECT id, name, measurement_unit FROM ingredients ORDER BY name, measurement_unit",
        )
        .fetch_all(pool)
        .await,
    }
    .context("Failed to list ingredients")?;

    Ok(rows.iter().map(row_to_ingredient_mysql).collect())
}

fn row_to_ingredient_mysql(row: &sqlx::mysql::MySqlRow) -> Ingredient {
    Ingredient {
        id: row.get("id"),
        name: row.get("name"),
        measurement_unit: row.get("measurement_unit"),
    }
}
