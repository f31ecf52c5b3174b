//! Recipe repository
//!
//! Database operations for recipes and their owned rows.
//!
//! A recipe is written as one unit: the `recipes` row, its ordered
//! `recipe_ingredients` lines and its `recipe_tags` links go through a single
//! transaction, both on create and on update (where lines and tags are
//! deleted and re-inserted wholesale). Readers therefore see either the old
//! or the new set of lines, never a mix.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{CreateRecipeInput, Recipe, RecipeFilter, RecipeIngredient};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySql, MySqlConnection, MySqlPool, Row, Sqlite, SqliteConnection, SqlitePool};
use std::sync::Arc;

/// Recipe repository trait
#[async_trait]
pub trait RecipeRepository: Send + Sync {
    /// Insert a recipe with its ingredient lines and tags in one transaction
    async fn create(&self, author_id: i64, input: &CreateRecipeInput) -> Result<Recipe>;

    /// Overwrite scalars and replace lines and tags in one transaction
    async fn update(&self, id: i64, input: &CreateRecipeInput) -> Result<Recipe>;

    /// Delete a recipe; join rows cascade. Returns whether it existed.
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Get recipe by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Recipe>>;

    /// Whether `author_id` has a recipe called `name` other than `exclude_id`
    async fn name_taken(&self, author_id: i64, name: &str, exclude_id: Option<i64>)
        -> Result<bool>;

    /// Page of recipes matching `filter`, newest first
    async fn list(
        &self,
        filter: &RecipeFilter,
        viewer: Option<i64>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Recipe>>;

    /// Number of recipes matching `filter`
    async fn count(&self, filter: &RecipeFilter, viewer: Option<i64>) -> Result<i64>;

    /// An author's recipes, newest first, optionally truncated
    async fn list_by_author(&self, author_id: i64, limit: Option<i64>) -> Result<Vec<Recipe>>;

    /// Number of recipes by an author
    async fn count_by_author(&self, author_id: i64) -> Result<i64>;

    /// Ingredient lines of a recipe, in insertion order
    async fn ingredients(&self, recipe_id: i64) -> Result<Vec<RecipeIngredient>>;
}

/// SQLx-based recipe repository implementation
pub struct SqlxRecipeRepository {
    pool: DynDatabasePool,
}

impl SqlxRecipeRepository {
    /// Create a new SQLx recipe repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn RecipeRepository> {
        Arc::new(Self::new(pool))
    }
}

const RECIPE_COLUMNS: &str =
    "r.id, r.author_id, r.name, r.text, r.image, r.cooking_time, r.pub_date";

const INSERT_RECIPE: &str = r#"
    INSERT INTO recipes (author_id, name, text, image, cooking_time, pub_date)
    VALUES (?, ?, ?, ?, ?, ?)
"#;
const UPDATE_RECIPE: &str =
    "UPDATE recipes SET name = ?, text = ?, image = ?, cooking_time = ? WHERE id = ?";
const DELETE_LINES: &str = "DELETE FROM recipe_ingredients WHERE recipe_id = ?";
const DELETE_TAG_LINKS: &str = "DELETE FROM recipe_tags WHERE recipe_id = ?";
const INSERT_LINE: &str =
    "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) VALUES (?, ?, ?)";
const INSERT_TAG_LINK: &str = "INSERT INTO recipe_tags (recipe_id, tag_id) VALUES (?, ?)";
// Ids start at 1, so 0 never excludes a real row.
const NAME_TAKEN: &str =
    "SELECT COUNT(*) FROM recipes WHERE author_id = ? AND name = ? AND id <> ?";
const LIST_LINES: &str = r#"
    SELECT i.id, i.name, i.measurement_unit, ri.amount
    FROM recipe_ingredients ri
    INNER JOIN ingredients i ON i.id = ri.ingredient_id
    WHERE ri.recipe_id = ?
    ORDER BY ri.id
"#;

/// Bind value for the dynamically built list filter
#[derive(Debug, Clone, PartialEq)]
enum FilterArg {
    Int(i64),
    Text(String),
}

/// Build the `WHERE` clause for a recipe listing.
///
/// Viewer-relative filters match nothing for anonymous viewers.
fn build_filter(filter: &RecipeFilter, viewer: Option<i64>) -> (String, Vec<FilterArg>) {
    let mut conditions: Vec<String> = Vec::new();
    let mut args = Vec::new();

    if let Some(author) = filter.author {
        conditions.push("r.author_id = ?".to_string());
        args.push(FilterArg::Int(author));
    }

    if !filter.tags.is_empty() {
        let placeholders = vec!["?"; filter.tags.len()].join(", ");
        conditions.push(format!(
            "EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id \
             WHERE rt.recipe_id = r.id AND t.slug IN ({}))",
            placeholders
        ));
        args.extend(filter.tags.iter().cloned().map(FilterArg::Text));
    }

    for (enabled, table) in [
        (filter.is_favorited, "favorites"),
        (filter.is_in_shopping_cart, "shopping_carts"),
    ] {
        if !enabled {
            continue;
        }
        match viewer {
            Some(viewer) => {
                conditions.push(format!(
                    "EXISTS (SELECT 1 FROM {} m WHERE m.recipe_id = r.id AND m.user_id = ?)",
                    table
                ));
                args.push(FilterArg::Int(viewer));
            }
            None => conditions.push("1 = 0".to_string()),
        }
    }

    let clause = if conditions.is_empty() {
        "1 = 1".to_string()
    } else {
        conditions.join(" AND ")
    };
    (clause, args)
}

macro_rules! bind_filter_args {
    ($query:expr, $args:expr) => {{
        let mut query = $query;
        for arg in $args {
            query = match arg {
                FilterArg::Int(value) => query.bind(*value),
                FilterArg::Text(value) => query.bind(value.as_str()),
            };
        }
        query
    }};
}

#[async_trait]
impl RecipeRepository for SqlxRecipeRepository {
    async fn create(&self, author_id: i64, input: &CreateRecipeInput) -> Result<Recipe> {
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_recipe_sqlite(self.pool.sqlite()?, author_id, input).await?
            }
            DatabaseDriver::Mysql => {
                create_recipe_mysql(self.pool.mysql()?, author_id, input).await?
            }
        };

        self.get_by_id(id)
            .await?
            .context("Recipe vanished right after insert")
    }

    async fn update(&self, id: i64, input: &CreateRecipeInput) -> Result<Recipe> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_recipe_sqlite(self.pool.sqlite()?, id, input).await?,
            DatabaseDriver::Mysql => update_recipe_mysql(self.pool.mysql()?, id, input).await?,
        }

        self.get_by_id(id)
            .await?
            .context("Recipe vanished right after update")
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM recipes WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete recipe")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete recipe")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Recipe>> {
        let sql = format!("SELECT {} FROM recipes r WHERE r.id = ?", RECIPE_COLUMNS);
        let recipe = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get recipe")?
                .as_ref()
                .map(row_to_recipe_sqlite),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get recipe")?
                .as_ref()
                .map(row_to_recipe_mysql),
        };
        Ok(recipe)
    }

    async fn name_taken(
        &self,
        author_id: i64,
        name: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool> {
        let exclude_id = exclude_id.unwrap_or(0);
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar(NAME_TAKEN)
                .bind(author_id)
                .bind(name)
                .bind(exclude_id)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to check recipe name")?,
            DatabaseDriver::Mysql => sqlx::query_scalar(NAME_TAKEN)
                .bind(author_id)
                .bind(name)
                .bind(exclude_id)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to check recipe name")?,
        };
        Ok(count > 0)
    }

    async fn list(
        &self,
        filter: &RecipeFilter,
        viewer: Option<i64>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Recipe>> {
        let (clause, args) = build_filter(filter, viewer);
        let sql = format!(
            "SELECT {} FROM recipes r WHERE {} ORDER BY r.pub_date DESC, r.id DESC LIMIT ? OFFSET ?",
            RECIPE_COLUMNS, clause
        );

        let recipes = match self.pool.driver() {
            DatabaseDriver::Sqlite => bind_filter_args!(sqlx::query::<Sqlite>(&sql), &args)
                .bind(limit)
                .bind(offset)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list recipes")?
                .iter()
                .map(row_to_recipe_sqlite)
                .collect(),
            DatabaseDriver::Mysql => bind_filter_args!(sqlx::query::<MySql>(&sql), &args)
                .bind(limit)
                .bind(offset)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to list recipes")?
                .iter()
                .map(row_to_recipe_mysql)
                .collect(),
        };
        Ok(recipes)
    }

    async fn count(&self, filter: &RecipeFilter, viewer: Option<i64>) -> Result<i64> {
        let (clause, args) = build_filter(filter, viewer);
        let sql = format!("SELECT COUNT(*) FROM recipes r WHERE {}", clause);

        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                bind_filter_args!(sqlx::query_scalar::<Sqlite, i64>(&sql), &args)
                    .fetch_one(self.pool.sqlite()?)
                    .await
                    .context("Failed to count recipes")?
            }
            DatabaseDriver::Mysql => {
                bind_filter_args!(sqlx::query_scalar::<MySql, i64>(&sql), &args)
                    .fetch_one(self.pool.mysql()?)
                    .await
                    .context("Failed to count recipes")?
            }
        };
        Ok(count)
    }

    async fn list_by_author(&self, author_id: i64, limit: Option<i64>) -> Result<Vec<Recipe>> {
        let filter = RecipeFilter {
            author: Some(author_id),
            ..RecipeFilter::default()
        };
        self.list(&filter, None, 0, limit.unwrap_or(i64::MAX)).await
    }

    async fn count_by_author(&self, author_id: i64) -> Result<i64> {
        let filter = RecipeFilter {
            author: Some(author_id),
            ..RecipeFilter::default()
        };
        self.count(&filter, None).await
    }

    async fn ingredients(&self, recipe_id: i64) -> Result<Vec<RecipeIngredient>> {
        let lines = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(LIST_LINES)
                .bind(recipe_id)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list recipe ingredients")?
                .iter()
                .map(|row| RecipeIngredient {
                    id: row.get("id"),
                    name: row.get("name"),
                    measurement_unit: row.get("measurement_unit"),
                    amount: row.get("amount"),
                })
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(LIST_LINES)
                .bind(recipe_id)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to list recipe ingredients")?
                .iter()
                .map(|row| RecipeIngredient {
                    id: row.get("id"),
                    name: row.get("name"),
                    measurement_unit: row.get("measurement_unit"),
                    amount: row.get("amount"),
                })
                .collect(),
        };
        Ok(lines)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_recipe_sqlite(
    pool: &SqlitePool,
    author_id: i64,
    input: &CreateRecipeInput,
) -> Result<i64> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let id = sqlx::query(INSERT_RECIPE)
        .bind(author_id)
        .bind(&input.name)
        .bind(&input.text)
        .bind(&input.image)
        .bind(input.cooking_time)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .context("Failed to insert recipe")?
        .last_insert_rowid();

    insert_links_sqlite(&mut tx, id, input).await?;

    tx.commit().await.context("Failed to commit recipe")?;
    Ok(id)
}

async fn update_recipe_sqlite(pool: &SqlitePool, id: i64, input: &CreateRecipeInput) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query(UPDATE_RECIPE)
        .bind(&input.name)
        .bind(&input.text)
        .bind(&input.image)
        .bind(input.cooking_time)
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to update recipe")?;

    for sql in [DELETE_LINES, DELETE_TAG_LINKS] {
        sqlx::query(sql)
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear recipe links")?;
    }

    insert_links_sqlite(&mut tx, id, input).await?;

    tx.commit().await.context("Failed to commit recipe")?;
    Ok(())
}

async fn insert_links_sqlite(
    conn: &mut SqliteConnection,
    recipe_id: i64,
    input: &CreateRecipeInput,
) -> Result<()> {
    for line in &input.ingredients {
        sqlx::query(INSERT_LINE)
            .bind(recipe_id)
            .bind(line.id)
            .bind(line.amount)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Failed to add ingredient {} to recipe", line.id))?;
    }

    for tag_id in &input.tags {
        sqlx::query(INSERT_TAG_LINK)
            .bind(recipe_id)
            .bind(tag_id)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Failed to add tag {} to recipe", tag_id))?;
    }

    Ok(())
}

fn row_to_recipe_sqlite(row: &sqlx::sqlite::SqliteRow) -> Recipe {
    Recipe {
        id: row.get("id"),
        author_id: row.get("author_id"),
        name: row.get("name"),
        text: row.get("text"),
        image: row.get("image"),
        cooking_time: row.get("cooking_time"),
        pub_date: row.get("pub_date"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_recipe_mysql(
    pool: &MySqlPool,
    author_id: i64,
    input: &CreateRecipeInput,
) -> Result<i64> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let id = sqlx::query(INSERT_RECIPE)
        .bind(author_id)
        .bind(&input.name)
        .bind(&input.text)
        .bind(&input.image)
        .bind(input.cooking_time)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .context("Failed to insert recipe")?
        .last_insert_id() as i64;

    insert_links_mysql(&mut tx, id, input).await?;

    tx.commit().await.context("Failed to commit recipe")?;
    Ok(id)
}

async fn update_recipe_mysql(pool: &MySqlPool, id: i64, input: &CreateRecipeInput) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query(UPDATE_RECIPE)
        .bind(&input.name)
        .bind(&input.text)
        .bind(&input.image)
        .bind(input.cooking_time)
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to update recipe")?;

    for sql in [DELETE_LINES, DELETE_TAG_LINKS] {
        sqlx::query(sql)
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear recipe links")?;
    }

    insert_links_mysql(&mut tx, id, input).await?;

    tx.commit().await.context("Failed to commit recipe")?;
    Ok(())
}

async fn insert_links_mysql(
    conn: &mut MySqlConnection,
    recipe_id: i64,
    input: &CreateRecipeInput,
) -> Result<()> {
    for line in &input.ingredients {
        sqlx::query(INSERT_LINE)
            .bind(recipe_id)
            .bind(line.id)
            .bind(line.amount)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Failed to add ingredient {} to recipe", line.id))?;
    }

    for tag_id in &input.tags {
        sqlx::query(INSERT_TAG_LINK)
            .bind(recipe_id)
            .bind(tag_id)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Failed to add tag {} to recipe", tag_id))?;
    }

    Ok(())
}

fn row_to_recipe_mysql(row: &sqlx::mysql::MySqlRow) -> Recipe {
    Recipe {
        id: row.get("id"),
        author_id: row.get("author_id"),
        name: row.get("name"),
        text: row.get("text"),
        image: row.get("image"),
        cooking_time: row.get("cooking_time"),
        pub_date: row.get("pub_date"),
    }
}
