//! Membership repository
//!
//! The favorite and shopping-cart relations are the same shape: a unique
//! `(user_id, recipe_id)` pair. One repository serves both, keyed by
//! [`MembershipKind`]. Inserts never fail on a duplicate pair; they report
//! whether a row was actually written, so racing duplicate requests resolve
//! to exactly one insert. Any other constraint failure is still an error.
//!
//! The cart aggregation used for the shopping list also lives here.

use crate::config::DatabaseDriver;
use crate::db::repositories::is_duplicate_key;
use crate::db::DynDatabasePool;
use crate::models::ShoppingListItem;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use std::fmt;
use std::sync::Arc;

/// Which user-recipe relation an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipKind {
    Favorite,
    ShoppingCart,
}

impl MembershipKind {
    fn table(self) -> &'static str {
        match self {
            MembershipKind::Favorite => "favorites",
            MembershipKind::ShoppingCart => "shopping_carts",
        }
    }
}

impl fmt::Display for MembershipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MembershipKind::Favorite => write!(f, "favorites"),
            MembershipKind::ShoppingCart => write!(f, "shopping cart"),
        }
    }
}

/// Membership repository trait
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Insert the pair; `false` if it was already present
    async fn add(&self, kind: MembershipKind, user_id: i64, recipe_id: i64) -> Result<bool>;

    /// Delete the pair; `false` if it was not present
    async fn remove(&self, kind: MembershipKind, user_id: i64, recipe_id: i64) -> Result<bool>;

    /// Whether the pair exists
    async fn contains(&self, kind: MembershipKind, user_id: i64, recipe_id: i64) -> Result<bool>;

    /// Ingredient amounts across the user's cart, summed per
    /// `(name, measurement_unit)` and ordered by name
    async fn shopping_list(&self, user_id: i64) -> Result<Vec<ShoppingListItem>>;
}

/// SQLx-based membership repository implementation
pub struct SqlxMembershipRepository {
    pool: DynDatabasePool,
}

impl SqlxMembershipRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn MembershipRepository> {
        Arc::new(Self::new(pool))
    }
}

// The cart is grouped on the catalog's unique (name, unit) pair, so each
// group is exactly one ingredient.
const SHOPPING_LIST_SQLITE: &str = r#"
    SELECT i.name AS name, i.measurement_unit AS measurement_unit, SUM(ri.amount) AS amount
    FROM shopping_carts sc
    INNER JOIN recipe_ingredients ri ON ri.recipe_id = sc.recipe_id
    INNER JOIN ingredients i ON i.id = ri.ingredient_id
    WHERE sc.user_id = ?
    GROUP BY i.name, i.measurement_unit
    ORDER BY i.name, i.measurement_unit
"#;

const SHOPPING_LIST_MYSQL: &str = r#"
    SELECT i.name AS name, i.measurement_unit AS measurement_unit,
           CAST(SUM(ri.amount) AS SIGNED) AS amount
    FROM shopping_carts sc
    INNER JOIN recipe_ingredients ri ON ri.recipe_id = sc.recipe_id
    INNER JOIN ingredients i ON i.id = ri.ingredient_id
    WHERE sc.user_id = ?
    GROUP BY i.name, i.measurement_unit
    ORDER BY i.name, i.measurement_unit
"#;

#[async_trait]
impl MembershipRepository for SqlxMembershipRepository {
    async fn add(&self, kind: MembershipKind, user_id: i64, recipe_id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let sql = format!(
                    "INSERT INTO {} (user_id, recipe_id) VALUES (?, ?) \
                     ON CONFLICT(user_id, recipe_id) DO NOTHING",
                    kind.table()
                );
                sqlx::query(&sql)
                    .bind(user_id)
                    .bind(recipe_id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .with_context(|| format!("Failed to add recipe to {}", kind))?
                    .rows_affected()
            }
            DatabaseDriver::Mysql => {
                let sql = format!(
                    "INSERT INTO {} (user_id, recipe_id) VALUES (?, ?)",
                    kind.table()
                );
                let result = sqlx::query(&sql)
                    .bind(user_id)
                    .bind(recipe_id)
                    .execute(self.pool.mysql()?)
                    .await;
                match result {
                    Ok(done) => done.rows_affected(),
                    Err(err) if is_duplicate_key(&err) => 0,
                    Err(err) => {
                        return Err(err).with_context(|| format!("Failed to add recipe to {}", kind))
                    }
                }
            }
        };
        Ok(affected > 0)
    }

    async fn remove(&self, kind: MembershipKind, user_id: i64, recipe_id: i64) -> Result<bool> {
        let sql = format!(
            "DELETE FROM {} WHERE user_id = ? AND recipe_id = ?",
            kind.table()
        );
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(user_id)
                .bind(recipe_id)
                .execute(self.pool.sqlite()?)
                .await
                .with_context(|| format!("Failed to remove recipe from {}", kind))?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .bind(user_id)
                .bind(recipe_id)
                .execute(self.pool.mysql()?)
                .await
                .with_context(|| format!("Failed to remove recipe from {}", kind))?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn contains(&self, kind: MembershipKind, user_id: i64, recipe_id: i64) -> Result<bool> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE user_id = ? AND recipe_id = ?",
            kind.table()
        );
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar(&sql)
                .bind(user_id)
                .bind(recipe_id)
                .fetch_one(self.pool.sqlite()?)
                .await
                .with_context(|| format!("Failed to check {}", kind))?,
            DatabaseDriver::Mysql => sqlx::query_scalar(&sql)
                .bind(user_id)
                .bind(recipe_id)
                .fetch_one(self.pool.mysql()?)
                .await
                .with_context(|| format!("Failed to check {}", kind))?,
        };
        Ok(count > 0)
    }

    async fn shopping_list(&self, user_id: i64) -> Result<Vec<ShoppingListItem>> {
        let items = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SHOPPING_LIST_SQLITE)
                .bind(user_id)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to aggregate shopping cart")?
                .iter()
                .map(|row| ShoppingListItem {
                    name: row.get("name"),
                    measurement_unit: row.get("measurement_unit"),
                    amount: row.get("amount"),
                })
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(SHOPPING_LIST_MYSQL)
                .bind(user_id)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to aggregate shopping cart")?
                .iter()
                .map(|row| ShoppingListItem {
                    name: row.get("name"),
                    measurement_unit: row.get("measurement_unit"),
                    amount: row.get("amount"),
                })
                .collect(),
        };
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use sqlx::SqlitePool;

    async fn setup() -> (DynDatabasePool, SqlxMembershipRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let sqlite = pool.as_sqlite().unwrap();
        sqlx::query(
            "INSERT INTO users (email, username, first_name, last_name, password_hash) VALUES ('a@x.io', 'a', 'A', 'A', 'h'), ('b@x.io', 'b', 'B', 'B', 'h')",
        )
        .execute(sqlite)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO ingredients (name, measurement_unit) VALUES ('flour', 'g'), ('egg', 'pcs'), ('flour', 'kg')",
        )
        .execute(sqlite)
        .await
        .unwrap();

        (pool.clone(), SqlxMembershipRepository::new(pool))
    }

    async fn recipe_with_lines(pool: &SqlitePool, name: &str, lines: &[(i64, i32)]) -> i64 {
        let id = sqlx::query(
            "INSERT INTO recipes (author_id, name, text, image, cooking_time) VALUES (1, ?, 'text', 'img', 10)",
        )
        .bind(name)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid();

        for (ingredient_id, amount) in lines {
            sqlx::query(
                "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) VALUES (?, ?, ?)",
            )
            .bind(id)
            .bind(ingredient_id)
            .bind(amount)
            .execute(pool)
            .await
            .unwrap();
        }
        id
    }

    #[tokio::test]
    async fn test_add_twice_reports_duplicate() {
        let (pool, repo) = setup().await;
        let recipe = recipe_with_lines(pool.as_sqlite().unwrap(), "Cake", &[]).await;

        assert!(repo.add(MembershipKind::Favorite, 2, recipe).await.unwrap());
        assert!(!repo.add(MembershipKind::Favorite, 2, recipe).await.unwrap());

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM favorites WHERE user_id = 2")
            .fetch_one(pool.as_sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_add_for_missing_recipe_is_an_error() {
        let (_pool, repo) = setup().await;
        assert!(repo.add(MembershipKind::ShoppingCart, 2, 404).await.is_err());
    }

    #[tokio::test]
    async fn test_relations_are_independent() {
        let (pool, repo) = setup().await;
        let recipe = recipe_with_lines(pool.as_sqlite().unwrap(), "Cake", &[]).await;

        repo.add(MembershipKind::Favorite, 2, recipe).await.unwrap();

        assert!(repo.contains(MembershipKind::Favorite, 2, recipe).await.unwrap());
        assert!(!repo.contains(MembershipKind::ShoppingCart, 2, recipe).await.unwrap());
        assert!(!repo.contains(MembershipKind::Favorite, 1, recipe).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_missing_pair() {
        let (pool, repo) = setup().await;
        let recipe = recipe_with_lines(pool.as_sqlite().unwrap(), "Cake", &[]).await;

        repo.add(MembershipKind::ShoppingCart, 2, recipe).await.unwrap();
        assert!(repo.remove(MembershipKind::ShoppingCart, 2, recipe).await.unwrap());
        assert!(!repo.remove(MembershipKind::ShoppingCart, 2, recipe).await.unwrap());
    }

    #[tokio::test]
    async fn test_shopping_list_sums_per_name_and_unit() {
        let (pool, repo) = setup().await;
        let sqlite = pool.as_sqlite().unwrap();
        let pancakes = recipe_with_lines(sqlite, "Pancakes", &[(1, 100), (2, 2)]).await;
        let bread = recipe_with_lines(sqlite, "Bread", &[(1, 150), (3, 1)]).await;
        let _not_in_cart = recipe_with_lines(sqlite, "Pie", &[(1, 999)]).await;

        repo.add(MembershipKind::ShoppingCart, 2, pancakes).await.unwrap();
        repo.add(MembershipKind::ShoppingCart, 2, bread).await.unwrap();

        let items = repo.shopping_list(2).await.expect("Failed to build list");
        let lines: Vec<_> = items
            .iter()
            .map(|i| (i.name.as_str(), i.measurement_unit.as_str(), i.amount))
            .collect();
        assert_eq!(
            lines,
            vec![("egg", "pcs", 2), ("flour", "g", 250), ("flour", "kg", 1)]
        );

        assert!(repo.shopping_list(1).await.unwrap().is_empty());
    }
}
