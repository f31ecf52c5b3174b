//! Subscription repository
//!
//! Directed follow edges: `user_id` follows `author_id`. The pair is unique.
//! SQLite also rejects self-edges with a `CHECK` constraint.

use crate::config::DatabaseDriver;
use crate::db::repositories::is_duplicate_key;
use crate::db::repositories::user::{row_to_user_mysql, row_to_user_sqlite};
use crate::db::DynDatabasePool;
use crate::models::User;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

/// Subscription repository trait
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Insert the edge; `false` if it already existed
    async fn add(&self, user_id: i64, author_id: i64) -> Result<bool>;

    /// Delete the edge; `false` if it did not exist
    async fn remove(&self, user_id: i64, author_id: i64) -> Result<bool>;

    /// Whether `user_id` follows `author_id`
    async fn exists(&self, user_id: i64, author_id: i64) -> Result<bool>;

    /// Authors followed by `user_id`, in subscription order
    async fn list_authors(&self, user_id: i64, offset: i64, limit: i64) -> Result<Vec<User>>;

    /// Number of authors followed by `user_id`
    async fn count_authors(&self, user_id: i64) -> Result<i64>;
}

/// SQLx-based subscription repository implementation
pub struct SqlxSubscriptionRepository {
    pool: DynDatabasePool,
}

impl SqlxSubscriptionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SubscriptionRepository> {
        Arc::new(Self::new(pool))
    }
}

// Only the (user_id, author_id) conflict is absorbed; a self-edge still
// fails the CHECK on SQLite.
const INSERT_SQLITE: &str = "INSERT INTO subscriptions (user_id, author_id, created_at) VALUES (?, ?, ?) \
     ON CONFLICT(user_id, author_id) DO NOTHING";
const INSERT_MYSQL: &str =
    "INSERT INTO subscriptions (user_id, author_id, created_at) VALUES (?, ?, ?)";
const DELETE: &str = "DELETE FROM subscriptions WHERE user_id = ? AND author_id = ?";
const EXISTS: &str = "SELECT COUNT(*) FROM subscriptions WHERE user_id = ? AND author_id = ?";
const COUNT_AUTHORS: &str = "SELECT COUNT(*) FROM subscriptions WHERE user_id = ?";
const LIST_AUTHORS: &str = r#"
    SELECT u.id, u.email, u.username, u.first_name, u.last_name, u.password_hash, u.created_at
    FROM subscriptions s
    INNER JOIN users u ON u.id = s.author_id
    WHERE s.user_id = ?
    ORDER BY s.id
    LIMIT ? OFFSET ?
"#;

#[async_trait]
impl SubscriptionRepository for SqlxSubscriptionRepository {
    async fn add(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let now = Utc::now();
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(INSERT_SQLITE)
                .bind(user_id)
                .bind(author_id)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create subscription")?
                .rows_affected(),
            DatabaseDriver::Mysql => {
                let result = sqlx::query(INSERT_MYSQL)
                    .bind(user_id)
                    .bind(author_id)
                    .bind(now)
                    .execute(self.pool.mysql()?)
                    .await;
                match result {
                    Ok(done) => done.rows_affected(),
                    Err(err) if is_duplicate_key(&err) => 0,
                    Err(err) => return Err(err).context("Failed to create subscription"),
                }
            }
        };
        Ok(affected > 0)
    }

    async fn remove(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(DELETE)
                .bind(user_id)
                .bind(author_id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete subscription")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(DELETE)
                .bind(user_id)
                .bind(author_id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete subscription")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn exists(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar(EXISTS)
                .bind(user_id)
                .bind(author_id)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to check subscription")?,
            DatabaseDriver::Mysql => sqlx::query_scalar(EXISTS)
                .bind(user_id)
                .bind(author_id)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to check subscription")?,
        };
        Ok(count > 0)
    }

    async fn list_authors(&self, user_id: i64, offset: i64, limit: i64) -> Result<Vec<User>> {
        let users = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(LIST_AUTHORS)
                .bind(user_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list subscriptions")?
                .iter()
                .map(row_to_user_sqlite)
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(LIST_AUTHORS)
                .bind(user_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to list subscriptions")?
                .iter()
                .map(row_to_user_mysql)
                .collect(),
        };
        Ok(users)
    }

    async fn count_authors(&self, user_id: i64) -> Result<i64> {
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar(COUNT_AUTHORS)
                .bind(user_id)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to count subscriptions")?,
            DatabaseDriver::Mysql => sqlx::query_scalar(COUNT_AUTHORS)
                .bind(user_id)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to count subscriptions")?,
        };
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> SqlxSubscriptionRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        for name in ["reader", "zoe", "adam"] {
            sqlx::query(
                "INSERT INTO users (email, username, first_name, last_name, password_hash) VALUES (?, ?, 'F', 'L', 'h')",
            )
            .bind(format!("{}@example.com", name))
            .bind(name)
            .execute(pool.as_sqlite().unwrap())
            .await
            .unwrap();
        }

        SqlxSubscriptionRepository::new(pool)
    }

    #[tokio::test]
    async fn test_add_is_unique() {
        let repo = setup().await;

        assert!(repo.add(1, 2).await.unwrap());
        assert!(!repo.add(1, 2).await.unwrap());
        assert!(repo.exists(1, 2).await.unwrap());
        assert!(!repo.exists(2, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_self_edge_rejected() {
        let repo = setup().await;

        let err = repo.add(1, 1).await.unwrap_err();
        assert!(!is_duplicate_key(err.downcast_ref::<sqlx::Error>().unwrap()));
        assert!(!repo.exists(1, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_author_is_an_error_not_a_duplicate() {
        let repo = setup().await;
        assert!(repo.add(1, 99).await.is_err());
    }

    #[tokio::test]
    async fn test_list_in_subscription_order() {
        let repo = setup().await;
        repo.add(1, 2).await.unwrap();
        repo.add(1, 3).await.unwrap();

        let names: Vec<_> = repo
            .list_authors(1, 0, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["zoe", "adam"]);
        assert_eq!(repo.count_authors(1).await.unwrap(), 2);

        let second_page = repo.list_authors(1, 1, 1).await.unwrap();
        assert_eq!(second_page[0].username, "adam");
    }

    #[tokio::test]
    async fn test_remove() {
        let repo = setup().await;
        repo.add(1, 2).await.unwrap();

        assert!(repo.remove(1, 2).await.unwrap());
        assert!(!repo.remove(1, 2).await.unwrap());
        assert_eq!(repo.count_authors(1).await.unwrap(), 0);
    }
}
