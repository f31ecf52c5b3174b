//! User repository
//!
//! Database operations for users.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::User;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, user: &User) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by username
    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Get user by email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Replace the stored password hash
    async fn update_password(&self, id: i64, password_hash: &str) -> Result<()>;

    /// Count total users
    async fn count(&self) -> Result<i64>;

    /// List users ordered by id
    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<User>>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_user_sqlite(self.pool.sqlite()?, user).await,
            DatabaseDriver::Mysql => create_user_mysql(self.pool.mysql()?, user).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_user_where_sqlite(self.pool.sqlite()?, "id = ?", UserKey::Id(id)).await
            }
            DatabaseDriver::Mysql => {
                get_user_where_mysql(self.pool.mysql()?, "id = ?", UserKey::Id(id)).await
            }
        }
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let key = UserKey::Text(username);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_user_where_sqlite(self.pool.sqlite()?, "username = ?", key).await
            }
            DatabaseDriver::Mysql => {
                get_user_where_mysql(self.pool.mysql()?, "username = ?", key).await
            }
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let key = UserKey::Text(email);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_user_where_sqlite(self.pool.sqlite()?, "email = ?", key).await
            }
            DatabaseDriver::Mysql => {
                get_user_where_mysql(self.pool.mysql()?, "email = ?", key).await
            }
        }
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<()> {
        let sql = "UPDATE users SET password_hash = ? WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(password_hash)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update password")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(password_hash)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to update password")?;
            }
        }
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM users";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar(sql)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to count users")?,
            DatabaseDriver::Mysql => sqlx::query_scalar(sql)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to count users")?,
        };
        Ok(count)
    }

    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_users_sqlite(self.pool.sqlite()?, offset, limit).await,
            DatabaseDriver::Mysql => list_users_mysql(self.pool.mysql()?, offset, limit).await,
        }
    }
}

/// Lookup value for the single-row user queries
#[derive(Clone, Copy)]
enum UserKey<'a> {
    Id(i64),
    Text(&'a str),
}

const USER_COLUMNS: &str =
    "id, email, username, first_name, last_name, password_hash, created_at";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (email, username, first_name, last_name, password_hash, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.email)
    .bind(&user.username)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.password_hash)
    .bind(user.created_at)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_rowid(),
        ..user.clone()
    })
}

async fn get_user_where_sqlite(
    pool: &SqlitePool,
    condition: &str,
    key: UserKey<'_>,
) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, condition);
    let query = sqlx::query(&sql);
    let query = match key {
        UserKey::Id(id) => query.bind(id),
        UserKey::Text(value) => query.bind(value),
    };

    let row = query
        .fetch_optional(pool)
        .await
        .context("Failed to get user")?;

    Ok(row.as_ref().map(row_to_user_sqlite))
}

async fn list_users_sqlite(pool: &SqlitePool, offset: i64, limit: i64) -> Result<Vec<User>> {
    let sql = format!("SELECT {} FROM users ORDER BY id LIMIT ? OFFSET ?", USER_COLUMNS);
    let rows = sqlx::query(&sql)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to list users")?;

    Ok(rows.iter().map(row_to_user_sqlite).collect())
}

pub(crate) fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        username: row.get("username"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (email, username, first_name, last_name, password_hash, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.email)
    .bind(&user.username)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.password_hash)
    .bind(user.created_at)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_id() as i64,
        ..user.clone()
    })
}

async fn get_user_where_mysql(
    pool: &MySqlPool,
    condition: &str,
    key: UserKey<'_>,
) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, condition);
    let query = sqlx::query(&sql);
    let query = match key {
        UserKey::Id(id) => query.bind(id),
        UserKey::Text(value) => query.bind(value),
    };

    let row = query
        .fetch_optional(pool)
        .await
        .context("Failed to get user")?;

    Ok(row.as_ref().map(row_to_user_mysql))
}

async fn list_users_mysql(pool: &MySqlPool, offset: i64, limit: i64) -> Result<Vec<User>> {
    let sql = format!("SELECT {} FROM users ORDER BY id LIMIT ? OFFSET ?", USER_COLUMNS);
    let rows = sqlx::query(&sql)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to list users")?;

    Ok(rows.iter().map(row_to_user_mysql).collect())
}

pub(crate) fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        username: row.get("username"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
    }
}
