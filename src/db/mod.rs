//! Database layer
//!
//! Storage for Foodgram. Two backends are supported:
//! - SQLite (default, single file or in-memory)
//! - MySQL
//!
//! The driver is selected from configuration. Everything above this module
//! talks to a [`DynDatabasePool`] and never to a concrete backend.
//!
//! # Usage
//!
//! ```ignore
//! use foodgram::config::DatabaseConfig;
//! use foodgram::db::{create_pool, migrations};
//!
//! let config = DatabaseConfig::default();
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
