//! SQLite Backend Implementation
//!
//! The pool never retires its only connection, so `sqlite::memory:`
//! databases live for the whole run.

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Sqlite;

use super::core::SqlDialect;

transactional_connection!(SqliteConnection, Sqlite, SqlitePool, SqlDialect::SQLite);

impl SqliteConnection {
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(database_url)
            .await?;
        Ok(Self::from_pool(pool))
    }
}
