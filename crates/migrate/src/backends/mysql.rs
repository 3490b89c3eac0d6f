//! MySQL Backend Implementation
//!
//! MySQL commits DDL implicitly, so a failing unit can leave earlier schema
//! statements in place even though its ledger write is rolled back.

use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::MySql;

use super::core::SqlDialect;

transactional_connection!(MySqlConnection, MySql, MySqlPool, SqlDialect::MySQL);

impl MySqlConnection {
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await?;
        Ok(Self::from_pool(pool))
    }
}
