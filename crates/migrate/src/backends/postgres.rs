//! PostgreSQL Backend Implementation

use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Postgres;

use super::core::SqlDialect;

transactional_connection!(PostgresConnection, Postgres, PgPool, SqlDialect::PostgreSQL);

impl PostgresConnection {
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await?;
        Ok(Self::from_pool(pool))
    }
}
