//! Migration Ledger - Persisted record of applied migrations
//!
//! One row per `(app, migration)` pair, holding the time the unit was
//! applied. Presence of a row is the only meaning of "applied". The ledger
//! writes on whatever transaction the connection has open and never commits
//! on its own, so a unit's statements and its ledger row succeed or fail
//! together.

use chrono::NaiveDateTime;
use std::collections::HashSet;
use tracing::debug;

use super::definitions::MigrationId;
use crate::backends::{SqlValue, TransactionalConnection};
use crate::error::{MigrateError, MigrateResult};

/// Default name of the ledger table
pub const DEFAULT_LEDGER_TABLE: &str = "snaql_migrations";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    table: String,
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            table: DEFAULT_LEDGER_TABLE.to_string(),
        }
    }
}

impl Ledger {
    /// Create a ledger stored in `table`.
    ///
    /// The name is interpolated into SQL, so only ASCII letters, digits and
    /// underscores are accepted.
    pub fn new(table: impl Into<String>) -> MigrateResult<Self> {
        let table = table.into();
        let valid = table
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(MigrateError::config(format!(
                "invalid ledger table name \"{}\"",
                table
            )));
        }
        Ok(Self { table })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the ledger table if it does not exist yet, and commit.
    pub async fn ensure_store_exists(&self, conn: &mut dyn TransactionalConnection) -> MigrateResult<()> {
        let sql = self.create_table_sql();
        conn.execute(&sql)
            .await
            .map_err(|e| MigrateError::connection("Failed to create migrations table", e))?;
        conn.commit()
            .await
            .map_err(|e| MigrateError::connection("Failed to commit migrations table", e))?;
        debug!(table = %self.table, "Ledger table ready");
        Ok(())
    }

    pub async fn is_applied(
        &self,
        conn: &mut dyn TransactionalConnection,
        app: &str,
        migration: &MigrationId,
    ) -> MigrateResult<bool> {
        let dialect = conn.dialect();
        let sql = format!(
            "SELECT 1 FROM {} WHERE app = {} AND migration = {}",
            self.table,
            dialect.parameter_placeholder(0),
            dialect.parameter_placeholder(1)
        );
        conn.query_exists(&sql, &[SqlValue::from(app), SqlValue::from(migration.as_str())])
            .await
            .map_err(|e| {
                MigrateError::connection(
                    format!("Failed to check migration status of {}/{}", app, migration),
                    e,
                )
            })
    }

    /// Identifiers currently recorded as applied for `app`.
    pub async fn applied(
        &self,
        conn: &mut dyn TransactionalConnection,
        app: &str,
    ) -> MigrateResult<HashSet<String>> {
        let sql = format!(
            "SELECT migration FROM {} WHERE app = {}",
            self.table,
            conn.dialect().parameter_placeholder(0)
        );
        let migrations = conn
            .fetch_column(&sql, &[SqlValue::from(app)])
            .await
            .map_err(|e| {
                MigrateError::connection(format!("Failed to query applied migrations of {}", app), e)
            })?;
        Ok(migrations.into_iter().collect())
    }

    /// Insert the entry for a freshly applied unit.
    pub async fn record(
        &self,
        conn: &mut dyn TransactionalConnection,
        app: &str,
        migration: &MigrationId,
        applied: NaiveDateTime,
    ) -> MigrateResult<()> {
        if self.is_applied(conn, app, migration).await? {
            return Err(MigrateError::LedgerWriteConflict {
                app: app.to_string(),
                migration: migration.to_string(),
            });
        }

        let dialect = conn.dialect();
        let sql = format!(
            "INSERT INTO {} (app, migration, applied) VALUES ({}, {}, {})",
            self.table,
            dialect.parameter_placeholder(0),
            dialect.parameter_placeholder(1),
            dialect.parameter_placeholder(2)
        );
        let params = [
            SqlValue::from(app),
            SqlValue::from(migration.as_str()),
            SqlValue::Timestamp(applied),
        ];
        conn.execute_with(&sql, &params).await.map_err(|e| {
            MigrateError::connection(format!("Failed to record migration {}/{}", app, migration), e)
        })?;
        Ok(())
    }

    /// Delete the entry of a reverted unit. Absent entries are not an error.
    pub async fn erase(
        &self,
        conn: &mut dyn TransactionalConnection,
        app: &str,
        migration: &MigrationId,
    ) -> MigrateResult<()> {
        let dialect = conn.dialect();
        let sql = format!(
            "DELETE FROM {} WHERE app = {} AND migration = {}",
            self.table,
            dialect.parameter_placeholder(0),
            dialect.parameter_placeholder(1)
        );
        let params = [SqlValue::from(app), SqlValue::from(migration.as_str())];
        conn.execute_with(&sql, &params).await.map_err(|e| {
            MigrateError::connection(format!("Failed to remove migration record {}/{}", app, migration), e)
        })?;
        Ok(())
    }

    fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\
                app VARCHAR(255) NOT NULL, \
                migration VARCHAR(255) NOT NULL, \
                applied TIMESTAMP NOT NULL, \
                PRIMARY KEY (app, migration))",
            self.table
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends;
    use chrono::Utc;

    #[test]
    fn test_table_name_validation() {
        assert!(Ledger::new("schema_migrations").is_ok());
        assert!(Ledger::new("_ledger2").is_ok());
        assert!(Ledger::new("").is_err());
        assert!(Ledger::new("2fast").is_err());
        assert!(Ledger::new("ledger; DROP TABLE users").is_err());
        assert_eq!(Ledger::default().table(), DEFAULT_LEDGER_TABLE);
    }

    #[test]
    fn test_create_table_sql() {
        let sql = Ledger::default().create_table_sql();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS snaql_migrations ("));
        assert!(sql.contains("PRIMARY KEY (app, migration)"));
        assert!(sql.contains("applied TIMESTAMP NOT NULL"));
    }

    #[tokio::test]
    async fn test_record_and_erase_round() {
        let mut conn = backends::connect("sqlite::memory:").await.unwrap();
        let ledger = Ledger::default();
        ledger.ensure_store_exists(conn.as_mut()).await.unwrap();
        ledger.ensure_store_exists(conn.as_mut()).await.unwrap();

        let id = MigrationId::new("001-create-users");
        assert!(!ledger.is_applied(conn.as_mut(), "users", &id).await.unwrap());

        ledger
            .record(conn.as_mut(), "users", &id, Utc::now().naive_utc())
            .await
            .unwrap();
        conn.commit().await.unwrap();
        assert!(ledger.is_applied(conn.as_mut(), "users", &id).await.unwrap());
        assert!(!ledger.is_applied(conn.as_mut(), "countries", &id).await.unwrap());

        let applied = ledger.applied(conn.as_mut(), "users").await.unwrap();
        assert!(applied.contains("001-create-users"));

        ledger.erase(conn.as_mut(), "users", &id).await.unwrap();
        conn.commit().await.unwrap();
        assert!(!ledger.is_applied(conn.as_mut(), "users", &id).await.unwrap());

        // Erasing an absent entry is a no-op
        ledger.erase(conn.as_mut(), "users", &id).await.unwrap();
        conn.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_record_twice_is_a_conflict() {
        let mut conn = backends::connect("sqlite::memory:").await.unwrap();
        let ledger = Ledger::default();
        ledger.ensure_store_exists(conn.as_mut()).await.unwrap();

        let id = MigrationId::new("001-create-users");
        ledger
            .record(conn.as_mut(), "users", &id, Utc::now().naive_utc())
            .await
            .unwrap();
        conn.commit().await.unwrap();

        let err = ledger
            .record(conn.as_mut(), "users", &id, Utc::now().naive_utc())
            .await
            .unwrap_err();
        assert!(err.is_invariant_violation());
    }

    #[tokio::test]
    async fn test_uncommitted_record_is_rolled_back() {
        let mut conn = backends::connect("sqlite::memory:").await.unwrap();
        let ledger = Ledger::default();
        ledger.ensure_store_exists(conn.as_mut()).await.unwrap();

        let id = MigrationId::new("001-create-users");
        ledger
            .record(conn.as_mut(), "users", &id, Utc::now().naive_utc())
            .await
            .unwrap();
        conn.rollback().await.unwrap();

        assert!(!ledger.is_applied(conn.as_mut(), "users", &id).await.unwrap());
    }
}
