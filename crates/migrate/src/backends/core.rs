//! Core Database Backend Traits
//!
//! The executor and the ledger only talk to the database through
//! [`TransactionalConnection`]. Each supported database provides one
//! implementation, selected once from the connection URL.

use async_trait::async_trait;
use chrono::NaiveDateTime;

/// Value bound to a parameter placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Timestamp(NaiveDateTime),
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(value: NaiveDateTime) -> Self {
        SqlValue::Timestamp(value)
    }
}

/// SQL dialect differences the ledger has to care about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlDialect {
    PostgreSQL,
    MySQL,
    SQLite,
}

impl SqlDialect {
    /// Get the parameter placeholder style for this dialect
    pub fn parameter_placeholder(&self, index: usize) -> String {
        match self {
            SqlDialect::PostgreSQL => format!("${}", index + 1),
            SqlDialect::MySQL | SqlDialect::SQLite => "?".to_string(),
        }
    }
}

/// A single database connection with explicit transaction control.
///
/// A transaction opens implicitly with the first statement executed after a
/// `commit` or `rollback`, the same model as a DB-API connection with
/// autocommit disabled. Reads through [`query_exists`](Self::query_exists)
/// and [`fetch_column`](Self::fetch_column) join the open transaction when
/// there is one and run on their own otherwise.
#[async_trait]
pub trait TransactionalConnection: Send {
    fn dialect(&self) -> SqlDialect;

    /// Execute one raw statement exactly as written.
    async fn execute(&mut self, statement: &str) -> Result<u64, sqlx::Error>;

    /// Execute a statement with bound parameters.
    async fn execute_with(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, sqlx::Error>;

    /// True when the query returns at least one row.
    async fn query_exists(&mut self, sql: &str, params: &[SqlValue]) -> Result<bool, sqlx::Error>;

    /// First column of every returned row, decoded as text.
    async fn fetch_column(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<String>, sqlx::Error>;

    /// Commit the open transaction. A no-op when none is open.
    async fn commit(&mut self) -> Result<(), sqlx::Error>;

    /// Roll back the open transaction. A no-op when none is open.
    async fn rollback(&mut self) -> Result<(), sqlx::Error>;

    /// Roll back anything still open and close the connection.
    async fn close(self: Box<Self>) -> Result<(), sqlx::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_placeholders() {
        assert_eq!(SqlDialect::PostgreSQL.parameter_placeholder(0), "$1");
        assert_eq!(SqlDialect::PostgreSQL.parameter_placeholder(2), "$3");
        assert_eq!(SqlDialect::MySQL.parameter_placeholder(0), "?");
        assert_eq!(SqlDialect::SQLite.parameter_placeholder(1), "?");
    }
}
