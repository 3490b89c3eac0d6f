//! Error types for the migration system
//!
//! Every failure that can reach a caller names the offending application and
//! migration where one is involved, together with the underlying cause.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::migrations::Direction;

/// Result type alias for migration operations
pub type MigrateResult<T> = Result<T, MigrateError>;

/// Opaque error produced by a statement source
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("Unable to read migrations directory '{}'", path.display())]
    CatalogAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(
        "One of the .apply.sql or .revert.sql files is absent for migration '{migration}' \
         (missing {missing} file under '{}')",
        root.display()
    )]
    IncompleteMigrationUnit {
        root: PathBuf,
        migration: String,
        missing: Direction,
    },

    #[error("unknown app \"{app}\"")]
    UnknownApplication { app: String },

    #[error("unknown migration \"{app}/{migration}\"")]
    UnknownMigration { app: String, migration: String },

    #[error("invalid target \"{target}\", expected {expected}")]
    InvalidTarget {
        target: String,
        expected: &'static str,
    },

    #[error("reverting every application at once is not supported, name a single <app>/<migration>")]
    RevertAllUnsupported,

    #[error("unable to load {direction} statements for {app}/{migration}")]
    StatementSource {
        app: String,
        migration: String,
        direction: Direction,
        #[source]
        source: BoxError,
    },

    #[error("migration execution failed for {app}/{migration}")]
    StatementExecution {
        app: String,
        migration: String,
        statement: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("ledger already holds an entry for {app}/{migration}; ledger and skip logic disagree")]
    LedgerWriteConflict { app: String, migration: String },

    #[error("Database error: {context}")]
    Connection {
        context: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Unsupported db connection type \"{scheme}\"")]
    UnsupportedBackend { scheme: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Incorrect YAML config file format")]
    Yaml(#[from] serde_yaml::Error),
}

impl MigrateError {
    pub fn config(message: impl Into<String>) -> Self {
        MigrateError::Config {
            message: message.into(),
        }
    }

    pub fn connection(context: impl Into<String>, source: sqlx::Error) -> Self {
        MigrateError::Connection {
            context: context.into(),
            source,
        }
    }

    /// True for failures that mean the ledger and the executor disagree about
    /// what is applied. These are never expected during a normal run.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, MigrateError::LedgerWriteConflict { .. })
    }

    /// The message followed by every underlying cause, `: ` separated.
    pub fn full_message(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }

    /// The `(application, migration)` pair this error is about, if any.
    pub fn migration(&self) -> Option<(&str, &str)> {
        match self {
            MigrateError::UnknownMigration { app, migration }
            | MigrateError::StatementSource { app, migration, .. }
            | MigrateError::StatementExecution { app, migration, .. }
            | MigrateError::LedgerWriteConflict { app, migration } => {
                Some((app.as_str(), migration.as_str()))
            }
            _ => None,
        }
    }
}

impl From<sqlx::Error> for MigrateError {
    fn from(err: sqlx::Error) -> Self {
        MigrateError::connection("database operation failed", err)
    }
}
