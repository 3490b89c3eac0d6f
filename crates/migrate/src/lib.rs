//! # sqlmig: file-based SQL migrations
//!
//! Applies and reverts ordered `.apply.sql` / `.revert.sql` pairs per
//! application, recording applied units in a ledger table so re-running is
//! safe. Every unit runs in its own transaction together with its ledger
//! write.

pub mod backends;
pub mod config;
pub mod error;
pub mod migrations;

pub use backends::{connect, mask_database_url, DatabaseBackendType, SqlDialect, SqlValue, TransactionalConnection};
pub use config::{MigrateConfig, DEFAULT_CONFIG_FILE};
pub use error::{MigrateError, MigrateResult};
pub use migrations::*;
