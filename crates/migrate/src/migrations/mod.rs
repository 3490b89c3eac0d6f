//! Migration System
//!
//! Catalog discovery, the applied-migration ledger, statement loading and the
//! executor that sweeps units forward or backward.

pub mod catalog;
pub mod definitions;
pub mod executor;
pub mod ledger;
pub mod progress;
pub mod source;

pub use catalog::discover;
pub use definitions::*;
pub use executor::MigrationExecutor;
pub use ledger::{Ledger, DEFAULT_LEDGER_TABLE};
pub use progress::{NoopObserver, SweepObserver};
pub use source::{split_sql_statements, SqlFileSource, StatementSource};
