//! Migration Definitions - Core types shared by the catalog, ledger and executor
//!
//! Defines migration identifiers, directions, applications, sweep targets and
//! the per-unit outcomes reported back to callers.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::catalog::discover;
use crate::error::{MigrateError, MigrateResult};

/// File suffix of the apply side of a migration unit
pub const APPLY_SUFFIX: &str = ".apply.sql";

/// File suffix of the revert side of a migration unit
pub const REVERT_SUFFIX: &str = ".revert.sql";

/// Migration direction for execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Run the `.apply.sql` statements and record the unit
    Apply,
    /// Run the `.revert.sql` statements and erase the unit
    Revert,
}

impl Direction {
    pub const BOTH: [Direction; 2] = [Direction::Apply, Direction::Revert];

    pub fn suffix(&self) -> &'static str {
        match self {
            Direction::Apply => APPLY_SUFFIX,
            Direction::Revert => REVERT_SUFFIX,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Apply => "apply",
            Direction::Revert => "revert",
        }
    }

    /// Whether a unit in the given ledger state must be skipped when sweeping
    /// in this direction.
    pub fn skips(&self, applied: bool) -> bool {
        match self {
            Direction::Apply => applied,
            Direction::Revert => !applied,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of a migration unit within one application.
///
/// The identifier is the unit's path relative to the application root with
/// the direction suffix stripped, using `/` as separator on every platform.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct MigrationId(String);

impl MigrationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive an identifier from a file path relative to the application root.
    ///
    /// Returns `None` for files that are not one side of a migration unit.
    pub fn from_relative_path(relative: &Path) -> Option<Self> {
        let file_name = relative.file_name()?.to_str()?;
        let stem = file_name
            .strip_suffix(APPLY_SUFFIX)
            .or_else(|| file_name.strip_suffix(REVERT_SUFFIX))?;
        if stem.is_empty() {
            return None;
        }

        let mut parts = Vec::new();
        if let Some(parent) = relative.parent() {
            for component in parent.components() {
                parts.push(component.as_os_str().to_str()?);
            }
        }
        parts.push(stem);
        Some(Self(parts.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Location of one side of this unit under `root`.
    pub fn file_path(&self, root: &Path, direction: Direction) -> PathBuf {
        let mut path = root.to_path_buf();
        let mut parts = self.0.split('/').peekable();
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                path.push(part);
            } else {
                path.push(format!("{}{}", part, direction.suffix()));
            }
        }
        path
    }
}

impl fmt::Display for MigrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MigrationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A named group of migrations sharing one directory root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Application {
    name: String,
    root: PathBuf,
    migrations: Vec<MigrationId>,
}

impl Application {
    /// Build an application from an already ordered migration list.
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>, migrations: Vec<MigrationId>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            migrations,
        }
    }

    /// Build an application by scanning its root directory.
    pub fn discover(name: impl Into<String>, root: impl Into<PathBuf>) -> MigrateResult<Self> {
        let root = root.into();
        let migrations = discover(&root)?;
        Ok(Self::new(name, root, migrations))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Ordered migration list, ascending
    pub fn migrations(&self) -> &[MigrationId] {
        &self.migrations
    }

    pub fn position(&self, migration: &str) -> Option<usize> {
        self.migrations.iter().position(|id| id.as_str() == migration)
    }
}

/// What a sweep should process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Every application, every migration
    All,
    /// One migration of one application
    Migration { app: String, migration: String },
}

impl Target {
    pub fn migration(app: impl Into<String>, migration: impl Into<String>) -> Self {
        Target::Migration {
            app: app.into(),
            migration: migration.into(),
        }
    }
}

impl FromStr for Target {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(Target::All);
        }
        match s.split_once('/') {
            Some((app, migration)) if !app.is_empty() && !migration.is_empty() => {
                Ok(Target::migration(app, migration))
            }
            _ => Err(MigrateError::InvalidTarget {
                target: s.to_string(),
                expected: "<app>/<migration> or 'all'",
            }),
        }
    }
}

impl Target {
    /// Select the units a sweep in `direction` processes, in execution order.
    ///
    /// Only looks at the catalog, so an unknown application or migration is
    /// reported before any database work starts.
    pub fn plan(&self, applications: &[Application], direction: Direction) -> MigrateResult<Vec<PlannedUnit>> {
        match self {
            Target::All => match direction {
                Direction::Apply => Ok(applications
                    .iter()
                    .flat_map(|application| planned_units(application, application.migrations()))
                    .collect()),
                Direction::Revert => Err(MigrateError::RevertAllUnsupported),
            },
            Target::Migration { app, migration } => {
                let application = applications
                    .iter()
                    .find(|application| application.name() == app)
                    .ok_or_else(|| MigrateError::UnknownApplication { app: app.clone() })?;
                let position =
                    application
                        .position(migration)
                        .ok_or_else(|| MigrateError::UnknownMigration {
                            app: app.clone(),
                            migration: migration.clone(),
                        })?;

                let migrations = application.migrations();
                Ok(match direction {
                    Direction::Apply => planned_units(application, &migrations[..=position]).collect(),
                    Direction::Revert => {
                        planned_units(application, &migrations[position..]).rev().collect()
                    }
                })
            }
        }
    }
}

fn planned_units<'a>(
    application: &'a Application,
    migrations: &'a [MigrationId],
) -> impl DoubleEndedIterator<Item = PlannedUnit> + 'a {
    migrations.iter().map(move |migration| PlannedUnit {
        app: application.name().to_string(),
        root: application.root().to_path_buf(),
        migration: migration.clone(),
    })
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::All => f.write_str("all"),
            Target::Migration { app, migration } => write!(f, "{}/{}", app, migration),
        }
    }
}

/// One migration unit selected for processing by a sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedUnit {
    pub app: String,
    pub root: PathBuf,
    pub migration: MigrationId,
}

impl fmt::Display for PlannedUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.app, self.migration)
    }
}

/// Terminal state of a unit that did not abort the sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitOutcome {
    /// Already in the requested state, nothing executed
    Skipped,
    /// Statements executed, ledger updated and transaction committed
    Committed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitReport {
    pub app: String,
    pub migration: MigrationId,
    pub outcome: UnitOutcome,
}

/// Result of a completed sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub direction: Direction,
    pub units: Vec<UnitReport>,
}

impl SweepReport {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            units: Vec::new(),
        }
    }

    /// Units whose statements ran and were committed
    pub fn committed(&self) -> impl Iterator<Item = &UnitReport> {
        self.units
            .iter()
            .filter(|unit| unit.outcome == UnitOutcome::Committed)
    }

    pub fn skipped(&self) -> impl Iterator<Item = &UnitReport> {
        self.units
            .iter()
            .filter(|unit| unit.outcome == UnitOutcome::Skipped)
    }

    /// True when the sweep changed nothing
    pub fn is_noop(&self) -> bool {
        self.committed().next().is_none()
    }
}

/// Ledger state of one migration, as reported by `show`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationState {
    pub migration: MigrationId,
    pub applied: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationStatus {
    pub app: String,
    pub migrations: Vec<MigrationState>,
}

impl ApplicationStatus {
    pub fn applied(&self) -> impl Iterator<Item = &MigrationId> {
        self.migrations
            .iter()
            .filter(|state| state.applied)
            .map(|state| &state.migration)
    }
}
