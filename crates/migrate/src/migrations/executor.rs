//! Migration Executor - Applies and reverts migration units
//!
//! A sweep is planned up front from the target and the ordered migration
//! lists, then each unit runs in its own transaction: statements first, then
//! the ledger write, then commit. The first failing unit is rolled back and
//! aborts the sweep; units committed before it stay committed.

use chrono::Utc;
use tracing::{debug, info, warn};

use super::definitions::{
    Application, ApplicationStatus, Direction, MigrationState, PlannedUnit, SweepReport, Target,
    UnitOutcome, UnitReport,
};
use super::ledger::Ledger;
use super::progress::{NoopObserver, SweepObserver};
use super::source::{SqlFileSource, StatementSource};
use crate::backends::{self, TransactionalConnection};
use crate::config::MigrateConfig;
use crate::error::{MigrateError, MigrateResult};

/// Runs sweeps over a fixed set of applications on one exclusive connection
pub struct MigrationExecutor {
    applications: Vec<Application>,
    ledger: Ledger,
    connection: Box<dyn TransactionalConnection>,
    source: Box<dyn StatementSource>,
    observer: Box<dyn SweepObserver>,
}

impl MigrationExecutor {
    /// Create an executor and make sure the ledger table exists.
    pub async fn new(
        applications: Vec<Application>,
        ledger: Ledger,
        mut connection: Box<dyn TransactionalConnection>,
    ) -> MigrateResult<Self> {
        ledger.ensure_store_exists(connection.as_mut()).await?;

        Ok(Self {
            applications,
            ledger,
            connection,
            source: Box::new(SqlFileSource::new()),
            observer: Box::new(NoopObserver),
        })
    }

    /// Scan every configured application, then connect.
    ///
    /// Catalog errors surface before any connection is attempted.
    pub async fn connect(config: &MigrateConfig) -> MigrateResult<Self> {
        let applications = config.load_applications()?;
        Self::open(config, applications).await
    }

    /// Connect with applications the caller already scanned.
    pub async fn open(config: &MigrateConfig, applications: Vec<Application>) -> MigrateResult<Self> {
        let ledger = Ledger::new(config.table.as_str())?;
        let connection = backends::connect(&config.db_uri).await?;
        Self::new(applications, ledger, connection).await
    }

    pub fn with_source(mut self, source: impl StatementSource + 'static) -> Self {
        self.source = Box::new(source);
        self
    }

    pub fn with_observer(mut self, observer: impl SweepObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn applications(&self) -> &[Application] {
        &self.applications
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Ledger state of every migration, per application in configuration order.
    pub async fn show(&mut self) -> MigrateResult<Vec<ApplicationStatus>> {
        let mut statuses = Vec::with_capacity(self.applications.len());
        for application in &self.applications {
            let applied = self
                .ledger
                .applied(self.connection.as_mut(), application.name())
                .await?;
            let migrations = application
                .migrations()
                .iter()
                .map(|migration| MigrationState {
                    migration: migration.clone(),
                    applied: applied.contains(migration.as_str()),
                })
                .collect();
            statuses.push(ApplicationStatus {
                app: application.name().to_string(),
                migrations,
            });
        }
        Ok(statuses)
    }

    /// Apply every pending unit up to and including the target.
    pub async fn apply(&mut self, target: &Target) -> MigrateResult<SweepReport> {
        let units = target.plan(&self.applications, Direction::Apply)?;
        self.sweep(units, Direction::Apply).await
    }

    /// Revert every applied unit from the latest down to the target.
    pub async fn revert(&mut self, target: &Target) -> MigrateResult<SweepReport> {
        let units = target.plan(&self.applications, Direction::Revert)?;
        self.sweep(units, Direction::Revert).await
    }

    /// Release the connection, rolling back anything left open.
    pub async fn close(self) -> MigrateResult<()> {
        self.connection
            .close()
            .await
            .map_err(|e| MigrateError::connection("Failed to close database connection", e))
    }

    async fn sweep(&mut self, units: Vec<PlannedUnit>, direction: Direction) -> MigrateResult<SweepReport> {
        let mut report = SweepReport::new(direction);
        let mut current_app: Option<&str> = None;

        for unit in &units {
            if current_app != Some(unit.app.as_str()) {
                self.observer.application_started(&unit.app, direction);
                current_app = Some(unit.app.as_str());
            }

            self.observer.unit_started(unit, direction);
            match self.run_unit(unit, direction).await {
                Ok(outcome) => {
                    self.observer.unit_finished(unit, outcome);
                    report.units.push(UnitReport {
                        app: unit.app.clone(),
                        migration: unit.migration.clone(),
                        outcome,
                    });
                }
                Err(err) => {
                    self.observer.unit_failed(unit, &err);
                    return Err(err);
                }
            }
        }

        info!(
            %direction,
            committed = report.committed().count(),
            skipped = report.skipped().count(),
            "Sweep finished"
        );
        Ok(report)
    }

    async fn run_unit(&mut self, unit: &PlannedUnit, direction: Direction) -> MigrateResult<UnitOutcome> {
        let applied = self
            .ledger
            .is_applied(self.connection.as_mut(), &unit.app, &unit.migration)
            .await?;
        if direction.skips(applied) {
            debug!(app = %unit.app, migration = %unit.migration, %direction, "Skipping migration");
            return Ok(UnitOutcome::Skipped);
        }

        match self.execute_unit(unit, direction).await {
            Ok(()) => {
                info!(app = %unit.app, migration = %unit.migration, %direction, "Migration committed");
                Ok(UnitOutcome::Committed)
            }
            Err(err) => {
                warn!(
                    app = %unit.app,
                    migration = %unit.migration,
                    %direction,
                    error = %err.full_message(),
                    "Migration failed, rolling back"
                );
                if let Err(rollback_err) = self.connection.rollback().await {
                    warn!(
                        app = %unit.app,
                        migration = %unit.migration,
                        error = %rollback_err,
                        "Rollback failed"
                    );
                }
                Err(err)
            }
        }
    }

    async fn execute_unit(&mut self, unit: &PlannedUnit, direction: Direction) -> MigrateResult<()> {
        let statements = self
            .source
            .load(&unit.root, &unit.migration, direction)
            .map_err(|source| MigrateError::StatementSource {
                app: unit.app.clone(),
                migration: unit.migration.to_string(),
                direction,
                source,
            })?;

        for statement in &statements {
            self.observer.statement(unit, statement);
            debug!(app = %unit.app, migration = %unit.migration, %statement, "Executing statement");
            self.connection
                .execute(statement)
                .await
                .map_err(|source| MigrateError::StatementExecution {
                    app: unit.app.clone(),
                    migration: unit.migration.to_string(),
                    statement: statement.clone(),
                    source,
                })?;
        }

        match direction {
            Direction::Apply => {
                self.ledger
                    .record(
                        self.connection.as_mut(),
                        &unit.app,
                        &unit.migration,
                        Utc::now().naive_utc(),
                    )
                    .await?
            }
            Direction::Revert => {
                self.ledger
                    .erase(self.connection.as_mut(), &unit.app, &unit.migration)
                    .await?
            }
        }

        self.connection.commit().await.map_err(|e| {
            MigrateError::connection(format!("Failed to commit migration {}", unit), e)
        })
    }
}
