//! Console rendering of sweep progress and ledger state

use console::style;
use sqlmig::{ApplicationStatus, Direction, MigrateError, PlannedUnit, SweepObserver, UnitOutcome};

/// Prints one line per unit while a sweep runs
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter {
    verbose: bool,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

/// Header printed when a sweep reaches a new application
pub fn application_header(app: &str, direction: Direction) -> String {
    match direction {
        Direction::Apply => format!("Migrating {}...", app),
        Direction::Revert => format!("Rolling back {}...", app),
    }
}

impl SweepObserver for ConsoleReporter {
    fn application_started(&mut self, app: &str, direction: Direction) {
        println!("{}", style(application_header(app, direction)).cyan().bold());
    }

    fn unit_started(&mut self, unit: &PlannedUnit, direction: Direction) {
        let verb = match direction {
            Direction::Apply => "Applying",
            Direction::Revert => "Reverting",
        };
        println!("{} {}...", verb, style(unit).bold());
    }

    fn statement(&mut self, _unit: &PlannedUnit, statement: &str) {
        if self.verbose {
            println!("{}", style(statement.trim()).dim());
        }
    }

    fn unit_finished(&mut self, _unit: &PlannedUnit, outcome: UnitOutcome) {
        match outcome {
            UnitOutcome::Skipped => println!("  {}", style("SKIPPED.").yellow()),
            UnitOutcome::Committed => println!("  {}", style("OK.").green()),
        }
    }

    fn unit_failed(&mut self, _unit: &PlannedUnit, _error: &MigrateError) {
        println!("  {}", style("FAILED.").red().bold());
    }
}

/// Plain text listing used by `show`
pub fn render_status(statuses: &[ApplicationStatus]) -> String {
    let mut out = String::new();
    for status in statuses {
        out.push_str(&format!("{}\n", style(&status.app).bold()));
        if status.migrations.is_empty() {
            out.push_str(&format!("  {}\n", style("(no migrations)").dim()));
        }
        for state in &status.migrations {
            if state.applied {
                out.push_str(&format!("  {} {}\n", state.migration, style("(applied)").green()));
            } else {
                out.push_str(&format!("  {}\n", state.migration));
            }
        }
    }
    out
}
