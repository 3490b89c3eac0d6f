//! Sweep progress callbacks
//!
//! The executor reports every unit as it goes, so a caller can show partial
//! progress even when a later unit aborts the sweep.

use super::definitions::{Direction, PlannedUnit, UnitOutcome};
use crate::error::MigrateError;

/// Receives sweep events in execution order. All methods default to no-ops.
pub trait SweepObserver: Send {
    fn application_started(&mut self, _app: &str, _direction: Direction) {}

    fn unit_started(&mut self, _unit: &PlannedUnit, _direction: Direction) {}

    /// Called right before a statement is sent to the database.
    fn statement(&mut self, _unit: &PlannedUnit, _statement: &str) {}

    fn unit_finished(&mut self, _unit: &PlannedUnit, _outcome: UnitOutcome) {}

    fn unit_failed(&mut self, _unit: &PlannedUnit, _error: &MigrateError) {}
}

/// Observer that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SweepObserver for NoopObserver {}
