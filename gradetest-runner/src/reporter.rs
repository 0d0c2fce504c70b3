// Copyright (c) The gradetest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Consumes executor lifecycle events and aggregates them into a report.
//!
//! The main structure in this module is [`ResultAggregator`].

mod aggregator;
pub mod events;
mod traceback;

pub use aggregator::ResultAggregator;

use crate::errors::ObserverError;
use events::{CollectedTest, ExitCondition, PhaseReport, UncaughtException};

/// Receives lifecycle events from a [`TestExecutor`](crate::runner::TestExecutor).
///
/// Events for a run arrive on a single thread, in order: one collection, then any number of phase
/// reports and uncaught exceptions, then one session finish.
pub trait RunObserver {
    /// Called once all tests have been collected, before any of them runs.
    ///
    /// The observer may reorder `tests`; the executor runs them in the order they are left in.
    fn on_collection(&mut self, tests: &mut Vec<CollectedTest>) -> Result<(), ObserverError>;

    /// Called when one phase of a test finishes.
    fn on_phase_report(&mut self, report: &PhaseReport) -> Result<(), ObserverError>;

    /// Called once when the session finishes.
    fn on_session_finish(&mut self, exit: ExitCondition);

    /// Called when an exception escapes outside of a test assertion.
    fn on_uncaught_exception(&mut self, exception: &UncaughtException);
}
