// Copyright (c) The gradetest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs a learner's Python test suite and writes `results.json` for an automated grader.
//!
//! The report, not the exit code, carries test outcomes: a run that writes its report exits 0
//! even when tests fail. See [`GradetestExitCode`] for the exit codes used when no report could
//! be written.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
