// Copyright (c) The gradetest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifecycle events emitted by a test executor.
//!
//! Events are produced by a [`TestExecutor`](crate::runner::TestExecutor) and consumed by a
//! [`RunObserver`](super::RunObserver). Executors running out of process encode them as JSON lines,
//! one [`ExecutorEvent`] per line.

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The version of the event schema understood by this crate.
///
/// Bumped whenever a change to [`ExecutorEvent`] would be misread by an older reader.
pub const EVENT_SCHEMA_VERSION: u32 = 1;

/// A single record in an executor's event stream.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ExecutorEvent {
    /// The first record of every stream.
    StreamStart {
        /// The schema version the executor writes.
        version: u32,
    },

    /// A test was collected.
    Collected(CollectedTest),

    /// A file could not be collected, for example because importing it failed.
    CollectError {
        /// The file that failed to collect.
        path: Utf8PathBuf,
    },

    /// One phase of a test finished.
    PhaseReport(PhaseReport),

    /// An exception escaped outside of an ordinary test assertion.
    UncaughtException(UncaughtException),

    /// The session finished.
    SessionFinish {
        /// The executor's exit status.
        exit_status: i32,
    },
}

/// A test found by the executor during collection.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct CollectedTest {
    /// The hierarchical node ID, e.g. `example_test.py::ExampleTest::test_hello`.
    pub node_id: String,

    /// The absolute path to the file the test is defined in.
    pub path: Utf8PathBuf,

    /// The task number declared by the test's annotation, if any.
    #[serde(default)]
    pub task_no: Option<u32>,
}

impl CollectedTest {
    /// Returns the selector that runs exactly this test: the absolute path followed by the
    /// in-file part of the node ID.
    pub fn selector(&self) -> String {
        match crate::helpers::split_node_id(&self.node_id) {
            (_, Some(rest)) => format!("{}::{rest}", self.path),
            (_, None) => self.path.to_string(),
        }
    }
}

/// The phase of a test's execution a [`PhaseReport`] describes.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Fixtures and other setup before the test body.
    Setup,

    /// The test body.
    Call,

    /// Cleanup after the test body.
    Teardown,
}

/// The outcome of a single phase.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    /// The phase completed.
    Passed,

    /// The phase raised.
    Failed,

    /// The phase was skipped. Treated as not failed.
    Skipped,
}

/// The report for one phase of one test.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct PhaseReport {
    /// The hierarchical node ID of the test.
    pub node_id: String,

    /// A display name supplied by the executor, set for sub-variant reports.
    #[serde(default)]
    pub head_line: Option<String>,

    /// The absolute path to the file the test is defined in.
    pub path: Utf8PathBuf,

    /// The phase this report is for.
    pub phase: Phase,

    /// How the phase ended.
    pub outcome: Outcome,

    /// The time taken by the phase, in seconds.
    pub duration: f64,

    /// Where and why the phase failed, if it did.
    #[serde(default)]
    pub crash: Option<CrashInfo>,

    /// Standard output captured during the phase.
    #[serde(default)]
    pub captured_stdout: String,

    /// Where the test is defined.
    pub location: Location,
}

impl PhaseReport {
    /// Returns true if the phase failed.
    pub fn failed(&self) -> bool {
        self.outcome == Outcome::Failed
    }
}

/// Where and why a failure happened.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct CrashInfo {
    /// The file the failure was raised in, if known.
    #[serde(default)]
    pub path: Option<String>,

    /// The 1-based line the failure was raised on.
    pub line: u32,

    /// A one-line summary of the failure.
    pub message: String,
}

/// A test's definition site, as reported by the executor.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Location {
    /// The file, relative to the executor's root directory.
    pub path: String,

    /// The 1-based line the test is defined on.
    pub line: u32,

    /// The executor's dotted name for the test.
    pub domain: String,
}

/// An exception that was not tied to an ordinary test assertion, such as an import error during
/// collection.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct UncaughtException {
    /// The node the exception was raised under: a test or a file.
    pub node: String,

    /// The qualified type name of the exception.
    pub exception_type: String,

    /// The traceback, outermost frame first.
    pub frames: Vec<TracebackFrame>,

    /// Where the exception was raised, if known.
    #[serde(default)]
    pub crash: Option<CrashInfo>,
}

/// One frame of a traceback.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct TracebackFrame {
    /// The file the frame is in.
    #[serde(default)]
    pub path: Option<String>,

    /// The 1-based line the frame is at.
    #[serde(default)]
    pub line: Option<u32>,

    /// The rendered lines of the frame: source context followed by `E `-prefixed error lines.
    pub lines: Vec<String>,
}

/// How the executor's session ended.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ExitCondition {
    /// All tests passed.
    Ok,

    /// Some tests failed.
    TestsFailed,

    /// The run was interrupted.
    Interrupted,

    /// The executor hit an internal error.
    InternalError,

    /// The executor was misused, for example with an unknown option.
    UsageError,

    /// No tests were collected.
    NoTestsCollected,

    /// Any other exit status.
    Other(i32),
}

impl ExitCondition {
    /// Decodes an executor exit status.
    pub fn from_exit_status(status: i32) -> Self {
        match status {
            0 => Self::Ok,
            1 => Self::TestsFailed,
            2 => Self::Interrupted,
            3 => Self::InternalError,
            4 => Self::UsageError,
            5 => Self::NoTestsCollected,
            other => Self::Other(other),
        }
    }

    /// Returns the executor exit status this condition was decoded from.
    pub fn exit_status(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::TestsFailed => 1,
            Self::Interrupted => 2,
            Self::InternalError => 3,
            Self::UsageError => 4,
            Self::NoTestsCollected => 5,
            Self::Other(other) => other,
        }
    }

    /// Returns true if the session completed cleanly.
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }

    /// Returns the executor's upper-case name for this condition.
    pub fn name(self) -> ExitConditionName {
        ExitConditionName(self)
    }
}

/// The display form of an [`ExitCondition`], e.g. `INTERRUPTED`.
#[derive(Copy, Clone, Debug)]
pub struct ExitConditionName(ExitCondition);

impl fmt::Display for ExitConditionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            ExitCondition::Ok => f.write_str("OK"),
            ExitCondition::TestsFailed => f.write_str("TESTS_FAILED"),
            ExitCondition::Interrupted => f.write_str("INTERRUPTED"),
            ExitCondition::InternalError => f.write_str("INTERNAL_ERROR"),
            ExitCondition::UsageError => f.write_str("USAGE_ERROR"),
            ExitCondition::NoTestsCollected => f.write_str("NO_TESTS_COLLECTED"),
            ExitCondition::Other(status) => write!(f, "{status}"),
        }
    }
}
