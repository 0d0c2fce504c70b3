// Copyright (c) The gradetest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::NO_HEADING_TARGET;
use camino::Utf8PathBuf;
use gradetest_runner::errors::{ConfigParseError, RunError};
use std::error::Error;
use thiserror::Error;
use tracing::error;

/// Documented exit codes for `gradetest` failures.
///
/// Test failures are not among these: they are reported in `results.json`, and the process exits
/// with [`OK`](Self::OK) once the report is written. Unknown/unexpected failures always result in
/// exit code 1.
pub enum GradetestExitCode {}

impl GradetestExitCode {
    /// The report was written.
    pub const OK: i32 = 0;

    /// A user issue happened while setting up a run, e.g. an invalid config or a missing
    /// directory.
    pub const SETUP_ERROR: i32 = 96;

    /// A test source file could not be indexed, or the executor could not be run.
    pub const RUN_FAILED: i32 = 100;

    /// The report could not be written.
    pub const WRITE_REPORT_FAILED: i32 = 110;
}

/// An error that stopped gradetest from producing a report.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("{kind} directory `{path}` does not exist")]
    DirNotFound { kind: DirKind, path: Utf8PathBuf },
    #[error("run failed")]
    RunFailed {
        #[from]
        err: RunError,
    },
}

/// Which of the two directory arguments an error refers to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[doc(hidden)]
pub enum DirKind {
    Input,
    Output,
}

impl std::fmt::Display for DirKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DirKind::Input => write!(f, "input"),
            DirKind::Output => write!(f, "output"),
        }
    }
}

impl ExpectedError {
    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::ConfigParseError { .. } | Self::DirNotFound { .. } => {
                GradetestExitCode::SETUP_ERROR
            }
            Self::RunFailed { err } => match err {
                RunError::InputDir { .. } => GradetestExitCode::SETUP_ERROR,
                RunError::WriteReport(_) => GradetestExitCode::WRITE_REPORT_FAILED,
                _ => GradetestExitCode::RUN_FAILED,
            },
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self) {
        let mut next_error = match self {
            Self::ConfigParseError { err } => {
                error!("{err}");
                err.source()
            }
            Self::DirNotFound { .. } => {
                error!("{self}");
                None
            }
            Self::RunFailed { err } => {
                error!("{err}");
                err.source()
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {err}");
            next_error = err.source();
        }
    }
}
