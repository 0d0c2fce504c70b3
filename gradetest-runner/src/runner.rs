// Copyright (c) The gradetest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs a test suite end to end and writes the report.
//!
//! The main entry point is [`run`]. Executors plug in through [`TestExecutor`]; the one shipped
//! with gradetest is [`PytestExecutor`].

mod args;
mod pytest;

pub use args::sanitize_args;
pub use pytest::{EVENTS_ENV, MODE_ENV, PytestExecutor};

use crate::{
    config::RunnerConfig,
    errors::{ExecuteError, RunError, WriteReportError},
    list::{cleanup_transient_dirs, discover_test_files},
    reporter::{ResultAggregator, RunObserver},
    source_index::{PythonScanner, SourceIndex},
};
use camino::{Utf8Path, Utf8PathBuf};
use quick_results::Report;
use std::{
    fs::File,
    io::{BufWriter, Write},
};
use tracing::{debug, info};

/// The name of the report written to the output directory.
pub const RESULTS_FILE_NAME: &str = "results.json";

/// What to run.
#[derive(Clone, Debug)]
pub struct ExecuteRequest<'a> {
    /// The directory the executor runs in.
    pub input_dir: &'a Utf8Path,

    /// The test files to run, in discovery order.
    pub files: &'a [Utf8PathBuf],

    /// Extra arguments for the executor, already sanitized.
    pub args: &'a [String],
}

/// Runs tests and reports lifecycle events to an observer.
pub trait TestExecutor {
    /// Runs the tests described by `request`.
    ///
    /// The executor must call [`RunObserver::on_collection`] before running any test, and
    /// [`RunObserver::on_session_finish`] exactly once, last.
    fn execute(
        &self,
        request: &ExecuteRequest<'_>,
        observer: &mut dyn RunObserver,
    ) -> Result<(), ExecuteError>;
}

/// Runs every test file under `input_dir` and writes `results.json` to `output_dir`.
///
/// Test outcomes, including a run that errored, are reported through the returned [`Report`] and
/// the file. An `Err` means no report could be produced at all.
pub fn run(
    input_dir: &Utf8Path,
    output_dir: &Utf8Path,
    passthrough_args: &[String],
    config: &RunnerConfig,
    executor: &dyn TestExecutor,
) -> Result<Report, RunError> {
    let input_dir = input_dir
        .canonicalize_utf8()
        .map_err(|error| RunError::InputDir {
            path: input_dir.to_owned(),
            error,
        })?;

    let result = run_inner(&input_dir, output_dir, passthrough_args, config, executor);
    cleanup_transient_dirs(&input_dir, &config.discovery);
    result
}

fn run_inner(
    input_dir: &Utf8Path,
    output_dir: &Utf8Path,
    passthrough_args: &[String],
    config: &RunnerConfig,
    executor: &dyn TestExecutor,
) -> Result<Report, RunError> {
    let files = discover_test_files(input_dir, &config.discovery)?;
    let args = sanitize_args(passthrough_args);

    let mut index = SourceIndex::new(PythonScanner::new(&config.index)?);
    let mut aggregator =
        ResultAggregator::new(&mut index, &config.report, input_dir, files.iter().cloned());
    let request = ExecuteRequest {
        input_dir,
        files: &files,
        args: &args,
    };
    executor.execute(&request, &mut aggregator)?;
    let report = aggregator.into_report();

    let path = write_report(&report, output_dir)?;
    info!("generated {RESULTS_FILE_NAME}");
    debug!("report written to {path}");
    Ok(report)
}

/// Writes `report` to `results.json` in `output_dir`, returning the path written to.
pub fn write_report(
    report: &Report,
    output_dir: &Utf8Path,
) -> Result<Utf8PathBuf, WriteReportError> {
    let path = output_dir.join(RESULTS_FILE_NAME);
    let file = File::create(&path).map_err(|error| WriteReportError::Fs {
        file: path.clone(),
        error,
    })?;

    let mut writer = BufWriter::new(file);
    report
        .serialize(&mut writer)
        .map_err(|error| WriteReportError::Serialize {
            file: path.clone(),
            error,
        })?;
    writer.flush().map_err(|error| WriteReportError::Fs {
        file: path.clone(),
        error,
    })?;
    Ok(path)
}
