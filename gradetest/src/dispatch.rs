// Copyright (c) The gradetest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::{DirKind, ExpectedError, GradetestExitCode},
    output::OutputOpts,
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use gradetest_runner::{
    config::RunnerConfig,
    runner::{PytestExecutor, run},
};
use tracing::{debug, warn};

/// Runs a learner's Python test suite and writes `results.json` for an automated grader.
///
/// Test outcomes are reported in the JSON file: the exit code is 0 whenever the report was
/// written, whether or not tests passed.
#[derive(Debug, Parser)]
#[command(version)]
pub struct GradetestApp {
    /// Config file overlaid onto the built-in defaults
    #[arg(long, value_name = "PATH", env = "GRADETEST_CONFIG")]
    config: Option<Utf8PathBuf>,

    #[command(flatten)]
    output: OutputOpts,

    /// Directory containing the test files to run
    #[arg(value_name = "INPUT")]
    input_dir: Utf8PathBuf,

    /// Directory to write results.json to
    #[arg(value_name = "OUTPUT")]
    output_dir: Utf8PathBuf,

    /// Extra arguments passed through to pytest
    #[arg(value_name = "PYTEST_ARGS", last = true, allow_hyphen_values = true)]
    pytest_args: Vec<String>,
}

impl GradetestApp {
    /// Initializes logging. Must be called before [`exec`](Self::exec).
    pub fn init_output(&self) {
        self.output.init();
    }

    /// Executes the app, returning the process exit code.
    pub fn exec(&self) -> Result<i32, ExpectedError> {
        check_dir(DirKind::Input, &self.input_dir)?;
        check_dir(DirKind::Output, &self.output_dir)?;

        let config = RunnerConfig::from_sources(self.config.as_deref(), |path| {
            warn!("ignoring unknown configuration key `{path}`");
        })?;
        debug!("loaded config: {config:?}");

        let executor = PytestExecutor::new(&config.executor);
        let report = run(
            &self.input_dir,
            &self.output_dir,
            &self.pytest_args,
            &config,
            &executor,
        )?;
        debug!(
            "run finished with status {:?} across {} tests",
            report.status,
            report.tests.len()
        );

        Ok(GradetestExitCode::OK)
    }
}

fn check_dir(kind: DirKind, path: &Utf8Path) -> Result<(), ExpectedError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(ExpectedError::DirNotFound {
            kind,
            path: path.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_app() {
        GradetestApp::command().debug_assert();
    }

    #[test]
    fn parse_args() {
        let app = GradetestApp::try_parse_from([
            "gradetest",
            "-v",
            "in",
            "out",
            "--",
            "-x",
            "--tb",
            "long",
        ])
        .expect("valid arguments");
        assert_eq!(app.input_dir, "in");
        assert_eq!(app.output_dir, "out");
        assert_eq!(app.pytest_args, ["-x", "--tb", "long"]);
        assert!(app.output.verbose);
        assert_eq!(app.config, None);
    }

    #[test]
    fn pytest_args_need_separator() {
        GradetestApp::try_parse_from(["gradetest", "in", "out", "-x"])
            .expect_err("-x is not a gradetest flag");
    }

    #[test]
    fn missing_input_dir() {
        let output = camino_tempfile::tempdir().expect("tempdir created");
        let app = GradetestApp::try_parse_from([
            "gradetest",
            "/nonexistent/gradetest/input",
            output.path().as_str(),
        ])
        .expect("valid arguments");

        let err = app.exec().expect_err("input dir does not exist");
        assert!(
            matches!(
                err,
                ExpectedError::DirNotFound {
                    kind: DirKind::Input,
                    ..
                }
            ),
            "{err:?}"
        );
        assert_eq!(err.process_exit_code(), GradetestExitCode::SETUP_ERROR);
    }
}
