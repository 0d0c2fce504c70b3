// Copyright (c) The gradetest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{ExecuteRequest, TestExecutor};
use crate::{
    config::ExecutorConfig,
    errors::ExecuteError,
    reporter::{
        RunObserver,
        events::{EVENT_SCHEMA_VERSION, ExecutorEvent, ExitCondition},
    },
};
use camino::Utf8Path;
use duct::cmd;
use itertools::Itertools;
use std::{
    env,
    fs::File,
    io::{self, BufRead, BufReader},
    process::ExitStatus,
};
use tracing::{debug, warn};

static PLUGIN_SOURCE: &str = include_str!("gradetest_plugin.py");
static PLUGIN_MODULE: &str = "gradetest_plugin";

/// The environment variable naming the file the plugin writes events to.
pub const EVENTS_ENV: &str = "GRADETEST_EVENTS";

/// The environment variable telling the plugin which pass it is running in.
pub const MODE_ENV: &str = "GRADETEST_MODE";

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Pass {
    Collect,
    Run,
}

impl Pass {
    fn as_str(self) -> &'static str {
        match self {
            Pass::Collect => "collect",
            Pass::Run => "run",
        }
    }
}

/// Runs tests with pytest.
///
/// pytest is run twice: once to collect tests, so the observer can put them in order, and once to
/// run them in that order. A small plugin, written to a scratch directory for the duration of the
/// run, reports lifecycle events from inside pytest.
#[derive(Clone, Debug)]
pub struct PytestExecutor {
    python: String,
}

impl PytestExecutor {
    /// Creates a new executor.
    pub fn new(config: &ExecutorConfig) -> Self {
        Self {
            python: config.python.clone(),
        }
    }

    fn run_pytest(
        &self,
        pass: Pass,
        request: &ExecuteRequest<'_>,
        plugin_dir: &Utf8Path,
        events: &Utf8Path,
        targets: &[String],
    ) -> Result<ExitStatus, ExecuteError> {
        let mut argv: Vec<&str> = vec!["-m", "pytest", "-p", PLUGIN_MODULE];
        if pass == Pass::Collect {
            argv.extend(["--collect-only", "-q"]);
        }
        argv.extend(request.args.iter().map(String::as_str));
        argv.extend(targets.iter().map(String::as_str));

        let command = format!("{} {}", self.python, argv.iter().join(" "));
        debug!("running {} pass: {command}", pass.as_str());

        let mut paths = vec![plugin_dir.as_std_path().to_owned()];
        if let Some(existing) = env::var_os("PYTHONPATH") {
            paths.extend(env::split_paths(&existing));
        }
        let python_path =
            env::join_paths(paths).map_err(|error| ExecuteError::PluginPath { error })?;

        let mut expression = cmd(self.python.as_str(), &argv)
            .dir(request.input_dir.as_std_path())
            .env("PYTHONPATH", python_path)
            .env(EVENTS_ENV, events.as_str())
            .env(MODE_ENV, pass.as_str())
            .unchecked();
        if pass == Pass::Collect {
            // The collection listing is only of interest when debugging.
            expression = expression.stdout_capture();
        }

        let output = expression
            .run()
            .map_err(|error| ExecuteError::Spawn { command, error })?;
        if !output.stdout.is_empty() {
            debug!("collection output:\n{}", String::from_utf8_lossy(&output.stdout));
        }
        Ok(output.status)
    }
}

impl TestExecutor for PytestExecutor {
    fn execute(
        &self,
        request: &ExecuteRequest<'_>,
        observer: &mut dyn RunObserver,
    ) -> Result<(), ExecuteError> {
        let scratch = camino_tempfile::Builder::new()
            .prefix("gradetest-")
            .tempdir()
            .map_err(|error| ExecuteError::TempDir { error })?;
        let plugin_dir = scratch.path();
        let plugin_path = plugin_dir.join(format!("{PLUGIN_MODULE}.py"));
        std::fs::write(&plugin_path, PLUGIN_SOURCE).map_err(|error| {
            ExecuteError::WritePlugin {
                path: plugin_path.clone(),
                error,
            }
        })?;

        let files: Vec<String> = request.files.iter().map(|f| f.to_string()).collect();

        // Collect.
        let collect_events = plugin_dir.join("collect.jsonl");
        self.run_pytest(Pass::Collect, request, plugin_dir, &collect_events, &files)?;

        let mut tests = Vec::new();
        let mut uncollectable = Vec::new();
        for event in read_events(&collect_events)? {
            match event {
                ExecutorEvent::Collected(test) => tests.push(test),
                ExecutorEvent::CollectError { path } => uncollectable.push(path),
                // Collection errors come up again during the run.
                _ => {}
            }
        }
        observer.on_collection(&mut tests)?;

        // Run. Files that failed to collect are passed along so the failure is reported.
        let targets: Vec<String> = if tests.is_empty() && uncollectable.is_empty() {
            files
        } else {
            tests
                .iter()
                .map(|test| test.selector())
                .chain(uncollectable.iter().map(|path| path.to_string()))
                .collect()
        };
        let run_events = plugin_dir.join("run.jsonl");
        let status = self.run_pytest(Pass::Run, request, plugin_dir, &run_events, &targets)?;

        let mut finished = false;
        for event in read_events(&run_events)? {
            match event {
                ExecutorEvent::PhaseReport(report) => observer.on_phase_report(&report)?,
                ExecutorEvent::UncaughtException(exception) => {
                    observer.on_uncaught_exception(&exception)
                }
                ExecutorEvent::SessionFinish { exit_status } => {
                    observer.on_session_finish(ExitCondition::from_exit_status(exit_status));
                    finished = true;
                }
                ExecutorEvent::StreamStart { .. }
                | ExecutorEvent::Collected(_)
                | ExecutorEvent::CollectError { .. } => {}
            }
        }

        if !finished {
            // Killed by a signal, or crashed before the session could finish.
            let exit = match status.code() {
                Some(code) => ExitCondition::from_exit_status(code),
                None => ExitCondition::Interrupted,
            };
            warn!(
                "pytest exited without finishing its session ({status}), reporting {}",
                exit.name()
            );
            observer.on_session_finish(exit);
        }

        Ok(())
    }
}

/// Reads the events written by the plugin.
///
/// A missing file means the plugin never loaded, which is treated as an empty stream.
fn read_events(path: &Utf8Path) -> Result<Vec<ExecutorEvent>, ExecuteError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            debug!("no events written to {path}");
            return Ok(Vec::new());
        }
        Err(error) => {
            return Err(ExecuteError::ReadEvents {
                path: path.to_owned(),
                error,
            });
        }
    };

    parse_events(path, BufReader::new(file))
}

fn parse_events(
    path: &Utf8Path,
    reader: impl BufRead,
) -> Result<Vec<ExecutorEvent>, ExecuteError> {
    let mut events = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|error| ExecuteError::ReadEvents {
            path: path.to_owned(),
            error,
        })?;
        if line.trim().is_empty() {
            continue;
        }

        let event: ExecutorEvent =
            serde_json::from_str(&line).map_err(|error| ExecuteError::DecodeEvent {
                path: path.to_owned(),
                line_no: idx + 1,
                error,
            })?;
        if events.is_empty() {
            let version = match event {
                ExecutorEvent::StreamStart { version } => version,
                _ => 0,
            };
            if version != EVENT_SCHEMA_VERSION {
                return Err(ExecuteError::SchemaVersion {
                    expected: EVENT_SCHEMA_VERSION,
                    actual: version,
                });
            }
        }
        events.push(event);
    }
    Ok(events)
}
