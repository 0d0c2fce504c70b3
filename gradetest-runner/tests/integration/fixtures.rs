// Copyright (c) The gradetest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use gradetest_runner::{
    errors::ExecuteError,
    reporter::{
        RunObserver,
        events::{
            CollectedTest, CrashInfo, ExitCondition, Location, Outcome, Phase, PhaseReport,
            UncaughtException,
        },
    },
    runner::{ExecuteRequest, TestExecutor},
};
use std::sync::Mutex;

/// How a scripted test behaves when run.
#[derive(Clone, Debug)]
pub(crate) enum Script {
    Pass,
    Fail { line: u32, message: &'static str },
    SetupError { line: u32, message: &'static str },
    Stdout(String, Box<Script>),
}

/// A test known to the scripted executor.
#[derive(Clone, Debug)]
pub(crate) struct ScriptedTest {
    /// The file, relative to the input directory.
    pub(crate) file: &'static str,
    /// The in-file path, e.g. `ExampleTest::test_hello`.
    pub(crate) path: &'static str,
    pub(crate) task_no: Option<u32>,
    pub(crate) script: Script,
}

impl ScriptedTest {
    pub(crate) fn new(file: &'static str, path: &'static str, script: Script) -> Self {
        Self {
            file,
            path,
            task_no: None,
            script,
        }
    }

    pub(crate) fn with_task(mut self, task_no: u32) -> Self {
        self.task_no = Some(task_no);
        self
    }

    fn node_id(&self) -> String {
        format!("{}::{}", self.file, self.path)
    }
}

/// What the scripted executor saw during a run.
#[derive(Debug, Default)]
pub(crate) struct Observed {
    pub(crate) args: Vec<String>,
    pub(crate) files: Vec<Utf8PathBuf>,
    pub(crate) run_order: Vec<String>,
}

/// An in-process [`TestExecutor`] that plays back scripted events instead of running Python.
#[derive(Debug)]
pub(crate) struct ScriptedExecutor {
    tests: Vec<ScriptedTest>,
    uncaught: Option<UncaughtException>,
    exit: ExitCondition,
    observed: Mutex<Observed>,
}

impl ScriptedExecutor {
    pub(crate) fn new(tests: Vec<ScriptedTest>, exit: ExitCondition) -> Self {
        Self {
            tests,
            uncaught: None,
            exit,
            observed: Mutex::new(Observed::default()),
        }
    }

    pub(crate) fn with_uncaught(mut self, exception: UncaughtException) -> Self {
        self.uncaught = Some(exception);
        self
    }

    pub(crate) fn observed(self) -> Observed {
        self.observed.into_inner().expect("lock not poisoned")
    }

    fn phase_reports(test: &ScriptedTest, path: &Utf8Path) -> Vec<PhaseReport> {
        let base = PhaseReport {
            node_id: test.node_id(),
            head_line: None,
            path: path.to_owned(),
            phase: Phase::Setup,
            outcome: Outcome::Passed,
            duration: 0.01,
            crash: None,
            captured_stdout: String::new(),
            location: Location {
                path: test.file.to_owned(),
                line: 1,
                domain: test.path.replace("::", "."),
            },
        };
        let phase = |phase, outcome, crash: Option<(u32, &str)>, stdout: &str| PhaseReport {
            phase,
            outcome,
            crash: crash.map(|(line, message)| CrashInfo {
                path: Some(path.to_string()),
                line,
                message: message.to_owned(),
            }),
            captured_stdout: stdout.to_owned(),
            ..base.clone()
        };

        let (script, stdout) = match &test.script {
            Script::Stdout(stdout, script) => (script.as_ref(), stdout.as_str()),
            script => (script, ""),
        };
        match script {
            Script::Pass => vec![
                phase(Phase::Setup, Outcome::Passed, None, ""),
                phase(Phase::Call, Outcome::Passed, None, stdout),
                phase(Phase::Teardown, Outcome::Passed, None, ""),
            ],
            Script::Fail { line, message } => vec![
                phase(Phase::Setup, Outcome::Passed, None, ""),
                phase(Phase::Call, Outcome::Failed, Some((*line, *message)), stdout),
                phase(Phase::Teardown, Outcome::Passed, None, ""),
            ],
            Script::SetupError { line, message } => vec![
                phase(Phase::Setup, Outcome::Failed, Some((*line, *message)), stdout),
                phase(Phase::Teardown, Outcome::Passed, None, ""),
            ],
            Script::Stdout(..) => panic!("nested stdout scripts are not supported"),
        }
    }
}

impl TestExecutor for ScriptedExecutor {
    fn execute(
        &self,
        request: &ExecuteRequest<'_>,
        observer: &mut dyn RunObserver,
    ) -> Result<(), ExecuteError> {
        let mut collected: Vec<CollectedTest> = self
            .tests
            .iter()
            .map(|test| CollectedTest {
                node_id: test.node_id(),
                path: request.input_dir.join(test.file),
                task_no: test.task_no,
            })
            .collect();
        observer.on_collection(&mut collected)?;

        let mut observed = self.observed.lock().expect("lock not poisoned");
        observed.args = request.args.to_vec();
        observed.files = request.files.to_vec();

        for collected in &collected {
            let test = self
                .tests
                .iter()
                .find(|test| test.node_id() == collected.node_id)
                .expect("collected tests come from the script");
            observed.run_order.push(collected.node_id.clone());
            for report in Self::phase_reports(test, &collected.path) {
                observer.on_phase_report(&report)?;
            }
        }

        if let Some(exception) = &self.uncaught {
            observer.on_uncaught_exception(exception);
        }
        observer.on_session_finish(self.exit);
        Ok(())
    }
}
