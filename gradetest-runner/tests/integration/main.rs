// Copyright (c) The gradetest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end runs against a scripted executor.

mod fixtures;

use camino::Utf8Path;
use camino_tempfile::{Utf8TempDir, tempdir};
use fixtures::{Script, ScriptedExecutor, ScriptedTest};
use gradetest_runner::{
    config::RunnerConfig,
    errors::{ExecuteError, ObserverError, RunError, SourceIndexError},
    reporter::events::{ExitCondition, TracebackFrame, UncaughtException},
    runner::{RESULTS_FILE_NAME, run},
};
use indoc::indoc;
use pretty_assertions::assert_eq;
use quick_results::{Report, TRUNCATION_NOTICE, TestStatus};

static EXAMPLE_TEST: &str = indoc! {r#"
    import unittest
    import pytest

    from example import hello


    class ExampleTest(unittest.TestCase):
        def test_c(self):
            self.assertEqual(hello(), "Hello, World!")

        @pytest.mark.task(taskno=1)
        def test_a(self):
            print("A" * 600)
            self.assertEqual(hello(), "Goodbye")

        @pytest.mark.task(taskno=1)
        def test_b(self, database):
            self.assertEqual(database.hello(), "Hello, World!")
"#};

static SECOND_TEST: &str = indoc! {r#"
    def test_second_file():
        assert True
"#};

struct Workspace {
    input: Utf8TempDir,
    output: Utf8TempDir,
}

impl Workspace {
    fn new(files: &[(&str, &str)]) -> Self {
        let input = tempdir().expect("input dir created");
        for (name, contents) in files {
            let path = input.path().join(name);
            std::fs::create_dir_all(path.parent().expect("has parent")).expect("dirs created");
            std::fs::write(&path, contents).expect("source written");
        }
        Self {
            input,
            output: tempdir().expect("output dir created"),
        }
    }

    fn run(&self, args: &[&str], executor: &ScriptedExecutor) -> Result<Report, RunError> {
        let args: Vec<String> = args.iter().map(|arg| (*arg).to_owned()).collect();
        run(
            self.input.path(),
            self.output.path(),
            &args,
            &RunnerConfig::default_config(),
            executor,
        )
    }

    fn results_path(&self) -> camino::Utf8PathBuf {
        self.output.path().join(RESULTS_FILE_NAME)
    }

    fn written(&self) -> Report {
        let json = std::fs::read_to_string(self.results_path()).expect("results.json written");
        Report::from_json(&json).expect("results.json parses")
    }
}

#[test]
fn mixed_outcomes() {
    let workspace = Workspace::new(&[("example_test.py", EXAMPLE_TEST)]);
    std::fs::create_dir_all(workspace.input.path().join(".pytest_cache/v")).expect("created");

    // Alphabetical order, which is not how the tests are declared.
    let executor = ScriptedExecutor::new(
        vec![
            ScriptedTest::new(
                "example_test.py",
                "ExampleTest::test_a",
                Script::Stdout(
                    "A".repeat(600),
                    Box::new(Script::Fail {
                        line: 12,
                        message: "expected 2 got 3",
                    }),
                ),
            )
            .with_task(1),
            ScriptedTest::new(
                "example_test.py",
                "ExampleTest::test_b",
                Script::SetupError {
                    line: 15,
                    message: "fixture 'database' not found",
                },
            )
            .with_task(1),
            ScriptedTest::new("example_test.py", "ExampleTest::test_c", Script::Pass),
        ],
        ExitCondition::TestsFailed,
    );

    let report = workspace
        .run(&["-x", "--tb", "long"], &executor)
        .expect("run succeeds");
    let observed = executor.observed();

    assert_eq!(
        observed.run_order,
        [
            "example_test.py::ExampleTest::test_c",
            "example_test.py::ExampleTest::test_a",
            "example_test.py::ExampleTest::test_b",
        ]
    );
    assert_eq!(observed.args, ["-x", "--tb=no"]);
    assert_eq!(observed.files.len(), 1);

    assert_eq!(report.status, TestStatus::Fail);
    let written = workspace.written();
    assert_eq!(written, report.prepared());

    // Sorted by task ID; ties keep the order records were created in.
    let summary: Vec<_> = written
        .tests
        .iter()
        .map(|test| (test.name.as_str(), test.status, test.task_id))
        .collect();
    assert_eq!(
        summary,
        [
            ("Example > c", TestStatus::Pass, 0),
            ("Example > a", TestStatus::Fail, 1),
            ("Example > b", TestStatus::Error, 1),
        ]
    );

    let failed = &written.tests[1];
    assert_eq!(failed.message.as_deref(), Some("12: expected 2 got 3"));
    let output = failed.output.as_deref().expect("output captured");
    assert_eq!(output.chars().count(), 500);
    assert!(output.ends_with(TRUNCATION_NOTICE));
    assert_eq!(
        failed.test_code,
        "print(\"A\" * 600)\nself.assertEqual(hello(), \"Goodbye\")"
    );

    let errored = &written.tests[2];
    assert_eq!(
        errored.message.as_deref(),
        Some("15: fixture 'database' not found")
    );

    assert!(
        !workspace.input.path().join(".pytest_cache").exists(),
        "transient directories are cleaned up"
    );
}

#[test]
fn all_passing() {
    let workspace = Workspace::new(&[
        ("example_test.py", EXAMPLE_TEST),
        ("nested/second_test.py", SECOND_TEST),
    ]);
    let executor = ScriptedExecutor::new(
        vec![
            ScriptedTest::new("nested/second_test.py", "test_second_file", Script::Pass),
            ScriptedTest::new("example_test.py", "ExampleTest::test_c", Script::Pass),
        ],
        ExitCondition::Ok,
    );

    let report = workspace.run(&[], &executor).expect("run succeeds");
    assert_eq!(report.status, TestStatus::Pass);
    assert_eq!(report.message, None);

    // Files are ordered by discovery, which sorts by name.
    let observed = executor.observed();
    assert_eq!(
        observed.run_order,
        [
            "example_test.py::ExampleTest::test_c",
            "nested/second_test.py::test_second_file",
        ]
    );

    let json = std::fs::read_to_string(workspace.results_path()).expect("results.json written");
    assert!(!json.contains("null"), "blank fields are omitted: {json}");
    assert!(!json.contains("\"message\""), "no message on a clean run: {json}");
    assert!(json.starts_with("{\n  \"version\": 3,\n  \"status\": \"pass\","));
}

#[test]
fn import_error_errors_the_run() {
    let workspace = Workspace::new(&[("example_test.py", EXAMPLE_TEST)]);
    let input = workspace
        .input
        .path()
        .canonicalize_utf8()
        .expect("input dir resolves");
    let executor = ScriptedExecutor::new(vec![], ExitCondition::Interrupted).with_uncaught(
        UncaughtException {
            node: "example_test.py".to_owned(),
            exception_type: "builtins.ImportError".to_owned(),
            frames: vec![TracebackFrame {
                path: Some(format!("{input}/example_test.py")),
                line: Some(4),
                lines: vec![
                    "    from example import hello".to_owned(),
                    format!("E   ModuleNotFoundError: No module named 'example' in {input}"),
                ],
            }],
            crash: None,
        },
    );

    let report = workspace.run(&[], &executor).expect("run succeeds");
    assert_eq!(report.status, TestStatus::Error);
    assert_eq!(
        report.message.as_deref(),
        Some(
            "    from example import hello\n\
             ModuleNotFoundError: No module named 'example' in ."
        )
    );
    assert!(report.tests.is_empty());
    assert_eq!(workspace.written(), report.prepared());
}

#[test]
fn malformed_source_aborts_the_run() {
    let workspace = Workspace::new(&[(
        "broken_test.py",
        "class BrokenTest(unittest.TestCase):\n    def test_broken(self:\n        pass\n",
    )]);
    let executor = ScriptedExecutor::new(
        vec![ScriptedTest::new(
            "broken_test.py",
            "BrokenTest::test_broken",
            Script::Pass,
        )],
        ExitCondition::Ok,
    );

    let err = workspace
        .run(&[], &executor)
        .expect_err("a source that can't be indexed is fatal");
    assert!(
        matches!(
            err,
            RunError::Execute(ExecuteError::Observer(ObserverError::SourceIndex(
                SourceIndexError::Parse { .. }
            )))
        ),
        "{err:?}"
    );
    assert!(!workspace.results_path().exists(), "no report is written");
}

#[test]
fn missing_input_dir() {
    let workspace = Workspace::new(&[]);
    let executor = ScriptedExecutor::new(vec![], ExitCondition::Ok);
    let err = run(
        &workspace.input.path().join("missing"),
        workspace.output.path(),
        &[],
        &RunnerConfig::default_config(),
        &executor,
    )
    .expect_err("input dir must exist");
    assert!(matches!(err, RunError::InputDir { .. }), "{err:?}");
}

#[test]
fn unwritable_output_dir() {
    let workspace = Workspace::new(&[("example_test.py", EXAMPLE_TEST)]);
    let executor = ScriptedExecutor::new(vec![], ExitCondition::NoTestsCollected);
    let missing = Utf8Path::new("/nonexistent/gradetest/output");
    let err = run(
        workspace.input.path(),
        missing,
        &[],
        &RunnerConfig::default_config(),
        &executor,
    )
    .expect_err("output dir must exist");
    assert!(matches!(err, RunError::WriteReport(_)), "{err:?}");
}
