// Copyright (c) The gradetest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::{DeserializeError, SerializeError},
    serialize::{prepare_report, serialize_report},
};
use serde::{Deserialize, Serialize};
use std::{fmt, io};

/// The maximum number of characters stored in [`TestRecord::output`].
pub const OUTPUT_LIMIT: usize = 500;

/// The notice appended to output that was cut down to [`OUTPUT_LIMIT`] characters.
pub const TRUNCATION_NOTICE: &str = " [Output was truncated. Please limit to 500 chars]";

/// The status of a single test, or of a whole run.
///
/// Statuses are ordered `Pass < Fail < Error`. Once a status has moved forward along this order,
/// it must never move back for the lifetime of a run.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[derive(Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    /// The test passed, or no test in the run failed.
    #[default]
    Pass,

    /// An assertion or runtime failure occurred in a test body.
    Fail,

    /// Something went wrong outside of a test body: a fixture, a setup or teardown step, or the
    /// run itself.
    Error,
}

impl TestStatus {
    /// Returns true if this is [`TestStatus::Pass`].
    pub fn is_pass(self) -> bool {
        self == TestStatus::Pass
    }

    /// Moves this status forward to `to`. Does nothing if `to` is not further along.
    pub fn escalate(&mut self, to: TestStatus) {
        if to > *self {
            *self = to;
        }
    }

    /// Returns the lowercase string representation of this status.
    pub fn as_str(self) -> &'static str {
        match self {
            TestStatus::Pass => "pass",
            TestStatus::Fail => "fail",
            TestStatus::Error => "error",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result of a single test.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct TestRecord {
    /// The display name of this test.
    pub name: String,

    /// The status of this test.
    #[serde(default)]
    pub status: TestStatus,

    /// A human-readable description of the failure or error, usually `"{line}: {summary}"`.
    #[serde(default, skip_serializing_if = "is_blank")]
    pub message: Option<String>,

    /// Captured console output, trimmed and truncated to [`OUTPUT_LIMIT`] characters.
    ///
    /// Use [`Self::set_output`] to maintain these invariants.
    #[serde(default, skip_serializing_if = "is_blank")]
    pub output: Option<String>,

    /// The task this test is grouped under. 0 means unassigned.
    #[serde(default)]
    pub task_id: u32,

    /// The file the test is defined in.
    #[serde(default)]
    pub filename: String,

    /// The line the test is defined on.
    #[serde(default)]
    pub line_no: u32,

    /// The wall-clock time taken by the test, in seconds.
    #[serde(default)]
    pub duration: f64,

    /// The dedented source of the test body.
    #[serde(default)]
    pub test_code: String,
}

impl TestRecord {
    /// Creates a new, passing `TestRecord` with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::Pass,
            message: None,
            output: None,
            task_id: 0,
            filename: String::new(),
            line_no: 0,
            duration: 0.0,
            test_code: String::new(),
        }
    }

    /// Returns true if nothing has gone wrong with this test so far.
    pub fn is_passing(&self) -> bool {
        self.status.is_pass()
    }

    /// Marks this test as failed.
    ///
    /// The message is only replaced if a non-empty one is provided. An errored test stays errored.
    pub fn fail(&mut self, message: Option<String>) -> &mut Self {
        self.update(TestStatus::Fail, message)
    }

    /// Marks this test as errored.
    ///
    /// The message is only replaced if a non-empty one is provided.
    pub fn error(&mut self, message: Option<String>) -> &mut Self {
        self.update(TestStatus::Error, message)
    }

    /// Sets the captured output for this test.
    ///
    /// Output consisting only of whitespace is ignored. Otherwise it is trimmed, and if it is
    /// longer than [`OUTPUT_LIMIT`] characters it is cut short and ends with
    /// [`TRUNCATION_NOTICE`].
    pub fn set_output(&mut self, captured: &str) -> &mut Self {
        let captured = captured.trim();
        if captured.is_empty() {
            return self;
        }

        let output = if captured.chars().count() > OUTPUT_LIMIT {
            let keep = OUTPUT_LIMIT - TRUNCATION_NOTICE.chars().count();
            let mut truncated: String = captured.chars().take(keep).collect();
            truncated.push_str(TRUNCATION_NOTICE);
            truncated
        } else {
            captured.to_owned()
        };
        self.output = Some(output);
        self
    }

    /// Sets the task ID for this test.
    pub fn set_task_id(&mut self, task_id: u32) -> &mut Self {
        self.task_id = task_id;
        self
    }

    /// Sets the source location of this test.
    pub fn set_location(&mut self, filename: impl Into<String>, line_no: u32) -> &mut Self {
        self.filename = filename.into();
        self.line_no = line_no;
        self
    }

    /// Sets the time taken by this test, in seconds.
    pub fn set_duration(&mut self, duration: f64) -> &mut Self {
        self.duration = duration;
        self
    }

    /// Sets the source of the test body.
    pub fn set_test_code(&mut self, test_code: impl Into<String>) -> &mut Self {
        self.test_code = test_code.into();
        self
    }

    fn update(&mut self, status: TestStatus, message: Option<String>) -> &mut Self {
        self.status.escalate(status);
        if let Some(message) = message.filter(|message| !message.is_empty()) {
            self.message = Some(message);
        }
        self
    }
}

/// The root of a results report: the verdict for an entire run.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Report {
    /// The version of the report format.
    pub version: u32,

    /// The overall status of the run.
    #[serde(default)]
    pub status: TestStatus,

    /// An explanation of why the run errored. Only set if `status` is [`TestStatus::Error`].
    #[serde(default, skip_serializing_if = "is_blank")]
    pub message: Option<String>,

    /// The individual test results.
    #[serde(default)]
    pub tests: Vec<TestRecord>,
}

impl Report {
    /// The current version of the report format.
    pub const VERSION: u32 = 3;

    /// Creates a new, passing `Report` with no tests.
    pub fn new() -> Self {
        Self {
            version: Self::VERSION,
            status: TestStatus::Pass,
            message: None,
            tests: vec![],
        }
    }

    /// Adds a test record, marking the report as failed if the record failed.
    ///
    /// An errored report is never downgraded.
    pub fn add(&mut self, record: TestRecord) -> &mut Self {
        if record.status == TestStatus::Fail {
            self.fail();
        }
        self.tests.push(record);
        self
    }

    /// Adds several test records. See [`Self::add`].
    pub fn add_all(&mut self, records: impl IntoIterator<Item = TestRecord>) -> &mut Self {
        for record in records {
            self.add(record);
        }
        self
    }

    /// Marks the run as having at least one failure.
    pub fn fail(&mut self) -> &mut Self {
        self.status.escalate(TestStatus::Fail);
        self
    }

    /// Marks the run as fatally errored, with an optional explanation.
    pub fn error(&mut self, message: Option<String>) -> &mut Self {
        self.status = TestStatus::Error;
        self.message = message;
        self
    }

    /// Returns the report in the shape it is emitted in.
    ///
    /// Test names are rewritten for display and tests are stably sorted by task ID. `self` is not
    /// modified.
    pub fn prepared(&self) -> Report {
        prepare_report(self)
    }

    /// Serializes this report to the given writer as indented JSON.
    pub fn serialize(&self, writer: impl io::Write) -> Result<(), SerializeError> {
        serialize_report(self, writer)
    }

    /// Serializes this report to a string of indented JSON.
    pub fn to_json(&self) -> Result<String, SerializeError> {
        let mut buf: Vec<u8> = vec![];
        self.serialize(&mut buf)?;
        // serde_json only ever writes valid UTF-8.
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Parses a report from JSON, e.g. a golden file.
    pub fn from_json(json: &str) -> Result<Self, DeserializeError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(str::is_empty)
}
