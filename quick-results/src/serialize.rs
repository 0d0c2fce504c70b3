// Copyright (c) The gradetest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serialize a `Report`.

use crate::{Report, SerializeError};
use std::io;

static CLASS_SUFFIX: &str = "Test";
static TEST_PREFIX: &str = "test_";
static NAME_SEPARATOR: &str = " > ";

pub(crate) fn serialize_report(
    report: &Report,
    writer: impl io::Write,
) -> Result<(), SerializeError> {
    let prepared = prepare_report(report);
    serde_json::to_writer_pretty(writer, &prepared)?;
    Ok(())
}

pub(crate) fn prepare_report(report: &Report) -> Report {
    let mut prepared = report.clone();
    for test in &mut prepared.tests {
        test.name = display_name(&test.name);
    }
    // sort_by_key is stable, so tests in the same task keep their relative order.
    prepared.tests.sort_by_key(|test| test.task_id);
    prepared
}

/// Rewrites a test name for display.
///
/// `ExampleTest.test_hello_world` becomes `Example > hello world`: the `Test` suffix of the
/// enclosing class and the `test_` prefix of the function are folded into a `" > "` separator, and
/// underscores become spaces. Names without an enclosing class only have their underscores
/// replaced.
pub(crate) fn display_name(name: &str) -> String {
    let folded = match name.split_once('.') {
        Some((class, rest))
            if !class.is_empty()
                && !class.contains(char::is_whitespace)
                && rest.starts_with(TEST_PREFIX) =>
        {
            let class = class.strip_suffix(CLASS_SUFFIX).unwrap_or(class);
            let class = if class.is_empty() { CLASS_SUFFIX } else { class };
            format!("{class}{NAME_SEPARATOR}{}", &rest[TEST_PREFIX.len()..])
        }
        _ => name.to_owned(),
    };
    folded.replace('_', " ")
}
