// Copyright (c) The gradetest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::events::{TracebackFrame, UncaughtException};
use crate::{config::ReportConfig, helpers::dedent};
use camino::Utf8Path;

/// Renders an uncaught exception as the text shown to a learner.
///
/// Only one frame is shown: the innermost one, except for import errors in introductory exercises
/// where the frame that re-raised the error carries the friendlier message.
pub(crate) fn format_uncaught(
    exception: &UncaughtException,
    config: &ReportConfig,
    cwd: &Utf8Path,
) -> Option<String> {
    let frame = select_frame(exception, config)?;

    let lines: Vec<&str> = frame
        .lines
        .iter()
        .map(|line| match line.strip_prefix("E ") {
            Some(error_line) => error_line.trim_start(),
            None => line.as_str(),
        })
        .collect();
    let text = dedent(lines).join("\n");

    let cwd = cwd.as_str().trim_end_matches('/');
    if cwd.is_empty() {
        Some(text)
    } else {
        Some(text.replace(cwd, "."))
    }
}

fn select_frame<'a>(
    exception: &'a UncaughtException,
    config: &ReportConfig,
) -> Option<&'a TracebackFrame> {
    let frames = &exception.frames;
    let is_first_exercise = config
        .first_exercises
        .iter()
        .any(|exercise| exception.node.contains(exercise.as_str()));

    if is_first_exercise && exception.exception_type.contains("ImportError") && frames.len() > 1 {
        frames.get(frames.len() - 2)
    } else {
        frames.last()
    }
}
