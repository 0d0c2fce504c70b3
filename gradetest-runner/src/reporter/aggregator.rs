// Copyright (c) The gradetest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns lifecycle events into a [`Report`].

use super::{
    RunObserver,
    events::{CollectedTest, ExitCondition, Phase, PhaseReport, UncaughtException},
    traceback::format_uncaught,
};
use crate::{
    config::ReportConfig,
    errors::{DisplayErrorChain, ObserverError, SourceIndexError},
    helpers::split_node_id,
    source_index::SourceIndex,
};
use camino::Utf8PathBuf;
use debug_ignore::DebugIgnore;
use indexmap::{IndexMap, IndexSet};
use quick_results::{Report, TestRecord};
use tracing::{debug, warn};

static VARIANT_FAILED: &str =
    "One or more variations of this test failed. Details can be found under each [variant#].";

/// Builds a [`Report`] from the events of a single run.
///
/// The aggregator is the only [`RunObserver`] attached to an executor. It reorders tests into
/// declaration order at collection time, folds each phase report into one [`TestRecord`] per
/// test, and finalizes the report when the session finishes.
#[derive(Debug)]
pub struct ResultAggregator<'ctx> {
    index: DebugIgnore<&'ctx mut SourceIndex>,
    config: &'ctx ReportConfig,
    cwd: Utf8PathBuf,
    file_order: IndexSet<Utf8PathBuf>,
    records: IndexMap<String, RecordState>,
    last_err: Option<String>,
    report: Report,
}

#[derive(Debug)]
struct RecordState {
    record: TestRecord,
    source_resolved: bool,
}

impl RecordState {
    fn new(name: &str) -> Self {
        Self {
            record: TestRecord::new(name),
            source_resolved: false,
        }
    }
}

impl<'ctx> ResultAggregator<'ctx> {
    /// Creates a new aggregator.
    ///
    /// `files` is the list of test files in discovery order. `cwd` is the directory that absolute
    /// paths in tracebacks are rewritten relative to.
    pub fn new(
        index: &'ctx mut SourceIndex,
        config: &'ctx ReportConfig,
        cwd: impl Into<Utf8PathBuf>,
        files: impl IntoIterator<Item = Utf8PathBuf>,
    ) -> Self {
        Self {
            index: DebugIgnore(index),
            config,
            cwd: cwd.into(),
            file_order: files.into_iter().collect(),
            records: IndexMap::new(),
            last_err: None,
            report: Report::new(),
        }
    }

    /// Returns the last unexpected error seen, if any.
    pub fn last_err(&self) -> Option<&str> {
        self.last_err.as_deref()
    }

    /// Consumes the aggregator, returning the report.
    ///
    /// Records not yet added by a session finish are added at the end.
    pub fn into_report(mut self) -> Report {
        self.flush_records();
        self.report
    }

    fn flush_records(&mut self) {
        self.report
            .add_all(self.records.drain(..).map(|(_, state)| state.record));
    }

    fn sort_key(&mut self, test: &CollectedTest) -> Result<(usize, u32, u32), SourceIndexError> {
        let (file_order, _) = self.file_order.insert_full(test.path.clone());
        let lines = self
            .index
            .class_line(&test.node_id, &test.path)
            .and_then(|class_line| {
                let line = self.index.locate(&test.node_id, &test.path)?;
                Ok((class_line, line))
            });

        match lines {
            // Module-level tests sort among classes by their own line.
            Ok((0, line)) => Ok((file_order, line, line)),
            Ok((class_line, line)) => Ok((file_order, class_line, line)),
            Err(error) if !error.is_fatal() => {
                debug!("no declaration order for {}: {}", test.node_id, error);
                Ok((file_order, u32::MAX, u32::MAX))
            }
            Err(error) => Err(error),
        }
    }

    fn record_mut(&mut self, name: &str) -> &mut RecordState {
        self.records
            .entry(name.to_owned())
            .or_insert_with(|| RecordState::new(name))
    }

    fn resolve_source(
        index: &mut SourceIndex,
        state: &mut RecordState,
        report: &PhaseReport,
    ) -> Result<(), SourceIndexError> {
        if state.source_resolved {
            return Ok(());
        }
        state.source_resolved = true;

        match index.extract_source(&report.node_id, &report.path) {
            Ok(source) => {
                if state.record.test_code.is_empty() {
                    state.record.set_test_code(source);
                }
                Ok(())
            }
            Err(error) if !error.is_fatal() => {
                warn!(
                    "test source not found, leaving test_code empty: {}",
                    DisplayErrorChain::new(error)
                );
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    /// Returns the captured text without trailing placeholder noise, or `None` if nothing else
    /// is left.
    fn learner_output<'a>(&self, captured: &'a str) -> Option<&'a str> {
        let placeholder = &self.config.placeholder_chars;
        let stripped = captured.trim_end_matches(|c| placeholder.contains(c));
        (!stripped.trim().is_empty()).then_some(stripped)
    }

    /// Returns the parent's display name if `name` is a variant of a parameterized test.
    fn variant_parent<'a>(&self, name: &'a str) -> Option<&'a str> {
        let (parent, suffix) = name.split_once(' ')?;
        suffix
            .contains(self.config.variant_marker.as_str())
            .then_some(parent)
    }

    fn merge_variant(&mut self, name: &str, parent_name: &str) {
        let Some(variant) = self.records.get(name).map(|state| &state.record) else {
            return;
        };
        let variant_failed = !variant.is_passing();
        let variant_code = variant.test_code.clone();
        let (filename, line_no) = (variant.filename.clone(), variant.line_no);

        let parent = &mut self.record_mut(parent_name).record;
        if parent.filename.is_empty() {
            parent.set_location(filename, line_no);
        }
        if variant_failed && parent.is_passing() {
            parent.fail(Some(VARIANT_FAILED.to_owned()));
            parent.set_test_code(variant_code);
        }
        let parent_task_id = parent.task_id;

        if let Some(state) = self.records.get_mut(name) {
            if state.record.task_id == 0 {
                state.record.set_task_id(parent_task_id);
            }
        }
    }
}

impl RunObserver for ResultAggregator<'_> {
    fn on_collection(&mut self, tests: &mut Vec<CollectedTest>) -> Result<(), ObserverError> {
        let mut keyed = Vec::with_capacity(tests.len());
        for test in tests.drain(..) {
            let key = self.sort_key(&test)?;
            keyed.push((key, test));
        }
        // Stable, so tests the index can't place keep the executor's relative order.
        keyed.sort_by_key(|(key, _)| *key);
        tests.extend(keyed.into_iter().map(|(_, test)| test));

        // Tagged tests get their records in declaration order, which ties in task ID keep.
        for test in tests.iter() {
            if let Some(task_no) = test.task_no {
                let name = node_display_name(&test.node_id);
                self.record_mut(name.as_str()).record.set_task_id(task_no);
            }
        }

        debug!("collected {} tests", tests.len());
        Ok(())
    }

    fn on_phase_report(&mut self, report: &PhaseReport) -> Result<(), ObserverError> {
        let name = match &report.head_line {
            Some(head_line) => head_line.clone(),
            None => node_display_name(&report.node_id),
        };
        let learner_output = self.learner_output(&report.captured_stdout);

        let state = self
            .records
            .entry(name.clone())
            .or_insert_with(|| RecordState::new(&name));
        let record = &mut state.record;
        record.set_duration(report.duration);
        if record.filename.is_empty() {
            record.set_location(report.location.path.as_str(), report.location.line);
        }
        Self::resolve_source(&mut self.index, state, report)?;
        let record = &mut state.record;

        if !report.failed() && report.phase != Phase::Call {
            return Ok(());
        }

        if !record.is_passing() {
            // Keep the classification of the first failure, but pick up output that arrives
            // late, e.g. from a teardown.
            if record.output.is_none() {
                if let Some(output) = learner_output {
                    record.set_output(output);
                }
            }
            return Ok(());
        }

        if let Some(output) = learner_output {
            record.set_output(output);
        }
        if report.failed() {
            let message = report
                .crash
                .as_ref()
                .map(|crash| format!("{}: {}", crash.line, crash.message));
            match report.phase {
                Phase::Call => record.fail(message),
                Phase::Setup | Phase::Teardown => record.error(message),
            };
        }

        if let Some(parent) = self.variant_parent(&name) {
            let parent = parent.to_owned();
            self.merge_variant(&name, &parent);
        }
        Ok(())
    }

    fn on_session_finish(&mut self, exit: ExitCondition) {
        match exit {
            exit if exit.is_ok() => {}
            ExitCondition::TestsFailed => {
                self.report.fail();
            }
            other => {
                let message = self.last_err.clone().unwrap_or_else(|| {
                    format!(
                        "Unexpected ExitCode.{}: check logs for details",
                        other.name()
                    )
                });
                self.report.error(Some(message));
            }
        }
        self.flush_records();
    }

    fn on_uncaught_exception(&mut self, exception: &UncaughtException) {
        debug!(
            "uncaught {} under {}",
            exception.exception_type, exception.node
        );
        if let Some(text) = format_uncaught(exception, self.config, &self.cwd) {
            self.last_err = Some(text);
        }
    }
}

/// Returns the display name for a node ID: the in-file path, dotted.
fn node_display_name(node_id: &str) -> String {
    match split_node_id(node_id) {
        (_, Some(rest)) => rest.replace("::", "."),
        (file, None) => file.to_owned(),
    }
}
