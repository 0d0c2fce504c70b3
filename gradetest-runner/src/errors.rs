// Copyright (c) The gradetest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by gradetest.

use camino::Utf8PathBuf;
use config::ConfigError;
use std::{fmt, io};
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse gradetest config{}", .config_file.as_ref().map(|f| format!(" at `{f}`")).unwrap_or_default())]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Option<Utf8PathBuf>,
    #[source]
    err: ConfigError,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: Option<Utf8PathBuf>, err: ConfigError) -> Self {
        Self { config_file, err }
    }

    /// Returns the config file that failed to parse, if the failure came from a file.
    pub fn config_file(&self) -> Option<&Utf8PathBuf> {
        self.config_file.as_ref()
    }
}

/// An error that occurred while indexing or looking up test definitions in a source file.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SourceIndexError {
    /// The source file could not be read.
    #[error("failed to read test source `{path}`")]
    Read {
        /// The file that was being read.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// The source file is not syntactically valid.
    #[error("failed to parse test source `{path}`: syntax error at line {line}, column {column}")]
    Parse {
        /// The file that failed to parse.
        path: Utf8PathBuf,

        /// The 1-based line of the first syntax error.
        line: u32,

        /// The 1-based column of the first syntax error.
        column: u32,
    },

    /// The source file does not define the requested test.
    #[error("test `{test_id}` is not defined in `{path}`")]
    UnknownTest {
        /// The identifier that was looked up.
        test_id: String,

        /// The file that was searched.
        path: Utf8PathBuf,
    },

    /// The syntax scanner could not be initialized.
    #[error("failed to initialize the source scanner")]
    ScannerInit {
        /// The underlying error.
        #[source]
        error: tree_sitter::LanguageError,
    },
}

impl SourceIndexError {
    /// Returns true if this error indicates a problem with the source file itself rather than an
    /// identifier that couldn't be found.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SourceIndexError::UnknownTest { .. })
    }
}

/// An error that occurred while discovering test files.
#[derive(Debug, Error)]
#[error("failed to discover test files under `{input_dir}`")]
pub struct DiscoveryError {
    input_dir: Utf8PathBuf,
    #[source]
    err: DiscoveryErrorKind,
}

impl DiscoveryError {
    pub(crate) fn new(input_dir: impl Into<Utf8PathBuf>, err: DiscoveryErrorKind) -> Self {
        Self {
            input_dir: input_dir.into(),
            err,
        }
    }
}

/// The kind of error that occurred during test file discovery.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DiscoveryErrorKind {
    /// Walking the directory tree failed.
    #[error("error walking directory")]
    Walk(#[from] walkdir::Error),

    /// A discovered path was not valid UTF-8.
    #[error("path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(std::path::PathBuf),
}

/// An error that occurred while running the external test executor.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExecuteError {
    /// Creating the per-run scratch directory failed.
    #[error("failed to create scratch directory for executor")]
    TempDir {
        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// Writing the reporting plugin to disk failed.
    #[error("failed to write executor plugin to `{path}`")]
    WritePlugin {
        /// The plugin path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// The plugin directory could not be added to the interpreter's search path.
    #[error("failed to build PYTHONPATH for executor plugin")]
    PluginPath {
        /// The underlying error.
        #[source]
        error: std::env::JoinPathsError,
    },

    /// The executor process could not be spawned or waited on.
    #[error("failed to execute `{command}`")]
    Spawn {
        /// The command that was run.
        command: String,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// The executor's event stream could not be read.
    #[error("failed to read executor events from `{path}`")]
    ReadEvents {
        /// The event stream path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// A line in the executor's event stream could not be decoded.
    #[error("malformed executor event at `{path}` line {line_no}")]
    DecodeEvent {
        /// The event stream path.
        path: Utf8PathBuf,

        /// The 1-based line number within the stream.
        line_no: usize,

        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },

    /// The executor speaks a different version of the event schema.
    #[error("executor event schema version {actual} is not supported (expected {expected})")]
    SchemaVersion {
        /// The supported version.
        expected: u32,

        /// The version announced by the executor.
        actual: u32,
    },

    /// The observer rejected an event.
    #[error("failed to process executor event")]
    Observer(#[from] ObserverError),
}

/// An error returned by a [`RunObserver`](crate::reporter::RunObserver) that aborts the run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ObserverError {
    /// A test source could not be indexed.
    #[error("failed to index test sources")]
    SourceIndex(#[from] SourceIndexError),
}

/// An error that occurred while writing the results report.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteReportError {
    /// An I/O error occurred.
    #[error("error writing results to `{file}`")]
    Fs {
        /// The file being written.
        file: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// The report could not be serialized.
    #[error("error serializing results to `{file}`")]
    Serialize {
        /// The file being written.
        file: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: quick_results::SerializeError,
    },
}

/// An error that aborted a run before a report could be written.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunError {
    /// The input directory could not be resolved.
    #[error("failed to resolve input directory `{path}`")]
    InputDir {
        /// The input directory as given.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// Test discovery failed.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// The source scanner could not be constructed.
    #[error(transparent)]
    SourceIndex(#[from] SourceIndexError),

    /// The executor failed.
    #[error("failed to run tests")]
    Execute(#[from] ExecuteError),

    /// The report could not be written.
    #[error(transparent)]
    WriteReport(#[from] WriteReportError),
}

/// Displays an error along with its chain of sources, separated by `: `.
pub struct DisplayErrorChain<E>(E);

impl<E: std::error::Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self(error)
    }
}

impl<E: std::error::Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(err) = source {
            write!(f, ": {err}")?;
            source = err.source();
        }
        Ok(())
    }
}
