// Copyright (c) The gradetest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for a gradetest run.
//!
//! Configuration is layered: the built-in defaults in `default-config.toml` are overlaid by an
//! optional user-provided TOML file.

use crate::errors::ConfigParseError;
use camino::Utf8Path;
use config::{Config, ConfigBuilder, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::collections::BTreeSet;

/// Overall configuration for a run.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunnerConfig {
    /// How test files are found and cleaned up after.
    pub discovery: DiscoveryConfig,

    /// How test definitions are recognized in source files.
    pub index: IndexConfig,

    /// How lifecycle events are turned into a report.
    pub report: ReportConfig,

    /// How the external executor is invoked.
    pub executor: ExecutorConfig,
}

/// Configuration for test file discovery.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DiscoveryConfig {
    /// File name suffix identifying test files.
    pub test_file_suffix: String,

    /// Transient directories removed from the input directory after a run.
    pub cleanup_dirs: Vec<String>,
}

/// Configuration for the source position index.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IndexConfig {
    /// Name prefix identifying test functions.
    pub test_prefix: String,

    /// Dotted base class names identifying test case classes.
    pub test_case_bases: Vec<String>,
}

/// Configuration for result aggregation.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReportConfig {
    /// Marker identifying a variant of a parameterized test in its display name.
    pub variant_marker: String,

    /// Characters that make up executor placeholder output.
    pub placeholder_chars: String,

    /// Exercises whose import errors are reported from the raising frame.
    pub first_exercises: Vec<String>,
}

/// Configuration for the external executor.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExecutorConfig {
    /// The Python interpreter to run pytest with.
    pub python: String,
}

impl RunnerConfig {
    /// The default configuration, embedded at build time.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Returns the built-in default configuration.
    pub fn default_config() -> Self {
        Self::from_sources(None, |_| {}).expect("default config is always valid")
    }

    /// Reads the configuration, overlaying the given file onto the defaults if provided.
    ///
    /// Unknown keys are passed to `unknown_callback` rather than being treated as errors.
    pub fn from_sources(
        config_file: Option<&Utf8Path>,
        mut unknown_callback: impl FnMut(&str),
    ) -> Result<Self, ConfigParseError> {
        let mut builder = Self::make_default_config();
        if let Some(config_file) = config_file {
            builder = builder.add_source(File::new(config_file.as_str(), FileFormat::Toml));
        }

        let file = config_file.map(|f| f.to_owned());
        let config = builder
            .build()
            .map_err(|err| ConfigParseError::new(file.clone(), err))?;

        let mut ignored = BTreeSet::new();
        let config: RunnerConfig = serde_ignored::deserialize(config, |path| {
            ignored.insert(path.to_string());
        })
        .map_err(|err| ConfigParseError::new(file, err))?;

        for path in &ignored {
            unknown_callback(path);
        }
        Ok(config)
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::tempdir;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config_is_valid() {
        let config = RunnerConfig::default_config();
        assert_eq!(config.discovery.test_file_suffix, "_test.py");
        assert_eq!(
            config.discovery.cleanup_dirs,
            [".pytest_cache", "__pycache__"]
        );
        assert_eq!(config.index.test_prefix, "test_");
        assert_eq!(config.index.test_case_bases, ["unittest.TestCase"]);
        assert_eq!(config.report.variant_marker, "variation");
        assert_eq!(config.report.placeholder_chars, "Fu ");
        assert_eq!(config.executor.python, "python3");
    }

    #[test]
    fn user_config_overlays_defaults() {
        let dir = tempdir().expect("tempdir created");
        let config_file = dir.path().join("gradetest.toml");
        std::fs::write(
            &config_file,
            indoc! {r#"
                [executor]
                python = "/opt/python/bin/python3.12"

                [index]
                test-case-bases = ["unittest.TestCase", "unittest.IsolatedAsyncioTestCase"]

                [report]
                colour = "never"
            "#},
        )
        .expect("config written");

        let mut unknown = vec![];
        let config = RunnerConfig::from_sources(Some(&config_file), |path| {
            unknown.push(path.to_owned())
        })
        .expect("config parses");

        assert_eq!(config.executor.python, "/opt/python/bin/python3.12");
        assert_eq!(
            config.index.test_case_bases,
            ["unittest.TestCase", "unittest.IsolatedAsyncioTestCase"]
        );
        // Untouched sections keep their defaults.
        assert_eq!(config.discovery.test_file_suffix, "_test.py");
        assert_eq!(unknown, ["report.colour"]);
    }

    #[test]
    fn invalid_config_is_an_error() {
        let dir = tempdir().expect("tempdir created");
        let config_file = dir.path().join("gradetest.toml");
        std::fs::write(&config_file, "[discovery]\ncleanup-dirs = 5\n").expect("config written");

        let err = RunnerConfig::from_sources(Some(&config_file), |_| {})
            .expect_err("cleanup-dirs must be a list");
        assert_eq!(err.config_file(), Some(&config_file));
    }
}
