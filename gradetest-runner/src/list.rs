// Copyright (c) The gradetest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Finding test files, and cleaning up after the executor.

use crate::{
    config::DiscoveryConfig,
    errors::{DiscoveryError, DiscoveryErrorKind},
};
use camino::{Utf8Path, Utf8PathBuf};
use std::io;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Returns every test file under `input_dir`, in discovery order.
///
/// Directories are walked depth-first with entries sorted by file name, so the order is stable
/// across filesystems.
pub fn discover_test_files(
    input_dir: &Utf8Path,
    config: &DiscoveryConfig,
) -> Result<Vec<Utf8PathBuf>, DiscoveryError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(input_dir).sort_by_file_name() {
        let entry = entry.map_err(|err| DiscoveryError::new(input_dir, err.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = Utf8PathBuf::from_path_buf(entry.into_path()).map_err(|path| {
            DiscoveryError::new(input_dir, DiscoveryErrorKind::NonUtf8Path(path))
        })?;
        if path
            .file_name()
            .is_some_and(|name| name.ends_with(&config.test_file_suffix))
        {
            files.push(path);
        }
    }

    debug!("discovered {} test files under {input_dir}", files.len());
    Ok(files)
}

/// Removes the executor's transient directories from `input_dir`.
///
/// This is best-effort: failures are logged and otherwise ignored.
pub fn cleanup_transient_dirs(input_dir: &Utf8Path, config: &DiscoveryConfig) {
    let mut to_remove = Vec::new();
    let mut walker = WalkDir::new(input_dir).into_iter();
    while let Some(entry) = walker.next() {
        let Ok(entry) = entry else {
            continue;
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        let is_transient = entry
            .file_name()
            .to_str()
            .is_some_and(|name| config.cleanup_dirs.iter().any(|dir| dir == name));
        if is_transient {
            to_remove.push(entry.into_path());
            walker.skip_current_dir();
        }
    }

    for dir in to_remove {
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => debug!("removed {}", dir.display()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => warn!("failed to remove {}: {error}", dir.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunnerConfig;
    use camino_tempfile::tempdir;
    use pretty_assertions::assert_eq;

    fn touch(path: &Utf8Path) {
        std::fs::create_dir_all(path.parent().expect("has parent")).expect("dirs created");
        std::fs::write(path, "").expect("file written");
    }

    #[test]
    fn discovers_in_name_order() {
        let dir = tempdir().expect("tempdir created");
        let root = dir.path();
        for file in [
            "zebra_test.py",
            "nested/alpha_test.py",
            "apple_test.py",
            "apple.py",
            "conftest.py",
            "notes_test.txt",
        ] {
            touch(&root.join(file));
        }

        let config = RunnerConfig::default_config().discovery;
        let files = discover_test_files(root, &config).expect("discovery succeeds");
        let relative: Vec<_> = files
            .iter()
            .map(|file| file.strip_prefix(root).expect("under root").as_str())
            .collect();
        assert_eq!(
            relative,
            ["apple_test.py", "nested/alpha_test.py", "zebra_test.py"]
        );
    }

    #[test]
    fn missing_input_dir_is_an_error() {
        let dir = tempdir().expect("tempdir created");
        let config = RunnerConfig::default_config().discovery;
        discover_test_files(&dir.path().join("missing"), &config)
            .expect_err("missing directory can't be walked");
    }

    #[test]
    fn cleanup_removes_transient_dirs() {
        let dir = tempdir().expect("tempdir created");
        let root = dir.path();
        touch(&root.join(".pytest_cache/v/cache/lastfailed"));
        touch(&root.join("__pycache__/example.cpython-312.pyc"));
        touch(&root.join("nested/__pycache__/helper.cpython-312.pyc"));
        touch(&root.join("example_test.py"));

        let config = RunnerConfig::default_config().discovery;
        cleanup_transient_dirs(root, &config);

        assert!(!root.join(".pytest_cache").exists());
        assert!(!root.join("__pycache__").exists());
        assert!(!root.join("nested/__pycache__").exists());
        assert!(root.join("nested").exists());
        assert!(root.join("example_test.py").exists());

        // Nothing left to clean up is fine too.
        cleanup_transient_dirs(root, &config);
    }
}
