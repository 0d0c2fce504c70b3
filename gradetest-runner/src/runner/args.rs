// Copyright (c) The gradetest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// The traceback style the executor always runs with.
pub(super) const TRACEBACK_STYLE: &str = "--tb=no";

/// Removes user-supplied traceback style options and appends [`TRACEBACK_STYLE`].
///
/// Both `--tb VALUE` and `--tb=VALUE` are dropped, as is a trailing `--tb` with no value.
pub fn sanitize_args(args: &[String]) -> Vec<String> {
    let mut sanitized = Vec::with_capacity(args.len() + 1);
    let mut args = args.iter();
    while let Some(arg) = args.next() {
        if arg == "--tb" {
            args.next();
        } else if !arg.starts_with("--tb=") {
            sanitized.push(arg.clone());
        }
    }
    sanitized.push(TRACEBACK_STYLE.to_owned());
    sanitized
}
