// Copyright (c) The gradetest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Removes the leading spaces shared by every non-empty line.
///
/// Empty lines are left alone and don't count towards the shared indentation. Only spaces are
/// considered indentation.
pub(crate) fn dedent<'a>(lines: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
    let lines: Vec<&str> = lines.into_iter().collect();
    let indent = lines
        .iter()
        .filter(|line| !line.is_empty())
        .map(|line| line.len() - line.trim_start_matches(' ').len())
        .min()
        .unwrap_or(0);

    lines
        .into_iter()
        .map(|line| if line.is_empty() { line } else { &line[indent..] })
        .collect()
}

/// Splits a node ID like `dir/file_test.py::Class::test_fn` into its file and in-file parts.
pub(crate) fn split_node_id(node_id: &str) -> (&str, Option<&str>) {
    match node_id.split_once("::") {
        Some((file, rest)) => (file, Some(rest)),
        None => (node_id, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn dedent_removes_common_indentation() {
        let lines = ["        x = 1", "", "        if x:", "            y = 2"];
        assert_eq!(dedent(lines), ["x = 1", "", "if x:", "    y = 2"]);
    }

    #[test]
    fn dedent_counts_whitespace_only_lines() {
        let lines = ["    a", "  ", "    b"];
        assert_eq!(dedent(lines), ["  a", "", "  b"]);
    }

    #[test]
    fn dedent_without_content() {
        let lines = ["", ""];
        assert_eq!(dedent(lines), ["", ""]);
        assert_eq!(dedent([]), Vec::<&str>::new());
    }

    #[test]
    fn node_id_parts() {
        assert_eq!(
            split_node_id("tests/example_test.py::ExampleTest::test_hello"),
            ("tests/example_test.py", Some("ExampleTest::test_hello"))
        );
        assert_eq!(split_node_id("example_test.py"), ("example_test.py", None));
    }
}
