// Copyright (c) The gradetest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! An index of where tests are defined in their source files.
//!
//! The executor reports tests by hierarchical node ID (`file::Class::test_fn`). The
//! [`SourceIndex`] maps those IDs back to line ranges in the source, which is used to run tests in
//! declaration order and to quote a test's body in the report.
//!
//! Files are parsed lazily, once, on first lookup. The index lives for a single run and is never
//! invalidated: sources are not expected to change while tests are running.

use crate::{config::IndexConfig, errors::SourceIndexError, helpers::dedent};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;
use tracing::debug;
use tree_sitter::{Node, Parser};

/// Where a test is defined.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Position {
    /// The 1-based line the test's definition starts on.
    pub start_line: u32,

    /// The 1-based line of the last statement that is effectively executed by the test.
    ///
    /// For a body that ends in a loop or a conditional, this is the start of the last statement
    /// nested inside it, not the syntactic end of the function.
    pub end_line: u32,
}

/// The tests and test-case classes defined in one source file.
#[derive(Clone, Debug, Default)]
pub struct FileIndex {
    lines: Vec<String>,
    tests: HashMap<String, Position>,
    classes: HashMap<String, u32>,
}

impl FileIndex {
    /// Creates an empty index over the given source text.
    pub fn new(source: &str) -> Self {
        Self {
            lines: source.lines().map(str::to_owned).collect(),
            tests: HashMap::new(),
            classes: HashMap::new(),
        }
    }

    /// Records a test at the given in-file path, e.g. `ExampleTest::test_hello`.
    pub fn insert_test(&mut self, path: impl Into<String>, position: Position) {
        self.tests.insert(path.into(), position);
    }

    /// Records a test-case class at the given in-file path.
    pub fn insert_class(&mut self, path: impl Into<String>, start_line: u32) {
        self.classes.insert(path.into(), start_line);
    }

    /// Returns the position of the test at the given in-file path.
    pub fn test(&self, path: &str) -> Option<Position> {
        self.tests.get(path).copied()
    }

    /// Returns the start line of the test-case class at the given in-file path.
    pub fn class(&self, path: &str) -> Option<u32> {
        self.classes.get(path).copied()
    }

    /// Returns the number of tests in this file.
    pub fn test_count(&self) -> usize {
        self.tests.len()
    }

    /// Returns the literal source of a test's body.
    ///
    /// This is the text following the definition line up to and including the line after the last
    /// executed statement, without a trailing empty line and with common indentation removed.
    pub fn body_source(&self, position: Position) -> String {
        let start = (position.start_line as usize).min(self.lines.len());
        let end = (position.end_line as usize + 1).clamp(start, self.lines.len());

        let mut lines: Vec<&str> = self.lines[start..end].iter().map(String::as_str).collect();
        if lines.last().is_some_and(|line| line.is_empty()) {
            lines.pop();
        }
        dedent(lines).join("\n")
    }
}

/// Recognizes test definitions in source text.
///
/// Any syntax-aware scanner works, as long as it can find where definitions start and which
/// statement runs last.
pub trait SourceScanner {
    /// Scans `source`, the contents of `path`, for tests.
    fn scan(&mut self, path: &Utf8Path, source: &str) -> Result<FileIndex, SourceIndexError>;
}

/// A [`SourceScanner`] for Python sources, backed by tree-sitter.
pub struct PythonScanner {
    parser: Parser,
    test_prefix: String,
    test_case_bases: Vec<String>,
}

impl PythonScanner {
    /// Creates a new scanner.
    pub fn new(config: &IndexConfig) -> Result<Self, SourceIndexError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|error| SourceIndexError::ScannerInit { error })?;
        Ok(Self {
            parser,
            test_prefix: config.test_prefix.clone(),
            test_case_bases: config.test_case_bases.clone(),
        })
    }

    fn visit(
        &self,
        node: Node<'_>,
        source: &[u8],
        hierarchy: &mut Vec<String>,
        index: &mut FileIndex,
    ) {
        let mut pushed = false;
        match node.kind() {
            "class_definition" => {
                if let Some(name) = field_text(node, "name", source) {
                    if self.is_test_case(node, source) {
                        hierarchy.push(name.to_owned());
                        index.insert_class(hierarchy.join("::"), line_number(node));
                        pushed = true;
                    }
                }
            }
            "function_definition" => {
                if let Some(name) = field_text(node, "name", source) {
                    if name.starts_with(&self.test_prefix) {
                        let start_line = line_number(node);
                        let end_line = node
                            .child_by_field_name("body")
                            .and_then(last_executed_statement)
                            .map_or(start_line, line_number);
                        let mut path = hierarchy.clone();
                        path.push(name.to_owned());
                        index.insert_test(
                            path.join("::"),
                            Position {
                                start_line,
                                end_line,
                            },
                        );
                    }
                }
            }
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.visit(child, source, hierarchy, index);
        }

        if pushed {
            hierarchy.pop();
        }
    }

    fn is_test_case(&self, class: Node<'_>, source: &[u8]) -> bool {
        let Some(superclasses) = class.child_by_field_name("superclasses") else {
            return false;
        };
        let mut cursor = superclasses.walk();
        let is_test_case = superclasses
            .named_children(&mut cursor)
            .filter(|base| base.kind() == "attribute")
            .filter_map(|base| base.utf8_text(source).ok())
            .any(|base| {
                let base: String = base.split_whitespace().collect();
                self.test_case_bases.contains(&base)
            });
        is_test_case
    }
}

impl SourceScanner for PythonScanner {
    fn scan(&mut self, path: &Utf8Path, source: &str) -> Result<FileIndex, SourceIndexError> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| SourceIndexError::Parse {
                path: path.to_owned(),
                line: 1,
                column: 1,
            })?;

        let root = tree.root_node();
        if root.has_error() {
            let error = first_error(root).unwrap_or(root);
            let point = error.start_position();
            return Err(SourceIndexError::Parse {
                path: path.to_owned(),
                line: point.row as u32 + 1,
                column: point.column as u32 + 1,
            });
        }

        let mut index = FileIndex::new(source);
        self.visit(root, source.as_bytes(), &mut Vec::new(), &mut index);
        Ok(index)
    }
}

/// A per-run, lazily built index of test positions across source files.
pub struct SourceIndex {
    scanner: Box<dyn SourceScanner>,
    files: HashMap<Utf8PathBuf, IndexedFile>,
}

enum IndexedFile {
    Indexed(FileIndex),
    Malformed { line: u32, column: u32 },
}

impl SourceIndex {
    /// Creates a new, empty index that parses files with the given scanner.
    pub fn new(scanner: impl SourceScanner + 'static) -> Self {
        Self {
            scanner: Box::new(scanner),
            files: HashMap::new(),
        }
    }

    /// Returns the line the test with the given node ID is defined on.
    pub fn locate(&mut self, node_id: &str, file: &Utf8Path) -> Result<u32, SourceIndexError> {
        Ok(self.position(node_id, file)?.start_line)
    }

    /// Returns the position of the test with the given node ID.
    pub fn position(
        &mut self,
        node_id: &str,
        file: &Utf8Path,
    ) -> Result<Position, SourceIndexError> {
        let path = TestPath::new(node_id);
        self.file_index(file)?
            .test(&path.test)
            .ok_or_else(|| unknown_test(node_id, file))
    }

    /// Returns the line the test-case class enclosing the given test starts on, or 0 if the test
    /// is not part of a test-case class.
    pub fn class_line(
        &mut self,
        node_id: &str,
        file: &Utf8Path,
    ) -> Result<u32, SourceIndexError> {
        let path = TestPath::new(node_id);
        let index = self.file_index(file)?;
        match &path.class {
            Some(class) => index.class(class).ok_or_else(|| unknown_test(node_id, file)),
            None => Ok(0),
        }
    }

    /// Returns the dedented source of the body of the test with the given node ID.
    pub fn extract_source(
        &mut self,
        node_id: &str,
        file: &Utf8Path,
    ) -> Result<String, SourceIndexError> {
        let path = TestPath::new(node_id);
        let index = self.file_index(file)?;
        let position = index
            .test(&path.test)
            .ok_or_else(|| unknown_test(node_id, file))?;
        Ok(index.body_source(position))
    }

    fn file_index(&mut self, file: &Utf8Path) -> Result<&FileIndex, SourceIndexError> {
        if !self.files.contains_key(file) {
            let source = std::fs::read_to_string(file).map_err(|error| SourceIndexError::Read {
                path: file.to_owned(),
                error,
            })?;
            let indexed = match self.scanner.scan(file, &source) {
                Ok(index) => {
                    debug!("indexed {} tests in {file}", index.test_count());
                    IndexedFile::Indexed(index)
                }
                Err(SourceIndexError::Parse { line, column, .. }) => {
                    IndexedFile::Malformed { line, column }
                }
                Err(other) => return Err(other),
            };
            self.files.insert(file.to_owned(), indexed);
        }

        match &self.files[file] {
            IndexedFile::Indexed(index) => Ok(index),
            IndexedFile::Malformed { line, column } => Err(SourceIndexError::Parse {
                path: file.to_owned(),
                line: *line,
                column: *column,
            }),
        }
    }
}

/// The in-file part of a node ID.
struct TestPath {
    /// The test, e.g. `ExampleTest::test_hello`.
    test: String,

    /// The enclosing class, e.g. `ExampleTest`, if any.
    class: Option<String>,
}

impl TestPath {
    fn new(node_id: &str) -> Self {
        let (_, rest) = crate::helpers::split_node_id(node_id);
        let mut segments: Vec<&str> = rest.unwrap_or_default().split("::").collect();
        if let Some(last) = segments.last_mut() {
            // Parametrized tests carry their parameters as a `[...]` suffix.
            if let Some((name, _)) = last.split_once('[') {
                *last = name;
            }
        }

        let class = (segments.len() > 1).then(|| segments[..segments.len() - 1].join("::"));
        Self {
            test: segments.join("::"),
            class,
        }
    }
}

fn unknown_test(node_id: &str, file: &Utf8Path) -> SourceIndexError {
    SourceIndexError::UnknownTest {
        test_id: node_id.to_owned(),
        path: file.to_owned(),
    }
}

fn field_text<'a>(node: Node<'_>, field: &str, source: &'a [u8]) -> Option<&'a str> {
    node.child_by_field_name(field)?.utf8_text(source).ok()
}

fn line_number(node: Node<'_>) -> u32 {
    node.start_position().row as u32 + 1
}

/// Returns the last statement of a block, ignoring comments.
fn last_statement(block: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = block.walk();
    let last = block
        .named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .last();
    last
}

/// Descends through trailing loops and conditionals to the statement that runs last.
fn last_executed_statement(body: Node<'_>) -> Option<Node<'_>> {
    let mut last = last_statement(body)?;
    loop {
        let nested = match last.kind() {
            "for_statement" | "while_statement" => last.child_by_field_name("body"),
            "if_statement" => last.child_by_field_name("consequence"),
            _ => None,
        };
        match nested.and_then(last_statement) {
            Some(next) => last = next,
            None => return Some(last),
        }
    }
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|child| child.has_error())
        .find_map(first_error)
}
