// Copyright (c) The gradetest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Generate and read machine-graded test result reports in Rust.
//!
//! A [`Report`] is the whole-run verdict: an overall [`TestStatus`], an optional explanation, and
//! one [`TestRecord`] per test. Reports serialize to an indented JSON document that is stable
//! enough to compare against golden files.

mod errors;
mod report;
mod serialize;

pub use errors::*;
pub use report::*;
