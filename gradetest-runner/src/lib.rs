// Copyright (c) The gradetest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for gradetest.
//!
//! gradetest runs a learner's Python test suite with pytest and turns the raw lifecycle events
//! into a stable `results.json` report for an automated grading pipeline. Tests are run and
//! reported in the order they are declared in their source files.
//!
//! For the flow of a run, start at [`runner::run`].

pub mod config;
pub mod errors;
mod helpers;
pub mod list;
pub mod reporter;
pub mod runner;
pub mod source_index;
