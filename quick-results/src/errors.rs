// Copyright (c) The gradetest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;

/// An error that occurs while serializing a [`Report`](crate::Report).
///
/// Returned by [`Report::serialize`](crate::Report::serialize) and
/// [`Report::to_json`](crate::Report::to_json).
#[derive(Debug, Error)]
#[error("error serializing results report")]
pub struct SerializeError {
    #[from]
    inner: serde_json::Error,
}

/// An error that occurs while deserializing a [`Report`](crate::Report).
///
/// Returned by [`Report::from_json`](crate::Report::from_json).
#[derive(Debug, Error)]
#[error("error deserializing results report")]
pub struct DeserializeError {
    #[from]
    inner: serde_json::Error,
}
