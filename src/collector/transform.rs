// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

use crate::collector::pattern::Record;

/// Error returned by a [`Transform`] that could not restructure a record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("transform failed: {0}")]
pub struct TransformError(String);

impl TransformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Restructures the fields captured from a line before they reach the sink.
///
/// A failing transform is not fatal to the watch task; what happens to the
/// line is decided by the collector's
/// [`TransformFailurePolicy`](crate::collector::TransformFailurePolicy).
pub trait Transform: Send + Sync {
    fn parse(&self, fields: Record) -> Result<Record, TransformError>;
}

/// Passes the captured fields through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Transform for Identity {
    fn parse(&self, fields: Record) -> Result<Record, TransformError> {
        Ok(fields)
    }
}

impl<F> Transform for F
where
    F: Fn(Record) -> Result<Record, TransformError> + Send + Sync,
{
    fn parse(&self, fields: Record) -> Result<Record, TransformError> {
        self(fields)
    }
}
