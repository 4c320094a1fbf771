// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("collector already started")]
    AlreadyStarted,

    #[error("collector not started")]
    NotStarted,

    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to open {path:?}: {source}")]
    TaskOpenFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line in {path:?} does not match pattern")]
    NoMatch { path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
