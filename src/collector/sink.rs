// SPDX-License-Identifier: Apache-2.0

//! Destinations for collected records.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

use crate::collector::pattern::Record;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Receives one structured record per collected line.
///
/// Watch tasks call `write` concurrently, so implementations serialize access
/// to their underlying stream themselves. A write must not block
/// indefinitely.
pub trait Sink: Send + Sync {
    fn write(&self, identifier: &str, path: &Path, record: &Record) -> Result<(), SinkError>;
}

/// Prints `<identifier> <path> <record as JSON>` to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl ConsoleSink {
    fn format(identifier: &str, path: &Path, record: &Record) -> Result<String, SinkError> {
        Ok(format!(
            "{} {} {}\n",
            identifier,
            path.display(),
            serde_json::to_string(record)?
        ))
    }
}

impl Sink for ConsoleSink {
    fn write(&self, identifier: &str, path: &Path, record: &Record) -> Result<(), SinkError> {
        let line = Self::format(identifier, path, record)?;
        // One write_all under the stdout lock keeps records from interleaving
        let mut stdout = io::stdout().lock();
        stdout.write_all(line.as_bytes())?;
        stdout.flush()?;
        Ok(())
    }
}

/// Appends `[<identifier>] <record as JSON>` lines to a single file.
///
/// The file is truncated when the sink is created. Every record is flushed
/// before `write` returns.
pub struct FileSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl FileSink {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn format(identifier: &str, record: &Record) -> Result<String, SinkError> {
        Ok(format!(
            "[{}] {}\n",
            identifier,
            serde_json::to_string(record)?
        ))
    }
}

impl Sink for FileSink {
    fn write(&self, identifier: &str, _path: &Path, record: &Record) -> Result<(), SinkError> {
        let line = Self::format(identifier, record)?;

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(line.as_bytes())?;
        writer.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for FileSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSink").field("path", &self.path).finish()
    }
}
