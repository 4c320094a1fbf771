// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("failed to start {backend} watcher: {message}")]
    Init {
        backend: &'static str,
        message: String,
    },

    #[error("cannot watch {}: {message}", path.display())]
    Watch { path: PathBuf, message: String },

    #[error("watcher event channel closed")]
    Disconnected,
}

/// Why [`FileWatcher::wait`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wakeup {
    /// The file was written to, truncated or touched
    Changed,
    /// The path no longer names the file. An open handle can still be drained.
    Removed,
    /// Nothing relevant happened
    Idle,
}

impl Wakeup {
    /// Combine two wakeups, keeping the more significant one.
    pub(crate) fn merge(self, other: Wakeup) -> Wakeup {
        match (self, other) {
            (Wakeup::Removed, _) | (_, Wakeup::Removed) => Wakeup::Removed,
            (Wakeup::Changed, _) | (_, Wakeup::Changed) => Wakeup::Changed,
            _ => Wakeup::Idle,
        }
    }
}

/// Blocks a watch task until its file changes.
///
/// Wakeups are hints. Tasks read the file after every return, `Idle`
/// included, so a missed notification only delays a line.
pub trait FileWatcher: Send {
    /// Start watching `path`, which must be an existing file.
    fn watch(&mut self, path: &Path) -> Result<(), WatcherError>;

    /// Block for at most `timeout`.
    fn wait(&mut self, timeout: Duration) -> Result<Wakeup, WatcherError>;

    fn backend_name(&self) -> &'static str;
}
