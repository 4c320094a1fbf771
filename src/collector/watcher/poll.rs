// SPDX-License-Identifier: Apache-2.0

//! Watcher that stats the followed file on an interval, for file systems
//! without usable notifications such as NFS.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use super::traits::{FileWatcher, Wakeup, WatcherError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Stamp {
    len: u64,
    modified: Option<SystemTime>,
}

impl Stamp {
    fn of(path: &Path) -> Option<Self> {
        let metadata = fs::metadata(path).ok()?;
        if !metadata.is_file() {
            return None;
        }
        Some(Self {
            len: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }
}

pub struct PollWatcher {
    path: Option<PathBuf>,
    /// Last observed stamp, `None` while the file is missing
    last: Option<Stamp>,
    interval: Duration,
}

impl PollWatcher {
    pub fn new(interval: Duration) -> Self {
        Self {
            path: None,
            last: None,
            interval,
        }
    }
}

impl FileWatcher for PollWatcher {
    fn watch(&mut self, path: &Path) -> Result<(), WatcherError> {
        let stamp = Stamp::of(path).ok_or_else(|| WatcherError::Watch {
            path: path.to_path_buf(),
            message: "not a readable file".to_string(),
        })?;
        self.path = Some(path.to_path_buf());
        self.last = Some(stamp);
        Ok(())
    }

    fn wait(&mut self, timeout: Duration) -> Result<Wakeup, WatcherError> {
        let Some(path) = self.path.as_deref() else {
            std::thread::sleep(timeout);
            return Ok(Wakeup::Idle);
        };
        let deadline = Instant::now() + timeout;

        loop {
            let now = Stamp::of(path);
            let wakeup = match (self.last, now) {
                (Some(_), None) => Wakeup::Removed,
                (None, Some(_)) => Wakeup::Changed,
                (Some(before), Some(after)) if before != after => Wakeup::Changed,
                _ => Wakeup::Idle,
            };
            self.last = now;
            if wakeup != Wakeup::Idle {
                return Ok(wakeup);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(Wakeup::Idle);
            }
            std::thread::sleep(remaining.min(self.interval));
        }
    }

    fn backend_name(&self) -> &'static str {
        "poll"
    }
}
