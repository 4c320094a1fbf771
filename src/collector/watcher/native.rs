// SPDX-License-Identifier: Apache-2.0

//! Watcher backed by OS notifications through `notify`
//! (inotify, FSEvents, ReadDirectoryChangesW).

use std::path::Path;
use std::sync::mpsc::{Receiver, RecvTimeoutError, channel};
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::warn;

use super::traits::{FileWatcher, Wakeup, WatcherError};

#[cfg(target_os = "linux")]
const BACKEND: &str = "inotify";
#[cfg(target_os = "macos")]
const BACKEND: &str = "FSEvents";
#[cfg(target_os = "windows")]
const BACKEND: &str = "ReadDirectoryChangesW";
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const BACKEND: &str = "native";

pub struct NativeWatcher {
    watcher: RecommendedWatcher,
    events: Receiver<notify::Result<Event>>,
}

impl NativeWatcher {
    pub fn new(debounce: Duration) -> Result<Self, WatcherError> {
        let (tx, events) = channel();

        let watcher = RecommendedWatcher::new(
            move |res| {
                // The receiver is gone once the task exits
                let _ = tx.send(res);
            },
            Config::default().with_poll_interval(debounce),
        )
        .map_err(|e| WatcherError::Init {
            backend: BACKEND,
            message: e.to_string(),
        })?;

        Ok(Self { watcher, events })
    }
}

fn classify(event: &Event) -> Wakeup {
    match event.kind {
        EventKind::Access(_) => Wakeup::Idle,
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_)) => Wakeup::Removed,
        _ => Wakeup::Changed,
    }
}

impl FileWatcher for NativeWatcher {
    fn watch(&mut self, path: &Path) -> Result<(), WatcherError> {
        self.watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|e| WatcherError::Watch {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
    }

    fn wait(&mut self, timeout: Duration) -> Result<Wakeup, WatcherError> {
        let first = match self.events.recv_timeout(timeout) {
            Ok(res) => res,
            Err(RecvTimeoutError::Timeout) => return Ok(Wakeup::Idle),
            Err(RecvTimeoutError::Disconnected) => return Err(WatcherError::Disconnected),
        };

        // Coalesce everything already queued into one wakeup
        let mut wakeup = Wakeup::Idle;
        for res in std::iter::once(first).chain(self.events.try_iter()) {
            match res {
                Ok(event) => wakeup = wakeup.merge(classify(&event)),
                Err(e) => warn!(backend = BACKEND, error = %e, "File watcher error"),
            }
        }
        Ok(wakeup)
    }

    fn backend_name(&self) -> &'static str {
        BACKEND
    }
}
