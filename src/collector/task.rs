// SPDX-License-Identifier: Apache-2.0

//! Per-file watch task.
//!
//! Each registered file is followed by one `WatchTask` running on tokio's
//! blocking pool. The task stops at a line boundary when
//! either its own shutdown token (entry removed) or the collector's global
//! token (collector stopped) is cancelled.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::collector::config::{CollectorConfig, NoMatchPolicy, TransformFailurePolicy};
use crate::collector::entry::FileEntry;
use crate::collector::error::{Error, Result};
use crate::collector::follow::LineFollower;
use crate::collector::pattern::Record;
use crate::collector::sink::Sink;
use crate::collector::watcher::{FileWatcher, Wakeup, create_watcher};

/// Observable state of a watch task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    /// File is open and being followed
    Running,
    /// The task stopped because of an error
    Failed(String),
    /// The task exited after a shutdown signal
    Exited,
}

/// Task state shared between a running task and the collector.
#[derive(Debug)]
pub(crate) struct TaskStatus {
    state: Mutex<TaskState>,
}

impl TaskStatus {
    fn new() -> Self {
        Self {
            state: Mutex::new(TaskState::Running),
        }
    }

    pub(crate) fn get(&self) -> TaskState {
        self.lock().clone()
    }

    pub(crate) fn fail(&self, message: String) {
        *self.lock() = TaskState::Failed(message);
    }

    /// Mark the task exited unless it already recorded a failure
    fn exit(&self) {
        let mut state = self.lock();
        if !matches!(*state, TaskState::Failed(_)) {
            *state = TaskState::Exited;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TaskState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Collector-wide output settings, read by every task at write time so that
/// changes apply to running tasks.
pub(crate) struct Output {
    sink: RwLock<Arc<dyn Sink>>,
    identifier: RwLock<Arc<str>>,
}

impl Output {
    pub(crate) fn new(sink: Arc<dyn Sink>, identifier: impl Into<Arc<str>>) -> Self {
        Self {
            sink: RwLock::new(sink),
            identifier: RwLock::new(identifier.into()),
        }
    }

    pub(crate) fn sink(&self) -> Arc<dyn Sink> {
        self.sink
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_sink(&self, sink: Arc<dyn Sink>) {
        *self.sink.write().unwrap_or_else(PoisonError::into_inner) = sink;
    }

    pub(crate) fn identifier(&self) -> Arc<str> {
        self.identifier
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_identifier(&self, identifier: impl Into<Arc<str>>) {
        *self
            .identifier
            .write()
            .unwrap_or_else(PoisonError::into_inner) = identifier.into();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    /// The entry was removed from the registry
    Removed,
    /// The collector was stopped
    Stopped,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Removed => write!(f, "entry removed"),
            StopReason::Stopped => write!(f, "collector stopped"),
        }
    }
}

/// State of one watch task: the entry it follows, its cancellation signals
/// and the settings it reads from.
pub(crate) struct WatchTask {
    entry: Arc<FileEntry>,
    /// Graceful shutdown for this task only
    shutdown: CancellationToken,
    /// Collector-wide cancellation
    cancel: CancellationToken,
    status: Arc<TaskStatus>,
    output: Arc<Output>,
    config: Arc<CollectorConfig>,
}

impl WatchTask {
    pub(crate) fn new(
        entry: Arc<FileEntry>,
        cancel: CancellationToken,
        output: Arc<Output>,
        config: Arc<CollectorConfig>,
    ) -> Self {
        Self {
            entry,
            shutdown: CancellationToken::new(),
            cancel,
            status: Arc::new(TaskStatus::new()),
            output,
            config,
        }
    }

    /// Open the file, then follow it on the blocking pool.
    ///
    /// The file is opened before this returns, so with `StartAt::End` every
    /// line appended after the call is delivered. An open failure is recorded
    /// in the task state and nothing is spawned. Must be called within a tokio
    /// runtime.
    pub(crate) fn spawn(self) -> TaskHandle {
        let entry = self.entry.clone();
        let shutdown = self.shutdown.clone();
        let status = self.status.clone();

        let join = match self.open() {
            Ok(follower) => {
                debug!(entry = %entry.id(), path = ?entry.path(), "Spawning watch task");
                Some(tokio::task::spawn_blocking(move || self.run(follower)))
            }
            Err(e) => {
                error!(
                    entry = %entry.id(),
                    path = ?entry.path(),
                    error = %e,
                    "Watch task failed"
                );
                self.status.fail(e.to_string());
                None
            }
        };

        TaskHandle {
            entry,
            shutdown,
            status,
            join,
        }
    }

    fn open(&self) -> Result<LineFollower> {
        let path = self.entry.path();
        LineFollower::open(path, self.config.start_at, self.config.max_line_size).map_err(|source| {
            Error::TaskOpenFailure {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    fn run(self, follower: LineFollower) {
        match self.follow(follower) {
            Ok(reason) => {
                debug!(
                    entry = %self.entry.id(),
                    path = ?self.entry.path(),
                    reason = %reason,
                    "Watch task exited"
                );
                self.status.exit();
            }
            Err(e) => {
                error!(
                    entry = %self.entry.id(),
                    path = ?self.entry.path(),
                    error = %e,
                    "Watch task failed"
                );
                self.status.fail(e.to_string());
            }
        }
    }

    fn follow(&self, mut follower: LineFollower) -> Result<StopReason> {
        let path = self.entry.path();
        let mut watcher = self.create_watcher();
        info!(
            entry = %self.entry.id(),
            path = ?path,
            offset = follower.offset(),
            backend = watcher.as_ref().map(|w| w.backend_name()).unwrap_or("sleep"),
            "Following file"
        );

        loop {
            while let Some(line) = follower.next_line()? {
                self.handle_line(&line)?;

                if let Some(reason) = self.stop_reason() {
                    return Ok(reason);
                }
            }

            if let Some(reason) = self.stop_reason() {
                return Ok(reason);
            }

            match watcher.as_mut() {
                Some(w) => match w.wait(self.config.poll_interval) {
                    Ok(Wakeup::Removed) => {
                        debug!(path = ?path, "Followed file was removed, keeping open handle");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(
                            path = ?path,
                            error = %e,
                            "File watcher failed, falling back to fixed interval reads"
                        );
                        watcher = None;
                    }
                },
                None => std::thread::sleep(self.config.poll_interval),
            }
        }
    }

    fn create_watcher(&self) -> Option<Box<dyn FileWatcher>> {
        let path = self.entry.path();
        let mut watcher = match create_watcher(&self.config.watcher_config()) {
            Ok(w) => w,
            Err(e) => {
                warn!(path = ?path, error = %e, "Failed to create file watcher");
                return None;
            }
        };

        match watcher.watch(path) {
            Ok(()) => Some(watcher),
            Err(e) => {
                warn!(path = ?path, error = %e, "Failed to watch file");
                None
            }
        }
    }

    /// Turn one line into a record and hand it to the sink.
    ///
    /// Only a `FailTask` no-match policy makes this return an error; sink
    /// failures are logged and the line is lost.
    fn handle_line(&self, line: &str) -> Result<()> {
        let Some(record) = self.extract(line)? else {
            return Ok(());
        };

        let sink = self.output.sink();
        let identifier = self.output.identifier();
        if let Err(e) = sink.write(&identifier, self.entry.path(), &record) {
            warn!(
                entry = %self.entry.id(),
                path = ?self.entry.path(),
                error = %e,
                "Failed to write record to sink"
            );
        }

        Ok(())
    }

    /// Apply pattern, no-match policy, transform and transform-failure
    /// policy. `None` means the line is dropped.
    fn extract(&self, line: &str) -> Result<Option<Record>> {
        let Some(fields) = self.entry.pattern().captures(line) else {
            return match self.config.no_match {
                NoMatchPolicy::EmitEmpty => Ok(Some(Record::new())),
                NoMatchPolicy::Drop => {
                    debug!(path = ?self.entry.path(), line = %line, "Dropping unmatched line");
                    Ok(None)
                }
                NoMatchPolicy::FailTask => Err(Error::NoMatch {
                    path: self.entry.path().to_path_buf(),
                }),
            };
        };

        match self.entry.transform().parse(fields.clone()) {
            Ok(record) => Ok(Some(record)),
            Err(e) => match self.config.transform_failure {
                TransformFailurePolicy::UseMatched => {
                    warn!(path = ?self.entry.path(), error = %e, "Transform failed, using matched fields");
                    Ok(Some(fields))
                }
                TransformFailurePolicy::Drop => {
                    warn!(path = ?self.entry.path(), error = %e, "Transform failed, dropping line");
                    Ok(None)
                }
            },
        }
    }

    fn stop_reason(&self) -> Option<StopReason> {
        if self.cancel.is_cancelled() {
            Some(StopReason::Stopped)
        } else if self.shutdown.is_cancelled() {
            Some(StopReason::Removed)
        } else {
            None
        }
    }
}

/// The collector's handle on a spawned watch task.
pub(crate) struct TaskHandle {
    entry: Arc<FileEntry>,
    shutdown: CancellationToken,
    status: Arc<TaskStatus>,
    /// `None` when the file could not be opened
    join: Option<JoinHandle<()>>,
}

impl TaskHandle {
    pub(crate) fn entry(&self) -> &Arc<FileEntry> {
        &self.entry
    }

    pub(crate) fn state(&self) -> TaskState {
        self.status.get()
    }

    /// Ask the task to exit at its next check. Idempotent.
    pub(crate) fn signal_shutdown(&self) {
        self.shutdown.cancel();
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(|join| join.is_finished())
    }

    /// Wait for the task to exit.
    pub(crate) async fn join(self) {
        let Some(join) = self.join else {
            return;
        };
        if let Err(e) = join.await {
            error!(
                entry = %self.entry.id(),
                path = ?self.entry.path(),
                error = %e,
                "Watch task panicked"
            );
            self.status.fail(format!("task panicked: {}", e));
        }
    }
}
