// SPDX-License-Identifier: Apache-2.0

//! Log-tailing collector.
//!
//! The collector follows a dynamic set of log files, matches every appended
//! line against a per-file regex with named capture groups, passes the
//! captured fields through an optional transform, and writes the resulting
//! record to a [`Sink`] tagged with a host identifier.
//!
//! Features:
//! - One parallel watch task per registered file
//! - Live reconciliation when files are registered or removed while running
//! - Native file notifications (inotify/FSEvents/ReadDirectoryChangesW) with polling fallback
//! - Configurable handling of unmatched lines and failing transforms

pub mod config;
pub mod entry;
pub mod error;
pub mod follow;
pub mod lifecycle;
pub mod pattern;
pub mod registry;
pub mod sink;
pub mod task;
pub mod transform;
pub mod watcher;

pub use config::{CollectorConfig, NoMatchPolicy, StartAt, TransformFailurePolicy};
pub use entry::{EntryId, FileEntry};
pub use error::{Error, Result};
pub use follow::LineFollower;
pub use lifecycle::{Collector, TaskFailure};
pub use pattern::{LinePattern, Record};
pub use registry::Registry;
pub use sink::{ConsoleSink, FileSink, Sink, SinkError};
pub use task::TaskState;
pub use transform::{Identity, Transform, TransformError};
pub use watcher::{FileWatcher, Wakeup, WatchMode, WatcherConfig};
