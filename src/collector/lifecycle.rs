// SPDX-License-Identifier: Apache-2.0

//! Collector lifecycle: start, stop, wait and reconciliation of running
//! watch tasks against the registry.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::collector::config::CollectorConfig;
use crate::collector::entry::{EntryId, FileEntry};
use crate::collector::error::{Error, Result};
use crate::collector::registry::Registry;
use crate::collector::sink::Sink;
use crate::collector::task::{Output, TaskHandle, TaskState, WatchTask};
use crate::collector::transform::Transform;

/// A registered file whose watch task stopped with an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub id: EntryId,
    pub path: PathBuf,
    pub error: String,
}

/// Lifecycle state, guarded by a single lock across start, stop and reconcile.
#[derive(Default)]
struct State {
    started: bool,
    /// Global cancellation, replaced with a fresh token on every start
    cancel: CancellationToken,
    tasks: HashMap<EntryId, TaskHandle>,
    /// Tasks removed by reconciliation that may still be exiting
    retired: Vec<TaskHandle>,
}

impl State {
    fn spawn(
        &mut self,
        entry: Arc<FileEntry>,
        output: &Arc<Output>,
        config: &Arc<CollectorConfig>,
    ) {
        let id = entry.id();
        let task = WatchTask::new(entry, self.cancel.clone(), output.clone(), config.clone());
        self.tasks.insert(id, task.spawn());
    }
}

/// Follows every file in its [`Registry`] and writes the extracted records to
/// a [`Sink`].
///
/// The collector is `Stopped` until [`start`](Collector::start) and returns
/// to `Stopped` after [`stop`](Collector::stop). While running, changes to the
/// registry made through [`register`](Collector::register),
/// [`unregister`](Collector::unregister) and
/// [`unregister_all`](Collector::unregister_all) are applied to the running
/// tasks immediately. Share it between tasks with an `Arc`.
pub struct Collector {
    registry: Registry,
    output: Arc<Output>,
    config: Arc<CollectorConfig>,
    state: Mutex<State>,
}

impl Collector {
    /// Create a stopped collector writing to `sink`, identified by the
    /// host name.
    pub fn new(sink: Arc<dyn Sink>) -> Self {
        let identifier = gethostname::gethostname().to_string_lossy().into_owned();

        Self {
            registry: Registry::new(),
            output: Arc::new(Output::new(sink, identifier)),
            config: Arc::new(CollectorConfig::default()),
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_config(mut self, config: CollectorConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub fn with_identifier(self, identifier: impl Into<String>) -> Self {
        self.output.set_identifier(identifier.into());
        self
    }

    /// Use an already populated registry.
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    pub fn identifier(&self) -> String {
        self.output.identifier().to_string()
    }

    /// Replace the identifier attached to records written from now on.
    pub fn set_identifier(&self, identifier: impl Into<String>) {
        self.output.set_identifier(identifier.into());
    }

    /// Replace the sink used for records written from now on.
    pub fn set_sink(&self, sink: Arc<dyn Sink>) {
        self.output.set_sink(sink);
    }

    /// Register a file and, if running, start following it.
    pub async fn register(
        &self,
        path: impl Into<PathBuf>,
        pattern: &str,
        transform: Option<Arc<dyn Transform>>,
    ) -> Result<Arc<FileEntry>> {
        let entry = self.registry.register(path, pattern, transform)?;
        self.reconcile().await;
        Ok(entry)
    }

    /// Remove one file and, if running, stop its task.
    pub async fn unregister(&self, id: EntryId) -> Option<Arc<FileEntry>> {
        let removed = self.registry.remove(id);
        if removed.is_some() {
            self.reconcile().await;
        }
        removed
    }

    /// Remove every file and, if running, stop all tasks.
    pub async fn unregister_all(&self) {
        self.registry.clear_all();
        self.reconcile().await;
    }

    /// Spawn one watch task per registered file.
    pub async fn start(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.started {
            return Err(Error::AlreadyStarted);
        }

        state.cancel = CancellationToken::new();
        state.tasks.clear();

        let entries = self.registry.get_all();
        info!(
            identifier = %self.output.identifier(),
            files = entries.len(),
            "Starting collector"
        );

        for entry in entries {
            state.spawn(entry, &self.output, &self.config);
        }

        state.started = true;
        Ok(())
    }

    /// Signal every task to exit and wait until all of them have.
    ///
    /// When this returns, no task holds a file handle any more.
    pub async fn stop(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.started {
            return Err(Error::NotStarted);
        }

        info!(tasks = state.tasks.len(), "Stopping collector");
        state.cancel.cancel();

        let State { tasks, retired, .. } = &mut *state;
        let handles: Vec<TaskHandle> = tasks
            .drain()
            .map(|(_, h)| h)
            .chain(retired.drain(..))
            .collect();
        for handle in handles {
            handle.join().await;
        }

        state.started = false;
        info!("Collector stopped");
        Ok(())
    }

    /// Block until the collector is stopped by a call to
    /// [`stop`](Collector::stop) from another task.
    ///
    /// The running state is checked every `wait_poll_interval`, so this
    /// returns up to one interval after `stop` completes. Dropping the future
    /// cancels the wait without affecting the collector.
    pub async fn wait(&self) -> Result<()> {
        if !self.is_running().await {
            return Err(Error::NotStarted);
        }

        loop {
            tokio::time::sleep(self.config.wait_poll_interval).await;
            if !self.is_running().await {
                return Ok(());
            }
        }
    }

    /// Align running tasks with the current registry contents.
    ///
    /// Spawns tasks for newly registered entries and signals tasks whose
    /// entries were removed. Removed tasks leave the task map immediately and
    /// finish asynchronously; only [`stop`](Collector::stop) waits for them.
    /// Does nothing while stopped.
    pub async fn reconcile(&self) {
        let mut state = self.state.lock().await;
        if !state.started {
            return;
        }

        let desired = self.registry.get_all();
        let desired_ids: HashSet<EntryId> = desired.iter().map(|e| e.id()).collect();

        let removed: Vec<EntryId> = state
            .tasks
            .keys()
            .filter(|id| !desired_ids.contains(id))
            .copied()
            .collect();
        for id in removed {
            if let Some(handle) = state.tasks.remove(&id) {
                debug!(entry = %id, path = ?handle.entry().path(), "Signalling watch task shutdown");
                handle.signal_shutdown();
                state.retired.push(handle);
            }
        }

        for entry in desired {
            if !state.tasks.contains_key(&entry.id()) {
                state.spawn(entry, &self.output, &self.config);
            }
        }

        state.retired.retain(|h| !h.is_finished());
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.started
    }

    /// Ids of the entries that currently have a task, sorted.
    pub async fn running_entries(&self) -> Vec<EntryId> {
        let state = self.state.lock().await;
        let mut ids: Vec<EntryId> = state.tasks.keys().copied().collect();
        ids.sort();
        ids
    }

    /// State of the task following `id`, if it has one.
    pub async fn task_state(&self, id: EntryId) -> Option<TaskState> {
        self.state.lock().await.tasks.get(&id).map(|h| h.state())
    }

    /// Entries whose task stopped with an error, such as a file that could
    /// not be opened. They stay listed until the entry is unregistered or the
    /// collector is stopped.
    pub async fn failures(&self) -> Vec<TaskFailure> {
        let state = self.state.lock().await;
        let mut failures: Vec<TaskFailure> = state
            .tasks
            .values()
            .filter_map(|h| match h.state() {
                TaskState::Failed(error) => Some(TaskFailure {
                    id: h.entry().id(),
                    path: h.entry().path().to_path_buf(),
                    error,
                }),
                _ => None,
            })
            .collect();
        failures.sort_by_key(|f| f.id);
        failures
    }
}

impl std::fmt::Debug for Collector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector")
            .field("identifier", &self.output.identifier())
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::pattern::Record;
    use crate::collector::sink::SinkError;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    struct NullSink;

    impl Sink for NullSink {
        fn write(&self, _: &str, _: &Path, _: &Record) -> std::result::Result<(), SinkError> {
            Ok(())
        }
    }

    fn collector() -> Collector {
        Collector::new(Arc::new(NullSink)).with_config(CollectorConfig {
            poll_interval: Duration::from_millis(20),
            wait_poll_interval: Duration::from_millis(20),
            ..Default::default()
        })
    }

    #[test]
    fn test_default_identifier_is_hostname() {
        let c = Collector::new(Arc::new(NullSink));
        let host = gethostname::gethostname().to_string_lossy().into_owned();
        assert_eq!(c.identifier(), host);

        c.set_identifier("custom");
        assert_eq!(c.identifier(), "custom");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_start_twice_fails() {
        let c = collector();
        c.start().await.unwrap();

        assert!(matches!(c.start().await, Err(Error::AlreadyStarted)));
        assert!(c.is_running().await);

        c.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_when_stopped_fails() {
        let c = collector();
        assert!(matches!(c.stop().await, Err(Error::NotStarted)));

        c.start().await.unwrap();
        c.stop().await.unwrap();
        assert!(matches!(c.stop().await, Err(Error::NotStarted)));
        assert!(!c.is_running().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_wait_before_start_fails() {
        let c = collector();
        assert!(matches!(c.wait().await, Err(Error::NotStarted)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_reconcile_while_stopped_is_noop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(&path, "").unwrap();

        let c = collector();
        c.register(&path, r"(?<all>.*)", None).await.unwrap();
        c.reconcile().await;

        assert!(c.running_entries().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_start_spawns_one_task_per_entry() {
        let dir = TempDir::new().unwrap();
        let registry = Registry::new();
        for name in ["a.log", "b.log"] {
            let path = dir.path().join(name);
            std::fs::write(&path, "").unwrap();
            registry.register(path, r"(?<all>.*)", None).unwrap();
        }

        let c = collector().with_registry(registry);
        c.start().await.unwrap();
        assert_eq!(c.running_entries().await.len(), 2);

        c.stop().await.unwrap();
        assert!(c.running_entries().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_open_failure_is_isolated() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.log");
        std::fs::write(&good, "").unwrap();

        let c = collector();
        let missing = c
            .register(dir.path().join("missing.log"), r"(?<all>.*)", None)
            .await
            .unwrap();
        let present = c.register(&good, r"(?<all>.*)", None).await.unwrap();
        c.start().await.unwrap();

        let failures = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let failures = c.failures().await;
                if !failures.is_empty() {
                    return failures;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].id, missing.id());
        // The failed entry keeps its slot until it is unregistered
        assert_eq!(c.running_entries().await, vec![missing.id(), present.id()]);

        c.unregister(missing.id()).await.unwrap();
        assert!(c.failures().await.is_empty());
        assert_eq!(c.running_entries().await, vec![present.id()]);

        c.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_wait_returns_after_stop() {
        let c = Arc::new(collector());
        c.start().await.unwrap();

        let waiter = {
            let c = c.clone();
            tokio::spawn(async move { c.wait().await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        c.stop().await.unwrap();
        let result = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_restart_after_stop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(&path, "").unwrap();

        let c = collector();
        let entry = c.register(&path, r"(?<all>.*)", None).await.unwrap();

        c.start().await.unwrap();
        c.stop().await.unwrap();
        c.start().await.unwrap();

        assert_eq!(c.running_entries().await, vec![entry.id()]);
        c.stop().await.unwrap();
    }
}
