// SPDX-License-Identifier: Apache-2.0

//! Registry of watched files.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::collector::entry::{EntryId, FileEntry};
use crate::collector::error::Result;
use crate::collector::pattern::LinePattern;
use crate::collector::transform::{Identity, Transform};

/// Ordered collection of [`FileEntry`] values.
///
/// The registry has no knowledge of running tasks. Readers take a snapshot
/// with [`Registry::get_all`] and work from that copy; changes made after the
/// snapshot was taken are never visible through it.
#[derive(Debug, Default)]
pub struct Registry {
    entries: RwLock<Vec<Arc<FileEntry>>>,
    next_id: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `pattern` and append a new entry for `path`.
    ///
    /// An entry equal to an existing one is still added as a distinct entry
    /// with its own id. On an invalid pattern the registry is left unchanged.
    pub fn register(
        &self,
        path: impl Into<PathBuf>,
        pattern: &str,
        transform: Option<Arc<dyn Transform>>,
    ) -> Result<Arc<FileEntry>> {
        let pattern = LinePattern::new(pattern)?;
        let id = EntryId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let transform = transform.unwrap_or_else(|| Arc::new(Identity));

        let entry = Arc::new(FileEntry::new(id, path.into(), pattern, transform));
        debug!(entry = %id, path = ?entry.path(), "Registered file");

        self.write().push(entry.clone());
        Ok(entry)
    }

    /// Remove a single entry, returning it if it was registered.
    pub fn remove(&self, id: EntryId) -> Option<Arc<FileEntry>> {
        let mut entries = self.write();
        let pos = entries.iter().position(|e| e.id() == id)?;
        Some(entries.remove(pos))
    }

    /// Look up a registered entry by id.
    pub fn get(&self, id: EntryId) -> Option<Arc<FileEntry>> {
        self.read().iter().find(|e| e.id() == id).cloned()
    }

    /// Snapshot of all registered entries in registration order.
    pub fn get_all(&self) -> Vec<Arc<FileEntry>> {
        self.read().clone()
    }

    /// Remove every entry.
    pub fn clear_all(&self) {
        self.write().clear();
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A panic while holding the lock cannot leave the Vec half-updated, so a
    // poisoned lock is still safe to use.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Arc<FileEntry>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Arc<FileEntry>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}
