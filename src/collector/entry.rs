// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::collector::pattern::LinePattern;
use crate::collector::transform::Transform;

/// Opaque handle for a registered file, minted by the [`Registry`].
///
/// Entries are compared by handle, never by path or pattern, so the same file
/// registered twice yields two independent entries.
///
/// [`Registry`]: crate::collector::Registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(u64);

impl EntryId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry-{}", self.0)
    }
}

/// A watched file together with its line pattern and transform.
///
/// Immutable after registration and shared between the registry and the
/// watch task following it.
pub struct FileEntry {
    id: EntryId,
    path: PathBuf,
    pattern: LinePattern,
    transform: Arc<dyn Transform>,
}

impl FileEntry {
    pub(crate) fn new(
        id: EntryId,
        path: PathBuf,
        pattern: LinePattern,
        transform: Arc<dyn Transform>,
    ) -> Self {
        Self {
            id,
            path,
            pattern,
            transform,
        }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pattern(&self) -> &LinePattern {
        &self.pattern
    }

    pub fn transform(&self) -> &dyn Transform {
        self.transform.as_ref()
    }
}

impl fmt::Debug for FileEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileEntry")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}
