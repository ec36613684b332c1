//! Dirty-section registry shared by the sub-editors and the save orchestrator.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use agentdeck_core::ServiceError;
use agentdeck_types::Section;

/// Resolves to whether the section still diverges from its store once the
/// commit has landed.
pub type CommitFut = Pin<Box<dyn Future<Output = Result<bool, ServiceError>> + Send>>;

/// Pushes one section's draft to its backing service.
pub type CommitFn = Arc<dyn Fn() -> CommitFut + Send + Sync>;

#[derive(Debug, Error)]
#[error("failed to commit {section} settings: {source}")]
pub struct SectionCommitError {
    pub section: Section,
    #[source]
    pub source: ServiceError,
}

struct Entry {
    section: Section,
    dirty: bool,
    /// Bumped by every `mark_dirty`.
    revision: u64,
    commit: Option<CommitFn>,
}

impl Entry {
    fn new(section: Section) -> Self {
        Self {
            section,
            dirty: false,
            revision: 0,
            commit: None,
        }
    }
}

/// A dirty section handed to the save cycle.
pub struct PendingCommit {
    pub section: Section,
    /// Registry revision of the section when it was drained.
    pub revision: u64,
    pub commit: CommitFn,
}

impl fmt::Debug for PendingCommit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCommit")
            .field("section", &self.section)
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}

/// Tracks which sections diverge from their persisted value and how to commit
/// each one. Entries keep the order in which sections were first seen.
#[derive(Default)]
pub struct DirtyRegistry {
    entries: Mutex<Vec<Entry>>,
}

impl fmt::Debug for DirtyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.lock();
        f.debug_list()
            .entries(entries.iter().map(|entry| {
                (entry.section, entry.dirty, entry.commit.is_some())
            }))
            .finish()
    }
}

impl DirtyRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with a fixed section order, all clean and without commits.
    #[must_use]
    pub fn with_sections(sections: &[Section]) -> Self {
        let registry = Self::new();
        {
            let mut entries = registry.lock();
            for &section in sections {
                if !entries.iter().any(|entry| entry.section == section) {
                    entries.push(Entry::new(section));
                }
            }
        }
        registry
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn entry<'a>(entries: &'a mut Vec<Entry>, section: Section) -> &'a mut Entry {
        let index = match entries.iter().position(|entry| entry.section == section) {
            Some(index) => index,
            None => {
                entries.push(Entry::new(section));
                entries.len() - 1
            }
        };
        &mut entries[index]
    }

    /// Store or replace the commit for `section`. The dirty flag is untouched.
    pub fn register(&self, section: Section, commit: CommitFn) {
        Self::entry(&mut self.lock(), section).commit = Some(commit);
    }

    pub fn mark_dirty(&self, section: Section, dirty: bool) {
        let mut entries = self.lock();
        let entry = Self::entry(&mut entries, section);
        entry.dirty = dirty;
        entry.revision += 1;
        tracing::debug!(%section, dirty, "Section dirty flag updated");
    }

    /// Record the result of a successful commit of `pending`.
    ///
    /// Without edits since the drain the flag becomes `still_dirty`. After an
    /// edit the flag can only be raised, so an edit made while the commit was
    /// in flight stays dirty.
    pub fn settle(&self, pending: &PendingCommit, still_dirty: bool) {
        let mut entries = self.lock();
        let entry = Self::entry(&mut entries, pending.section);
        if entry.revision == pending.revision {
            entry.dirty = still_dirty;
        } else {
            tracing::debug!(section = %pending.section, "Section edited during commit");
            entry.dirty |= still_dirty;
        }
    }

    #[must_use]
    pub fn is_dirty(&self, section: Section) -> bool {
        self.lock()
            .iter()
            .any(|entry| entry.section == section && entry.dirty)
    }

    #[must_use]
    pub fn dirty_sections(&self) -> Vec<Section> {
        self.lock()
            .iter()
            .filter(|entry| entry.dirty)
            .map(|entry| entry.section)
            .collect()
    }

    /// Every dirty section with its commit, in registry order.
    ///
    /// Flags are left set; the caller settles each one after its commit
    /// succeeds. A dirty section with no registered commit cannot be saved
    /// and is skipped.
    #[must_use]
    pub fn drain_dirty(&self) -> Vec<PendingCommit> {
        self.lock()
            .iter()
            .filter(|entry| entry.dirty)
            .filter_map(|entry| match &entry.commit {
                Some(commit) => Some(PendingCommit {
                    section: entry.section,
                    revision: entry.revision,
                    commit: Arc::clone(commit),
                }),
                None => {
                    tracing::warn!(section = %entry.section, "Dirty section has no commit registered");
                    None
                }
            })
            .collect()
    }
}
