//! The save cycle: persist the primary document, then commit dirty sections.
//!
//! ```text
//! Idle -> Saving -> { Success | PartialFailure | Failure } -> Idle
//! ```
//!
//! At most one save is in flight. The `Saving` phase is the lock: a second
//! request while it is held is rejected, never queued.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use thiserror::Error;

use agentdeck_core::{ServiceError, SettingsStore, assemble};
use agentdeck_types::settings::BINARY_PATH_KEY;
use agentdeck_types::{EnvironmentVariable, PermissionRule, Section, SettingsDocument};

use crate::registry::{DirtyRegistry, SectionCommitError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SavePhase {
    #[default]
    Idle,
    Saving,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SaveRejected {
    #[error("a save is already in progress")]
    InProgress,
}

/// Snapshot of the editor state a save cycle works from.
#[derive(Debug, Clone, Default)]
pub struct SaveRequest {
    pub base: SettingsDocument,
    pub allow: Vec<PermissionRule>,
    pub deny: Vec<PermissionRule>,
    pub env: Vec<EnvironmentVariable>,
    /// Merged into the document only while the binary path section is dirty.
    pub binary_path: Option<String>,
}

#[derive(Debug)]
pub enum SaveOutcome {
    /// Document persisted and every dirty section committed.
    Success { document: SettingsDocument },
    /// Document persisted; `failure` stopped the section commits.
    ///
    /// `pending` is the failed section followed by every section that was not
    /// attempted, all still dirty.
    PartialFailure {
        document: SettingsDocument,
        failure: SectionCommitError,
        pending: Vec<Section>,
    },
    /// Nothing was saved.
    Failure { error: ServiceError },
}

impl SaveOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The persisted document, unless the save failed outright.
    #[must_use]
    pub fn document(&self) -> Option<&SettingsDocument> {
        match self {
            Self::Success { document } | Self::PartialFailure { document, .. } => Some(document),
            Self::Failure { .. } => None,
        }
    }

    #[must_use]
    pub fn pending(&self) -> &[Section] {
        match self {
            Self::PartialFailure { pending, .. } => pending,
            Self::Success { .. } | Self::Failure { .. } => &[],
        }
    }
}

pub struct SaveOrchestrator {
    store: Arc<dyn SettingsStore>,
    registry: Arc<DirtyRegistry>,
    phase: Mutex<SavePhase>,
}

/// Returns the phase to `Idle` when the save cycle ends, however it ends.
struct PhaseGuard<'a> {
    phase: &'a Mutex<SavePhase>,
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        *lock(self.phase) = SavePhase::Idle;
    }
}

fn lock(phase: &Mutex<SavePhase>) -> MutexGuard<'_, SavePhase> {
    phase.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SaveOrchestrator {
    pub fn new(store: Arc<dyn SettingsStore>, registry: Arc<DirtyRegistry>) -> Self {
        Self {
            store,
            registry,
            phase: Mutex::new(SavePhase::Idle),
        }
    }

    #[must_use]
    pub fn phase(&self) -> SavePhase {
        *lock(&self.phase)
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<DirtyRegistry> {
        &self.registry
    }

    fn begin(&self) -> Result<PhaseGuard<'_>, SaveRejected> {
        let mut phase = lock(&self.phase);
        if *phase == SavePhase::Saving {
            tracing::warn!("Save requested while another save is in progress");
            return Err(SaveRejected::InProgress);
        }
        *phase = SavePhase::Saving;
        Ok(PhaseGuard { phase: &self.phase })
    }

    /// Run one save cycle to completion.
    ///
    /// # Errors
    ///
    /// Returns [`SaveRejected::InProgress`] if a save is already running.
    /// Store failures are reported through [`SaveOutcome`], not as errors.
    pub async fn save(&self, request: SaveRequest) -> Result<SaveOutcome, SaveRejected> {
        let _guard = self.begin()?;

        let mut document = assemble(&request.base, &request.allow, &request.deny, &request.env);
        if self.registry.is_dirty(Section::BinaryPath)
            && let Some(path) = request.binary_path
        {
            document.insert(BINARY_PATH_KEY, Value::String(path));
        }

        if let Err(error) = self.store.persist_document(&document).await {
            tracing::warn!("Failed to persist settings document: {error}");
            return Ok(SaveOutcome::Failure { error });
        }
        tracing::info!(keys = document.len(), "Settings document persisted");

        let dirty = self.registry.drain_dirty();
        for (index, pending) in dirty.iter().enumerate() {
            let section = pending.section;
            match (pending.commit)().await {
                Ok(still_dirty) => {
                    self.registry.settle(pending, still_dirty);
                    tracing::info!(%section, still_dirty, "Section committed");
                }
                Err(source) => {
                    tracing::warn!(%section, "Section commit failed: {source}");
                    let pending = dirty[index..].iter().map(|p| p.section).collect();
                    return Ok(SaveOutcome::PartialFailure {
                        document,
                        failure: SectionCommitError { section, source },
                        pending,
                    });
                }
            }
        }

        Ok(SaveOutcome::Success { document })
    }
}
