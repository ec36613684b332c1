//! Settings editing engine for agentdeck.
//!
//! ```text
//! SettingsSession --edits--> rule/env lists, sub-editors --mark_dirty--> DirtyRegistry
//!        |
//!      save()
//!        v
//! SaveOrchestrator: assemble -> persist_document -> commit dirty sections in order
//! ```
//!
//! Checkpoint strategy and retention live beside the save cycle in
//! [`CheckpointRetention`].

mod checkpoint;
mod editors;
mod orchestrator;
mod registry;
mod session;

pub use checkpoint::{CheckpointError, CheckpointRetention};
pub use editors::{BinaryPathEditor, HooksEditor, ProxyEditor};
pub use orchestrator::{SaveOrchestrator, SaveOutcome, SavePhase, SaveRejected, SaveRequest};
pub use registry::{CommitFn, CommitFut, DirtyRegistry, PendingCommit, SectionCommitError};
pub use session::SettingsSession;

pub use agentdeck_core::{CheckpointService, ServiceError, ServiceFut, SettingsStore};
