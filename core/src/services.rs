//! Contracts for the external services the console drives.
//!
//! The console never decides how documents are stored or how checkpoints are
//! created; it only calls these traits. File-backed implementations live in
//! `agentdeck-config`, test doubles in the integration suite.

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;

use serde_json::Value;
use thiserror::Error;

use agentdeck_types::{
    CheckpointScope, CheckpointSettings, CheckpointStrategy, KeepCount, ProxySettings,
    SettingsDocument,
};

pub type ServiceFut<'a, T> = Pin<Box<dyn Future<Output = Result<T, ServiceError>> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} unavailable")]
    Unavailable(String),
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
    #[error("{0}")]
    Rejected(String),
}

impl ServiceError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Backing store for the agent settings document and its auxiliary sections.
///
/// Every commit is idempotent and may fail independently of the others.
pub trait SettingsStore: Send + Sync {
    fn load_document(&self) -> ServiceFut<'_, SettingsDocument>;
    fn persist_document<'a>(&'a self, document: &'a SettingsDocument) -> ServiceFut<'a, ()>;

    /// Currently configured agent binary, if any.
    fn load_binary_path(&self) -> ServiceFut<'_, Option<String>>;
    fn load_proxy(&self) -> ServiceFut<'_, ProxySettings>;

    fn commit_hooks(&self, hooks: Value) -> ServiceFut<'_, ()>;
    fn commit_proxy(&self, proxy: ProxySettings) -> ServiceFut<'_, ()>;
    fn commit_binary_path(&self, path: String) -> ServiceFut<'_, ()>;
}

/// The checkpoint service owned by the agent runtime.
pub trait CheckpointService: Send + Sync {
    fn checkpoint_settings<'a>(
        &'a self,
        scope: &'a CheckpointScope,
    ) -> ServiceFut<'a, CheckpointSettings>;

    fn update_checkpoint_settings<'a>(
        &'a self,
        scope: &'a CheckpointScope,
        enabled: bool,
        strategy: CheckpointStrategy,
    ) -> ServiceFut<'a, ()>;

    /// Keep at most `keep` most recent checkpoints; returns how many were removed.
    fn cleanup_checkpoints<'a>(
        &'a self,
        scope: &'a CheckpointScope,
        keep: KeepCount,
    ) -> ServiceFut<'a, usize>;
}
