//! Checkpoint strategy and retention.
//!
//! Strategy and the auto-checkpoint flag are saved straight through the
//! checkpoint service; they take no part in the dirty-section save cycle.

use std::sync::Arc;

use thiserror::Error;

use agentdeck_core::{CheckpointService, ServiceError};
use agentdeck_types::{
    CheckpointScope, CheckpointSettings, CheckpointStrategy, KeepCount, KeepCountError,
};

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error(transparent)]
    Validation(#[from] KeepCountError),
    #[error("checkpoint service failed: {0}")]
    Service(#[from] ServiceError),
}

pub struct CheckpointRetention {
    service: Arc<dyn CheckpointService>,
    scope: CheckpointScope,
    enabled: bool,
    strategy: CheckpointStrategy,
    total: usize,
}

impl CheckpointRetention {
    pub async fn load(
        service: Arc<dyn CheckpointService>,
        scope: CheckpointScope,
    ) -> Result<Self, CheckpointError> {
        let settings = service.checkpoint_settings(&scope).await?;
        tracing::debug!(
            enabled = settings.auto_checkpoint_enabled,
            strategy = %settings.checkpoint_strategy,
            total = settings.total_checkpoints,
            "Checkpoint settings loaded"
        );
        Ok(Self {
            service,
            scope,
            enabled: settings.auto_checkpoint_enabled,
            strategy: settings.checkpoint_strategy,
            total: settings.total_checkpoints,
        })
    }

    #[must_use]
    pub fn scope(&self) -> &CheckpointScope {
        &self.scope
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// The chosen strategy, kept even while auto-checkpointing is off.
    #[must_use]
    pub fn strategy(&self) -> CheckpointStrategy {
        self.strategy
    }

    /// The strategy in force; none while auto-checkpointing is off.
    #[must_use]
    pub fn effective_strategy(&self) -> Option<CheckpointStrategy> {
        self.enabled.then_some(self.strategy)
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn set_strategy(&mut self, strategy: CheckpointStrategy) {
        self.strategy = strategy;
    }

    #[must_use]
    pub fn settings(&self) -> CheckpointSettings {
        CheckpointSettings {
            auto_checkpoint_enabled: self.enabled,
            checkpoint_strategy: self.strategy,
            total_checkpoints: self.total,
        }
    }

    /// Send the flag and the retained strategy to the service.
    pub async fn save(&self) -> Result<(), CheckpointError> {
        self.service
            .update_checkpoint_settings(&self.scope, self.enabled, self.strategy)
            .await?;
        tracing::info!(enabled = self.enabled, strategy = %self.strategy, "Checkpoint settings saved");
        Ok(())
    }

    /// Whether a cleanup to `keep` would remove anything.
    #[must_use]
    pub fn can_cleanup(&self, keep: KeepCount) -> bool {
        self.total > keep.get()
    }

    /// Keep the `keep` most recent checkpoints; returns how many were removed.
    ///
    /// `keep` is validated before the service is called. Nothing to remove is
    /// a successful zero.
    pub async fn request_cleanup(&mut self, keep: usize) -> Result<usize, CheckpointError> {
        let keep = KeepCount::new(keep)?;
        let removed = self.service.cleanup_checkpoints(&self.scope, keep).await?;
        tracing::info!(%keep, removed, "Checkpoint cleanup finished");

        match self.service.checkpoint_settings(&self.scope).await {
            Ok(settings) => self.total = settings.total_checkpoints,
            Err(e) => {
                tracing::warn!("Failed to refresh checkpoint count: {e}");
                self.total = self.total.saturating_sub(removed);
            }
        }
        Ok(removed)
    }
}
