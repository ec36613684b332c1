//! Checkpoint policy types.

use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// When the agent runtime creates checkpoints on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStrategy {
    Manual,
    PerPrompt,
    PerToolUse,
    #[default]
    Smart,
}

impl CheckpointStrategy {
    pub const ALL: [CheckpointStrategy; 4] = [
        CheckpointStrategy::Manual,
        CheckpointStrategy::PerPrompt,
        CheckpointStrategy::PerToolUse,
        CheckpointStrategy::Smart,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::PerPrompt => "per_prompt",
            Self::PerToolUse => "per_tool_use",
            Self::Smart => "smart",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "manual" => Some(Self::Manual),
            "per_prompt" => Some(Self::PerPrompt),
            "per_tool_use" => Some(Self::PerToolUse),
            "smart" => Some(Self::Smart),
            _ => None,
        }
    }
}

impl fmt::Display for CheckpointStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checkpoint configuration as reported by the checkpoint service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointSettings {
    pub auto_checkpoint_enabled: bool,
    pub checkpoint_strategy: CheckpointStrategy,
    pub total_checkpoints: usize,
}

/// Whose checkpoints a request addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CheckpointScope {
    pub session_id: String,
    pub project_id: String,
    pub project_path: PathBuf,
}

impl CheckpointScope {
    pub fn new(
        session_id: impl Into<String>,
        project_id: impl Into<String>,
        project_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            project_id: project_id.into(),
            project_path: project_path.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("keep count must be at least 1, got {0}")]
pub struct KeepCountError(pub usize);

/// How many of the most recent checkpoints a cleanup retains.
///
/// Existence of a value proves it is at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct KeepCount(NonZeroUsize);

impl KeepCount {
    pub const DEFAULT: KeepCount = KeepCount(NonZeroUsize::new(10).unwrap());

    pub fn new(raw: usize) -> Result<Self, KeepCountError> {
        NonZeroUsize::new(raw).map(Self).ok_or(KeepCountError(raw))
    }

    #[must_use]
    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl Default for KeepCount {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for KeepCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
