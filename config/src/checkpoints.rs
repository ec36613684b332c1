//! File-backed [`CheckpointService`] over the agent's timeline directories.
//!
//! ```text
//! <projects>/<project_id>/.timelines/<session_id>/
//!     timeline.json              autoCheckpointEnabled, checkpointStrategy, ...
//!     checkpoints/<id>/metadata.json   { "timestamp": "<RFC 3339>", ... }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use agentdeck_core::{CheckpointService, ServiceError, ServiceFut};
use agentdeck_types::{CheckpointScope, CheckpointSettings, CheckpointStrategy, KeepCount};
use agentdeck_utils::{AtomicWriteOptions, PersistMode, atomic_write_with_options};

use crate::settings_path;

const TIMELINE_FILE: &str = "timeline.json";
const CHECKPOINTS_DIR: &str = "checkpoints";
const ENABLED_KEY: &str = "autoCheckpointEnabled";
const STRATEGY_KEY: &str = "checkpointStrategy";

#[derive(Debug, Clone)]
pub struct FileCheckpointService {
    projects_dir: PathBuf,
}

impl FileCheckpointService {
    pub fn new(projects_dir: impl Into<PathBuf>) -> Self {
        Self {
            projects_dir: projects_dir.into(),
        }
    }

    /// `projects/` beside the agent's `settings.json`.
    #[must_use]
    pub fn from_default_paths() -> Option<Self> {
        let settings = settings_path()?;
        Some(Self::new(settings.parent()?.join("projects")))
    }

    fn timeline_dir(&self, scope: &CheckpointScope) -> PathBuf {
        self.projects_dir
            .join(&scope.project_id)
            .join(".timelines")
            .join(&scope.session_id)
    }

    fn read_timeline(path: &Path) -> Result<Map<String, Value>, ServiceError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(ServiceError::io(path, e)),
        };
        match serde_json::from_str(&content) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(ServiceError::Parse {
                path: path.to_path_buf(),
                message: "timeline is not a JSON object".to_string(),
            }),
            Err(e) => Err(ServiceError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Checkpoint directories, newest first. Entries without a readable
    /// timestamp sort as oldest.
    fn checkpoints_newest_first(dir: &Path) -> Result<Vec<PathBuf>, ServiceError> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ServiceError::io(dir, e)),
        };

        let mut checkpoints = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| ServiceError::io(dir, e))?.path();
            if path.is_dir() {
                checkpoints.push((checkpoint_timestamp(&path), path));
            }
        }
        checkpoints.sort_by(|a, b| b.cmp(a));
        Ok(checkpoints.into_iter().map(|(_, path)| path).collect())
    }
}

fn checkpoint_timestamp(dir: &Path) -> Option<String> {
    let content = fs::read_to_string(dir.join("metadata.json")).ok()?;
    let value: Value = serde_json::from_str(&content).ok()?;
    value.get("timestamp")?.as_str().map(str::to_string)
}

impl CheckpointService for FileCheckpointService {
    fn checkpoint_settings<'a>(
        &'a self,
        scope: &'a CheckpointScope,
    ) -> ServiceFut<'a, CheckpointSettings> {
        Box::pin(async move {
            let dir = self.timeline_dir(scope);
            let timeline = Self::read_timeline(&dir.join(TIMELINE_FILE))?;
            let checkpoint_strategy = match timeline.get(STRATEGY_KEY).and_then(Value::as_str) {
                Some(raw) => CheckpointStrategy::parse(raw).unwrap_or_else(|| {
                    tracing::warn!(strategy = raw, "Unknown checkpoint strategy; using default");
                    CheckpointStrategy::default()
                }),
                None => CheckpointStrategy::default(),
            };
            Ok(CheckpointSettings {
                auto_checkpoint_enabled: timeline
                    .get(ENABLED_KEY)
                    .and_then(Value::as_bool)
                    .unwrap_or(true),
                checkpoint_strategy,
                total_checkpoints: Self::checkpoints_newest_first(&dir.join(CHECKPOINTS_DIR))?.len(),
            })
        })
    }

    fn update_checkpoint_settings<'a>(
        &'a self,
        scope: &'a CheckpointScope,
        enabled: bool,
        strategy: CheckpointStrategy,
    ) -> ServiceFut<'a, ()> {
        Box::pin(async move {
            let dir = self.timeline_dir(scope);
            let path = dir.join(TIMELINE_FILE);
            let mut timeline = Self::read_timeline(&path)?;
            timeline.insert(ENABLED_KEY.to_string(), Value::Bool(enabled));
            timeline.insert(
                STRATEGY_KEY.to_string(),
                Value::String(strategy.as_str().to_string()),
            );

            fs::create_dir_all(&dir).map_err(|e| ServiceError::io(&dir, e))?;
            let mut serialized = serde_json::to_string_pretty(&timeline)
                .map_err(|e| ServiceError::Rejected(format!("failed to serialize timeline: {e}")))?;
            serialized.push('\n');
            atomic_write_with_options(
                &path,
                serialized.as_bytes(),
                AtomicWriteOptions {
                    sync_file: true,
                    sync_parent_dir: false,
                    mode: PersistMode::Default,
                },
            )
            .map_err(|e| ServiceError::io(&path, e))
        })
    }

    fn cleanup_checkpoints<'a>(
        &'a self,
        scope: &'a CheckpointScope,
        keep: KeepCount,
    ) -> ServiceFut<'a, usize> {
        Box::pin(async move {
            let dir = self.timeline_dir(scope).join(CHECKPOINTS_DIR);
            let mut removed = 0;
            for path in Self::checkpoints_newest_first(&dir)?
                .into_iter()
                .skip(keep.get())
            {
                fs::remove_dir_all(&path).map_err(|e| ServiceError::io(&path, e))?;
                tracing::debug!(path = %path.display(), "Checkpoint removed");
                removed += 1;
            }
            Ok(removed)
        })
    }
}
