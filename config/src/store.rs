//! File-backed [`SettingsStore`].
//!
//! The settings document and the hooks section live in the agent's
//! `settings.json`; proxy and binary path live in the console config.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;

use agentdeck_core::{ServiceError, ServiceFut, SettingsStore};
use agentdeck_types::settings::HOOKS_KEY;
use agentdeck_types::{ProxySettings, SettingsDocument};
use agentdeck_utils::{AtomicWriteOptions, PersistMode, atomic_write_with_options, recover_bak_file};

use crate::{AgentdeckConfig, ConfigError, config_path, persist_binary_path, persist_proxy, settings_path};

#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    settings_path: PathBuf,
    config_path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(settings_path: impl Into<PathBuf>, config_path: impl Into<PathBuf>) -> Self {
        Self {
            settings_path: settings_path.into(),
            config_path: config_path.into(),
        }
    }

    /// Store over the default locations, honouring the path override env vars.
    #[must_use]
    pub fn from_default_paths() -> Option<Self> {
        Some(Self::new(settings_path()?, config_path()?))
    }

    #[must_use]
    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// A missing file is a first run, not an error.
    fn read_document(&self) -> Result<SettingsDocument, ServiceError> {
        let path = &self.settings_path;
        recover_bak_file(path);
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No settings file yet");
                return Ok(SettingsDocument::new());
            }
            Err(e) => return Err(ServiceError::io(path, e)),
        };
        if content.trim().is_empty() {
            return Ok(SettingsDocument::new());
        }

        let value: Value = serde_json::from_str(&content).map_err(|e| ServiceError::Parse {
            path: path.clone(),
            message: e.to_string(),
        })?;
        SettingsDocument::from_value(value).map_err(|e| ServiceError::Parse {
            path: path.clone(),
            message: e.to_string(),
        })
    }

    fn write_document(&self, document: &SettingsDocument) -> Result<(), ServiceError> {
        let path = &self.settings_path;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| ServiceError::io(parent, e))?;
        }

        let mut serialized = serde_json::to_string_pretty(document).map_err(|e| {
            ServiceError::Rejected(format!("failed to serialize settings document: {e}"))
        })?;
        serialized.push('\n');

        atomic_write_with_options(
            path,
            serialized.as_bytes(),
            AtomicWriteOptions {
                sync_file: true,
                sync_parent_dir: false,
                mode: PersistMode::Default,
            },
        )
        .map_err(|e| ServiceError::io(path, e))?;
        tracing::debug!(path = %path.display(), keys = document.len(), "Settings document written");
        Ok(())
    }

    fn read_config(&self) -> Result<AgentdeckConfig, ServiceError> {
        match AgentdeckConfig::load_from(&self.config_path) {
            Ok(config) => Ok(config.unwrap_or_default()),
            Err(ConfigError::Read { path, source }) => Err(ServiceError::io(path, source)),
            Err(ConfigError::Parse { path, source }) => Err(ServiceError::Parse {
                path,
                message: source.to_string(),
            }),
        }
    }
}

impl SettingsStore for FileSettingsStore {
    fn load_document(&self) -> ServiceFut<'_, SettingsDocument> {
        Box::pin(async move { self.read_document() })
    }

    fn persist_document<'a>(&'a self, document: &'a SettingsDocument) -> ServiceFut<'a, ()> {
        Box::pin(async move { self.write_document(document) })
    }

    fn load_binary_path(&self) -> ServiceFut<'_, Option<String>> {
        Box::pin(async move { Ok(self.read_config()?.binary_path().map(str::to_string)) })
    }

    fn load_proxy(&self) -> ServiceFut<'_, ProxySettings> {
        Box::pin(async move { Ok(self.read_config()?.proxy()) })
    }

    /// Re-reads the file so the freshly persisted document is the base.
    fn commit_hooks(&self, hooks: Value) -> ServiceFut<'_, ()> {
        Box::pin(async move {
            let mut document = self.read_document()?;
            document.insert(HOOKS_KEY, hooks);
            self.write_document(&document)
        })
    }

    fn commit_proxy(&self, proxy: ProxySettings) -> ServiceFut<'_, ()> {
        Box::pin(async move {
            persist_proxy(&self.config_path, &proxy)
                .map_err(|e| ServiceError::io(&self.config_path, e))
        })
    }

    fn commit_binary_path(&self, path: String) -> ServiceFut<'_, ()> {
        Box::pin(async move {
            persist_binary_path(&self.config_path, &path)
                .map_err(|e| ServiceError::io(&self.config_path, e))
        })
    }
}
