//! Console configuration and file-backed services.
//!
//! Two files are involved:
//! - `~/.agentdeck/config.toml`: the console's own preferences (language,
//!   analytics consent, selected agent binary, proxy). Written with
//!   `toml_edit` so comments and unknown keys survive.
//! - `~/.claude/settings.json`: the agent's settings document, owned by the
//!   agent runtime and edited through [`FileSettingsStore`]. Checkpoint
//!   timelines under `~/.claude/projects` are reached through
//!   [`FileCheckpointService`].

mod analytics;
mod checkpoints;
mod language;
mod store;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use toml_edit::{DocumentMut, Item, Table, value};

use agentdeck_types::{Language, ProxySettings};
use agentdeck_utils::{AtomicWriteOptions, PersistMode, atomic_write_with_options};

pub use analytics::{AnalyticsPreference, EnableOutcome};
pub use checkpoints::FileCheckpointService;
pub use language::LanguagePreference;
pub use store::FileSettingsStore;

pub const CONFIG_PATH_ENV: &str = "AGENTDECK_CONFIG_PATH";
pub const SETTINGS_PATH_ENV: &str = "AGENTDECK_SETTINGS_PATH";

#[derive(Debug, Default, Deserialize)]
pub struct AgentdeckConfig {
    pub app: Option<AppConfig>,
    pub agent: Option<AgentConfig>,
    pub proxy: Option<ProxySettings>,
    pub analytics: Option<AnalyticsConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    /// Display language code ("en" or "zh").
    pub language: Option<String>,
}

/// Anonymous usage analytics. Never enabled without recorded consent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub enabled: bool,
    pub consented: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct AgentConfig {
    /// Agent binary chosen by the user; discovery is used when absent.
    pub binary_path: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config at {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

impl AgentdeckConfig {
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).map_err(|source| {
            tracing::warn!(path = %path.display(), "Failed to read config: {source}");
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;

        toml::from_str(&content).map(Some).map_err(|source| {
            tracing::warn!(path = %path.display(), "Failed to parse config: {source}");
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    #[must_use]
    pub fn language(&self) -> Option<&str> {
        self.app.as_ref()?.language.as_deref()
    }

    #[must_use]
    pub fn binary_path(&self) -> Option<&str> {
        self.agent
            .as_ref()?
            .binary_path
            .as_deref()
            .filter(|path| !path.trim().is_empty())
    }

    #[must_use]
    pub fn proxy(&self) -> ProxySettings {
        self.proxy.clone().unwrap_or_default()
    }

    #[must_use]
    pub fn analytics(&self) -> AnalyticsConfig {
        self.analytics.unwrap_or_default()
    }
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".agentdeck").join("config.toml"))
}

#[must_use]
pub fn settings_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(SETTINGS_PATH_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".claude").join("settings.json"))
}

pub fn persist_language(path: &Path, language: Language) -> io::Result<()> {
    edit_config(path, |doc| {
        table(doc, "app")["language"] = value(language.code());
    })
}

pub fn persist_binary_path(path: &Path, binary_path: &str) -> io::Result<()> {
    edit_config(path, |doc| {
        table(doc, "agent")["binary_path"] = value(binary_path);
    })
}

pub fn persist_proxy(path: &Path, proxy: &ProxySettings) -> io::Result<()> {
    edit_config(path, |doc| {
        let section = table(doc, "proxy");
        section["enabled"] = value(proxy.enabled);
        section["http_proxy"] = value(proxy.http_proxy.as_str());
        section["https_proxy"] = value(proxy.https_proxy.as_str());
        section["no_proxy"] = value(proxy.no_proxy.as_str());
        section["all_proxy"] = value(proxy.all_proxy.as_str());
    })
}

/// `None` drops the `[analytics]` table altogether.
pub fn persist_analytics(path: &Path, analytics: Option<AnalyticsConfig>) -> io::Result<()> {
    edit_config(path, |doc| match analytics {
        Some(analytics) => {
            let section = table(doc, "analytics");
            section["enabled"] = value(analytics.enabled);
            section["consented"] = value(analytics.consented);
        }
        None => {
            doc.remove("analytics");
        }
    })
}

fn table<'a>(doc: &'a mut DocumentMut, name: &str) -> &'a mut Item {
    if !doc.get(name).is_some_and(Item::is_table) {
        doc[name] = Item::Table(Table::new());
    }
    &mut doc[name]
}

/// Load (or start) the config document, apply `edit`, write it back atomically.
fn edit_config(path: &Path, edit: impl FnOnce(&mut DocumentMut)) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        ensure_private_dir(parent)?;
    }
    agentdeck_utils::recover_bak_file(path);

    let content = if path.exists() {
        fs::read_to_string(path)?
    } else {
        String::new()
    };
    let mut doc = content
        .parse::<DocumentMut>()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    edit(&mut doc);

    atomic_write_with_options(
        path,
        doc.to_string().as_bytes(),
        AtomicWriteOptions {
            sync_file: true,
            sync_parent_dir: true,
            mode: PersistMode::OwnerOnly,
        },
    )
}

fn ensure_private_dir(dir: &Path) -> io::Result<()> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::{MetadataExt, PermissionsExt};
        let metadata = fs::metadata(dir)?;
        // Only tighten permissions on a directory we own.
        let our_uid = unsafe { libc::getuid() };
        if metadata.uid() == our_uid {
            let mode = metadata.permissions().mode() & 0o777;
            if mode & 0o077 != 0 {
                fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
            }
        }
    }
    Ok(())
}
