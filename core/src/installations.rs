//! Discovery of agent runtime installations on this machine.
//!
//! Candidates come from `$PATH`, nvm node versions and a fixed list of
//! well-known locations. Each is probed with `--version`; probing may fail in
//! sandboxed environments, so an installation without a version is still listed.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, warn};

/// Executable name of the agent runtime.
pub const AGENT_BINARY: &str = "claude";

static VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+\.\d+\.\d+(?:-[a-zA-Z0-9.-]+)?(?:\+[a-zA-Z0-9.-]+)?)")
        .expect("valid version regex")
});

/// Where an installation was found. Declaration order is preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InstallationSource {
    Which,
    Homebrew,
    System,
    Nvm,
    LocalBin,
    AgentLocal,
    NpmGlobal,
    Yarn,
    Bun,
    HomeBin,
    Custom,
}

impl InstallationSource {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Which => "which",
            Self::Homebrew => "homebrew",
            Self::System => "system",
            Self::Nvm => "nvm",
            Self::LocalBin => "local-bin",
            Self::AgentLocal => "agent-local",
            Self::NpmGlobal => "npm-global",
            Self::Yarn => "yarn",
            Self::Bun => "bun",
            Self::HomeBin => "home-bin",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for InstallationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
    pub path: String,
    pub version: Option<String>,
    pub source: InstallationSource,
}

impl Installation {
    /// A user-supplied path; probed for a version but not required to exist.
    #[must_use]
    pub fn custom(path: impl Into<String>) -> Self {
        let path = path.into();
        let version = probe_version(Path::new(&path));
        Self {
            path,
            version,
            source: InstallationSource::Custom,
        }
    }

    fn found(path: &Path, source: InstallationSource) -> Self {
        Self {
            path: path.to_string_lossy().into_owned(),
            version: probe_version(path),
            source,
        }
    }
}

/// Every installation found, best first.
#[must_use]
pub fn discover_installations() -> Vec<Installation> {
    info!("Discovering agent installations");
    let home = dirs::home_dir();

    let mut candidates: Vec<(PathBuf, InstallationSource)> = Vec::new();
    if let Ok(path) = which::which(AGENT_BINARY) {
        candidates.push((path, InstallationSource::Which));
    }
    if let Some(home) = &home {
        candidates.extend(nvm_candidates(home));
    }
    candidates.extend(well_known_candidates(home.as_deref()));

    let mut seen = HashSet::new();
    let mut installations: Vec<Installation> = candidates
        .into_iter()
        .filter(|(path, _)| path.is_file())
        .filter(|(path, _)| seen.insert(path.clone()))
        .map(|(path, source)| {
            debug!(path = %path.display(), %source, "Found agent binary");
            Installation::found(&path, source)
        })
        .collect();

    installations.sort_by(rank);
    installations
}

fn nvm_candidates(home: &Path) -> Vec<(PathBuf, InstallationSource)> {
    let node_versions = home.join(".nvm").join("versions").join("node");
    let Ok(entries) = fs::read_dir(&node_versions) else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
        .map(|entry| (entry.path().join("bin").join(AGENT_BINARY), InstallationSource::Nvm))
        .collect()
}

fn well_known_candidates(home: Option<&Path>) -> Vec<(PathBuf, InstallationSource)> {
    let mut candidates = vec![
        (PathBuf::from("/usr/local/bin"), InstallationSource::System),
        (PathBuf::from("/opt/homebrew/bin"), InstallationSource::Homebrew),
        (PathBuf::from("/usr/bin"), InstallationSource::System),
        (PathBuf::from("/bin"), InstallationSource::System),
    ];
    if let Some(home) = home {
        candidates.extend([
            (home.join(".claude").join("local"), InstallationSource::AgentLocal),
            (home.join(".local").join("bin"), InstallationSource::LocalBin),
            (home.join(".npm-global").join("bin"), InstallationSource::NpmGlobal),
            (home.join(".yarn").join("bin"), InstallationSource::Yarn),
            (home.join(".bun").join("bin"), InstallationSource::Bun),
            (home.join("bin"), InstallationSource::HomeBin),
        ]);
    }
    candidates
        .into_iter()
        .map(|(dir, source)| (dir.join(AGENT_BINARY), source))
        .collect()
}

/// Run `<path> --version` and pull a version number out of stdout.
#[must_use]
pub fn probe_version(path: &Path) -> Option<String> {
    match Command::new(path).arg("--version").output() {
        Ok(output) if output.status.success() => {
            extract_version(&String::from_utf8_lossy(&output.stdout))
        }
        Ok(_) => None,
        Err(e) => {
            warn!(path = %path.display(), "Failed to probe version: {e}");
            None
        }
    }
}

/// First `major.minor.patch[-pre][+build]` token in `output`.
#[must_use]
pub fn extract_version(output: &str) -> Option<String> {
    VERSION_PATTERN
        .captures(output)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}

/// Numeric component-wise comparison; missing components count as zero.
///
/// At equal numbers a pre-release (`1.2.0-beta`) sorts before the release.
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let (a_core, a_pre) = split_prerelease(a);
    let (b_core, b_pre) = split_prerelease(b);
    let a_parts = numeric_parts(a_core);
    let b_parts = numeric_parts(b_core);

    let len = a_parts.len().max(b_parts.len());
    for i in 0..len {
        let a_val = a_parts.get(i).copied().unwrap_or(0);
        let b_val = b_parts.get(i).copied().unwrap_or(0);
        match a_val.cmp(&b_val) {
            Ordering::Equal => {}
            other => return other,
        }
    }

    match (a_pre, b_pre) {
        (None, None) => Ordering::Equal,
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (Some(a_pre), Some(b_pre)) => a_pre.cmp(b_pre),
    }
}

fn split_prerelease(version: &str) -> (&str, Option<&str>) {
    let version = version.split('+').next().unwrap_or(version);
    match version.split_once('-') {
        Some((core, pre)) => (core, Some(pre)),
        None => (version, None),
    }
}

fn numeric_parts(core: &str) -> Vec<u64> {
    core.split('.')
        .map(|part| {
            let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
            digits.parse().unwrap_or(0)
        })
        .collect()
}

/// Best-first ordering: known versions before unknown, newer before older,
/// then by source preference.
fn rank(a: &Installation, b: &Installation) -> Ordering {
    let by_version = match (&a.version, &b.version) {
        (Some(va), Some(vb)) => compare_versions(vb, va),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_version.then_with(|| a.source.cmp(&b.source))
}

/// The installation `discover_installations` would put first.
#[must_use]
pub fn select_best(installations: &[Installation]) -> Option<&Installation> {
    installations.iter().min_by(|a, b| rank(a, b))
}
