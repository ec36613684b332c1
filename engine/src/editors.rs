//! Sub-editors for the auxiliary settings sections.
//!
//! Each editor keeps a baseline (last persisted value) and a draft. It reports
//! divergence to the [`DirtyRegistry`] and registers a commit that pushes the
//! draft to the store and, on success, makes it the new baseline.
//!
//! Editors are cheap handles and may be edited while a save is in flight. The
//! dirty flag is reported under the editor's own lock, and a commit reports
//! whether the draft moved on while the store call was pending, so such an
//! edit is left for the next save.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};

use agentdeck_core::{Installation, ServiceError, SettingsStore};
use agentdeck_types::{ProxySettings, Section};

use crate::registry::{CommitFn, CommitFut, DirtyRegistry};

#[derive(Debug, Clone, PartialEq)]
struct Buffer<T> {
    baseline: T,
    draft: T,
}

impl<T: Clone + PartialEq> Buffer<T> {
    fn new(initial: T) -> Self {
        Self {
            baseline: initial.clone(),
            draft: initial,
        }
    }

    fn is_dirty(&self) -> bool {
        self.draft != self.baseline
    }
}

fn lock<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Hooks configuration, stored as the raw `hooks` object of the settings document.
#[derive(Debug, Clone)]
pub struct HooksEditor {
    state: Arc<Mutex<Buffer<Value>>>,
    registry: Arc<DirtyRegistry>,
}

impl HooksEditor {
    pub fn attach(
        initial: Option<Value>,
        store: Arc<dyn SettingsStore>,
        registry: Arc<DirtyRegistry>,
    ) -> Self {
        let initial = initial.unwrap_or_else(|| Value::Object(Map::new()));
        let state = Arc::new(Mutex::new(Buffer::new(initial)));

        let shared = Arc::clone(&state);
        let commit: CommitFn = Arc::new(move || -> CommitFut {
            Box::pin(commit_hooks(Arc::clone(&store), Arc::clone(&shared)))
        });
        registry.register(Section::Hooks, commit);

        Self { state, registry }
    }

    #[must_use]
    pub fn hooks(&self) -> Value {
        lock(&self.state).draft.clone()
    }

    pub fn set_hooks(&self, hooks: Value) {
        let mut state = lock(&self.state);
        state.draft = hooks;
        self.registry.mark_dirty(Section::Hooks, state.is_dirty());
    }

    /// The hooks as last committed.
    #[must_use]
    pub fn committed(&self) -> Value {
        lock(&self.state).baseline.clone()
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        lock(&self.state).is_dirty()
    }
}

#[derive(Debug, Clone)]
pub struct ProxyEditor {
    state: Arc<Mutex<Buffer<ProxySettings>>>,
    registry: Arc<DirtyRegistry>,
}

impl ProxyEditor {
    pub fn attach(
        initial: ProxySettings,
        store: Arc<dyn SettingsStore>,
        registry: Arc<DirtyRegistry>,
    ) -> Self {
        let state = Arc::new(Mutex::new(Buffer::new(initial)));

        let shared = Arc::clone(&state);
        let commit: CommitFn = Arc::new(move || -> CommitFut {
            Box::pin(commit_proxy(Arc::clone(&store), Arc::clone(&shared)))
        });
        registry.register(Section::Proxy, commit);

        Self { state, registry }
    }

    #[must_use]
    pub fn settings(&self) -> ProxySettings {
        lock(&self.state).draft.clone()
    }

    /// Apply `edit` to the draft and report the resulting divergence.
    pub fn update(&self, edit: impl FnOnce(&mut ProxySettings)) {
        let mut state = lock(&self.state);
        edit(&mut state.draft);
        self.registry.mark_dirty(Section::Proxy, state.is_dirty());
    }

    pub fn set(&self, settings: ProxySettings) {
        self.update(|draft| *draft = settings);
    }

    /// Variables the draft would export to the agent process.
    #[must_use]
    pub fn env_pairs(&self) -> Vec<(&'static str, String)> {
        let state = lock(&self.state);
        state
            .draft
            .env_pairs()
            .into_iter()
            .map(|(name, value)| (name, value.to_string()))
            .collect()
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        lock(&self.state).is_dirty()
    }
}

#[derive(Debug, Clone, Default)]
struct BinarySelection {
    current: Option<String>,
    selected: Option<Installation>,
}

impl BinarySelection {
    fn pending_path(&self) -> Option<&str> {
        let selected = self.selected.as_ref()?;
        (self.current.as_deref() != Some(selected.path.as_str())).then_some(selected.path.as_str())
    }
}

/// The agent binary the console launches.
#[derive(Debug, Clone)]
pub struct BinaryPathEditor {
    state: Arc<Mutex<BinarySelection>>,
    registry: Arc<DirtyRegistry>,
}

impl BinaryPathEditor {
    pub fn attach(
        current: Option<String>,
        store: Arc<dyn SettingsStore>,
        registry: Arc<DirtyRegistry>,
    ) -> Self {
        let state = Arc::new(Mutex::new(BinarySelection {
            current,
            selected: None,
        }));

        let shared = Arc::clone(&state);
        let commit: CommitFn = Arc::new(move || -> CommitFut {
            Box::pin(commit_binary_path(Arc::clone(&store), Arc::clone(&shared)))
        });
        registry.register(Section::BinaryPath, commit);

        Self { state, registry }
    }

    #[must_use]
    pub fn current(&self) -> Option<String> {
        lock(&self.state).current.clone()
    }

    #[must_use]
    pub fn selected(&self) -> Option<Installation> {
        lock(&self.state).selected.clone()
    }

    /// Path a save would write, if the selection differs from the current path.
    #[must_use]
    pub fn pending_path(&self) -> Option<String> {
        lock(&self.state).pending_path().map(str::to_string)
    }

    pub fn select(&self, installation: Installation) {
        let mut state = lock(&self.state);
        state.selected = Some(installation);
        self.registry
            .mark_dirty(Section::BinaryPath, state.pending_path().is_some());
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        lock(&self.state).pending_path().is_some()
    }
}

async fn commit_hooks(
    store: Arc<dyn SettingsStore>,
    state: Arc<Mutex<Buffer<Value>>>,
) -> Result<bool, ServiceError> {
    let draft = lock(&state).draft.clone();
    store.commit_hooks(draft.clone()).await?;
    let mut state = lock(&state);
    state.baseline = draft;
    Ok(state.is_dirty())
}

async fn commit_proxy(
    store: Arc<dyn SettingsStore>,
    state: Arc<Mutex<Buffer<ProxySettings>>>,
) -> Result<bool, ServiceError> {
    let draft = lock(&state).draft.clone();
    store.commit_proxy(draft.clone()).await?;
    let mut state = lock(&state);
    state.baseline = draft;
    Ok(state.is_dirty())
}

/// No-op when the selection already matches the current path.
async fn commit_binary_path(
    store: Arc<dyn SettingsStore>,
    state: Arc<Mutex<BinarySelection>>,
) -> Result<bool, ServiceError> {
    let pending = lock(&state).pending_path().map(str::to_string);
    let Some(path) = pending else {
        return Ok(false);
    };
    store.commit_binary_path(path.clone()).await?;
    let mut state = lock(&state);
    state.current = Some(path);
    Ok(state.pending_path().is_some())
}
