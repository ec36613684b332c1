//! The settings panel's editing state.
//!
//! A session owns the loaded document, the decoded rule and environment lists,
//! and the three sub-editors. Edits only touch in-memory state; nothing reaches
//! the store until [`SettingsSession::save`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use agentdeck_core::{ServiceError, SettingsStore, assemble, decode_env, decode_rules};
use agentdeck_types::settings::{ENV_KEY, HOOKS_KEY};
use agentdeck_types::{
    EntryId, EnvironmentVariable, PermissionRule, ProxySettings, RuleKind, Section,
    SettingsDocument,
};

use crate::editors::{BinaryPathEditor, HooksEditor, ProxyEditor};
use crate::orchestrator::{SaveOrchestrator, SaveOutcome, SaveRejected, SaveRequest};
use crate::registry::DirtyRegistry;

pub struct SettingsSession {
    document: SettingsDocument,
    allow: Vec<PermissionRule>,
    deny: Vec<PermissionRule>,
    env: Vec<EnvironmentVariable>,
    hooks: HooksEditor,
    proxy: ProxyEditor,
    binary: BinaryPathEditor,
    orchestrator: SaveOrchestrator,
    /// Set when the stored document exists but could not be parsed.
    unparsed: Option<(PathBuf, String)>,
}

impl SettingsSession {
    /// Load the document and the auxiliary sections.
    ///
    /// An unavailable document is treated as empty; the first save creates it.
    /// A document that exists but does not parse is also shown as empty, but
    /// every save fails until it is fixed, so its contents are never replaced.
    pub async fn load(store: Arc<dyn SettingsStore>) -> Self {
        let mut unparsed = None;
        let document = match store.load_document().await {
            Ok(document) => document,
            Err(ServiceError::Parse { path, message }) => {
                tracing::warn!(
                    path = %path.display(),
                    "Settings document is malformed, saving disabled: {message}"
                );
                unparsed = Some((path, message));
                SettingsDocument::new()
            }
            Err(e) => {
                tracing::warn!("Settings document unavailable, starting empty: {e}");
                SettingsDocument::new()
            }
        };
        let proxy = store.load_proxy().await.unwrap_or_else(|e| {
            tracing::warn!("Proxy settings unavailable: {e}");
            ProxySettings::default()
        });
        let binary_path = store.load_binary_path().await.unwrap_or_else(|e| {
            tracing::warn!("Binary path unavailable: {e}");
            None
        });

        let registry = Arc::new(DirtyRegistry::with_sections(&Section::ALL));
        let hooks = HooksEditor::attach(
            document.get(HOOKS_KEY).cloned(),
            Arc::clone(&store),
            Arc::clone(&registry),
        );
        let proxy = ProxyEditor::attach(proxy, Arc::clone(&store), Arc::clone(&registry));
        let binary = BinaryPathEditor::attach(binary_path, Arc::clone(&store), Arc::clone(&registry));

        let (allow, deny, env) = decode_lists(&document);
        tracing::debug!(
            allow = allow.len(),
            deny = deny.len(),
            env = env.len(),
            "Settings session loaded"
        );

        Self {
            document,
            allow,
            deny,
            env,
            hooks,
            proxy,
            binary,
            orchestrator: SaveOrchestrator::new(store, registry),
            unparsed,
        }
    }

    /// Path of the stored document if it could not be parsed at load time.
    #[must_use]
    pub fn unparsed_document(&self) -> Option<&Path> {
        self.unparsed.as_ref().map(|(path, _)| path.as_path())
    }

    #[must_use]
    pub fn document(&self) -> &SettingsDocument {
        &self.document
    }

    #[must_use]
    pub fn rules(&self, kind: RuleKind) -> &[PermissionRule] {
        match kind {
            RuleKind::Allow => &self.allow,
            RuleKind::Deny => &self.deny,
        }
    }

    fn rules_mut(&mut self, kind: RuleKind) -> &mut Vec<PermissionRule> {
        match kind {
            RuleKind::Allow => &mut self.allow,
            RuleKind::Deny => &mut self.deny,
        }
    }

    /// Append a blank rule and return its id.
    pub fn add_rule(&mut self, kind: RuleKind) -> EntryId {
        let rule = PermissionRule::blank(kind);
        let id = rule.id.clone();
        self.rules_mut(kind).push(rule);
        id
    }

    /// Returns false when no rule has `id`.
    pub fn update_rule(&mut self, kind: RuleKind, id: &EntryId, value: impl Into<String>) -> bool {
        match self.rules_mut(kind).iter_mut().find(|rule| &rule.id == id) {
            Some(rule) => {
                rule.value = value.into();
                true
            }
            None => false,
        }
    }

    pub fn remove_rule(&mut self, kind: RuleKind, id: &EntryId) -> bool {
        let rules = self.rules_mut(kind);
        let before = rules.len();
        rules.retain(|rule| &rule.id != id);
        rules.len() != before
    }

    #[must_use]
    pub fn env_vars(&self) -> &[EnvironmentVariable] {
        &self.env
    }

    pub fn add_env_var(&mut self) -> EntryId {
        let var = EnvironmentVariable::blank();
        let id = var.id.clone();
        self.env.push(var);
        id
    }

    pub fn update_env_key(&mut self, id: &EntryId, key: impl Into<String>) -> bool {
        let Some(var) = self.env_var_mut(id) else {
            return false;
        };
        var.key = key.into();
        true
    }

    pub fn update_env_value(&mut self, id: &EntryId, value: impl Into<String>) -> bool {
        let Some(var) = self.env_var_mut(id) else {
            return false;
        };
        var.value = value.into();
        true
    }

    pub fn remove_env_var(&mut self, id: &EntryId) -> bool {
        let before = self.env.len();
        self.env.retain(|var| &var.id != id);
        self.env.len() != before
    }

    fn env_var_mut(&mut self, id: &EntryId) -> Option<&mut EnvironmentVariable> {
        self.env.iter_mut().find(|var| &var.id == id)
    }

    /// Set a simple top-level preference. `null` removes the key.
    pub fn update_setting(&mut self, key: &str, value: Value) {
        if value.is_null() {
            self.document.remove(key);
        } else {
            self.document.insert(key, value);
        }
    }

    #[must_use]
    pub fn include_co_authored_by(&self) -> bool {
        self.document.include_co_authored_by()
    }

    #[must_use]
    pub fn verbose(&self) -> bool {
        self.document.verbose()
    }

    #[must_use]
    pub fn cleanup_period_days(&self) -> Option<u64> {
        self.document.cleanup_period_days()
    }

    #[must_use]
    pub fn api_key_helper(&self) -> Option<&str> {
        self.document.api_key_helper()
    }

    #[must_use]
    pub fn model(&self) -> Option<&str> {
        self.document.model()
    }

    #[must_use]
    pub fn hooks(&self) -> &HooksEditor {
        &self.hooks
    }

    #[must_use]
    pub fn proxy(&self) -> &ProxyEditor {
        &self.proxy
    }

    #[must_use]
    pub fn binary_path(&self) -> &BinaryPathEditor {
        &self.binary
    }

    #[must_use]
    pub fn dirty_sections(&self) -> Vec<Section> {
        self.orchestrator.registry().dirty_sections()
    }

    /// The primary document as a save would assemble it now.
    #[must_use]
    pub fn preview(&self) -> SettingsDocument {
        assemble(&self.document, &self.allow, &self.deny, &self.env)
    }

    /// Save the document and every dirty section.
    ///
    /// Once the document is persisted it becomes the session's base, whether or
    /// not all sections committed. Failed sections stay dirty for the next save.
    /// A session loaded from a malformed document always reports `Failure`.
    ///
    /// # Errors
    ///
    /// Returns [`SaveRejected::InProgress`] if a save is already running.
    pub async fn save(&mut self) -> Result<SaveOutcome, SaveRejected> {
        if let Some((path, message)) = &self.unparsed {
            tracing::warn!(path = %path.display(), "Refusing to overwrite malformed settings document");
            return Ok(SaveOutcome::Failure {
                error: ServiceError::Parse {
                    path: path.clone(),
                    message: message.clone(),
                },
            });
        }
        let request = SaveRequest {
            base: self.document.clone(),
            allow: self.allow.clone(),
            deny: self.deny.clone(),
            env: self.env.clone(),
            binary_path: self.binary.pending_path(),
        };
        let hooks_were_dirty = self.orchestrator.registry().is_dirty(Section::Hooks);
        let outcome = self.orchestrator.save(request).await?;
        if let Some(document) = outcome.document() {
            self.document = document.clone();
            // The hooks commit writes the store directly; keep the base in step
            // so the next save does not persist the old hooks.
            if hooks_were_dirty && !outcome.pending().contains(&Section::Hooks) {
                self.document.insert(HOOKS_KEY, self.hooks.committed());
            }
        }
        Ok(outcome)
    }
}

fn decode_lists(
    document: &SettingsDocument,
) -> (Vec<PermissionRule>, Vec<PermissionRule>, Vec<EnvironmentVariable>) {
    let permissions = document.permissions();
    let rules = |kind: RuleKind| decode_rules(kind, permissions.and_then(|p| p.get(kind.key())));
    (
        rules(RuleKind::Allow),
        rules(RuleKind::Deny),
        decode_env(document.get(ENV_KEY)),
    )
}
