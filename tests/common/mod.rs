//! Shared test utilities and fixtures
//!
//! In-memory stand-ins for the settings store and the checkpoint service.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::Notify;

use agentdeck_core::{CheckpointService, ServiceError, ServiceFut, SettingsStore};
use agentdeck_types::{
    CheckpointScope, CheckpointSettings, CheckpointStrategy, KeepCount, ProxySettings,
    SettingsDocument,
};

/// One observable call on [`RecordingStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    Persist,
    Hooks,
    Proxy,
    BinaryPath,
}

/// Parks the first `commit_hooks` call: signals `entered`, then waits for `release`.
pub struct HooksGate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

/// Settings store that records every call and fails on demand.
#[derive(Default)]
pub struct RecordingStore {
    document: Option<SettingsDocument>,
    binary_path: Option<String>,
    proxy: ProxySettings,
    gate: Option<Arc<Notify>>,
    hooks_gate: Mutex<Option<HooksGate>>,
    failing: Mutex<HashSet<Call>>,
    calls: Mutex<Vec<Call>>,
    persisted: Mutex<Vec<SettingsDocument>>,
    hooks: Mutex<Vec<Value>>,
    proxies: Mutex<Vec<ProxySettings>>,
    binary_paths: Mutex<Vec<String>>,
}

impl RecordingStore {
    /// Store whose `load_document` fails.
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn with_document(document: Value) -> Self {
        Self {
            document: Some(SettingsDocument::from_value(document).expect("test document is an object")),
            ..Self::default()
        }
    }

    pub fn binary_path(mut self, path: &str) -> Self {
        self.binary_path = Some(path.to_string());
        self
    }

    pub fn proxy(mut self, proxy: ProxySettings) -> Self {
        self.proxy = proxy;
        self
    }

    /// `persist_document` waits for `gate` before completing.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn gated_hooks(self, gate: HooksGate) -> Self {
        *self.hooks_gate.lock().unwrap() = Some(gate);
        self
    }

    pub fn fail_on(&self, call: Call) {
        self.failing.lock().unwrap().insert(call);
    }

    pub fn clear_failures(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn persisted(&self) -> Vec<SettingsDocument> {
        self.persisted.lock().unwrap().clone()
    }

    pub fn last_persisted(&self) -> Option<Value> {
        self.persisted
            .lock()
            .unwrap()
            .last()
            .cloned()
            .map(SettingsDocument::into_value)
    }

    pub fn committed_hooks(&self) -> Vec<Value> {
        self.hooks.lock().unwrap().clone()
    }

    pub fn committed_proxies(&self) -> Vec<ProxySettings> {
        self.proxies.lock().unwrap().clone()
    }

    pub fn committed_binary_paths(&self) -> Vec<String> {
        self.binary_paths.lock().unwrap().clone()
    }

    fn record(&self, call: Call) -> Result<(), ServiceError> {
        self.calls.lock().unwrap().push(call);
        if self.failing.lock().unwrap().contains(&call) {
            return Err(ServiceError::Rejected(format!("{call:?} refused")));
        }
        Ok(())
    }
}

impl SettingsStore for RecordingStore {
    fn load_document(&self) -> ServiceFut<'_, SettingsDocument> {
        Box::pin(async move {
            self.document
                .clone()
                .ok_or_else(|| ServiceError::Unavailable("settings document".to_string()))
        })
    }

    fn persist_document<'a>(&'a self, document: &'a SettingsDocument) -> ServiceFut<'a, ()> {
        Box::pin(async move {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.record(Call::Persist)?;
            self.persisted.lock().unwrap().push(document.clone());
            Ok(())
        })
    }

    fn load_binary_path(&self) -> ServiceFut<'_, Option<String>> {
        Box::pin(async move { Ok(self.binary_path.clone()) })
    }

    fn load_proxy(&self) -> ServiceFut<'_, ProxySettings> {
        Box::pin(async move { Ok(self.proxy.clone()) })
    }

    fn commit_hooks(&self, hooks: Value) -> ServiceFut<'_, ()> {
        Box::pin(async move {
            let gate = self.hooks_gate.lock().unwrap().take();
            if let Some(gate) = gate {
                gate.entered.notify_one();
                gate.release.notified().await;
            }
            self.record(Call::Hooks)?;
            self.hooks.lock().unwrap().push(hooks);
            Ok(())
        })
    }

    fn commit_proxy(&self, proxy: ProxySettings) -> ServiceFut<'_, ()> {
        Box::pin(async move {
            self.record(Call::Proxy)?;
            self.proxies.lock().unwrap().push(proxy);
            Ok(())
        })
    }

    fn commit_binary_path(&self, path: String) -> ServiceFut<'_, ()> {
        Box::pin(async move {
            self.record(Call::BinaryPath)?;
            self.binary_paths.lock().unwrap().push(path);
            Ok(())
        })
    }
}

/// Checkpoint service over an in-memory checkpoint count.
pub struct ScriptedCheckpoints {
    settings: Mutex<CheckpointSettings>,
    fail_settings: Mutex<bool>,
    cleanups: Mutex<Vec<usize>>,
    updates: Mutex<Vec<(bool, CheckpointStrategy)>>,
}

impl ScriptedCheckpoints {
    pub fn new(total: usize) -> Self {
        Self {
            settings: Mutex::new(CheckpointSettings {
                auto_checkpoint_enabled: true,
                checkpoint_strategy: CheckpointStrategy::default(),
                total_checkpoints: total,
            }),
            fail_settings: Mutex::new(false),
            cleanups: Mutex::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_settings(&self, fail: bool) {
        *self.fail_settings.lock().unwrap() = fail;
    }

    /// Keep counts received by `cleanup_checkpoints`.
    pub fn cleanups(&self) -> Vec<usize> {
        self.cleanups.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<(bool, CheckpointStrategy)> {
        self.updates.lock().unwrap().clone()
    }
}

impl CheckpointService for ScriptedCheckpoints {
    fn checkpoint_settings<'a>(
        &'a self,
        _scope: &'a CheckpointScope,
    ) -> ServiceFut<'a, CheckpointSettings> {
        Box::pin(async move {
            if *self.fail_settings.lock().unwrap() {
                return Err(ServiceError::Unavailable("checkpoint service".to_string()));
            }
            Ok(*self.settings.lock().unwrap())
        })
    }

    fn update_checkpoint_settings<'a>(
        &'a self,
        _scope: &'a CheckpointScope,
        enabled: bool,
        strategy: CheckpointStrategy,
    ) -> ServiceFut<'a, ()> {
        Box::pin(async move {
            self.updates.lock().unwrap().push((enabled, strategy));
            let mut settings = self.settings.lock().unwrap();
            settings.auto_checkpoint_enabled = enabled;
            settings.checkpoint_strategy = strategy;
            Ok(())
        })
    }

    fn cleanup_checkpoints<'a>(
        &'a self,
        _scope: &'a CheckpointScope,
        keep: KeepCount,
    ) -> ServiceFut<'a, usize> {
        Box::pin(async move {
            self.cleanups.lock().unwrap().push(keep.get());
            let mut settings = self.settings.lock().unwrap();
            let removed = settings.total_checkpoints.saturating_sub(keep.get());
            settings.total_checkpoints -= removed;
            Ok(removed)
        })
    }
}

pub fn test_scope() -> CheckpointScope {
    CheckpointScope::new("session-test", "project-test", "/tmp/agentdeck-project")
}
