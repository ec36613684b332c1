//! Save cycle behaviour over a recording store.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::Notify;

use agentdeck_core::{Installation, InstallationSource};
use agentdeck_engine::{
    DirtyRegistry, SaveOrchestrator, SaveOutcome, SaveRejected, SaveRequest, SettingsSession,
};
use agentdeck_types::{ProxySettings, RuleKind, Section};

use crate::common::{Call, HooksGate, RecordingStore};

fn homebrew() -> Installation {
    Installation {
        path: "/opt/homebrew/bin/claude".to_string(),
        version: Some("1.0.41".to_string()),
        source: InstallationSource::Homebrew,
    }
}

/// Make all three sections dirty.
fn touch_every_section(session: &SettingsSession) {
    session
        .hooks()
        .set_hooks(json!({ "Stop": [{ "hooks": [{ "type": "command", "command": "say done" }] }] }));
    session.proxy().update(|proxy| {
        proxy.enabled = true;
        proxy.https_proxy = "http://127.0.0.1:7890".to_string();
    });
    session.binary_path().select(homebrew());
}

#[tokio::test]
async fn adding_a_deny_rule_reassembles_only_permissions_and_env() {
    let store = Arc::new(RecordingStore::with_document(json!({
        "permissions": { "allow": ["Bash"] },
        "env": { "A": "1" },
        "model": "opus",
        "statusLine": { "type": "command", "command": "status.sh" }
    })));
    let mut session = SettingsSession::load(store.clone()).await;

    let allow: Vec<&str> = session.rules(RuleKind::Allow).iter().map(|r| r.value.as_str()).collect();
    assert_eq!(allow, ["Bash"]);
    assert!(session.rules(RuleKind::Deny).is_empty());
    assert_eq!(session.env_vars().len(), 1);
    assert_eq!(session.env_vars()[0].key, "A");
    assert_eq!(session.env_vars()[0].value, "1");

    let id = session.add_rule(RuleKind::Deny);
    assert!(session.update_rule(RuleKind::Deny, &id, "Bash(curl:*)"));
    let outcome = session.save().await.unwrap();

    assert!(outcome.is_success());
    assert_eq!(
        store.last_persisted(),
        Some(json!({
            "permissions": { "allow": ["Bash"], "deny": ["Bash(curl:*)"] },
            "env": { "A": "1" },
            "model": "opus",
            "statusLine": { "type": "command", "command": "status.sh" }
        }))
    );
    assert_eq!(store.calls(), [Call::Persist]);
}

#[tokio::test]
async fn persist_failure_commits_nothing_and_keeps_every_section_dirty() {
    let store = Arc::new(RecordingStore::with_document(json!({ "model": "opus" })));
    let mut session = SettingsSession::load(store.clone()).await;
    touch_every_section(&session);
    session.update_setting("model", json!("sonnet"));
    store.fail_on(Call::Persist);

    let outcome = session.save().await.unwrap();

    assert!(matches!(outcome, SaveOutcome::Failure { .. }));
    assert_eq!(store.calls(), [Call::Persist]);
    assert!(store.committed_hooks().is_empty());
    assert!(store.committed_proxies().is_empty());
    assert!(store.committed_binary_paths().is_empty());
    assert_eq!(session.dirty_sections(), Section::ALL);
}

#[tokio::test]
async fn last_section_failure_reports_only_that_section() {
    let store = Arc::new(RecordingStore::with_document(json!({})));
    let mut session = SettingsSession::load(store.clone()).await;
    touch_every_section(&session);
    store.fail_on(Call::BinaryPath);

    let outcome = session.save().await.unwrap();

    let SaveOutcome::PartialFailure { failure, pending, .. } = &outcome else {
        panic!("expected partial failure, got {outcome:?}");
    };
    assert_eq!(failure.section, Section::BinaryPath);
    assert_eq!(pending, &[Section::BinaryPath]);
    assert_eq!(
        store.calls(),
        [Call::Persist, Call::Hooks, Call::Proxy, Call::BinaryPath]
    );
    assert_eq!(session.dirty_sections(), [Section::BinaryPath]);
    assert!(!session.hooks().is_dirty());
    assert!(!session.proxy().is_dirty());
}

#[tokio::test]
async fn first_section_failure_leaves_later_sections_unattempted() {
    let store = Arc::new(RecordingStore::with_document(json!({})));
    let mut session = SettingsSession::load(store.clone()).await;
    touch_every_section(&session);
    store.fail_on(Call::Hooks);

    let outcome = session.save().await.unwrap();

    assert_eq!(outcome.pending(), Section::ALL);
    assert_eq!(store.calls(), [Call::Persist, Call::Hooks]);
    assert_eq!(session.dirty_sections(), Section::ALL);
}

#[tokio::test]
async fn retry_after_partial_failure_commits_only_remaining_sections() {
    let store = Arc::new(RecordingStore::with_document(json!({ "permissions": { "allow": ["Read"] } })));
    let mut session = SettingsSession::load(store.clone()).await;
    touch_every_section(&session);
    store.fail_on(Call::Proxy);

    let first = session.save().await.unwrap();
    assert_eq!(first.pending(), [Section::Proxy, Section::BinaryPath]);
    // The primary document stays applied after a partial failure.
    assert_eq!(session.document().get("permissions"), Some(&json!({ "allow": ["Read"], "deny": [] })));

    store.clear_failures();
    let second = session.save().await.unwrap();

    assert!(second.is_success());
    assert_eq!(
        store.calls(),
        [
            Call::Persist,
            Call::Hooks,
            Call::Proxy,
            Call::Persist,
            Call::Proxy,
            Call::BinaryPath
        ]
    );
    assert_eq!(store.committed_hooks().len(), 1);
    assert!(session.dirty_sections().is_empty());
}

#[tokio::test]
async fn unavailable_document_loads_empty_and_saves_fresh() {
    let store = Arc::new(RecordingStore::unavailable());
    let mut session = SettingsSession::load(store.clone()).await;
    assert!(session.document().is_empty());

    let id = session.add_env_var();
    session.update_env_key(&id, "ANTHROPIC_LOG");
    session.update_env_value(&id, "debug");
    session.save().await.unwrap();

    assert_eq!(
        store.last_persisted(),
        Some(json!({
            "permissions": { "allow": [], "deny": [] },
            "env": { "ANTHROPIC_LOG": "debug" }
        }))
    );
}

#[tokio::test]
async fn blank_entries_are_dropped_and_duplicates_kept() {
    let store = Arc::new(RecordingStore::with_document(json!({
        "permissions": { "allow": ["Bash", "Bash"], "defaultMode": "acceptEdits" },
        "env": { "A": "1" }
    })));
    let mut session = SettingsSession::load(store.clone()).await;
    session.add_rule(RuleKind::Allow);
    let id = session.add_rule(RuleKind::Allow);
    session.update_rule(RuleKind::Allow, &id, "   ");

    let blank_value = session.add_env_var();
    session.update_env_key(&blank_value, "EMPTY");
    let duplicate = session.add_env_var();
    session.update_env_key(&duplicate, "A");
    session.update_env_value(&duplicate, "2");

    session.save().await.unwrap();

    assert_eq!(
        store.last_persisted(),
        Some(json!({
            "permissions": { "allow": ["Bash", "Bash"], "defaultMode": "acceptEdits", "deny": [] },
            "env": { "A": "2" }
        }))
    );
}

#[tokio::test]
async fn added_entries_get_ids_distinct_from_loaded_ones() {
    let store = Arc::new(RecordingStore::with_document(json!({
        "permissions": { "allow": ["Read", "Edit"] }
    })));
    let mut session = SettingsSession::load(store).await;

    let loaded = session.rules(RuleKind::Allow)[0].id.clone();
    assert!(session.remove_rule(RuleKind::Allow, &loaded));
    let added = session.add_rule(RuleKind::Allow);

    let ids: Vec<_> = session.rules(RuleKind::Allow).iter().map(|r| r.id.clone()).collect();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
    assert!(!session.remove_rule(RuleKind::Allow, &loaded));
    assert!(session.remove_rule(RuleKind::Allow, &added));
}

#[tokio::test]
async fn null_setting_removes_the_key() {
    let store = Arc::new(RecordingStore::with_document(json!({
        "apiKeyHelper": "/bin/key.sh",
        "includeCoAuthoredBy": false
    })));
    let mut session = SettingsSession::load(store.clone()).await;
    assert_eq!(session.api_key_helper(), Some("/bin/key.sh"));
    assert!(!session.include_co_authored_by());

    session.update_setting("apiKeyHelper", serde_json::Value::Null);
    session.update_setting("cleanupPeriodDays", json!(30));

    assert_eq!(session.api_key_helper(), None);
    assert_eq!(session.cleanup_period_days(), Some(30));
    let preview = session.preview();
    assert!(!preview.contains_key("apiKeyHelper"));
    assert_eq!(preview.get("includeCoAuthoredBy"), Some(&json!(false)));
}

#[tokio::test]
async fn selected_binary_path_is_merged_before_persisting() {
    let store = Arc::new(
        RecordingStore::with_document(json!({})).binary_path("/usr/local/bin/claude"),
    );
    let mut session = SettingsSession::load(store.clone()).await;
    session.binary_path().select(homebrew());

    session.save().await.unwrap();

    let persisted = store.last_persisted().unwrap();
    assert_eq!(persisted["binaryPath"], json!("/opt/homebrew/bin/claude"));
    assert_eq!(store.committed_binary_paths(), ["/opt/homebrew/bin/claude"]);
    assert_eq!(
        session.binary_path().current().as_deref(),
        Some("/opt/homebrew/bin/claude")
    );
}

#[tokio::test]
async fn unchanged_proxy_is_not_committed() {
    let proxy = ProxySettings {
        enabled: true,
        http_proxy: "http://proxy:8080".to_string(),
        ..ProxySettings::default()
    };
    let store = Arc::new(RecordingStore::with_document(json!({})).proxy(proxy.clone()));
    let mut session = SettingsSession::load(store.clone()).await;

    session.proxy().update(|draft| draft.enabled = false);
    session.proxy().set(proxy);
    session.save().await.unwrap();

    assert_eq!(store.calls(), [Call::Persist]);
}

#[tokio::test]
async fn back_to_back_saves_persist_once() {
    let gate = Arc::new(Notify::new());
    let store = Arc::new(RecordingStore::with_document(json!({})).gated(Arc::clone(&gate)));
    let orchestrator = SaveOrchestrator::new(store.clone(), Arc::new(DirtyRegistry::new()));

    let (first, second) = tokio::join!(orchestrator.save(SaveRequest::default()), async {
        let second = orchestrator.save(SaveRequest::default()).await;
        gate.notify_one();
        second
    });

    assert!(first.unwrap().is_success());
    assert!(matches!(second, Err(SaveRejected::InProgress)));
    assert_eq!(store.persisted().len(), 1);
}

#[tokio::test]
async fn hooks_edited_while_their_commit_is_in_flight_are_saved_next_time() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let store = Arc::new(RecordingStore::with_document(json!({})).gated_hooks(HooksGate {
        entered: Arc::clone(&entered),
        release: Arc::clone(&release),
    }));
    let mut session = SettingsSession::load(store.clone()).await;
    session.hooks().set_hooks(json!({ "Stop": ["v1"] }));
    let hooks = session.hooks().clone();

    let (first, ()) = tokio::join!(session.save(), async {
        entered.notified().await;
        hooks.set_hooks(json!({ "Stop": ["v2"] }));
        release.notify_one();
    });

    assert!(first.unwrap().is_success());
    assert!(hooks.is_dirty());
    assert_eq!(session.dirty_sections(), [Section::Hooks]);
    assert_eq!(session.document().get("hooks"), Some(&json!({ "Stop": ["v1"] })));

    let second = session.save().await.unwrap();

    assert!(second.is_success());
    assert_eq!(
        store.committed_hooks(),
        [json!({ "Stop": ["v1"] }), json!({ "Stop": ["v2"] })]
    );
    assert!(session.dirty_sections().is_empty());
}
