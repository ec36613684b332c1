//! Full save cycle over the file-backed store and checkpoint timelines.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::{Value, json};

use agentdeck_config::{AgentdeckConfig, FileCheckpointService, FileSettingsStore};
use agentdeck_core::Installation;
use agentdeck_engine::{CheckpointRetention, SaveOutcome, ServiceError, SettingsSession};
use agentdeck_types::{CheckpointScope, CheckpointStrategy, RuleKind};

fn store_in(dir: &Path) -> FileSettingsStore {
    FileSettingsStore::new(
        dir.join("claude").join("settings.json"),
        dir.join("agentdeck").join("config.toml"),
    )
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn save_writes_document_and_auxiliary_sections() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(dir.path());
    fs::create_dir_all(store.settings_path().parent().unwrap()).unwrap();
    fs::write(
        store.settings_path(),
        r#"{"feedbackSurveyState":{"lastShownTime":1},"permissions":{"allow":["Bash"]},"env":{"A":"1"}}"#,
    )
    .unwrap();
    let settings_path = store.settings_path().to_path_buf();
    let config_path = store.config_path().to_path_buf();

    let mut session = SettingsSession::load(Arc::new(store)).await;
    let id = session.add_rule(RuleKind::Deny);
    session.update_rule(RuleKind::Deny, &id, "Bash(curl:*)");
    session
        .hooks()
        .set_hooks(json!({ "Notification": [{ "matcher": "", "hooks": [] }] }));
    session.proxy().update(|proxy| {
        proxy.enabled = true;
        proxy.no_proxy = "localhost".to_string();
    });
    let binary = dir.path().join("claude-bin").to_string_lossy().into_owned();
    session.binary_path().select(Installation::custom(binary.clone()));

    let outcome = session.save().await.unwrap();
    assert!(outcome.is_success(), "{outcome:?}");

    let written = read_json(&settings_path);
    assert_eq!(written["feedbackSurveyState"], json!({ "lastShownTime": 1 }));
    assert_eq!(
        written["permissions"],
        json!({ "allow": ["Bash"], "deny": ["Bash(curl:*)"] })
    );
    assert_eq!(written["env"], json!({ "A": "1" }));
    assert_eq!(
        written["hooks"],
        json!({ "Notification": [{ "matcher": "", "hooks": [] }] })
    );
    assert!(fs::read_to_string(&settings_path).unwrap().ends_with('\n'));

    let config = AgentdeckConfig::load_from(&config_path).unwrap().unwrap();
    assert!(config.proxy().enabled);
    assert_eq!(config.proxy().no_proxy, "localhost");
    assert_eq!(config.binary_path(), Some(binary.as_str()));
    assert_eq!(written["binaryPath"], json!(binary));
}

#[tokio::test]
async fn second_save_keeps_committed_hooks() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(dir.path());
    let settings_path = store.settings_path().to_path_buf();

    let mut session = SettingsSession::load(Arc::new(store)).await;
    session.hooks().set_hooks(json!({ "Stop": [] }));
    assert!(session.save().await.unwrap().is_success());

    session.update_setting("verbose", json!(true));
    assert!(session.save().await.unwrap().is_success());

    let written = read_json(&settings_path);
    assert_eq!(written["hooks"], json!({ "Stop": [] }));
    assert_eq!(written["verbose"], json!(true));
}

#[tokio::test]
async fn malformed_settings_file_is_never_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(dir.path());
    fs::create_dir_all(store.settings_path().parent().unwrap()).unwrap();
    let original = r#"{"model":"opus","hooks":{"Stop":[]},}"#;
    fs::write(store.settings_path(), original).unwrap();
    let settings_path = store.settings_path().to_path_buf();
    let config_path = store.config_path().to_path_buf();

    let mut session = SettingsSession::load(Arc::new(store)).await;
    assert!(session.document().is_empty());
    assert!(session.rules(RuleKind::Allow).is_empty());
    assert_eq!(session.unparsed_document(), Some(settings_path.as_path()));

    let id = session.add_rule(RuleKind::Allow);
    session.update_rule(RuleKind::Allow, &id, "Bash");
    session.proxy().update(|proxy| proxy.enabled = true);
    let outcome = session.save().await.unwrap();

    assert!(
        matches!(outcome, SaveOutcome::Failure { error: ServiceError::Parse { .. } }),
        "{outcome:?}"
    );
    assert_eq!(fs::read_to_string(&settings_path).unwrap(), original);
    assert!(!config_path.exists());
}

#[tokio::test]
async fn checkpoint_retention_over_timeline_files() {
    let dir = tempfile::tempdir().unwrap();
    let scope = CheckpointScope::new("s1", "p1", dir.path().join("work"));
    let checkpoints = dir
        .path()
        .join("projects")
        .join("p1")
        .join(".timelines")
        .join("s1")
        .join("checkpoints");
    for day in 1..=4 {
        let checkpoint = checkpoints.join(format!("cp{day}"));
        fs::create_dir_all(&checkpoint).unwrap();
        fs::write(
            checkpoint.join("metadata.json"),
            format!(r#"{{"timestamp":"2024-06-0{day}T08:00:00Z"}}"#),
        )
        .unwrap();
    }
    let service = Arc::new(FileCheckpointService::new(dir.path().join("projects")));

    let mut retention = CheckpointRetention::load(service.clone(), scope.clone()).await.unwrap();
    assert_eq!(retention.total(), 4);
    retention.set_enabled(true);
    retention.set_strategy(CheckpointStrategy::PerPrompt);
    retention.save().await.unwrap();

    assert_eq!(retention.request_cleanup(3).await.unwrap(), 1);
    assert_eq!(retention.total(), 3);
    assert!(!checkpoints.join("cp1").exists());

    let reloaded = CheckpointRetention::load(service, scope).await.unwrap();
    assert!(reloaded.enabled());
    assert_eq!(reloaded.strategy(), CheckpointStrategy::PerPrompt);
}
