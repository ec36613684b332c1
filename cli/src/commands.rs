use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde_json::Value;

use agentdeck_config::{
    AgentdeckConfig, AnalyticsPreference, EnableOutcome, FileCheckpointService,
    FileSettingsStore, LanguagePreference, config_path, persist_analytics, persist_language,
};
use agentdeck_core::{Installation, discover_installations, select_best};
use agentdeck_engine::{CheckpointRetention, SaveOutcome, SettingsSession};
use agentdeck_types::{CheckpointScope, CheckpointStrategy, Language, RuleKind};

use crate::{AnalyticsAction, CheckpointAction, EnvAction, ProxyArgs, RuleAction, ScopeArgs};

async fn open_session() -> Result<SettingsSession> {
    let store = FileSettingsStore::from_default_paths()
        .context("could not determine the home directory")?;
    tracing::debug!(
        settings = %store.settings_path().display(),
        config = %store.config_path().display(),
        "Opening settings session"
    );
    Ok(SettingsSession::load(Arc::new(store)).await)
}

async fn save(session: &mut SettingsSession) -> Result<ExitCode> {
    let outcome = session.save().await?;
    Ok(report(&outcome))
}

fn report(outcome: &SaveOutcome) -> ExitCode {
    match outcome {
        SaveOutcome::Success { .. } => {
            println!("Saved.");
            ExitCode::SUCCESS
        }
        SaveOutcome::PartialFailure {
            failure, pending, ..
        } => {
            let pending: Vec<&str> = pending.iter().map(|section| section.as_str()).collect();
            eprintln!("Settings saved, but {failure}.");
            eprintln!("Not yet applied: {}", pending.join(", "));
            ExitCode::FAILURE
        }
        SaveOutcome::Failure { error } => {
            eprintln!("Nothing was saved: {error}");
            ExitCode::FAILURE
        }
    }
}

pub async fn show() -> Result<ExitCode> {
    let session = open_session().await?;
    println!("{}", serde_json::to_string_pretty(session.document())?);
    Ok(ExitCode::SUCCESS)
}

pub async fn edit_rule(kind: RuleKind, action: RuleAction) -> Result<ExitCode> {
    let mut session = open_session().await?;
    match action {
        RuleAction::Add { rule } => {
            let id = session.add_rule(kind);
            session.update_rule(kind, &id, rule);
        }
        RuleAction::Remove { rule } => {
            let ids: Vec<_> = session
                .rules(kind)
                .iter()
                .filter(|existing| existing.value == rule)
                .map(|existing| existing.id.clone())
                .collect();
            if ids.is_empty() {
                bail!("no {} rule matches {rule:?}", kind.key());
            }
            for id in &ids {
                session.remove_rule(kind, id);
            }
        }
    }
    save(&mut session).await
}

pub async fn edit_env(action: EnvAction) -> Result<ExitCode> {
    let mut session = open_session().await?;
    match action {
        EnvAction::Set { key, value } => {
            let existing = session
                .env_vars()
                .iter()
                .rev()
                .find(|var| var.key == key)
                .map(|var| var.id.clone());
            let id = match existing {
                Some(id) => id,
                None => {
                    let id = session.add_env_var();
                    session.update_env_key(&id, key);
                    id
                }
            };
            session.update_env_value(&id, value);
        }
        EnvAction::Unset { key } => {
            let ids: Vec<_> = session
                .env_vars()
                .iter()
                .filter(|var| var.key == key)
                .map(|var| var.id.clone())
                .collect();
            if ids.is_empty() {
                bail!("environment variable {key} is not set");
            }
            for id in &ids {
                session.remove_env_var(id);
            }
        }
    }
    save(&mut session).await
}

/// `value` is parsed as JSON; anything that is not JSON is taken as a string.
pub async fn set_preference(key: &str, value: &str) -> Result<ExitCode> {
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    let mut session = open_session().await?;
    session.update_setting(key, value);
    save(&mut session).await
}

pub async fn list_binaries() -> Result<ExitCode> {
    let session = open_session().await?;
    let current = session.binary_path().current();
    let installations = discover_installations();
    if installations.is_empty() {
        println!("No agent installations found.");
        return Ok(ExitCode::SUCCESS);
    }

    let best = select_best(&installations).map(|best| best.path.clone());
    for installation in &installations {
        let marker = if current.as_deref() == Some(installation.path.as_str()) {
            "*"
        } else if current.is_none() && best.as_deref() == Some(installation.path.as_str()) {
            "+"
        } else {
            " "
        };
        println!(
            "{marker} {}  {}  ({})",
            installation.path,
            installation.version.as_deref().unwrap_or("unknown"),
            installation.source
        );
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn use_binary(path: String) -> Result<ExitCode> {
    let mut session = open_session().await?;
    let installation = discover_installations()
        .into_iter()
        .find(|found| found.path == path)
        .unwrap_or_else(|| Installation::custom(path));

    session.binary_path().select(installation);
    if !session.binary_path().is_dirty() {
        println!("Already using that binary.");
        return Ok(ExitCode::SUCCESS);
    }
    save(&mut session).await
}

pub async fn show_proxy() -> Result<ExitCode> {
    let session = open_session().await?;
    let proxy = session.proxy().settings();
    println!("enabled: {}", proxy.enabled);
    for (name, value) in [
        ("http_proxy", &proxy.http_proxy),
        ("https_proxy", &proxy.https_proxy),
        ("no_proxy", &proxy.no_proxy),
        ("all_proxy", &proxy.all_proxy),
    ] {
        println!("{name}: {value}");
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn set_proxy(args: ProxyArgs) -> Result<ExitCode> {
    let mut session = open_session().await?;
    session.proxy().update(|proxy| {
        if let Some(http) = args.http {
            proxy.http_proxy = http;
        }
        if let Some(https) = args.https {
            proxy.https_proxy = https;
        }
        if let Some(no_proxy) = args.no_proxy {
            proxy.no_proxy = no_proxy;
        }
        if let Some(all) = args.all {
            proxy.all_proxy = all;
        }
        if args.enable {
            proxy.enabled = true;
        } else if args.disable {
            proxy.enabled = false;
        }
    });
    if !session.proxy().is_dirty() {
        println!("Proxy settings unchanged.");
        return Ok(ExitCode::SUCCESS);
    }
    save(&mut session).await
}

fn load_config() -> Option<AgentdeckConfig> {
    AgentdeckConfig::load().unwrap_or_else(|e| {
        tracing::warn!("Ignoring unreadable config: {e}");
        None
    })
}

pub fn language(code: Option<&str>) -> Result<ExitCode> {
    let config = load_config();
    let stored = config.as_ref().and_then(AgentdeckConfig::language);
    let locale = LanguagePreference::system_locale();
    let mut preference = LanguagePreference::initialize(stored, locale.as_deref());

    let Some(code) = code else {
        let current = preference.current();
        println!("{} ({})", current.code(), current.native_name());
        return Ok(ExitCode::SUCCESS);
    };

    let Some(language) = Language::parse(code) else {
        let supported: Vec<&str> = Language::ALL.iter().map(|l| l.code()).collect();
        bail!("unsupported language {code:?}; expected one of {}", supported.join(", "));
    };
    let path = config_path().context("could not determine the home directory")?;
    if preference.change(language, |language| persist_language(&path, language))? {
        println!("Language set to {}.", language.native_name());
    } else {
        println!("Language is already {}.", language.native_name());
    }
    Ok(ExitCode::SUCCESS)
}

const ANALYTICS_NOTICE: &str = "\
Analytics sends anonymous usage data: feature usage, performance metrics and
error reports without file contents, paths or project names. Re-run with
--accept to consent and enable it.";

pub fn analytics(action: AnalyticsAction) -> Result<ExitCode> {
    let stored = load_config().map(|config| config.analytics()).unwrap_or_default();
    let mut preference = AnalyticsPreference::from_config(stored);
    let path = config_path().context("could not determine the home directory")?;
    let persist = |analytics| persist_analytics(&path, Some(analytics));

    match action {
        AnalyticsAction::Show => {
            println!("enabled: {}", preference.enabled());
            println!("consented: {}", preference.consented());
        }
        AnalyticsAction::Enable { accept: true } if !preference.consented() => {
            preference.consent_and_enable(persist)?;
            println!("Analytics enabled.");
        }
        AnalyticsAction::Enable { .. } => match preference.enable(persist)? {
            EnableOutcome::Enabled => println!("Analytics enabled."),
            EnableOutcome::AlreadyEnabled => println!("Analytics is already enabled."),
            EnableOutcome::ConsentRequired => {
                eprintln!("{ANALYTICS_NOTICE}");
                return Ok(ExitCode::FAILURE);
            }
        },
        AnalyticsAction::Disable => {
            if preference.disable(persist)? {
                println!("Analytics disabled.");
            } else {
                println!("Analytics is already disabled.");
            }
        }
        AnalyticsAction::DeleteData => {
            preference.delete_data(|| persist_analytics(&path, None))?;
            println!("Analytics data deleted; consent withdrawn.");
        }
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn checkpoint(scope: ScopeArgs, action: CheckpointAction) -> Result<ExitCode> {
    let service = FileCheckpointService::from_default_paths()
        .context("could not determine the home directory")?;
    let project_path = match scope.path {
        Some(path) => path,
        None => std::env::current_dir().context("could not read the working directory")?,
    };
    let scope = CheckpointScope::new(scope.session, scope.project, project_path);
    let mut retention = CheckpointRetention::load(Arc::new(service), scope).await?;

    match action {
        CheckpointAction::Show => {
            println!("auto checkpoints: {}", retention.enabled());
            println!("strategy: {}", retention.strategy());
            println!("checkpoints: {}", retention.total());
            return Ok(ExitCode::SUCCESS);
        }
        CheckpointAction::Enable => retention.set_enabled(true),
        CheckpointAction::Disable => retention.set_enabled(false),
        CheckpointAction::Strategy { strategy } => {
            let Some(parsed) = CheckpointStrategy::parse(&strategy) else {
                let supported: Vec<&str> =
                    CheckpointStrategy::ALL.iter().map(|s| s.as_str()).collect();
                bail!("unknown strategy {strategy:?}; expected one of {}", supported.join(", "));
            };
            retention.set_strategy(parsed);
        }
        CheckpointAction::Cleanup { keep } => {
            let removed = retention.request_cleanup(keep).await?;
            println!("Removed {removed} checkpoint(s); {} left.", retention.total());
            return Ok(ExitCode::SUCCESS);
        }
    }

    retention.save().await?;
    println!(
        "Checkpoint settings saved (auto: {}, strategy: {}).",
        retention.enabled(),
        retention.strategy()
    );
    Ok(ExitCode::SUCCESS)
}
