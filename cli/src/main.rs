//! agentdeck - console for an agent runtime's settings.
//!
//! Every mutating command follows the same cycle:
//!
//! ```text
//! FileSettingsStore -> SettingsSession::load -> edit -> save -> SaveOutcome -> exit code
//! ```
//!
//! `Failure` and `PartialFailure` both exit with status 1.

mod commands;

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use agentdeck_types::RuleKind;

#[derive(Parser)]
#[command(name = "agentdeck")]
#[command(about = "Edit agent permissions, environment, proxy and binary settings", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the settings document
    Show,
    /// Edit `permissions.allow`
    Allow {
        #[command(subcommand)]
        action: RuleAction,
    },
    /// Edit `permissions.deny`
    Deny {
        #[command(subcommand)]
        action: RuleAction,
    },
    /// Edit the environment passed to the agent
    Env {
        #[command(subcommand)]
        action: EnvAction,
    },
    /// Set a top-level preference to a JSON value (`null` removes it)
    Set { key: String, value: String },
    /// List or choose the agent binary
    Binary {
        #[command(subcommand)]
        action: BinaryAction,
    },
    /// Show or change the outbound proxy
    Proxy {
        #[command(subcommand)]
        action: ProxyAction,
    },
    /// Show or change the display language
    Language { code: Option<String> },
    /// Anonymous usage analytics (off until consent is given)
    Analytics {
        #[command(subcommand)]
        action: Option<AnalyticsAction>,
    },
    /// Checkpoint strategy and retention for one agent session
    Checkpoint {
        #[command(flatten)]
        scope: ScopeArgs,
        #[command(subcommand)]
        action: Option<CheckpointAction>,
    },
}

#[derive(Subcommand)]
enum AnalyticsAction {
    Show,
    Enable {
        /// Consent to collecting anonymous usage data
        #[arg(long)]
        accept: bool,
    },
    Disable,
    /// Delete collected data and withdraw consent
    DeleteData,
}

#[derive(Args)]
struct ScopeArgs {
    #[arg(long)]
    project: String,
    #[arg(long)]
    session: String,
    /// Project directory; defaults to the working directory
    #[arg(long)]
    path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum CheckpointAction {
    Show,
    Enable,
    Disable,
    /// Set the strategy (manual, per_prompt, per_tool_use, smart)
    Strategy { strategy: String },
    /// Remove all but the most recent checkpoints
    Cleanup {
        #[arg(long, default_value_t = 10)]
        keep: usize,
    },
}

#[derive(Subcommand)]
enum RuleAction {
    Add { rule: String },
    Remove { rule: String },
}

#[derive(Subcommand)]
enum EnvAction {
    Set { key: String, value: String },
    Unset { key: String },
}

#[derive(Subcommand)]
enum BinaryAction {
    /// Installations found on this machine, best first
    List,
    Use { path: String },
}

#[derive(Subcommand)]
enum ProxyAction {
    Show,
    Set(ProxyArgs),
}

#[derive(Args, Debug, Default)]
struct ProxyArgs {
    #[arg(long)]
    http: Option<String>,
    #[arg(long)]
    https: Option<String>,
    #[arg(long = "no-proxy")]
    no_proxy: Option<String>,
    #[arg(long)]
    all: Option<String>,
    #[arg(long, conflicts_with = "disable")]
    enable: bool,
    #[arg(long)]
    disable: bool,
}

/// Log to a file when one can be opened. Without one, the filter is still
/// installed but nothing is written, since stdout carries command output.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    match open_log_file() {
        Ok((path, file)) => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .with(env_filter)
                .init();
            tracing::info!(path = %path.display(), "agentdeck {}", env!("CARGO_PKG_VERSION"));
        }
        Err(failures) => {
            tracing_subscriber::registry().with(env_filter).init();
            // Visible on stderr only when every candidate failed.
            for failure in failures {
                eprintln!("agentdeck: {failure}");
            }
        }
    }
}

/// First writable log file, or why each candidate was rejected.
fn open_log_file() -> Result<(PathBuf, fs::File), Vec<String>> {
    let mut failures = Vec::new();

    for candidate in log_file_candidates() {
        let opened = candidate
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|()| OpenOptions::new().create(true).append(true).open(&candidate));
        match opened {
            Ok(file) => return Ok((candidate, file)),
            Err(e) => failures.push(format!("cannot log to {}: {e}", candidate.display())),
        }
    }

    Err(failures)
}

/// `logs/agentdeck.log` next to the console config, then under the working
/// directory.
fn log_file_candidates() -> Vec<PathBuf> {
    let config_dir = agentdeck_config::config_path()
        .and_then(|path| path.parent().map(Path::to_path_buf));
    config_dir
        .into_iter()
        .chain([PathBuf::from(".agentdeck")])
        .map(|dir| dir.join("logs").join("agentdeck.log"))
        .collect()
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Command::Show => commands::show().await,
        Command::Allow { action } => commands::edit_rule(RuleKind::Allow, action).await,
        Command::Deny { action } => commands::edit_rule(RuleKind::Deny, action).await,
        Command::Env { action } => commands::edit_env(action).await,
        Command::Set { key, value } => commands::set_preference(&key, &value).await,
        Command::Binary {
            action: BinaryAction::List,
        } => commands::list_binaries().await,
        Command::Binary {
            action: BinaryAction::Use { path },
        } => commands::use_binary(path).await,
        Command::Proxy {
            action: ProxyAction::Show,
        } => commands::show_proxy().await,
        Command::Proxy {
            action: ProxyAction::Set(args),
        } => commands::set_proxy(args).await,
        Command::Language { code } => commands::language(code.as_deref()),
        Command::Analytics { action } => {
            commands::analytics(action.unwrap_or(AnalyticsAction::Show))
        }
        Command::Checkpoint { scope, action } => {
            commands::checkpoint(scope, action.unwrap_or(CheckpointAction::Show)).await
        }
    }
}
