//! # pw-cli
//!
//! Command-line interface for patchwire.
//!
//! - `pw serve` — run the daemon against a workspace
//! - `pw sync` — run the client sync agent until Ctrl-C (or once)
//! - `pw submit <target> <patch-file>` — submit a unified diff
//! - `pw status` — daemon status
//! - `pw task list/add` — inspect and create tasks
//! - `pw change list/show/verify` — inspect and verify changes

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pw_sync::ClientConfig;

/// patchwire — patch application and sync for coding agents.
#[derive(Parser)]
#[command(name = "pw", version, about)]
struct Cli {
    /// Client config file (defaults to <config dir>/patchwire/client.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Daemon base URL (overrides the config file and PW_API_URL).
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon.
    Serve {
        /// Workspace root (defaults to current directory).
        #[arg(long, default_value = ".")]
        workspace: PathBuf,
        #[arg(long)]
        bind: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Keep a local checkout in sync with the daemon.
    Sync {
        /// Run one sync cycle and exit.
        #[arg(long)]
        once: bool,
        /// Apply incoming changes locally as they arrive.
        #[arg(long)]
        auto_apply: bool,
    },
    /// Submit a unified diff for application.
    Submit {
        /// Workspace-relative target path.
        target: String,
        /// File containing the patch.
        patch_file: PathBuf,
    },
    /// Show daemon status.
    Status,
    /// Manage tasks.
    Task {
        #[command(subcommand)]
        command: commands::task::TaskCommands,
    },
    /// Inspect and verify changes.
    Change {
        #[command(subcommand)]
        command: commands::change::ChangeCommands,
    },
}

fn client_config(cli: &Cli) -> anyhow::Result<ClientConfig> {
    let mut config = ClientConfig::load(cli.config.as_deref())?;
    if let Some(url) = &cli.api_url {
        config.api_url = url.clone();
        config.validate()?;
    }
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let verbose: &[&str] = match cli.command {
        Commands::Serve { .. } => &[
            "pw_cli",
            "pw_daemon",
            "pw_engine",
            "pw_git",
            "pw_workspace",
            "pw_verify",
            "pw_events",
        ],
        Commands::Sync { .. } => &["pw_cli", "pw_sync", "pw_engine", "pw_git"],
        _ => &[],
    };
    pw_daemon::logging::init(cli.log_json, verbose)?;

    match &cli.command {
        Commands::Serve {
            workspace,
            bind,
            port,
        } => commands::serve::execute(workspace, bind.clone(), *port),
        Commands::Sync { once, auto_apply } => {
            let mut config = client_config(&cli)?;
            config.auto_apply |= *auto_apply;
            commands::sync::execute(config, *once)
        }
        Commands::Submit { target, patch_file } => {
            commands::submit::execute(&client_config(&cli)?, target, patch_file)
        }
        Commands::Status => commands::status::execute(&client_config(&cli)?),
        Commands::Task { command } => commands::task::execute(command, &client_config(&cli)?),
        Commands::Change { command } => {
            commands::change::execute(command, &client_config(&cli)?)
        }
    }
}
