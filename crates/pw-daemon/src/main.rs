//! # pw-daemon
//!
//! Standalone entry point for the patchwire daemon. `pw serve` runs the
//! same server from the operator CLI.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use pw_daemon::{AppState, DaemonConfig};

/// patchwire HTTP API and push channel.
#[derive(Parser)]
#[command(name = "pw-daemon", about = "patchwire HTTP API and push channel", version)]
struct Cli {
    /// Workspace root (defaults to current directory).
    #[arg(long, default_value = ".")]
    workspace: PathBuf,

    /// Address to bind (overrides daemon.toml).
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on (overrides daemon.toml).
    #[arg(long)]
    port: Option<u16>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    pw_daemon::logging::init(
        cli.log_json,
        &["pw_daemon", "pw_engine", "pw_git", "pw_workspace", "pw_verify", "pw_events"],
    )?;

    let workspace = cli
        .workspace
        .canonicalize()
        .with_context(|| format!("workspace {} not found", cli.workspace.display()))?;
    let mut config = DaemonConfig::load_for_workspace(&workspace)?;
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    let state = Arc::new(AppState::new(config)?);
    pw_daemon::serve(state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    })
    .await?;
    Ok(())
}
