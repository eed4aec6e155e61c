// serve.rs — Start the patchwire daemon from the operator CLI.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use pw_daemon::{AppState, DaemonConfig};

pub fn execute(workspace: &Path, bind: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let workspace = workspace
        .canonicalize()
        .with_context(|| format!("workspace {} not found", workspace.display()))?;

    let mut config = DaemonConfig::load_for_workspace(&workspace)?;
    if let Some(bind) = bind {
        config.bind = bind;
    }
    if let Some(port) = port {
        config.port = port;
    }
    config.validate()?;

    println!("patchwire daemon for {}", workspace.display());
    println!("  listening on http://{}", config.socket_addr());
    println!("  push channel: /api/events");
    println!();

    super::block_on(async move {
        let state = Arc::new(AppState::new(config)?);
        pw_daemon::serve(state, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "cannot listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await?;
        Ok::<(), anyhow::Error>(())
    })?
}
