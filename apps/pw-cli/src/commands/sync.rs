// sync.rs — Run the client sync agent.
//
// With `--once` a single cycle runs and its SyncResult is printed. Otherwise
// the periodic timer and push listener run until Ctrl-C.

use pw_sync::{ClientConfig, ClientSyncAgent, SyncResult};

pub fn execute(config: ClientConfig, once: bool) -> anyhow::Result<()> {
    println!(
        "Syncing {} with {}",
        config.workspace_root.display(),
        config.api_url
    );
    let agent = ClientSyncAgent::new(config)?;

    super::block_on(async move {
        if once {
            let result = agent.sync_once().await;
            print_result(&result);
            if !result.success {
                anyhow::bail!("sync finished with {} error(s)", result.errors.len());
            }
            return Ok(());
        }

        agent.start();
        tracing::info!("sync agent running; press Ctrl-C to stop");
        tokio::signal::ctrl_c().await?;
        agent.shutdown();

        let state = agent.state();
        println!(
            "Stopped. {} task(s) mirrored, {} active, {} change(s) logged.",
            state.total_tasks,
            state.active_tasks,
            agent.change_log().len()
        );
        Ok::<(), anyhow::Error>(())
    })?
}

fn print_result(result: &SyncResult) {
    println!("Tasks synced:    {}", result.tasks_synced);
    println!("Changes applied: {}", result.changes_applied);
    for error in &result.errors {
        println!("  error: {error}");
    }
}
