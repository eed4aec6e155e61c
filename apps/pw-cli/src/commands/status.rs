use pw_sync::{ApiClient, ClientConfig};

pub fn execute(config: &ClientConfig) -> anyhow::Result<()> {
    let api = ApiClient::from_config(config);
    let status = super::block_on(async { api.status().await })??;

    let last_sync = status
        .agent
        .last_sync
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());

    println!("Daemon:       {}", api.base_url());
    println!("Status:       {:?}", status.agent.status);
    println!("Last sync:    {last_sync}");
    println!("Tasks:        {} ({} active)", status.agent.total_tasks, status.agent.active_tasks);
    println!("Subscribers:  {}", status.subscribers);
    Ok(())
}
