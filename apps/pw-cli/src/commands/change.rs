// change.rs — `pw change` subcommands.

use clap::Subcommand;
use pw_changeset::{Change, CheckKind, ChangeStatus};
use pw_sync::{ApiClient, ClientConfig};

#[derive(Subcommand)]
pub enum ChangeCommands {
    /// List changes, optionally filtered by status.
    List {
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one change in full.
    Show { id: String },
    /// Run the three verification checks on an applied change.
    Verify { id: String },
}

pub fn execute(cmd: &ChangeCommands, config: &ClientConfig) -> anyhow::Result<()> {
    let api = ApiClient::from_config(config);
    match cmd {
        ChangeCommands::List { status } => {
            let filter: Option<ChangeStatus> = status.as_deref().map(str::parse).transpose()?;
            let changes = super::block_on(async { api.list_changes().await })??;
            let changes: Vec<&Change> = changes
                .iter()
                .filter(|c| filter.map_or(true, |s| c.status == s))
                .collect();
            if changes.is_empty() {
                println!("No changes.");
                return Ok(());
            }
            println!("{:<38} {:<9} {:<8} PATH", "ID", "STATUS", "OP");
            for change in &changes {
                println!(
                    "{:<38} {:<9} {:<8} {}",
                    change.id,
                    change.status,
                    format!("{:?}", change.operation).to_lowercase(),
                    change.path
                );
            }
            println!("\n{} change(s)", changes.len());
        }
        ChangeCommands::Show { id } => {
            let change = super::block_on(async { api.get_change(id).await })??;
            println!("{}", serde_json::to_string_pretty(&change)?);
        }
        ChangeCommands::Verify { id } => {
            let change = super::block_on(async { api.verify_change(id).await })??;
            println!("Change {}: {}", change.id, change.status);
            if let Some(results) = &change.verification_results {
                for kind in [CheckKind::Syntax, CheckKind::EdgeCase, CheckKind::Regression] {
                    let verdict = if results.report(kind).passed { "pass" } else { "FAIL" };
                    println!("  {:<11} {verdict}", kind.as_str());
                }
            }
            if let Some(failure) = &change.failure {
                println!("  failure: {failure}");
            }
        }
    }
    Ok(())
}
