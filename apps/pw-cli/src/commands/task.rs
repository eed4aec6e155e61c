// task.rs — `pw task` subcommands.

use clap::Subcommand;
use pw_changeset::{NewTask, TaskKind, TaskPriority};
use pw_sync::{ApiClient, ClientConfig};

#[derive(Subcommand)]
pub enum TaskCommands {
    /// List tasks known to the daemon.
    List,
    /// Create a task.
    Add {
        /// bug, feature, status, diff or logs.
        kind: String,
        title: String,
        #[arg(long, default_value = "medium")]
        priority: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Extra labels (repeatable).
        #[arg(long = "label")]
        labels: Vec<String>,
    },
}

pub fn execute(cmd: &TaskCommands, config: &ClientConfig) -> anyhow::Result<()> {
    let api = ApiClient::from_config(config);
    match cmd {
        TaskCommands::List => {
            let tasks = super::block_on(async { api.list_tasks().await })??;
            if tasks.is_empty() {
                println!("No tasks.");
                return Ok(());
            }
            println!("{:<38} {:<12} {:<9} {:<8} TITLE", "ID", "STATUS", "PRIORITY", "KIND");
            for task in &tasks {
                println!(
                    "{:<38} {:<12} {:<9} {:<8} {}",
                    task.id,
                    task.status,
                    task.priority.as_str(),
                    task.kind.as_str(),
                    task.title
                );
            }
            println!("\n{} task(s)", tasks.len());
        }
        TaskCommands::Add {
            kind,
            title,
            priority,
            description,
            labels,
        } => {
            let kind: TaskKind = kind.parse()?;
            let priority: TaskPriority = priority.parse()?;
            let mut new = NewTask::new(kind, title.clone()).with_priority(priority);
            new.description = description.clone();
            for label in labels {
                new = new.with_label(label.clone());
            }

            let task = super::block_on(async { api.create_task(&new).await })??;
            println!("Created task {}", task.id);
            println!("  {} [{}] {}", task.kind.as_str(), task.priority.as_str(), task.title);
        }
    }
    Ok(())
}
