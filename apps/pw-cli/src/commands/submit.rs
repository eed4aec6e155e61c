// submit.rs — Post a unified diff to /api/apply.

use std::path::Path;

use anyhow::Context;
use pw_sync::{ApiClient, ClientConfig};

pub fn execute(config: &ClientConfig, target: &str, patch_file: &Path) -> anyhow::Result<()> {
    let patch = std::fs::read_to_string(patch_file)
        .with_context(|| format!("cannot read {}", patch_file.display()))?;
    let api = ApiClient::from_config(config);

    let receipt = super::block_on(async { api.apply_patch(target, &patch).await })??;

    println!("Applied patch to {}", receipt.target_path);
    println!("  change: {}", receipt.change.id);
    println!("  status: {}", receipt.change.status);
    Ok(())
}
