//! Delete Command
//!
//! Unpins a stored file's shards and metadata from the cluster.

use anyhow::{Context, Result};
use console::style;
use shardvault_core::{Cid, ShardEngine, ShardVaultError};

/// Delete configuration
pub struct DeleteConfig {
    pub cid: String,
    pub force: bool,
}

/// Run delete command
pub async fn run(engine: &ShardEngine, config: DeleteConfig) -> Result<()> {
    let cid = Cid::new(config.cid);

    // Check the file exists first
    let metadata = match engine.metadata(&cid).await {
        Ok(metadata) => metadata,
        Err(ShardVaultError::MetadataUnavailable { .. }) => {
            println!("{} File not found: {}", style("Error:").red(), cid);
            return Ok(());
        }
        Err(e) => return Err(e).context("Failed to read file metadata"),
    };

    if !config.force {
        let shards: usize = metadata
            .chunk_groups
            .iter()
            .map(|row| row.present().count())
            .sum();
        println!(
            "{} About to delete: {}",
            style("Warning:").yellow(),
            metadata.original_file_name
        );
        println!("  Size: {}", super::format_bytes(metadata.original_size));
        println!("  Shards: {} in {} chunk groups", shards, metadata.chunk_groups.len());
        println!("  Created: {}", metadata.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
        println!("\nUse --force to delete without confirmation.");
        return Ok(());
    }

    let report = engine
        .delete_file(&cid)
        .await
        .context("Failed to delete file")?;

    println!(
        "{} Deleted: {} ({} shards unpinned)",
        style(super::CHECK).green(),
        report.file_name,
        report.unpinned
    );
    if report.shared > 0 {
        println!(
            "  {} shards kept: still used by other stored files",
            report.shared
        );
    }
    for (shard, reason) in &report.failed {
        println!("  {} {}: {}", style(super::CROSS).red(), shard, reason);
    }
    if !report.is_complete() {
        println!(
            "{}",
            style(format!("{} shards could not be unpinned", report.failed.len())).yellow()
        );
    }

    Ok(())
}
