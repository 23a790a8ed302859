//! Encode Command
//!
//! Erasure-codes a local file and stores its shards in the cluster.

use anyhow::{Context, Result};
use console::style;
use shardvault_core::ShardEngine;
use std::path::Path;

/// Encode configuration
pub struct EncodeConfig {
    pub path: String,
}

/// Run encode command
pub async fn run(engine: &ShardEngine, config: EncodeConfig) -> Result<()> {
    let path = Path::new(&config.path);
    if !path.is_file() {
        anyhow::bail!("Not a file: {}", config.path);
    }
    let size = tokio::fs::metadata(path).await?.len();
    let erasure = engine.config().erasure;

    let pb = super::spinner(format!(
        "Encoding {} ({}) into {}+{} shards",
        path.display(),
        super::format_bytes(size),
        erasure.data_shards,
        erasure.parity_shards
    ))?;

    let result = engine.encode_file(path).await;
    pb.finish_and_clear();
    let cid = result.with_context(|| format!("Failed to encode {}", path.display()))?;

    println!(
        "{} Encoded {} ({})",
        style(super::CHECK).green(),
        path.display(),
        super::format_bytes(size)
    );
    println!("  Metadata CID: {}", style(&cid).cyan().bold());
    println!(
        "\n{} {}",
        style("Recover with:").dim(),
        style(format!("shardvault recover {}", cid)).green()
    );

    Ok(())
}
