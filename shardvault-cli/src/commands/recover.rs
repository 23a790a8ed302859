//! Recover Command
//!
//! Rebuilds a stored file from its shards.

use anyhow::{Context, Result};
use console::style;
use shardvault_core::{Cid, ShardEngine};
use std::path::Path;

/// Recover configuration
pub struct RecoverConfig {
    pub cid: String,
    pub output_dir: String,
}

/// Run recover command
pub async fn run(engine: &ShardEngine, config: RecoverConfig) -> Result<()> {
    let cid = Cid::new(config.cid);
    if !cid.looks_like_ipfs() {
        eprintln!(
            "{} {} does not look like an IPFS CID, trying anyway",
            style(super::WARN).yellow(),
            cid
        );
    }

    let pb = super::spinner(format!("Recovering {}", cid))?;
    let result = engine.recover_file(&cid, Path::new(&config.output_dir)).await;
    pb.finish_and_clear();
    let path = result.with_context(|| format!("Failed to recover {}", cid))?;

    let size = tokio::fs::metadata(&path).await?.len();
    println!(
        "{} Recovered {} ({})",
        style(super::CHECK).green(),
        style(path.display()).cyan(),
        super::format_bytes(size)
    );

    Ok(())
}
