//! List Command
//!
//! Lists the files stored in the cluster.

use anyhow::{Context, Result};
use console::style;
use shardvault_core::ShardEngine;

/// List configuration
pub struct ListConfig {
    pub long_format: bool,
}

/// Run list command
pub async fn run(engine: &ShardEngine, config: ListConfig) -> Result<()> {
    let files = engine.list_files().await.context("Failed to list files")?;

    if files.is_empty() {
        println!("{} No stored files found", style("Info:").cyan());
        return Ok(());
    }

    if !config.long_format {
        for file in &files {
            println!("{}  {}", file.metadata_cid, file.file_name);
        }
        return Ok(());
    }

    println!(
        "{:<48} {:<32} {:>12} {:>8}",
        style("METADATA CID").bold(),
        style("NAME").bold(),
        style("SIZE").bold(),
        style("GROUPS").bold()
    );
    println!("{}", "-".repeat(104));

    let mut total_size: u64 = 0;
    for file in &files {
        match engine.metadata(&file.metadata_cid).await {
            Ok(metadata) => {
                total_size += metadata.original_size;
                println!(
                    "{:<48} {:<32} {:>12} {:>8}",
                    file.metadata_cid,
                    truncate_name(&file.file_name, 32),
                    super::format_bytes(metadata.original_size),
                    metadata.chunk_groups.len()
                );
            }
            Err(e) => {
                println!(
                    "{:<48} {:<32} {}",
                    file.metadata_cid,
                    truncate_name(&file.file_name, 32),
                    style(format!("unreadable: {}", e)).red()
                );
            }
        }
    }

    println!("{}", "-".repeat(104));
    println!(
        "{} files, {} total",
        style(files.len()).green(),
        super::format_bytes(total_size)
    );

    Ok(())
}

/// Truncate a file name for display, keeping its end
fn truncate_name(name: &str, max_len: usize) -> String {
    let chars: Vec<char> = name.chars().collect();
    if chars.len() <= max_len {
        name.to_string()
    } else {
        let tail: String = chars[chars.len() - (max_len - 3)..].iter().collect();
        format!("...{}", tail)
    }
}
