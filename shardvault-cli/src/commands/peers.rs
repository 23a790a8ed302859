//! Peers Command
//!
//! Shows the peers of the IPFS cluster.

use anyhow::{Context, Result};
use console::style;
use shardvault_core::ClusterClient;

/// Run peers command
pub async fn run(client: &ClusterClient) -> Result<()> {
    let peers = client
        .peers()
        .await
        .with_context(|| format!("Failed to list peers of {}", client.config().cluster_url))?;

    println!("{}", style("Cluster Peers").bold().underlined());
    println!();

    if peers.is_empty() {
        println!("{}", style("No peers reported").yellow());
        return Ok(());
    }

    let mut healthy = 0;
    for peer in &peers {
        let name = if peer.peername.is_empty() {
            peer.id.as_str()
        } else {
            peer.peername.as_str()
        };

        if peer.error.is_empty() {
            healthy += 1;
            println!("{} {} {}", style("●").green(), style(name).bold(), style(&peer.id).dim());
            for addr in &peer.addresses {
                println!("    {}", addr);
            }
        } else {
            println!(
                "{} {} {}",
                style("●").red(),
                style(name).bold(),
                style(&peer.id).dim()
            );
            println!("    {} {}", style(super::CROSS).red(), peer.error);
        }
    }

    println!();
    println!(
        "{} of {} peers healthy",
        style(healthy).green(),
        peers.len()
    );

    Ok(())
}
