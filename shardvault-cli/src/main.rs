//! ShardVault CLI
//!
//! Command-line client for erasure-coded file storage on an IPFS cluster.
//!
//! # Commands
//! - `encode` - Encode a file and store its shards
//! - `recover` - Rebuild a stored file from its metadata CID
//! - `delete` - Unpin a stored file's shards and metadata
//! - `list` - List stored files
//! - `peers` - Show cluster peers
//! - `config` - Show or edit configuration
//!
//! # Configuration
//! Config file: ~/.shardvault/config.toml

use anyhow::Result;
use clap::{Parser, Subcommand};
use shardvault_core::{ClusterClient, ShardEngine};

mod commands;
mod config;

use commands::{delete, encode, list, peers, recover};

#[derive(Parser)]
#[command(name = "shardvault")]
#[command(about = "Erasure-coded file storage on IPFS Cluster")]
#[command(version)]
struct Cli {
    /// IPFS Cluster REST API URL (overrides config file)
    #[arg(long, global = true, env = "SHARDVAULT_CLUSTER_URL")]
    cluster_url: Option<String>,

    /// IPFS daemon RPC API URL (overrides config file)
    #[arg(long, global = true, env = "SHARDVAULT_IPFS_API_URL")]
    ipfs_url: Option<String>,

    /// Log progress of each chunk group
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a file and store its shards in the cluster
    Encode {
        /// Path to the file
        path: String,
    },

    /// Rebuild a stored file from its metadata CID
    Recover {
        /// Metadata CID printed by `encode`
        cid: String,

        /// Output directory (defaults to files.output_dir)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Unpin a stored file's shards and metadata
    Delete {
        /// Metadata CID of the file
        cid: String,

        /// Delete without confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// List stored files
    List {
        /// Show size and chunk groups of each file
        #[arg(short, long)]
        long: bool,
    },

    /// Show cluster peers
    Peers,

    /// Show or initialize configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Show config file path
    Path,

    /// Initialize config file with defaults
    Init {
        /// Overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., store.cluster_url, files.output_dir)
        key: String,
        /// Value to set
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    // Load configuration from ~/.shardvault/config.toml
    let mut cfg = config::load_config();

    // CLI args override config file
    if let Some(url) = cli.cluster_url {
        cfg.store.cluster_url = url;
    }
    if let Some(url) = cli.ipfs_url {
        cfg.store.ipfs_api_url = url;
    }

    match cli.command {
        Commands::Encode { path } => {
            let engine = ShardEngine::cluster(cfg.engine_config())?;
            encode::run(&engine, encode::EncodeConfig { path }).await?;
        }

        Commands::Recover { cid, output } => {
            let engine = ShardEngine::cluster(cfg.engine_config())?;
            let config = recover::RecoverConfig {
                cid,
                output_dir: output.unwrap_or(cfg.files.output_dir),
            };
            recover::run(&engine, config).await?;
        }

        Commands::Delete { cid, force } => {
            let engine = ShardEngine::cluster(cfg.engine_config())?;
            delete::run(&engine, delete::DeleteConfig { cid, force }).await?;
        }

        Commands::List { long } => {
            let engine = ShardEngine::cluster(cfg.engine_config())?;
            list::run(&engine, list::ListConfig { long_format: long }).await?;
        }

        Commands::Peers => {
            let client = ClusterClient::new(cfg.store)?;
            peers::run(&client).await?;
        }

        Commands::Config { command } => {
            handle_config_command(command)?;
        }
    }

    Ok(())
}

/// Handle config subcommands
fn handle_config_command(command: Option<ConfigCommands>) -> Result<()> {
    use console::style;

    match command {
        None | Some(ConfigCommands::Show) => {
            let cfg = config::load_config();
            println!();
            println!("{}", style("ShardVault Configuration").bold().underlined());
            println!();
            println!("{}", style("[store]").cyan());
            println!("  cluster_url = \"{}\"", cfg.store.cluster_url);
            println!("  ipfs_api_url = \"{}\"", cfg.store.ipfs_api_url);
            println!("  upload_timeout_secs = {}", cfg.store.upload_timeout_secs);
            println!("  fetch_timeout_secs = {}", cfg.store.fetch_timeout_secs);
            println!();
            println!("{}", style("[erasure]").cyan());
            println!("  data_shards = {}", cfg.erasure.data_shards);
            println!("  parity_shards = {}", cfg.erasure.parity_shards);
            println!();
            println!("{}", style("[files]").cyan());
            println!("  metadata_prefix = \"{}\"", cfg.files.metadata_prefix);
            println!("  output_dir = \"{}\"", cfg.files.output_dir);
            println!();

            if let Ok(path) = config::config_file_path() {
                println!("{} {}", style("Config file:").dim(), path.display());
                if !path.exists() {
                    println!(
                        "{} Run '{}' to create it",
                        style("(not created yet)").yellow(),
                        style("shardvault config init").green()
                    );
                }
            }
        }

        Some(ConfigCommands::Path) => {
            if let Ok(path) = config::config_file_path() {
                println!("{}", path.display());
            }
        }

        Some(ConfigCommands::Init { force }) => {
            let path = config::config_file_path()?;
            if path.exists() && !force {
                println!(
                    "{} Config file already exists at {}",
                    style(commands::WARN).yellow(),
                    path.display()
                );
                println!("Use --force to overwrite");
                return Ok(());
            }

            config::save_config(&config::ShardVaultConfig::default())?;
            println!(
                "{} Config file created at {}",
                style(commands::CHECK).green(),
                path.display()
            );
        }

        Some(ConfigCommands::Set { key, value }) => {
            let mut cfg = config::load_config();
            cfg.set(&key, value)?;
            cfg.engine_config().validate()?;
            config::save_config(&cfg)?;
            println!("{} Configuration updated", style(commands::CHECK).green());
        }
    }

    Ok(())
}
