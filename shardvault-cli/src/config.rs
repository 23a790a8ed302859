//! Configuration management
//!
//! Handles storing and loading CLI configuration.
//! Config directory: ~/.shardvault/ (cross-platform)
//!
//! Config file format (~/.shardvault/config.toml):
//! ```toml
//! [store]
//! cluster_url = "http://127.0.0.1:9094"
//! ipfs_api_url = "http://127.0.0.1:5001"
//! upload_timeout_secs = 180
//! fetch_timeout_secs = 120
//!
//! [erasure]
//! data_shards = 4
//! parity_shards = 2
//!
//! [files]
//! metadata_prefix = "_metadata_rs_v1_"
//! output_dir = "./downloaded_files"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use shardvault_core::{EngineConfig, ErasureConfig, StoreConfig, METADATA_PREFIX};
use std::fs;
use std::path::{Path, PathBuf};

/// Keys accepted by `shardvault config set`
pub const CONFIG_KEYS: &[&str] = &[
    "store.cluster_url",
    "store.ipfs_api_url",
    "store.upload_timeout_secs",
    "store.fetch_timeout_secs",
    "erasure.data_shards",
    "erasure.parity_shards",
    "files.metadata_prefix",
    "files.output_dir",
];

/// Structure of ~/.shardvault/config.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ShardVaultConfig {
    /// Cluster and daemon endpoints
    #[serde(default)]
    pub store: StoreConfig,

    /// Shard geometry for new encodes
    #[serde(default)]
    pub erasure: ErasureSection,

    /// Naming and local paths
    #[serde(default)]
    pub files: FilesConfig,
}

/// Shard geometry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErasureSection {
    #[serde(default = "default_data_shards")]
    pub data_shards: usize,

    #[serde(default = "default_parity_shards")]
    pub parity_shards: usize,
}

impl Default for ErasureSection {
    fn default() -> Self {
        Self {
            data_shards: default_data_shards(),
            parity_shards: default_parity_shards(),
        }
    }
}

fn default_data_shards() -> usize {
    EngineConfig::default().erasure.data_shards
}

fn default_parity_shards() -> usize {
    EngineConfig::default().erasure.parity_shards
}

/// Naming and local paths
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    /// Pin name prefix marking metadata objects
    #[serde(default = "default_metadata_prefix")]
    pub metadata_prefix: String,

    /// Where `recover` writes files unless `--output` is given
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            metadata_prefix: default_metadata_prefix(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_metadata_prefix() -> String {
    METADATA_PREFIX.to_string()
}

fn default_output_dir() -> String {
    "./downloaded_files".to_string()
}

impl ShardVaultConfig {
    /// Engine settings described by this file
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            store: self.store.clone(),
            erasure: ErasureConfig {
                data_shards: self.erasure.data_shards,
                parity_shards: self.erasure.parity_shards,
            },
            metadata_prefix: self.files.metadata_prefix.clone(),
        }
    }

    /// Set one value by its dotted key
    pub fn set(&mut self, key: &str, value: String) -> Result<()> {
        match key {
            "store.cluster_url" => self.store.cluster_url = value,
            "store.ipfs_api_url" => self.store.ipfs_api_url = value,
            "store.upload_timeout_secs" => {
                self.store.upload_timeout_secs = parse_number(key, &value)?
            }
            "store.fetch_timeout_secs" => self.store.fetch_timeout_secs = parse_number(key, &value)?,
            "erasure.data_shards" => self.erasure.data_shards = parse_number(key, &value)?,
            "erasure.parity_shards" => self.erasure.parity_shards = parse_number(key, &value)?,
            "files.metadata_prefix" => self.files.metadata_prefix = value,
            "files.output_dir" => self.files.output_dir = value,
            _ => {
                anyhow::bail!(
                    "Unknown config key: {}. Valid keys: {}",
                    key,
                    CONFIG_KEYS.join(", ")
                );
            }
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("{} expects a number, got {:?}", key, value))
}

/// Get the config directory path (~/.shardvault/)
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    let config_dir = home.join(".shardvault");

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)
            .context("Failed to create config directory ~/.shardvault/")?;
    }

    Ok(config_dir)
}

/// Get the config file path
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Load configuration, falling back to defaults if the file is missing
/// or unreadable
pub fn load_config() -> ShardVaultConfig {
    match config_file_path() {
        Ok(path) if path.exists() => load_config_from(&path),
        _ => ShardVaultConfig::default(),
    }
}

/// Load configuration from an explicit path
pub fn load_config_from(path: &Path) -> ShardVaultConfig {
    match fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: Failed to parse config file: {}", e);
                ShardVaultConfig::default()
            }
        },
        Err(e) => {
            eprintln!("Warning: Failed to read config file: {}", e);
            ShardVaultConfig::default()
        }
    }
}

/// Save configuration to the default path
pub fn save_config(config: &ShardVaultConfig) -> Result<()> {
    save_config_to(config, &config_file_path()?)
}

/// Save configuration to an explicit path
pub fn save_config_to(config: &ShardVaultConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    fs::write(path, content).context("Failed to write config file")?;
    Ok(())
}
