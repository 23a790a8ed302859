//! Engine configuration
//!
//! Plain serde structs. Defaults come from environment variables when set,
//! so a bare `EngineConfig::default()` already honours the deployment.
//!
//! ```toml
//! metadata_prefix = "_metadata_rs_v1_"
//!
//! [store]
//! cluster_url = "http://127.0.0.1:9094"
//! ipfs_api_url = "http://127.0.0.1:5001"
//! upload_timeout_secs = 180
//! fetch_timeout_secs = 120
//!
//! [erasure]
//! data_shards = 4
//! parity_shards = 2
//! ```

use crate::erasure::ErasureConfig;
use crate::error::Result;
use crate::{erasure_config_from_env, METADATA_PREFIX};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Object store endpoints and timeouts
    #[serde(default)]
    pub store: StoreConfig,

    /// Shard geometry used for new encodes
    #[serde(default = "default_erasure")]
    pub erasure: ErasureConfig,

    /// Pin name prefix for metadata objects
    #[serde(default = "default_metadata_prefix")]
    pub metadata_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            erasure: default_erasure(),
            metadata_prefix: default_metadata_prefix(),
        }
    }
}

impl EngineConfig {
    /// Validate the erasure geometry
    pub fn validate(&self) -> Result<()> {
        ErasureConfig::new(self.erasure.data_shards, self.erasure.parity_shards)?;
        Ok(())
    }
}

fn default_erasure() -> ErasureConfig {
    let (data_shards, parity_shards, _) = erasure_config_from_env();
    ErasureConfig {
        data_shards,
        parity_shards,
    }
}

fn default_metadata_prefix() -> String {
    METADATA_PREFIX.to_string()
}

/// IPFS Cluster / daemon connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Cluster REST API URL (uploads, pins, peers)
    #[serde(default = "default_cluster_url")]
    pub cluster_url: String,

    /// IPFS daemon RPC URL (fetches)
    #[serde(default = "default_ipfs_api_url")]
    pub ipfs_api_url: String,

    /// Per-object upload timeout; uploads may wait on cluster replication
    #[serde(default = "default_upload_timeout_secs")]
    pub upload_timeout_secs: u64,

    /// Per-object fetch timeout
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cluster_url: default_cluster_url(),
            ipfs_api_url: default_ipfs_api_url(),
            upload_timeout_secs: default_upload_timeout_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl StoreConfig {
    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

fn default_cluster_url() -> String {
    std::env::var("SHARDVAULT_CLUSTER_URL").unwrap_or_else(|_| "http://127.0.0.1:9094".to_string())
}

fn default_ipfs_api_url() -> String {
    std::env::var("SHARDVAULT_IPFS_API_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:5001".to_string())
}

fn default_upload_timeout_secs() -> u64 {
    180
}

fn default_fetch_timeout_secs() -> u64 {
    120
}
