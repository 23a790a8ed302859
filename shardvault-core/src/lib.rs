//! ShardVault Core Library
//!
//! Fault-tolerant file storage on top of an IPFS cluster.
//! This crate provides:
//! - Shard sizing policy for a file of a given size
//! - Reed-Solomon erasure coding over flat shard buffers (4 data + 2 parity)
//! - Object store clients (IPFS Cluster over HTTP, in-memory)
//! - Streaming chunk-group encoder and the recovery orchestrator
//! - The metadata descriptor binding a file to its shard CIDs

pub mod cid;
pub mod config;
pub mod encoder;
pub mod engine;
pub mod erasure;
pub mod error;
pub mod metadata;
pub mod recovery;
pub mod sizing;
pub mod store;

pub use cid::Cid;
pub use config::{EngineConfig, StoreConfig};
pub use engine::{DeletionReport, ShardEngine};
pub use erasure::{ErasureCodec, ErasureConfig, ReedSolomonCodec};
pub use error::{Result, ShardVaultError};
pub use metadata::{ChunkGroupRow, FileMetadata};
pub use sizing::shard_size;
pub use store::{ClusterClient, MemoryStore, ObjectStore, PeerInfo, PinInfo, StoredFile};

/// Default erasure coding configuration
/// - 4 data shards: minimum required to reconstruct a chunk group
/// - 2 parity shards: any 2 shards of a group may be lost
///
/// Override at runtime via ERASURE_DATA_SHARDS / ERASURE_PARITY_SHARDS env vars.
pub const DATA_SHARDS: usize = 4;
pub const PARITY_SHARDS: usize = 2;
pub const TOTAL_SHARDS: usize = DATA_SHARDS + PARITY_SHARDS;

/// Pin name prefix that marks an object as file metadata
pub const METADATA_PREFIX: &str = "_metadata_rs_v1_";

/// Read erasure shard counts from environment, falling back to compile-time defaults.
/// Returns (data_shards, parity_shards, total_shards).
pub fn erasure_config_from_env() -> (usize, usize, usize) {
    let data = std::env::var("ERASURE_DATA_SHARDS")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(DATA_SHARDS);
    let parity = std::env::var("ERASURE_PARITY_SHARDS")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(PARITY_SHARDS);
    (data, parity, data + parity)
}
