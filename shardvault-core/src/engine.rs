//! Storage engine
//!
//! Ties a content store and erasure codecs together and exposes the
//! file-level operations: encode, recover, delete and list. New files are
//! encoded with the configured geometry; recovery uses whatever geometry
//! the file was stored with.

use crate::cid::Cid;
use crate::config::EngineConfig;
use crate::encoder;
use crate::erasure::{ErasureCodec, ErasureConfig, ReedSolomonCodec};
use crate::error::Result;
use crate::metadata::FileMetadata;
use crate::recovery;
use crate::store::{stored_files, ClusterClient, ObjectStore, StoredFile};
use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Outcome of deleting a file
#[derive(Debug, Clone, Serialize)]
pub struct DeletionReport {
    pub metadata_cid: Cid,
    pub file_name: String,
    /// Distinct shard objects released
    pub unpinned: usize,
    /// Distinct shard objects left pinned because another stored file uses them
    pub shared: usize,
    /// Shard objects that could not be released, with the reason
    pub failed: Vec<(Cid, String)>,
}

impl DeletionReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// File storage engine
pub struct ShardEngine {
    store: Arc<dyn ObjectStore>,
    codec: Arc<dyn ErasureCodec>,
    /// Codecs by geometry, for files stored under an older configuration
    codecs: Mutex<HashMap<ErasureConfig, Arc<dyn ErasureCodec>>>,
    config: EngineConfig,
}

impl ShardEngine {
    /// Create an engine over `store`, building the codec from the configured geometry
    pub fn new(store: Arc<dyn ObjectStore>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let codec = Arc::new(ReedSolomonCodec::with_config(config.erasure)?);
        Ok(Self::with_codec(store, codec, config))
    }

    /// Create an engine with an explicit codec for new encodes
    pub fn with_codec(
        store: Arc<dyn ObjectStore>,
        codec: Arc<dyn ErasureCodec>,
        config: EngineConfig,
    ) -> Self {
        let mut codecs = HashMap::new();
        codecs.insert(codec.config(), Arc::clone(&codec));
        Self {
            store,
            codec,
            codecs: Mutex::new(codecs),
            config,
        }
    }

    /// Create an engine backed by the IPFS cluster in `config.store`
    pub fn cluster(config: EngineConfig) -> Result<Self> {
        let client = ClusterClient::new(config.store.clone())?;
        Self::new(Arc::new(client), config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Codec for `geometry`, built on first use
    pub fn codec_for(&self, geometry: ErasureConfig) -> Result<Arc<dyn ErasureCodec>> {
        let mut codecs = self.codecs.lock();
        if let Some(codec) = codecs.get(&geometry) {
            return Ok(Arc::clone(codec));
        }
        debug!(
            data_shards = geometry.data_shards,
            parity_shards = geometry.parity_shards,
            "Building codec"
        );
        let codec: Arc<dyn ErasureCodec> = Arc::new(ReedSolomonCodec::with_config(geometry)?);
        codecs.insert(geometry, Arc::clone(&codec));
        Ok(codec)
    }

    /// Encode and upload the file at `path`; returns the metadata CID
    pub async fn encode_file(&self, path: impl AsRef<Path>) -> Result<Cid> {
        encoder::encode_file(
            self.store.as_ref(),
            Arc::clone(&self.codec),
            path.as_ref(),
            &self.config.metadata_prefix,
        )
        .await
    }

    /// Rebuild the file behind `cid` into `output_dir`
    pub async fn recover_file(&self, cid: &Cid, output_dir: impl AsRef<Path>) -> Result<PathBuf> {
        let metadata = self.metadata(cid).await?;
        let codec = self.codec_for(metadata.erasure_config())?;
        recovery::recover_file(
            self.store.as_ref(),
            codec,
            cid,
            &metadata,
            output_dir.as_ref(),
        )
        .await
    }

    /// Fetch and validate the metadata of a stored file
    pub async fn metadata(&self, cid: &Cid) -> Result<FileMetadata> {
        recovery::fetch_metadata(self.store.as_ref(), cid).await
    }

    /// Unpin the shards of a file, then its metadata.
    ///
    /// The store is content-addressed, so identical shards of different
    /// files share one object. Shards still referenced by another stored
    /// file stay pinned. Shard unpin failures are collected in the report;
    /// failing to unpin the metadata is an error.
    #[instrument(skip(self), fields(cid = %cid))]
    pub async fn delete_file(&self, cid: &Cid) -> Result<DeletionReport> {
        let metadata = self.metadata(cid).await?;
        let in_use = self.shards_in_use(cid).await?;

        let mut seen = HashSet::new();
        let (shared, releasable): (Vec<&Cid>, Vec<&Cid>) = metadata
            .chunk_groups
            .iter()
            .flat_map(|row| row.present().map(|(_, shard)| shard))
            .filter(|shard| seen.insert(*shard))
            .partition(|shard| in_use.contains(*shard));

        let mut report = DeletionReport {
            metadata_cid: cid.clone(),
            file_name: metadata.original_file_name.clone(),
            unpinned: 0,
            shared: shared.len(),
            failed: Vec::new(),
        };

        let unpins = releasable
            .into_iter()
            .map(|shard| async move { (shard, self.store.unpin(shard).await) });
        for (shard, result) in join_all(unpins).await {
            match result {
                Ok(()) => report.unpinned += 1,
                Err(e) => {
                    warn!(shard = %shard, error = %e, "Failed to unpin shard");
                    report.failed.push((shard.clone(), e.to_string()));
                }
            }
        }

        self.store.unpin(cid).await?;

        info!(
            file = %report.file_name,
            unpinned = report.unpinned,
            shared = report.shared,
            failed = report.failed.len(),
            "File deleted"
        );
        Ok(report)
    }

    /// Shard CIDs referenced by every stored file except `exclude`.
    ///
    /// A file whose metadata cannot be read is skipped with a warning.
    async fn shards_in_use(&self, exclude: &Cid) -> Result<HashSet<Cid>> {
        let others: Vec<StoredFile> = self
            .list_files()
            .await?
            .into_iter()
            .filter(|file| &file.metadata_cid != exclude)
            .collect();

        let loads = others.iter().map(|file| async move {
            (file, self.metadata(&file.metadata_cid).await)
        });

        let mut in_use = HashSet::new();
        for (file, result) in join_all(loads).await {
            match result {
                Ok(metadata) => {
                    for row in &metadata.chunk_groups {
                        in_use.extend(row.present().map(|(_, shard)| shard.clone()));
                    }
                }
                Err(e) => {
                    warn!(
                        file = %file.file_name,
                        cid = %file.metadata_cid,
                        error = %e,
                        "Skipping unreadable metadata while checking shared shards"
                    );
                }
            }
        }
        Ok(in_use)
    }

    /// Files whose metadata is pinned in the store, sorted by name
    pub async fn list_files(&self) -> Result<Vec<StoredFile>> {
        let pins = self.store.pins().await?;
        Ok(stored_files(pins, &self.config.metadata_prefix))
    }
}
