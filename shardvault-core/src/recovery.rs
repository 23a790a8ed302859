//! Recovery orchestrator
//!
//! Fetches the metadata descriptor, then rebuilds the file one chunk group
//! at a time: all shards of a group are fetched concurrently, missing data
//! shards are reconstructed from parity, and the group's data region is
//! appended to the output file. A partially written file never survives
//! a failed recovery.

use crate::cid::Cid;
use crate::erasure::{ErasureCodec, ErasureConfig};
use crate::error::{Result, ShardVaultError};
use crate::metadata::{ChunkGroupRow, FileMetadata};
use crate::store::ObjectStore;
use bytes::Bytes;
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

/// Shards of one chunk group laid out in a flat buffer
#[derive(Debug)]
pub struct GroupShards {
    pub buffer: Vec<u8>,
    pub present: Vec<bool>,
}

impl GroupShards {
    /// Place fetched shards into their slots.
    ///
    /// Responses longer than `shard_size` are truncated, shorter ones are
    /// zero-padded.
    pub fn assemble(fetched: Vec<Option<Bytes>>, shard_size: usize) -> Self {
        let mut buffer = vec![0u8; fetched.len() * shard_size];
        let mut present = vec![false; fetched.len()];

        for (index, data) in fetched.into_iter().enumerate() {
            if let Some(data) = data {
                let len = data.len().min(shard_size);
                let start = index * shard_size;
                buffer[start..start + len].copy_from_slice(&data[..len]);
                present[index] = true;
            }
        }

        Self { buffer, present }
    }

    /// Number of shards that arrived
    pub fn available(&self) -> usize {
        self.present.iter().filter(|p| **p).count()
    }

    /// Whether any data slot needs reconstruction
    pub fn missing_data(&self, data_shards: usize) -> bool {
        self.present.iter().take(data_shards).any(|p| !p)
    }
}

/// Fetch and validate the metadata stored under `cid`
pub async fn fetch_metadata(store: &dyn ObjectStore, cid: &Cid) -> Result<FileMetadata> {
    if !cid.looks_like_ipfs() {
        warn!(cid = %cid, "Metadata CID does not look like an IPFS CID");
    }

    let data = store
        .get(cid)
        .await
        .ok_or_else(|| ShardVaultError::MetadataUnavailable {
            cid: cid.to_string(),
        })?;

    let metadata = FileMetadata::from_slice(cid, &data)?;
    debug!(
        cid = %cid,
        file = %metadata.original_file_name,
        size = metadata.original_size,
        groups = metadata.chunk_groups.len(),
        "Metadata loaded"
    );
    Ok(metadata)
}

/// Reject a codec built for a different shard geometry than the metadata
pub fn check_geometry(metadata: &FileMetadata, cid: &Cid, expected: ErasureConfig) -> Result<()> {
    let actual = metadata.erasure_config();
    if actual != expected {
        return Err(ShardVaultError::MetadataInvalid {
            cid: cid.to_string(),
            reason: format!(
                "encoded with {}+{} shards, codec is {}+{}",
                actual.data_shards, actual.parity_shards, expected.data_shards, expected.parity_shards
            ),
        });
    }
    Ok(())
}

/// Fetch every shard of one group concurrently. Absent ids are not requested.
pub async fn fetch_group(
    store: &dyn ObjectStore,
    row: &ChunkGroupRow,
    shard_size: usize,
) -> GroupShards {
    let fetches = row.ids().iter().map(|id| async move {
        match id {
            Some(cid) => store.get(cid).await,
            None => None,
        }
    });
    let fetched = join_all(fetches).await;
    GroupShards::assemble(fetched, shard_size)
}

/// Rebuild the file described by `metadata` (fetched from `cid`) into
/// `output_dir` and return the path of the recovered file.
///
/// `codec` must match the geometry recorded in the metadata.
#[instrument(skip(store, codec, metadata, output_dir), fields(cid = %cid))]
pub async fn recover_file(
    store: &dyn ObjectStore,
    codec: Arc<dyn ErasureCodec>,
    cid: &Cid,
    metadata: &FileMetadata,
    output_dir: &Path,
) -> Result<PathBuf> {
    check_geometry(metadata, cid, codec.config())?;

    tokio::fs::create_dir_all(output_dir).await?;
    let path = output_dir.join(metadata.recovered_file_name());
    let file = File::create(&path).await?;

    info!(
        file = %metadata.original_file_name,
        size = metadata.original_size,
        groups = metadata.chunk_groups.len(),
        output = %path.display(),
        "Recovering file"
    );

    match write_groups(store, codec, metadata, file, &path).await {
        Ok(()) => {
            info!(output = %path.display(), "Recovery complete");
            Ok(path)
        }
        Err(e) => {
            remove_partial(&path).await;
            Err(e)
        }
    }
}

async fn write_groups(
    store: &dyn ObjectStore,
    codec: Arc<dyn ErasureCodec>,
    metadata: &FileMetadata,
    mut file: File,
    path: &Path,
) -> Result<()> {
    let shard_size = metadata.shard_size as usize;
    let data_shards = metadata.data_shards;
    let capacity = metadata.chunk_group_capacity();
    let mut written: u64 = 0;

    for (group, row) in metadata.chunk_groups.iter().enumerate() {
        let mut shards = fetch_group(store, row, shard_size).await;

        let available = shards.available();
        if available < data_shards {
            return Err(ShardVaultError::InsufficientShards {
                group,
                available,
                required: data_shards,
            });
        }

        if shards.missing_data(data_shards) {
            debug!(group = group, available = available, "Reconstructing chunk group");
            let codec = Arc::clone(&codec);
            let GroupShards { mut buffer, present } = shards;
            buffer = tokio::task::spawn_blocking(move || {
                codec.reconstruct(&mut buffer, shard_size, &present).map(|_| buffer)
            })
            .await?
            .map_err(|e| ShardVaultError::ReconstructFailure {
                group,
                reason: e.to_string(),
            })?;
            shards = GroupShards {
                buffer,
                present: vec![true; row.len()],
            };
        }

        let to_write = capacity.min(metadata.original_size.saturating_sub(written));
        if to_write > 0 {
            file.write_all(&shards.buffer[..to_write as usize]).await?;
            written += to_write;
        }
        debug!(group = group, written = written, "Chunk group written");
    }

    file.flush().await?;
    drop(file);

    let actual = tokio::fs::metadata(path).await?.len();
    if actual != metadata.original_size {
        return Err(ShardVaultError::SizeMismatch {
            expected: metadata.original_size,
            actual,
        });
    }
    Ok(())
}

async fn remove_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove partial output");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_assemble_pads_and_truncates() {
        let fetched = vec![
            Some(Bytes::from_static(b"abc")),
            Some(Bytes::from_static(b"d")),
            None,
            Some(Bytes::from_static(b"ghijk")),
        ];
        let shards = GroupShards::assemble(fetched, 3);

        assert_eq!(shards.buffer, b"abcd\0\0\0\0\0ghi");
        assert_eq!(shards.present, vec![true, true, false, true]);
        assert_eq!(shards.available(), 3);
        assert!(shards.missing_data(3));
        assert!(!shards.missing_data(2));
    }

    #[tokio::test]
    async fn test_fetch_group_skips_absent_ids() {
        let store = MemoryStore::new();
        let a = store.put(Bytes::from_static(b"aa"), "a").await.unwrap();
        let gone = store.put(Bytes::from_static(b"bb"), "b").await.unwrap();
        store.forget(&gone);

        let row = ChunkGroupRow::new(vec![Some(a), None, Some(gone)]);
        let shards = fetch_group(&store, &row, 2).await;

        assert_eq!(shards.present, vec![true, false, false]);
        assert_eq!(&shards.buffer[..2], b"aa");
        // The None slot never reaches the store
        assert_eq!(store.get_count(), 2);
    }

    #[tokio::test]
    async fn test_fetch_metadata_errors() {
        let store = MemoryStore::new();

        let missing = Cid::from("QmMissing");
        let err = fetch_metadata(&store, &missing).await.unwrap_err();
        assert!(matches!(err, ShardVaultError::MetadataUnavailable { .. }));

        let junk = store.put(Bytes::from_static(b"not json"), "junk").await.unwrap();
        let err = fetch_metadata(&store, &junk).await.unwrap_err();
        assert!(matches!(err, ShardVaultError::MetadataInvalid { .. }));
    }

    #[test]
    fn test_check_geometry() {
        let json = r#"{"originalFileName":"a","originalSize":1,"shardSize":1,
            "dataShards":3,"parityShards":2,"createdAt":"2024-01-01T00:00:00Z",
            "chunkGroups":[]}"#;
        let cid = Cid::from("QmMeta");
        let metadata = FileMetadata::from_slice(&cid, json.as_bytes()).unwrap();

        assert!(check_geometry(&metadata, &cid, ErasureConfig::new(3, 2).unwrap()).is_ok());
        let err = check_geometry(&metadata, &cid, ErasureConfig::default()).unwrap_err();
        assert!(err.to_string().contains("3+2"));
    }
}
