//! Chunk group encoder
//!
//! Streams a file in windows of `data_shards * shard_size` bytes. Each
//! window is placed in the data slots of a zeroed chunk-group buffer,
//! erasure-encoded, and all of its shards are uploaded concurrently.
//! Groups are processed one after another, so peak memory is a single
//! chunk-group buffer.

use crate::cid::Cid;
use crate::erasure::{ErasureCodec, ErasureConfig};
use crate::error::{Result, ShardVaultError};
use crate::metadata::{ChunkGroupRow, FileMetadata, MetadataBuilder};
use crate::sizing::{chunk_group_capacity, shard_size};
use crate::store::ObjectStore;
use bytes::Bytes;
use futures::future::try_join_all;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, instrument};

/// Position of the encode loop within the source file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkCursor {
    /// Index of the next chunk group
    pub group: usize,
    /// File bytes consumed so far
    pub offset: u64,
}

impl ChunkCursor {
    /// Cursor past a group that consumed `bytes` file bytes
    pub fn advance(self, bytes: u64) -> Self {
        Self {
            group: self.group + 1,
            offset: self.offset + bytes,
        }
    }
}

/// Encodes and uploads the chunk groups of one file
pub struct ChunkGroupEncoder<'a> {
    store: &'a dyn ObjectStore,
    codec: Arc<dyn ErasureCodec>,
    config: ErasureConfig,
    file_name: String,
    shard_size: usize,
}

impl<'a> ChunkGroupEncoder<'a> {
    pub fn new(
        store: &'a dyn ObjectStore,
        codec: Arc<dyn ErasureCodec>,
        file_name: impl Into<String>,
        shard_size: u32,
    ) -> Self {
        let config = codec.config();
        Self {
            store,
            codec,
            config,
            file_name: file_name.into(),
            shard_size: shard_size as usize,
        }
    }

    /// Zeroed buffer for one chunk group
    pub fn group_buffer(&self) -> Vec<u8> {
        vec![0u8; self.config.buffer_len(self.shard_size)]
    }

    /// Bytes of file data one group holds
    pub fn data_capacity(&self) -> usize {
        self.config.data_shards * self.shard_size
    }

    /// Pin name of one shard
    pub fn shard_name(&self, group: usize, shard: usize) -> String {
        format!("{}.chunk{}.shard{}", self.file_name, group, shard)
    }

    /// Encode a buffer whose data slots are filled, then upload every shard.
    ///
    /// The first failed upload aborts the group; shards already uploaded
    /// stay in the store.
    pub async fn encode_group(&self, group: usize, mut buffer: Vec<u8>) -> Result<ChunkGroupRow> {
        let codec = Arc::clone(&self.codec);
        let shard_size = self.shard_size;
        let buffer = tokio::task::spawn_blocking(move || {
            codec.encode(&mut buffer, shard_size).map(|_| buffer)
        })
        .await?
        .map_err(|e| ShardVaultError::EncodeFailure {
            group,
            reason: e.to_string(),
        })?;

        debug!(group = group, "Encoded chunk group");

        let shards = Bytes::from(buffer);
        let uploads = (0..self.config.total_shards()).map(|index| {
            let shard = shards.slice(index * shard_size..(index + 1) * shard_size);
            let name = self.shard_name(group, index);
            async move {
                let result = self.store.put(shard, &name).await;
                result.map_err(|e| ShardVaultError::upload(name, e))
            }
        });
        let ids: Vec<Cid> = try_join_all(uploads).await?;

        debug!(group = group, shards = ids.len(), "Uploaded chunk group shards");
        Ok(ChunkGroupRow::complete(ids))
    }
}

/// Encode the file at `path`, upload shards and metadata, and return the
/// metadata CID.
#[instrument(skip(store, codec, path), fields(path = %path.display()))]
pub async fn encode_file(
    store: &dyn ObjectStore,
    codec: Arc<dyn ErasureCodec>,
    path: &Path,
    metadata_prefix: &str,
) -> Result<Cid> {
    let stat = tokio::fs::metadata(path).await.map_err(|e| {
        ShardVaultError::InvalidInput(format!(
            "input file {} does not exist or is not accessible: {}",
            path.display(),
            e
        ))
    })?;
    if !stat.is_file() {
        return Err(ShardVaultError::InvalidInput(format!(
            "input path {} is not a file",
            path.display()
        )));
    }
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            ShardVaultError::InvalidInput(format!(
                "input path {} has no usable file name",
                path.display()
            ))
        })?
        .to_string();

    let config = codec.config();
    let original_size = stat.len();
    let shard_size = shard_size(original_size, config.data_shards);
    let total_groups = if original_size == 0 {
        1
    } else {
        original_size.div_ceil(chunk_group_capacity(shard_size, config.data_shards))
    };

    info!(
        file = %file_name,
        size = original_size,
        shard_size = shard_size,
        data_shards = config.data_shards,
        parity_shards = config.parity_shards,
        groups = total_groups,
        "Encoding file"
    );

    let file = tokio::fs::File::open(path).await.map_err(|e| {
        ShardVaultError::InvalidInput(format!("cannot open {}: {}", path.display(), e))
    })?;
    let encoder = ChunkGroupEncoder::new(store, codec, file_name, shard_size);
    let metadata = encode_stream(&encoder, file, original_size).await?;
    let cid = metadata.publish(store, metadata_prefix).await?;

    info!(cid = %cid, groups = metadata.chunk_groups.len(), "Encoding complete");
    Ok(cid)
}

/// Encode `original_size` bytes from `reader` group by group and return
/// the metadata describing the uploaded shards.
///
/// A reader that ends before `original_size` bytes is an error; bytes past
/// `original_size` are never read.
pub async fn encode_stream<R: AsyncRead + Unpin>(
    encoder: &ChunkGroupEncoder<'_>,
    reader: R,
    original_size: u64,
) -> Result<FileMetadata> {
    let mut builder = MetadataBuilder::new(
        encoder.file_name.clone(),
        original_size,
        encoder.shard_size as u32,
        encoder.config,
    );

    if original_size == 0 {
        // Still encoded and uploaded, so recovery has one uniform path
        let row = encoder.encode_group(0, encoder.group_buffer()).await?;
        builder.push_row(row)?;
        return Ok(builder.build());
    }

    let mut reader = reader.take(original_size);
    let capacity = encoder.data_capacity();
    let mut cursor = ChunkCursor::default();

    loop {
        let mut buffer = encoder.group_buffer();
        let read = read_window(&mut reader, &mut buffer[..capacity]).await?;
        if read == 0 {
            break;
        }

        debug!(
            group = cursor.group,
            offset = cursor.offset,
            bytes = read,
            "Read chunk group window"
        );
        let row = encoder.encode_group(cursor.group, buffer).await?;
        builder.push_row(row)?;
        cursor = cursor.advance(read as u64);
    }

    if cursor.offset != original_size {
        return Err(ShardVaultError::InvalidInput(format!(
            "{} changed during encode: expected {} bytes, read {}",
            encoder.file_name, original_size, cursor.offset
        )));
    }
    Ok(builder.build())
}

/// Fill `window` from `reader`, stopping early only at end of input
async fn read_window<R: AsyncRead + Unpin>(reader: &mut R, window: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < window.len() {
        let n = reader.read(&mut window[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::erasure::ReedSolomonCodec;
    use crate::store::MemoryStore;

    fn codec() -> Arc<dyn ErasureCodec> {
        Arc::new(ReedSolomonCodec::new().unwrap())
    }

    #[test]
    fn test_cursor_advance() {
        let cursor = ChunkCursor::default().advance(12).advance(5);
        assert_eq!(cursor, ChunkCursor { group: 2, offset: 17 });
    }

    #[test]
    fn test_shard_names() {
        let store = MemoryStore::new();
        let encoder = ChunkGroupEncoder::new(&store, codec(), "a.txt", 3);
        assert_eq!(encoder.shard_name(0, 5), "a.txt.chunk0.shard5");
        assert_eq!(encoder.shard_name(12, 0), "a.txt.chunk12.shard0");
        assert_eq!(encoder.data_capacity(), 12);
        assert_eq!(encoder.group_buffer().len(), 18);
    }

    #[tokio::test]
    async fn test_read_window_handles_short_reads() {
        let data: Vec<u8> = (0..10).collect();
        let mut reader = tokio::io::BufReader::with_capacity(3, &data[..]);

        let mut window = [0u8; 8];
        assert_eq!(read_window(&mut reader, &mut window).await.unwrap(), 8);
        assert_eq!(&window, &[0, 1, 2, 3, 4, 5, 6, 7]);

        let mut window = [0u8; 8];
        assert_eq!(read_window(&mut reader, &mut window).await.unwrap(), 2);
        assert_eq!(&window[..2], &[8, 9]);
    }

    #[tokio::test]
    async fn test_encode_group_uploads_every_shard() {
        let store = MemoryStore::new();
        let encoder = ChunkGroupEncoder::new(&store, codec(), "g.bin", 4);

        let mut buffer = encoder.group_buffer();
        buffer[..16].copy_from_slice(b"sixteen bytes!!!");
        let row = encoder.encode_group(7, buffer).await.unwrap();

        assert_eq!(row.len(), 6);
        assert_eq!(store.put_count(), 6);
        let pins = store.pins().await.unwrap();
        assert!(pins.iter().any(|p| p.name == "g.bin.chunk7.shard5"));
        let first = store.get(row.get(0).unwrap()).await.unwrap();
        assert_eq!(&first[..], b"sixt");
    }

    #[tokio::test]
    async fn test_encode_stream_group_boundaries() {
        let store = MemoryStore::new();
        // 4 data shards of 2 bytes: 8 file bytes per group
        let encoder = ChunkGroupEncoder::new(&store, codec(), "edge.bin", 2);
        let data: Vec<u8> = (1..=17).collect();

        for (size, groups) in [(8usize, 1usize), (9, 2), (16, 2), (17, 3)] {
            let reader = tokio::io::BufReader::with_capacity(3, &data[..size]);
            let metadata = encode_stream(&encoder, reader, size as u64).await.unwrap();
            assert_eq!(metadata.chunk_groups.len(), groups, "size {}", size);
            assert_eq!(metadata.original_size, size as u64);
            assert_eq!(metadata.shard_size, 2);
        }

        // Last group of the 9-byte input holds one byte, then zero padding
        let reader = &data[..9];
        let metadata = encode_stream(&encoder, reader, 9).await.unwrap();
        let first = store.get(metadata.chunk_groups[1].get(0).unwrap()).await.unwrap();
        assert_eq!(&first[..], &[9, 0]);
        let second = store.get(metadata.chunk_groups[1].get(1).unwrap()).await.unwrap();
        assert_eq!(&second[..], &[0, 0]);
    }

    #[tokio::test]
    async fn test_encode_stream_reader_ends_early() {
        let store = MemoryStore::new();
        let encoder = ChunkGroupEncoder::new(&store, codec(), "shrunk.bin", 2);
        let data = [7u8; 10];

        let err = encode_stream(&encoder, &data[..], 20).await.unwrap_err();
        match err {
            ShardVaultError::InvalidInput(msg) => {
                assert!(msg.contains("shrunk.bin changed during encode"), "{}", msg);
                assert!(msg.contains("read 10"), "{}", msg);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_encode_stream_stops_at_declared_size() {
        let store = MemoryStore::new();
        let encoder = ChunkGroupEncoder::new(&store, codec(), "grown.bin", 2);
        let data = [1u8; 32];

        let metadata = encode_stream(&encoder, &data[..], 8).await.unwrap();
        assert_eq!(metadata.chunk_groups.len(), 1);
        assert_eq!(store.put_count(), 6);
    }

    #[tokio::test]
    async fn test_rejects_directory_and_missing_file() {
        let store = MemoryStore::new();
        let dir = tempfile::tempdir().unwrap();

        let err = encode_file(&store, codec(), dir.path(), "_m_").await.unwrap_err();
        assert!(matches!(err, ShardVaultError::InvalidInput(_)));

        let missing = dir.path().join("missing.bin");
        let err = encode_file(&store, codec(), &missing, "_m_").await.unwrap_err();
        assert!(matches!(err, ShardVaultError::InvalidInput(_)));
        assert_eq!(store.put_count(), 0);
    }
}
