//! File metadata descriptor
//!
//! The descriptor binds a file's shard geometry to the CIDs of every shard
//! of every chunk group. It is serialized as pretty-printed JSON with
//! camelCase field names; that layout is the contract between encode and
//! recovery, so existing field names must never change.

use crate::cid::Cid;
use crate::erasure::ErasureConfig;
use crate::error::{Result, ShardVaultError};
use crate::sizing::{chunk_group_capacity, max_shard_size};
use crate::store::ObjectStore;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Shard CIDs of one chunk group, by shard index.
///
/// Positions `[0, data_shards)` are data shards, the rest parity.
/// `None` marks a shard with no known CID.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkGroupRow(Vec<Option<Cid>>);

impl ChunkGroupRow {
    pub fn new(ids: Vec<Option<Cid>>) -> Self {
        Self(ids)
    }

    /// Row where every shard has a CID
    pub fn complete(ids: Vec<Cid>) -> Self {
        Self(ids.into_iter().map(Some).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, shard_index: usize) -> Option<&Cid> {
        self.0.get(shard_index).and_then(Option::as_ref)
    }

    pub fn ids(&self) -> &[Option<Cid>] {
        &self.0
    }

    /// CIDs that are present, with their shard index
    pub fn present(&self) -> impl Iterator<Item = (usize, &Cid)> {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(i, id)| id.as_ref().map(|cid| (i, cid)))
    }
}

/// Per-file descriptor, immutable once uploaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub original_file_name: String,
    pub original_size: u64,
    pub shard_size: u32,
    pub data_shards: usize,
    pub parity_shards: usize,
    pub created_at: DateTime<Utc>,
    /// In file byte order
    pub chunk_groups: Vec<ChunkGroupRow>,
}

impl FileMetadata {
    pub fn total_shards(&self) -> usize {
        self.data_shards + self.parity_shards
    }

    pub fn erasure_config(&self) -> ErasureConfig {
        ErasureConfig {
            data_shards: self.data_shards,
            parity_shards: self.parity_shards,
        }
    }

    /// File bytes covered by one chunk group
    pub fn chunk_group_capacity(&self) -> u64 {
        chunk_group_capacity(self.shard_size, self.data_shards)
    }

    /// Pin name of the metadata object
    pub fn pin_name(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self.original_file_name)
    }

    /// File name used for the recovered copy
    pub fn recovered_file_name(&self) -> String {
        format!("recovered_{}", self.original_file_name)
    }

    /// Serialize to the on-store JSON form
    pub fn to_bytes(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec_pretty(self)?))
    }

    /// Parse and validate metadata fetched under `cid`
    pub fn from_slice(cid: &Cid, data: &[u8]) -> Result<Self> {
        let metadata: FileMetadata =
            serde_json::from_slice(data).map_err(|e| invalid(cid, format!("parse error: {}", e)))?;
        metadata.validate(cid)?;
        Ok(metadata)
    }

    /// Check the invariants recovery relies on
    pub fn validate(&self, cid: &Cid) -> Result<()> {
        if !is_plain_file_name(&self.original_file_name) {
            return Err(invalid(
                cid,
                format!("unusable file name {:?}", self.original_file_name),
            ));
        }
        if self.shard_size == 0 {
            return Err(invalid(cid, "shard size must be >= 1".to_string()));
        }
        ErasureConfig::new(self.data_shards, self.parity_shards)
            .map_err(|e| invalid(cid, e.to_string()))?;
        // Bounds the chunk-group buffer recovery allocates
        let limit = max_shard_size(self.data_shards);
        if self.shard_size > limit {
            return Err(invalid(
                cid,
                format!("shard size {} exceeds {}", self.shard_size, limit),
            ));
        }

        let total = self.total_shards();
        if let Some((group, row)) = self
            .chunk_groups
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != total)
        {
            return Err(invalid(
                cid,
                format!(
                    "chunk group {} has {} shard ids, expected {}",
                    group,
                    row.len(),
                    total
                ),
            ));
        }
        Ok(())
    }

    /// Upload the descriptor; the returned CID is the file's handle
    pub async fn publish(&self, store: &dyn ObjectStore, prefix: &str) -> Result<Cid> {
        let data = self.to_bytes()?;
        let name = self.pin_name(prefix);
        debug!(name = %name, size = data.len(), "Uploading metadata");

        let cid = store
            .put(data, &name)
            .await
            .map_err(|e| ShardVaultError::upload(name.clone(), e))?;

        info!(name = %name, cid = %cid, groups = self.chunk_groups.len(), "Metadata uploaded");
        Ok(cid)
    }
}

/// Accumulates chunk-group rows during an encode
pub struct MetadataBuilder {
    original_file_name: String,
    original_size: u64,
    shard_size: u32,
    config: ErasureConfig,
    chunk_groups: Vec<ChunkGroupRow>,
}

impl MetadataBuilder {
    pub fn new(
        original_file_name: impl Into<String>,
        original_size: u64,
        shard_size: u32,
        config: ErasureConfig,
    ) -> Self {
        Self {
            original_file_name: original_file_name.into(),
            original_size,
            shard_size,
            config,
            chunk_groups: Vec::new(),
        }
    }

    /// Append the next group's row; rows must arrive in file order
    pub fn push_row(&mut self, row: ChunkGroupRow) -> Result<()> {
        if row.len() != self.config.total_shards() {
            return Err(ShardVaultError::Internal(format!(
                "chunk group row has {} ids, expected {}",
                row.len(),
                self.config.total_shards()
            )));
        }
        self.chunk_groups.push(row);
        Ok(())
    }

    pub fn build(self) -> FileMetadata {
        FileMetadata {
            original_file_name: self.original_file_name,
            original_size: self.original_size,
            shard_size: self.shard_size,
            data_shards: self.config.data_shards,
            parity_shards: self.config.parity_shards,
            created_at: Utc::now(),
            chunk_groups: self.chunk_groups,
        }
    }
}

fn invalid(cid: &Cid, reason: String) -> ShardVaultError {
    ShardVaultError::MetadataInvalid {
        cid: cid.to_string(),
        reason,
    }
}

/// A single path component that cannot climb out of the output directory
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sizing::{MAX_SHARD_SIZE, PROPORTIONAL_THRESHOLD};
    use crate::store::MemoryStore;

    fn sample() -> FileMetadata {
        let mut builder = MetadataBuilder::new("notes.txt", 10, 3, ErasureConfig::default());
        builder
            .push_row(ChunkGroupRow::complete(
                (0..6).map(|i| Cid::new(format!("QmShard{}", i))).collect(),
            ))
            .unwrap();
        builder.build()
    }

    #[test]
    fn test_wire_field_names() {
        let json = String::from_utf8(sample().to_bytes().unwrap().to_vec()).unwrap();
        for field in [
            "\"originalFileName\"",
            "\"originalSize\"",
            "\"shardSize\"",
            "\"dataShards\"",
            "\"parityShards\"",
            "\"createdAt\"",
            "\"chunkGroups\"",
        ] {
            assert!(json.contains(field), "missing {} in {}", field, json);
        }
        // Pretty-printed with two-space indentation
        assert!(json.contains("\n  \"originalFileName\": \"notes.txt\""));
    }

    #[test]
    fn test_parse_existing_descriptor() {
        let json = r#"{
  "originalFileName": "photo.jpg",
  "originalSize": 10,
  "shardSize": 3,
  "dataShards": 4,
  "parityShards": 2,
  "createdAt": "2024-05-01T12:00:00.000Z",
  "chunkGroups": [
    ["QmA", "QmB", null, "QmD", "QmE", "QmF"]
  ]
}"#;
        let cid = Cid::from("QmMeta");
        let metadata = FileMetadata::from_slice(&cid, json.as_bytes()).unwrap();
        assert_eq!(metadata.original_file_name, "photo.jpg");
        assert_eq!(metadata.chunk_group_capacity(), 12);
        assert_eq!(metadata.recovered_file_name(), "recovered_photo.jpg");
        assert_eq!(metadata.chunk_groups[0].get(2), None);
        assert_eq!(metadata.chunk_groups[0].get(3), Some(&Cid::from("QmD")));
        assert_eq!(metadata.chunk_groups[0].present().count(), 5);
    }

    #[test]
    fn test_round_trip_preserves_rows() {
        let original = sample();
        let bytes = original.to_bytes().unwrap();
        let parsed = FileMetadata::from_slice(&Cid::from("QmMeta"), &bytes).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_missing_field_is_invalid() {
        let json = r#"{"originalFileName": "a", "originalSize": 1, "dataShards": 4}"#;
        let err = FileMetadata::from_slice(&Cid::from("QmX"), json.as_bytes()).unwrap_err();
        assert!(matches!(err, ShardVaultError::MetadataInvalid { .. }));

        let err = FileMetadata::from_slice(&Cid::from("QmX"), b"\x00\x01binary").unwrap_err();
        assert!(matches!(err, ShardVaultError::MetadataInvalid { .. }));
    }

    #[test]
    fn test_validation_rules() {
        let cid = Cid::from("QmMeta");

        let mut m = sample();
        m.shard_size = 0;
        assert!(m.validate(&cid).is_err());

        let mut m = sample();
        m.shard_size = MAX_SHARD_SIZE;
        assert!(m.validate(&cid).is_ok());
        m.shard_size = MAX_SHARD_SIZE + 1;
        let err = m.validate(&cid).unwrap_err();
        assert!(matches!(err, ShardVaultError::MetadataInvalid { .. }));
        m.shard_size = u32::MAX - 1;
        assert!(m.validate(&cid).is_err());

        // A single data shard takes the whole proportional range
        let mut m = sample();
        m.data_shards = 1;
        m.parity_shards = 1;
        m.chunk_groups[0] = ChunkGroupRow::new(vec![None; 2]);
        m.shard_size = PROPORTIONAL_THRESHOLD as u32;
        assert!(m.validate(&cid).is_ok());
        m.shard_size += 1;
        assert!(m.validate(&cid).is_err());

        let mut m = sample();
        m.parity_shards = 0;
        assert!(m.validate(&cid).is_err());

        let mut m = sample();
        m.chunk_groups[0] = ChunkGroupRow::new(vec![None; 5]);
        let err = m.validate(&cid).unwrap_err();
        assert!(err.to_string().contains("chunk group 0 has 5 shard ids"));

        for name in ["", ".", "..", "../etc/passwd", "dir/file", "dir\\file"] {
            let mut m = sample();
            m.original_file_name = name.to_string();
            assert!(m.validate(&cid).is_err(), "accepted {:?}", name);
        }
    }

    #[test]
    fn test_builder_rejects_wrong_row_length() {
        let mut builder = MetadataBuilder::new("a", 1, 1, ErasureConfig::default());
        assert!(builder.push_row(ChunkGroupRow::new(vec![None; 4])).is_err());
        assert!(builder.build().chunk_groups.is_empty());
    }

    #[tokio::test]
    async fn test_publish_uses_prefixed_name() {
        let store = MemoryStore::new();
        let metadata = sample();
        let cid = metadata.publish(&store, "_metadata_rs_v1_").await.unwrap();

        let pins = store.pins().await.unwrap();
        assert_eq!(pins.len(), 1);
        assert_eq!(pins[0].name, "_metadata_rs_v1_notes.txt");
        assert_eq!(pins[0].cid, cid);
    }
}
