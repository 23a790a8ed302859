//! Object store boundary
//!
//! Defines the interface the encoder, the recovery orchestrator and
//! deletion use to reach the content store. `get` never fails: any error
//! is logged by the implementation and reported as absence, because a
//! missing shard is an expected outcome during recovery.

pub mod cluster;
pub mod memory;

pub use cluster::ClusterClient;
pub use memory::MemoryStore;

use crate::cid::Cid;
use crate::error::Result;
use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};
use std::future::Future;
use std::pin::Pin;

/// A pinned object as reported by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinInfo {
    #[serde(deserialize_with = "deserialize_cid")]
    pub cid: Cid,
    #[serde(default)]
    pub name: String,
}

/// A cluster peer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeerInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub peername: String,
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default)]
    pub error: String,
}

/// An encoded file, found through its metadata pin
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    pub metadata_cid: Cid,
    pub file_name: String,
}

/// Content store trait
///
/// All implementations must be Send + Sync: shard transfers of one chunk
/// group run concurrently against the same store.
pub trait ObjectStore: Send + Sync {
    /// Upload `data` under the human-readable `name`, returning its CID
    fn put<'a>(
        &'a self,
        data: Bytes,
        name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Cid>> + Send + 'a>>;

    /// Fetch an object; `None` on any failure
    fn get<'a>(&'a self, cid: &'a Cid) -> Pin<Box<dyn Future<Output = Option<Bytes>> + Send + 'a>>;

    /// Release an object so the store may collect it
    fn unpin<'a>(&'a self, cid: &'a Cid) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// List pinned objects
    fn pins<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<Vec<PinInfo>>> + Send + 'a>>;
}

/// Keep the pins whose name carries the metadata prefix
pub fn stored_files(pins: Vec<PinInfo>, metadata_prefix: &str) -> Vec<StoredFile> {
    let mut files: Vec<StoredFile> = pins
        .into_iter()
        .filter_map(|pin| {
            let file_name = pin.name.strip_prefix(metadata_prefix)?.to_string();
            Some(StoredFile {
                metadata_cid: pin.cid,
                file_name,
            })
        })
        .collect();
    files.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    files
}

/// CIDs appear either as plain strings or as IPLD links (`{"/": "..."}`)
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum CidField {
    Plain(String),
    Link {
        #[serde(rename = "/")]
        link: String,
    },
}

impl From<CidField> for Cid {
    fn from(field: CidField) -> Self {
        match field {
            CidField::Plain(s) => Cid::new(s),
            CidField::Link { link } => Cid::new(link),
        }
    }
}

fn deserialize_cid<'de, D>(deserializer: D) -> std::result::Result<Cid, D::Error>
where
    D: Deserializer<'de>,
{
    CidField::deserialize(deserializer).map(Cid::from)
}
