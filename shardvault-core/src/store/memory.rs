//! In-memory object store
//!
//! Content-addressed like the real cluster: identical bytes get the same
//! CID. Useful for tests and offline dry runs; `forget` simulates the loss
//! of an object.

use super::{ObjectStore, PinInfo};
use crate::cid::Cid;
use crate::error::Result;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};

struct StoredObject {
    data: Bytes,
    name: String,
}

/// In-memory content store
#[derive(Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<Cid, StoredObject>>,
    puts: AtomicU64,
    gets: AtomicU64,
    unpins: AtomicU64,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// CID this store assigns to `data`
    pub fn cid_for(data: &[u8]) -> Cid {
        let hash = blake3::hash(data);
        Cid::new(format!("mem{}", bs58::encode(hash.as_bytes()).into_string()))
    }

    /// Drop an object, as if every replica had been lost
    pub fn forget(&self, cid: &Cid) -> bool {
        self.objects.write().remove(cid).is_some()
    }

    /// Overwrite the bytes stored under `cid`
    pub fn replace(&self, cid: &Cid, data: Bytes) {
        let mut objects = self.objects.write();
        let name = objects
            .remove(cid)
            .map(|o| o.name)
            .unwrap_or_default();
        objects.insert(cid.clone(), StoredObject { data, name });
    }

    pub fn contains(&self, cid: &Cid) -> bool {
        self.objects.read().contains_key(cid)
    }

    /// Number of distinct objects held
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Number of `put` calls served
    pub fn put_count(&self) -> u64 {
        self.puts.load(Ordering::Relaxed)
    }

    /// Number of `get` calls served
    pub fn get_count(&self) -> u64 {
        self.gets.load(Ordering::Relaxed)
    }

    /// Number of `unpin` calls served
    pub fn unpin_count(&self) -> u64 {
        self.unpins.load(Ordering::Relaxed)
    }
}

impl ObjectStore for MemoryStore {
    fn put<'a>(
        &'a self,
        data: Bytes,
        name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Cid>> + Send + 'a>> {
        Box::pin(async move {
            self.puts.fetch_add(1, Ordering::Relaxed);
            let cid = Self::cid_for(&data);
            self.objects.write().insert(
                cid.clone(),
                StoredObject {
                    data,
                    name: name.to_string(),
                },
            );
            Ok(cid)
        })
    }

    fn get<'a>(&'a self, cid: &'a Cid) -> Pin<Box<dyn Future<Output = Option<Bytes>> + Send + 'a>> {
        Box::pin(async move {
            self.gets.fetch_add(1, Ordering::Relaxed);
            self.objects.read().get(cid).map(|o| o.data.clone())
        })
    }

    fn unpin<'a>(&'a self, cid: &'a Cid) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.unpins.fetch_add(1, Ordering::Relaxed);
            self.objects.write().remove(cid);
            Ok(())
        })
    }

    fn pins<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<Vec<PinInfo>>> + Send + 'a>> {
        Box::pin(async move {
            let objects = self.objects.read();
            Ok(objects
                .iter()
                .map(|(cid, o)| PinInfo {
                    cid: cid.clone(),
                    name: o.name.clone(),
                })
                .collect())
        })
    }
}
