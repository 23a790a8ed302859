//! IPFS Cluster client
//!
//! HTTP client for the two services behind the store boundary:
//! - the cluster REST API (`/add`, `/pins`, `/peers`) for writes and pin management
//! - the IPFS daemon RPC API (`/api/v0/cat`) for reads

use super::{CidField, ObjectStore, PeerInfo, PinInfo, StoredFile};
use crate::cid::Cid;
use crate::config::StoreConfig;
use crate::error::{Result, ShardVaultError};
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, warn};

/// One line of `/add` output. The cluster reports `cid`, a bare IPFS
/// daemon reports `Hash`.
#[derive(Deserialize)]
struct AddedOutput {
    #[serde(default)]
    cid: Option<CidField>,
    #[serde(default, rename = "Hash")]
    hash: Option<String>,
}

impl AddedOutput {
    fn into_cid(self) -> Option<Cid> {
        match (self.cid, self.hash) {
            (Some(cid), _) => Some(cid.into()),
            (None, Some(hash)) => Some(Cid::new(hash)),
            (None, None) => None,
        }
    }
}

/// IPFS Cluster + daemon client
pub struct ClusterClient {
    client: Client,
    config: StoreConfig,
}

impl ClusterClient {
    /// Create a new client
    pub fn new(config: StoreConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| ShardVaultError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: StoreConfig {
                cluster_url: config.cluster_url.trim_end_matches('/').to_string(),
                ipfs_api_url: config.ipfs_api_url.trim_end_matches('/').to_string(),
                ..config
            },
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Upload and pin through the cluster `/add` endpoint
    pub async fn add(&self, data: Bytes, name: &str) -> Result<Cid> {
        let url = format!("{}/add", self.config.cluster_url);
        let size = data.len() as u64;
        let part = Part::stream_with_length(data, size).file_name(name.to_string());
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(&url)
            .query(&[
                ("pin", "true"),
                ("quieter", "true"),
                ("wrap-with-directory", "false"),
                ("name", name),
            ])
            .multipart(form)
            .timeout(self.config.upload_timeout())
            .send()
            .await
            .map_err(|e| unavailable(&url, e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| unavailable(&url, e))?;
        if !status.is_success() {
            return Err(ShardVaultError::StoreUnavailable(format!(
                "{} returned HTTP {}: {}",
                url,
                status.as_u16(),
                body.trim()
            )));
        }

        extract_cid(&body).ok_or_else(|| {
            ShardVaultError::StoreProtocolError(format!(
                "no CID in /add response (HTTP {}): {}",
                status.as_u16(),
                truncate_for_log(&body)
            ))
        })
    }

    /// Fetch raw object bytes through the daemon `/api/v0/cat` endpoint
    pub async fn cat(&self, cid: &Cid) -> Result<Bytes> {
        let url = format!("{}/api/v0/cat", self.config.ipfs_api_url);

        // POST, as the daemon RPC API requires
        let response = self
            .client
            .post(&url)
            .query(&[("arg", cid.as_str())])
            .timeout(self.config.fetch_timeout())
            .send()
            .await
            .map_err(|e| unavailable(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ShardVaultError::StoreUnavailable(format!(
                "{} returned HTTP {}: {}",
                url,
                status.as_u16(),
                body.trim()
            )));
        }

        response.bytes().await.map_err(|e| unavailable(&url, e))
    }

    /// Remove a pin from the cluster. An unknown pin counts as removed.
    pub async fn remove_pin(&self, cid: &Cid) -> Result<()> {
        let url = format!("{}/pins/{}", self.config.cluster_url, cid);

        let response = self
            .client
            .delete(&url)
            .timeout(self.config.fetch_timeout())
            .send()
            .await
            .map_err(|e| unavailable(&url, e))?;

        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => {
                debug!(cid = %cid, "Pin already absent");
                Ok(())
            }
            s => Err(ShardVaultError::StoreUnavailable(format!(
                "{} returned HTTP {}: {}",
                url,
                s.as_u16(),
                response.text().await.unwrap_or_default().trim()
            ))),
        }
    }

    /// All pins known to the cluster
    pub async fn list_pins(&self) -> Result<Vec<PinInfo>> {
        self.get_json_stream("pins").await
    }

    /// Cluster peers
    pub async fn peers(&self) -> Result<Vec<PeerInfo>> {
        self.get_json_stream("peers").await
    }

    /// Encoded files, found through their metadata pins
    pub async fn list_files(&self, metadata_prefix: &str) -> Result<Vec<StoredFile>> {
        let pins = self.list_pins().await?;
        Ok(super::stored_files(pins, metadata_prefix))
    }

    async fn get_json_stream<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let url = format!("{}/{}", self.config.cluster_url, path);

        let response = self
            .client
            .get(&url)
            .timeout(self.config.fetch_timeout())
            .send()
            .await
            .map_err(|e| unavailable(&url, e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| unavailable(&url, e))?;
        if !status.is_success() {
            return Err(ShardVaultError::StoreUnavailable(format!(
                "{} returned HTTP {}: {}",
                url,
                status.as_u16(),
                body.trim()
            )));
        }

        parse_json_stream(&body)
    }
}

impl ObjectStore for ClusterClient {
    fn put<'a>(
        &'a self,
        data: Bytes,
        name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Cid>> + Send + 'a>> {
        Box::pin(async move {
            let cid = self.add(data, name).await?;
            debug!(name = name, cid = %cid, "Object added to cluster");
            Ok(cid)
        })
    }

    fn get<'a>(&'a self, cid: &'a Cid) -> Pin<Box<dyn Future<Output = Option<Bytes>> + Send + 'a>> {
        Box::pin(async move {
            match self.cat(cid).await {
                Ok(data) => Some(data),
                Err(e) => {
                    warn!(cid = %cid, error = %e, "Failed to fetch object");
                    None
                }
            }
        })
    }

    fn unpin<'a>(&'a self, cid: &'a Cid) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(self.remove_pin(cid))
    }

    fn pins<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<Vec<PinInfo>>> + Send + 'a>> {
        Box::pin(self.list_pins())
    }
}

fn unavailable(url: &str, err: reqwest::Error) -> ShardVaultError {
    if err.is_timeout() {
        ShardVaultError::StoreUnavailable(format!("{} timed out: {}", url, err))
    } else {
        ShardVaultError::StoreUnavailable(format!("{}: {}", url, err))
    }
}

/// Pull the CID out of an `/add` response.
///
/// Accepts a single JSON object, a JSON array of objects, or
/// newline-delimited JSON; the first object carrying a CID wins.
pub(crate) fn extract_cid(body: &str) -> Option<Cid> {
    let body = body.trim();
    if let Ok(output) = serde_json::from_str::<AddedOutput>(body) {
        if let Some(cid) = output.into_cid() {
            return Some(cid);
        }
    }
    if let Ok(outputs) = serde_json::from_str::<Vec<AddedOutput>>(body) {
        return outputs.into_iter().find_map(AddedOutput::into_cid);
    }
    body.lines()
        .filter_map(|line| serde_json::from_str::<AddedOutput>(line.trim()).ok())
        .find_map(AddedOutput::into_cid)
}

/// Parse a JSON array or newline-delimited JSON into a list
pub(crate) fn parse_json_stream<T: DeserializeOwned>(body: &str) -> Result<Vec<T>> {
    let body = body.trim();
    if body.is_empty() {
        return Ok(Vec::new());
    }
    if body.starts_with('[') {
        return serde_json::from_str(body)
            .map_err(|e| ShardVaultError::StoreProtocolError(e.to_string()));
    }
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            serde_json::from_str(line).map_err(|e| ShardVaultError::StoreProtocolError(e.to_string()))
        })
        .collect()
}

fn truncate_for_log(body: &str) -> &str {
    let end = body
        .char_indices()
        .nth(200)
        .map(|(i, _)| i)
        .unwrap_or(body.len());
    &body[..end]
}
