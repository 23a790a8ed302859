//! Error types for ShardVault
//!
//! One error type covers encode, recovery and the store boundary. Shard
//! fetch failures never show up here: the store reports them as absence.

use thiserror::Error;

/// Result type alias for ShardVault operations
pub type Result<T> = std::result::Result<T, ShardVaultError>;

/// Unified error type for ShardVault
#[derive(Error, Debug)]
pub enum ShardVaultError {
    // ===== Encode Errors =====
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Erasure encode failed for chunk group {group}: {reason}")]
    EncodeFailure { group: usize, reason: String },

    #[error("Upload of {name} failed: {source}")]
    UploadFailure {
        name: String,
        #[source]
        source: Box<ShardVaultError>,
    },

    // ===== Recovery Errors =====
    #[error("Metadata {cid} could not be fetched")]
    MetadataUnavailable { cid: String },

    #[error("Metadata {cid} is invalid: {reason}")]
    MetadataInvalid { cid: String, reason: String },

    #[error("Insufficient shards for chunk group {group}: have {available}, need {required}")]
    InsufficientShards {
        group: usize,
        available: usize,
        required: usize,
    },

    #[error("Reconstruction failed for chunk group {group}: {reason}")]
    ReconstructFailure { group: usize, reason: String },

    #[error("Recovered size ({actual}) does not match original size ({expected})")]
    SizeMismatch { expected: u64, actual: u64 },

    // ===== Store Errors =====
    #[error("Object store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Object store protocol error: {0}")]
    StoreProtocolError(String),

    // ===== Erasure Coding Errors =====
    #[error("Erasure coding error: {0}")]
    ErasureCoding(String),

    // ===== I/O Errors =====
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ===== Serialization Errors =====
    #[error("Serialization error: {0}")]
    Serialization(String),

    // ===== Configuration Errors =====
    #[error("Configuration error: {0}")]
    Configuration(String),

    // ===== Generic Errors =====
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ShardVaultError {
    /// Wrap a store error as the failure of one named upload
    pub fn upload(name: impl Into<String>, source: ShardVaultError) -> Self {
        ShardVaultError::UploadFailure {
            name: name.into(),
            source: Box::new(source),
        }
    }
}

impl From<reed_solomon_erasure::Error> for ShardVaultError {
    fn from(err: reed_solomon_erasure::Error) -> Self {
        ShardVaultError::ErasureCoding(err.to_string())
    }
}

impl From<serde_json::Error> for ShardVaultError {
    fn from(err: serde_json::Error) -> Self {
        ShardVaultError::Serialization(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ShardVaultError {
    fn from(err: tokio::task::JoinError) -> Self {
        ShardVaultError::Internal(format!("blocking task failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let err = ShardVaultError::InsufficientShards {
            group: 2,
            available: 3,
            required: 4,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient shards for chunk group 2: have 3, need 4"
        );
    }

    #[test]
    fn test_upload_failure_keeps_source() {
        let err = ShardVaultError::upload(
            "a.txt.chunk0.shard3",
            ShardVaultError::StoreUnavailable("connection refused".to_string()),
        );
        assert!(err.to_string().contains("a.txt.chunk0.shard3"));
        let source = err.source().unwrap();
        assert_eq!(
            source.to_string(),
            "Object store unavailable: connection refused"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ShardVaultError = io_err.into();
        assert!(matches!(err, ShardVaultError::Io(_)));
    }
}
