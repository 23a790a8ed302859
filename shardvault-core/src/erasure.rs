//! Reed-Solomon Erasure Coding
//!
//! Operates on one flat chunk-group buffer of `total_shards * shard_size`
//! bytes: data shards occupy the leading slots, parity shards the trailing
//! ones. The codec is built once and shared read-only between all encode
//! and recovery calls.

use crate::error::{Result, ShardVaultError};
use crate::{DATA_SHARDS, PARITY_SHARDS};
use reed_solomon_erasure::galois_8::ReedSolomon;
use serde::{Deserialize, Serialize};

/// Upper bound on data + parity shards for GF(2^8)
const MAX_TOTAL_SHARDS: usize = 256;

/// Erasure coding configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErasureConfig {
    /// Number of data shards (k)
    pub data_shards: usize,
    /// Number of parity shards (m)
    pub parity_shards: usize,
}

impl Default for ErasureConfig {
    fn default() -> Self {
        Self {
            data_shards: DATA_SHARDS,
            parity_shards: PARITY_SHARDS,
        }
    }
}

impl ErasureConfig {
    /// Create a new erasure config
    pub fn new(data_shards: usize, parity_shards: usize) -> Result<Self> {
        if data_shards == 0 {
            return Err(ShardVaultError::Configuration(
                "data_shards must be > 0".to_string(),
            ));
        }
        if parity_shards == 0 {
            return Err(ShardVaultError::Configuration(
                "parity_shards must be > 0".to_string(),
            ));
        }
        if data_shards + parity_shards > MAX_TOTAL_SHARDS {
            return Err(ShardVaultError::Configuration(format!(
                "data_shards + parity_shards must be <= {}",
                MAX_TOTAL_SHARDS
            )));
        }
        Ok(Self {
            data_shards,
            parity_shards,
        })
    }

    /// Total number of shards
    pub fn total_shards(&self) -> usize {
        self.data_shards + self.parity_shards
    }

    /// Size of a full chunk-group buffer
    pub fn buffer_len(&self, shard_size: usize) -> usize {
        self.total_shards() * shard_size
    }
}

/// Erasure coding primitive over a flat shard buffer.
///
/// Both calls are synchronous and CPU-bound.
pub trait ErasureCodec: Send + Sync {
    /// Shard geometry this codec was built for
    fn config(&self) -> ErasureConfig;

    /// Fill the parity slots of `buffer` from its data slots
    fn encode(&self, buffer: &mut [u8], shard_size: usize) -> Result<()>;

    /// Fill every slot whose `present` flag is false.
    ///
    /// Needs at least `data_shards` present slots.
    fn reconstruct(&self, buffer: &mut [u8], shard_size: usize, present: &[bool]) -> Result<()>;
}

/// Reed-Solomon codec over GF(2^8)
pub struct ReedSolomonCodec {
    config: ErasureConfig,
    encoder: ReedSolomon,
}

impl ReedSolomonCodec {
    /// Create a new codec with default configuration (4, 2)
    pub fn new() -> Result<Self> {
        Self::with_config(ErasureConfig::default())
    }

    /// Create a new codec with custom configuration
    pub fn with_config(config: ErasureConfig) -> Result<Self> {
        let config = ErasureConfig::new(config.data_shards, config.parity_shards)?;
        let encoder = ReedSolomon::new(config.data_shards, config.parity_shards)?;
        Ok(Self { config, encoder })
    }

    /// Check that parity slots match the data slots (for health checking)
    pub fn verify(&self, buffer: &[u8], shard_size: usize) -> Result<bool> {
        self.check_buffer(buffer.len(), shard_size)?;
        let shards: Vec<&[u8]> = buffer.chunks(shard_size).collect();
        Ok(self.encoder.verify(&shards)?)
    }

    fn check_buffer(&self, len: usize, shard_size: usize) -> Result<()> {
        if shard_size == 0 {
            return Err(ShardVaultError::ErasureCoding(
                "shard size must be > 0".to_string(),
            ));
        }
        let expected = self.config.buffer_len(shard_size);
        if len != expected {
            return Err(ShardVaultError::ErasureCoding(format!(
                "buffer length mismatch: expected {}, got {}",
                expected, len
            )));
        }
        Ok(())
    }
}

impl ErasureCodec for ReedSolomonCodec {
    fn config(&self) -> ErasureConfig {
        self.config
    }

    fn encode(&self, buffer: &mut [u8], shard_size: usize) -> Result<()> {
        self.check_buffer(buffer.len(), shard_size)?;
        let mut shards: Vec<&mut [u8]> = buffer.chunks_mut(shard_size).collect();
        self.encoder.encode(&mut shards)?;
        Ok(())
    }

    fn reconstruct(&self, buffer: &mut [u8], shard_size: usize, present: &[bool]) -> Result<()> {
        self.check_buffer(buffer.len(), shard_size)?;
        if present.len() != self.config.total_shards() {
            return Err(ShardVaultError::ErasureCoding(format!(
                "presence mask length mismatch: expected {}, got {}",
                self.config.total_shards(),
                present.len()
            )));
        }

        let available = present.iter().filter(|p| **p).count();
        if available < self.config.data_shards {
            return Err(ShardVaultError::ErasureCoding(format!(
                "too few shards present: have {}, need {}",
                available, self.config.data_shards
            )));
        }

        let mut slots: Vec<(&mut [u8], bool)> = buffer
            .chunks_mut(shard_size)
            .zip(present.iter().copied())
            .collect();
        self.encoder.reconstruct(&mut slots)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded_buffer(codec: &ReedSolomonCodec, data: &[u8], shard_size: usize) -> Vec<u8> {
        let mut buffer = vec![0u8; codec.config().buffer_len(shard_size)];
        buffer[..data.len()].copy_from_slice(data);
        codec.encode(&mut buffer, shard_size).unwrap();
        buffer
    }

    #[test]
    fn test_erasure_config() {
        let config = ErasureConfig::default();
        assert_eq!(config.data_shards, 4);
        assert_eq!(config.parity_shards, 2);
        assert_eq!(config.total_shards(), 6);
        assert_eq!(config.buffer_len(3), 18);
    }

    #[test]
    fn test_invalid_config() {
        assert!(ErasureConfig::new(0, 2).is_err());
        assert!(ErasureConfig::new(4, 0).is_err());
        assert!(ErasureConfig::new(200, 57).is_err());
        assert!(ErasureConfig::new(200, 56).is_ok());
    }

    #[test]
    fn test_encode_leaves_data_slots_untouched() {
        let codec = ReedSolomonCodec::new().unwrap();
        let data = b"0123456789";
        let buffer = encoded_buffer(&codec, data, 3);

        assert_eq!(&buffer[..10], data);
        assert_eq!(&buffer[10..12], &[0, 0]);
        assert!(codec.verify(&buffer, 3).unwrap());
    }

    #[test]
    fn test_reconstruct_missing_data_shards() {
        let codec = ReedSolomonCodec::new().unwrap();
        let data = b"Hello, ShardVault!";
        let shard_size = 5;
        let original = encoded_buffer(&codec, data, shard_size);

        // Lose shards 1 and 3 (both data)
        let mut damaged = original.clone();
        damaged[shard_size..2 * shard_size].fill(0);
        damaged[3 * shard_size..4 * shard_size].fill(0);
        let present = [true, false, true, false, true, true];

        codec.reconstruct(&mut damaged, shard_size, &present).unwrap();
        assert_eq!(damaged, original);
    }

    #[test]
    fn test_reconstruct_from_parity_heavy_subset() {
        let codec = ReedSolomonCodec::new().unwrap();
        let data: Vec<u8> = (0..64u8).collect();
        let shard_size = 16;
        let original = encoded_buffer(&codec, &data, shard_size);

        let mut damaged = original.clone();
        damaged[..2 * shard_size].fill(0);
        let present = [false, false, true, true, true, true];

        codec.reconstruct(&mut damaged, shard_size, &present).unwrap();
        assert_eq!(damaged, original);
    }

    #[test]
    fn test_too_many_missing_shards() {
        let codec = ReedSolomonCodec::new().unwrap();
        let mut buffer = encoded_buffer(&codec, b"test data", 3);
        let present = [false, false, false, true, true, true];

        let result = codec.reconstruct(&mut buffer, 3, &present);
        assert!(matches!(result, Err(ShardVaultError::ErasureCoding(_))));
    }

    #[test]
    fn test_buffer_length_checked() {
        let codec = ReedSolomonCodec::new().unwrap();
        let mut short = vec![0u8; 17];
        assert!(codec.encode(&mut short, 3).is_err());

        let mut buffer = vec![0u8; 18];
        assert!(codec.reconstruct(&mut buffer, 3, &[true; 5]).is_err());
        assert!(codec.encode(&mut buffer, 0).is_err());
    }

    #[test]
    fn test_verify_detects_corruption() {
        let codec = ReedSolomonCodec::new().unwrap();
        let mut buffer = encoded_buffer(&codec, b"verify test", 3);
        assert!(codec.verify(&buffer, 3).unwrap());

        buffer[0] ^= 0xFF;
        assert!(!codec.verify(&buffer, 3).unwrap());
    }

    #[test]
    fn test_custom_config() {
        let config = ErasureConfig::new(3, 2).unwrap();
        let codec = ReedSolomonCodec::with_config(config).unwrap();
        assert_eq!(codec.config().total_shards(), 5);

        let original = encoded_buffer(&codec, b"small config", 4);
        let mut damaged = original.clone();
        damaged[4..8].fill(0);
        damaged[16..20].fill(0);
        codec
            .reconstruct(&mut damaged, 4, &[true, false, true, true, false])
            .unwrap();
        assert_eq!(damaged, original);
    }
}
