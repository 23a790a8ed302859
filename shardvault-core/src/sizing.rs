//! Shard sizing policy
//!
//! Files up to 400 MiB are split proportionally so that one chunk group
//! covers the whole file. Larger files use a fixed 100 MiB shard, which
//! bounds the memory of one chunk group at `total_shards * 100 MiB`.

const MIB: u64 = 1024 * 1024;

/// Largest file size that still gets proportional sharding
pub const PROPORTIONAL_THRESHOLD: u64 = 400 * MIB;

/// Shard size used for every file above the threshold
pub const MAX_SHARD_SIZE: u32 = 100 * 1024 * 1024;

/// Shard size in bytes for a file of `file_size` bytes split over `data_shards`.
///
/// Always at least 1, so a zero-byte file still has a well-defined geometry.
pub fn shard_size(file_size: u64, data_shards: usize) -> u32 {
    if file_size > PROPORTIONAL_THRESHOLD {
        return MAX_SHARD_SIZE;
    }
    if file_size == 0 {
        return 1;
    }
    let data_shards = data_shards.max(1) as u64;
    // Bounded by PROPORTIONAL_THRESHOLD, so it fits in u32.
    file_size.div_ceil(data_shards).max(1) as u32
}

/// Largest shard size `shard_size` can produce for `data_shards`
pub fn max_shard_size(data_shards: usize) -> u32 {
    shard_size(PROPORTIONAL_THRESHOLD, data_shards).max(MAX_SHARD_SIZE)
}

/// Bytes of file data covered by one chunk group
pub fn chunk_group_capacity(shard_size: u32, data_shards: usize) -> u64 {
    shard_size as u64 * data_shards as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_zero_byte_file() {
        assert_eq!(shard_size(0, 4), 1);
    }

    #[test]
    fn test_proportional_sizing() {
        assert_eq!(shard_size(1, 4), 1);
        assert_eq!(shard_size(4, 4), 1);
        assert_eq!(shard_size(5, 4), 2);
        assert_eq!(shard_size(10, 4), 3);
        assert_eq!(shard_size(1024, 4), 256);
    }

    #[test]
    fn test_threshold_boundary() {
        assert_eq!(shard_size(PROPORTIONAL_THRESHOLD, 4), 100 * 1024 * 1024);
        assert_eq!(shard_size(PROPORTIONAL_THRESHOLD + 1, 4), MAX_SHARD_SIZE);
        // With more data shards the boundary is visible
        assert_eq!(shard_size(PROPORTIONAL_THRESHOLD, 8), 50 * 1024 * 1024);
        assert_eq!(shard_size(PROPORTIONAL_THRESHOLD + 1, 8), MAX_SHARD_SIZE);
    }

    #[test]
    fn test_cap_for_huge_files() {
        assert_eq!(shard_size(10 * 1024 * MIB, 4), MAX_SHARD_SIZE);
        assert_eq!(shard_size(u64::MAX, 4), MAX_SHARD_SIZE);
    }

    #[test]
    fn test_max_shard_size() {
        assert_eq!(max_shard_size(4), MAX_SHARD_SIZE);
        assert_eq!(max_shard_size(8), MAX_SHARD_SIZE);
        assert_eq!(max_shard_size(1), PROPORTIONAL_THRESHOLD as u32);
        assert_eq!(max_shard_size(3), PROPORTIONAL_THRESHOLD.div_ceil(3) as u32);
    }

    #[test]
    fn test_chunk_group_capacity() {
        assert_eq!(chunk_group_capacity(3, 4), 12);
        assert_eq!(
            chunk_group_capacity(MAX_SHARD_SIZE, 4),
            PROPORTIONAL_THRESHOLD
        );
    }

    proptest! {
        #[test]
        fn prop_shard_size_positive_and_deterministic(size in any::<u64>(), data in 1usize..32) {
            let a = shard_size(size, data);
            let b = shard_size(size, data);
            prop_assert_eq!(a, b);
            prop_assert!(a >= 1);
            prop_assert!(a <= max_shard_size(data));
        }

        #[test]
        fn prop_one_group_covers_small_files(size in 1u64..=PROPORTIONAL_THRESHOLD, data in 1usize..32) {
            let s = shard_size(size, data);
            prop_assert!(chunk_group_capacity(s, data) >= size);
        }
    }
}
