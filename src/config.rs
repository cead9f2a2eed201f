// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{codec::Encoding, store::EventStore, CompressionType};
use std::path::{Path, PathBuf};

/// Smallest allowed uncompressed block size threshold (32 KiB)
pub const MIN_BLOCK_SIZE: u32 = 32 * 1_024;

/// Largest allowed uncompressed block size threshold (1 MiB)
pub const MAX_BLOCK_SIZE: u32 = 1_024 * 1_024;

/// Default uncompressed block size threshold (256 KiB)
pub const DEFAULT_BLOCK_SIZE: u32 = 256 * 1_024;

/// Default bloom filter false positive rate
pub const DEFAULT_BLOOM_FP_RATE: f32 = 0.05;

const DEFAULT_FILE_FOLDER: &str = ".spectre.data";

/// Store configuration builder
#[derive(Clone, Debug)]
pub struct Config {
    /// Data directory holding the hourly files
    #[doc(hidden)]
    pub path: PathBuf,

    /// Uncompressed byte threshold at which a block is sealed
    pub block_size: u32,

    /// Event record encoding of newly created files
    pub encoding: Encoding,

    /// Compression of newly created files
    pub compression: CompressionType,

    /// False positive rate of per-block bloom filters
    pub bloom_fp_rate: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: DEFAULT_FILE_FOLDER.into(),
            block_size: DEFAULT_BLOCK_SIZE,
            encoding: Encoding::Json,
            compression: CompressionType::Lz4,
            bloom_fp_rate: DEFAULT_BLOOM_FP_RATE,
        }
    }
}

impl Config {
    /// Initializes a new config
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().into(),
            ..Default::default()
        }
    }

    /// Sets the block size threshold.
    ///
    /// Defaults to 256 KiB.
    ///
    /// # Panics
    ///
    /// Panics if the block size is outside `[32 KiB, 1 MiB]`.
    #[must_use]
    pub fn block_size(mut self, block_size: u32) -> Self {
        assert!(block_size >= MIN_BLOCK_SIZE, "block size too small");
        assert!(block_size <= MAX_BLOCK_SIZE, "block size too large");

        self.block_size = block_size;
        self
    }

    /// Sets the event record encoding used for newly created files.
    ///
    /// Defaults to JSON. Existing files keep the encoding recorded
    /// in their header.
    #[must_use]
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Sets the compression used for newly created files.
    ///
    /// Defaults to LZ4.
    #[must_use]
    pub fn compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    /// Sets the bloom filter false positive rate.
    ///
    /// Defaults to 5%.
    ///
    /// # Panics
    ///
    /// Panics if the rate is not in `(0, 1)`.
    #[must_use]
    pub fn bloom_fp_rate(mut self, rate: f32) -> Self {
        assert!(rate > 0.0 && rate < 1.0, "invalid bloom false positive rate");

        self.bloom_fp_rate = rate;
        self
    }

    /// Opens an event store using this configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the data directory cannot be created.
    pub fn open(self) -> crate::Result<EventStore> {
        EventStore::open(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn config_defaults() {
        let config = Config::default();
        assert_eq!(DEFAULT_BLOCK_SIZE, config.block_size);
        assert_eq!(Encoding::Json, config.encoding);
        assert_eq!(CompressionType::Lz4, config.compression);
    }

    #[test]
    #[should_panic(expected = "block size too small")]
    fn config_rejects_tiny_blocks() {
        let _ = Config::default().block_size(1_024);
    }

    #[test]
    #[should_panic(expected = "block size too large")]
    fn config_rejects_huge_blocks() {
        let _ = Config::default().block_size(8 * 1_024 * 1_024);
    }

    #[test]
    #[should_panic(expected = "invalid bloom false positive rate")]
    fn config_rejects_bad_fp_rate() {
        let _ = Config::default().bloom_fp_rate(1.5);
    }
}
