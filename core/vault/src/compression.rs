//! Optional zlib compression of the plaintext before encryption.

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use tracing::{debug, warn};

use aethervault_common::{Error, Result};

/// Highest zlib level.
pub const MAX_LEVEL: u32 = 9;

/// Default upper bound for decompressed output (1 GiB).
pub const DEFAULT_MAX_DECOMPRESSED_LEN: usize = 1 << 30;

/// Compression settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Try compressing before encryption.
    pub enabled: bool,
    /// zlib level, 0 to 9.
    pub level: u32,
    /// Refuse to inflate beyond this many bytes.
    pub max_decompressed_len: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: MAX_LEVEL,
            max_decompressed_len: DEFAULT_MAX_DECOMPRESSED_LEN,
        }
    }
}

/// Compression stage of the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct Compressor {
    config: CompressionConfig,
}

impl Compressor {
    /// Create a compressor.
    ///
    /// # Errors
    /// - `InvalidInput` if the level is above 9
    pub fn new(config: CompressionConfig) -> Result<Self> {
        if config.level > MAX_LEVEL {
            return Err(Error::InvalidInput(format!(
                "Compression level {} out of range 0..={}",
                config.level, MAX_LEVEL
            )));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    /// Compress `data` if that makes it strictly smaller.
    ///
    /// Returns the bytes to encrypt and whether they are compressed. Any
    /// compressor fault falls back to the original bytes.
    pub fn maybe_compress(&self, data: &[u8]) -> (Vec<u8>, bool) {
        if !self.config.enabled {
            return (data.to_vec(), false);
        }

        match deflate(data, self.config.level) {
            Ok(compressed) if compressed.len() < data.len() => {
                debug!(
                    original = data.len(),
                    compressed = compressed.len(),
                    "Compression applied"
                );
                (compressed, true)
            }
            Ok(_) => {
                debug!(original = data.len(), "Compression skipped, no gain");
                (data.to_vec(), false)
            }
            Err(e) => {
                warn!(error = %e, "Compression failed, storing uncompressed");
                (data.to_vec(), false)
            }
        }
    }

    /// Undo [`maybe_compress`](Self::maybe_compress).
    ///
    /// # Errors
    /// - `Format` if the stream is malformed or inflates past the limit
    pub fn decompress_if_needed(&self, data: &[u8], was_compressed: bool) -> Result<Vec<u8>> {
        if !was_compressed {
            return Ok(data.to_vec());
        }

        let limit = self.config.max_decompressed_len;
        let mut out = Vec::new();
        ZlibDecoder::new(data)
            .take(limit as u64 + 1)
            .read_to_end(&mut out)
            .map_err(|e| Error::Format(format!("Decompression failed: {}", e)))?;

        if out.len() > limit {
            return Err(Error::Format(format!(
                "Decompressed data exceeds limit of {} bytes",
                limit
            )));
        }
        Ok(out)
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self {
            config: CompressionConfig::default(),
        }
    }
}

fn deflate(data: &[u8], level: u32) -> std::io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level));
    encoder.write_all(data)?;
    encoder.finish()
}

/// [`Compressor::maybe_compress`] with default settings.
pub fn maybe_compress(data: &[u8]) -> (Vec<u8>, bool) {
    Compressor::default().maybe_compress(data)
}

/// [`Compressor::decompress_if_needed`] with default settings.
pub fn decompress_if_needed(data: &[u8], was_compressed: bool) -> Result<Vec<u8>> {
    Compressor::default().decompress_if_needed(data, was_compressed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_compressible_data_shrinks() {
        let data = b"abcabcabc".repeat(500);
        let (out, compressed) = maybe_compress(&data);

        assert!(compressed);
        assert!(out.len() < data.len());
        assert_eq!(decompress_if_needed(&out, true).unwrap(), data);
    }

    #[test]
    fn test_empty_input() {
        let (out, compressed) = maybe_compress(&[]);
        assert!(!compressed);
        assert!(out.is_empty());
        assert!(decompress_if_needed(&out, compressed).unwrap().is_empty());
    }

    #[test]
    fn test_tiny_input_stays_raw() {
        let (out, compressed) = maybe_compress(b"x");
        assert!(!compressed);
        assert_eq!(out, b"x");
    }

    #[test]
    fn test_disabled_never_compresses() {
        let compressor = Compressor::new(CompressionConfig {
            enabled: false,
            ..CompressionConfig::default()
        })
        .unwrap();
        let data = vec![0u8; 4096];

        let (out, compressed) = compressor.maybe_compress(&data);
        assert!(!compressed);
        assert_eq!(out, data);
    }

    #[test]
    fn test_malformed_stream_is_format_error() {
        let err = decompress_if_needed(b"not zlib at all", true).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn test_decompression_limit() {
        let compressor = Compressor::new(CompressionConfig {
            max_decompressed_len: 1024,
            ..CompressionConfig::default()
        })
        .unwrap();
        let (bomb, compressed) = compressor.maybe_compress(&vec![0u8; 100_000]);
        assert!(compressed);

        let err = compressor.decompress_if_needed(&bomb, true).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn test_limit_is_inclusive() {
        let compressor = Compressor::new(CompressionConfig {
            max_decompressed_len: 2048,
            ..CompressionConfig::default()
        })
        .unwrap();
        let data = vec![7u8; 2048];
        let (packed, _) = compressor.maybe_compress(&data);

        assert_eq!(compressor.decompress_if_needed(&packed, true).unwrap(), data);
    }

    #[test]
    fn test_invalid_level_rejected() {
        let result = Compressor::new(CompressionConfig {
            level: 12,
            ..CompressionConfig::default()
        });
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    proptest! {
        #[test]
        fn prop_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let (out, compressed) = maybe_compress(&data);
            prop_assert!(out.len() <= data.len());
            prop_assert_eq!(decompress_if_needed(&out, compressed).unwrap(), data);
        }
    }
}
