use lz4::block::CompressionMode;
use xxhash_rust::xxh32::xxh32;

use crate::config::CompressionVariant;
use crate::error::{FrameError, Result};
use crate::format::{Method, CHECKSUM_SEED};

/// Compression level handed to LZ4 HC.
pub const DEFAULT_HC_LEVEL: i32 = 9;

/// Worst-case LZ4 block size for `n` input bytes (`LZ4_COMPRESSBOUND`).
///
/// Any valid LZ4 block, from either compressor, fits in this many bytes.
#[inline]
pub fn max_compressed_length(n: usize) -> usize {
    n + n / 255 + 16
}

/// XXH32 of `data` with an explicit seed.
#[inline]
pub fn hash32(data: &[u8], seed: u32) -> u32 {
    xxh32(data, seed)
}

/// XXH32 with the stream seed, as stored in frame headers.
#[inline]
pub fn block_checksum(data: &[u8]) -> u32 {
    hash32(data, CHECKSUM_SEED)
}

/// LZ4 at default acceleration, via `lz4_flex`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FastCompressor;

impl FastCompressor {
    pub fn compress(&self, raw: &[u8]) -> Vec<u8> {
        lz4_flex::block::compress(raw)
    }
}

/// LZ4 HC via the `lz4` bindings.
#[derive(Debug, Clone, Copy)]
pub struct HighCompressor {
    pub level: i32,
}

impl Default for HighCompressor {
    fn default() -> Self {
        Self {
            level: DEFAULT_HC_LEVEL,
        }
    }
}

impl HighCompressor {
    pub fn compress(&self, raw: &[u8]) -> Result<Vec<u8>> {
        lz4::block::compress(raw, Some(CompressionMode::HIGHCOMPRESSION(self.level)), false)
            .map_err(|e| FrameError::Compression(format!("lz4hc: {}", e)))
    }
}

/// The compressor a stream was built with.
///
/// Both variants emit plain LZ4 blocks, so a single decoder reads either.
#[derive(Debug, Clone, Copy)]
pub enum Compressor {
    Fast(FastCompressor),
    High(HighCompressor),
    /// Returns whatever the function returns, for exercising encoder edge cases.
    #[cfg(test)]
    Scripted(fn(&[u8]) -> Result<Vec<u8>>),
}

impl Compressor {
    pub fn for_variant(variant: CompressionVariant) -> Self {
        match variant {
            CompressionVariant::Fast => Compressor::Fast(FastCompressor),
            CompressionVariant::High => Compressor::High(HighCompressor::default()),
        }
    }

    /// Method recorded in the token when this compressor's output is kept.
    pub fn method(&self) -> Method {
        match self {
            Compressor::Fast(_) => Method::Lz4Fast,
            Compressor::High(_) => Method::Lz4High,
            #[cfg(test)]
            Compressor::Scripted(_) => Method::Lz4Fast,
        }
    }

    /// Compress a single independent block.
    pub fn compress(&self, raw: &[u8]) -> Result<Vec<u8>> {
        match self {
            Compressor::Fast(c) => Ok(c.compress(raw)),
            Compressor::High(c) => c.compress(raw),
            #[cfg(test)]
            Compressor::Scripted(f) => f(raw),
        }
    }
}

/// Recover the original block from a stored payload.
pub fn decompress_block(method: Method, payload: &[u8], decompressed_len: usize) -> Result<Vec<u8>> {
    let raw = match method {
        Method::Raw => payload.to_vec(),
        Method::Lz4Fast | Method::Lz4High => lz4_flex::block::decompress(payload, decompressed_len)
            .map_err(|e| FrameError::Decompression(format!("{}: {}", method.name(), e)))?,
    };
    if raw.len() != decompressed_len {
        return Err(FrameError::Decompression(format!(
            "block decompressed to {} bytes but header says {}",
            raw.len(),
            decompressed_len
        )));
    }
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noise(len: usize) -> Vec<u8> {
        let mut rng = 0x9e37_79b9_7f4a_7c15u64;
        (0..len)
            .map(|_| {
                rng = rng
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                (rng >> 56) as u8
            })
            .collect()
    }

    #[test]
    fn bound_holds_for_incompressible_input() {
        for len in [1usize, 15, 16, 255, 4096, 65536] {
            let data = noise(len);
            let bound = max_compressed_length(len);
            let fast = FastCompressor.compress(&data);
            let high = HighCompressor::default().compress(&data).unwrap();
            assert!(fast.len() <= bound, "lz4 {} > {} at {}", fast.len(), bound, len);
            assert!(high.len() <= bound, "lz4hc {} > {} at {}", high.len(), bound, len);
        }
    }

    #[test]
    fn bound_matches_lz4_compressbound() {
        assert_eq!(max_compressed_length(0), 16);
        assert_eq!(max_compressed_length(255), 272);
        assert_eq!(max_compressed_length(65536), 65536 + 257 + 16);
    }

    #[test]
    fn both_variants_decode_with_one_decoder() {
        let data = b"abcabcabcabcabcabcabcabcabcabcabcabcabcabc".repeat(20);
        for c in [
            Compressor::for_variant(CompressionVariant::Fast),
            Compressor::for_variant(CompressionVariant::High),
        ] {
            let packed = c.compress(&data).unwrap();
            assert!(packed.len() < data.len());
            let out = decompress_block(c.method(), &packed, data.len()).unwrap();
            assert_eq!(out, data);
        }
    }

    #[test]
    fn wrong_length_is_a_decompression_error() {
        let data = vec![7u8; 1000];
        let packed = FastCompressor.compress(&data);
        let err = decompress_block(Method::Lz4Fast, &packed, 999).unwrap_err();
        assert!(matches!(err, FrameError::Decompression(_)));
    }
}
