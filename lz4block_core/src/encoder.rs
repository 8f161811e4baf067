use bytes::Bytes;

use crate::codec::{block_checksum, max_compressed_length, Compressor};
use crate::config::EncoderConfig;
use crate::error::{FrameError, Result};
use crate::format::{FrameHeader, Method, FLAG_STORED_CHECKSUM};
use crate::sizing::ScratchBuffer;

/// A serialized frame together with its decoded header.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub header: FrameHeader,
    pub bytes: Bytes,
}

/// Turns one block into one frame.
///
/// The encoder is stateless between blocks: each block is compressed on its
/// own, and the compressed form is kept only if it is strictly smaller than
/// the block. Otherwise the block is stored raw, so a frame's payload is
/// never longer than its input.
#[derive(Debug, Clone)]
pub struct FrameEncoder {
    compressor: Compressor,
    checksum: bool,
    flags: u8,
}

impl FrameEncoder {
    pub fn new(config: &EncoderConfig) -> Self {
        Self::with_compressor(Compressor::for_variant(config.variant), config)
    }

    pub fn with_compressor(compressor: Compressor, config: &EncoderConfig) -> Self {
        Self {
            compressor,
            checksum: config.checksum,
            flags: config.flags(),
        }
    }

    /// Encode `block` into `out`.
    pub fn encode(&self, block: &[u8], out: &mut ScratchBuffer) -> Result<EncodedFrame> {
        debug_assert!(!block.is_empty(), "empty blocks are never framed");

        let checksum = if self.checksum { block_checksum(block) } else { 0 };
        let candidate = self.compressor.compress(block)?;

        let bound = max_compressed_length(block.len());
        if candidate.len() > bound {
            return Err(FrameError::CompressionBoundViolation {
                compressed: candidate.len(),
                bound,
            });
        }

        // Equal length is no gain: keep the raw block.
        let (method, payload) = if candidate.len() < block.len() {
            (self.compressor.method(), candidate.as_slice())
        } else {
            (Method::Raw, block)
        };

        let header = FrameHeader {
            method,
            flags: self.flags,
            compressed_len: payload.len() as u32,
            decompressed_len: block.len() as u32,
            checksum,
            stored_checksum: if self.flags & FLAG_STORED_CHECKSUM != 0 {
                block_checksum(payload)
            } else {
                0
            },
        };
        let bytes = out.put_frame(&header, payload)?;
        Ok(EncodedFrame { header, bytes })
    }

    /// Encode the end-of-stream marker into `out`.
    pub fn encode_terminal(&self, out: &mut ScratchBuffer) -> Result<EncodedFrame> {
        let header = FrameHeader::terminal(self.flags);
        let bytes = out.put_frame(&header, &[])?;
        Ok(EncodedFrame { header, bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Placement;
    use crate::format::HEADER_SIZE;
    use crate::sizing::BufferSizingPolicy;

    fn scratch(len: usize) -> ScratchBuffer {
        BufferSizingPolicy::new(&EncoderConfig::default())
            .size_for(len, 0, Placement::Heap)
            .unwrap()
    }

    fn scripted(f: fn(&[u8]) -> Result<Vec<u8>>) -> FrameEncoder {
        FrameEncoder::with_compressor(Compressor::Scripted(f), &EncoderConfig::default())
    }

    #[test]
    fn equal_length_candidate_is_stored_raw() {
        let enc = scripted(|raw| Ok(vec![0xAA; raw.len()]));
        let block = b"sixteen byte blk";
        let frame = enc.encode(block, &mut scratch(block.len())).unwrap();
        assert_eq!(frame.header.method, Method::Raw);
        assert_eq!(frame.header.compressed_len, 16);
        assert_eq!(&frame.bytes[HEADER_SIZE..], &block[..]);
    }

    #[test]
    fn one_byte_shorter_candidate_is_kept() {
        let enc = scripted(|raw| Ok(vec![0xAA; raw.len() - 1]));
        let block = b"sixteen byte blk";
        let frame = enc.encode(block, &mut scratch(block.len())).unwrap();
        assert_eq!(frame.header.method, Method::Lz4Fast);
        assert_eq!(frame.header.compressed_len, 15);
        assert_eq!(frame.header.decompressed_len, 16);
    }

    #[test]
    fn candidate_over_bound_is_rejected() {
        let enc = scripted(|raw| Ok(vec![0; max_compressed_length(raw.len()) + 1]));
        let err = enc.encode(&[1u8; 100], &mut scratch(100)).unwrap_err();
        assert!(matches!(
            err,
            FrameError::CompressionBoundViolation { compressed: 117, bound: 116 }
        ));
    }

    #[test]
    fn compressor_failure_is_propagated() {
        let enc = scripted(|_| Err(FrameError::Compression("level out of range".into())));
        let mut out = scratch(10);
        let err = enc.encode(&[1u8; 10], &mut out).unwrap_err();
        assert!(matches!(err, FrameError::Compression(_)));
        // Nothing was serialized.
        assert_eq!(out.writable_bytes(), max_compressed_length(10) + HEADER_SIZE);
    }
}
