use bytes::BufMut;
use serde::Serialize;

use crate::error::{FrameError, Result};

/// Magic bytes opening every frame, including the terminal marker.
pub const MAGIC: &[u8; 8] = b"LZ4Block";

/// Fixed header size when no stored-payload checksum is present.
///   magic[8] + token:u8 + compressed_len:u32 + decompressed_len:u32
///   + checksum:u32
///   = 8 + 1 + 4 + 4 + 4 = 21
pub const HEADER_SIZE: usize = 21;

/// Extra header bytes carried when [`FLAG_STORED_CHECKSUM`] is set.
pub const STORED_CHECKSUM_SIZE: usize = 4;

/// Largest header this format can produce.
pub const MAX_HEADER_SIZE: usize = HEADER_SIZE + STORED_CHECKSUM_SIZE;

/// Default block size: 64 KB.
pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;

/// Smallest accepted block size.
pub const MIN_BLOCK_SIZE: usize = 64;

/// Largest accepted block size: 32 MB.
pub const MAX_BLOCK_SIZE: usize = 32 * 1024 * 1024;

/// Seed for every XXH32 checksum in the stream.
pub const CHECKSUM_SEED: u32 = 0x9747_b28c;

// ── Token ──────────────────────────────────────────────────────────────────

/// High nibble of the token: compression method.
pub const METHOD_MASK: u8 = 0xF0;

/// Low nibble of the token: checksum-presence flags.
pub const FLAGS_MASK: u8 = 0x0F;

/// The checksum field holds XXH32 of the decompressed block.
pub const FLAG_CONTENT_CHECKSUM: u8 = 1 << 0;

/// A second checksum, over the payload as stored, follows the content checksum.
pub const FLAG_STORED_CHECKSUM: u8 = 1 << 1;

/// How a frame's payload is stored.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Method {
    /// Payload is the original block, byte for byte.
    Raw = 0x10,
    /// LZ4 block produced by the fast compressor.
    Lz4Fast = 0x20,
    /// LZ4 block produced by the high-compression compressor.
    Lz4High = 0x30,
}

impl Method {
    /// Extract the method from a token byte.
    pub fn from_token(token: u8) -> Result<Self> {
        match token & METHOD_MASK {
            0x10 => Ok(Method::Raw),
            0x20 => Ok(Method::Lz4Fast),
            0x30 => Ok(Method::Lz4High),
            _ => Err(FrameError::UnknownMethod(token & METHOD_MASK)),
        }
    }

    pub fn is_compressed(self) -> bool {
        self != Method::Raw
    }

    pub fn name(self) -> &'static str {
        match self {
            Method::Raw => "raw",
            Method::Lz4Fast => "lz4",
            Method::Lz4High => "lz4hc",
        }
    }
}

/// Header length implied by a token byte.
pub fn header_len(token: u8) -> usize {
    if token & FLAG_STORED_CHECKSUM != 0 {
        MAX_HEADER_SIZE
    } else {
        HEADER_SIZE
    }
}

// ── Header ─────────────────────────────────────────────────────────────────

/// Decoded representation of a frame header.
///
/// A header whose two length fields are both zero is the terminal marker.
/// Data frames never carry an empty payload, so the pattern is unambiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameHeader {
    pub method: Method,
    /// Checksum-presence flags (low nibble of the token).
    pub flags: u8,
    /// Length of the stored payload in bytes.
    pub compressed_len: u32,
    /// Length of the original block in bytes.
    pub decompressed_len: u32,
    /// XXH32 of the original block, or zero when content checksums are off.
    pub checksum: u32,
    /// XXH32 of the stored payload. Only on the wire with [`FLAG_STORED_CHECKSUM`].
    pub stored_checksum: u32,
}

impl FrameHeader {
    /// The end-of-stream marker for a stream using `flags`.
    pub fn terminal(flags: u8) -> Self {
        Self {
            method: Method::Raw,
            flags: flags & FLAGS_MASK,
            compressed_len: 0,
            decompressed_len: 0,
            checksum: 0,
            stored_checksum: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.compressed_len == 0 && self.decompressed_len == 0
    }

    pub fn token(&self) -> u8 {
        self.method as u8 | (self.flags & FLAGS_MASK)
    }

    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }

    /// Bytes this header occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        header_len(self.token())
    }

    /// Serialize into `dst`, writing exactly [`encoded_len`](Self::encoded_len) bytes.
    pub fn write_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_slice(MAGIC);
        dst.put_u8(self.token());
        dst.put_u32_le(self.compressed_len);
        dst.put_u32_le(self.decompressed_len);
        dst.put_u32_le(self.checksum);
        if self.has_flag(FLAG_STORED_CHECKSUM) {
            dst.put_u32_le(self.stored_checksum);
        }
    }

    /// Deserialize from the front of `buf`, checking the magic.
    ///
    /// `buf` must hold at least [`header_len`] bytes for the token it carries.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(FrameError::CorruptHeader(format!(
                "need {} header bytes, have {}",
                HEADER_SIZE,
                buf.len()
            )));
        }
        if &buf[..8] != MAGIC {
            return Err(FrameError::InvalidMagic);
        }
        let token = buf[8];
        let method = Method::from_token(token)?;
        let len = header_len(token);
        if buf.len() < len {
            return Err(FrameError::CorruptHeader(format!(
                "need {} header bytes, have {}",
                len,
                buf.len()
            )));
        }
        let stored_checksum = if len == MAX_HEADER_SIZE {
            read_u32_le(&buf[21..25])
        } else {
            0
        };
        Ok(Self {
            method,
            flags: token & FLAGS_MASK,
            compressed_len: read_u32_le(&buf[9..13]),
            decompressed_len: read_u32_le(&buf[13..17]),
            checksum: read_u32_le(&buf[17..21]),
            stored_checksum,
        })
    }
}

fn read_u32_le(b: &[u8]) -> u32 {
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}
