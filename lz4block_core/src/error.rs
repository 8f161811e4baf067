//! Error type shared by the encoder and the reader.

use std::io;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FrameError>;

/// Everything that can go wrong while framing or unframing a stream.
///
/// Encoder errors are fatal for the call that raised them but never leave the
/// writer half-updated; see [`FrameWriter`](crate::FrameWriter) for the exact
/// guarantees. Only [`FrameError::StreamFinished`] is expected in normal use.
#[derive(Error, Debug)]
pub enum FrameError {
    // Encoder errors
    #[error("stream already finished")]
    StreamFinished,

    #[error("cannot allocate a {requested} byte output buffer (limit {limit})")]
    AllocationFailure { requested: usize, limit: usize },

    #[error("compressed block of {compressed} bytes exceeds the LZ4 bound of {bound}")]
    CompressionBoundViolation { compressed: usize, bound: usize },

    #[error("compression failed: {0}")]
    Compression(String),

    #[error("frame of {needed} bytes does not fit in {available} writable bytes")]
    FrameOverflow { needed: usize, available: usize },

    #[error("sink rejected frame")]
    SinkRejection(#[source] io::Error),

    #[error("invalid encoder config: {0}")]
    InvalidConfig(String),

    // Reader errors
    #[error("invalid frame magic: not an LZ4Block stream")]
    InvalidMagic,

    #[error("unknown compression method {0:#04x}")]
    UnknownMethod(u8),

    #[error("corrupt frame header: {0}")]
    CorruptHeader(String),

    #[error("{kind} checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        kind: &'static str,
        expected: u32,
        actual: u32,
    },

    #[error("decompression failed: {0}")]
    Decompression(String),

    #[error("stream ended without a terminal marker")]
    MissingTerminal,

    #[error(transparent)]
    Io(#[from] io::Error),
}
