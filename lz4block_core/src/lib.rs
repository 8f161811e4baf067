//! Streaming LZ4 block framer.
//!
//! Bytes written to a [`FrameWriter`] are cut into fixed-size blocks, each
//! block is LZ4-compressed on its own, and each result (or the raw block when
//! compression does not help) is wrapped in a self-describing `LZ4Block`
//! frame and handed to a [`FrameSink`]. [`FrameReader`] is the inverse.
//!
//! ```
//! use lz4block_core::{Bytes, EncoderConfig, FrameReader, FrameWriter};
//!
//! let mut frames: Vec<Bytes> = Vec::new();
//! let mut writer = FrameWriter::new(&mut frames, EncoderConfig::default())?;
//! writer.write(b"hello, frames")?;
//! writer.close()?;
//!
//! let stream: Vec<u8> = frames.concat();
//! let data = FrameReader::new(stream.as_slice()).read_all()?;
//! assert_eq!(data, b"hello, frames");
//! # Ok::<(), lz4block_core::FrameError>(())
//! ```

pub mod accumulator;
pub mod codec;
pub mod config;
pub mod encoder;
pub mod error;
pub mod format;
pub mod reader;
pub mod sink;
pub mod sizing;
pub mod writer;

pub use bytes::Bytes;

pub use accumulator::BlockAccumulator;
pub use codec::{Compressor, FastCompressor, HighCompressor};
pub use config::{CompressionVariant, EncoderConfig, Placement};
pub use encoder::{EncodedFrame, FrameEncoder};
pub use error::{FrameError, Result};
pub use format::{FrameHeader, Method, HEADER_SIZE, MAGIC};
pub use reader::{DecodedFrame, FrameReader};
pub use sink::{FrameSink, IoSink};
pub use sizing::{BufferSizingPolicy, ScratchBuffer};
pub use writer::{EncoderStats, FrameWriter, StreamState};
