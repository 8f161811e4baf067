use serde::{Deserialize, Serialize};

use crate::error::{FrameError, Result};
use crate::format::{
    DEFAULT_BLOCK_SIZE, FLAG_CONTENT_CHECKSUM, FLAG_STORED_CHECKSUM, HEADER_SIZE, MAX_BLOCK_SIZE,
    MIN_BLOCK_SIZE, STORED_CHECKSUM_SIZE,
};

/// Which LZ4 compressor a stream uses. Fixed for the lifetime of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionVariant {
    /// LZ4 default acceleration. Fastest, moderate ratio.
    #[default]
    Fast,
    /// LZ4 HC. Slower to compress, same decode speed, smaller frames.
    High,
}

/// Where scratch output buffers live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    /// Page-granular allocations, meant to be handed straight to I/O.
    #[default]
    Direct,
    /// Exact-size heap allocations.
    Heap,
}

impl Placement {
    pub fn from_preference(prefer_direct: bool) -> Self {
        if prefer_direct {
            Placement::Direct
        } else {
            Placement::Heap
        }
    }

    pub fn is_direct(self) -> bool {
        self == Placement::Direct
    }
}

/// Constructor-time settings for a [`FrameWriter`](crate::FrameWriter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Raw bytes per block; the final block of a flush may be smaller.
    pub block_size: usize,
    pub variant: CompressionVariant,
    /// Store XXH32 of each decompressed block in its header.
    pub checksum: bool,
    /// Also store XXH32 of the payload as written.
    pub stored_checksum: bool,
    pub placement: Placement,
    /// Upper bound on a single scratch buffer, in bytes.
    pub max_encode_size: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            variant: CompressionVariant::Fast,
            checksum: true,
            stored_checksum: false,
            placement: Placement::Direct,
            max_encode_size: i32::MAX as usize,
        }
    }
}

impl EncoderConfig {
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_variant(mut self, variant: CompressionVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn with_checksum(mut self, enabled: bool) -> Self {
        self.checksum = enabled;
        self
    }

    pub fn with_stored_checksum(mut self, enabled: bool) -> Self {
        self.stored_checksum = enabled;
        self
    }

    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    pub fn with_max_encode_size(mut self, max_encode_size: usize) -> Self {
        self.max_encode_size = max_encode_size;
        self
    }

    /// Check ranges. Called by [`FrameWriter::new`](crate::FrameWriter::new).
    pub fn validate(&self) -> Result<()> {
        if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&self.block_size) {
            return Err(FrameError::InvalidConfig(format!(
                "block_size {} outside [{}, {}]",
                self.block_size, MIN_BLOCK_SIZE, MAX_BLOCK_SIZE
            )));
        }
        if self.max_encode_size == 0 {
            return Err(FrameError::InvalidConfig(
                "max_encode_size must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Token flags every frame of this stream carries.
    pub fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.checksum {
            flags |= FLAG_CONTENT_CHECKSUM;
        }
        if self.stored_checksum {
            flags |= FLAG_STORED_CHECKSUM;
        }
        flags
    }

    /// Header bytes per frame for this configuration.
    pub fn header_size(&self) -> usize {
        if self.stored_checksum {
            HEADER_SIZE + STORED_CHECKSUM_SIZE
        } else {
            HEADER_SIZE
        }
    }
}
