use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::max_compressed_length;
use crate::config::{EncoderConfig, Placement};
use crate::error::{FrameError, Result};
use crate::format::FrameHeader;

/// Granularity of [`Placement::Direct`] allocations.
pub const PAGE_SIZE: usize = 4096;

/// Computes how much output space a call can need in the worst case.
///
/// Every full block is budgeted at `max_compressed_length(block_size)` plus a
/// header, and a trailing partial block at `max_compressed_length(rem)` plus a
/// header. A call that can emit nothing is still given room for one header, so
/// a sized buffer always has writable space.
#[derive(Debug, Clone, Copy)]
pub struct BufferSizingPolicy {
    block_size: usize,
    header_size: usize,
    max_encode_size: usize,
}

impl BufferSizingPolicy {
    pub fn new(config: &EncoderConfig) -> Self {
        Self {
            block_size: config.block_size,
            header_size: config.header_size(),
            max_encode_size: config.max_encode_size,
        }
    }

    /// Worst-case output bytes for `pending` new bytes on top of `buffered` ones.
    pub fn capacity_for(&self, pending: usize, buffered: usize) -> Result<usize> {
        Ok(self.frames_capacity(pending, buffered)?.max(self.header_size))
    }

    /// Scratch buffer for a write or flush.
    pub fn size_for(&self, pending: usize, buffered: usize, placement: Placement) -> Result<ScratchBuffer> {
        let capacity = self.capacity_for(pending, buffered)?;
        self.allocate(capacity, placement)
    }

    /// Scratch buffer for a close: the flushed partial plus the terminal marker.
    pub fn size_for_close(&self, buffered: usize, placement: Placement) -> Result<ScratchBuffer> {
        let capacity = self
            .frames_capacity(0, buffered)?
            .checked_add(self.header_size)
            .ok_or_else(|| self.too_large(usize::MAX))?;
        self.allocate(capacity, placement)
    }

    fn frames_capacity(&self, pending: usize, buffered: usize) -> Result<usize> {
        let total = pending
            .checked_add(buffered)
            .ok_or_else(|| self.too_large(usize::MAX))?;
        let full_blocks = total / self.block_size;
        let remainder = total % self.block_size;

        let per_block = max_compressed_length(self.block_size) + self.header_size;
        let mut capacity = full_blocks
            .checked_mul(per_block)
            .ok_or_else(|| self.too_large(usize::MAX))?;
        if remainder > 0 {
            capacity = capacity
                .checked_add(max_compressed_length(remainder) + self.header_size)
                .ok_or_else(|| self.too_large(usize::MAX))?;
        }
        Ok(capacity)
    }

    fn allocate(&self, capacity: usize, placement: Placement) -> Result<ScratchBuffer> {
        if capacity > self.max_encode_size {
            return Err(self.too_large(capacity));
        }
        let capacity = match placement {
            Placement::Heap => capacity,
            Placement::Direct => capacity
                .div_ceil(PAGE_SIZE)
                .checked_mul(PAGE_SIZE)
                .ok_or_else(|| self.too_large(capacity))?,
        };
        Ok(ScratchBuffer {
            buf: BytesMut::with_capacity(capacity),
            placement,
        })
    }

    fn too_large(&self, requested: usize) -> FrameError {
        FrameError::AllocationFailure {
            requested,
            limit: self.max_encode_size,
        }
    }
}

/// Output space for the frames of one call.
///
/// Each frame is split off as its own [`Bytes`] handle; the remaining
/// capacity is released when the buffer is dropped at the end of the call.
#[derive(Debug)]
pub struct ScratchBuffer {
    buf: BytesMut,
    placement: Placement,
}

impl ScratchBuffer {
    pub fn placement(&self) -> Placement {
        self.placement
    }

    pub fn is_direct(&self) -> bool {
        self.placement.is_direct()
    }

    pub fn writable_bytes(&self) -> usize {
        self.buf.capacity() - self.buf.len()
    }

    /// Serialize one frame and hand it out as an owned buffer.
    pub fn put_frame(&mut self, header: &FrameHeader, payload: &[u8]) -> Result<Bytes> {
        let needed = header.encoded_len() + payload.len();
        let available = self.writable_bytes();
        if needed > available {
            return Err(FrameError::FrameOverflow { needed, available });
        }
        header.write_to(&mut self.buf);
        self.buf.put_slice(payload);
        Ok(self.buf.split().freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{DEFAULT_BLOCK_SIZE, HEADER_SIZE};

    fn policy() -> BufferSizingPolicy {
        BufferSizingPolicy::new(&EncoderConfig::default())
    }

    #[test]
    fn sub_block_input_gets_one_frame() {
        let cap = policy().capacity_for(DEFAULT_BLOCK_SIZE - 13, 0).unwrap();
        assert_eq!(cap, max_compressed_length(DEFAULT_BLOCK_SIZE - 13) + HEADER_SIZE);
    }

    #[test]
    fn multi_block_input_counts_full_and_partial_blocks() {
        let per_block = max_compressed_length(DEFAULT_BLOCK_SIZE) + HEADER_SIZE;
        let cap = policy().capacity_for(DEFAULT_BLOCK_SIZE * 5, 0).unwrap();
        assert_eq!(cap, 5 * per_block);

        let cap = policy().capacity_for(DEFAULT_BLOCK_SIZE * 2, 100).unwrap();
        assert_eq!(cap, 2 * per_block + max_compressed_length(100) + HEADER_SIZE);
    }

    #[test]
    fn empty_input_still_has_room() {
        assert_eq!(policy().capacity_for(0, 0).unwrap(), HEADER_SIZE);
    }

    #[test]
    fn direct_buffers_are_page_rounded() {
        let scratch = policy().size_for(10, 0, Placement::Direct).unwrap();
        assert!(scratch.is_direct());
        assert_eq!(scratch.writable_bytes(), PAGE_SIZE);

        let scratch = policy().size_for(10, 0, Placement::Heap).unwrap();
        assert!(!scratch.is_direct());
        assert_eq!(scratch.writable_bytes(), max_compressed_length(10) + HEADER_SIZE);
    }

    #[test]
    fn limit_is_enforced() {
        let config = EncoderConfig::default().with_max_encode_size(1024);
        let policy = BufferSizingPolicy::new(&config);
        let err = policy.size_for(DEFAULT_BLOCK_SIZE, 0, Placement::Heap).unwrap_err();
        assert!(matches!(err, FrameError::AllocationFailure { limit: 1024, .. }));
    }

    #[test]
    fn overflowing_input_is_an_allocation_failure() {
        let err = policy().capacity_for(usize::MAX, 1).unwrap_err();
        assert!(matches!(err, FrameError::AllocationFailure { .. }));
    }

    #[test]
    fn frame_that_does_not_fit_is_rejected() {
        let mut scratch = policy().size_for(0, 0, Placement::Heap).unwrap();
        let header = FrameHeader::terminal(0);
        let err = scratch.put_frame(&header, &[0u8; 8]).unwrap_err();
        assert!(matches!(err, FrameError::FrameOverflow { needed: 29, available: 21 }));
        assert!(scratch.put_frame(&header, &[]).is_ok());
    }
}
