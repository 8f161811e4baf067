/// Buffers the in-progress block and cuts incoming writes into full blocks.
///
/// The buffer is allocated once at `block_size` capacity and never grows.
/// Writes are absorbed in two phases through [`append`](Self::append): the
/// returned [`Append`] yields completed blocks, and only [`Append::commit`]
/// makes the new partial state permanent. An `Append` dropped without commit
/// leaves the accumulator exactly as it was.
#[derive(Debug)]
pub struct BlockAccumulator {
    buf: Vec<u8>,
    block_size: usize,
}

impl BlockAccumulator {
    pub fn new(block_size: usize) -> Self {
        Self {
            buf: Vec::with_capacity(block_size),
            block_size,
        }
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Bytes buffered for the block in progress.
    #[inline]
    pub fn current_length(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// True if appending `n` more bytes completes at least one block.
    #[inline]
    pub fn fills_block(&self, n: usize) -> bool {
        n >= self.block_size - self.buf.len()
    }

    /// Start absorbing `input`. See [`Append`].
    pub fn append<'a>(&'a mut self, input: &'a [u8]) -> Append<'a> {
        let restore_len = self.buf.len();
        Append {
            acc: self,
            input,
            consumed: 0,
            restore_len,
            started: false,
            committed: false,
        }
    }

    /// Remove the buffered partial block, leaving the accumulator empty.
    pub fn take_partial(&mut self) -> Option<Vec<u8>> {
        if self.buf.is_empty() {
            return None;
        }
        Some(std::mem::replace(
            &mut self.buf,
            Vec::with_capacity(self.block_size),
        ))
    }

    /// Put back a partial block obtained from [`take_partial`](Self::take_partial).
    pub fn restore_partial(&mut self, block: Vec<u8>) {
        debug_assert!(self.buf.is_empty());
        debug_assert!(block.len() < self.block_size);
        self.buf = block;
    }
}

/// An in-flight append.
///
/// Call [`next_block`](Self::next_block) until it returns `None`, then
/// [`commit`](Self::commit). The first block is coalesced in the
/// accumulator's buffer when a partial block was pending; every later block is
/// a slice of the caller's input.
#[derive(Debug)]
pub struct Append<'a> {
    acc: &'a mut BlockAccumulator,
    input: &'a [u8],
    consumed: usize,
    restore_len: usize,
    started: bool,
    committed: bool,
}

impl<'a> Append<'a> {
    /// The next full block, or `None` once fewer than `block_size` bytes remain.
    pub fn next_block(&mut self) -> Option<&[u8]> {
        let block_size = self.acc.block_size;
        if !self.started {
            self.started = true;
            if self.restore_len > 0 {
                let need = block_size - self.restore_len;
                if self.input.len() < need {
                    return None;
                }
                self.acc.buf.extend_from_slice(&self.input[..need]);
                self.consumed = need;
                return Some(self.acc.buf.as_slice());
            }
        }
        let input = self.input;
        let rest = &input[self.consumed..];
        if rest.len() < block_size {
            return None;
        }
        self.consumed += block_size;
        Some(&rest[..block_size])
    }

    /// Keep the tail of the input as the new partial block.
    pub fn commit(mut self) {
        if self.acc.buf.len() == self.acc.block_size {
            self.acc.buf.clear();
        }
        let rest = &self.input[self.consumed..];
        debug_assert!(self.acc.buf.len() + rest.len() < self.acc.block_size);
        self.acc.buf.extend_from_slice(rest);
        self.committed = true;
    }
}

impl Drop for Append<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.acc.buf.truncate(self.restore_len);
        }
    }
}
