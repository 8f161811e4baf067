use std::io;

use tracing::{debug, trace, warn};

use crate::accumulator::BlockAccumulator;
use crate::config::EncoderConfig;
use crate::encoder::{EncodedFrame, FrameEncoder};
use crate::error::{FrameError, Result};
use crate::format::FrameHeader;
use crate::sink::FrameSink;
use crate::sizing::{BufferSizingPolicy, ScratchBuffer};

/// Where a [`FrameWriter`] is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Accepting writes.
    Open,
    /// Inside a flush or close. Only held for the duration of that call.
    Flushing,
    /// Terminal marker emitted; every further call fails.
    Closed,
    /// The sink rejected a frame. Bytes already taken from the accumulator
    /// never reached it, so the stream can neither continue nor be closed.
    Failed,
}

/// Running totals for one stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncoderStats {
    /// Data frames forwarded (the terminal marker is not counted).
    pub frames: u64,
    /// Data frames whose payload is LZ4 rather than raw.
    pub compressed_frames: u64,
    /// Bytes accepted by `write`.
    pub bytes_written: u64,
    /// Sum of the decompressed lengths of forwarded frames.
    pub bytes_framed: u64,
    /// Frame bytes forwarded, headers included.
    pub bytes_out: u64,
}

impl EncoderStats {
    fn record(&mut self, header: &FrameHeader, frame_len: usize) {
        self.bytes_out += frame_len as u64;
        if header.is_terminal() {
            return;
        }
        self.frames += 1;
        if header.method.is_compressed() {
            self.compressed_frames += 1;
        }
        self.bytes_framed += header.decompressed_len as u64;
    }
}

/// Streaming block framer.
///
/// # Write contract
/// Call [`write`](Self::write) any number of times with arbitrary-sized
/// slices. Every time `block_size` bytes have been gathered the block is
/// compressed and its frame forwarded to the sink immediately.
/// [`flush`](Self::flush) frames whatever partial block is buffered.
/// [`close`](Self::close) flushes, emits the terminal marker, and closes the
/// stream for good.
///
/// # Stream layout produced
/// ```text
/// [FRAME 0] [FRAME 1] ... [FRAME N-1] [TERMINAL]
/// FRAME    = magic "LZ4Block" | token | clen | dlen | xxh32 [| stored xxh32] | payload
/// TERMINAL = magic "LZ4Block" | token | 0    | 0    | 0     [| 0]
/// ```
///
/// # Threading
/// A writer is owned by one caller and driven through `&mut self`; there is
/// no internal locking. Share it across threads only behind the caller's own
/// mutex.
///
/// # Failure
/// Compression and allocation failures leave the buffered block exactly as it
/// was before the call. A sink rejection happens after the writer's state was
/// updated: the frames already accepted stay accepted, the writer moves to
/// [`StreamState::Failed`], and every later call returns
/// [`FrameError::StreamFinished`].
pub struct FrameWriter<S: FrameSink> {
    sink: S,
    config: EncoderConfig,
    accumulator: BlockAccumulator,
    encoder: FrameEncoder,
    sizing: BufferSizingPolicy,
    state: StreamState,
    stats: EncoderStats,
}

impl<S: FrameSink> FrameWriter<S> {
    /// Create a writer that forwards frames to `sink`.
    pub fn new(sink: S, config: EncoderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            sink,
            accumulator: BlockAccumulator::new(config.block_size),
            encoder: FrameEncoder::new(&config),
            sizing: BufferSizingPolicy::new(&config),
            config,
            state: StreamState::Open,
            stats: EncoderStats::default(),
        })
    }

    pub fn block_size(&self) -> usize {
        self.config.block_size
    }

    /// Bytes buffered for the block in progress.
    pub fn current_block_length(&self) -> usize {
        self.accumulator.current_length()
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == StreamState::Closed
    }

    pub fn stats(&self) -> EncoderStats {
        self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Scratch buffer sized for a write of `pending` bytes at the current
    /// buffered length, placed per the stream's configuration.
    pub fn allocate_buffer(&self, pending: usize) -> Result<ScratchBuffer> {
        self.sizing.size_for(
            pending,
            self.accumulator.current_length(),
            self.config.placement,
        )
    }

    /// Give back the sink. Any bytes still buffered are discarded.
    pub fn into_sink(self) -> S {
        if !self.accumulator.is_empty() {
            warn!(
                "frame writer released with {} unflushed bytes",
                self.accumulator.current_length()
            );
        }
        self.sink
    }

    /// Buffer `input` and forward a frame for every block it completes.
    pub fn write(&mut self, input: &[u8]) -> Result<()> {
        self.ensure_open()?;
        if !self.accumulator.fills_block(input.len()) {
            self.accumulator.append(input).commit();
            self.stats.bytes_written += input.len() as u64;
            return Ok(());
        }

        let mut scratch = self.allocate_buffer(input.len())?;
        let mut frames = Vec::new();
        let mut append = self.accumulator.append(input);
        while let Some(block) = append.next_block() {
            frames.push(self.encoder.encode(block, &mut scratch)?);
        }
        append.commit();
        self.stats.bytes_written += input.len() as u64;

        self.forward(frames)
    }

    /// Frame the buffered partial block, if any, and flush the sink.
    pub fn flush(&mut self) -> Result<()> {
        self.ensure_open()?;
        let buffered = self.accumulator.current_length();
        if buffered == 0 {
            // No frame to emit, but earlier frames may still sit in the sink.
            return self.flush_sink();
        }

        let mut scratch = self.sizing.size_for(0, buffered, self.config.placement)?;
        self.state = StreamState::Flushing;
        let result = self.emit_pending(&mut scratch, false);
        self.leave_flushing(StreamState::Open);
        if result.is_ok() {
            debug!("flushed partial block of {} bytes", buffered);
        }
        result
    }

    /// Flush, emit the terminal marker, and close the stream.
    pub fn close(&mut self) -> Result<()> {
        self.ensure_open()?;
        let mut scratch = self
            .sizing
            .size_for_close(self.accumulator.current_length(), self.config.placement)?;
        self.state = StreamState::Flushing;
        match self.emit_pending(&mut scratch, true) {
            Ok(()) => {
                self.leave_flushing(StreamState::Closed);
                debug!(
                    "stream closed: {} frames, {} bytes in, {} bytes out",
                    self.stats.frames, self.stats.bytes_framed, self.stats.bytes_out
                );
                Ok(())
            }
            Err(e) => {
                self.leave_flushing(StreamState::Open);
                Err(e)
            }
        }
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            StreamState::Open => Ok(()),
            StreamState::Flushing | StreamState::Closed | StreamState::Failed => {
                Err(FrameError::StreamFinished)
            }
        }
    }

    /// End a flush or close, unless a sink rejection already failed the stream.
    fn leave_flushing(&mut self, next: StreamState) {
        if self.state == StreamState::Flushing {
            self.state = next;
        }
    }

    fn reject(&mut self, err: io::Error) -> FrameError {
        warn!("sink rejected frame, stream failed: {}", err);
        self.state = StreamState::Failed;
        FrameError::SinkRejection(err)
    }

    fn flush_sink(&mut self) -> Result<()> {
        self.sink.flush().map_err(|e| self.reject(e))
    }

    /// Encode the partial block (and the terminal marker if asked), then
    /// forward. Encoding failures put the partial block back.
    fn emit_pending(&mut self, scratch: &mut ScratchBuffer, terminal: bool) -> Result<()> {
        let partial = self.accumulator.take_partial();
        let frames = match self.encode_pending(partial.as_deref(), scratch, terminal) {
            Ok(frames) => frames,
            Err(e) => {
                if let Some(block) = partial {
                    self.accumulator.restore_partial(block);
                }
                return Err(e);
            }
        };
        self.forward(frames)?;
        self.flush_sink()
    }

    fn encode_pending(
        &self,
        partial: Option<&[u8]>,
        scratch: &mut ScratchBuffer,
        terminal: bool,
    ) -> Result<Vec<EncodedFrame>> {
        let mut frames = Vec::with_capacity(2);
        if let Some(block) = partial {
            frames.push(self.encoder.encode(block, scratch)?);
        }
        if terminal {
            frames.push(self.encoder.encode_terminal(scratch)?);
        }
        Ok(frames)
    }

    fn forward(&mut self, frames: Vec<EncodedFrame>) -> Result<()> {
        for EncodedFrame { header, bytes } in frames {
            trace!(
                "frame {}: {} -> {} bytes ({})",
                self.stats.frames,
                header.decompressed_len,
                header.compressed_len,
                header.method.name()
            );
            let frame_len = bytes.len();
            if let Err(e) = self.sink.accept(bytes) {
                return Err(self.reject(e));
            }
            self.stats.record(&header, frame_len);
        }
        Ok(())
    }
}

/// `write` buffers, `flush` frames the partial block. Closing still needs
/// [`FrameWriter::close`].
impl<S: FrameSink> io::Write for FrameWriter<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        FrameWriter::write(self, buf).map_err(into_io_error)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        FrameWriter::flush(self).map_err(into_io_error)
    }
}

fn into_io_error(err: FrameError) -> io::Error {
    match err {
        FrameError::SinkRejection(e) | FrameError::Io(e) => e,
        other => io::Error::other(other),
    }
}
