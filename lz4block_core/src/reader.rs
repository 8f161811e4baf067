use std::io::{self, Read};

use crate::codec::{block_checksum, decompress_block, max_compressed_length};
use crate::error::{FrameError, Result};
use crate::format::{
    header_len, FrameHeader, Method, FLAG_CONTENT_CHECKSUM, FLAG_STORED_CHECKSUM, HEADER_SIZE,
    MAX_BLOCK_SIZE, MAX_HEADER_SIZE,
};

/// One decoded frame: its header and the original block bytes.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub header: FrameHeader,
    pub data: Vec<u8>,
}

/// Sequential reader for a stream produced by [`FrameWriter`](crate::FrameWriter).
///
/// # Read sequence
/// 1. Read the fixed 21-byte header; read 4 more if the token announces a
///    stored checksum.
/// 2. Validate the lengths against the block-size ceiling and the LZ4 bound.
/// 3. Read the payload, verify the stored checksum, decompress, verify the
///    content checksum.
///
/// The terminal marker ends the stream. Running out of input on a frame
/// boundary before the marker is [`FrameError::MissingTerminal`].
pub struct FrameReader<R> {
    inner: R,
    finished: bool,
    frames: u64,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            finished: false,
            frames: 0,
        }
    }

    /// Data frames decoded so far.
    pub fn frames_read(&self) -> u64 {
        self.frames
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Decode the next data frame, or `None` once the terminal marker is read.
    pub fn next_frame(&mut self) -> Result<Option<DecodedFrame>> {
        if self.finished {
            return Ok(None);
        }

        let mut header_buf = [0u8; MAX_HEADER_SIZE];
        if !self.read_header_start(&mut header_buf[..HEADER_SIZE])? {
            return Err(FrameError::MissingTerminal);
        }
        let len = header_len(header_buf[8]);
        if len > HEADER_SIZE {
            self.inner.read_exact(&mut header_buf[HEADER_SIZE..len])?;
        }
        let header = FrameHeader::parse(&header_buf[..len])?;

        if header.is_terminal() {
            self.finished = true;
            return Ok(None);
        }
        validate_lengths(&header)?;

        let mut payload = vec![0u8; header.compressed_len as usize];
        self.inner.read_exact(&mut payload)?;

        if header.has_flag(FLAG_STORED_CHECKSUM) {
            verify("stored", header.stored_checksum, block_checksum(&payload))?;
        }
        let data = decompress_block(header.method, &payload, header.decompressed_len as usize)?;
        if header.has_flag(FLAG_CONTENT_CHECKSUM) {
            verify("content", header.checksum, block_checksum(&data))?;
        }

        self.frames += 1;
        Ok(Some(DecodedFrame { header, data }))
    }

    /// Decode every frame up to the terminal marker and concatenate the blocks.
    pub fn read_all(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(frame) = self.next_frame()? {
            out.extend_from_slice(&frame.data);
        }
        Ok(out)
    }

    /// Fill `buf` with the first header bytes. `false` means clean EOF before
    /// any byte was read.
    fn read_header_start(&mut self, buf: &mut [u8]) -> Result<bool> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) if filled == 0 => return Ok(false),
                Ok(0) => {
                    return Err(FrameError::CorruptHeader(format!(
                        "stream truncated after {} header bytes",
                        filled
                    )))
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(true)
    }
}

impl<R: Read> Iterator for FrameReader<R> {
    type Item = Result<DecodedFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}

fn validate_lengths(header: &FrameHeader) -> Result<()> {
    let clen = header.compressed_len as usize;
    let dlen = header.decompressed_len as usize;
    if dlen == 0 || dlen > MAX_BLOCK_SIZE {
        return Err(FrameError::CorruptHeader(format!(
            "decompressed length {} outside [1, {}]",
            dlen, MAX_BLOCK_SIZE
        )));
    }
    match header.method {
        Method::Raw if clen != dlen => Err(FrameError::CorruptHeader(format!(
            "raw frame with compressed length {} != decompressed length {}",
            clen, dlen
        ))),
        Method::Lz4Fast | Method::Lz4High if clen == 0 || clen > max_compressed_length(dlen) => {
            Err(FrameError::CorruptHeader(format!(
                "compressed length {} invalid for {} decompressed bytes",
                clen, dlen
            )))
        }
        _ => Ok(()),
    }
}

fn verify(kind: &'static str, expected: u32, actual: u32) -> Result<()> {
    if expected != actual {
        return Err(FrameError::ChecksumMismatch {
            kind,
            expected,
            actual,
        });
    }
    Ok(())
}
