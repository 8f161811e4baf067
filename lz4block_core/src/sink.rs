use std::io::{self, Write};

use bytes::Bytes;

/// Downstream consumer of encoded frames.
///
/// Frames arrive in stream order, one per call, and ownership passes to the
/// sink. An error from either method is surfaced to the writer's caller as
/// [`FrameError::SinkRejection`](crate::FrameError::SinkRejection), is
/// never retried, and leaves the writer failed.
pub trait FrameSink {
    fn accept(&mut self, frame: Bytes) -> io::Result<()>;

    /// Called after a flush or close has forwarded its frames.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Collects frames in memory.
impl FrameSink for Vec<Bytes> {
    fn accept(&mut self, frame: Bytes) -> io::Result<()> {
        self.push(frame);
        Ok(())
    }
}

impl<S: FrameSink + ?Sized> FrameSink for &mut S {
    fn accept(&mut self, frame: Bytes) -> io::Result<()> {
        (**self).accept(frame)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}

/// Writes frames back to back into any [`Write`].
#[derive(Debug)]
pub struct IoSink<W> {
    inner: W,
}

impl<W: Write> IoSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> FrameSink for IoSink<W> {
    fn accept(&mut self, frame: Bytes) -> io::Result<()> {
        self.inner.write_all(&frame)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
