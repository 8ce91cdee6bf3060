//! Byte-stream halves over the platform pipe.
//!
//! [`PipeReader`] serves reads of any size out of a fixed block and reports
//! end-of-stream as `Ok(None)` / a zero-length read. [`PipeWriter`] splits
//! writes into blocks of at most [`BLOCK_SIZE`] bytes and stops at the first
//! failed block.

use std::future::poll_fn;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
#[cfg(unix)]
use tokio::net::UnixStream;
#[cfg(windows)]
use tokio::net::windows::named_pipe::NamedPipeClient;

pub const BLOCK_SIZE: usize = 1024;

/// The connected platform primitive.
#[derive(Debug)]
pub enum PipeStream {
    #[cfg(unix)]
    Unix(UnixStream),
    #[cfg(windows)]
    NamedPipe(NamedPipeClient),
}

macro_rules! delegate {
    ($self:ident, $inner:ident => $call:expr) => {
        match $self.get_mut() {
            #[cfg(unix)]
            PipeStream::Unix($inner) => $call,
            #[cfg(windows)]
            PipeStream::NamedPipe($inner) => $call,
        }
    };
}

impl AsyncRead for PipeStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        delegate!(self, s => Pin::new(s).poll_read(cx, buf))
    }
}

impl AsyncWrite for PipeStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        delegate!(self, s => Pin::new(s).poll_write(cx, buf))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        delegate!(self, s => Pin::new(s).poll_flush(cx))
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        delegate!(self, s => Pin::new(s).poll_shutdown(cx))
    }
}

/// Block-buffered reader.
#[derive(Debug)]
pub struct PipeReader<R> {
    inner: R,
    block: Box<[u8; BLOCK_SIZE]>,
    pos: usize,
    filled: usize,
    eof: bool,
}

impl<R> PipeReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            block: Box::new([0; BLOCK_SIZE]),
            pos: 0,
            filled: 0,
            eof: false,
        }
    }
}

impl<R: AsyncRead + Unpin> PipeReader<R> {
    /// Next byte, or `None` once the peer has closed its end.
    pub async fn read_byte(&mut self) -> io::Result<Option<u8>> {
        poll_fn(|cx| self.poll_read_byte(cx)).await
    }

    fn poll_read_byte(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<Option<u8>>> {
        if !ready!(self.poll_fill(cx))? {
            return Poll::Ready(Ok(None));
        }
        let byte = self.block[self.pos];
        self.pos += 1;
        Poll::Ready(Ok(Some(byte)))
    }

    /// `true` while buffered bytes remain; refills from the pipe when the
    /// block is exhausted. Once the pipe reports end-of-stream the inner
    /// reader is not polled again.
    fn poll_fill(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<bool>> {
        if self.pos < self.filled {
            return Poll::Ready(Ok(true));
        }
        if self.eof {
            return Poll::Ready(Ok(false));
        }

        let mut buf = ReadBuf::new(&mut self.block[..]);
        ready!(Pin::new(&mut self.inner).poll_read(cx, &mut buf))?;
        let n = buf.filled().len();
        self.pos = 0;
        self.filled = n;
        if n == 0 {
            self.eof = true;
            tracing::trace!("pipe reached end of stream");
        }
        Poll::Ready(Ok(n > 0))
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for PipeReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if buf.remaining() == 0 || !ready!(this.poll_fill(cx))? {
            return Poll::Ready(Ok(()));
        }
        let n = buf.remaining().min(this.filled - this.pos);
        buf.put_slice(&this.block[this.pos..this.pos + n]);
        this.pos += n;
        Poll::Ready(Ok(()))
    }
}

/// Block-splitting writer.
#[derive(Debug)]
pub struct PipeWriter<W> {
    inner: W,
}

impl<W> PipeWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: AsyncWrite + Unpin> PipeWriter<W> {
    /// Write all of `data`, one underlying write per block, then flush.
    ///
    /// The first failing block aborts the rest.
    pub async fn write_blocks(&mut self, data: &[u8]) -> io::Result<()> {
        for block in data.chunks(BLOCK_SIZE) {
            self.inner.write_all(block).await?;
        }
        self.inner.flush().await
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for PipeWriter<W> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let len = buf.len().min(BLOCK_SIZE);
        Pin::new(&mut self.get_mut().inner).poll_write(cx, &buf[..len])
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
