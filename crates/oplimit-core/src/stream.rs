//! The stream seam: what a limiter wraps and what it exposes.

use std::io;

use async_trait::async_trait;
use tokio::io::{split, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;

/// A bidirectional byte stream with explicit close.
///
/// Methods take `&self` so that reads and writes can be issued from several
/// tasks at once; implementations provide whatever interior synchronization
/// they need.
#[async_trait]
pub trait Duplex: Send + Sync {
    /// Reads into `buf`, returning the number of bytes read.
    async fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes from `buf`, returning the number of bytes written.
    async fn write(&self, buf: &[u8]) -> io::Result<usize>;

    /// Closes the stream.
    async fn close(&self) -> io::Result<()>;
}

/// Adapts any Tokio `AsyncRead + AsyncWrite` into a [`Duplex`].
///
/// Reads and writes go through separate halves, so one read and one write
/// can be in progress together. `close` shuts down the write half.
#[derive(Debug)]
pub struct IoStream<T> {
    reader: Mutex<ReadHalf<T>>,
    writer: Mutex<WriteHalf<T>>,
}

impl<T> IoStream<T>
where
    T: AsyncRead + AsyncWrite,
{
    pub fn new(inner: T) -> Self {
        let (reader, writer) = split(inner);
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
        }
    }

    /// Reassembles the wrapped stream.
    pub fn into_inner(self) -> T
    where
        T: Unpin,
    {
        self.reader.into_inner().unsplit(self.writer.into_inner())
    }
}

#[async_trait]
impl<T> Duplex for IoStream<T>
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.lock().await.read(buf).await
    }

    async fn write(&self, buf: &[u8]) -> io::Result<usize> {
        self.writer.lock().await.write(buf).await
    }

    async fn close(&self) -> io::Result<()> {
        self.writer.lock().await.shutdown().await
    }
}

#[async_trait]
impl<D> Duplex for std::sync::Arc<D>
where
    D: Duplex + ?Sized,
{
    async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf).await
    }

    async fn write(&self, buf: &[u8]) -> io::Result<usize> {
        (**self).write(buf).await
    }

    async fn close(&self) -> io::Result<()> {
        (**self).close().await
    }
}
