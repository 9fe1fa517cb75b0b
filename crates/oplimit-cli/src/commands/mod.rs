pub mod config;
pub mod proxy;
pub mod relay;

pub use proxy::run_proxy;
pub use relay::run_relay;

use std::io;

use oplimit_core::Duplex;

/// Copies `from` into `to` until `from` reports end of stream, one
/// `chunk_size` read at a time. Returns the number of bytes copied.
pub(crate) async fn pump<R, W>(from: &R, to: &W, chunk_size: usize) -> io::Result<u64>
where
    R: Duplex + ?Sized,
    W: Duplex + ?Sized,
{
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut total: u64 = 0;
    loop {
        let n = from.read(&mut buf).await?;
        if n == 0 {
            return Ok(total);
        }
        write_all(to, &buf[..n]).await?;
        total += n as u64;
    }
}

async fn write_all<W>(to: &W, mut buf: &[u8]) -> io::Result<()>
where
    W: Duplex + ?Sized,
{
    while !buf.is_empty() {
        let n = to.write(buf).await?;
        if n == 0 {
            return Err(io::ErrorKind::WriteZero.into());
        }
        buf = &buf[n..];
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use oplimit_core::IoStream;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[tokio::test]
    async fn test_pump_copies_until_eof() {
        let (src_local, mut src_peer) = duplex(64);
        let (dst_local, mut dst_peer) = duplex(64);
        let src = IoStream::new(src_local);
        let dst = IoStream::new(dst_local);

        src_peer.write_all(b"hello, world").await.unwrap();
        src_peer.shutdown().await.unwrap();

        let copied = pump(&src, &dst, 5).await.unwrap();
        assert_eq!(copied, 12);

        dst.close().await.unwrap();
        let mut out = Vec::new();
        dst_peer.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"hello, world");
    }
}
