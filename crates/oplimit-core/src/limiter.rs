//! The rate-limited stream wrapper.

use std::fmt;
use std::io;
use std::sync::{Arc, Once};

use async_trait::async_trait;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::pool::CapacityPool;
use crate::replenish::{CloseOutcome, Replenisher};
use crate::stream::Duplex;

/// A stream proxy that limits how many reads and writes per second reach
/// the wrapped stream.
///
/// Every `read` and `write` must first place a token in a pool holding at
/// most `max_burst` tokens; a background task removes tokens at roughly
/// `limit_rate` per second. Closing the limiter stops that task, which then
/// closes the wrapped stream exactly once.
///
/// Dropping a limiter without closing it shuts it down as well.
pub struct RateLimiter<S> {
    underlying: Arc<S>,
    pool: Arc<CapacityPool>,
    stop: CancellationToken,
    close_once: Once,
    closed: watch::Receiver<CloseOutcome>,
    limits: Limits,
}

/// Wraps `stream` so that at most `limit_rate` reads and writes per second
/// reach it, allowing bursts of up to `max_burst` operations.
///
/// # Panics
///
/// Must be called from within a Tokio runtime.
pub fn wrap<S>(stream: S, limit_rate: u32, max_burst: usize) -> Result<RateLimiter<S>>
where
    S: Duplex + 'static,
{
    RateLimiter::wrap(stream, limit_rate, max_burst)
}

impl<S> RateLimiter<S>
where
    S: Duplex + 'static,
{
    /// See [`wrap`].
    pub fn wrap(stream: S, limit_rate: u32, max_burst: usize) -> Result<Self> {
        Self::with_limits(stream, Limits::new(limit_rate, max_burst)?)
    }

    /// Wraps `stream` using previously loaded [`Limits`].
    pub fn with_limits(stream: S, limits: Limits) -> Result<Self> {
        limits.validate()?;

        let underlying = Arc::new(stream);
        let pool = Arc::new(CapacityPool::new(limits.max_burst));
        let stop = CancellationToken::new();
        let (closed_tx, closed_rx) = watch::channel(None);

        let replenisher = Replenisher {
            pool: Arc::clone(&pool),
            stop: stop.clone(),
            underlying: Arc::clone(&underlying),
            cycle: limits.cycle(),
            closed: closed_tx,
        };
        tokio::spawn(replenisher.run());

        if !limits.is_paced() {
            log::debug!(
                "limit_rate {} exceeds the drain batch; admissions are bounded only by max_burst",
                limits.limit_rate
            );
        }

        Ok(Self {
            underlying,
            pool,
            stop,
            close_once: Once::new(),
            closed: closed_rx,
            limits,
        })
    }
}

impl<S> RateLimiter<S> {
    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Admitted operations not yet drained by the background task.
    pub fn outstanding(&self) -> usize {
        self.pool.outstanding()
    }

    /// Whether shutdown has been requested.
    pub fn is_closed(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Requests shutdown. Idempotent; blocked and future admissions fail
    /// with the closed-stream error once this returns.
    pub fn shutdown(&self) {
        self.close_once.call_once(|| {
            log::info!(
                "shutting down rate limiter (limit_rate={}/s, max_burst={})",
                self.limits.limit_rate,
                self.limits.max_burst
            );
            self.stop.cancel();
        });
    }

    /// Waits until the wrapped stream has been closed, returning the result
    /// of that close.
    ///
    /// Only completes after [`shutdown`](Self::shutdown) or `close` has been
    /// called.
    pub async fn wait_closed(&self) -> Result<()> {
        let mut closed = self.closed.clone();
        let outcome = closed
            .wait_for(Option::is_some)
            .await
            .map(|outcome| (*outcome).clone())
            .map_err(|_| Error::CloseFailed {
                message: String::from("replenisher exited before closing the stream"),
            })?;

        match outcome {
            Some(Err(message)) => Err(Error::CloseFailed { message }),
            _ => Ok(()),
        }
    }

    async fn admit(&self) -> io::Result<()> {
        self.pool.deposit(&self.stop).await.map_err(io::Error::from)
    }
}

#[async_trait]
impl<S> Duplex for RateLimiter<S>
where
    S: Duplex + 'static,
{
    async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.admit().await?;
        self.underlying.read(buf).await
    }

    async fn write(&self, buf: &[u8]) -> io::Result<usize> {
        self.admit().await?;
        self.underlying.write(buf).await
    }

    /// Never fails; the wrapped stream is closed in the background. Use
    /// [`RateLimiter::wait_closed`] to observe that close.
    async fn close(&self) -> io::Result<()> {
        self.shutdown();
        Ok(())
    }
}

impl<S> Drop for RateLimiter<S> {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

impl<S> fmt::Debug for RateLimiter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("limits", &self.limits)
            .field("outstanding", &self.pool.outstanding())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::duplex;

    use super::*;
    use crate::stream::IoStream;

    #[tokio::test]
    async fn test_zero_rate_is_rejected() {
        let (local, _peer) = duplex(16);
        let err = wrap(IoStream::new(local), 0, 1).unwrap_err();
        assert!(matches!(err, Error::InvalidRate { rate: 0 }));
    }

    #[tokio::test]
    async fn test_debug_reports_state() {
        let (local, _peer) = duplex(16);
        let limiter = wrap(IoStream::new(local), 5, 2).unwrap();

        let debug = format!("{:?}", limiter);
        assert!(debug.contains("RateLimiter"));
        assert!(debug.contains("closed: false"));
        assert_eq!(limiter.limits(), Limits::new(5, 2).unwrap());
    }

    #[tokio::test]
    async fn test_close_marks_limiter_closed() {
        let (local, _peer) = duplex(16);
        let limiter = wrap(IoStream::new(local), 5, 2).unwrap();

        limiter.close().await.unwrap();
        assert!(limiter.is_closed());
        limiter.wait_closed().await.unwrap();
    }

    #[tokio::test]
    async fn test_drop_closes_underlying_stream() {
        let (local, mut peer) = duplex(16);
        let limiter = wrap(IoStream::new(local), 5, 2).unwrap();
        drop(limiter);

        let mut buf = Vec::new();
        let n = tokio::io::AsyncReadExt::read_to_end(&mut peer, &mut buf)
            .await
            .unwrap();
        assert_eq!(n, 0);
    }
}
