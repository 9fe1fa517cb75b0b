use anyhow::{Context, Result};
use oplimit_core::{Duplex, Limits, RateLimiter};

use super::pump;
use crate::stdio::StdioStream;

/// Copy stdin to stdout, throttling every read and write.
///
/// Reads and writes share one limiter, so a line copied costs two
/// operations.
pub async fn run_relay(limits: Limits, chunk_size: usize) -> Result<()> {
    log::info!(
        "relaying stdin to stdout at {}/s (burst {}, {} byte chunks)",
        limits.limit_rate,
        limits.max_burst,
        chunk_size
    );
    if let Some(rate) = limits.effective_rate() {
        log::debug!("effective rate: {:.2} operations/s", rate);
    }

    let limiter = RateLimiter::with_limits(StdioStream::new(), limits)?;

    let copied = pump(&limiter, &limiter, chunk_size)
        .await
        .context("Relay failed")?;

    limiter.close().await?;
    limiter
        .wait_closed()
        .await
        .context("Failed to flush stdout")?;

    log::info!("relayed {} bytes", copied);
    Ok(())
}
