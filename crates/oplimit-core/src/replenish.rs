//! Background task that drains the pool at the configured pace.
//!
//! Each cycle sleeps `floor(100 / limit_rate)` seconds and then drains up to
//! [`DRAIN_BATCH`] tokens, which averages out to roughly `limit_rate`
//! admissions per second. When the stop token fires the task exits from
//! whichever wait it is in and closes the underlying stream.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::limits::DRAIN_BATCH;
use crate::pool::CapacityPool;
use crate::stream::Duplex;

/// Outcome of closing the underlying stream, published once the task exits.
pub(crate) type CloseOutcome = Option<Result<(), String>>;

pub(crate) struct Replenisher<S> {
    pub(crate) pool: Arc<CapacityPool>,
    pub(crate) stop: CancellationToken,
    pub(crate) underlying: Arc<S>,
    pub(crate) cycle: Duration,
    pub(crate) closed: watch::Sender<CloseOutcome>,
}

impl<S> Replenisher<S>
where
    S: Duplex + 'static,
{
    pub(crate) async fn run(self) {
        log::debug!(
            "replenisher started: cycle={:?} batch={} burst={}",
            self.cycle,
            DRAIN_BATCH,
            self.pool.capacity()
        );

        let drained = self.pace().await;
        log::debug!("replenisher stopping after draining {} tokens", drained);

        let outcome = match self.underlying.close().await {
            Ok(()) => Ok(()),
            Err(e) => {
                log::warn!("failed to close underlying stream: {}", e);
                Err(e.to_string())
            }
        };
        self.closed.send_replace(Some(outcome));
    }

    /// Runs drain cycles until the stop token fires, returning how many
    /// tokens were drained in total.
    async fn pace(&self) -> u64 {
        let mut drained: u64 = 0;
        loop {
            tokio::select! {
                biased;
                () = self.stop.cancelled() => return drained,
                () = tokio::time::sleep(self.cycle) => {}
            }

            for _ in 0..DRAIN_BATCH {
                if self.pool.drain(&self.stop).await.is_err() {
                    return drained;
                }
                drained += 1;
            }
        }
    }
}
