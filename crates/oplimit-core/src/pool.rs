//! Bounded token pool shared by the admission gate and the replenisher.
//!
//! The pool behaves like a bounded channel of unit tokens. Depositing adds a
//! token and waits while the pool is full; draining removes one and waits
//! while it is empty. A drainer that parks on an empty pool receives the next
//! deposit directly, so a pool of capacity zero turns every deposit into a
//! rendezvous with the drainer.
//!
//! Every wait also selects on the shared stop token.

use std::pin::pin;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct PoolState {
    /// Tokens deposited and not yet drained.
    held: usize,
    /// Drainers parked on an empty pool, waiting for a hand-off.
    parked_drainers: usize,
    /// Tokens handed straight to a parked drainer, not yet collected.
    handoffs: usize,
}

/// Counting pool with a fixed ceiling.
///
/// Supports any number of concurrent depositors and a single drainer.
#[derive(Debug)]
pub(crate) struct CapacityPool {
    capacity: usize,
    state: Mutex<PoolState>,
    deposited: Notify,
    freed: Notify,
}

impl CapacityPool {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(PoolState::default()),
            deposited: Notify::new(),
            freed: Notify::new(),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tokens currently held in the pool.
    pub(crate) fn outstanding(&self) -> usize {
        self.lock().held
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds one token, waiting for room. Fails with [`Error::Closed`] once
    /// `stop` is cancelled, including when it already was on entry.
    pub(crate) async fn deposit(&self, stop: &CancellationToken) -> Result<()> {
        loop {
            if stop.is_cancelled() {
                return Err(Error::Closed);
            }

            // Register interest before inspecting the state so a drain that
            // lands in between is not missed.
            let mut freed = pin!(self.freed.notified());
            freed.as_mut().enable();

            if self.try_deposit() {
                self.deposited.notify_one();
                return Ok(());
            }

            tokio::select! {
                biased;
                () = stop.cancelled() => return Err(Error::Closed),
                () = freed => {}
            }
        }
    }

    fn try_deposit(&self) -> bool {
        let mut state = self.lock();
        if state.parked_drainers > 0 {
            state.parked_drainers -= 1;
            state.handoffs += 1;
            true
        } else if state.held < self.capacity {
            state.held += 1;
            true
        } else {
            false
        }
    }

    /// Removes one token, waiting for a deposit. Fails with
    /// [`Error::Closed`] once `stop` is cancelled.
    pub(crate) async fn drain(&self, stop: &CancellationToken) -> Result<()> {
        let mut parked = false;
        loop {
            let mut deposited = pin!(self.deposited.notified());
            deposited.as_mut().enable();

            match self.try_drain(&mut parked) {
                Drain::Took => return Ok(()),
                Drain::Freed => {
                    self.freed.notify_one();
                    return Ok(());
                }
                Drain::Parked => {
                    // A depositor blocked on a full (or zero-sized) pool can
                    // now hand its token over.
                    self.freed.notify_one();
                }
                Drain::Waiting => {}
            }

            tokio::select! {
                biased;
                () = stop.cancelled() => {
                    self.unpark(parked);
                    return Err(Error::Closed);
                }
                () = deposited => {}
            }
        }
    }

    fn try_drain(&self, parked: &mut bool) -> Drain {
        let mut state = self.lock();
        if state.handoffs > 0 {
            // The depositor already withdrew our parking slot.
            state.handoffs -= 1;
            *parked = false;
            Drain::Took
        } else if state.held > 0 {
            state.held -= 1;
            if *parked {
                state.parked_drainers -= 1;
                *parked = false;
            }
            Drain::Freed
        } else if *parked {
            Drain::Waiting
        } else {
            state.parked_drainers += 1;
            *parked = true;
            Drain::Parked
        }
    }

    fn unpark(&self, parked: bool) {
        let mut state = self.lock();
        if state.handoffs > 0 {
            // The token was handed over; its depositor has been admitted.
            state.handoffs -= 1;
        } else if parked {
            state.parked_drainers -= 1;
        }
    }
}

enum Drain {
    /// Collected a token handed over by a depositor.
    Took,
    /// Removed a held token, freeing a slot.
    Freed,
    /// Newly parked on an empty pool.
    Parked,
    /// Still parked.
    Waiting,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;

    const SHORT: Duration = Duration::from_millis(50);

    #[tokio::test(start_paused = true)]
    async fn test_deposits_up_to_capacity_do_not_block() {
        let pool = CapacityPool::new(3);
        let stop = CancellationToken::new();

        for _ in 0..3 {
            pool.deposit(&stop).await.unwrap();
        }
        assert_eq!(pool.outstanding(), 3);
        assert_eq!(pool.capacity(), 3);

        assert!(timeout(SHORT, pool.deposit(&stop)).await.is_err());
        assert_eq!(pool.outstanding(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_frees_a_blocked_depositor() {
        let pool = Arc::new(CapacityPool::new(1));
        let stop = CancellationToken::new();
        pool.deposit(&stop).await.unwrap();

        let blocked = tokio::spawn({
            let pool = Arc::clone(&pool);
            let stop = stop.clone();
            async move { pool.deposit(&stop).await }
        });
        tokio::time::sleep(SHORT).await;
        assert!(!blocked.is_finished());

        pool.drain(&stop).await.unwrap();
        blocked.await.unwrap().unwrap();
        assert_eq!(pool.outstanding(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_waits_for_a_deposit() {
        let pool = Arc::new(CapacityPool::new(2));
        let stop = CancellationToken::new();

        let drainer = tokio::spawn({
            let pool = Arc::clone(&pool);
            let stop = stop.clone();
            async move { pool.drain(&stop).await }
        });
        tokio::time::sleep(SHORT).await;
        assert!(!drainer.is_finished());

        pool.deposit(&stop).await.unwrap();
        drainer.await.unwrap().unwrap();
        assert_eq!(pool.outstanding(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_capacity_needs_a_waiting_drainer() {
        let pool = Arc::new(CapacityPool::new(0));
        let stop = CancellationToken::new();

        assert!(timeout(SHORT, pool.deposit(&stop)).await.is_err());

        let drainer = tokio::spawn({
            let pool = Arc::clone(&pool);
            let stop = stop.clone();
            async move { pool.drain(&stop).await }
        });

        pool.deposit(&stop).await.unwrap();
        drainer.await.unwrap().unwrap();
        assert_eq!(pool.outstanding(), 0);

        // The drainer is gone, so the next deposit has nobody to meet.
        assert!(timeout(SHORT, pool.deposit(&stop)).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocked_zero_capacity_deposit_meets_late_drainer() {
        let pool = Arc::new(CapacityPool::new(0));
        let stop = CancellationToken::new();

        let depositor = tokio::spawn({
            let pool = Arc::clone(&pool);
            let stop = stop.clone();
            async move { pool.deposit(&stop).await }
        });
        tokio::time::sleep(SHORT).await;
        assert!(!depositor.is_finished());

        pool.drain(&stop).await.unwrap();
        depositor.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_unblocks_depositor() {
        let pool = Arc::new(CapacityPool::new(0));
        let stop = CancellationToken::new();

        let depositor = tokio::spawn({
            let pool = Arc::clone(&pool);
            let stop = stop.clone();
            async move { pool.deposit(&stop).await }
        });
        tokio::time::sleep(SHORT).await;

        stop.cancel();
        let err = depositor.await.unwrap().unwrap_err();
        assert!(err.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_unblocks_drainer() {
        let pool = Arc::new(CapacityPool::new(4));
        let stop = CancellationToken::new();

        let drainer = tokio::spawn({
            let pool = Arc::clone(&pool);
            let stop = stop.clone();
            async move { pool.drain(&stop).await }
        });
        tokio::time::sleep(SHORT).await;

        stop.cancel();
        assert!(drainer.await.unwrap().unwrap_err().is_closed());
    }

    #[tokio::test]
    async fn test_deposit_after_cancel_fails_even_with_room() {
        let pool = CapacityPool::new(8);
        let stop = CancellationToken::new();
        stop.cancel();

        assert!(pool.deposit(&stop).await.unwrap_err().is_closed());
        assert_eq!(pool.outstanding(), 0);
    }
}
