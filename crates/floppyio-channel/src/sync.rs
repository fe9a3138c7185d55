use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use floppyio_store::{BackingStore, StoreError};
use tracing::trace;

/// Cooperative cancellation for a pending [`SyncWaiter::wait`].
///
/// Clones share the flag; cancelling any clone stops every wait observing it
/// at its next poll.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Why a wait ended without a match.
#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    /// The deadline passed before the byte matched.
    #[error("timed out after {timeout:?} waiting on control byte at offset {offset}")]
    TimedOut { offset: usize, timeout: Duration },

    /// The cancellation token fired.
    #[error("wait cancelled")]
    Cancelled,

    /// The store failed while polling.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Turns a byte in the shared store into a blocking condition.
///
/// The counterpart is another process (or another machine) that can only
/// communicate through the store, so the waiter re-reads the byte at a fixed
/// interval until it matches or the deadline passes.
#[derive(Debug, Clone)]
pub struct SyncWaiter {
    poll_interval: Duration,
    cancel: Option<CancelToken>,
}

impl SyncWaiter {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            cancel: None,
        }
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Block until `(byte & mask) == expected` for the byte at `offset`.
    ///
    /// `timeout` of `None` waits forever. Returns the matching byte.
    pub fn wait<S: BackingStore + ?Sized>(
        &self,
        store: &mut S,
        offset: usize,
        timeout: Option<Duration>,
        expected: u8,
        mask: u8,
    ) -> Result<u8, WaitError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut byte = [0u8; 1];
        let mut polls = 0u64;

        loop {
            if !store.is_healthy() {
                return Err(WaitError::Store(StoreError::Faulted));
            }

            store.read_at(offset as u64, &mut byte)?;
            polls += 1;
            if byte[0] & mask == expected {
                trace!(offset, byte = byte[0], polls, "control byte matched");
                return Ok(byte[0]);
            }

            if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                return Err(WaitError::Cancelled);
            }

            let nap = match (deadline, timeout) {
                (Some(deadline), Some(timeout)) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(WaitError::TimedOut { offset, timeout });
                    }
                    (deadline - now).min(self.poll_interval)
                }
                _ => self.poll_interval,
            };
            std::thread::sleep(nap);
        }
    }
}
