//! Cancellation token shared between a guarded call and its worker.
//!
//! Threads cannot be killed from the outside, so stopping a worker means two
//! things: setting a flag the work may poll, and running the stop hooks the
//! work registered for the resources it owns (child processes, sockets).

use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(5); // sleep responsiveness

/// Failure raised while stopping a worker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StopError {
    /// Ordinary failure; the guard logs and ignores it.
    #[error("stopping worker failed: {0}")]
    Failed(String),
    /// Must reach the caller even though the guard is already failing.
    #[error("{0}")]
    Fatal(String),
}

impl StopError {
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, StopError::Fatal(_))
    }
}

type StopHook = Box<dyn FnOnce() -> Result<(), StopError> + Send>;

#[derive(Default)]
struct Inner {
    cancelled: AtomicBool,
    hooks: Mutex<Vec<StopHook>>,
}

#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Register a hook to run when the token is stopped.
    ///
    /// If the token is already stopped the hook runs immediately on the
    /// calling thread.
    pub fn on_stop<F>(&self, hook: F)
    where
        F: FnOnce() -> Result<(), StopError> + Send + 'static,
    {
        let mut hooks = self
            .inner
            .hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !self.is_cancelled() {
            hooks.push(Box::new(hook));
            return;
        }
        drop(hooks);

        if let Err(err) = hook() {
            tracing::debug!(error = %err, "Stop hook registered after cancellation failed");
        }
    }

    /// Cancel the token and run every registered hook.
    ///
    /// All hooks run even if some fail. A fatal failure wins over ordinary
    /// ones; otherwise the last failure is returned.
    pub fn stop(&self) -> Result<(), StopError> {
        self.inner.cancelled.store(true, Ordering::Release);
        let hooks = mem::take(
            &mut *self
                .inner
                .hooks
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );

        let mut outcome: Result<(), StopError> = Ok(());
        for hook in hooks {
            if let Err(err) = hook() {
                outcome = match outcome {
                    Err(previous) if previous.is_fatal() => Err(previous),
                    _ => Err(err),
                };
            }
        }
        outcome
    }

    /// Sleep for `duration`, waking early on cancellation.
    ///
    /// Returns `true` if the full duration elapsed.
    /// A duration too large to represent as an instant sleeps until
    /// cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now().checked_add(duration);
        loop {
            if self.is_cancelled() {
                return false;
            }
            let pause = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return true;
                    }
                    CANCEL_POLL_INTERVAL.min(deadline - now)
                }
                None => CANCEL_POLL_INTERVAL,
            };
            thread::sleep(pause);
        }
    }
}
