//! Deadline-guarded execution.
//!
//! # Flow
//!
//! ```text
//! run(timeout, work)
//!   stored config error? ----------------------> Configuration
//!   not active? -------------------------------> Framework
//!   time_left()  (not started -> Framework)
//!   enter stop-signal bracket
//!   budget <= 0? ------------------------------> Timeout (no worker)
//!   spawn worker: work(&token) -> channel
//!   settle delay, wait on channel up to budget
//!     completed -------------------------------> value (panics resumed)
//!     expired: token.stop()
//!        fatal stop error / stop requested ----> Fatal
//!        otherwise ----------------------------> Timeout
//! ```
//!
//! The worker is detached. After a timeout its eventual result is dropped and
//! never observed by the caller.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use timebox_types::{GuardError, Timeout};
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::signal::{GuardedCall, StopSignalMonitor};

const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1); // let the worker get scheduled
const DEFAULT_WORKER_NAME: &str = "timebox-worker";

#[derive(Debug, Clone)]
pub struct GuardOptions {
    /// Pause between spawning the worker and starting the wait.
    pub settle_delay: Duration,
    /// Emit the remaining-budget announcement at debug level.
    pub announce: bool,
    /// Thread name given to workers.
    pub worker_name: String,
}

impl Default for GuardOptions {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            announce: true,
            worker_name: DEFAULT_WORKER_NAME.to_string(),
        }
    }
}

/// Runs work under a [`Timeout`], stopping it when the deadline passes.
pub struct Guard {
    monitor: Arc<dyn StopSignalMonitor>,
    options: GuardOptions,
}

impl Guard {
    #[must_use]
    pub fn new(monitor: Arc<dyn StopSignalMonitor>) -> Self {
        Self {
            monitor,
            options: GuardOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: GuardOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn options(&self) -> &GuardOptions {
        &self.options
    }

    /// Run `work` on a worker thread, waiting at most the time left on
    /// `timeout`.
    ///
    /// The timeout must be resolved and started by its owning scope. The
    /// work's own result (including any error it returns) comes back as `T`
    /// unchanged; a panic in the work is resumed on the calling thread.
    pub fn run<F, T>(&self, timeout: &Timeout, work: F) -> Result<T, GuardError>
    where
        F: FnOnce(&CancelToken) -> T + Send + 'static,
        T: Send + 'static,
    {
        if let Some(error) = timeout.config_error() {
            return Err(GuardError::Configuration(error.to_string()));
        }
        if !timeout.active() {
            return Err(GuardError::Framework("Timeout is not active.".to_string()));
        }
        let left = timeout.time_left()?;

        let _bracket = GuardedCall::enter(self.monitor.as_ref());
        if self.options.announce {
            debug!(
                kind = %timeout.kind(),
                timeout = timeout.raw(),
                "{}",
                timeout.announcement(left)
            );
        }
        if left <= 0.0 {
            return Err(GuardError::Timeout(timeout.get_message()));
        }

        let token = CancelToken::new();
        let (tx, rx) = mpsc::sync_channel(1);
        let worker_token = token.clone();
        thread::Builder::new()
            .name(self.options.worker_name.clone())
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| work(&worker_token)));
                // Receiver is gone once the guard has timed out.
                let _ = tx.send(outcome);
            })
            .map_err(|err| GuardError::Framework(format!("Starting worker failed: {err}")))?;

        thread::sleep(self.options.settle_delay);
        let budget = Duration::try_from_secs_f64(left).unwrap_or(Duration::MAX);
        match rx.recv_timeout(budget) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(payload)) => panic::resume_unwind(payload),
            Err(RecvTimeoutError::Disconnected) => Err(GuardError::Framework(
                "Worker exited without reporting a result.".to_string(),
            )),
            Err(RecvTimeoutError::Timeout) => {
                self.stop_worker(&token, timeout)?;
                Err(GuardError::Timeout(timeout.get_message()))
            }
        }
    }

    fn stop_worker(&self, token: &CancelToken, timeout: &Timeout) -> Result<(), GuardError> {
        match token.stop() {
            Ok(()) => {}
            Err(err) if err.is_fatal() => return Err(GuardError::Fatal(err.to_string())),
            Err(err) => debug!(error = %err, "Ignoring failure while stopping worker"),
        }
        if self.monitor.stop_requested() {
            return Err(GuardError::Fatal(
                "Execution stopped by external request.".to_string(),
            ));
        }
        warn!(
            kind = %timeout.kind(),
            timeout = timeout.raw(),
            "Deadline exceeded; worker stopped"
        );
        Ok(())
    }
}
