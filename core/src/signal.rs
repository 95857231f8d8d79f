//! Stop-signal monitor.
//!
//! A guarded call brackets its wait with `begin_guarded_call` /
//! `end_guarded_call`. While inside a bracket, an external stop request (Ctrl-C)
//! is deferred: the running work is allowed to finish or time out, and the
//! request is delivered once the outermost bracket closes. A second request
//! while deferred escalates to a forced stop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

/// Collaborator notified around every guarded wait.
pub trait StopSignalMonitor: Send + Sync {
    fn begin_guarded_call(&self);

    fn end_guarded_call(&self);

    /// Whether an external stop has been requested.
    fn stop_requested(&self) -> bool {
        false
    }
}

/// RAII bracket: begins a guarded call on creation, ends it on drop.
pub struct GuardedCall<'a> {
    monitor: &'a dyn StopSignalMonitor,
}

impl<'a> GuardedCall<'a> {
    #[must_use]
    pub fn enter(monitor: &'a dyn StopSignalMonitor) -> Self {
        monitor.begin_guarded_call();
        Self { monitor }
    }
}

impl Drop for GuardedCall<'_> {
    fn drop(&mut self) {
        self.monitor.end_guarded_call();
    }
}

/// How a stop request was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopDisposition {
    /// No guarded call running; stop now.
    Immediate,
    /// First request during a guarded call; delivered when the call ends.
    Deferred,
    /// Repeated request during a guarded call; stop without waiting.
    Forced,
}

/// Depth-counting monitor used by the command-line front end.
#[derive(Debug, Default)]
pub struct SignalMonitor {
    depth: AtomicUsize,
    requests: AtomicUsize,
}

impl SignalMonitor {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            depth: AtomicUsize::new(0),
            requests: AtomicUsize::new(0),
        }
    }

    /// Process-wide instance. Only the composition root should reach for this;
    /// everything else receives a monitor explicitly.
    #[must_use]
    pub fn global() -> Arc<SignalMonitor> {
        static GLOBAL: OnceLock<Arc<SignalMonitor>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(SignalMonitor::new())))
    }

    /// Record an external stop request and decide how to deliver it.
    pub fn request_stop(&self) -> StopDisposition {
        let previous = self.requests.fetch_add(1, Ordering::AcqRel);
        let disposition = if self.depth.load(Ordering::Acquire) == 0 {
            StopDisposition::Immediate
        } else if previous == 0 {
            StopDisposition::Deferred
        } else {
            StopDisposition::Forced
        };
        tracing::info!(?disposition, requests = previous + 1, "Stop requested");
        disposition
    }

    #[must_use]
    pub fn in_guarded_call(&self) -> bool {
        self.depth() > 0
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }
}

impl StopSignalMonitor for SignalMonitor {
    fn begin_guarded_call(&self) {
        self.depth.fetch_add(1, Ordering::AcqRel);
    }

    fn end_guarded_call(&self) {
        let previous = self
            .depth
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |depth| {
                depth.checked_sub(1)
            });
        match previous {
            Ok(1) if self.stop_requested() => {
                tracing::info!("Guarded calls finished, deferred stop request pending");
            }
            Ok(_) => {}
            Err(_) => tracing::warn!("end_guarded_call without matching begin_guarded_call"),
        }
    }

    fn stop_requested(&self) -> bool {
        self.requests.load(Ordering::Acquire) > 0
    }
}
