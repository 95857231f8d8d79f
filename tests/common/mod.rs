//! Shared test utilities and fixtures
//!
//! Common infrastructure for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use timebox_core::{Guard, GuardOptions, KeywordTimeout, StopSignalMonitor, TestTimeout};
use timebox_types::PlainText;

/// Monitor that records bracket calls and the deepest nesting seen.
#[derive(Debug, Default)]
pub struct RecordingMonitor {
    depth: AtomicUsize,
    max_depth: AtomicUsize,
    begins: AtomicUsize,
    ends: AtomicUsize,
}

impl RecordingMonitor {
    pub fn begins(&self) -> usize {
        self.begins.load(Ordering::SeqCst)
    }

    pub fn ends(&self) -> usize {
        self.ends.load(Ordering::SeqCst)
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth.load(Ordering::SeqCst)
    }
}

impl StopSignalMonitor for RecordingMonitor {
    fn begin_guarded_call(&self) {
        self.begins.fetch_add(1, Ordering::SeqCst);
        let depth = self.depth.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_depth.fetch_max(depth, Ordering::SeqCst);
    }

    fn end_guarded_call(&self) {
        self.ends.fetch_add(1, Ordering::SeqCst);
        self.depth.fetch_sub(1, Ordering::SeqCst);
    }
}

pub fn guard_with(monitor: &Arc<RecordingMonitor>) -> Guard {
    Guard::new(monitor.clone()).with_options(GuardOptions {
        worker_name: "timebox-test-worker".to_string(),
        ..GuardOptions::default()
    })
}

/// Resolved and started keyword timeout.
pub fn keyword_timeout(raw: &str) -> KeywordTimeout {
    let mut timeout = KeywordTimeout::new(raw, None);
    timeout.resolve(&PlainText);
    timeout.start();
    timeout
}

/// Resolved and started test timeout.
pub fn test_timeout(raw: &str) -> TestTimeout {
    let mut timeout = TestTimeout::new(raw, None);
    timeout.resolve(&PlainText);
    timeout.start();
    timeout
}
