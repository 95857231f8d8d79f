//! Test- and keyword-scoped timeouts.

use std::ops::{Deref, DerefMut};

use crate::timeout::{Timeout, TimeoutKind};

/// Timeout owned by a single keyword invocation.
#[derive(Debug, Clone)]
pub struct KeywordTimeout(Timeout);

impl KeywordTimeout {
    #[must_use]
    pub fn new(raw: impl Into<String>, message: Option<String>) -> Self {
        Self(Timeout::new(TimeoutKind::Keyword, raw, message))
    }

    #[must_use]
    pub fn into_inner(self) -> Timeout {
        self.0
    }
}

impl Deref for KeywordTimeout {
    type Target = Timeout;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for KeywordTimeout {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// Timeout owned by a test.
///
/// Also remembers whether a keyword timeout nested inside the test fired, so
/// the test can be reported as timed out even when its own deadline held.
#[derive(Debug, Clone)]
pub struct TestTimeout {
    timeout: Timeout,
    keyword_timeout_occurred: bool,
}

impl TestTimeout {
    #[must_use]
    pub fn new(raw: impl Into<String>, message: Option<String>) -> Self {
        Self {
            timeout: Timeout::new(TimeoutKind::Test, raw, message),
            keyword_timeout_occurred: false,
        }
    }

    /// Sticky: once `true` has been recorded, later `false` calls are ignored.
    pub fn mark_keyword_timeout_occurred(&mut self, occurred: bool) {
        self.keyword_timeout_occurred |= occurred;
    }

    #[must_use]
    pub const fn keyword_timeout_occurred(&self) -> bool {
        self.keyword_timeout_occurred
    }

    #[must_use]
    pub fn any_timeout_occurred(&self) -> bool {
        self.keyword_timeout_occurred || self.timeout.timed_out()
    }

    #[must_use]
    pub fn into_inner(self) -> Timeout {
        self.timeout
    }
}

impl Deref for TestTimeout {
    type Target = Timeout;

    fn deref(&self) -> &Self::Target {
        &self.timeout
    }
}

impl DerefMut for TestTimeout {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.timeout
    }
}
