//! Error kinds surfaced by deadline resolution and guarded calls.

use thiserror::Error;

/// Failure while turning user-supplied text into a usable timeout.
///
/// Produced by the templating collaborator and the time string parser. A
/// [`Timeout`](crate::Timeout) never propagates these directly; it stores the
/// rendered message and reports it from the guarded call instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid time string '{0}'.")]
    InvalidTimeString(String),
    #[error("Variable '{0}' not found.")]
    UnknownVariable(String),
    #[error("Variable '{0}' was not closed properly.")]
    UnclosedVariable(String),
}

/// Failure of a guarded call that did not come from the work itself.
///
/// Failures raised by the work travel inside the returned value and are never
/// converted into one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    /// Invalid duration or message template, stored at resolve time.
    #[error("{0}")]
    Configuration(String),
    /// Caller contract violation: timeout never started or never activated.
    #[error("{0}")]
    Framework(String),
    /// The deadline expired before the work finished.
    #[error("{0}")]
    Timeout(String),
    /// Must-propagate failure, e.g. an externally requested stop.
    #[error("{0}")]
    Fatal(String),
}

impl GuardError {
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, GuardError::Timeout(_))
    }

    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, GuardError::Fatal(_))
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            GuardError::Configuration(message)
            | GuardError::Framework(message)
            | GuardError::Timeout(message)
            | GuardError::Fatal(message) => message,
        }
    }
}
