//! Resolved timeouts and the urgency ordering between them.
//!
//! A [`Timeout`] moves through three resolution states:
//!
//! ```text
//! new(raw) --resolve()--> Resolved { secs }   active when secs > 0
//!                   \---> Invalid { error }   active, expires at once
//!          (raw empty)--> Unresolved          never active
//! ```
//!
//! Resolution failures are stored, not returned. The guarded call reports them
//! so that scope setup never aborts on a bad timeout value.

use std::cmp::Ordering;
use std::fmt;
use std::time::Instant;

use crate::error::{ConfigError, GuardError};
use crate::timestr::parse_time_string;

/// Budget of a timeout whose configuration failed.
///
/// Positive so the timeout still counts as active, small enough that it has
/// always expired by the time anything reads it.
pub const INVALID_TIMEOUT_SECS: f64 = 0.000_001;

/// Which scope a timeout belongs to. Only affects message wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeoutKind {
    Test,
    Keyword,
}

impl TimeoutKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            TimeoutKind::Test => "test",
            TimeoutKind::Keyword => "keyword",
        }
    }

    /// Label with the first letter capitalized, for the start of a sentence.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            TimeoutKind::Test => "Test",
            TimeoutKind::Keyword => "Keyword",
        }
    }
}

impl fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Templating collaborator applied to timeout and message text.
pub trait VariableResolver {
    fn replace_string(&self, text: &str) -> Result<String, ConfigError>;
}

/// Resolver that returns text unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainText;

impl VariableResolver for PlainText {
    fn replace_string(&self, text: &str) -> Result<String, ConfigError> {
        Ok(text.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Unresolved,
    Invalid { error: String },
    Resolved { secs: f64 },
}

impl Resolution {
    /// Effective budget in seconds, `None` while unresolved.
    #[must_use]
    pub fn secs(&self) -> Option<f64> {
        match self {
            Resolution::Unresolved => None,
            Resolution::Invalid { .. } => Some(INVALID_TIMEOUT_SECS),
            Resolution::Resolved { secs } => Some(*secs),
        }
    }
}

/// A deadline: resolved budget plus the instant the owning scope started it.
#[derive(Debug, Clone)]
pub struct Timeout {
    kind: TimeoutKind,
    raw: String,
    message: Option<String>,
    resolution: Resolution,
    started: Option<Instant>,
}

impl Timeout {
    /// Create an unresolved timeout. Empty `raw` means "not configured";
    /// an empty `message` is treated as no message.
    #[must_use]
    pub fn new(kind: TimeoutKind, raw: impl Into<String>, message: Option<String>) -> Self {
        Self {
            kind,
            raw: raw.into(),
            message: message.filter(|m| !m.is_empty()),
            resolution: Resolution::Unresolved,
            started: None,
        }
    }

    #[must_use]
    pub fn unconfigured(kind: TimeoutKind) -> Self {
        Self::new(kind, String::new(), None)
    }

    #[must_use]
    pub const fn kind(&self) -> TimeoutKind {
        self.kind
    }

    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    #[must_use]
    pub const fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.raw.is_empty()
    }

    /// Stored configuration failure, if resolution failed.
    #[must_use]
    pub fn config_error(&self) -> Option<&str> {
        match &self.resolution {
            Resolution::Invalid { error } => Some(error),
            _ => None,
        }
    }

    /// Template the timeout and message text, then parse the duration.
    ///
    /// Failures are recorded as [`Resolution::Invalid`] and surface later from
    /// the guarded call.
    pub fn resolve<R>(&mut self, resolver: &R)
    where
        R: VariableResolver + ?Sized,
    {
        if let Err(err) = self.try_resolve(resolver) {
            self.resolution = Resolution::Invalid {
                error: format!("Setting {} timeout failed: {err}", self.kind),
            };
        }
    }

    fn try_resolve<R>(&mut self, resolver: &R) -> Result<(), ConfigError>
    where
        R: VariableResolver + ?Sized,
    {
        self.raw = resolver.replace_string(&self.raw)?;
        if self.raw.is_empty() {
            return Ok(());
        }
        let secs = parse_time_string(&self.raw)?;
        if let Some(message) = &self.message {
            self.message = Some(resolver.replace_string(message)?);
        }
        self.resolution = Resolution::Resolved { secs };
        Ok(())
    }

    /// Record the start instant. Calling again restarts the clock.
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.started.is_some()
    }

    #[must_use]
    pub fn active(&self) -> bool {
        self.resolution.secs().is_some_and(|secs| secs > 0.0)
    }

    /// Remaining budget in seconds; negative once the deadline has passed.
    pub fn time_left(&self) -> Result<f64, GuardError> {
        let started = self
            .started
            .ok_or_else(|| GuardError::Framework("Timeout not started.".to_string()))?;
        let budget = self.resolution.secs().unwrap_or(0.0);
        Ok(budget - started.elapsed().as_secs_f64())
    }

    /// Whether an active, started timeout has run out of budget.
    ///
    /// Calling this on an active timeout before `start` is a caller bug and
    /// panics in debug builds; release builds report `false`.
    #[must_use]
    pub fn timed_out(&self) -> bool {
        if !self.active() {
            return false;
        }
        debug_assert!(self.is_started(), "timed_out() called before start()");
        self.time_left().is_ok_and(|left| left < 0.0)
    }

    /// Failure message: the explicit message, or
    /// `"<Label> timeout <raw> exceeded."`.
    #[must_use]
    pub fn get_message(&self) -> String {
        match &self.message {
            Some(message) => message.clone(),
            None => format!("{} timeout {} exceeded.", self.kind.title(), self.raw),
        }
    }

    /// Diagnostic line announcing the remaining budget.
    #[must_use]
    pub fn announcement(&self, left: f64) -> String {
        format!(
            "{} timeout {} active. {left:.3} seconds left.",
            self.kind.title(),
            self.raw
        )
    }

    /// Lexical comparison against configuration text.
    #[must_use]
    pub fn equals_raw_text(&self, text: &str) -> bool {
        self.raw == text
    }

    /// Order by urgency: less time left sorts first, inactive timeouts last.
    ///
    /// Active timeouts that were never started rank by their full budget.
    #[must_use]
    pub fn cmp_urgency(&self, other: &Timeout) -> Ordering {
        match (self.urgency_key(), other.urgency_key()) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(left), Some(right)) => left.total_cmp(&right),
        }
    }

    fn urgency_key(&self) -> Option<f64> {
        if !self.active() {
            return None;
        }
        match self.time_left() {
            Ok(left) => Some(left),
            Err(_) => self.resolution.secs(),
        }
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// The most urgent active timeout, or `None` when none is active.
pub fn most_urgent<'a, I>(timeouts: I) -> Option<&'a Timeout>
where
    I: IntoIterator<Item = &'a Timeout>,
{
    timeouts
        .into_iter()
        .filter(|timeout| timeout.active())
        .min_by(|a, b| a.cmp_urgency(b))
}
