//! Core deadline types for timebox.
//!
//! This crate contains the pure data side of a deadline-guarded call: time
//! string parsing, timeout resolution, remaining-budget arithmetic and the
//! urgency ordering between competing timeouts. There is no IO and no thread
//! spawning here; the guard that actually runs work lives in `timebox-core`.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod error;
mod scope;
pub mod timeout;
pub mod timestr;

pub use error::{ConfigError, GuardError};
pub use scope::{KeywordTimeout, TestTimeout};
pub use timeout::{
    INVALID_TIMEOUT_SECS, PlainText, Resolution, Timeout, TimeoutKind, VariableResolver,
    most_urgent,
};
pub use timestr::{format_secs, parse_time_string};
