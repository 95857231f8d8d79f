//! Deadline-guarded execution for timebox.
//!
//! - **`guard`**: runs a unit of work on a worker thread and stops it when the
//!   deadline passes
//! - **`cancel`**: cancellation token and stop hooks shared with the worker
//! - **`signal`**: stop-signal monitor bracketing each guarded call
//! - **`variables`**: `${name}` / `%{ENV}` templating for timeout text
//! - **`process`**: child processes that die with their token

pub mod cancel;
pub mod guard;
pub mod process;
pub mod signal;
pub mod variables;

pub use cancel::{CancelToken, StopError};
pub use guard::{Guard, GuardOptions};
pub use process::{KillOutcome, run_command, try_kill_process_group};
pub use signal::{GuardedCall, SignalMonitor, StopDisposition, StopSignalMonitor};
pub use variables::Variables;

pub use timebox_types::{
    ConfigError, GuardError, KeywordTimeout, TestTimeout, Timeout, TimeoutKind, VariableResolver,
};
