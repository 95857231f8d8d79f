//! Child processes that die with their cancellation token.
//!
//! A worker thread cannot be killed, but a child process can. Work that must
//! stop hard when its deadline passes should run in a child: the child gets
//! its own session (Unix), and a stop hook kills the whole process group.

use std::io;
use std::process::{Child, Command, ExitStatus};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use crate::cancel::{CancelToken, StopError};

const CHILD_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillOutcome {
    NotRunning,
    Killed,
}

/// Spawn `command` and wait for it, killing it when `token` is stopped.
///
/// Returns the exit status, which after cancellation is the status of the
/// killed child.
pub fn run_command(command: &mut Command, token: &CancelToken) -> io::Result<ExitStatus> {
    #[cfg(unix)]
    set_new_session(command);

    let mut child = command.spawn()?;
    let pid = child.id();
    // Set while holding the lock that reaps the child, so the hook never
    // signals a pid that may have been recycled.
    let reaped = Arc::new(Mutex::new(false));
    let hook_reaped = Arc::clone(&reaped);
    token.on_stop(move || {
        let reaped = hook_reaped.lock().unwrap_or_else(PoisonError::into_inner);
        if *reaped {
            return Ok(());
        }
        try_kill_process_group(pid)
            .map(|outcome| {
                tracing::debug!(pid, ?outcome, "Killed process group on stop");
            })
            .map_err(|err| StopError::Failed(format!("kill process group {pid}: {err}")))
    });

    wait_or_kill(&mut child, token, &reaped)
}

fn wait_or_kill(
    child: &mut Child,
    token: &CancelToken,
    reaped: &Mutex<bool>,
) -> io::Result<ExitStatus> {
    loop {
        {
            let mut reaped = reaped.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(status) = child.try_wait()? {
                *reaped = true;
                return Ok(status);
            }
        }
        if token.is_cancelled() {
            let _ = child.kill();
            let mut reaped = reaped.lock().unwrap_or_else(PoisonError::into_inner);
            let status = child.wait();
            *reaped = true;
            return status;
        }
        thread::sleep(CHILD_POLL_INTERVAL);
    }
}

/// Terminate a process (and its process group on Unix) best-effort.
///
/// On Unix this targets the process group id matching `pid` ([`run_command`]
/// creates a new session for the child, making pid == process group id).
pub fn try_kill_process_group(pid: u32) -> io::Result<KillOutcome> {
    #[cfg(unix)]
    unsafe {
        if libc::killpg(pid as i32, libc::SIGKILL) == -1 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::ESRCH) {
                return Ok(KillOutcome::NotRunning);
            }
            return Err(err);
        }
        Ok(KillOutcome::Killed)
    }

    // The polling loop in `run_command` kills the child directly.
    #[cfg(not(unix))]
    {
        let _ = pid;
        Ok(KillOutcome::NotRunning)
    }
}

/// Put the child process in its own session so the entire process group can
/// be killed via `killpg`.
#[cfg(unix)]
fn set_new_session(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    unsafe {
        command.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(io::Error::last_os_error());
            }
            // Linux-only: the child dies if timebox dies (kill -9 / forced exit).
            #[cfg(target_os = "linux")]
            if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGKILL) == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }
}
