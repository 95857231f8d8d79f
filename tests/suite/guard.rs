//! Guarded execution scenarios

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use timebox_core::{GuardError, KeywordTimeout, Variables};
use timebox_types::INVALID_TIMEOUT_SECS;

use crate::common::{RecordingMonitor, guard_with, keyword_timeout};

#[test]
fn work_finishing_in_time_returns_its_value() {
    let monitor = Arc::new(RecordingMonitor::default());
    let guard = guard_with(&monitor);
    let timeout = keyword_timeout("2s");

    let result = guard.run(&timeout, |_| {
        thread::sleep(Duration::from_millis(10));
        42
    });

    assert_eq!(result, Ok(42));
    assert_eq!(monitor.begins(), 1);
    assert_eq!(monitor.ends(), 1);
}

#[test]
fn slow_work_times_out_within_the_deadline_window() {
    let monitor = Arc::new(RecordingMonitor::default());
    let guard = guard_with(&monitor);
    let timeout = keyword_timeout("0.01s");
    let stopped = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stopped);

    let started = Instant::now();
    let result = guard.run(&timeout, move |token| {
        token.on_stop(move || {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });
        thread::sleep(Duration::from_secs(5));
    });

    assert_eq!(
        result,
        Err(GuardError::Timeout("Keyword timeout 0.01s exceeded.".into()))
    );
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(stopped.load(Ordering::SeqCst));
    assert_eq!(monitor.depth(), 0);
}

#[test]
fn bad_duration_surfaces_as_configuration_error_without_spawning() {
    let monitor = Arc::new(RecordingMonitor::default());
    let guard = guard_with(&monitor);
    let mut timeout = KeywordTimeout::new("bogus", None);
    timeout.resolve(&Variables::new());
    timeout.start();

    assert!(timeout.active());
    assert_eq!(timeout.resolution().secs(), Some(INVALID_TIMEOUT_SECS));

    let spawned = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&spawned);
    let result = guard.run(&timeout, move |_| flag.store(true, Ordering::SeqCst));

    assert_eq!(
        result,
        Err(GuardError::Configuration(
            "Setting keyword timeout failed: Invalid time string 'bogus'.".into()
        ))
    );
    assert!(!spawned.load(Ordering::SeqCst));
    assert_eq!(monitor.begins(), 0);
}

#[test]
fn unknown_variable_surfaces_as_configuration_error() {
    let monitor = Arc::new(RecordingMonitor::default());
    let guard = guard_with(&monitor);
    let mut timeout = KeywordTimeout::new("${limit}", None);
    timeout.resolve(&Variables::new());
    timeout.start();

    let result = guard.run(&timeout, |_| ());
    assert_eq!(
        result,
        Err(GuardError::Configuration(
            "Setting keyword timeout failed: Variable '${limit}' not found.".into()
        ))
    );
}

#[test]
fn templated_duration_and_message_resolve() {
    let monitor = Arc::new(RecordingMonitor::default());
    let guard = guard_with(&monitor);
    let variables: Variables = [("limit", "0.02s"), ("who", "deploy")].into_iter().collect();
    let mut timeout = KeywordTimeout::new("${limit}", Some("${who} took too long".into()));
    timeout.resolve(&variables);
    timeout.start();

    assert!(timeout.equals_raw_text("0.02s"));
    let result = guard.run(&timeout, |token| token.sleep(Duration::from_secs(5)));
    assert_eq!(result, Err(GuardError::Timeout("deploy took too long".into())));
}

#[test]
fn exhausted_budget_fails_without_spawning() {
    let monitor = Arc::new(RecordingMonitor::default());
    let guard = guard_with(&monitor);
    let timeout = keyword_timeout("0.01s");
    thread::sleep(Duration::from_millis(30));

    let spawned = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&spawned);
    let result = guard.run(&timeout, move |_| flag.store(true, Ordering::SeqCst));

    assert_eq!(
        result,
        Err(GuardError::Timeout("Keyword timeout 0.01s exceeded.".into()))
    );
    thread::sleep(Duration::from_millis(20));
    assert!(!spawned.load(Ordering::SeqCst));
    assert_eq!(monitor.begins(), monitor.ends());
}

#[test]
fn unconfigured_timeout_is_a_framework_error() {
    let monitor = Arc::new(RecordingMonitor::default());
    let guard = guard_with(&monitor);
    let timeout = keyword_timeout("");

    assert!(!timeout.active());
    assert_eq!(
        guard.run(&timeout, |_| ()),
        Err(GuardError::Framework("Timeout is not active.".into()))
    );
}

#[test]
fn restarting_the_clock_gives_a_fresh_budget() {
    let monitor = Arc::new(RecordingMonitor::default());
    let guard = guard_with(&monitor);
    let mut timeout = keyword_timeout("0.2s");
    thread::sleep(Duration::from_millis(250));
    assert!(timeout.timed_out());

    timeout.start();
    assert_eq!(guard.run(&timeout, |_| "done"), Ok("done"));
}

#[test]
fn worker_runs_on_a_named_thread() {
    let monitor = Arc::new(RecordingMonitor::default());
    let guard = guard_with(&monitor);
    let timeout = keyword_timeout("2s");

    let name = guard.run(&timeout, |_| {
        thread::current().name().map(ToString::to_string)
    });
    assert_eq!(name, Ok(Some("timebox-test-worker".to_string())));
}

#[test]
fn nested_guarded_calls_nest_brackets() {
    let monitor = Arc::new(RecordingMonitor::default());
    let outer_guard = guard_with(&monitor);
    let inner_monitor = Arc::clone(&monitor);
    let outer = keyword_timeout("5s");

    let result = outer_guard.run(&outer, move |_| {
        let inner_guard = guard_with(&inner_monitor);
        let inner = keyword_timeout("0.02s");
        inner_guard.run(&inner, |token| token.sleep(Duration::from_secs(5)))
    });

    assert_eq!(
        result,
        Ok(Err(GuardError::Timeout("Keyword timeout 0.02s exceeded.".into())))
    );
    assert_eq!(monitor.max_depth(), 2);
    assert_eq!(monitor.depth(), 0);
    assert_eq!(monitor.begins(), 2);
    assert_eq!(monitor.ends(), 2);
}

#[cfg(unix)]
#[test]
fn child_process_is_killed_on_timeout() {
    use std::process::Command;
    use timebox_core::run_command;

    let monitor = Arc::new(RecordingMonitor::default());
    let guard = guard_with(&monitor);
    let timeout = keyword_timeout("0.1s");

    let started = Instant::now();
    let result = guard.run(&timeout, |token| {
        let mut command = Command::new("sh");
        command.arg("-c").arg("sleep 5");
        run_command(&mut command, token).map(|status| status.code())
    });

    assert!(result.unwrap_err().is_timeout());
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[cfg(unix)]
#[test]
fn child_process_result_passes_through() {
    use std::process::Command;
    use timebox_core::run_command;

    let monitor = Arc::new(RecordingMonitor::default());
    let guard = guard_with(&monitor);
    let timeout = keyword_timeout("5s");

    let result = guard.run(&timeout, |token| {
        let mut command = Command::new("sh");
        command.arg("-c").arg("exit 7");
        run_command(&mut command, token).map(|status| status.code())
    });

    assert_eq!(result.unwrap().unwrap(), Some(7));
}
