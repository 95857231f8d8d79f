//! Test and keyword scope interplay

use std::sync::Arc;
use std::time::Duration;

use timebox_core::GuardError;
use timebox_types::most_urgent;

use crate::common::{RecordingMonitor, guard_with, keyword_timeout, test_timeout};

#[test]
fn keyword_timeout_marks_owning_test() {
    let monitor = Arc::new(RecordingMonitor::default());
    let guard = guard_with(&monitor);
    let mut test = test_timeout("1 min");
    let keyword = keyword_timeout("0.02s");

    let chosen = most_urgent([&*test, &*keyword]).unwrap();
    let result = guard.run(chosen, |token| token.sleep(Duration::from_secs(5)));
    let fired = matches!(result, Err(GuardError::Timeout(_)));
    test.mark_keyword_timeout_occurred(fired);

    assert!(fired);
    assert!(!test.timed_out());
    assert!(test.any_timeout_occurred());

    test.mark_keyword_timeout_occurred(false);
    assert!(test.any_timeout_occurred());
}

#[test]
fn test_timeout_applies_when_more_urgent() {
    let monitor = Arc::new(RecordingMonitor::default());
    let guard = guard_with(&monitor);
    let test = test_timeout("0.02s");
    let keyword = keyword_timeout("1 min");

    let chosen = most_urgent([&*test, &*keyword]).unwrap();
    let result = guard.run(chosen, |token| token.sleep(Duration::from_secs(5)));

    assert_eq!(
        result,
        Err(GuardError::Timeout("Test timeout 0.02s exceeded.".into()))
    );
    assert!(test.timed_out());
    assert!(test.any_timeout_occurred());
}
