//! Urgency ordering across nested scopes

use std::cmp::Ordering;
use std::thread;
use std::time::Duration;

use timebox_core::{KeywordTimeout, TimeoutKind};
use timebox_types::{PlainText, most_urgent};

use crate::common::{keyword_timeout, test_timeout};

#[test]
fn inactive_never_outranks_active() {
    let inactive = test_timeout("");
    let active = keyword_timeout("1 hour");

    assert_eq!(inactive.cmp_urgency(&active), Ordering::Greater);
    assert_eq!(active.cmp_urgency(&inactive), Ordering::Less);
}

#[test]
fn three_deadlines_form_a_strict_order() {
    let a = keyword_timeout("1s");
    let b = test_timeout("30s");
    let c = keyword_timeout("2 minutes");

    // antisymmetry
    for (x, y) in [(&*a, &*b), (&*b, &*c), (&*a, &*c)] {
        assert_eq!(x.cmp_urgency(y), Ordering::Less);
        assert_eq!(y.cmp_urgency(x), Ordering::Greater);
    }
    // transitivity: a < b and b < c implies a < c
    assert_eq!(a.cmp_urgency(&c), Ordering::Less);
}

#[test]
fn less_time_left_wins_even_with_larger_budget() {
    let older = keyword_timeout("0.3s");
    thread::sleep(Duration::from_millis(200));
    let newer = keyword_timeout("0.2s");

    assert_eq!(older.cmp_urgency(&newer), Ordering::Less);
}

#[test]
fn most_urgent_picks_inner_keyword_over_outer_test() {
    let test = test_timeout("1 min");
    let keyword = keyword_timeout("5s");
    let unconfigured = keyword_timeout("");

    let picked = most_urgent([&*unconfigured, &*test, &*keyword]).unwrap();
    assert_eq!(picked.kind(), TimeoutKind::Keyword);
    assert!(picked.equals_raw_text("5s"));
}

#[test]
fn invalid_configuration_is_most_urgent() {
    let test = test_timeout("1 min");
    let mut broken = KeywordTimeout::new("not a time", None);
    broken.resolve(&PlainText);
    broken.start();

    let picked = most_urgent([&*test, &*broken]).unwrap();
    assert!(picked.config_error().is_some());
}

#[test]
fn raw_text_comparison_is_separate_from_urgency() {
    let timeout = keyword_timeout("90 s");
    assert!(timeout.equals_raw_text("90 s"));
    assert!(!timeout.equals_raw_text("1 min 30 s"));
}
