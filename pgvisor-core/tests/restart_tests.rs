use pgvisor_core::{RestartDecision, RestartPolicy, RestartTracker};
use std::time::Duration;

#[test]
fn test_limited_restarts_allow_exactly_max() {
    let delay = Duration::from_millis(10);
    let mut tracker = RestartTracker::new(RestartPolicy::from_limit(3, delay));

    let mut retries = 0;
    loop {
        match tracker.next() {
            RestartDecision::Retry { attempt, delay: d } => {
                retries += 1;
                assert_eq!(attempt, retries);
                assert_eq!(d, delay);
            }
            RestartDecision::Exhausted { restarts } => {
                assert_eq!(restarts, 3);
                break;
            }
            RestartDecision::Done => panic!("limited policy never reports done"),
        }
    }

    // 1 initial run + 3 restarts
    assert_eq!(retries + 1, 4);
}

#[test]
fn test_single_restart_budget() {
    let mut tracker = RestartTracker::new(RestartPolicy::from_limit(1, Duration::ZERO));

    assert!(matches!(tracker.next(), RestartDecision::Retry { attempt: 1, .. }));
    assert!(matches!(
        tracker.next(),
        RestartDecision::Exhausted { restarts: 1 }
    ));
}

#[test]
fn test_forever_never_exhausts() {
    let mut tracker = RestartTracker::new(RestartPolicy::from_limit(0, Duration::from_millis(1)));

    for expected in 1..=1_000 {
        match tracker.next() {
            RestartDecision::Retry { attempt, .. } => assert_eq!(attempt, expected),
            other => panic!("unexpected decision {other:?}"),
        }
        assert!(!tracker.is_exhausted());
    }
    assert_eq!(tracker.restarts(), 1_000);
}

#[test]
fn test_counter_is_monotonic_after_exhaustion() {
    let mut tracker = RestartTracker::new(RestartPolicy::from_limit(2, Duration::ZERO));

    tracker.next();
    tracker.next();
    for _ in 0..5 {
        tracker.next();
        assert_eq!(tracker.restarts(), 2);
    }
    assert!(tracker.is_exhausted());
}

#[test]
fn test_policy_accessors() {
    let never = RestartPolicy::Never;
    assert!(!never.is_enabled());
    assert_eq!(never.delay(), Duration::ZERO);
    assert_eq!(never.to_string(), "never");

    let limited = RestartPolicy::from_limit(10, Duration::from_secs(10));
    assert!(limited.is_enabled());
    assert_eq!(limited.max_restarts(), Some(10));
    assert_eq!(limited.to_string(), "up to 10 every 10s");

    let forever = RestartPolicy::from_limit(0, Duration::from_secs(1));
    assert!(forever.is_enabled());
    assert_eq!(forever.to_string(), "forever every 1s");
}
