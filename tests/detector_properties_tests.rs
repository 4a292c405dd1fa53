//! Property tests for the edge detector: monotonic count, debounce, polarity
//! symmetry and thresholds that change every tick.

use kpi_grading::detector::EdgeDetector;
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn samples(max_len: usize) -> impl Strategy<Value = Vec<(f64, f64)>> {
    proptest::collection::vec((-100.0f64..=100.0, -100.0f64..=100.0), 1..=max_len)
}

/// Number of false→true transitions in a triggered-state sequence, starting from false.
fn rising_transitions(states: &[bool]) -> u32 {
    let mut prev = false;
    let mut n = 0;
    for &s in states {
        if s && !prev {
            n += 1;
        }
        prev = s;
    }
    n
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn count_is_monotonic_and_steps_by_at_most_one(seq in samples(200)) {
        let mut d = EdgeDetector::rising_f64();
        let mut last = d.count();
        for (v, t) in seq {
            d.detect(v, t);
            let now = d.count();
            prop_assert!(now >= last);
            prop_assert!(now - last <= 1);
            last = now;
        }
    }

    #[test]
    fn consecutive_triggers_count_once(
        threshold in -50.0f64..=50.0,
        excess in proptest::collection::vec(0.0f64..=50.0, 1..=100),
    ) {
        let mut d = EdgeDetector::rising_f64();
        for e in excess {
            prop_assert!(d.detect(threshold + e, threshold));
        }
        prop_assert_eq!(d.count(), 1);
    }

    #[test]
    fn falling_mirrors_rising_on_negated_input(seq in samples(200)) {
        let mut up = EdgeDetector::rising_f64();
        let mut down = EdgeDetector::falling_f64();
        for (v, t) in seq {
            let a = up.detect(v, t);
            let b = down.detect(-v, -t);
            prop_assert_eq!(a, b);
            prop_assert_eq!(up.count(), down.count());
            prop_assert_eq!(up.latest_state(), down.latest_state());
        }
    }

    #[test]
    fn varying_threshold_counts_transitions(seq in samples(200)) {
        let mut d = EdgeDetector::rising_f64();
        let states: Vec<bool> = seq.iter().map(|&(v, t)| d.detect(v, t)).collect();
        let expected: Vec<bool> = seq.iter().map(|&(v, t)| v >= t).collect();
        prop_assert_eq!(&states, &expected);
        prop_assert_eq!(d.count(), rising_transitions(&states));
    }

    #[test]
    fn latest_state_matches_last_comparison(seq in samples(50)) {
        let mut d = EdgeDetector::falling_f64();
        for &(v, t) in &seq {
            d.detect(v, t);
        }
        let &(v, t) = seq.last().unwrap();
        prop_assert_eq!(d.latest_state(), v <= t);
        prop_assert_eq!(d.previous_value(), v);
    }
}

// ---------------------------------------------------------------------------
// Fixed sequences
// ---------------------------------------------------------------------------

#[test]
fn test_threshold_moving_under_constant_value() {
    // value stays at 5, the limit drops below it twice
    let mut d = EdgeDetector::rising_f64();
    for t in [6.0, 4.0, 4.5, 7.0, 5.0, 8.0] {
        d.detect(5.0, t);
    }
    assert_eq!(d.count(), 2);
}
