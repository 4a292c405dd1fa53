//! # Stage: Edge Detector
//!
//! ## Responsibility
//! Turn a per-tick stream of `(value, threshold)` samples into a debounced
//! event count. A rising detector triggers while `value >= threshold`, a
//! falling detector while `value <= threshold`. The count increments once per
//! transition into the triggered state, never once per triggered tick.
//!
//! ## Guarantees
//! - Monotonic: [`EdgeDetector::count`] never decreases and grows by at most
//!   one per [`EdgeDetector::detect`] call
//! - Threshold-agnostic: the threshold may change every tick; only the
//!   triggered/not-triggered transition is remembered
//! - Non-panicking: no arithmetic beyond a saturating increment
//!
//! ## NOT Responsible For
//! - Deciding pass/fail from the count (see [`crate::kpi::KpiCore`])
//! - Resolving the threshold (see [`crate::threshold`])

use serde::{Deserialize, Serialize};

/// Comparison direction of an [`EdgeDetector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Polarity {
    /// Triggered while `value >= threshold`.
    RisingEdge,
    /// Triggered while `value <= threshold`.
    FallingEdge,
}

impl Polarity {
    fn triggered<T: PartialOrd>(self, value: &T, threshold: &T) -> bool {
        match self {
            Polarity::RisingEdge => value >= threshold,
            Polarity::FallingEdge => value <= threshold,
        }
    }
}

impl std::fmt::Display for Polarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Polarity::RisingEdge => write!(f, "rising"),
            Polarity::FallingEdge => write!(f, "falling"),
        }
    }
}

/// Stateful comparator that counts transitions into a triggered condition.
#[derive(Debug, Clone)]
pub struct EdgeDetector<T> {
    previous_value: T,
    event_count: u32,
    latest_state: bool,
    polarity: Polarity,
}

impl<T: PartialOrd + Copy> EdgeDetector<T> {
    pub fn new(polarity: Polarity, sentinel: T) -> Self {
        Self {
            previous_value: sentinel,
            event_count: 0,
            latest_state: false,
            polarity,
        }
    }

    /// Rising-edge detector. Pick a sentinel below any real sample.
    pub fn rising(sentinel: T) -> Self {
        Self::new(Polarity::RisingEdge, sentinel)
    }

    /// Falling-edge detector. Pick a sentinel above any real sample.
    pub fn falling(sentinel: T) -> Self {
        Self::new(Polarity::FallingEdge, sentinel)
    }

    /// Feed one sample. Returns whether this sample is triggered.
    pub fn detect(&mut self, value: T, threshold: T) -> bool {
        let triggered_now = self.polarity.triggered(&value, &threshold);
        if triggered_now && !self.latest_state {
            self.event_count = self.event_count.saturating_add(1);
        }
        self.latest_state = triggered_now;
        self.previous_value = value;
        triggered_now
    }

    pub fn count(&self) -> u32 {
        self.event_count
    }

    pub fn latest_state(&self) -> bool {
        self.latest_state
    }

    /// Last sample fed to [`detect`](Self::detect), or the sentinel before the first one.
    pub fn previous_value(&self) -> T {
        self.previous_value
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }
}

impl EdgeDetector<f64> {
    /// Rising detector over `f64` samples with a `-inf` sentinel.
    pub fn rising_f64() -> Self {
        Self::rising(f64::NEG_INFINITY)
    }

    /// Falling detector over `f64` samples with a `+inf` sentinel.
    pub fn falling_f64() -> Self {
        Self::falling(f64::INFINITY)
    }
}

impl EdgeDetector<bool> {
    /// Rising detector over boolean events; `detect(flag, true)` counts raised flags.
    pub fn rising_flag() -> Self {
        Self::rising(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rising_seed_sequence() {
        let mut d = EdgeDetector::rising(-1e6);
        assert!(d.detect(5.0, 3.0));
        assert_eq!(d.count(), 1);
        assert!(d.detect(4.0, 3.0));
        assert_eq!(d.count(), 1);
        assert!(!d.detect(2.0, 3.0));
        assert_eq!(d.count(), 1);
        assert!(d.detect(6.0, 3.0));
        assert_eq!(d.count(), 2);
    }

    #[test]
    fn test_falling_mirrors_rising() {
        let mut d = EdgeDetector::falling(1e6);
        assert!(d.detect(-5.0, -3.0));
        assert!(d.detect(-4.0, -3.0));
        assert!(!d.detect(-2.0, -3.0));
        assert!(d.detect(-6.0, -3.0));
        assert_eq!(d.count(), 2);
    }

    #[test]
    fn test_equal_value_triggers_both_polarities() {
        let mut up = EdgeDetector::rising_f64();
        let mut down = EdgeDetector::falling_f64();
        assert!(up.detect(3.0, 3.0));
        assert!(down.detect(3.0, 3.0));
    }

    #[test]
    fn test_first_triggered_sample_counts_once() {
        let mut d = EdgeDetector::rising_f64();
        assert_eq!(d.count(), 0);
        assert!(!d.latest_state());
        d.detect(10.0, 0.0);
        assert_eq!(d.count(), 1);
        assert!(d.latest_state());
    }

    #[test]
    fn test_flag_detector() {
        let mut d = EdgeDetector::rising_flag();
        assert!(!d.detect(false, true));
        assert!(d.detect(true, true));
        assert!(d.detect(true, true));
        assert!(!d.detect(false, true));
        assert!(d.detect(true, true));
        assert_eq!(d.count(), 2);
    }

    #[test]
    fn test_previous_value_tracks_last_sample() {
        let mut d = EdgeDetector::falling(i32::MAX);
        assert_eq!(d.previous_value(), i32::MAX);
        d.detect(7, 0);
        assert_eq!(d.previous_value(), 7);
    }

    #[test]
    fn test_polarity_display() {
        assert_eq!(Polarity::RisingEdge.to_string(), "rising");
        assert_eq!(Polarity::FallingEdge.to_string(), "falling");
    }

    #[test]
    fn test_nan_never_triggers() {
        let mut d = EdgeDetector::rising_f64();
        assert!(!d.detect(f64::NAN, 1.0));
        assert_eq!(d.count(), 0);
    }
}
