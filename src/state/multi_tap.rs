//! Multi-tap detection for modifier chords

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::hotkey::TriggerKeySet;

/// Default window between taps of the same chord
pub const DEFAULT_THRESHOLD: Duration = Duration::from_millis(400);

/// Counts consecutive taps of each distinct chord.
///
/// Records are kept per chord and never evicted; there are at most 256.
#[derive(Debug)]
pub struct MultiTapDetector {
    threshold: Duration,
    records: HashMap<TriggerKeySet, (Instant, u32)>,
}

impl MultiTapDetector {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            records: HashMap::new(),
        }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Record a tap of `keys` at `now` and return its consecutive count
    pub fn tap(&mut self, keys: &TriggerKeySet, now: Instant) -> u32 {
        let count = match self.records.get(keys) {
            Some((last, count)) if now.saturating_duration_since(*last) <= self.threshold => {
                count + 1
            }
            _ => 1,
        };
        self.records.insert(keys.clone(), (now, count));
        count
    }
}

impl Default for MultiTapDetector {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::ModifierKey::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_window_resets_after_threshold() {
        let mut detector = MultiTapDetector::default();
        let set = TriggerKeySet::from([LeftControl, LeftCommand]);
        let t0 = Instant::now();
        assert_eq!(detector.tap(&set, t0), 1);
        assert_eq!(detector.tap(&set, t0 + ms(100)), 2);
        assert_eq!(detector.tap(&set, t0 + ms(600)), 1);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let mut detector = MultiTapDetector::default();
        let set = TriggerKeySet::from([RightOption]);
        let t0 = Instant::now();
        detector.tap(&set, t0);
        assert_eq!(detector.tap(&set, t0 + ms(400)), 2);
        assert_eq!(detector.tap(&set, t0 + ms(800)), 3);
    }

    #[test]
    fn test_chords_counted_independently() {
        let mut detector = MultiTapDetector::default();
        let a = TriggerKeySet::from([LeftCommand]);
        let b = TriggerKeySet::from([RightCommand]);
        let t0 = Instant::now();
        assert_eq!(detector.tap(&a, t0), 1);
        assert_eq!(detector.tap(&b, t0 + ms(50)), 1);
        assert_eq!(detector.tap(&a, t0 + ms(100)), 2);
        assert_eq!(detector.tap(&b, t0 + ms(150)), 2);
    }

    #[test]
    fn test_keyed_by_content_not_order() {
        let mut detector = MultiTapDetector::default();
        let t0 = Instant::now();
        detector.tap(&TriggerKeySet::from([LeftControl, LeftOption]), t0);
        let count = detector.tap(&TriggerKeySet::from([LeftOption, LeftControl]), t0 + ms(10));
        assert_eq!(count, 2);
    }
}
