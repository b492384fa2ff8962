//! One-shot capture of the next matching hotkey press
//!
//! Used while the user records a new hotkey. At most one capture is armed;
//! arming again replaces it.

use tracing::debug;

use crate::hotkey::TriggerKeySet;

/// What should happen to the OS keystroke behind a hotkey press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDisposition {
    /// Swallow the keystroke
    Consume,
    /// Hand the keystroke on to the next consumer
    Forward,
}

pub type OneShot = Box<dyn FnOnce() + Send>;

struct Armed {
    combo: TriggerKeySet,
    handler: OneShot,
    forward: bool,
}

#[derive(Default)]
pub struct TestCapture {
    armed: Option<Armed>,
}

impl TestCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a capture for `combo`, replacing any armed one
    pub fn arm(&mut self, combo: TriggerKeySet, handler: OneShot, forward: bool) {
        if let Some(previous) = self.armed.take() {
            debug!(combo = %previous.combo, "replacing armed capture");
        }
        self.armed = Some(Armed {
            combo,
            handler,
            forward,
        });
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    pub fn combo(&self) -> Option<&TriggerKeySet> {
        self.armed.as_ref().map(|a| &a.combo)
    }

    /// Consume the capture if `combo` matches it.
    ///
    /// Returns `None` when nothing is armed or the combo differs.
    pub fn intercept(&mut self, combo: &TriggerKeySet) -> Option<EventDisposition> {
        if self.combo()? != combo {
            return None;
        }
        let armed = self.armed.take()?;
        debug!(combo = %armed.combo, forward = armed.forward, "capture matched");
        (armed.handler)();
        Some(if armed.forward {
            EventDisposition::Forward
        } else {
            EventDisposition::Consume
        })
    }
}

impl std::fmt::Debug for TestCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestCapture")
            .field("combo", &self.combo())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::hotkey::ModifierKey::*;

    fn counter() -> (Arc<AtomicU32>, OneShot) {
        let count = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&count);
        (count, Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }))
    }

    #[test]
    fn test_unarmed_passes_through() {
        let mut capture = TestCapture::new();
        assert_eq!(capture.intercept(&TriggerKeySet::from([LeftCommand])), None);
    }

    #[test]
    fn test_match_fires_once_and_swallows() {
        let mut capture = TestCapture::new();
        let combo = TriggerKeySet::from([RightShift, RightOption]);
        let (count, handler) = counter();
        capture.arm(combo.clone(), handler, false);

        assert_eq!(capture.intercept(&combo), Some(EventDisposition::Consume));
        assert_eq!(capture.intercept(&combo), None);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!capture.is_armed());
    }

    #[test]
    fn test_forward_flag() {
        let mut capture = TestCapture::new();
        let combo = TriggerKeySet::from([LeftControl]);
        let (_, handler) = counter();
        capture.arm(combo.clone(), handler, true);
        assert_eq!(capture.intercept(&combo), Some(EventDisposition::Forward));
    }

    #[test]
    fn test_mismatch_keeps_capture_armed() {
        let mut capture = TestCapture::new();
        let (count, handler) = counter();
        capture.arm(TriggerKeySet::from([LeftControl]), handler, false);
        assert_eq!(capture.intercept(&TriggerKeySet::from([RightControl])), None);
        assert!(capture.is_armed());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_rearming_replaces() {
        let mut capture = TestCapture::new();
        let (first, h1) = counter();
        let (second, h2) = counter();
        capture.arm(TriggerKeySet::from([LeftControl]), h1, false);
        capture.arm(TriggerKeySet::from([LeftOption]), h2, false);
        assert_eq!(capture.intercept(&TriggerKeySet::from([LeftControl])), None);
        assert!(capture.intercept(&TriggerKeySet::from([LeftOption])).is_some());
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }
}
