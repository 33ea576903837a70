//! Blink event counting
//!
//! A sustained blink spans several sampling ticks. Readings above the blink
//! threshold are only counted when enough time has passed since the last
//! *counted* event, so one blink is never counted twice.

use crate::config::ProtocolConfig;

/// Debounced blink event counter shared by the smile and frown tasks
#[derive(Debug, Clone)]
pub struct BlinkCounter {
    threshold: f64,
    debounce_ms: f64,
    event_times_ms: Vec<f64>,
}

impl BlinkCounter {
    pub fn new(config: &ProtocolConfig) -> Self {
        Self {
            threshold: config.blink_threshold,
            debounce_ms: config.blink_debounce_ms,
            event_times_ms: Vec::new(),
        }
    }

    /// Feed one blink reading. Returns `true` if it was counted as a new event.
    pub fn observe(&mut self, blink_score: f64, now_ms: f64) -> bool {
        if blink_score <= self.threshold {
            return false;
        }
        if let Some(&last) = self.event_times_ms.last() {
            if now_ms - last < self.debounce_ms {
                return false;
            }
        }
        self.event_times_ms.push(now_ms);
        log::debug!("blink #{} at {:.0} ms", self.event_times_ms.len(), now_ms);
        true
    }

    /// Number of counted events
    pub fn count(&self) -> u32 {
        self.event_times_ms.len() as u32
    }

    /// Times of counted events, in order
    pub fn event_times_ms(&self) -> &[f64] {
        &self.event_times_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn counter() -> BlinkCounter {
        BlinkCounter::new(&ProtocolConfig::default())
    }

    #[test]
    fn test_debounce_anchors_to_last_counted_event() {
        let mut blinks = counter();

        assert!(blinks.observe(0.6, 0.0));
        assert!(!blinks.observe(0.7, 100.0));
        // 250 ms after the last counted event at t=0, not after the suppressed one
        assert!(blinks.observe(0.6, 250.0));

        assert_eq!(blinks.count(), 2);
        assert_eq!(blinks.event_times_ms(), &[0.0, 250.0]);
    }

    #[test]
    fn test_spacing_boundary() {
        let mut blinks = counter();
        assert!(blinks.observe(0.9, 1000.0));
        assert!(!blinks.observe(0.9, 1199.0));
        assert!(blinks.observe(0.9, 1200.0));
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let mut blinks = counter();
        assert!(!blinks.observe(0.5, 0.0));
        assert!(!blinks.observe(0.1, 500.0));
        assert_eq!(blinks.count(), 0);
        assert!(blinks.observe(0.51, 1000.0));
    }

    proptest! {
        #[test]
        fn prop_counted_events_are_spaced(
            readings in prop::collection::vec((1.0f64..300.0, 0.0f64..1.0), 0..300)
        ) {
            let mut blinks = counter();
            let mut now = 0.0;
            for (dt, score) in readings {
                now += dt;
                blinks.observe(score, now);
            }
            for pair in blinks.event_times_ms().windows(2) {
                prop_assert!(pair[1] - pair[0] >= 200.0);
            }
        }
    }
}
