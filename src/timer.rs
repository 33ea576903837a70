//! Task countdown timer

use serde::{Deserialize, Serialize};

/// Identifies one timer instance.
///
/// Countdown events carry the token of the timer they were issued for, so a
/// completion that arrives after its stage was left can be recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerToken(pub u64);

/// Fixed-duration countdown started at task entry.
///
/// The timer is polled, not scheduled: it tolerates irregular polling and fires its
/// completion at most once.
#[derive(Debug, Clone)]
pub struct TaskTimer {
    token: TimerToken,
    started_at_ms: f64,
    duration_ms: f64,
    fired: bool,
}

/// Snapshot of a running countdown for progress display
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Countdown {
    pub elapsed_ms: f64,
    pub remaining_ms: f64,
    /// Whole seconds left, rounded up (what a countdown display shows)
    pub remaining_secs: u32,
    /// Completed fraction (0-1)
    pub progress: f64,
}

impl TaskTimer {
    pub fn start(token: TimerToken, started_at_ms: f64, duration_ms: f64) -> Self {
        Self {
            token,
            started_at_ms,
            duration_ms,
            fired: false,
        }
    }

    pub fn token(&self) -> TimerToken {
        self.token
    }

    pub fn started_at_ms(&self) -> f64 {
        self.started_at_ms
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration_ms
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    pub fn elapsed_ms(&self, now_ms: f64) -> f64 {
        (now_ms - self.started_at_ms).max(0.0)
    }

    pub fn remaining_ms(&self, now_ms: f64) -> f64 {
        (self.duration_ms - self.elapsed_ms(now_ms)).max(0.0)
    }

    pub fn countdown(&self, now_ms: f64) -> Countdown {
        let elapsed_ms = self.elapsed_ms(now_ms);
        let remaining_ms = self.remaining_ms(now_ms);
        Countdown {
            elapsed_ms,
            remaining_ms,
            remaining_secs: (remaining_ms / 1000.0).ceil() as u32,
            progress: (elapsed_ms / self.duration_ms).min(1.0),
        }
    }

    /// Returns `true` exactly once: on the first poll at or after the deadline
    pub fn poll(&mut self, now_ms: f64) -> bool {
        if self.fired || self.elapsed_ms(now_ms) < self.duration_ms {
            return false;
        }
        self.fired = true;
        true
    }
}
