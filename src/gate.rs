//! Reset gating
//!
//! Before each expression task the subject's face must return to, and stay in, a
//! neutral position so peak and latency are measured from a clean zero. The gate
//! watches one channel and reports when that has happened, or when it is time to
//! give up waiting.

use crate::config::ProtocolConfig;
use crate::types::{Channel, GateVerdict};

/// Internal progress of a gate
#[derive(Debug, Clone, Copy, PartialEq)]
enum GateState {
    /// Score has not been below threshold since the last above-threshold reading
    Idle,
    /// Continuously relaxed since `since_ms`
    Relaxing { since_ms: f64 },
    /// Final verdict reached; the gate no longer changes
    Settled(GateVerdict),
}

/// Debounced "face returned to neutral" detector for one reset stage
#[derive(Debug, Clone)]
pub struct ResetGate {
    channel: Channel,
    entered_at_ms: f64,
    state: GateState,
    relax_threshold: f64,
    stable_ms: f64,
    timeout_ms: f64,
}

impl ResetGate {
    /// Open a gate on `channel` at `entered_at_ms`
    pub fn new(channel: Channel, entered_at_ms: f64, config: &ProtocolConfig) -> Self {
        Self {
            channel,
            entered_at_ms,
            state: GateState::Idle,
            relax_threshold: config.relax_threshold,
            stable_ms: config.reset_stable_ms,
            timeout_ms: config.reset_timeout_ms,
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn entered_at_ms(&self) -> f64 {
        self.entered_at_ms
    }

    /// Start of the current relaxed streak, if one is running
    pub fn relaxed_since_ms(&self) -> Option<f64> {
        match self.state {
            GateState::Relaxing { since_ms } => Some(since_ms),
            _ => None,
        }
    }

    /// Final verdict, once reached
    pub fn verdict(&self) -> Option<GateVerdict> {
        match self.state {
            GateState::Settled(verdict) => Some(verdict),
            _ => None,
        }
    }

    /// Feed the live channel score at `now_ms`
    pub fn observe(&mut self, score: f64, now_ms: f64) -> GateVerdict {
        if let GateState::Settled(verdict) = self.state {
            return verdict;
        }
        if self.timed_out(now_ms) {
            return self.settle(GateVerdict::TimedOut);
        }

        if score < self.relax_threshold {
            let since_ms = match self.state {
                GateState::Relaxing { since_ms } => since_ms,
                _ => now_ms,
            };
            self.state = GateState::Relaxing { since_ms };
            if now_ms - since_ms >= self.stable_ms {
                return self.settle(GateVerdict::RelaxedAndStable);
            }
        } else {
            self.state = GateState::Idle;
        }

        GateVerdict::StillWaiting
    }

    /// Advance the clock without a score (no face detected this tick).
    ///
    /// Only the timeout can fire; the relaxed streak is left untouched.
    pub fn check_timeout(&mut self, now_ms: f64) -> GateVerdict {
        if let GateState::Settled(verdict) = self.state {
            return verdict;
        }
        if self.timed_out(now_ms) {
            return self.settle(GateVerdict::TimedOut);
        }
        GateVerdict::StillWaiting
    }

    fn timed_out(&self, now_ms: f64) -> bool {
        now_ms - self.entered_at_ms >= self.timeout_ms
    }

    fn settle(&mut self, verdict: GateVerdict) -> GateVerdict {
        log::debug!(
            "{:?} reset gate settled: {:?} after {:.0} ms",
            self.channel,
            verdict,
            match self.state {
                GateState::Relaxing { since_ms } => since_ms - self.entered_at_ms,
                _ => 0.0,
            }
        );
        self.state = GateState::Settled(verdict);
        verdict
    }
}
