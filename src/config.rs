//! Protocol configuration
//!
//! The capture protocol runs on a small set of fixed constants. They are grouped
//! here so a session can be replayed with the exact parameters it was run with.

use serde::{Deserialize, Serialize};

use crate::error::CaptureError;

/// Duration of each timed task stage (ms)
pub const TASK_DURATION_MS: f64 = 5000.0;
/// Score below which the face counts as relaxed
pub const RELAX_THRESHOLD: f64 = 0.3;
/// Continuous relaxed time required before a task starts (ms)
pub const RESET_STABLE_MS: f64 = 1000.0;
/// Time after which a reset stage gives up waiting (ms)
pub const RESET_TIMEOUT_MS: f64 = 4000.0;
/// Blink score above which a reading counts as a blink
pub const BLINK_THRESHOLD: f64 = 0.5;
/// Minimum spacing between counted blinks (ms)
pub const BLINK_DEBOUNCE_MS: f64 = 200.0;
/// Fraction of peak used as the latency target
pub const LATENCY_TARGET_FRACTION: f64 = 0.5;
/// Minimum interval between sampling ticks (ms, ~30 Hz)
pub const SAMPLE_INTERVAL_MS: f64 = 33.0;
/// Interval between countdown ticks (ms, 10 Hz)
pub const COUNTDOWN_INTERVAL_MS: f64 = 100.0;
/// Guard against a zero denominator in the symmetry ratio
pub const SYMMETRY_EPSILON: f64 = 1e-6;

/// Thresholds used to derive the session summary
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreeningThresholds {
    /// Baseline stability above this is flagged
    pub max_baseline_stability: f64,
    /// Smile peak below this is flagged
    pub min_smile_peak: f64,
    /// Frown peak below this is flagged
    pub min_frown_peak: f64,
    /// Smile symmetry below this is flagged
    pub min_smile_symmetry: f64,
}

impl Default for ScreeningThresholds {
    fn default() -> Self {
        Self {
            max_baseline_stability: 0.5,
            min_smile_peak: 0.3,
            min_frown_peak: 0.3,
            min_smile_symmetry: 0.6,
        }
    }
}

/// Full parameter set of the capture protocol
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub task_duration_ms: f64,
    pub relax_threshold: f64,
    pub reset_stable_ms: f64,
    pub reset_timeout_ms: f64,
    pub blink_threshold: f64,
    pub blink_debounce_ms: f64,
    pub latency_target_fraction: f64,
    pub sample_interval_ms: f64,
    pub countdown_interval_ms: f64,
    pub symmetry_epsilon: f64,
    pub screening: ScreeningThresholds,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            task_duration_ms: TASK_DURATION_MS,
            relax_threshold: RELAX_THRESHOLD,
            reset_stable_ms: RESET_STABLE_MS,
            reset_timeout_ms: RESET_TIMEOUT_MS,
            blink_threshold: BLINK_THRESHOLD,
            blink_debounce_ms: BLINK_DEBOUNCE_MS,
            latency_target_fraction: LATENCY_TARGET_FRACTION,
            sample_interval_ms: SAMPLE_INTERVAL_MS,
            countdown_interval_ms: COUNTDOWN_INTERVAL_MS,
            symmetry_epsilon: SYMMETRY_EPSILON,
            screening: ScreeningThresholds::default(),
        }
    }
}

impl ProtocolConfig {
    /// Check that durations are positive and score thresholds lie in (0, 1]
    pub fn validate(&self) -> Result<(), CaptureError> {
        let durations = [
            ("task_duration_ms", self.task_duration_ms),
            ("reset_stable_ms", self.reset_stable_ms),
            ("reset_timeout_ms", self.reset_timeout_ms),
            ("blink_debounce_ms", self.blink_debounce_ms),
            ("sample_interval_ms", self.sample_interval_ms),
            ("countdown_interval_ms", self.countdown_interval_ms),
            ("symmetry_epsilon", self.symmetry_epsilon),
        ];
        for (name, value) in durations {
            if !(value.is_finite() && value > 0.0) {
                return Err(CaptureError::InvalidConfig(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }

        let fractions = [
            ("relax_threshold", self.relax_threshold),
            ("blink_threshold", self.blink_threshold),
            ("latency_target_fraction", self.latency_target_fraction),
            (
                "screening.max_baseline_stability",
                self.screening.max_baseline_stability,
            ),
            ("screening.min_smile_peak", self.screening.min_smile_peak),
            ("screening.min_frown_peak", self.screening.min_frown_peak),
            (
                "screening.min_smile_symmetry",
                self.screening.min_smile_symmetry,
            ),
        ];
        for (name, value) in fractions {
            if !(value > 0.0 && value <= 1.0) {
                return Err(CaptureError::InvalidConfig(format!(
                    "{name} must be in (0, 1], got {value}"
                )));
            }
        }

        if self.reset_stable_ms > self.reset_timeout_ms {
            log::warn!(
                "reset_stable_ms ({}) exceeds reset_timeout_ms ({}); reset gates will always time out",
                self.reset_stable_ms,
                self.reset_timeout_ms
            );
        }

        Ok(())
    }

    /// Load and validate a configuration from JSON. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, CaptureError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
