//! Metric derivation
//!
//! Pure functions that turn buffered samples into biomarker values:
//! - Baseline stability (capped population variance)
//! - Peak intensity and reaction latency
//! - Smile symmetry
//! - Blink rate

use crate::types::Sample;

/// Population variance of `values`, capped at 1.0.
///
/// An empty set yields 1.0: absence of signal must never look stable.
pub fn capped_variance<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let values: Vec<f64> = values.into_iter().collect();
    if values.is_empty() {
        return 1.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.min(1.0)
}

/// Mean of the primary and secondary channel variances over the baseline.
///
/// Lower is better. Samples without a secondary value contribute 0 to that channel.
pub fn baseline_stability(samples: &[Sample]) -> f64 {
    let primary = capped_variance(samples.iter().map(|s| s.primary));
    let secondary = capped_variance(samples.iter().map(|s| s.secondary.unwrap_or(0.0)));
    (primary + secondary) / 2.0
}

/// Maximum primary value; 0 for an empty buffer
pub fn peak_intensity(samples: &[Sample]) -> f64 {
    samples
        .iter()
        .map(|s| s.primary)
        .reduce(f64::max)
        .unwrap_or(0.0)
}

/// Time from `task_started_at_ms` to the first sample reaching
/// `peak × target_fraction`, rounded to the nearest millisecond.
///
/// Returns 0 when the buffer is empty or no sample qualifies. A zero peak
/// therefore reads the same as an instantaneous reaction.
pub fn reaction_latency_ms(samples: &[Sample], task_started_at_ms: f64, target_fraction: f64) -> u64 {
    let target = peak_intensity(samples) * target_fraction;
    samples
        .iter()
        .find(|s| s.primary >= target)
        .map(|s| (s.captured_at_ms - task_started_at_ms).round().max(0.0) as u64)
        .unwrap_or(0)
}

/// Symmetry of one left/right reading: `1 − |l − r| / (l + r + ε)`, floored at 0
pub fn pair_symmetry(left: f64, right: f64, epsilon: f64) -> f64 {
    let asymmetry = (left - right).abs() / (left + right + epsilon);
    (1.0 - asymmetry).max(0.0)
}

/// Mean per-sample symmetry carried in the secondary channel; 0 if empty
pub fn mean_symmetry(samples: &[Sample]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let total: f64 = samples.iter().map(|s| s.secondary.unwrap_or(0.0)).sum();
    total / samples.len() as f64
}

/// Events per minute; 0 when the duration is not positive
pub fn blink_rate(event_count: u32, total_duration_secs: f64) -> f64 {
    if total_duration_secs <= 0.0 {
        return 0.0;
    }
    event_count as f64 / total_duration_secs * 60.0
}

/// Duration base for the blink rate: the clock reading of the last frown sample, in seconds.
///
/// This is an absolute monotonic reading, not a span measured from task start.
pub fn blink_duration_base_secs(frown_samples: &[Sample]) -> f64 {
    frown_samples
        .last()
        .map(|s| s.captured_at_ms / 1000.0)
        .unwrap_or(0.0)
}
