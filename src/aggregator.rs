//! Biomarker aggregation
//!
//! Assembles metric outputs into the final record and applies the screening rule.
//! Nothing here has side effects; persistence is the caller's job.

use crate::config::{ProtocolConfig, ScreeningThresholds};
use crate::metrics;
use crate::types::{
    BiomarkerRecord, Biomarkers, FrownMetrics, Sample, ScreeningFlag, SmileMetrics, Subject,
    Summary,
};

/// Everything the session buffered that the record is derived from
#[derive(Debug, Clone, Copy)]
pub struct SessionSamples<'a> {
    pub baseline: &'a [Sample],
    pub smile: &'a [Sample],
    pub frown: &'a [Sample],
    pub smile_started_at_ms: f64,
    pub frown_started_at_ms: f64,
    pub blink_count: u32,
}

/// Builds biomarker records
pub struct BiomarkerAggregator;

impl BiomarkerAggregator {
    /// Derive all metrics and classify them into a record
    pub fn aggregate(
        subject: Subject,
        samples: &SessionSamples<'_>,
        config: &ProtocolConfig,
    ) -> BiomarkerRecord {
        let biomarkers = Self::derive(samples, config);
        let (summary, flags) = Self::classify(&biomarkers, &config.screening);

        BiomarkerRecord {
            subject,
            biomarkers,
            summary,
            flags,
        }
    }

    /// Compute the biomarker values from buffered samples
    pub fn derive(samples: &SessionSamples<'_>, config: &ProtocolConfig) -> Biomarkers {
        let fraction = config.latency_target_fraction;

        let smile_metrics = SmileMetrics {
            peak_intensity: metrics::peak_intensity(samples.smile).min(1.0),
            latency_ms: metrics::reaction_latency_ms(
                samples.smile,
                samples.smile_started_at_ms,
                fraction,
            ),
            symmetry: metrics::mean_symmetry(samples.smile).min(1.0),
        };

        let frown_metrics = FrownMetrics {
            peak_intensity: metrics::peak_intensity(samples.frown).min(1.0),
            latency_ms: metrics::reaction_latency_ms(
                samples.frown,
                samples.frown_started_at_ms,
                fraction,
            ),
        };

        let duration_secs = metrics::blink_duration_base_secs(samples.frown);

        Biomarkers {
            baseline_stability: metrics::baseline_stability(samples.baseline),
            smile_metrics,
            frown_metrics,
            blink_rate: metrics::blink_rate(samples.blink_count, duration_secs),
        }
    }

    /// Apply the screening rule. Any single failing check flips the summary.
    pub fn classify(
        biomarkers: &Biomarkers,
        thresholds: &ScreeningThresholds,
    ) -> (Summary, Vec<ScreeningFlag>) {
        let checks = [
            (
                ScreeningFlag::Baseline,
                biomarkers.baseline_stability > thresholds.max_baseline_stability,
            ),
            (
                ScreeningFlag::Smile,
                biomarkers.smile_metrics.peak_intensity < thresholds.min_smile_peak,
            ),
            (
                ScreeningFlag::Frown,
                biomarkers.frown_metrics.peak_intensity < thresholds.min_frown_peak,
            ),
            (
                ScreeningFlag::Symmetry,
                biomarkers.smile_metrics.symmetry < thresholds.min_smile_symmetry,
            ),
        ];

        let flags: Vec<ScreeningFlag> = checks
            .into_iter()
            .filter_map(|(flag, failed)| failed.then_some(flag))
            .collect();

        let summary = if flags.is_empty() {
            Summary::Normal
        } else {
            Summary::RecommendConsultation
        };

        (summary, flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn biomarkers(stability: f64, smile_peak: f64, frown_peak: f64, symmetry: f64) -> Biomarkers {
        Biomarkers {
            baseline_stability: stability,
            smile_metrics: SmileMetrics {
                peak_intensity: smile_peak,
                latency_ms: 300,
                symmetry,
            },
            frown_metrics: FrownMetrics {
                peak_intensity: frown_peak,
                latency_ms: 450,
            },
            blink_rate: 12.0,
        }
    }

    #[test]
    fn test_single_failing_check_flips_summary() {
        let thresholds = ScreeningThresholds::default();
        let (summary, flags) =
            BiomarkerAggregator::classify(&biomarkers(0.2, 0.25, 0.5, 0.9), &thresholds);
        assert_eq!(summary, Summary::RecommendConsultation);
        assert_eq!(flags, vec![ScreeningFlag::Smile]);
    }

    #[test]
    fn test_all_checks_pass() {
        let thresholds = ScreeningThresholds::default();
        let (summary, flags) =
            BiomarkerAggregator::classify(&biomarkers(0.5, 0.3, 0.3, 0.6), &thresholds);
        assert_eq!(summary, Summary::Normal);
        assert!(flags.is_empty());
    }

    #[test]
    fn test_every_check_reported() {
        let thresholds = ScreeningThresholds::default();
        let (summary, flags) =
            BiomarkerAggregator::classify(&biomarkers(0.51, 0.1, 0.29, 0.59), &thresholds);
        assert_eq!(summary, Summary::RecommendConsultation);
        assert_eq!(
            flags,
            vec![
                ScreeningFlag::Baseline,
                ScreeningFlag::Smile,
                ScreeningFlag::Frown,
                ScreeningFlag::Symmetry,
            ]
        );
    }

    #[test]
    fn test_aggregate_from_samples() {
        let baseline: Vec<Sample> = (0..10)
            .map(|i| Sample::with_secondary(0.1, 0.1, i as f64 * 33.0))
            .collect();
        let smile: Vec<Sample> = [0.0, 0.2, 0.3, 0.8, 0.8]
            .iter()
            .enumerate()
            .map(|(i, &v)| Sample::with_secondary(v, 0.9, 7000.0 + i as f64 * 100.0))
            .collect();
        let frown: Vec<Sample> = [0.1, 0.6, 0.4]
            .iter()
            .enumerate()
            .map(|(i, &v)| Sample::new(v, 14_000.0 + i as f64 * 1000.0))
            .collect();

        let samples = SessionSamples {
            baseline: &baseline,
            smile: &smile,
            frown: &frown,
            smile_started_at_ms: 7000.0,
            frown_started_at_ms: 14_000.0,
            blink_count: 4,
        };
        let subject = Subject::new("Ada", 36).unwrap();
        let record = BiomarkerAggregator::aggregate(subject.clone(), &samples, &ProtocolConfig::default());

        assert_eq!(record.subject, subject);
        assert!(record.biomarkers.baseline_stability.abs() < 1e-12);
        assert_eq!(record.biomarkers.smile_metrics.peak_intensity, 0.8);
        assert_eq!(record.biomarkers.smile_metrics.latency_ms, 300);
        assert!((record.biomarkers.smile_metrics.symmetry - 0.9).abs() < 1e-12);
        assert_eq!(record.biomarkers.frown_metrics.peak_intensity, 0.6);
        assert_eq!(record.biomarkers.frown_metrics.latency_ms, 1000);
        // 4 blinks over a 16 s duration base
        assert!((record.biomarkers.blink_rate - 15.0).abs() < 1e-9);
        assert_eq!(record.summary, Summary::Normal);
    }

    #[test]
    fn test_empty_session_is_flagged() {
        let samples = SessionSamples {
            baseline: &[],
            smile: &[],
            frown: &[],
            smile_started_at_ms: 0.0,
            frown_started_at_ms: 0.0,
            blink_count: 0,
        };
        let record = BiomarkerAggregator::aggregate(
            Subject::new("Ada", 36).unwrap(),
            &samples,
            &ProtocolConfig::default(),
        );
        assert_eq!(record.biomarkers.baseline_stability, 1.0);
        assert_eq!(record.biomarkers.blink_rate, 0.0);
        assert_eq!(record.summary, Summary::RecommendConsultation);
        assert_eq!(record.flags.len(), 4);
    }
}
