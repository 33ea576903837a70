//! Per-stage sample storage

use crate::types::{Sample, Stage};

/// Ordered samples recorded during exactly one stage.
///
/// The buffer only accepts samples while its owning stage is the active one;
/// any other append is ignored.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    owner: Stage,
    samples: Vec<Sample>,
}

impl SampleBuffer {
    /// Create an empty buffer owned by `owner`
    pub fn new(owner: Stage) -> Self {
        Self {
            owner,
            samples: Vec::new(),
        }
    }

    /// Stage this buffer belongs to
    pub fn owner(&self) -> Stage {
        self.owner
    }

    /// Discard all samples
    pub fn clear(&mut self) {
        self.samples = Vec::new();
    }

    /// Append a sample if `active` is the owning stage. Returns whether it was kept.
    pub fn append(&mut self, active: Stage, sample: Sample) -> bool {
        if active != self.owner {
            return false;
        }
        self.samples.push(sample);
        true
    }

    /// Read-only view of the recorded samples
    pub fn all(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The most recent sample, if any
    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_only_while_owner_active() {
        let mut buffer = SampleBuffer::new(Stage::Smile);

        assert!(buffer.append(Stage::Smile, Sample::new(0.4, 10.0)));
        assert!(!buffer.append(Stage::Frown, Sample::new(0.9, 20.0)));
        assert!(!buffer.append(Stage::ResetSmile, Sample::new(0.9, 30.0)));

        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.all()[0].primary, 0.4);
    }

    #[test]
    fn test_clear_and_order() {
        let mut buffer = SampleBuffer::new(Stage::Baseline);
        for i in 0..5 {
            buffer.append(Stage::Baseline, Sample::new(i as f64 / 10.0, i as f64 * 33.0));
        }
        let times: Vec<f64> = buffer.all().iter().map(|s| s.captured_at_ms).collect();
        assert_eq!(times, vec![0.0, 33.0, 66.0, 99.0, 132.0]);
        assert_eq!(buffer.last().map(|s| s.captured_at_ms), Some(132.0));

        buffer.clear();
        assert!(buffer.is_empty());
        assert!(buffer.last().is_none());
    }
}
