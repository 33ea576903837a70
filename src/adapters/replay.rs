//! Recorded-stream replay
//!
//! Plays a `face.frame.v1` recording back as if it came from a live camera and
//! classifier. Frame timestamps from the recording become the session clock.

use std::collections::VecDeque;

use super::{ActionUnits, FaceClassifier, FrameSource, TimedFrame};
use crate::error::CaptureError;
use crate::schema::RecordedFrame;

/// Frame source backed by a recording
#[derive(Debug, Clone)]
pub struct ReplaySource {
    frames: VecDeque<RecordedFrame>,
    started: bool,
}

impl ReplaySource {
    pub fn new(frames: Vec<RecordedFrame>) -> Self {
        Self {
            frames: frames.into(),
            started: false,
        }
    }

    /// Frames not yet delivered
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for ReplaySource {
    type Frame = Option<ActionUnits>;

    fn start(&mut self) -> Result<(), CaptureError> {
        if self.frames.is_empty() {
            return Err(CaptureError::Acquisition(
                "recording contains no frames".to_string(),
            ));
        }
        self.started = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Option<TimedFrame<Self::Frame>> {
        if !self.started {
            return None;
        }
        self.frames.pop_front().map(|frame| TimedFrame {
            at_ms: frame.t_ms,
            frame: frame.action_units,
        })
    }

    fn stop(&mut self) {
        self.started = false;
    }
}

/// Classifier that returns the scores stored alongside each recorded frame
#[derive(Debug, Clone, Default)]
pub struct ReplayClassifier {
    last_timestamp_ms: Option<u64>,
    calls: usize,
}

impl ReplayClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timestamp passed with the most recent `detect` call
    pub fn last_timestamp_ms(&self) -> Option<u64> {
        self.last_timestamp_ms
    }

    /// Number of `detect` calls so far
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl FaceClassifier for ReplayClassifier {
    type Frame = Option<ActionUnits>;

    fn init(&mut self) -> Result<(), CaptureError> {
        self.last_timestamp_ms = None;
        self.calls = 0;
        Ok(())
    }

    fn detect(&mut self, frame: &Self::Frame, timestamp_ms: u64) -> Option<ActionUnits> {
        if let Some(last) = self.last_timestamp_ms {
            if timestamp_ms <= last {
                log::warn!("non-increasing classifier timestamp: {timestamp_ms} after {last}");
            }
        }
        self.last_timestamp_ms = Some(timestamp_ms);
        self.calls += 1;
        frame.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_requires_start() {
        let mut source = ReplaySource::new(vec![RecordedFrame::new(0.0, None)]);
        assert!(source.next_frame().is_none());

        source.start().unwrap();
        let frame = source.next_frame().unwrap();
        assert_eq!(frame.at_ms, 0.0);
        assert!(frame.frame.is_none());
        assert!(source.next_frame().is_none());
    }

    #[test]
    fn test_empty_recording_fails_acquisition() {
        let mut source = ReplaySource::new(Vec::new());
        assert!(matches!(source.start(), Err(CaptureError::Acquisition(_))));
    }

    #[test]
    fn test_classifier_echoes_recorded_scores() {
        let mut classifier = ReplayClassifier::new();
        classifier.init().unwrap();

        let units: ActionUnits = [("mouthSmileLeft", 0.4)].into_iter().collect();
        let detected = classifier.detect(&Some(units.clone()), 33);
        assert_eq!(detected, Some(units));
        assert_eq!(classifier.detect(&None, 66), None);
        assert_eq!(classifier.calls(), 2);
        assert_eq!(classifier.last_timestamp_ms(), Some(66));
    }
}
