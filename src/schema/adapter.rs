//! Parsing and validation of recorded frame streams

use crate::error::CaptureError;
use crate::schema::frame::{RecordedFrame, ValidationError};

/// Adapter for reading `face.frame.v1` recordings
pub struct FrameStreamAdapter;

impl FrameStreamAdapter {
    /// Parse a JSON string containing an array of frames
    pub fn parse_array(json: &str) -> Result<Vec<RecordedFrame>, CaptureError> {
        let frames: Vec<RecordedFrame> = serde_json::from_str(json)?;
        Ok(frames)
    }

    /// Parse NDJSON (newline-delimited JSON) containing frames
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<RecordedFrame>, CaptureError> {
        let mut frames = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<RecordedFrame>(trimmed) {
                Ok(frame) => frames.push(frame),
                Err(e) => {
                    return Err(CaptureError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(frames)
    }

    /// Validate every frame and the ordering of the stream.
    ///
    /// Returns one entry per invalid frame; an empty result means the stream is valid.
    pub fn validate_frames(frames: &[RecordedFrame]) -> Vec<ValidationResult> {
        let mut results = Vec::new();
        let mut previous: Option<f64> = None;

        for (index, frame) in frames.iter().enumerate() {
            let error = frame.validate().err().or_else(|| match previous {
                Some(prev) if frame.t_ms <= prev => Some(ValidationError::NonMonotonic {
                    previous: prev,
                    current: frame.t_ms,
                }),
                _ => None,
            });

            if frame.t_ms.is_finite() {
                previous = Some(previous.map_or(frame.t_ms, |p| p.max(frame.t_ms)));
            }

            if let Some(error) = error {
                results.push(ValidationResult {
                    index,
                    t_ms: frame.t_ms,
                    error,
                });
            }
        }

        results
    }

    /// Parse and validate in one step, failing on the first invalid frame
    pub fn load_ndjson(ndjson: &str) -> Result<Vec<RecordedFrame>, CaptureError> {
        let frames = Self::parse_ndjson(ndjson)?;
        if let Some(invalid) = Self::validate_frames(&frames).into_iter().next() {
            return Err(CaptureError::ParseError(format!(
                "Invalid frame at index {}: {}",
                invalid.index, invalid.error
            )));
        }
        Ok(frames)
    }
}

/// Validation result for a single frame
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub index: usize,
    pub t_ms: f64,
    pub error: ValidationError,
}
