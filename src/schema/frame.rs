//! face.frame.v1 schema definition
//!
//! One record per sampled camera frame: the monotonic capture time and the
//! classifier's named action-unit scores, or nothing when no face was detected.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adapters::ActionUnits;

/// Current schema version
pub const FRAME_SCHEMA_VERSION: &str = "face.frame.v1";

fn default_schema_version() -> String {
    FRAME_SCHEMA_VERSION.to_string()
}

/// One recorded classifier reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedFrame {
    /// Schema version (defaults to the current version when omitted)
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    /// Monotonic capture time (ms)
    pub t_ms: f64,
    /// Classifier output; `None` when no face was detected
    #[serde(default)]
    pub action_units: Option<ActionUnits>,
}

impl RecordedFrame {
    pub fn new(t_ms: f64, action_units: Option<ActionUnits>) -> Self {
        Self {
            schema_version: default_schema_version(),
            t_ms,
            action_units,
        }
    }

    /// Validate a single frame in isolation
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.schema_version != FRAME_SCHEMA_VERSION {
            return Err(ValidationError::InvalidSchemaVersion {
                expected: FRAME_SCHEMA_VERSION.to_string(),
                actual: self.schema_version.clone(),
            });
        }

        if !self.t_ms.is_finite() || self.t_ms < 0.0 {
            return Err(ValidationError::InvalidTimestamp(self.t_ms));
        }

        if let Some(units) = &self.action_units {
            let mut names: Vec<(&str, f64)> = units.iter().collect();
            names.sort_by(|a, b| a.0.cmp(b.0));
            for (name, score) in names {
                if !score.is_finite() || !(0.0..=1.0).contains(&score) {
                    return Err(ValidationError::ScoreOutOfRange {
                        name: name.to_string(),
                        score,
                    });
                }
            }
        }

        Ok(())
    }
}

/// Validation errors for recorded frames
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid schema version: expected {expected}, got {actual}")]
    InvalidSchemaVersion { expected: String, actual: String },

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(f64),

    #[error("Score for {name} out of range [0, 1]: {score}")]
    ScoreOutOfRange { name: String, score: f64 },

    #[error("Timestamp {current} does not increase past previous frame at {previous}")]
    NonMonotonic { previous: f64, current: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_frame() {
        let frame: RecordedFrame =
            serde_json::from_str(r#"{"t_ms": 33.0, "action_units": {"eyeBlinkLeft": 0.2}}"#)
                .unwrap();
        assert_eq!(frame.schema_version, FRAME_SCHEMA_VERSION);
        assert_eq!(frame.action_units.unwrap().score("eyeBlinkLeft"), 0.2);

        let miss: RecordedFrame = serde_json::from_str(r#"{"t_ms": 66.0}"#).unwrap();
        assert!(miss.action_units.is_none());
        assert!(miss.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        let units: ActionUnits = [("mouthSmileLeft", 1.2)].into_iter().collect();
        let frame = RecordedFrame::new(0.0, Some(units));
        assert!(matches!(
            frame.validate(),
            Err(ValidationError::ScoreOutOfRange { .. })
        ));

        let frame = RecordedFrame::new(-1.0, None);
        assert_eq!(frame.validate(), Err(ValidationError::InvalidTimestamp(-1.0)));

        let mut frame = RecordedFrame::new(0.0, None);
        frame.schema_version = "face.frame.v0".to_string();
        assert!(matches!(
            frame.validate(),
            Err(ValidationError::InvalidSchemaVersion { .. })
        ));
    }
}
