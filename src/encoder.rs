//! Record encoding
//!
//! Wraps a [`BiomarkerRecord`] in a versioned envelope carrying producer and
//! provenance metadata, ready to be written to a store or printed.

use crate::error::CaptureError;
use crate::types::BiomarkerRecord;
use crate::{FACE_VERSION, PRODUCER_NAME};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current record envelope format
pub const RECORD_FORMAT_VERSION: &str = "face.record.v1";

/// Software that produced a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Encoded form of a finished session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordEnvelope {
    pub format_version: String,
    pub producer: RecordProducer,
    /// When the envelope was built (RFC 3339, UTC)
    pub computed_at_utc: String,
    /// Operating system the capture ran on
    pub platform: String,
    pub record: BiomarkerRecord,
}

/// Encoder for record envelopes
pub struct RecordEncoder {
    instance_id: String,
}

impl Default for RecordEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Wrap a record in an envelope
    pub fn encode(&self, record: &BiomarkerRecord) -> RecordEnvelope {
        RecordEnvelope {
            format_version: RECORD_FORMAT_VERSION.to_string(),
            producer: RecordProducer {
                name: PRODUCER_NAME.to_string(),
                version: FACE_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            platform: std::env::consts::OS.to_string(),
            record: record.clone(),
        }
    }

    /// Encode to pretty-printed JSON
    pub fn encode_to_json(&self, record: &BiomarkerRecord) -> Result<String, CaptureError> {
        let envelope = self.encode(record);
        serde_json::to_string_pretty(&envelope).map_err(CaptureError::JsonError)
    }

    /// Encode to a single JSON line
    pub fn encode_to_line(&self, record: &BiomarkerRecord) -> Result<String, CaptureError> {
        let envelope = self.encode(record);
        serde_json::to_string(&envelope).map_err(CaptureError::JsonError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Biomarkers, FrownMetrics, ScreeningFlag, SmileMetrics, Subject, Summary};
    use pretty_assertions::assert_eq;

    fn make_test_record() -> BiomarkerRecord {
        BiomarkerRecord {
            subject: Subject::new("Ada", 36).unwrap(),
            biomarkers: Biomarkers {
                baseline_stability: 0.02,
                smile_metrics: SmileMetrics {
                    peak_intensity: 0.82,
                    latency_ms: 310,
                    symmetry: 0.55,
                },
                frown_metrics: FrownMetrics {
                    peak_intensity: 0.64,
                    latency_ms: 420,
                },
                blink_rate: 14.5,
            },
            summary: Summary::RecommendConsultation,
            flags: vec![ScreeningFlag::Symmetry],
        }
    }

    #[test]
    fn test_encode_envelope() {
        let record = make_test_record();
        let encoder = RecordEncoder::with_instance_id("test-instance".to_string());
        let envelope = encoder.encode(&record);

        assert_eq!(envelope.format_version, RECORD_FORMAT_VERSION);
        assert_eq!(envelope.producer.name, PRODUCER_NAME);
        assert_eq!(envelope.producer.version, FACE_VERSION);
        assert_eq!(envelope.producer.instance_id, "test-instance");
        assert_eq!(envelope.platform, std::env::consts::OS);
        assert_eq!(envelope.record, record);
        assert!(chrono::DateTime::parse_from_rfc3339(&envelope.computed_at_utc).is_ok());
    }

    #[test]
    fn test_encode_to_json() {
        let encoder = RecordEncoder::new();
        let json = encoder.encode_to_json(&make_test_record()).unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["format_version"], RECORD_FORMAT_VERSION);
        assert_eq!(
            parsed["record"]["summary"],
            "recommend professional consultation"
        );
        assert_eq!(parsed["record"]["biomarkers"]["smile_metrics"]["latency_ms"], 310);
        assert_eq!(parsed["record"]["flags"][0], "symmetry");
    }

    #[test]
    fn test_line_encoding_is_single_line() {
        let encoder = RecordEncoder::new();
        let line = encoder.encode_to_line(&make_test_record()).unwrap();
        assert!(!line.contains('\n'));

        let envelope: RecordEnvelope = serde_json::from_str(&line).unwrap();
        assert_eq!(envelope.producer.instance_id, encoder.instance_id());
    }
}
