//! Core types for the Synheart Face capture protocol
//!
//! This module defines the data structures that flow through the protocol:
//! stages, samples, derived expression scores, and the final biomarker record.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CaptureError, StoreError};

/// Maximum accepted subject age (inclusive)
pub const MAX_SUBJECT_AGE: i64 = 120;

/// One phase of the guided capture sequence, in protocol order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Setup,
    Baseline,
    ResetSmile,
    Smile,
    ResetFrown,
    Frown,
    Result,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Setup => "setup",
            Stage::Baseline => "baseline",
            Stage::ResetSmile => "reset_smile",
            Stage::Smile => "smile",
            Stage::ResetFrown => "reset_frown",
            Stage::Frown => "frown",
            Stage::Result => "result",
        }
    }

    /// Stages that accumulate metric samples
    pub fn is_sampling(&self) -> bool {
        matches!(self, Stage::Baseline | Stage::Smile | Stage::Frown)
    }

    /// Stages driven by a fixed-duration task timer
    pub fn is_timed(&self) -> bool {
        self.is_sampling()
    }

    /// Stages gated on the face returning to neutral
    pub fn reset_channel(&self) -> Option<Channel> {
        match self {
            Stage::ResetSmile => Some(Channel::Smile),
            Stage::ResetFrown => Some(Channel::Frown),
            _ => None,
        }
    }

    /// Whether the sampling loop should keep running in this stage
    pub fn is_active(&self) -> bool {
        !matches!(self, Stage::Setup | Stage::Result)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expression channel watched by a reset gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Smile,
    Frown,
}

impl Channel {
    /// Pick this channel's value out of a set of expression scores
    pub fn score(&self, scores: &ExpressionScores) -> f64 {
        match self {
            Channel::Smile => scores.smile,
            Channel::Frown => scores.frown,
        }
    }
}

/// One classifier reading captured during an active stage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Value of the stage's measured channel
    pub primary: f64,
    /// Companion value (frown during baseline, symmetry during smile)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary: Option<f64>,
    /// Monotonic clock reading of the sampling tick (ms)
    pub captured_at_ms: f64,
}

impl Sample {
    pub fn new(primary: f64, captured_at_ms: f64) -> Self {
        Self {
            primary,
            secondary: None,
            captured_at_ms,
        }
    }

    pub fn with_secondary(primary: f64, secondary: f64, captured_at_ms: f64) -> Self {
        Self {
            primary,
            secondary: Some(secondary),
            captured_at_ms,
        }
    }
}

/// Expression scores derived from one classifier reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpressionScores {
    /// Two-sided smile intensity (0-1)
    pub smile: f64,
    /// Composite frown intensity (0-1)
    pub frown: f64,
    /// Two-sided blink intensity (0-1)
    pub blink: f64,
    /// Left/right smile symmetry (0-1, 1 = perfectly symmetric)
    pub symmetry: f64,
}

/// Subject identity, fixed for the whole session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
    pub age: u8,
}

impl Subject {
    /// Validate session-start input.
    ///
    /// The name is trimmed and must be non-empty; the age must lie in `1..=120`.
    pub fn new(name: &str, age: i64) -> Result<Self, CaptureError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CaptureError::InvalidSubject(
                "name must not be empty".to_string(),
            ));
        }
        if !(1..=MAX_SUBJECT_AGE).contains(&age) {
            return Err(CaptureError::InvalidSubject(format!(
                "age must be between 1 and {MAX_SUBJECT_AGE}, got {age}"
            )));
        }
        Ok(Self {
            name: name.to_string(),
            age: age as u8,
        })
    }
}

/// Verdict reported by a reset gate on each tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateVerdict {
    StillWaiting,
    RelaxedAndStable,
    TimedOut,
}

/// Why a stage transition happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionCause {
    /// Session started externally
    Started,
    /// The stage's task timer completed
    TimerElapsed,
    /// The reset gate saw a stable relaxed face
    GateRelaxed,
    /// The reset gate gave up waiting
    GateTimedOut,
}

/// A stage transition reported by the state machine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageChange {
    pub from: Stage,
    pub to: Stage,
    pub cause: TransitionCause,
    pub at_ms: f64,
}

/// Smile task metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmileMetrics {
    /// Peak smile intensity (0-1)
    pub peak_intensity: f64,
    /// Time from task start to 50% of peak (ms)
    pub latency_ms: u64,
    /// Mean left/right symmetry (0-1)
    pub symmetry: f64,
}

/// Frown task metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrownMetrics {
    /// Peak frown intensity (0-1)
    pub peak_intensity: f64,
    /// Time from task start to 50% of peak (ms)
    pub latency_ms: u64,
}

/// Biomarkers derived from one session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Biomarkers {
    /// Mean capped baseline variance (0-1, lower = more stable)
    pub baseline_stability: f64,
    pub smile_metrics: SmileMetrics,
    pub frown_metrics: FrownMetrics,
    /// Blink events per minute
    pub blink_rate: f64,
}

/// Screening check that failed during classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreeningFlag {
    /// Baseline stability above threshold
    Baseline,
    /// Smile peak below threshold
    Smile,
    /// Frown peak below threshold
    Frown,
    /// Smile symmetry below threshold
    Symmetry,
}

/// Categorical session summary. This is a heuristic flag, not a diagnosis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Summary {
    #[serde(rename = "normal")]
    Normal,
    #[serde(rename = "recommend professional consultation")]
    RecommendConsultation,
}

impl Summary {
    pub fn as_str(&self) -> &'static str {
        match self {
            Summary::Normal => "normal",
            Summary::RecommendConsultation => "recommend professional consultation",
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final output of one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiomarkerRecord {
    pub subject: Subject,
    pub biomarkers: Biomarkers,
    pub summary: Summary,
    /// Checks that failed, in evaluation order (empty when `summary` is normal)
    pub flags: Vec<ScreeningFlag>,
}

/// Result of handing a record to the persistence collaborator
#[derive(Debug)]
pub enum UploadStatus {
    /// Stored under the returned identifier
    Saved(String),
    /// The store failed; the record is still intact
    Failed(StoreError),
}

impl UploadStatus {
    pub fn is_saved(&self) -> bool {
        matches!(self, UploadStatus::Saved(_))
    }
}

/// A finished session: the computed record and the fate of its upload
#[derive(Debug)]
pub struct SessionOutcome {
    pub record: BiomarkerRecord,
    pub upload: UploadStatus,
}
