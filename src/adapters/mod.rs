//! Collaborator adapters
//!
//! The protocol does not detect faces or open cameras itself. This module defines
//! the traits those collaborators implement, maps classifier output onto the
//! protocol's expression channels, and provides a replay pair that feeds a
//! recorded classifier stream back through the protocol.

pub mod blendshape;
mod replay;

pub use blendshape::{expression_scores, ActionUnits};
pub use replay::{ReplayClassifier, ReplaySource};

use crate::error::CaptureError;

/// A frame stamped with the monotonic clock reading taken when it was grabbed
#[derive(Debug, Clone)]
pub struct TimedFrame<F> {
    pub at_ms: f64,
    pub frame: F,
}

/// Source of frames (camera, recording)
pub trait FrameSource {
    type Frame;

    /// Acquire the device. Failure keeps the session in setup.
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Next available frame, or `None` once the source is exhausted
    fn next_frame(&mut self) -> Option<TimedFrame<Self::Frame>>;

    /// Release the device. Must be safe to call more than once.
    fn stop(&mut self);
}

/// Facial action classifier
pub trait FaceClassifier {
    type Frame;

    /// Load the model. Failure keeps the session in setup.
    fn init(&mut self) -> Result<(), CaptureError>;

    /// Classify one frame. `timestamp_ms` strictly increases across calls within a
    /// session. Returns `None` when no face is detected.
    fn detect(&mut self, frame: &Self::Frame, timestamp_ms: u64) -> Option<ActionUnits>;
}
