//! Blendshape mapping
//!
//! Face landmarker classifiers report a named score per facial action unit
//! ("blendshape"). This module derives the expression channels the protocol
//! consumes from those named scores.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::metrics::pair_symmetry;
use crate::types::ExpressionScores;

/// Blendshape names read by the protocol
pub mod names {
    pub const MOUTH_SMILE_LEFT: &str = "mouthSmileLeft";
    pub const MOUTH_SMILE_RIGHT: &str = "mouthSmileRight";
    pub const BROW_DOWN_LEFT: &str = "browDownLeft";
    pub const BROW_DOWN_RIGHT: &str = "browDownRight";
    pub const BROW_INNER_UP: &str = "browInnerUp";
    pub const MOUTH_FROWN_LEFT: &str = "mouthFrownLeft";
    pub const MOUTH_FROWN_RIGHT: &str = "mouthFrownRight";
    pub const EYE_BLINK_LEFT: &str = "eyeBlinkLeft";
    pub const EYE_BLINK_RIGHT: &str = "eyeBlinkRight";

    /// Every name the protocol reads
    pub const ALL: [&str; 9] = [
        MOUTH_SMILE_LEFT,
        MOUTH_SMILE_RIGHT,
        BROW_DOWN_LEFT,
        BROW_DOWN_RIGHT,
        BROW_INNER_UP,
        MOUTH_FROWN_LEFT,
        MOUTH_FROWN_RIGHT,
        EYE_BLINK_LEFT,
        EYE_BLINK_RIGHT,
    ];
}

/// Named action-unit scores from one classifier reading
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionUnits(HashMap<String, f64>);

impl ActionUnits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, score: f64) {
        self.0.insert(name.into(), score);
    }

    /// Score for `name`; names the classifier did not report read as 0
    pub fn score(&self, name: &str) -> f64 {
        self.0.get(name).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn mean(&self, left: &str, right: &str) -> f64 {
        (self.score(left) + self.score(right)) / 2.0
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for ActionUnits {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Mean of the left and right smile
pub fn smile_intensity(units: &ActionUnits) -> f64 {
    units.mean(names::MOUTH_SMILE_LEFT, names::MOUTH_SMILE_RIGHT)
}

/// Strongest of three frown cues: lowered brows, drawn-together inner brows,
/// downturned mouth corners
pub fn frown_intensity(units: &ActionUnits) -> f64 {
    let brow_down = units.mean(names::BROW_DOWN_LEFT, names::BROW_DOWN_RIGHT);
    let brow_inner = units.score(names::BROW_INNER_UP);
    let mouth_frown = units.mean(names::MOUTH_FROWN_LEFT, names::MOUTH_FROWN_RIGHT);
    brow_down.max(brow_inner).max(mouth_frown)
}

/// Mean of the left and right eye blink
pub fn blink_intensity(units: &ActionUnits) -> f64 {
    units.mean(names::EYE_BLINK_LEFT, names::EYE_BLINK_RIGHT)
}

/// Left/right smile symmetry (1 = symmetric)
pub fn smile_symmetry(units: &ActionUnits, epsilon: f64) -> f64 {
    pair_symmetry(
        units.score(names::MOUTH_SMILE_LEFT),
        units.score(names::MOUTH_SMILE_RIGHT),
        epsilon,
    )
}

/// Derive every expression channel from one reading
pub fn expression_scores(units: &ActionUnits, epsilon: f64) -> ExpressionScores {
    ExpressionScores {
        smile: smile_intensity(units),
        frown: frown_intensity(units),
        blink: blink_intensity(units),
        symmetry: smile_symmetry(units, epsilon),
    }
}
