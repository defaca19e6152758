//! Two-axis emotion value type.

use serde::{Deserialize, Serialize};

use crate::utils::{clamp_unit, clamp_valence};

/// Valence below this magnitude counts as neutral polarity
const NEUTRAL_VALENCE: f64 = 0.1;
/// Arousal below this counts as calm when polarity is neutral
const NEUTRAL_AROUSAL: f64 = 0.2;
/// Arousal at or above this counts as activated
const HIGH_AROUSAL: f64 = 0.5;

/// Valence/arousal pair. Always within [-1, 1] × [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionState {
    valence: f64,
    arousal: f64,
}

impl Default for EmotionState {
    fn default() -> Self {
        Self::neutral()
    }
}

impl EmotionState {
    /// Build a state, clamping both axes to their domains.
    pub fn new(valence: f64, arousal: f64) -> Self {
        Self {
            valence: clamp_valence(valence),
            arousal: clamp_unit(arousal),
        }
    }

    pub fn neutral() -> Self {
        Self {
            valence: 0.0,
            arousal: 0.0,
        }
    }

    pub fn valence(&self) -> f64 {
        self.valence
    }

    pub fn arousal(&self) -> f64 {
        self.arousal
    }

    /// Distance from neutral, normalised to [0, 1].
    pub fn intensity(&self) -> f64 {
        clamp_unit((self.valence.powi(2) + self.arousal.powi(2)).sqrt() / std::f64::consts::SQRT_2)
    }

    pub fn quadrant(&self) -> EmotionQuadrant {
        if self.valence.abs() < NEUTRAL_VALENCE && self.arousal < NEUTRAL_AROUSAL {
            return EmotionQuadrant::Neutral;
        }

        match (self.valence >= 0.0, self.arousal >= HIGH_AROUSAL) {
            (true, true) => EmotionQuadrant::Excited,
            (true, false) => EmotionQuadrant::Content,
            (false, true) => EmotionQuadrant::Distressed,
            (false, false) => EmotionQuadrant::Depressed,
        }
    }

    /// Human-readable label derived from the quadrant.
    pub fn label(&self) -> &'static str {
        self.quadrant().label()
    }
}

/// Region of the valence/arousal plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionQuadrant {
    /// Positive and activated
    Excited,
    /// Positive and calm
    Content,
    /// Negative and activated
    Distressed,
    /// Negative and calm
    Depressed,
    Neutral,
}

impl EmotionQuadrant {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Excited => "joyful",
            Self::Content => "calm",
            Self::Distressed => "angry",
            Self::Depressed => "sad",
            Self::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for EmotionQuadrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Excited => "excited",
            Self::Content => "content",
            Self::Distressed => "distressed",
            Self::Depressed => "depressed",
            Self::Neutral => "neutral",
        };
        write!(f, "{}", name)
    }
}
