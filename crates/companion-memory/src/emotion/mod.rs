//! Emotional annotation of memories.
//!
//! - **state**: the valence/arousal value type
//! - **detector**: pluggable text-to-emotion strategies
//! - **updater**: detection, decay and amplification over the memory store

mod detector;
mod state;
mod updater;

pub use detector::{EmotionDetector, KeywordEmotionDetector};
pub use state::{EmotionQuadrant, EmotionState};
pub use updater::{
    DecayReport, EmotionChangeReason, EmotionChangeRecord, EmotionStatistics,
    EmotionValenceUpdater, MAX_EMOTION_HISTORY,
};
