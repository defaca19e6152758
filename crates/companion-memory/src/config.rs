//! Lifecycle Configuration
//!
//! Configuration is loaded externally (usually from a TOML file) and
//! validated here before any component accepts it. Each component keeps an
//! immutable snapshot and swaps it whole on update.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::MemoryCategory;

/// Top-level configuration for all lifecycle components
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Cleanup scheduler settings
    pub cleanup: CleanupConfig,

    /// Working memory buffer settings
    pub working_memory: WorkingMemoryConfig,

    /// Emotion decay settings
    pub emotion_decay: EmotionDecayConfig,
}

impl LifecycleConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&source)
    }

    /// Validate every section
    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        self.cleanup.validate()?;
        self.working_memory.validate()?;
        self.emotion_decay.validate()?;
        Ok(())
    }
}

/// Cleanup scheduler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Run the periodic sweep (default: true)
    pub enabled: bool,

    /// Hours between sweeps (default: 24)
    pub interval_hours: f64,

    /// Memories weaker than this are evicted (default: 0.1)
    pub min_strength_threshold: f64,

    /// Categories never touched by cleanup (default: anniversary, person, preference)
    pub protected_categories: BTreeSet<MemoryCategory>,

    /// Memories younger than this are never touched (default: 7)
    pub min_retention_days: f64,

    /// Maximum memories evicted per run (default: 100)
    pub batch_size: usize,

    /// Archive instead of hard-deleting (default: true)
    pub enable_soft_delete: bool,

    /// Archive capacity; oldest entries fall out first (default: 500)
    pub max_archive_size: usize,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_hours: 24.0,
            min_strength_threshold: 0.1,
            protected_categories: [
                MemoryCategory::Anniversary,
                MemoryCategory::Person,
                MemoryCategory::Preference,
            ]
            .into_iter()
            .collect(),
            min_retention_days: 7.0,
            batch_size: 100,
            enable_soft_delete: true,
            max_archive_size: 500,
        }
    }
}

impl CleanupConfig {
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.min_strength_threshold = threshold;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_retention_days(mut self, days: f64) -> Self {
        self.min_retention_days = days;
        self
    }

    pub fn with_soft_delete(mut self, enabled: bool) -> Self {
        self.enable_soft_delete = enabled;
        self
    }

    pub fn with_protected(mut self, categories: impl IntoIterator<Item = MemoryCategory>) -> Self {
        self.protected_categories = categories.into_iter().collect();
        self
    }

    pub fn is_protected(&self, category: MemoryCategory) -> bool {
        self.protected_categories.contains(&category)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        if !(self.interval_hours.is_finite() && self.interval_hours > 0.0) {
            return Err(ConfigValidationError::invalid(
                "cleanup.interval_hours",
                "must be greater than 0",
            ));
        }

        if !(0.0..=1.0).contains(&self.min_strength_threshold) {
            return Err(ConfigValidationError::invalid(
                "cleanup.min_strength_threshold",
                "must be between 0 and 1",
            ));
        }

        if !(self.min_retention_days.is_finite() && self.min_retention_days >= 0.0) {
            return Err(ConfigValidationError::invalid(
                "cleanup.min_retention_days",
                "must not be negative",
            ));
        }

        if self.batch_size == 0 {
            return Err(ConfigValidationError::invalid(
                "cleanup.batch_size",
                "must be greater than 0",
            ));
        }

        if self.max_archive_size == 0 {
            return Err(ConfigValidationError::invalid(
                "cleanup.max_archive_size",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

/// Working memory buffer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkingMemoryConfig {
    /// Buffer capacity in turns (default: 20)
    pub max_capacity: usize,

    /// Turns at or above this importance are promoted (default: 0.7)
    pub promotion_importance_threshold: f64,

    /// Turns at or above this emotion intensity are promoted (default: 0.8)
    pub promotion_emotion_threshold: f64,

    /// Promote on threshold automatically (default: true)
    pub auto_promote: bool,

    /// Turns older than this are dropped by `cleanup_expired` (default: 3600 = 1 hour)
    pub retention_seconds: u64,
}

impl Default for WorkingMemoryConfig {
    fn default() -> Self {
        Self {
            max_capacity: 20,
            promotion_importance_threshold: 0.7,
            promotion_emotion_threshold: 0.8,
            auto_promote: true,
            retention_seconds: 3600,
        }
    }
}

impl WorkingMemoryConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.max_capacity = capacity;
        self
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        if self.max_capacity == 0 {
            return Err(ConfigValidationError::invalid(
                "working_memory.max_capacity",
                "must be greater than 0",
            ));
        }

        if !(0.0..=1.0).contains(&self.promotion_importance_threshold) {
            return Err(ConfigValidationError::invalid(
                "working_memory.promotion_importance_threshold",
                "must be between 0 and 1",
            ));
        }

        if !(0.0..=1.0).contains(&self.promotion_emotion_threshold) {
            return Err(ConfigValidationError::invalid(
                "working_memory.promotion_emotion_threshold",
                "must be between 0 and 1",
            ));
        }

        if self.retention_seconds == 0 {
            return Err(ConfigValidationError::invalid(
                "working_memory.retention_seconds",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

/// Emotion decay configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotionDecayConfig {
    /// Apply decay at all (default: true)
    pub enabled: bool,

    /// Fraction of the distance to the valence band lost per day (default: 0.05)
    pub valence_decay_rate: f64,

    /// Fraction of arousal lost per day (default: 0.1)
    pub arousal_decay_rate: f64,

    /// Positive valence never decays below this (default: 0.1)
    pub valence_upper_bound: f64,

    /// Negative valence never decays above this (default: -0.1)
    pub valence_lower_bound: f64,
}

impl Default for EmotionDecayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            valence_decay_rate: 0.05,
            arousal_decay_rate: 0.1,
            valence_upper_bound: 0.1,
            valence_lower_bound: -0.1,
        }
    }
}

impl EmotionDecayConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        if !(0.0..=1.0).contains(&self.valence_decay_rate) {
            return Err(ConfigValidationError::invalid(
                "emotion_decay.valence_decay_rate",
                "must be between 0 and 1",
            ));
        }

        if !(0.0..=1.0).contains(&self.arousal_decay_rate) {
            return Err(ConfigValidationError::invalid(
                "emotion_decay.arousal_decay_rate",
                "must be between 0 and 1",
            ));
        }

        if !(0.0..=1.0).contains(&self.valence_upper_bound) {
            return Err(ConfigValidationError::invalid(
                "emotion_decay.valence_upper_bound",
                "must be between 0 and 1",
            ));
        }

        if !(-1.0..=0.0).contains(&self.valence_lower_bound) {
            return Err(ConfigValidationError::invalid(
                "emotion_decay.valence_lower_bound",
                "must be between -1 and 0",
            ));
        }

        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl ConfigValidationError {
    fn invalid(field: &str, message: &str) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}
