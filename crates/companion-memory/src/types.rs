//! Memory Type Definitions
//!
//! Defines the core types shared by the lifecycle components: the durable
//! [`Memory`], the short-lived [`ConversationTurn`], and the append-only
//! [`ReconstructionRecord`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::{clamp_unit, clamp_valence, days_between};

/// Memory category (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryCategory {
    Episodic,
    Semantic,
    Procedural,
    Contextual,
    Person,
    Preference,
    Fact,
    Anniversary,
}

impl MemoryCategory {
    pub const ALL: [MemoryCategory; 8] = [
        Self::Episodic,
        Self::Semantic,
        Self::Procedural,
        Self::Contextual,
        Self::Person,
        Self::Preference,
        Self::Fact,
        Self::Anniversary,
    ];

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Episodic => "episodic",
            Self::Semantic => "semantic",
            Self::Procedural => "procedural",
            Self::Contextual => "contextual",
            Self::Person => "person",
            Self::Preference => "preference",
            Self::Fact => "fact",
            Self::Anniversary => "anniversary",
        }
    }
}

impl std::fmt::Display for MemoryCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MemoryCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("Invalid memory category: {}", s))
    }
}

/// The durable unit of recall
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub id: String,
    pub category: MemoryCategory,

    pub content: String,
    pub embedding: Option<Vec<f32>>,

    pub importance: f64,
    pub confidence: f64,
    /// Cached strength, recomputed lazily
    pub strength: Option<f64>,
    pub recall_difficulty: f64,
    pub context_relevance: f64,

    pub emotional_valence: f64,
    pub arousal: f64,
    pub dominant_emotion: Option<String>,
    pub emotion_intensity: Option<f64>,

    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    /// When the remembered event happened
    pub timestamp: DateTime<Utc>,
    pub access_count: u32,
    pub reinforcement_count: u32,

    pub related_entities: Vec<String>,
    pub related_characters: Vec<String>,
    pub tags: Vec<String>,
    pub source: String,

    pub is_forgotten: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Memory {
    /// Create a memory with neutral scoring, stamped now
    pub fn new(content: impl Into<String>, category: MemoryCategory) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            category,
            content: content.into(),
            embedding: None,
            importance: 0.5,
            confidence: 1.0,
            strength: None,
            recall_difficulty: 0.5,
            context_relevance: 0.5,
            emotional_valence: 0.0,
            arousal: 0.0,
            dominant_emotion: None,
            emotion_intensity: None,
            created_at: now,
            last_accessed_at: now,
            timestamp: now,
            access_count: 0,
            reinforcement_count: 0,
            related_entities: Vec::new(),
            related_characters: Vec::new(),
            tags: Vec::new(),
            source: String::new(),
            is_forgotten: false,
            expires_at: None,
        }
    }

    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = clamp_unit(importance);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = clamp_unit(confidence);
        self
    }

    /// Set valence and arousal, clamped to their domains
    pub fn with_emotion(mut self, valence: f64, arousal: f64) -> Self {
        self.emotional_valence = clamp_valence(valence);
        self.arousal = clamp_unit(arousal);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Record a retrieval of this memory.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.access_count = self.access_count.saturating_add(1);
        if now > self.last_accessed_at {
            self.last_accessed_at = now;
        }
    }

    /// Record new supporting evidence for this memory.
    pub fn reinforce(&mut self) {
        self.reinforcement_count = self.reinforcement_count.saturating_add(1);
    }

    /// Emotional intensity in [0,1]
    ///
    /// Uses the explicit intensity when present, otherwise derives it from
    /// the valence/arousal pair.
    pub fn emotional_weight(&self) -> f64 {
        match self.emotion_intensity {
            Some(intensity) => clamp_unit(intensity.abs()),
            None => clamp_unit((self.emotional_valence.abs() + self.arousal) / 2.0),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Days since creation (never negative)
    pub fn age_days(&self, now: DateTime<Utc>) -> f64 {
        days_between(self.created_at, now)
    }

    /// Days since last access (never negative)
    pub fn days_since_access(&self, now: DateTime<Utc>) -> f64 {
        days_between(self.last_accessed_at, now)
    }
}

/// One dialogue exchange held in working memory
///
/// Turns are never mutated in place once buffered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: String,
    pub user_input: String,
    pub system_response: String,
    pub importance: f64,
    pub emotion_intensity: f64,
    pub speaker: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub force_promote: bool,
}

impl ConversationTurn {
    pub fn new(user_input: impl Into<String>, system_response: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_input: user_input.into(),
            system_response: system_response.into(),
            importance: 0.0,
            emotion_intensity: 0.0,
            speaker: None,
            timestamp: Utc::now(),
            force_promote: false,
        }
    }

    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = clamp_unit(importance);
        self
    }

    pub fn with_emotion_intensity(mut self, intensity: f64) -> Self {
        self.emotion_intensity = clamp_unit(intensity);
        self
    }

    pub fn with_speaker(mut self, speaker: impl Into<String>) -> Self {
        self.speaker = Some(speaker.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn force_promote(mut self) -> Self {
        self.force_promote = true;
        self
    }

    /// Case-insensitive substring match over input and response
    pub fn matches(&self, keyword: &str) -> bool {
        let needle = keyword.to_lowercase();
        self.user_input.to_lowercase().contains(&needle)
            || self.system_response.to_lowercase().contains(&needle)
    }
}

/// How a reconstruction rewrites memory content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconstructionType {
    Append,
    Update,
    Replace,
    Correction,
    Reinterpretation,
    Merge,
}

impl ReconstructionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Append => "append",
            Self::Update => "update",
            Self::Replace => "replace",
            Self::Correction => "correction",
            Self::Reinterpretation => "reinterpretation",
            Self::Merge => "merge",
        }
    }
}

impl std::fmt::Display for ReconstructionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of a memory's reconstruction history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconstructionRecord {
    pub memory_id: String,
    pub timestamp: DateTime<Utc>,
    pub reconstruction_type: ReconstructionType,
    /// Leading snippet of the content before the change
    pub previous_content: String,
    pub new_evidence: String,
    pub reasoning: String,
}
