//! Emotion Valence Updater
//!
//! Maintains the emotional annotation of stored memories:
//!
//! - **update**: detect (or accept) a new valence/arousal pair for a memory
//! - **decay**: drift valence toward a small band around zero and arousal
//!   toward zero as days pass without access
//! - **amplify**: scale both axes by a factor in [1, 2]
//!
//! Every read-modify-write against the store runs inside one critical
//! section, so concurrent callers never lose each other's updates. Each
//! change is recorded in a per-memory history bounded to
//! [`MAX_EMOTION_HISTORY`] entries.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::{EmotionDetector, EmotionQuadrant, EmotionState};
use crate::config::EmotionDecayConfig;
use crate::error::{Error, Result};
use crate::store::MemoryStore;
use crate::types::Memory;
use crate::utils::days_between;

/// History entries kept per memory
pub const MAX_EMOTION_HISTORY: usize = 50;

/// Changes smaller than this on both axes are not written
const DECAY_EPSILON: f64 = 1e-3;

const MIN_AMPLIFICATION: f64 = 1.0;
const MAX_AMPLIFICATION: f64 = 2.0;

/// Why an emotion annotation changed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EmotionChangeReason {
    /// Resolved by the emotion detector
    Detected,
    /// Explicit override from the caller
    Manual,
    /// Time-based decay over `days` without access
    Decay { days: f64 },
    /// Scaled by `factor`
    Amplified { factor: f64 },
}

impl std::fmt::Display for EmotionChangeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Detected => write!(f, "detected from context"),
            Self::Manual => write!(f, "manual override"),
            Self::Decay { days } => write!(f, "decay over {:.2} days", days),
            Self::Amplified { factor } => write!(f, "amplified by {:.2}", factor),
        }
    }
}

/// One change to a memory's emotion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionChangeRecord {
    pub memory_id: String,
    pub timestamp: DateTime<Utc>,
    pub before: EmotionState,
    pub after: EmotionState,
    pub reason: EmotionChangeReason,
}

impl EmotionChangeRecord {
    pub fn valence_delta(&self) -> f64 {
        self.after.valence() - self.before.valence()
    }

    pub fn arousal_delta(&self) -> f64 {
        self.after.arousal() - self.before.arousal()
    }
}

/// Outcome of one decay sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecayReport {
    /// Memories considered
    pub examined: usize,
    /// Memories written back
    pub updated: usize,
    /// Memories left alone (no elapsed time, negligible change, missing)
    pub skipped: usize,
    /// Memories whose write failed
    pub failed: usize,
}

/// Aggregate view over the emotions of all live memories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionStatistics {
    pub total: usize,
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
    pub average_valence: f64,
    pub average_arousal: f64,
    /// Most frequent quadrant, `None` for an empty store
    pub dominant_quadrant: Option<EmotionQuadrant>,
    pub label_distribution: BTreeMap<String, usize>,
}

/// Valence magnitude separating positive/negative from neutral in statistics
const POLARITY_THRESHOLD: f64 = 0.1;

#[derive(Default)]
struct UpdaterState {
    history: HashMap<String, VecDeque<EmotionChangeRecord>>,
    /// Last instant decay was applied to each memory
    last_decayed: HashMap<String, DateTime<Utc>>,
}

impl UpdaterState {
    fn record(&mut self, record: EmotionChangeRecord) {
        let entries = self.history.entry(record.memory_id.clone()).or_default();
        if entries.len() == MAX_EMOTION_HISTORY {
            entries.pop_front();
        }
        entries.push_back(record);
    }

    /// Drop history and decay bookkeeping of memories no longer in `live`.
    fn retain_live(&mut self, live: &HashSet<&str>) -> usize {
        let before = self.history.len() + self.last_decayed.len();
        self.history.retain(|id, _| live.contains(id.as_str()));
        self.last_decayed.retain(|id, _| live.contains(id.as_str()));
        before - self.history.len() - self.last_decayed.len()
    }

    fn forget(&mut self, memory_id: &str) {
        self.history.remove(memory_id);
        self.last_decayed.remove(memory_id);
    }
}

/// Detects, decays and amplifies memory emotions
pub struct EmotionValenceUpdater {
    store: Arc<dyn MemoryStore>,
    detector: Arc<dyn EmotionDetector>,
    config: RwLock<Arc<EmotionDecayConfig>>,
    /// Held across every read-modify-write
    state: Mutex<UpdaterState>,
}

impl EmotionValenceUpdater {
    pub fn new(
        store: Arc<dyn MemoryStore>,
        detector: Arc<dyn EmotionDetector>,
        config: EmotionDecayConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            detector,
            config: RwLock::new(Arc::new(config)),
            state: Mutex::new(UpdaterState::default()),
        })
    }

    pub async fn config(&self) -> Arc<EmotionDecayConfig> {
        self.config.read().await.clone()
    }

    /// Validate and swap in a new decay configuration
    pub async fn update_config(&self, config: EmotionDecayConfig) -> Result<()> {
        config.validate()?;
        *self.config.write().await = Arc::new(config);
        Ok(())
    }

    /// Re-annotate a memory from `context`, or from `manual` when given.
    ///
    /// An empty context falls back to the memory's own content.
    pub async fn update_emotion(
        &self,
        memory_id: &str,
        context: &str,
        manual: Option<EmotionState>,
    ) -> Result<EmotionChangeRecord> {
        let mut state = self.state.lock().await;
        let mut memory = self.fetch(memory_id).await?;

        let (after, reason) = match manual {
            Some(emotion) => (emotion, EmotionChangeReason::Manual),
            None => {
                let text = if context.trim().is_empty() {
                    memory.content.as_str()
                } else {
                    context
                };
                (self.detector.detect(text), EmotionChangeReason::Detected)
            }
        };

        let record = self.persist(&mut memory, after, reason).await?;
        state.record(record.clone());

        debug!(
            memory_id = %memory_id,
            valence = after.valence(),
            arousal = after.arousal(),
            reason = %reason,
            "Emotion updated"
        );
        Ok(record)
    }

    /// Decay the emotions of `targets` (or every memory when `None`).
    ///
    /// Elapsed time is measured from the later of the last access and the
    /// last decay, so back-to-back sweeps never apply the same interval twice.
    pub async fn apply_decay(&self, targets: Option<&[String]>) -> Result<DecayReport> {
        let config = self.config().await;
        let mut report = DecayReport::default();
        if !config.enabled {
            debug!("Emotion decay disabled, skipping sweep");
            return Ok(report);
        }

        let mut state = self.state.lock().await;
        let memories = match targets {
            None => {
                let memories = self.store.get_all_memories().await?;
                let live: HashSet<&str> = memories.iter().map(|m| m.id.as_str()).collect();
                let pruned = state.retain_live(&live);
                if pruned > 0 {
                    debug!(pruned, "Dropped emotion state of deleted memories");
                }
                memories
            }
            Some(ids) => {
                let mut found = Vec::with_capacity(ids.len());
                for id in ids {
                    match self.store.get_memory_by_id(id).await? {
                        Some(memory) => found.push(memory),
                        None => {
                            warn!(memory_id = %id, "Decay target not found");
                            state.forget(id);
                            report.examined += 1;
                            report.skipped += 1;
                        }
                    }
                }
                found
            }
        };

        let now = Utc::now();
        for mut memory in memories {
            report.examined += 1;
            if memory.is_forgotten {
                report.skipped += 1;
                continue;
            }

            let since = state
                .last_decayed
                .get(&memory.id)
                .map_or(memory.last_accessed_at, |t| (*t).max(memory.last_accessed_at));
            let days = days_between(since, now);
            let before = EmotionState::new(memory.emotional_valence, memory.arousal);
            let after = decayed(&config, before, days);

            if days <= 0.0
                || ((after.valence() - before.valence()).abs() < DECAY_EPSILON
                    && (after.arousal() - before.arousal()).abs() < DECAY_EPSILON)
            {
                report.skipped += 1;
                continue;
            }

            let memory_id = memory.id.clone();
            match self
                .persist(&mut memory, after, EmotionChangeReason::Decay { days })
                .await
            {
                Ok(record) => {
                    state.record(record);
                    state.last_decayed.insert(memory_id, now);
                    report.updated += 1;
                }
                Err(e) => {
                    warn!(memory_id = %memory_id, error = %e, "Emotion decay write failed");
                    report.failed += 1;
                }
            }
        }

        info!(
            examined = report.examined,
            updated = report.updated,
            skipped = report.skipped,
            failed = report.failed,
            "Emotion decay sweep complete"
        );
        Ok(report)
    }

    /// Scale valence and arousal by `factor` in [1, 2], clamping the results.
    pub async fn amplify_emotion(
        &self,
        memory_id: &str,
        factor: f64,
    ) -> Result<EmotionChangeRecord> {
        if !(MIN_AMPLIFICATION..=MAX_AMPLIFICATION).contains(&factor) {
            return Err(Error::invalid_argument(format!(
                "amplification must be between {} and {}, got {}",
                MIN_AMPLIFICATION, MAX_AMPLIFICATION, factor
            )));
        }

        let mut state = self.state.lock().await;
        let mut memory = self.fetch(memory_id).await?;
        let after = EmotionState::new(memory.emotional_valence * factor, memory.arousal * factor);

        let record = self
            .persist(&mut memory, after, EmotionChangeReason::Amplified { factor })
            .await?;
        state.record(record.clone());
        Ok(record)
    }

    /// Change history of one memory, oldest first
    pub async fn get_emotion_history(&self, memory_id: &str) -> Vec<EmotionChangeRecord> {
        let state = self.state.lock().await;
        state
            .history
            .get(memory_id)
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Changes where either axis moved by more than `threshold`, oldest first
    pub async fn get_significant_changes(&self, threshold: f64) -> Vec<EmotionChangeRecord> {
        let state = self.state.lock().await;
        let mut changes: Vec<EmotionChangeRecord> = state
            .history
            .values()
            .flatten()
            .filter(|r| r.valence_delta().abs() > threshold || r.arousal_delta().abs() > threshold)
            .cloned()
            .collect();
        changes.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.memory_id.cmp(&b.memory_id))
        });
        changes
    }

    pub async fn get_statistics(&self) -> Result<EmotionStatistics> {
        let memories: Vec<Memory> = self
            .store
            .get_all_memories()
            .await?
            .into_iter()
            .filter(|m| !m.is_forgotten)
            .collect();

        let total = memories.len();
        let mut positive = 0;
        let mut negative = 0;
        let mut quadrants: HashMap<EmotionQuadrant, usize> = HashMap::new();
        let mut label_distribution = BTreeMap::new();
        let mut valence_sum = 0.0;
        let mut arousal_sum = 0.0;

        for memory in &memories {
            let emotion = EmotionState::new(memory.emotional_valence, memory.arousal);
            if emotion.valence() > POLARITY_THRESHOLD {
                positive += 1;
            } else if emotion.valence() < -POLARITY_THRESHOLD {
                negative += 1;
            }
            valence_sum += emotion.valence();
            arousal_sum += emotion.arousal();
            *quadrants.entry(emotion.quadrant()).or_default() += 1;

            let label = memory
                .dominant_emotion
                .clone()
                .unwrap_or_else(|| emotion.label().to_string());
            *label_distribution.entry(label).or_default() += 1;
        }

        // Ties resolve in declaration order
        let dominant_quadrant = [
            EmotionQuadrant::Excited,
            EmotionQuadrant::Content,
            EmotionQuadrant::Distressed,
            EmotionQuadrant::Depressed,
            EmotionQuadrant::Neutral,
        ]
        .into_iter()
        .filter_map(|q| quadrants.get(&q).map(|count| (q, *count)))
        .fold(None, |best: Option<(EmotionQuadrant, usize)>, (q, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((q, count)),
        })
        .map(|(q, _)| q);

        let average = |sum: f64| if total == 0 { 0.0 } else { sum / total as f64 };

        Ok(EmotionStatistics {
            total,
            positive,
            negative,
            neutral: total - positive - negative,
            average_valence: average(valence_sum),
            average_arousal: average(arousal_sum),
            dominant_quadrant,
            label_distribution,
        })
    }

    async fn fetch(&self, memory_id: &str) -> Result<Memory> {
        self.store
            .get_memory_by_id(memory_id)
            .await?
            .ok_or_else(|| Error::not_found("Memory", memory_id))
    }

    /// Write `after` onto the memory and return the change record
    async fn persist(
        &self,
        memory: &mut Memory,
        after: EmotionState,
        reason: EmotionChangeReason,
    ) -> Result<EmotionChangeRecord> {
        let before = EmotionState::new(memory.emotional_valence, memory.arousal);

        memory.emotional_valence = after.valence();
        memory.arousal = after.arousal();
        memory.dominant_emotion = Some(after.label().to_string());
        memory.emotion_intensity = Some(after.intensity());
        self.store.update_memory(memory.clone()).await?;

        Ok(EmotionChangeRecord {
            memory_id: memory.id.clone(),
            timestamp: Utc::now(),
            before,
            after,
            reason,
        })
    }
}

/// Exponential drift toward the neutral band over `days`
fn decayed(config: &EmotionDecayConfig, emotion: EmotionState, days: f64) -> EmotionState {
    if days <= 0.0 {
        return emotion;
    }

    let valence_keep = (1.0 - config.valence_decay_rate).powf(days);
    let arousal_keep = (1.0 - config.arousal_decay_rate).powf(days);

    let valence = emotion.valence();
    let valence = if valence > config.valence_upper_bound {
        config.valence_upper_bound + (valence - config.valence_upper_bound) * valence_keep
    } else if valence < config.valence_lower_bound {
        config.valence_lower_bound + (valence - config.valence_lower_bound) * valence_keep
    } else {
        valence
    };

    EmotionState::new(valence, emotion.arousal() * arousal_keep)
}
