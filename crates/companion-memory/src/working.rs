//! Working Memory
//!
//! Bounded short-term buffer of conversation turns:
//! - FIFO eviction once the buffer exceeds its capacity
//! - Automatic promotion of important or emotional turns into the durable store
//! - Manual promotion, keyword search and transcript rendering
//!
//! A single lock owns the turn list, so concurrent `add_turn` calls keep FIFO
//! order and the capacity bound exact. The lock is held across promotion
//! writes: a turn is never reported promoted before its memory is saved.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::WorkingMemoryConfig;
use crate::error::{Error, Result};
use crate::store::MemoryStore;
use crate::types::{ConversationTurn, Memory, MemoryCategory};

/// Source recorded on memories promoted from the buffer
pub const PROMOTION_SOURCE: &str = "working_memory";

/// Cue words used to pick a category for promoted turns
#[derive(Debug, Clone)]
pub struct CategoryCues {
    pub anniversary: Vec<&'static str>,
    pub person: Vec<&'static str>,
    pub preference: Vec<&'static str>,
    pub fact: Vec<&'static str>,
}

impl Default for CategoryCues {
    fn default() -> Self {
        Self {
            anniversary: vec![
                "birthday", "anniversary", "wedding day", "生日", "纪念日", "周年",
            ],
            person: vec![
                "my mom", "my mother", "my dad", "my father", "my sister", "my brother",
                "my friend", "my wife", "my husband", "my boss", "妈妈", "爸爸", "朋友",
                "姐姐", "哥哥", "老板",
            ],
            preference: vec![
                "i like", "i love", "i prefer", "i hate", "favorite", "favourite",
                "我喜欢", "我爱", "我讨厌", "最喜欢",
            ],
            fact: vec![
                "my name is", "i live", "i work", "i am from", "我叫", "我住", "我在",
            ],
        }
    }
}

impl CategoryCues {
    /// First matching category in order anniversary, person, preference, fact
    pub fn infer(&self, text: &str) -> MemoryCategory {
        let lower = text.to_lowercase();
        let hit = |words: &[&'static str]| words.iter().any(|w| lower.contains(w));

        if hit(&self.anniversary) {
            MemoryCategory::Anniversary
        } else if hit(&self.person) {
            MemoryCategory::Person
        } else if hit(&self.preference) {
            MemoryCategory::Preference
        } else if hit(&self.fact) {
            MemoryCategory::Fact
        } else {
            MemoryCategory::Episodic
        }
    }
}

/// Result of buffering one turn
#[derive(Debug, Clone, PartialEq)]
pub struct AddTurnOutcome {
    pub turn_id: String,
    /// Memory created for this turn, when it qualified for promotion
    pub promoted_memory_id: Option<String>,
    /// Oldest turns pushed out to make room
    pub evicted: Vec<ConversationTurn>,
}

/// Buffer counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkingMemoryStatistics {
    pub size: usize,
    pub capacity: usize,
    /// Turns ever added
    pub total_processed: u64,
    /// Turns persisted as memories
    pub promoted: u64,
    /// Turns dropped by FIFO overflow
    pub evicted: u64,
    /// Turns dropped by retention expiry
    pub expired: u64,
    /// promoted / total_processed, 0 before the first turn
    pub promotion_rate: f64,
}

#[derive(Default)]
struct BufferState {
    turns: VecDeque<ConversationTurn>,
    total_processed: u64,
    promoted_count: u64,
    evicted_count: u64,
    expired_count: u64,
    /// turn id -> memory id, for turns still buffered
    promoted: HashMap<String, String>,
}

impl BufferState {
    fn evict_over(&mut self, capacity: usize) -> Vec<ConversationTurn> {
        let mut evicted = Vec::new();
        while self.turns.len() > capacity {
            if let Some(turn) = self.turns.pop_front() {
                self.promoted.remove(&turn.id);
                self.evicted_count += 1;
                evicted.push(turn);
            }
        }
        evicted
    }
}

/// Short-term conversational buffer with promotion into the memory store
pub struct WorkingMemoryManager {
    store: Arc<dyn MemoryStore>,
    config: RwLock<Arc<WorkingMemoryConfig>>,
    cues: CategoryCues,
    buffer: Mutex<BufferState>,
}

impl WorkingMemoryManager {
    pub fn new(store: Arc<dyn MemoryStore>, config: WorkingMemoryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config: RwLock::new(Arc::new(config)),
            cues: CategoryCues::default(),
            buffer: Mutex::new(BufferState::default()),
        })
    }

    pub fn with_cues(mut self, cues: CategoryCues) -> Self {
        self.cues = cues;
        self
    }

    pub async fn config(&self) -> Arc<WorkingMemoryConfig> {
        self.config.read().await.clone()
    }

    /// Validate and swap the config. Shrinking the capacity evicts the oldest turns.
    pub async fn update_config(&self, config: WorkingMemoryConfig) -> Result<()> {
        config.validate()?;
        let mut buffer = self.buffer.lock().await;
        let evicted = buffer.evict_over(config.max_capacity);
        *self.config.write().await = Arc::new(config);

        if !evicted.is_empty() {
            debug!(evicted = evicted.len(), "Capacity reduced, evicted oldest turns");
        }
        Ok(())
    }

    /// Buffer a turn, evicting the oldest on overflow, and promote it when it qualifies.
    ///
    /// A failed promotion leaves the turn buffered and returns the store error;
    /// a later `promote_manually` can retry it.
    pub async fn add_turn(&self, turn: ConversationTurn) -> Result<AddTurnOutcome> {
        // Config is read under the buffer lock so a concurrent capacity
        // shrink cannot be overtaken by a push against the old capacity
        let mut buffer = self.buffer.lock().await;
        let config = self.config().await;

        let turn_id = turn.id.clone();
        let reason = Self::promotion_reason(&config, &turn);

        buffer.turns.push_back(turn.clone());
        buffer.total_processed += 1;
        let evicted = buffer.evict_over(config.max_capacity);
        for old in &evicted {
            debug!(turn_id = %old.id, "Evicted oldest turn");
        }

        let promoted_memory_id = match reason {
            Some(reason) => Some(self.promote_locked(&mut buffer, &turn, reason).await?),
            None => None,
        };

        Ok(AddTurnOutcome {
            turn_id,
            promoted_memory_id,
            evicted,
        })
    }

    fn promotion_reason(config: &WorkingMemoryConfig, turn: &ConversationTurn) -> Option<&'static str> {
        if turn.force_promote {
            Some("forced")
        } else if !config.auto_promote {
            None
        } else if turn.importance >= config.promotion_importance_threshold {
            Some("importance")
        } else if turn.emotion_intensity >= config.promotion_emotion_threshold {
            Some("emotion")
        } else {
            None
        }
    }

    /// Persist a turn unless it already was. Returns the memory id.
    async fn promote_locked(
        &self,
        buffer: &mut BufferState,
        turn: &ConversationTurn,
        reason: &str,
    ) -> Result<String> {
        if let Some(memory_id) = buffer.promoted.get(&turn.id) {
            return Ok(memory_id.clone());
        }

        let memory = self.turn_to_memory(turn, reason);
        let memory_id = self.store.save_memory(memory).await?;

        // The turn may have been evicted in the same call; only map it while buffered
        if buffer.turns.iter().any(|t| t.id == turn.id) {
            buffer.promoted.insert(turn.id.clone(), memory_id.clone());
        }
        buffer.promoted_count += 1;

        debug!(turn_id = %turn.id, memory_id = %memory_id, reason, "Promoted turn");
        Ok(memory_id)
    }

    fn turn_to_memory(&self, turn: &ConversationTurn, reason: &str) -> Memory {
        let speaker = turn.speaker.as_deref().unwrap_or("User");
        let content = format!(
            "{}: {}\nAssistant: {}",
            speaker, turn.user_input, turn.system_response
        );
        let category = self.cues.infer(&turn.user_input);

        let mut memory = Memory::new(content, category)
            .with_importance(turn.importance)
            .with_source(PROMOTION_SOURCE)
            .with_tags(vec![PROMOTION_SOURCE.to_string(), reason.to_string()]);
        memory.emotion_intensity = Some(turn.emotion_intensity);
        memory.timestamp = turn.timestamp;
        if let Some(speaker) = &turn.speaker {
            memory.related_entities.push(speaker.clone());
        }
        memory
    }

    /// Force promotion of a buffered turn. Promoting twice returns the same memory id.
    pub async fn promote_manually(&self, turn_id: &str, reason: &str) -> Result<String> {
        let mut buffer = self.buffer.lock().await;
        let turn = buffer
            .turns
            .iter()
            .find(|t| t.id == turn_id)
            .cloned()
            .ok_or_else(|| Error::not_found("Turn", turn_id))?;

        let reason = format!("manual: {}", reason);
        self.promote_locked(&mut buffer, &turn, &reason).await
    }

    /// Empty the buffer, first promoting every unpromoted turn when `promote_all`.
    ///
    /// If any promotion fails the buffer is left intact and the error returned.
    /// Returns the number of turns promoted by this call.
    pub async fn clear(&self, promote_all: bool) -> Result<usize> {
        let mut buffer = self.buffer.lock().await;
        let mut promoted = 0;

        if promote_all {
            let pending: Vec<ConversationTurn> = buffer
                .turns
                .iter()
                .filter(|t| !buffer.promoted.contains_key(&t.id))
                .cloned()
                .collect();

            for turn in &pending {
                if let Err(e) = self.promote_locked(&mut buffer, turn, "clear").await {
                    warn!(turn_id = %turn.id, error = %e, "Promotion failed, buffer not cleared");
                    return Err(e);
                }
                promoted += 1;
            }
        }

        let cleared = buffer.turns.len();
        buffer.turns.clear();
        buffer.promoted.clear();

        info!(cleared, promoted, "Working memory cleared");
        Ok(promoted)
    }

    /// Drop turns older than `retention_seconds` (config default when `None`).
    pub async fn cleanup_expired(&self, retention_seconds: Option<u64>) -> usize {
        let retention = match retention_seconds {
            Some(seconds) => seconds,
            None => self.config().await.retention_seconds,
        };
        // Windows past the representable range keep everything
        let Some(cutoff) =
            Utc::now().checked_sub_signed(Duration::seconds(retention.min(u32::MAX as u64) as i64))
        else {
            return 0;
        };

        let mut buffer = self.buffer.lock().await;
        let before = buffer.turns.len();
        let BufferState {
            turns, promoted, ..
        } = &mut *buffer;
        turns.retain(|t| {
            let keep = t.timestamp >= cutoff;
            if !keep {
                promoted.remove(&t.id);
            }
            keep
        });

        let removed = before - buffer.turns.len();
        buffer.expired_count += removed as u64;
        if removed > 0 {
            debug!(removed, "Expired turns removed");
        }
        removed
    }

    /// Last `n` turns, oldest first
    pub async fn get_recent_turns(&self, n: usize) -> Vec<ConversationTurn> {
        let buffer = self.buffer.lock().await;
        let skip = buffer.turns.len().saturating_sub(n);
        buffer.turns.iter().skip(skip).cloned().collect()
    }

    pub async fn get_last_turn(&self) -> Option<ConversationTurn> {
        self.buffer.lock().await.turns.back().cloned()
    }

    pub async fn get_turn(&self, turn_id: &str) -> Option<ConversationTurn> {
        let buffer = self.buffer.lock().await;
        buffer.turns.iter().find(|t| t.id == turn_id).cloned()
    }

    /// Buffered turns whose input or response contains `keyword`, oldest first
    pub async fn search(&self, keyword: &str) -> Vec<ConversationTurn> {
        let buffer = self.buffer.lock().await;
        buffer.turns.iter().filter(|t| t.matches(keyword)).cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.buffer.lock().await.turns.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.buffer.lock().await.turns.is_empty()
    }

    pub async fn get_statistics(&self) -> WorkingMemoryStatistics {
        let buffer = self.buffer.lock().await;
        let capacity = self.config().await.max_capacity;
        let promotion_rate = if buffer.total_processed == 0 {
            0.0
        } else {
            buffer.promoted_count as f64 / buffer.total_processed as f64
        };

        WorkingMemoryStatistics {
            size: buffer.turns.len(),
            capacity,
            total_processed: buffer.total_processed,
            promoted: buffer.promoted_count,
            evicted: buffer.evicted_count,
            expired: buffer.expired_count,
            promotion_rate,
        }
    }

    /// Transcript of the most recent `max_turns` turns under a turn-count header
    pub async fn generate_context_summary(&self, max_turns: usize) -> String {
        let turns = self.get_recent_turns(max_turns).await;
        if turns.is_empty() {
            return "No recent conversation.".to_string();
        }

        let mut summary = format!("=== Recent conversation ({} turns) ===\n", turns.len());
        for turn in &turns {
            let time = turn.timestamp.format("%H:%M");
            let speaker = turn.speaker.as_deref().unwrap_or("User");
            summary.push_str(&format!("[{}] {}: {}\n", time, speaker, turn.user_input));
            summary.push_str(&format!("[{}] Assistant: {}\n", time, turn.system_response));
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InstrumentedStore;

    fn manager_with(store: Arc<InstrumentedStore>, capacity: usize) -> WorkingMemoryManager {
        WorkingMemoryManager::new(store, WorkingMemoryConfig::default().with_capacity(capacity))
            .unwrap()
    }

    fn turn(n: usize) -> ConversationTurn {
        ConversationTurn::new(format!("message {}", n), format!("reply {}", n))
    }

    // ─── buffering ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_fifo_eviction_at_capacity() {
        let store = Arc::new(InstrumentedStore::default());
        let manager = manager_with(store.clone(), 5);

        let mut ids = Vec::new();
        for n in 0..8 {
            ids.push(manager.add_turn(turn(n)).await.unwrap().turn_id);
        }

        let stats = manager.get_statistics().await;
        assert_eq!(stats.size, 5);
        assert_eq!(stats.evicted, 3);
        assert_eq!(stats.total_processed, 8);

        for id in &ids[..3] {
            assert!(manager.get_turn(id).await.is_none());
        }
        let recent: Vec<String> = manager.get_recent_turns(10).await.into_iter().map(|t| t.id).collect();
        assert_eq!(recent, ids[3..].to_vec());
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_eviction_outcome_reports_dropped_turn() {
        let manager = manager_with(Arc::new(InstrumentedStore::default()), 1);
        let first = manager.add_turn(turn(0)).await.unwrap();
        assert!(first.evicted.is_empty());

        let second = manager.add_turn(turn(1)).await.unwrap();
        assert_eq!(second.evicted.len(), 1);
        assert_eq!(second.evicted[0].id, first.turn_id);
    }

    #[tokio::test]
    async fn test_concurrent_adds_respect_capacity() {
        let manager = Arc::new(manager_with(Arc::new(InstrumentedStore::default()), 10));

        let mut handles = Vec::new();
        for n in 0..50 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move { manager.add_turn(turn(n)).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stats = manager.get_statistics().await;
        assert_eq!(stats.size, 10);
        assert_eq!(stats.total_processed, 50);
        assert_eq!(stats.evicted, 40);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_capacity_shrink_during_concurrent_adds() {
        let manager = Arc::new(manager_with(Arc::new(InstrumentedStore::default()), 10));

        let mut handles = Vec::new();
        for n in 0..40 {
            let task_manager = manager.clone();
            handles.push(tokio::spawn(async move {
                task_manager.add_turn(turn(n)).await.map(|_| ())
            }));
            if n == 20 {
                let manager = manager.clone();
                handles.push(tokio::spawn(async move {
                    manager
                        .update_config(WorkingMemoryConfig::default().with_capacity(2))
                        .await
                }));
            }
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stats = manager.get_statistics().await;
        assert_eq!(stats.capacity, 2);
        assert!(stats.size <= 2, "buffer holds {} turns", stats.size);
        assert_eq!(stats.total_processed, 40);
    }

    // ─── promotion ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_threshold_promotion_creates_one_memory_each() {
        let store = Arc::new(InstrumentedStore::default());
        let manager = manager_with(store.clone(), 20);

        let important = manager
            .add_turn(turn(0).with_importance(0.7))
            .await
            .unwrap();
        let emotional = manager
            .add_turn(turn(1).with_emotion_intensity(0.85))
            .await
            .unwrap();
        let forced = manager.add_turn(turn(2).force_promote()).await.unwrap();
        let plain = manager
            .add_turn(turn(3).with_importance(0.69).with_emotion_intensity(0.79))
            .await
            .unwrap();

        assert!(important.promoted_memory_id.is_some());
        assert!(emotional.promoted_memory_id.is_some());
        assert!(forced.promoted_memory_id.is_some());
        assert!(plain.promoted_memory_id.is_none());
        assert_eq!(store.save_count(), 3);
        assert_eq!(store.len().await, 3);

        let stats = manager.get_statistics().await;
        assert_eq!(stats.promoted, 3);
        assert!((stats.promotion_rate - 0.75).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_promoted_memory_fields() {
        let store = Arc::new(InstrumentedStore::default());
        let manager = manager_with(store.clone(), 20);

        let outcome = manager
            .add_turn(
                ConversationTurn::new("I love jasmine tea", "Noted!")
                    .with_importance(0.9)
                    .with_emotion_intensity(0.4)
                    .with_speaker("Mia"),
            )
            .await
            .unwrap();

        let memory_id = outcome.promoted_memory_id.unwrap();
        let memory = store.get_memory_by_id(&memory_id).await.unwrap().unwrap();
        assert_eq!(memory.category, MemoryCategory::Preference);
        assert_eq!(memory.source, PROMOTION_SOURCE);
        assert_eq!(memory.importance, 0.9);
        assert_eq!(memory.emotion_intensity, Some(0.4));
        assert!(memory.content.contains("Mia: I love jasmine tea"));
        assert!(memory.content.contains("Noted!"));
        assert_eq!(memory.related_entities, vec!["Mia".to_string()]);
    }

    #[tokio::test]
    async fn test_auto_promote_off_still_honours_force() {
        let store = Arc::new(InstrumentedStore::default());
        let config = WorkingMemoryConfig {
            auto_promote: false,
            ..Default::default()
        };
        let manager = WorkingMemoryManager::new(store.clone(), config).unwrap();

        let high = manager.add_turn(turn(0).with_importance(1.0)).await.unwrap();
        let forced = manager.add_turn(turn(1).force_promote()).await.unwrap();

        assert!(high.promoted_memory_id.is_none());
        assert!(forced.promoted_memory_id.is_some());
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_promotion_keeps_turn_buffered() {
        let store = Arc::new(InstrumentedStore::default());
        let manager = manager_with(store.clone(), 5);
        store.set_fail_save(true);

        let t = turn(0).with_importance(0.95);
        let id = t.id.clone();
        let err = manager.add_turn(t).await.unwrap_err();
        assert!(err.is_store_failure());
        assert!(manager.get_turn(&id).await.is_some());
        assert_eq!(manager.get_statistics().await.promoted, 0);

        // Retry once the store recovers
        store.set_fail_save(false);
        manager.promote_manually(&id, "retry").await.unwrap();
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_manual_promotion() {
        let store = Arc::new(InstrumentedStore::default());
        let manager = manager_with(store.clone(), 5);
        let id = manager.add_turn(turn(0)).await.unwrap().turn_id;

        let first = manager.promote_manually(&id, "user asked").await.unwrap();
        let second = manager.promote_manually(&id, "again").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.save_count(), 1);

        let memory = store.get_memory_by_id(&first).await.unwrap().unwrap();
        assert!(memory.tags.contains(&"manual: user asked".to_string()));

        let err = manager.promote_manually("nope", "x").await.unwrap_err();
        assert!(err.is_not_found());
    }

    // ─── clearing and expiry ───────────────────────────────────────────

    #[tokio::test]
    async fn test_clear_with_and_without_promotion() {
        let store = Arc::new(InstrumentedStore::default());
        let manager = manager_with(store.clone(), 10);

        manager.add_turn(turn(0).with_importance(0.9)).await.unwrap();
        manager.add_turn(turn(1)).await.unwrap();
        manager.add_turn(turn(2)).await.unwrap();

        // Already-promoted turn is not saved again
        assert_eq!(manager.clear(true).await.unwrap(), 2);
        assert_eq!(store.save_count(), 3);
        assert!(manager.is_empty().await);

        manager.add_turn(turn(3)).await.unwrap();
        assert_eq!(manager.clear(false).await.unwrap(), 0);
        assert_eq!(store.save_count(), 3);
        assert_eq!(manager.len().await, 0);
    }

    #[tokio::test]
    async fn test_clear_aborts_when_promotion_fails() {
        let store = Arc::new(InstrumentedStore::default());
        let manager = manager_with(store.clone(), 10);
        manager.add_turn(turn(0)).await.unwrap();
        manager.add_turn(turn(1)).await.unwrap();

        store.set_fail_save(true);
        assert!(manager.clear(true).await.is_err());
        assert_eq!(manager.len().await, 2);
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let manager = manager_with(Arc::new(InstrumentedStore::default()), 10);
        let old = turn(0).with_timestamp(Utc::now() - Duration::hours(2));
        let older = turn(1).with_timestamp(Utc::now() - Duration::hours(3));
        manager.add_turn(old).await.unwrap();
        manager.add_turn(older).await.unwrap();
        manager.add_turn(turn(2)).await.unwrap();

        assert_eq!(manager.cleanup_expired(Some(7200 + 60)).await, 1);
        assert_eq!(manager.cleanup_expired(None).await, 1);
        assert_eq!(manager.len().await, 1);

        let stats = manager.get_statistics().await;
        assert_eq!(stats.expired, 2);
        assert_eq!(stats.evicted, 0);
    }

    // ─── queries ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_read_only_queries() {
        let manager = manager_with(Arc::new(InstrumentedStore::default()), 10);
        assert!(manager.get_last_turn().await.is_none());

        manager
            .add_turn(ConversationTurn::new("My cat is called Miso", "Cute name"))
            .await
            .unwrap();
        manager
            .add_turn(ConversationTurn::new("Going hiking tomorrow", "Have fun"))
            .await
            .unwrap();

        assert_eq!(manager.search("CAT").await.len(), 1);
        assert_eq!(manager.search("fun").await.len(), 1);
        assert!(manager.search("dog").await.is_empty());
        assert_eq!(manager.get_recent_turns(1).await[0].user_input, "Going hiking tomorrow");
        assert_eq!(manager.get_last_turn().await.unwrap().system_response, "Have fun");

        // Queries never mutate
        assert_eq!(manager.get_statistics().await.total_processed, 2);
    }

    #[tokio::test]
    async fn test_context_summary() {
        let manager = manager_with(Arc::new(InstrumentedStore::default()), 10);
        assert_eq!(manager.generate_context_summary(5).await, "No recent conversation.");

        for n in 0..3 {
            manager.add_turn(turn(n)).await.unwrap();
        }

        let summary = manager.generate_context_summary(2).await;
        assert!(summary.starts_with("=== Recent conversation (2 turns) ==="));
        assert!(!summary.contains("message 0"));
        assert!(summary.contains("User: message 1"));
        assert!(summary.contains("Assistant: reply 2"));

        let all = manager.generate_context_summary(100).await;
        assert!(all.starts_with("=== Recent conversation (3 turns) ==="));
    }

    #[tokio::test]
    async fn test_shrinking_capacity_evicts_oldest() {
        let manager = manager_with(Arc::new(InstrumentedStore::default()), 10);
        for n in 0..6 {
            manager.add_turn(turn(n)).await.unwrap();
        }

        manager
            .update_config(WorkingMemoryConfig::default().with_capacity(2))
            .await
            .unwrap();

        let stats = manager.get_statistics().await;
        assert_eq!(stats.size, 2);
        assert_eq!(stats.capacity, 2);
        assert_eq!(stats.evicted, 4);
        assert_eq!(manager.get_recent_turns(10).await[0].user_input, "message 4");

        let err = manager
            .update_config(WorkingMemoryConfig::default().with_capacity(0))
            .await
            .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_category_inference() {
        let cues = CategoryCues::default();
        assert_eq!(cues.infer("My birthday is in June"), MemoryCategory::Anniversary);
        assert_eq!(cues.infer("my mom called today"), MemoryCategory::Person);
        assert_eq!(cues.infer("I prefer green tea"), MemoryCategory::Preference);
        assert_eq!(cues.infer("My name is Lin"), MemoryCategory::Fact);
        assert_eq!(cues.infer("我喜欢下雨天"), MemoryCategory::Preference);
        assert_eq!(cues.infer("Went to the park"), MemoryCategory::Episodic);
    }
}
