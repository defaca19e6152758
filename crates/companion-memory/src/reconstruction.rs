//! Memory Reconstruction
//!
//! Memories are revised rather than overwritten when new evidence arrives.
//! This module handles:
//!
//! - **reconstruct**: rewrite one memory's content according to a
//!   [`ReconstructionType`], keeping a bounded revision history
//! - **find similar**: nearest neighbours of a memory in its own category
//! - **merge**: collapse n memories into one, resolving contradictions by a
//!   [`ConflictResolution`] preference
//! - **auto-merge**: sweep the store for near-duplicates and merge each cluster once
//!
//! Merges write the new memory before deleting the inputs. If a delete
//! fails, the merged memory is removed and the already-deleted inputs are
//! restored, so no memory ever exists both merged and unmerged.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::store::{MemoryStore, SimilarMemory, VectorSearch};
use crate::types::{Memory, MemoryCategory, ReconstructionRecord, ReconstructionType};
use crate::utils::{clamp_unit, clamp_valence, snippet};

/// Revision records kept per memory
pub const MAX_RECONSTRUCTION_HISTORY: usize = 10;

/// Similarity at or above which auto-merge treats two memories as duplicates
pub const AUTO_MERGE_THRESHOLD: f64 = 0.88;

/// Neighbours examined per memory during auto-merge
const AUTO_MERGE_TOP_K: usize = 5;

/// Characters of prior content kept in a record
const SNIPPET_CHARS: usize = 120;

/// Source recorded on merged memories
pub const MERGE_SOURCE: &str = "merge";

/// How contradicting accounts are resolved during a merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    /// Keep the most recent account by event time
    #[default]
    TrustLatest,
    /// Keep the earliest account by event time
    TrustEarliest,
    /// Keep the account with the highest confidence
    TrustMostConfident,
    /// Keep every account, flagged as conflicting
    KeepAll,
}

impl ConflictResolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TrustLatest => "trust_latest",
            Self::TrustEarliest => "trust_earliest",
            Self::TrustMostConfident => "trust_most_confident",
            Self::KeepAll => "keep_all",
        }
    }
}

/// Correction cues that mark an account as contradicting an earlier one
#[derive(Debug, Clone)]
pub struct ConflictMarkers {
    pub markers: Vec<&'static str>,
}

impl Default for ConflictMarkers {
    fn default() -> Self {
        Self {
            markers: vec![
                "actually", "in fact", "correction", "not true", "no longer", "turns out",
                "其实", "实际上", "更正", "纠正", "不对",
            ],
        }
    }
}

impl ConflictMarkers {
    pub fn detect(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.markers.iter().any(|m| lower.contains(m))
    }
}

/// Result of a successful merge
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub merged: Memory,
    /// Input memories deleted from the store
    pub removed_ids: Vec<String>,
    pub conflict_detected: bool,
}

/// Aggregate over all recorded revisions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconstructionStatistics {
    pub total_records: usize,
    pub memories_touched: usize,
    pub avg_records_per_memory: f64,
    pub by_type: BTreeMap<String, usize>,
}

/// Revises, deduplicates and merges stored memories
pub struct MemoryReconstructionService {
    store: Arc<dyn MemoryStore>,
    vector: Arc<dyn VectorSearch>,
    markers: ConflictMarkers,
    history: Mutex<HashMap<String, VecDeque<ReconstructionRecord>>>,
}

impl MemoryReconstructionService {
    pub fn new(store: Arc<dyn MemoryStore>, vector: Arc<dyn VectorSearch>) -> Self {
        Self {
            store,
            vector,
            markers: ConflictMarkers::default(),
            history: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_markers(mut self, markers: ConflictMarkers) -> Self {
        self.markers = markers;
        self
    }

    /// Rewrite a memory's content with `new_evidence`.
    ///
    /// `emotional_shift` is added to the valence and clamped. `Merge` is not
    /// accepted here; use [`merge_memories`](Self::merge_memories).
    pub async fn reconstruct_memory(
        &self,
        memory_id: &str,
        new_evidence: &str,
        reconstruction_type: ReconstructionType,
        reason: Option<&str>,
        emotional_shift: Option<f64>,
    ) -> Result<Memory> {
        if reconstruction_type == ReconstructionType::Merge {
            return Err(Self::merge_rejected());
        }

        let mut memory = self
            .store
            .get_memory_by_id(memory_id)
            .await?
            .ok_or_else(|| Error::not_found("Memory", memory_id))?;
        let previous = memory.content.clone();

        memory.content = match reconstruction_type {
            ReconstructionType::Append => format!("{}\n[Added] {}", previous, new_evidence),
            ReconstructionType::Update => format!("{}\n[Updated] {}", previous, new_evidence),
            ReconstructionType::Replace => new_evidence.to_string(),
            ReconstructionType::Correction => {
                format!("[Corrected] {}\n(previously: {})", new_evidence, previous)
            }
            ReconstructionType::Reinterpretation => {
                format!("{}\n[Reinterpretation] {}", previous, new_evidence)
            }
            ReconstructionType::Merge => return Err(Self::merge_rejected()),
        };

        if matches!(
            reconstruction_type,
            ReconstructionType::Append | ReconstructionType::Update
        ) {
            memory.reinforce();
        }
        if let Some(shift) = emotional_shift {
            memory.emotional_valence = clamp_valence(memory.emotional_valence + shift);
        }
        // Content changed: the embedding and cached strength are stale
        memory.embedding = None;
        memory.strength = None;

        self.store.update_memory(memory.clone()).await?;

        let reasoning = reason
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} with new evidence", reconstruction_type));
        self.record(ReconstructionRecord {
            memory_id: memory.id.clone(),
            timestamp: Utc::now(),
            reconstruction_type,
            previous_content: snippet(&previous, SNIPPET_CHARS),
            new_evidence: new_evidence.to_string(),
            reasoning,
        })
        .await;

        debug!(memory_id = %memory.id, kind = %reconstruction_type, "Memory reconstructed");
        Ok(memory)
    }

    fn merge_rejected() -> Error {
        Error::invalid_argument("merge is not a single-memory reconstruction, use merge_memories")
    }

    /// Up to `top_k` neighbours of `memory` in its category, most similar first.
    ///
    /// Vector search failures are logged and yield an empty list.
    pub async fn find_similar_memories(
        &self,
        memory: &Memory,
        top_k: usize,
        min_similarity: f64,
    ) -> Vec<SimilarMemory> {
        let hits = match self
            .vector
            .search_similar(&memory.content, top_k + 1, Some(memory.category))
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                warn!(memory_id = %memory.id, error = %e, "Vector search failed");
                return Vec::new();
            }
        };

        let mut similar: Vec<SimilarMemory> = hits
            .into_iter()
            .filter(|hit| hit.memory_id != memory.id && hit.similarity >= min_similarity)
            .collect();
        similar.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.memory_id.cmp(&b.memory_id))
        });
        similar.truncate(top_k);
        similar
    }

    /// Merge at least two memories into one new memory.
    ///
    /// All inputs must exist. On success the inputs are deleted and the
    /// store holds `n − 1` fewer memories.
    pub async fn merge_memories(
        &self,
        ids: &[String],
        preference: Option<ConflictResolution>,
    ) -> Result<MergeOutcome> {
        let mut seen = HashSet::new();
        let ids: Vec<&String> = ids.iter().filter(|id| seen.insert(id.as_str())).collect();
        if ids.len() < 2 {
            return Err(Error::invalid_argument(
                "merge requires at least 2 distinct memory ids",
            ));
        }

        let mut inputs = Vec::with_capacity(ids.len());
        for id in &ids {
            let memory = self
                .store
                .get_memory_by_id(id)
                .await?
                .ok_or_else(|| Error::not_found("Memory", id.as_str()))?;
            inputs.push(memory);
        }
        inputs.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });

        let preference = preference.unwrap_or_default();
        let conflict_detected = inputs.iter().any(|m| self.markers.detect(&m.content));
        let content = if conflict_detected {
            Self::resolve_conflict(&inputs, preference)
        } else {
            Self::union_content(&inputs)
        };

        let merged = Self::combine(&inputs, content);
        let merged_id = self.store.save_memory(merged.clone()).await?;

        let mut removed: Vec<Memory> = Vec::with_capacity(inputs.len());
        for input in &inputs {
            if let Err(e) = self.store.delete_memory(&input.id).await {
                error!(memory_id = %input.id, error = %e, "Delete failed during merge, rolling back");
                self.rollback(&merged_id, &removed).await;
                return Err(e);
            }
            removed.push(input.clone());
        }

        let removed_ids: Vec<String> = removed.into_iter().map(|m| m.id).collect();
        {
            let mut history = self.history.lock().await;
            for id in &removed_ids {
                history.remove(id);
            }
        }

        let joined = inputs
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join(" | ");
        self.record(ReconstructionRecord {
            memory_id: merged_id.clone(),
            timestamp: Utc::now(),
            reconstruction_type: ReconstructionType::Merge,
            previous_content: snippet(&joined, SNIPPET_CHARS),
            new_evidence: format!("merged {}", removed_ids.join(", ")),
            reasoning: if conflict_detected {
                format!("conflict resolved by {}", preference.as_str())
            } else {
                "chronological union".to_string()
            },
        })
        .await;

        info!(
            merged_id = %merged_id,
            inputs = removed_ids.len(),
            conflict = conflict_detected,
            "Memories merged"
        );
        Ok(MergeOutcome {
            merged,
            removed_ids,
            conflict_detected,
        })
    }

    /// Undo a partial merge: drop the merged memory and restore deleted inputs
    async fn rollback(&self, merged_id: &str, removed: &[Memory]) {
        if let Err(e) = self.store.delete_memory(merged_id).await {
            error!(memory_id = %merged_id, error = %e, "Rollback could not remove merged memory");
        }
        for memory in removed {
            if let Err(e) = self.store.save_memory(memory.clone()).await {
                error!(memory_id = %memory.id, error = %e, "Rollback could not restore input");
            }
        }
    }

    /// Chronological content with exact duplicates dropped
    fn union_content(inputs: &[Memory]) -> String {
        let mut seen = HashSet::new();
        inputs
            .iter()
            .map(|m| m.content.trim())
            .filter(|c| !c.is_empty() && seen.insert(*c))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// `inputs` are in chronological order
    fn resolve_conflict(inputs: &[Memory], preference: ConflictResolution) -> String {
        let chosen = match preference {
            ConflictResolution::TrustLatest => inputs.last(),
            ConflictResolution::TrustEarliest => inputs.first(),
            ConflictResolution::TrustMostConfident => inputs
                .iter()
                .rev()
                .max_by(|a, b| a.confidence.total_cmp(&b.confidence)),
            ConflictResolution::KeepAll => {
                return format!("[Conflicting accounts]\n{}", Self::union_content(inputs));
            }
        };
        chosen.map(|m| m.content.clone()).unwrap_or_default()
    }

    /// Build the merged memory from chronologically ordered inputs
    fn combine(inputs: &[Memory], content: String) -> Memory {
        let n = inputs.len() as f64;
        // Category and label come from the most important input, earliest on ties
        let primary = inputs
            .iter()
            .rev()
            .max_by(|a, b| a.importance.total_cmp(&b.importance))
            .unwrap_or(&inputs[0]);

        let union = |field: fn(&Memory) -> &Vec<String>| {
            let mut seen = HashSet::new();
            inputs
                .iter()
                .flat_map(|m| field(m).iter())
                .filter(|v| seen.insert(v.as_str()))
                .cloned()
                .collect::<Vec<_>>()
        };

        let mut merged = Memory::new(content, primary.category).with_source(MERGE_SOURCE);
        merged.importance = inputs.iter().map(|m| m.importance).fold(0.0, f64::max);
        merged.confidence = clamp_unit(inputs.iter().map(|m| m.confidence).sum::<f64>() / n);
        merged.recall_difficulty = clamp_unit(inputs.iter().map(|m| m.recall_difficulty).sum::<f64>() / n);
        merged.context_relevance = inputs.iter().map(|m| m.context_relevance).fold(0.0, f64::max);
        merged.emotional_valence =
            clamp_valence(inputs.iter().map(|m| m.emotional_valence).sum::<f64>() / n);
        merged.arousal = inputs.iter().map(|m| m.arousal).fold(0.0, f64::max);
        merged.dominant_emotion = primary.dominant_emotion.clone();
        merged.emotion_intensity = primary.emotion_intensity;

        merged.created_at = inputs.iter().map(|m| m.created_at).min().unwrap_or(merged.created_at);
        merged.timestamp = inputs.iter().map(|m| m.timestamp).max().unwrap_or(merged.timestamp);
        merged.last_accessed_at = inputs
            .iter()
            .map(|m| m.last_accessed_at)
            .max()
            .unwrap_or(merged.last_accessed_at);
        merged.access_count = inputs.iter().fold(0u32, |acc, m| acc.saturating_add(m.access_count));
        merged.reinforcement_count = inputs
            .iter()
            .fold(0u32, |acc, m| acc.saturating_add(m.reinforcement_count))
            .saturating_add(inputs.len() as u32 - 1);

        merged.related_entities = union(|m| &m.related_entities);
        merged.related_characters = union(|m| &m.related_characters);
        merged.tags = union(|m| &m.tags);
        // Expires only if every input expires, at the latest expiry
        merged.expires_at = inputs
            .iter()
            .map(|m| m.expires_at)
            .collect::<Option<Vec<_>>>()
            .and_then(|all| all.into_iter().max());
        merged
    }

    /// Merge every cluster of near-duplicates once. Returns the number of merges.
    ///
    /// Failed merges are logged and skipped.
    pub async fn auto_merge_duplicates(&self, category: Option<MemoryCategory>) -> Result<usize> {
        let memories = self.store.get_all_memories().await?;
        self.prune_history(&memories).await;

        let candidates: Vec<Memory> = memories
            .into_iter()
            .filter(|m| !m.is_forgotten)
            .filter(|m| category.is_none_or(|c| m.category == c))
            .collect();
        let candidate_ids: HashSet<&str> = candidates.iter().map(|m| m.id.as_str()).collect();

        let mut processed: HashSet<String> = HashSet::new();
        let mut merges = 0;

        for memory in &candidates {
            if processed.contains(&memory.id) {
                continue;
            }

            let mut cluster = vec![memory.id.clone()];
            for hit in self
                .find_similar_memories(memory, AUTO_MERGE_TOP_K, AUTO_MERGE_THRESHOLD)
                .await
            {
                if candidate_ids.contains(hit.memory_id.as_str())
                    && !processed.contains(&hit.memory_id)
                {
                    cluster.push(hit.memory_id);
                }
            }

            if cluster.len() < 2 {
                processed.insert(memory.id.clone());
                continue;
            }

            match self.merge_memories(&cluster, None).await {
                Ok(outcome) => {
                    merges += 1;
                    processed.insert(outcome.merged.id);
                    processed.extend(cluster);
                }
                Err(e) => {
                    warn!(memory_id = %memory.id, error = %e, "Auto-merge skipped cluster");
                    processed.insert(memory.id.clone());
                }
            }
        }

        info!(merges, scanned = candidates.len(), "Duplicate sweep complete");
        Ok(merges)
    }

    async fn record(&self, record: ReconstructionRecord) {
        let mut history = self.history.lock().await;
        let entries = history.entry(record.memory_id.clone()).or_default();
        if entries.len() == MAX_RECONSTRUCTION_HISTORY {
            entries.pop_front();
        }
        entries.push_back(record);
    }

    /// Drop revision history of memories absent from `live`, e.g. ones cleanup deleted
    async fn prune_history(&self, live: &[Memory]) {
        let live: HashSet<&str> = live.iter().map(|m| m.id.as_str()).collect();
        let mut history = self.history.lock().await;
        let before = history.len();
        history.retain(|id, _| live.contains(id.as_str()));

        let pruned = before - history.len();
        if pruned > 0 {
            debug!(pruned, "Dropped revision history of deleted memories");
        }
    }

    /// Revision history of one memory, newest first
    pub async fn get_reconstruction_history(&self, memory_id: &str) -> Vec<ReconstructionRecord> {
        let history = self.history.lock().await;
        history
            .get(memory_id)
            .map(|entries| entries.iter().rev().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn get_statistics(&self) -> ReconstructionStatistics {
        let history = self.history.lock().await;
        let total_records: usize = history.values().map(VecDeque::len).sum();
        let memories_touched = history.values().filter(|e| !e.is_empty()).count();

        let mut by_type = BTreeMap::new();
        for record in history.values().flatten() {
            *by_type
                .entry(record.reconstruction_type.as_str().to_string())
                .or_default() += 1;
        }

        ReconstructionStatistics {
            total_records,
            memories_touched,
            avg_records_per_memory: if memories_touched == 0 {
                0.0
            } else {
                total_records as f64 / memories_touched as f64
            },
            by_type,
        }
    }
}
