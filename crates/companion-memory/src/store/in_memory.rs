//! In-memory reference collaborators.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{MemoryStore, SimilarMemory, VectorSearch};
use crate::error::{Error, Result};
use crate::types::{Memory, MemoryCategory};

/// Map-backed memory store.
///
/// Listing order is deterministic: oldest `created_at` first, ties by id.
#[derive(Default)]
pub struct InMemoryMemoryStore {
    memories: RwLock<HashMap<String, Memory>>,
}

impl InMemoryMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `memories`.
    pub fn with_memories(memories: impl IntoIterator<Item = Memory>) -> Self {
        Self {
            memories: RwLock::new(memories.into_iter().map(|m| (m.id.clone(), m)).collect()),
        }
    }

    pub async fn len(&self) -> usize {
        self.memories.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.memories.read().await.is_empty()
    }

    fn sorted(mut memories: Vec<Memory>) -> Vec<Memory> {
        memories.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        memories
    }
}

#[async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn get_all_memories(&self) -> Result<Vec<Memory>> {
        let memories = self.memories.read().await;
        Ok(Self::sorted(memories.values().cloned().collect()))
    }

    async fn get_memory_by_id(&self, id: &str) -> Result<Option<Memory>> {
        Ok(self.memories.read().await.get(id).cloned())
    }

    async fn save_memory(&self, memory: Memory) -> Result<String> {
        let id = memory.id.clone();
        self.memories.write().await.insert(id.clone(), memory);
        Ok(id)
    }

    async fn update_memory(&self, memory: Memory) -> Result<()> {
        let mut memories = self.memories.write().await;
        match memories.get_mut(&memory.id) {
            Some(existing) => {
                *existing = memory;
                Ok(())
            }
            None => Err(Error::not_found("Memory", memory.id)),
        }
    }

    async fn delete_memory(&self, id: &str) -> Result<bool> {
        Ok(self.memories.write().await.remove(id).is_some())
    }

    async fn search_memories(
        &self,
        query: &str,
        category: Option<MemoryCategory>,
    ) -> Result<Vec<Memory>> {
        let needle = query.to_lowercase();
        let memories = self.memories.read().await;
        let hits = memories
            .values()
            .filter(|m| category.is_none_or(|c| m.category == c))
            .filter(|m| m.content.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        Ok(Self::sorted(hits))
    }
}

/// Token-frequency cosine similarity over the contents of a store.
///
/// ASCII alphanumeric runs form one token each; every other alphabetic
/// character (CJK in practice) is its own token. Forgotten memories are
/// never returned.
pub struct LexicalVectorSearch {
    store: Arc<dyn MemoryStore>,
}

impl LexicalVectorSearch {
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self { store }
    }

    fn tokenize(text: &str) -> HashMap<String, f64> {
        let mut counts: HashMap<String, f64> = HashMap::new();
        let mut word = String::new();

        for c in text.to_lowercase().chars() {
            if c.is_ascii_alphanumeric() {
                word.push(c);
                continue;
            }
            if !word.is_empty() {
                *counts.entry(std::mem::take(&mut word)).or_default() += 1.0;
            }
            if c.is_alphabetic() {
                *counts.entry(c.to_string()).or_default() += 1.0;
            }
        }
        if !word.is_empty() {
            *counts.entry(word).or_default() += 1.0;
        }

        counts
    }

    /// Cosine similarity between two texts, 0 when either has no tokens.
    pub fn similarity(a: &str, b: &str) -> f64 {
        let a = Self::tokenize(a);
        let b = Self::tokenize(b);
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }

        let dot: f64 = a
            .iter()
            .filter_map(|(token, weight)| b.get(token).map(|other| weight * other))
            .sum();
        let norm_a = a.values().map(|w| w * w).sum::<f64>().sqrt();
        let norm_b = b.values().map(|w| w * w).sum::<f64>().sqrt();

        (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
    }
}

#[async_trait]
impl VectorSearch for LexicalVectorSearch {
    async fn search_similar(
        &self,
        query_text: &str,
        top_k: usize,
        category: Option<MemoryCategory>,
    ) -> Result<Vec<SimilarMemory>> {
        let memories = self.store.get_all_memories().await?;

        let mut hits: Vec<SimilarMemory> = memories
            .iter()
            .filter(|m| !m.is_forgotten)
            .filter(|m| category.is_none_or(|c| m.category == c))
            .map(|m| SimilarMemory {
                memory_id: m.id.clone(),
                similarity: Self::similarity(query_text, &m.content),
            })
            .filter(|hit| hit.similarity > 0.0)
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.memory_id.cmp(&b.memory_id))
        });
        hits.truncate(top_k);

        Ok(hits)
    }
}
