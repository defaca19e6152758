//! Shared test fixtures: memory builders and instrumented collaborators.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Semaphore;

use crate::error::{Error, Result};
use crate::store::{InMemoryMemoryStore, MemoryStore, SimilarMemory, VectorSearch};
use crate::types::{Memory, MemoryCategory};

/// Episodic memory of importance 0.5 created and last accessed `age_days` before `now`
pub fn memory_at(id: &str, now: DateTime<Utc>, age_days: i64) -> Memory {
    let at = now - Duration::days(age_days);
    let mut memory = Memory::new(format!("memory {}", id), MemoryCategory::Episodic);
    memory.id = id.into();
    memory.created_at = at;
    memory.last_accessed_at = at;
    memory.timestamp = at;
    memory
}

pub fn memory_with_content(id: &str, content: &str, category: MemoryCategory) -> Memory {
    let mut memory = Memory::new(content, category);
    memory.id = id.into();
    memory
}

/// In-memory store that counts mutating calls and can be told to fail.
#[derive(Default)]
pub struct InstrumentedStore {
    pub inner: InMemoryMemoryStore,
    pub saves: AtomicUsize,
    pub updates: AtomicUsize,
    pub deletes: AtomicUsize,
    delete_calls: AtomicUsize,
    delete_gate: Option<Arc<Semaphore>>,
    fail_delete: HashSet<String>,
    fail_update: HashSet<String>,
    fail_save: AtomicBool,
    fail_list: AtomicBool,
}

impl InstrumentedStore {
    pub fn with_memories(memories: impl IntoIterator<Item = Memory>) -> Self {
        Self {
            inner: InMemoryMemoryStore::with_memories(memories),
            ..Default::default()
        }
    }

    pub fn failing_delete(mut self, ids: &[&str]) -> Self {
        self.fail_delete = ids.iter().map(|id| id.to_string()).collect();
        self
    }

    /// Every delete waits for a permit from `gate` before touching the store.
    pub fn gated_delete(mut self, gate: Arc<Semaphore>) -> Self {
        self.delete_gate = Some(gate);
        self
    }

    /// Deletes entered, including ones still waiting on the gate.
    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn failing_update(mut self, ids: &[&str]) -> Self {
        self.fail_update = ids.iter().map(|id| id.to_string()).collect();
        self
    }

    pub fn set_fail_save(&self, fail: bool) {
        self.fail_save.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.inner.len().await
    }
}

#[async_trait]
impl MemoryStore for InstrumentedStore {
    async fn get_all_memories(&self) -> Result<Vec<Memory>> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(Error::store_failure("list unavailable"));
        }
        self.inner.get_all_memories().await
    }

    async fn get_memory_by_id(&self, id: &str) -> Result<Option<Memory>> {
        self.inner.get_memory_by_id(id).await
    }

    async fn save_memory(&self, memory: Memory) -> Result<String> {
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(Error::store_failure("save rejected"));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save_memory(memory).await
    }

    async fn update_memory(&self, memory: Memory) -> Result<()> {
        if self.fail_update.contains(&memory.id) {
            return Err(Error::store_failure(format!("update rejected for {}", memory.id)));
        }
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update_memory(memory).await
    }

    async fn delete_memory(&self, id: &str) -> Result<bool> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.delete_gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|_| Error::store_failure("delete gate closed"))?;
        }
        if self.fail_delete.contains(id) {
            return Err(Error::store_failure(format!("delete rejected for {}", id)));
        }
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_memory(id).await
    }

    async fn search_memories(
        &self,
        query: &str,
        category: Option<MemoryCategory>,
    ) -> Result<Vec<Memory>> {
        self.inner.search_memories(query, category).await
    }
}

/// Vector search that scores every other live memory at a fixed similarity.
///
/// A memory whose content equals the query scores 1.0.
pub struct FixedScoreSearch {
    store: Arc<dyn MemoryStore>,
    score: f64,
    fail: bool,
}

impl FixedScoreSearch {
    pub fn new(store: Arc<dyn MemoryStore>, score: f64) -> Self {
        Self {
            store,
            score,
            fail: false,
        }
    }

    pub fn failing(store: Arc<dyn MemoryStore>) -> Self {
        Self {
            store,
            score: 0.0,
            fail: true,
        }
    }
}

#[async_trait]
impl VectorSearch for FixedScoreSearch {
    async fn search_similar(
        &self,
        query_text: &str,
        top_k: usize,
        category: Option<MemoryCategory>,
    ) -> Result<Vec<SimilarMemory>> {
        if self.fail {
            return Err(Error::store_failure("vector index offline"));
        }

        let mut hits: Vec<SimilarMemory> = self
            .store
            .get_all_memories()
            .await?
            .into_iter()
            .filter(|m| !m.is_forgotten)
            .filter(|m| category.is_none_or(|c| m.category == c))
            .map(|m| SimilarMemory {
                similarity: if m.content == query_text { 1.0 } else { self.score },
                memory_id: m.id,
            })
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.memory_id.cmp(&b.memory_id))
        });
        hits.truncate(top_k);
        Ok(hits)
    }
}
