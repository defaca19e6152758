//! Collaborator interfaces consumed by the lifecycle components.
//!
//! The engine never owns a storage engine or vector index. It talks to them
//! through [`MemoryStore`] and [`VectorSearch`], both asynchronous, both
//! returning explicit `Result`s. The two are independent: a memory update and
//! the matching index update are separate calls and may briefly disagree.
//!
//! Reference implementations:
//!
//! - [`InMemoryMemoryStore`]: map-backed store for tests and embedding
//! - [`LexicalVectorSearch`]: token cosine similarity over a store's contents
//! - [`SqliteMemoryStore`] (feature `sqlite`): single-table SQLite store

mod in_memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use in_memory::{InMemoryMemoryStore, LexicalVectorSearch};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteMemoryStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Memory, MemoryCategory};

/// Durable memory storage.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// All stored memories.
    async fn get_all_memories(&self) -> Result<Vec<Memory>>;

    /// Retrieve a memory by ID.
    async fn get_memory_by_id(&self, id: &str) -> Result<Option<Memory>>;

    /// Insert a memory, returning its ID.
    async fn save_memory(&self, memory: Memory) -> Result<String>;

    /// Replace an existing memory. Fails with `NotFound` if absent.
    async fn update_memory(&self, memory: Memory) -> Result<()>;

    /// Delete a memory. Returns whether anything was removed.
    async fn delete_memory(&self, id: &str) -> Result<bool>;

    /// Substring search over content, optionally within one category.
    async fn search_memories(
        &self,
        query: &str,
        category: Option<MemoryCategory>,
    ) -> Result<Vec<Memory>>;
}

/// A nearest-neighbour hit from the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarMemory {
    pub memory_id: String,
    /// Similarity score (0-1, higher is closer)
    pub similarity: f64,
}

/// Similarity search over memory content.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Up to `top_k` candidates ranked by descending similarity.
    async fn search_similar(
        &self,
        query_text: &str,
        top_k: usize,
        category: Option<MemoryCategory>,
    ) -> Result<Vec<SimilarMemory>>;
}
