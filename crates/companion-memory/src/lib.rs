//! Companion Memory - Memory Lifecycle Engine for AI Companions
//!
//! Manages what a companion remembers, how strongly, and for how long:
//!
//! - **strength** - Forgetting curve (initial strength × exponential decay)
//! - **cleanup** - Periodic eviction of weak memories, with soft-delete archive
//! - **working** - Bounded conversation buffer that promotes turns to long-term memory
//! - **emotion** - Valence/arousal detection, decay toward neutral, amplification
//! - **reconstruction** - Content revision, duplicate detection and merging
//! - **store** - Storage and similarity-search interfaces plus reference backends
//! - **engine** - [`MemoryLifecycle`], wiring every component over one store
//!
//! # Example
//!
//! ```rust,no_run
//! use companion_memory::{LifecycleConfig, MemoryLifecycle, ReconstructionType};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let config = LifecycleConfig::load("companion.toml")?;
//!     let mut engine = MemoryLifecycle::open_sqlite(config, "memories.db")?;
//!     engine.initialize().await?;
//!
//!     // Correct something the companion got wrong
//!     engine
//!         .reconstruction()
//!         .reconstruct_memory("mem-1", "Her cat is called Miso", ReconstructionType::Correction, None, None)
//!         .await?;
//!
//!     // Emotions fade toward neutral between conversations
//!     let report = engine.emotion().apply_decay(None).await?;
//!     println!("decayed {} memories", report.updated);
//!
//!     engine.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod cleanup;
pub mod config;
pub mod emotion;
pub mod engine;
pub mod error;
pub mod reconstruction;
pub mod store;
pub mod strength;
pub mod types;
pub mod utils;
pub mod working;

#[cfg(test)]
pub(crate) mod testing;

// ─────────────────────────────────────────────────────────────────────────────
// Engine and configuration
// ─────────────────────────────────────────────────────────────────────────────

pub use config::{CleanupConfig, EmotionDecayConfig, LifecycleConfig, WorkingMemoryConfig};
pub use engine::MemoryLifecycle;
pub use error::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Data types
// ─────────────────────────────────────────────────────────────────────────────

pub use types::{ConversationTurn, Memory, MemoryCategory, ReconstructionRecord, ReconstructionType};

// ─────────────────────────────────────────────────────────────────────────────
// Lifecycle components
// ─────────────────────────────────────────────────────────────────────────────

pub use cleanup::{CleanupScheduler, CleanupStats, SchedulerState, StrengthDistribution};
pub use emotion::{
    EmotionChangeRecord, EmotionDetector, EmotionQuadrant, EmotionState, EmotionValenceUpdater,
    KeywordEmotionDetector,
};
pub use reconstruction::{ConflictResolution, MemoryReconstructionService, MergeOutcome};
pub use strength::{StrengthCalculator, StrengthParams};
pub use working::{AddTurnOutcome, WorkingMemoryManager, WorkingMemoryStatistics};

// ─────────────────────────────────────────────────────────────────────────────
// Storage
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "sqlite")]
pub use store::SqliteMemoryStore;
pub use store::{InMemoryMemoryStore, LexicalVectorSearch, MemoryStore, SimilarMemory, VectorSearch};
