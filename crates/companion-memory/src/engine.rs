//! Lifecycle Engine Entry Point
//!
//! Ties the lifecycle components together over one shared store.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::cleanup::{CleanupScheduler, SchedulerState};
use crate::config::LifecycleConfig;
use crate::emotion::{EmotionDetector, EmotionValenceUpdater, KeywordEmotionDetector};
use crate::error::{Error, Result};
use crate::reconstruction::MemoryReconstructionService;
use crate::store::{InMemoryMemoryStore, LexicalVectorSearch, MemoryStore, VectorSearch};
use crate::strength::StrengthCalculator;
use crate::types::Memory;
use crate::working::WorkingMemoryManager;

/// Memory lifecycle engine - main entry point
///
/// Owns:
/// - Working memory buffer promoting turns into the store
/// - Emotion updater (detection, decay, amplification)
/// - Reconstruction service (revision, dedup, merge)
/// - Cleanup scheduler (periodic eviction)
///
/// # Example
///
/// ```rust,no_run
/// use companion_memory::{ConversationTurn, LifecycleConfig, MemoryLifecycle};
///
/// async fn example() -> anyhow::Result<()> {
///     let mut engine = MemoryLifecycle::in_memory(LifecycleConfig::default())?;
///     engine.initialize().await?;
///
///     let turn = ConversationTurn::new("My birthday is May 3", "I'll remember!").with_importance(0.9);
///     engine.working().add_turn(turn).await?;
///
///     let stats = engine.cleanup().run_now().await;
///     println!("archived {}", stats.archived);
///
///     engine.shutdown().await?;
///     Ok(())
/// }
/// ```
pub struct MemoryLifecycle {
    config: LifecycleConfig,
    store: Arc<dyn MemoryStore>,
    strength: StrengthCalculator,
    working: WorkingMemoryManager,
    emotion: EmotionValenceUpdater,
    reconstruction: MemoryReconstructionService,
    cleanup: Arc<CleanupScheduler>,
    initialized: bool,
}

impl MemoryLifecycle {
    /// Build every component over the given collaborators
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if any config section fails validation.
    pub fn new(
        config: LifecycleConfig,
        store: Arc<dyn MemoryStore>,
        vector: Arc<dyn VectorSearch>,
        detector: Arc<dyn EmotionDetector>,
    ) -> Result<Self> {
        config.validate()?;
        let strength = StrengthCalculator::default();

        let working = WorkingMemoryManager::new(store.clone(), config.working_memory.clone())?;
        let emotion =
            EmotionValenceUpdater::new(store.clone(), detector, config.emotion_decay.clone())?;
        let reconstruction = MemoryReconstructionService::new(store.clone(), vector);
        let cleanup = Arc::new(CleanupScheduler::new(
            store.clone(),
            strength.clone(),
            config.cleanup.clone(),
        )?);

        Ok(Self {
            config,
            store,
            strength,
            working,
            emotion,
            reconstruction,
            cleanup,
            initialized: false,
        })
    }

    /// Engine over a fresh in-memory store with lexical search and keyword emotion detection
    pub fn in_memory(config: LifecycleConfig) -> Result<Self> {
        Self::with_store(config, Arc::new(InMemoryMemoryStore::new()))
    }

    /// Engine over `store` with the default search and detector
    pub fn with_store(config: LifecycleConfig, store: Arc<dyn MemoryStore>) -> Result<Self> {
        let vector = Arc::new(LexicalVectorSearch::new(store.clone()));
        Self::new(config, store, vector, Arc::new(KeywordEmotionDetector::new()))
    }

    /// Engine over a SQLite database file
    #[cfg(feature = "sqlite")]
    pub fn open_sqlite(config: LifecycleConfig, path: impl AsRef<std::path::Path>) -> Result<Self> {
        let store = Arc::new(crate::store::SqliteMemoryStore::open(path)?);
        Self::with_store(config, store)
    }

    /// Start background work: the cleanup scheduler, when enabled
    pub async fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        if self.config.cleanup.enabled {
            self.cleanup.start().await;
        }

        self.initialized = true;
        info!("Memory lifecycle initialized");
        Ok(())
    }

    /// Stop background work
    pub async fn shutdown(&mut self) -> Result<()> {
        self.cleanup.stop().await;
        self.initialized = false;
        info!("Memory lifecycle shut down");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub async fn scheduler_state(&self) -> SchedulerState {
        self.cleanup.state().await
    }

    /// Record a retrieval: bump the access count and refresh the cached strength
    pub async fn record_access(&self, memory_id: &str) -> Result<Memory> {
        let mut memory = self
            .store
            .get_memory_by_id(memory_id)
            .await?
            .ok_or_else(|| Error::not_found("Memory", memory_id))?;

        let now = Utc::now();
        memory.touch(now);
        self.strength.refresh_cached(&mut memory, now);
        self.store.update_memory(memory.clone()).await?;
        Ok(memory)
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn MemoryStore> {
        &self.store
    }

    pub fn strength(&self) -> &StrengthCalculator {
        &self.strength
    }

    pub fn working(&self) -> &WorkingMemoryManager {
        &self.working
    }

    pub fn emotion(&self) -> &EmotionValenceUpdater {
        &self.emotion
    }

    pub fn reconstruction(&self) -> &MemoryReconstructionService {
        &self.reconstruction
    }

    pub fn cleanup(&self) -> &Arc<CleanupScheduler> {
        &self.cleanup
    }
}
