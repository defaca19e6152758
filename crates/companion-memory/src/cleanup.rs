//! Cleanup Scheduler - periodic eviction of weak memories
//!
//! A background task sweeps the memory store on a fixed cadence:
//!
//! 1. Fetch every memory
//! 2. Drop protected ones (protected category, younger than the retention
//!    window, importance above 0.8)
//! 3. Score the rest with the [`StrengthCalculator`]
//! 4. Select those below the strength threshold (or expired), weakest and
//!    oldest first, capped at the batch size
//! 5. Archive (soft delete) or hard-delete each selected memory
//! 6. Record run statistics, also when the sweep fails part way
//!
//! Sweeps never overlap. A periodic tick that finds a sweep in flight is
//! skipped; `run_now` waits for it. Stopping the scheduler lets the current
//! item finish but starts no new one.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, interval_at};
use tracing::{debug, error, info, warn};

use crate::config::CleanupConfig;
use crate::error::{Error, Result};
use crate::store::MemoryStore;
use crate::strength::StrengthCalculator;
use crate::types::Memory;
use crate::utils::days_to_duration;

/// Memories above this importance are never evicted
const PROTECTED_IMPORTANCE: f64 = 0.8;

/// Run statistics kept in history
const MAX_RUN_HISTORY: usize = 20;

const DISTRIBUTION_BUCKETS: usize = 5;

/// Tick period bounds accepted by the timer
const MIN_TICK: Duration = Duration::from_millis(1);
const MAX_TICK: Duration = Duration::from_secs(365 * 86_400);

/// Scheduler lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Stopped,
    Running,
}

/// Statistics of one sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanupStats {
    /// Memories fetched from the store
    pub scanned: usize,
    /// Memories left after the protection filter
    pub candidates: usize,
    /// Memories hard-deleted
    pub deleted: usize,
    /// Memories moved to the archive
    pub archived: usize,
    /// Selected memories that could not be evicted
    pub failed: usize,
    /// Mean strength over candidates
    pub average_strength: f64,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
    /// Stop was requested before the batch finished
    pub cancelled: bool,
    pub errors: Vec<String>,
}

impl CleanupStats {
    fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            scanned: 0,
            candidates: 0,
            deleted: 0,
            archived: 0,
            failed: 0,
            average_strength: 0.0,
            duration_ms: 0,
            timestamp,
            cancelled: false,
            errors: Vec::new(),
        }
    }

    /// Memories removed from the primary store
    pub fn removed(&self) -> usize {
        self.deleted + self.archived
    }
}

/// Histogram of strengths in five equal buckets over [0, 1]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrengthDistribution {
    pub buckets: [usize; DISTRIBUTION_BUCKETS],
}

impl StrengthDistribution {
    /// Bucket for a strength; 1.0 falls in the last one
    fn bucket_of(strength: f64) -> usize {
        ((strength * DISTRIBUTION_BUCKETS as f64) as usize).min(DISTRIBUTION_BUCKETS - 1)
    }

    pub fn label(index: usize) -> String {
        let width = 1.0 / DISTRIBUTION_BUCKETS as f64;
        format!("{:.1}-{:.1}", index as f64 * width, (index + 1) as f64 * width)
    }

    pub fn total(&self) -> usize {
        self.buckets.iter().sum()
    }
}

enum Eviction {
    Archived,
    Deleted,
}

/// Handle for the running periodic task
struct TaskHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

/// Periodic sweep evicting weak memories from the store
pub struct CleanupScheduler {
    store: Arc<dyn MemoryStore>,
    calculator: StrengthCalculator,
    config: RwLock<Arc<CleanupConfig>>,
    /// Soft-deleted memories, oldest first
    archive: Mutex<VecDeque<Memory>>,
    /// Serializes sweeps
    run_lock: Mutex<()>,
    history: Mutex<VecDeque<CleanupStats>>,
    task: Mutex<Option<TaskHandle>>,
    /// Lock for start/stop operations
    operation_lock: Mutex<()>,
}

impl CleanupScheduler {
    pub fn new(
        store: Arc<dyn MemoryStore>,
        calculator: StrengthCalculator,
        config: CleanupConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            calculator,
            config: RwLock::new(Arc::new(config)),
            archive: Mutex::new(VecDeque::new()),
            run_lock: Mutex::new(()),
            history: Mutex::new(VecDeque::new()),
            task: Mutex::new(None),
            operation_lock: Mutex::new(()),
        })
    }

    pub async fn config(&self) -> Arc<CleanupConfig> {
        self.config.read().await.clone()
    }

    pub async fn state(&self) -> SchedulerState {
        match self.task.lock().await.as_ref() {
            Some(handle) if !handle.join.is_finished() => SchedulerState::Running,
            _ => SchedulerState::Stopped,
        }
    }

    /// Start periodic sweeps. Returns false when cleanup is disabled.
    ///
    /// The first sweep runs one interval after start. Starting a running
    /// scheduler is a no-op.
    pub async fn start(self: &Arc<Self>) -> bool {
        let _lock = self.operation_lock.lock().await;
        self.start_inner().await
    }

    async fn start_inner(self: &Arc<Self>) -> bool {
        let config = self.config().await;
        if !config.enabled {
            warn!("Cleanup disabled, scheduler not started");
            return false;
        }

        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|h| !h.join.is_finished()) {
            return true;
        }

        let period = Duration::try_from_secs_f64(config.interval_hours * 3600.0)
            .unwrap_or(MAX_TICK)
            .clamp(MIN_TICK, MAX_TICK);
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let scheduler = Arc::clone(self);

        let join = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);

            loop {
                // Shutdown wins over a tick that is already due
                let stop = tokio::select! {
                    biased;
                    changed = shutdown_rx.changed() => changed.is_err() || *shutdown_rx.borrow(),
                    _ = ticker.tick() => false,
                };
                if stop {
                    break;
                }

                let Ok(_guard) = scheduler.run_lock.try_lock() else {
                    debug!("Cleanup already in progress, skipping tick");
                    continue;
                };
                scheduler.run_locked(Some(&shutdown_rx)).await;
            }
        });

        *task = Some(TaskHandle { shutdown, join });
        info!(interval_hours = config.interval_hours, "Cleanup scheduler started");
        true
    }

    /// Stop periodic sweeps and wait for the background task to exit.
    pub async fn stop(&self) {
        let _lock = self.operation_lock.lock().await;
        self.stop_inner().await;
    }

    async fn stop_inner(&self) {
        let Some(handle) = self.task.lock().await.take() else {
            return;
        };

        let _ = handle.shutdown.send(true);
        if let Err(e) = handle.join.await {
            error!(error = %e, "Cleanup task ended abnormally");
        }
        info!("Cleanup scheduler stopped");
    }

    /// Run one sweep now, waiting for any sweep already in flight.
    pub async fn run_now(&self) -> CleanupStats {
        let _guard = self.run_lock.lock().await;
        self.run_locked(None).await
    }

    /// Sweep body. Callers hold `run_lock`.
    async fn run_locked(&self, cancel: Option<&watch::Receiver<bool>>) -> CleanupStats {
        let started = Instant::now();
        let now = Utc::now();
        let config = self.config().await;
        let mut stats = CleanupStats::new(now);

        match self.store.get_all_memories().await {
            Ok(memories) => self.sweep(&config, memories, now, cancel, &mut stats).await,
            Err(e) => {
                error!(error = %e, "Cleanup could not list memories");
                stats.errors.push(e.to_string());
            }
        }

        stats.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            scanned = stats.scanned,
            candidates = stats.candidates,
            deleted = stats.deleted,
            archived = stats.archived,
            failed = stats.failed,
            average_strength = stats.average_strength,
            duration_ms = stats.duration_ms,
            "Cleanup run complete"
        );

        let mut history = self.history.lock().await;
        if history.len() == MAX_RUN_HISTORY {
            history.pop_front();
        }
        history.push_back(stats.clone());
        stats
    }

    async fn sweep(
        &self,
        config: &CleanupConfig,
        memories: Vec<Memory>,
        now: DateTime<Utc>,
        cancel: Option<&watch::Receiver<bool>>,
        stats: &mut CleanupStats,
    ) {
        stats.scanned = memories.len();

        let candidates: Vec<Memory> = memories
            .into_iter()
            .filter(|m| !Self::is_protected(config, m, now))
            .collect();
        stats.candidates = candidates.len();

        let strengths = self.calculator.calculate_batch(&candidates, now);
        if !candidates.is_empty() {
            stats.average_strength = strengths.values().sum::<f64>() / candidates.len() as f64;
        }

        // Expired memories count as strength 0
        let mut selected: Vec<(f64, Memory)> = candidates
            .into_iter()
            .filter_map(|m| {
                let strength = if m.is_expired(now) {
                    0.0
                } else {
                    strengths.get(&m.id).copied().unwrap_or(0.0)
                };
                (strength < config.min_strength_threshold || m.is_expired(now)).then_some((strength, m))
            })
            .collect();
        selected.sort_by(|(sa, a), (sb, b)| {
            sa.total_cmp(sb)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        selected.truncate(config.batch_size);

        for (strength, memory) in selected {
            if cancel.is_some_and(|rx| *rx.borrow()) {
                info!("Stop requested, ending cleanup batch early");
                stats.cancelled = true;
                break;
            }

            let memory_id = memory.id.clone();
            match self.evict(config, memory).await {
                Ok(Eviction::Archived) => stats.archived += 1,
                Ok(Eviction::Deleted) => stats.deleted += 1,
                Err(e) => {
                    warn!(memory_id = %memory_id, error = %e, "Cleanup skipped memory");
                    stats.failed += 1;
                    stats.errors.push(e.to_string());
                    continue;
                }
            }
            debug!(memory_id = %memory_id, strength, "Evicted memory");
        }
    }

    fn is_protected(config: &CleanupConfig, memory: &Memory, now: DateTime<Utc>) -> bool {
        config.is_protected(memory.category)
            || memory.age_days(now) < config.min_retention_days
            || memory.importance > PROTECTED_IMPORTANCE
    }

    /// Remove one memory from the store, archiving it when soft delete is on.
    ///
    /// The store delete happens first so a failure never leaves the memory
    /// in both places.
    async fn evict(&self, config: &CleanupConfig, mut memory: Memory) -> Result<Eviction> {
        match self.store.delete_memory(&memory.id).await {
            Ok(true) => {}
            Ok(false) => return Err(Error::skipped(&memory.id, "no longer in store")),
            Err(e) => return Err(Error::skipped(&memory.id, e.to_string())),
        }

        if !config.enable_soft_delete {
            return Ok(Eviction::Deleted);
        }

        memory.is_forgotten = true;
        let mut archive = self.archive.lock().await;
        archive.push_back(memory);
        while archive.len() > config.max_archive_size {
            if let Some(dropped) = archive.pop_front() {
                debug!(memory_id = %dropped.id, "Archive full, dropped oldest entry");
            }
        }
        Ok(Eviction::Archived)
    }

    /// Move an archived memory back into the store.
    pub async fn restore_from_archive(&self, memory_id: &str) -> Result<Memory> {
        let mut archive = self.archive.lock().await;
        let position = archive
            .iter()
            .position(|m| m.id == memory_id)
            .ok_or_else(|| Error::not_found("Archived memory", memory_id))?;

        let Some(archived) = archive.remove(position) else {
            return Err(Error::not_found("Archived memory", memory_id));
        };
        let mut restored = archived.clone();
        restored.is_forgotten = false;
        restored.strength = None;
        restored.last_accessed_at = Utc::now();

        if let Err(e) = self.store.save_memory(restored.clone()).await {
            archive.insert(position, archived);
            return Err(e);
        }

        info!(memory_id = %memory_id, "Restored memory from archive");
        Ok(restored)
    }

    /// Strength histogram over every stored memory
    pub async fn get_strength_distribution(&self) -> Result<StrengthDistribution> {
        let memories = self.store.get_all_memories().await?;
        let now = Utc::now();

        let mut distribution = StrengthDistribution::default();
        for memory in &memories {
            let strength = self.calculator.calculate_strength(memory, now);
            distribution.buckets[StrengthDistribution::bucket_of(strength)] += 1;
        }
        Ok(distribution)
    }

    /// Unprotected memories whose strength would be below the threshold in `days`
    pub async fn predict_cleanup_count(&self, days: f64) -> Result<usize> {
        if !(days.is_finite() && days >= 0.0) {
            return Err(Error::invalid_argument("days must be a non-negative number"));
        }

        let config = self.config().await;
        let now = Utc::now();
        // Forecasts past the representable range behave as "forever"
        let future = now
            .checked_add_signed(days_to_duration(days))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let memories = self.store.get_all_memories().await?;
        Ok(memories
            .iter()
            .filter(|m| !Self::is_protected(&config, m, now))
            .filter(|m| {
                m.is_expired(future)
                    || self.calculator.predict_strength(m, future) < config.min_strength_threshold
            })
            .count())
    }

    /// Validate and swap the config, optionally restarting a running scheduler.
    ///
    /// An invalid config is rejected with no state change.
    pub async fn update_config(self: &Arc<Self>, config: CleanupConfig, restart: bool) -> Result<()> {
        config.validate()?;
        let _lock = self.operation_lock.lock().await;

        let max_archive = config.max_archive_size;
        *self.config.write().await = Arc::new(config);
        {
            let mut archive = self.archive.lock().await;
            while archive.len() > max_archive {
                archive.pop_front();
            }
        }

        if restart && self.state().await == SchedulerState::Running {
            self.stop_inner().await;
            self.start_inner().await;
        }
        info!(restart, "Cleanup config updated");
        Ok(())
    }

    pub async fn last_stats(&self) -> Option<CleanupStats> {
        self.history.lock().await.back().cloned()
    }

    /// Recent run statistics, oldest first
    pub async fn run_history(&self) -> Vec<CleanupStats> {
        self.history.lock().await.iter().cloned().collect()
    }

    /// Archived memories, oldest first
    pub async fn archived(&self) -> Vec<Memory> {
        self.archive.lock().await.iter().cloned().collect()
    }
}
