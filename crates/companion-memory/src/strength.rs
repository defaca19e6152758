//! Memory strength calculation.
//!
//! Strength estimates how retrievable a memory is right now. It follows an
//! Ebbinghaus-style forgetting curve:
//!
//! ```text
//! strength(t) = base × e^(−t / S)
//!
//! t    = days since last access
//! base = 0.35 + 0.35·importance + 0.1·(1 − e^(−r/5)) + 0.1·emotion + 0.1·(1 − e^(−a/10))
//! S    = 2d × (1 + 24·importance³) × (1 + 0.5·ln(1 + r)) × (1 + emotion) × (1 + 0.2·ln(1 + a))
//!
//! r = reinforcement count, a = access count, emotion = emotional weight in [0, 1]
//! ```
//!
//! Importance enters both terms, so important memories start stronger and
//! also fall off more slowly. `S` is clamped to [0.5, 180] days which keeps
//! every half-life (`S·ln 2`) positive and below a year.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::types::Memory;
use crate::utils::{clamp_unit, days_to_duration};

/// Tunable weights for the forgetting curve.
#[derive(Debug, Clone, PartialEq)]
pub struct StrengthParams {
    /// Stability of a memory with no boosts, in days.
    pub base_stability_days: f64,
    /// Cubic importance multiplier on stability.
    pub importance_stability: f64,
    /// Log reinforcement multiplier on stability.
    pub reinforcement_stability: f64,
    /// Linear emotion multiplier on stability.
    pub emotion_stability: f64,
    /// Log access multiplier on stability.
    pub access_stability: f64,
    pub min_stability_days: f64,
    pub max_stability_days: f64,
}

impl Default for StrengthParams {
    fn default() -> Self {
        Self {
            base_stability_days: 2.0,
            importance_stability: 24.0,
            reinforcement_stability: 0.5,
            emotion_stability: 1.0,
            access_stability: 0.2,
            min_stability_days: 0.5,
            max_stability_days: 180.0,
        }
    }
}

/// Pure strength calculator.
#[derive(Debug, Clone, Default)]
pub struct StrengthCalculator {
    params: StrengthParams,
}

impl StrengthCalculator {
    pub fn new(params: StrengthParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &StrengthParams {
        &self.params
    }

    /// Strength of `memory` at `now`, in [0, 1].
    pub fn calculate_strength(&self, memory: &Memory, now: DateTime<Utc>) -> f64 {
        let elapsed = memory.days_since_access(now);
        let strength = self.initial_strength(memory) * (-elapsed / self.stability_days(memory)).exp();
        clamp_unit(strength)
    }

    /// Strength at a hypothetical future instant.
    pub fn predict_strength(&self, memory: &Memory, future: DateTime<Utc>) -> f64 {
        self.calculate_strength(memory, future)
    }

    /// Time for the current strength to halve.
    ///
    /// The curve is a plain exponential in elapsed time, so the half-life
    /// does not depend on how long ago the memory was last accessed.
    pub fn calculate_half_life(&self, memory: &Memory) -> Duration {
        days_to_duration(self.stability_days(memory) * std::f64::consts::LN_2)
    }

    /// Strength of every memory keyed by id.
    pub fn calculate_batch(&self, memories: &[Memory], now: DateTime<Utc>) -> HashMap<String, f64> {
        memories
            .iter()
            .map(|m| (m.id.clone(), self.calculate_strength(m, now)))
            .collect()
    }

    /// Recompute and store the cached strength on the memory.
    pub fn refresh_cached(&self, memory: &mut Memory, now: DateTime<Utc>) -> f64 {
        let strength = self.calculate_strength(memory, now);
        memory.strength = Some(strength);
        strength
    }

    /// Strength right after an access, before any decay.
    fn initial_strength(&self, memory: &Memory) -> f64 {
        let importance = clamp_unit(memory.importance);
        let reinforcement = 1.0 - (-(memory.reinforcement_count as f64) / 5.0).exp();
        let access = 1.0 - (-(memory.access_count as f64) / 10.0).exp();

        clamp_unit(
            0.35 + 0.35 * importance
                + 0.1 * reinforcement
                + 0.1 * memory.emotional_weight()
                + 0.1 * access,
        )
    }

    /// Decay time constant in days.
    fn stability_days(&self, memory: &Memory) -> f64 {
        let p = &self.params;
        let importance = clamp_unit(memory.importance);

        let stability = p.base_stability_days
            * (1.0 + p.importance_stability * importance.powi(3))
            * (1.0 + p.reinforcement_stability * (memory.reinforcement_count as f64).ln_1p())
            * (1.0 + p.emotion_stability * memory.emotional_weight())
            * (1.0 + p.access_stability * (memory.access_count as f64).ln_1p());

        stability.clamp(p.min_stability_days, p.max_stability_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::memory_at;
    use crate::types::MemoryCategory;

    fn calc() -> StrengthCalculator {
        StrengthCalculator::default()
    }

    fn base(now: DateTime<Utc>, idle_days: i64) -> Memory {
        let mut memory = memory_at("m", now, idle_days + 1).with_importance(0.5);
        memory.last_accessed_at = now - Duration::days(idle_days);
        memory
    }

    #[test]
    fn test_important_reinforced_memory_stays_strong() {
        let now = Utc::now();
        let mut memory = memory_at("m", now, 30).with_importance(0.9);
        memory.reinforcement_count = 10;
        memory.last_accessed_at = now;

        assert!(calc().calculate_strength(&memory, now) > 0.5);
    }

    #[test]
    fn test_neglected_average_memory_fades() {
        let now = Utc::now();
        let mut memory = base(now, 30);
        memory.access_count = 1;

        assert!(calc().calculate_strength(&memory, now) < 0.3);
    }

    #[test]
    fn test_strength_always_in_unit_range() {
        let now = Utc::now();
        for importance in [0.0, 0.3, 0.8, 1.0] {
            for idle in [0, 1, 30, 3650] {
                let mut memory = base(now, idle).with_importance(importance).with_emotion(-1.0, 1.0);
                memory.access_count = 1_000;
                memory.reinforcement_count = 1_000;
                let s = calc().calculate_strength(&memory, now);
                assert!((0.0..=1.0).contains(&s), "strength {} out of range", s);
            }
        }
    }

    #[test]
    fn test_importance_raises_strength_and_slows_decay() {
        let now = Utc::now();
        let low = base(now, 5).with_importance(0.2);
        let high = base(now, 5).with_importance(0.9);

        assert!(calc().calculate_strength(&high, now) > calc().calculate_strength(&low, now));
        assert!(calc().calculate_half_life(&high) > calc().calculate_half_life(&low));
    }

    #[test]
    fn test_reinforcement_has_diminishing_returns() {
        let now = Utc::now();
        let strength_with = |count: u32| {
            let mut memory = base(now, 3);
            memory.reinforcement_count = count;
            calc().calculate_strength(&memory, now)
        };

        let s0 = strength_with(0);
        let s1 = strength_with(1);
        let s10 = strength_with(10);
        let s11 = strength_with(11);

        assert!(s1 > s0);
        assert!(s11 > s10);
        assert!(s1 - s0 > s11 - s10);
    }

    #[test]
    fn test_emotion_and_access_raise_strength() {
        let now = Utc::now();
        let calm = base(now, 4);
        let intense = base(now, 4).with_emotion(-0.9, 0.9);
        assert!(calc().calculate_strength(&intense, now) > calc().calculate_strength(&calm, now));

        let mut accessed = base(now, 4);
        accessed.access_count = 12;
        assert!(calc().calculate_strength(&accessed, now) > calc().calculate_strength(&calm, now));
    }

    #[test]
    fn test_time_decays_toward_zero() {
        let now = Utc::now();
        let memory = base(now, 0);
        let s_now = calc().calculate_strength(&memory, now);
        let s_week = calc().predict_strength(&memory, now + Duration::days(7));
        let s_decade = calc().predict_strength(&memory, now + Duration::days(3650));

        assert!(s_now > s_week);
        assert!(s_week > s_decade);
        assert!(s_decade < 1e-3);
    }

    #[test]
    fn test_high_importance_survives_a_month() {
        let now = Utc::now();
        let memory = base(now, 30).with_importance(0.85);
        let threshold = crate::config::CleanupConfig::default().min_strength_threshold;

        assert!(calc().calculate_strength(&memory, now) > threshold);
    }

    #[test]
    fn test_half_life_halves_strength() {
        let now = Utc::now();
        let memory = base(now, 2);
        let half_life = calc().calculate_half_life(&memory);
        let current = calc().calculate_strength(&memory, now);
        let later = calc().predict_strength(&memory, now + half_life);

        assert!((later - current / 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_half_life_bounds() {
        let now = Utc::now();
        let mut strongest = base(now, 0).with_importance(1.0).with_emotion(1.0, 1.0);
        strongest.reinforcement_count = u32::MAX;
        strongest.access_count = u32::MAX;
        let weakest = base(now, 0).with_importance(0.0);

        assert!(calc().calculate_half_life(&weakest) > Duration::zero());
        assert!(calc().calculate_half_life(&strongest) < Duration::days(365));
    }

    #[test]
    fn test_batch_matches_single_and_ignores_order() {
        let now = Utc::now();
        let memories = vec![
            memory_at("a", now, 3).with_importance(0.2),
            memory_at("b", now, 10).with_importance(0.9),
            Memory::new("c", MemoryCategory::Fact),
        ];
        let mut reversed = memories.clone();
        reversed.reverse();

        let batch = calc().calculate_batch(&memories, now);
        assert_eq!(batch, calc().calculate_batch(&reversed, now));
        for memory in &memories {
            assert_eq!(batch[&memory.id], calc().calculate_strength(memory, now));
        }
    }

    #[test]
    fn test_refresh_cached() {
        let now = Utc::now();
        let mut memory = base(now, 1);
        assert!(memory.strength.is_none());

        let s = calc().refresh_cached(&mut memory, now);
        assert_eq!(memory.strength, Some(s));
    }
}
