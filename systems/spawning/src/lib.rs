#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Stage-based spawn scheduler emitting mob spawn commands.
//!
//! The scheduler accumulates frame time from [`Event::TimeAdvanced`] and,
//! once the scheduled interval elapses and the population cap allows it,
//! selects a mob from the stage covering the current player level and emits
//! one [`Command::SpawnMob`]. The next interval is then recomputed through
//! the adaptive pipeline: base interval, per-level decay, sine oscillation,
//! one-shot jitter, exponential smoothing against the previous interval, and
//! a hard global clamp. A player level no stage covers is a silent no-op.

use std::f32::consts::TAU;
use std::time::Duration;

use petal_defence_core::{Command, Event, MobCard, SpawnConfig, SpawnStage};
use rand::Rng;

/// How the scheduler picks a mob from a stage's weighted table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// Plain weighted selection over the stage entries.
    #[default]
    Weighted,
    /// Weighted selection with per-entry weights gated and scaled by how far
    /// the player level exceeds twice the entry's rarity level.
    RarityCurve,
}

/// Pure system scheduling mob spawns.
#[derive(Debug)]
pub struct Spawning {
    policy: SelectionPolicy,
    spawn_timer: Duration,
    global_timer: Duration,
    next_interval: f32,
    prev_interval: f32,
}

impl Spawning {
    /// Creates a scheduler; the initial interval is the first stage's base.
    #[must_use]
    pub fn new(config: &SpawnConfig, policy: SelectionPolicy) -> Self {
        let initial = config
            .stages
            .first()
            .map_or(2.5, |stage| stage.base_interval);
        Self {
            policy,
            spawn_timer: Duration::ZERO,
            global_timer: Duration::ZERO,
            next_interval: initial,
            prev_interval: initial,
        }
    }

    /// Interval currently scheduled until the next spawn, in seconds.
    #[must_use]
    pub fn next_interval(&self) -> f32 {
        self.next_interval
    }

    /// Consumes events and emits at most one spawn command per call.
    pub fn handle<R: Rng>(
        &mut self,
        events: &[Event],
        config: &SpawnConfig,
        player_level: u32,
        live_mobs: usize,
        rng: &mut R,
        out: &mut Vec<Command>,
    ) {
        let mut accumulated = Duration::ZERO;
        for event in events {
            if let Event::TimeAdvanced { dt } = event {
                accumulated = accumulated.saturating_add(*dt);
            }
        }
        self.spawn_timer = self.spawn_timer.saturating_add(accumulated);
        self.global_timer = self.global_timer.saturating_add(accumulated);

        if live_mobs >= config.max_mob {
            return;
        }
        if self.spawn_timer.as_secs_f32() < self.next_interval {
            return;
        }
        self.spawn_timer = Duration::ZERO;

        let Some(stage) = config.stage_for_level(player_level) else {
            return;
        };
        let Some(mob) = self.choose_mob(stage, player_level, rng) else {
            return;
        };
        out.push(Command::SpawnMob { mob });
        self.next_interval = self.compute_next_interval(config, stage, player_level, rng);
    }

    fn choose_mob<R: Rng>(
        &self,
        stage: &SpawnStage,
        player_level: u32,
        rng: &mut R,
    ) -> Option<MobCard> {
        let weights: Vec<f32> = stage
            .entries
            .iter()
            .map(|entry| match self.policy {
                SelectionPolicy::Weighted => entry.weight,
                SelectionPolicy::RarityCurve => {
                    entry.weight * rarity_curve(entry.mob.rarity.level(), player_level)
                }
            })
            .collect();
        let total: f32 = weights.iter().filter(|w| **w > 0.0).sum();
        if total <= 0.0 {
            return None;
        }

        let roll = rng.gen_range(0.0..total);
        let mut accum = 0.0;
        for (entry, weight) in stage.entries.iter().zip(&weights) {
            if *weight <= 0.0 {
                continue;
            }
            accum += weight;
            if roll <= accum {
                return Some(entry.mob);
            }
        }
        stage.entries.first().map(|entry| entry.mob)
    }

    fn compute_next_interval<R: Rng>(
        &mut self,
        config: &SpawnConfig,
        stage: &SpawnStage,
        player_level: u32,
        rng: &mut R,
    ) -> f32 {
        let mut raw = stage.base_interval;
        raw -= stage.scale_per_level * player_level.saturating_sub(stage.min_level) as f32;

        if stage.oscillator.enabled && stage.oscillator.period > 0.0 {
            let phase = TAU * self.global_timer.as_secs_f32() / stage.oscillator.period;
            raw += phase.sin() * stage.oscillator.amplitude;
        }

        if stage.jitter.range > 0.0 && rng.gen_range(0.0..1.0f32) <= stage.jitter.prob {
            raw += rng.gen_range(-stage.jitter.range..stage.jitter.range);
        }

        let alpha = config.smoothing_alpha;
        let next = (self.prev_interval * (1.0 - alpha) + raw * alpha)
            .clamp(config.min_interval, config.max_interval);
        self.prev_interval = next;
        next
    }
}

// Entries stay locked until the player level reaches twice the rarity level,
// then grow in weight with every level past the gate.
fn rarity_curve(rarity_level: u8, player_level: u32) -> f32 {
    let gate = u32::from(rarity_level) * 2;
    if player_level < gate {
        0.0
    } else {
        1.0 + 0.1 * (player_level - gate) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use petal_defence_core::GameTables;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn advance(seconds: f32) -> Vec<Event> {
        vec![Event::TimeAdvanced {
            dt: Duration::from_secs_f32(seconds),
        }]
    }

    #[test]
    fn spawns_once_the_interval_elapses() {
        let config = GameTables::starter().spawn;
        let mut spawning = Spawning::new(&config, SelectionPolicy::Weighted);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut out = Vec::new();

        spawning.handle(&advance(1.0), &config, 1, 0, &mut rng, &mut out);
        assert!(out.is_empty());

        spawning.handle(&advance(10.0), &config, 1, 0, &mut rng, &mut out);
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], Command::SpawnMob { .. }));
    }

    #[test]
    fn population_cap_suppresses_spawns() {
        let config = GameTables::starter().spawn;
        let mut spawning = Spawning::new(&config, SelectionPolicy::Weighted);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut out = Vec::new();

        spawning.handle(&advance(60.0), &config, 1, config.max_mob, &mut rng, &mut out);
        assert!(out.is_empty());

        // The timer kept accumulating, so the next call spawns immediately.
        spawning.handle(&advance(0.0), &config, 1, 0, &mut rng, &mut out);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn uncovered_level_is_a_silent_no_op() {
        let config = GameTables::starter().spawn;
        let mut spawning = Spawning::new(&config, SelectionPolicy::Weighted);
        let before = spawning.next_interval();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut out = Vec::new();

        spawning.handle(&advance(60.0), &config, 100, 0, &mut rng, &mut out);
        assert!(out.is_empty());
        assert_eq!(spawning.next_interval(), before);
    }

    #[test]
    fn computed_interval_stays_within_the_global_clamp() {
        let mut config = GameTables::starter().spawn;
        let stage = &mut config.stages[0];
        stage.oscillator.amplitude = 500.0;
        stage.jitter.range = 500.0;
        stage.jitter.prob = 1.0;
        stage.scale_per_level = 100.0;
        config.smoothing_alpha = 1.0;
        let stage = config.stages[0].clone();

        let mut spawning = Spawning::new(&config, SelectionPolicy::Weighted);
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        for step in 0..200 {
            spawning.global_timer = Duration::from_millis(step * 137);
            let next = spawning.compute_next_interval(&config, &stage, 1 + (step % 4) as u32, &mut rng);
            assert!(next >= config.min_interval && next <= config.max_interval);
        }
    }

    #[test]
    fn identical_seeds_produce_identical_schedules() {
        let config = GameTables::starter().spawn;
        let mut a = Spawning::new(&config, SelectionPolicy::Weighted);
        let mut b = Spawning::new(&config, SelectionPolicy::Weighted);
        let mut rng_a = ChaCha8Rng::seed_from_u64(42);
        let mut rng_b = ChaCha8Rng::seed_from_u64(42);
        let mut out_a = Vec::new();
        let mut out_b = Vec::new();

        for _ in 0..100 {
            a.handle(&advance(0.5), &config, 3, 10, &mut rng_a, &mut out_a);
            b.handle(&advance(0.5), &config, 3, 10, &mut rng_b, &mut out_b);
        }
        assert_eq!(out_a, out_b);
        assert!(!out_a.is_empty());
    }

    #[test]
    fn rarity_curve_gates_entries_below_the_level_gate() {
        assert_eq!(rarity_curve(3, 5), 0.0);
        assert_eq!(rarity_curve(3, 6), 1.0);
        assert!(rarity_curve(1, 10) > 1.0);
    }

    #[test]
    fn rarity_curve_policy_never_picks_gated_mobs() {
        let config = GameTables::starter().spawn;
        let mut spawning = Spawning::new(&config, SelectionPolicy::RarityCurve);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut out = Vec::new();

        for _ in 0..200 {
            spawning.handle(&advance(10.0), &config, 2, 0, &mut rng, &mut out);
        }
        for command in &out {
            if let Command::SpawnMob { mob } = command {
                assert!(u32::from(mob.rarity.level()) * 2 <= 2);
            }
        }
        assert!(!out.is_empty());
    }
}
