//! Buff and debuff primitives plus the per-tick aggregation machinery.
//!
//! A buff is a single scalar accumulator with fixed combine semantics: how
//! new contributions fold into the accumulator and how the accumulated value
//! applies to a base stat. [`BuffGroup`] names one accumulator per stat the
//! gameplay formulas consult. Effective buffs each tick are the merge of the
//! tower-sourced group (rebuilt from scratch) and the talent-sourced group
//! (accumulated once per purchase); the reload accumulators merge with a
//! compound combinator so two already-accumulated factors do not
//! double-count.

use std::time::Duration;

use petal_defence_core::{Rarity, SquareCoord, TowerType};

/// Additive accumulation, additive application.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AddBuff {
    value: f32,
}

impl AddBuff {
    /// Folds a contribution into the accumulator.
    pub fn add(&mut self, value: f32) {
        self.value += value;
    }

    /// Applies the accumulated value to a base stat.
    #[must_use]
    pub fn apply(&self, value: f32) -> f32 {
        value + self.value
    }

    /// Accumulated raw value.
    #[must_use]
    pub fn value(&self) -> f32 {
        self.value
    }
}

/// Additive accumulation, multiplicative-factor application.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AddFactorBuff {
    factor: f32,
}

impl AddFactorBuff {
    /// Folds a factor contribution into the accumulator.
    pub fn add(&mut self, factor: f32) {
        self.factor += factor;
    }

    /// Applies the accumulated factor to a base stat.
    #[must_use]
    pub fn apply(&self, value: f32) -> f32 {
        value + value * self.factor
    }

    /// Accumulated raw factor.
    #[must_use]
    pub fn factor(&self) -> f32 {
        self.factor
    }
}

/// Additive accumulation, pure-scale application.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FactorBuff {
    factor: f32,
}

impl FactorBuff {
    /// Folds a factor contribution into the accumulator.
    pub fn add(&mut self, factor: f32) {
        self.factor += factor;
    }

    /// Scales a base value by the accumulated factor.
    #[must_use]
    pub fn apply(&self, value: f32) -> f32 {
        value * self.factor
    }

    /// Accumulated raw factor.
    #[must_use]
    pub fn factor(&self) -> f32 {
        self.factor
    }
}

/// Named buff accumulators consulted by the gameplay formulas.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BuffGroup {
    /// Petal and summon movement speed.
    pub speed: AddFactorBuff,
    /// Flat petal damage bonus.
    pub damage: AddBuff,
    /// Tower reload speed-up.
    pub reload: AddFactorBuff,
    /// Player hit point limit.
    pub health: AddFactorBuff,
    /// Passive healing per second.
    pub heal: AddBuff,
    /// Overheal-to-shield conversion.
    pub overheal: FactorBuff,
    /// Shop tier unlock.
    pub shop: AddBuff,
    /// Antennae level granted without a placed antennae tower.
    pub antennae: AddBuff,
    /// Flat tower range bonus, in squares.
    pub reach: AddBuff,
    /// Extra live summons allowed per summon tower.
    pub summoner: AddBuff,
}

impl BuffGroup {
    /// Folds a named contribution into the matching accumulator.
    ///
    /// # Panics
    ///
    /// Panics on an unknown buff name; names come from static attribute and
    /// talent tables, so a miss is broken data.
    pub fn add(&mut self, name: &str, value: f32) {
        match name {
            "speed" => self.speed.add(value),
            "damage" => self.damage.add(value),
            "reload" => self.reload.add(value),
            "health" => self.health.add(value),
            "heal" => self.heal.add(value),
            "overheal" => self.overheal.add(value),
            "shop" => self.shop.add(value),
            "antennae" => self.antennae.add(value),
            "reach" => self.reach.add(value),
            "summoner" => self.summoner.add(value),
            other => panic!("unknown buff name {other:?}"),
        }
    }

    /// Divides a base reload duration by the accumulated reload speed-up.
    #[must_use]
    pub fn buffed_reload(&self, base: f32) -> f32 {
        base / (1.0 + self.reload.factor())
    }

    /// Merges the tower-sourced and talent-sourced groups into the effective
    /// group used by this tick's formulas.
    ///
    /// Reload factors use the compound combinator: both sources are already
    /// accumulated speed-ups, so the merged factor is `(1+a)(1+b) - 1`
    /// rather than `a + b`.
    #[must_use]
    pub fn merge(towers: &BuffGroup, talents: &BuffGroup) -> BuffGroup {
        let mut merged = BuffGroup::default();
        merged.speed.add(towers.speed.factor() + talents.speed.factor());
        merged.damage.add(towers.damage.value() + talents.damage.value());
        merged.reload.add(
            (1.0 + towers.reload.factor()) * (1.0 + talents.reload.factor()) - 1.0,
        );
        merged.health.add(towers.health.factor() + talents.health.factor());
        merged.heal.add(towers.heal.value() + talents.heal.value());
        merged.overheal.add(towers.overheal.factor() + talents.overheal.factor());
        merged.shop.add(towers.shop.value() + talents.shop.value());
        merged.antennae.add(towers.antennae.value() + talents.antennae.value());
        merged.reach.add(towers.reach.value() + talents.reach.value());
        merged
            .summoner
            .add(towers.summoner.value() + talents.summoner.value());
        merged
    }
}

/// Duration-based debuff; deactivates once its timer exceeds the duration.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DurationDebuff {
    /// Magnitude of the debuff.
    pub value: f32,
    /// Rarity level of the source, for override precedence.
    pub level: u8,
    duration: Duration,
    timer: Duration,
}

impl DurationDebuff {
    /// Creates an active debuff from a source rarity.
    #[must_use]
    pub fn new(value: f32, rarity: Rarity, duration: Duration) -> Self {
        Self {
            value,
            level: rarity.level(),
            duration,
            timer: Duration::ZERO,
        }
    }

    /// Advances the debuff timer.
    pub fn update(&mut self, dt: Duration) {
        self.timer = self.timer.saturating_add(dt);
    }

    /// Reports whether the debuff still applies.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.timer < self.duration
    }

    /// Replaces this debuff with a challenger unless a strictly stronger
    /// source is still active.
    pub fn swap(&mut self, challenger: DurationDebuff) {
        if !self.is_active() || challenger.level >= self.level {
            *self = challenger;
        }
    }
}

/// One-shot debuff; consumed and zeroed on first read.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OneShotDebuff {
    /// Magnitude of the debuff.
    pub value: f32,
    /// Rarity level of the source, for override precedence.
    pub level: u8,
    active: bool,
}

impl OneShotDebuff {
    /// Creates an armed one-shot debuff from a source rarity.
    #[must_use]
    pub fn new(value: f32, rarity: Rarity) -> Self {
        Self {
            value,
            level: rarity.level(),
            active: true,
        }
    }

    /// Reports whether the debuff is still armed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Replaces this debuff with a challenger unless a strictly stronger
    /// source is still armed.
    pub fn swap(&mut self, challenger: OneShotDebuff) {
        if !self.is_active() || challenger.level >= self.level {
            *self = challenger;
        }
    }

    /// Consumes the debuff, returning its resisted magnitude.
    pub fn take(&mut self, resistance: f32) -> f32 {
        if !self.active {
            return 0.0;
        }
        self.active = false;
        resistance * self.value
    }
}

/// Scales a speed down by an active slow debuff.
#[must_use]
pub fn apply_slow(debuff: &DurationDebuff, speed: f32, resistance: f32) -> f32 {
    if !debuff.is_active() {
        return speed;
    }
    speed * (1.0 - debuff.value * resistance)
}

/// Reduces an armor value by an active armor debuff, clamped at zero.
#[must_use]
pub fn apply_armor_break(debuff: &DurationDebuff, armor: f32) -> f32 {
    if !debuff.is_active() {
        return armor;
    }
    (armor - debuff.value).max(0.0)
}

/// Per-mob bag of the debuffs combat can inflict.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DebuffBag {
    /// Slow inflicted by webs.
    pub web_slow: DurationDebuff,
    /// Slow inflicted by pollen clouds.
    pub pollen_slow: DurationDebuff,
    /// One-shot knockback impulse.
    pub knockback: OneShotDebuff,
    /// Armor reduction.
    pub armor: DurationDebuff,
}

impl DebuffBag {
    /// Advances every duration-based debuff in the bag.
    pub fn update(&mut self, dt: Duration) {
        self.web_slow.update(dt);
        self.pollen_slow.update(dt);
        self.armor.update(dt);
    }
}

/// Buff tower types whose effect is gated by the antennae level.
pub const FLOWER_BUFF_TOWERS: [TowerType; 4] = [
    TowerType::Cutter,
    TowerType::Leaf,
    TowerType::Rose,
    TowerType::Amulet,
];

#[derive(Clone, Copy, Debug)]
struct SourceEntry {
    rarity: Rarity,
    square: SquareCoord,
}

/// Tracks, per buff tower type, the single highest-rarity active source.
///
/// Rebuilt from scratch each recomputation: antennae towers register in a
/// first pass so flower-gated types resolve against the final antennae level
/// in pass two.
#[derive(Clone, Debug, Default)]
pub struct BuffSources {
    entries: Vec<(TowerType, SourceEntry)>,
    base_antennae: u8,
}

impl BuffSources {
    /// Clears all sources and records the talent-granted antennae level.
    pub fn reset(&mut self, base_antennae: u8) {
        self.entries.clear();
        self.base_antennae = base_antennae;
    }

    /// Registers a buff tower as a candidate source.
    ///
    /// Flower-gated types are ignored while their rarity level exceeds the
    /// effective antennae level. A type already sourced keeps its entry
    /// unless the newcomer's rarity is strictly higher.
    pub fn register(&mut self, tower: TowerType, rarity: Rarity, square: SquareCoord) {
        if FLOWER_BUFF_TOWERS.contains(&tower) && rarity.level() > self.antennae_level() {
            return;
        }
        match self.entries.iter_mut().find(|(kind, _)| *kind == tower) {
            Some((_, entry)) => {
                if rarity.level() > entry.rarity.level() {
                    *entry = SourceEntry { rarity, square };
                }
            }
            None => self.entries.push((tower, SourceEntry { rarity, square })),
        }
    }

    /// Effective antennae level: the talent-granted base or the registered
    /// antennae tower's rarity level, whichever is higher.
    #[must_use]
    pub fn antennae_level(&self) -> u8 {
        let placed = self
            .entries
            .iter()
            .find(|(kind, _)| *kind == TowerType::Antennae)
            .map_or(0, |(_, entry)| entry.rarity.level());
        placed.max(self.base_antennae)
    }

    /// Reports whether the tower on a square is the active source of its
    /// buff type.
    #[must_use]
    pub fn is_active(&self, tower: TowerType, square: SquareCoord) -> bool {
        self.entries
            .iter()
            .any(|(kind, entry)| *kind == tower && entry.square == square)
    }
}
