//! Player state: health, shield, experience, coins, and the card backpack.

use std::collections::{BTreeMap, BTreeSet};

use petal_defence_core::Card;
use serde::{Deserialize, Serialize};

use crate::buff::BuffGroup;

/// Base hit point capacity before health buffs.
pub const BASE_HP_LIMIT: i32 = 100;
/// Base contact damage the player's body deals to mobs reaching the path end.
pub const BASE_BODY_DAMAGE: i32 = 10;

/// The defending player.
///
/// Every field defaults when absent from persisted state, so a partial
/// save still loads; missing numeric fields come back as zero.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Player {
    #[serde(default)]
    hp: i32,
    #[serde(default)]
    hp_limit: i32,
    #[serde(default)]
    shield: f32,
    #[serde(default)]
    level: u32,
    #[serde(default)]
    xp: u64,
    #[serde(default)]
    coins: u64,
    #[serde(default)]
    talent_points: u32,
    // Fractional healing carries over between ticks.
    #[serde(default)]
    heal_accumulator: f32,
    // Serialized as a pair list so JSON backends accept the composite key.
    #[serde(default, with = "backpack_entries")]
    backpack: BTreeMap<Card, u32>,
    #[serde(default)]
    bought_uniques: BTreeSet<Card>,
}

mod backpack_entries {
    use super::{BTreeMap, Card};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub(super) fn serialize<S: Serializer>(
        map: &BTreeMap<Card, u32>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let entries: Vec<(Card, u32)> = map.iter().map(|(card, count)| (*card, *count)).collect();
        entries.serialize(serializer)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<Card, u32>, D::Error> {
        let entries = Vec::<(Card, u32)>::deserialize(deserializer)?;
        Ok(entries.into_iter().collect())
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

impl Player {
    /// Creates a fresh level-0 player at full health.
    #[must_use]
    pub fn new() -> Self {
        Self {
            hp: BASE_HP_LIMIT,
            hp_limit: BASE_HP_LIMIT,
            shield: 0.0,
            level: 0,
            xp: 0,
            coins: 0,
            talent_points: 0,
            heal_accumulator: 0.0,
            backpack: BTreeMap::new(),
            bought_uniques: BTreeSet::new(),
        }
    }

    /// Current hit points.
    #[must_use]
    pub fn hp(&self) -> i32 {
        self.hp
    }

    /// Hit point capacity after health buffs.
    #[must_use]
    pub fn hp_limit(&self) -> i32 {
        self.hp_limit
    }

    /// Current shield points.
    #[must_use]
    pub fn shield(&self) -> f32 {
        self.shield
    }

    /// Current level.
    #[must_use]
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Experience accumulated toward the next level.
    #[must_use]
    pub fn xp(&self) -> u64 {
        self.xp
    }

    /// Coin balance.
    #[must_use]
    pub fn coins(&self) -> u64 {
        self.coins
    }

    /// Unspent talent points.
    #[must_use]
    pub fn talent_points(&self) -> u32 {
        self.talent_points
    }

    /// Reports whether the player has been defeated.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.hp <= 0
    }

    /// Experience required to advance past the current level.
    #[must_use]
    pub fn required_xp(&self) -> u64 {
        let next = u64::from(self.level) + 1;
        100 * next * (next + 1) / 2
    }

    /// Contact damage the player's body deals, after damage buffs.
    #[must_use]
    pub fn body_damage(&self, buffs: &BuffGroup) -> i32 {
        buffs.damage.apply(BASE_BODY_DAMAGE as f32) as i32
    }

    /// Rescales the hit point limit against the health buff, preserving the
    /// current health fraction.
    pub fn apply_health_buff(&mut self, buffs: &BuffGroup) {
        let limit = buffs.health.apply(BASE_HP_LIMIT as f32) as i32;
        if limit == self.hp_limit || self.hp_limit <= 0 {
            return;
        }
        let fraction = self.hp as f32 / self.hp_limit as f32;
        self.hp_limit = limit;
        self.hp = (fraction * limit as f32).round() as i32;
    }

    /// Applies incoming damage, draining the shield first.
    ///
    /// Returns the damage that actually reached hit points.
    pub fn hit(&mut self, damage: i32) -> i32 {
        if damage <= 0 || self.is_dead() {
            return 0;
        }
        let mut remaining = damage as f32;
        if self.shield > 0.0 {
            let absorbed = self.shield.min(remaining);
            self.shield -= absorbed;
            remaining -= absorbed;
        }
        let applied = remaining as i32;
        self.hp -= applied;
        applied
    }

    /// Accumulates healing; whole points restore hit points and overflow
    /// beyond the limit converts to shield via the overheal factor.
    ///
    /// Without an overheal buff the overflow is discarded.
    pub fn heal(&mut self, amount: f32, buffs: &BuffGroup) {
        if amount <= 0.0 || self.is_dead() {
            return;
        }
        self.heal_accumulator += amount;
        let whole = self.heal_accumulator.floor();
        if whole < 1.0 {
            return;
        }
        self.heal_accumulator -= whole;
        let mut points = whole as i32;
        let missing = self.hp_limit - self.hp;
        if missing > 0 {
            let restored = points.min(missing);
            self.hp += restored;
            points -= restored;
        }
        if points > 0 && buffs.overheal.factor() > 0.0 {
            self.shield += buffs.overheal.apply(points as f32);
        }
    }

    /// Grants experience, resolving any level-ups.
    ///
    /// Each level gained awards one talent point. Returns the levels gained.
    pub fn gain_xp(&mut self, amount: u64) -> u32 {
        self.xp += amount;
        let mut gained = 0;
        while self.xp >= self.required_xp() {
            self.xp -= self.required_xp();
            self.level += 1;
            self.talent_points += 1;
            gained += 1;
        }
        gained
    }

    /// Grants coins, after shop buffs.
    pub fn gain_coins(&mut self, amount: u64, buffs: &BuffGroup) {
        self.coins += buffs.shop.apply(amount as f32) as u64;
    }

    /// Spends coins; returns false without mutating when short.
    pub fn spend_coins(&mut self, amount: u64) -> bool {
        if self.coins < amount {
            return false;
        }
        self.coins -= amount;
        true
    }

    /// Spends talent points; returns false without mutating when short.
    pub fn spend_talent_points(&mut self, amount: u32) -> bool {
        if self.talent_points < amount {
            return false;
        }
        self.talent_points -= amount;
        true
    }

    /// Count of a card in the backpack.
    #[must_use]
    pub fn card_count(&self, card: Card) -> u32 {
        self.backpack.get(&card).copied().unwrap_or(0)
    }

    /// Adds cards to the backpack.
    pub fn add_cards(&mut self, card: Card, count: u32) {
        if count > 0 {
            *self.backpack.entry(card).or_insert(0) += count;
        }
    }

    /// Removes one card from the backpack; returns false when absent.
    pub fn take_card(&mut self, card: Card) -> bool {
        match self.backpack.get_mut(&card) {
            Some(count) if *count > 0 => {
                *count -= 1;
                if *count == 0 {
                    let _ = self.backpack.remove(&card);
                }
                true
            }
            _ => false,
        }
    }

    /// All backpack cards with their counts.
    pub fn iter_backpack(&self) -> impl Iterator<Item = (Card, u32)> + '_ {
        self.backpack.iter().map(|(card, count)| (*card, *count))
    }

    /// Records a one-per-run shop purchase.
    pub fn record_unique_purchase(&mut self, card: Card) {
        let _ = self.bought_uniques.insert(card);
    }

    /// Reports whether a one-per-run card was already bought.
    #[must_use]
    pub fn bought_unique(&self, card: Card) -> bool {
        self.bought_uniques.contains(&card)
    }
}
