//! Read-only attribute tables consumed by the world and the systems.
//!
//! Tables are keyed by `(type, rarity)` and are static, load-time-validated
//! data. Lookups for keys the tables do not carry are programmer or config
//! errors and abort with a descriptive panic rather than limping along with
//! made-up numbers. A built-in starter table set backs tests and the demo
//! run; adapters may replace it with tables parsed from configuration files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Card, MobCard, MobType, Rarity, TalentId, TowerType};

/// Numeric attributes of one `(tower type, rarity)` entry.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TowerStats {
    /// Shop price of the card.
    #[serde(default)]
    pub price: i64,
    /// Named free-form attributes (reload, range, damage, buff values, ...).
    #[serde(default)]
    pub attribs: BTreeMap<String, f32>,
}

impl TowerStats {
    /// Looks up a named attribute.
    ///
    /// # Panics
    ///
    /// Panics when the attribute is absent; absent attributes on a hot
    /// gameplay path mean the table data is broken.
    #[must_use]
    pub fn attrib(&self, name: &str) -> f32 {
        match self.attribs.get(name) {
            Some(value) => *value,
            None => panic!("tower attribute {name:?} missing from table entry"),
        }
    }

    /// Looks up a named attribute, falling back to a default when absent.
    #[must_use]
    pub fn attrib_or(&self, name: &str, default: f32) -> f32 {
        self.attribs.get(name).copied().unwrap_or(default)
    }
}

/// Per-rarity attribute entries of one tower type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TowerAttribs {
    /// Entries keyed by rarity.
    pub rarities: BTreeMap<Rarity, TowerStats>,
}

/// Numeric attributes of one `(mob type, rarity)` entry.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MobStats {
    /// Hit points at spawn.
    #[serde(default)]
    pub hp: i32,
    /// Base forward speed in path squares per second.
    #[serde(default)]
    pub speed: f32,
    /// Damage dealt on contact and at the path end.
    #[serde(default)]
    pub damage: i32,
    /// Armor subtracted from incoming normal-type damage.
    #[serde(default)]
    pub armor: i32,
    /// Coin awarded to the player on death.
    #[serde(default)]
    pub coin_drop: i64,
    /// Experience awarded to the player on death.
    #[serde(default)]
    pub xp_drop: i64,
    /// Named free-form attributes (variant timings, evasion, ...).
    #[serde(default)]
    pub attribs: BTreeMap<String, f32>,
}

impl MobStats {
    /// Looks up a named attribute.
    ///
    /// # Panics
    ///
    /// Panics when the attribute is absent.
    #[must_use]
    pub fn attrib(&self, name: &str) -> f32 {
        match self.attribs.get(name) {
            Some(value) => *value,
            None => panic!("mob attribute {name:?} missing from table entry"),
        }
    }
}

/// Per-rarity attribute entries of one mob type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MobAttribs {
    /// Entries keyed by rarity.
    pub rarities: BTreeMap<Rarity, MobStats>,
}

/// One purchasable node of the talent tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TalentSpec {
    /// Identifier of the node.
    pub id: TalentId,
    /// Parent node that must be purchased first, if any.
    pub prev: Option<TalentId>,
    /// Display rarity of the node.
    pub rarity: Rarity,
    /// Name of the buff accumulator the node feeds.
    pub buff: String,
    /// Contribution added to the buff accumulator on purchase.
    pub value: f32,
    /// Talent points spent on purchase.
    pub cost: i64,
}

/// One-shot interval jitter parameters of a spawn stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct JitterConfig {
    /// Half-width of the uniform jitter sample, in seconds.
    #[serde(default)]
    pub range: f32,
    /// Probability in `[0, 1]` that a given interval is jittered at all.
    #[serde(default)]
    pub prob: f32,
}

/// Sine oscillation parameters of a spawn stage interval.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OscillatorConfig {
    /// Whether the oscillation term is applied.
    #[serde(default)]
    pub enabled: bool,
    /// Full oscillation period in seconds.
    #[serde(default)]
    pub period: f32,
    /// Peak deviation added to the interval, in seconds.
    #[serde(default)]
    pub amplitude: f32,
}

/// One weighted entry of a spawn stage's mob table.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnEntry {
    /// Mob identity this entry spawns.
    pub mob: MobCard,
    /// Selection weight; entries with non-positive weight are skipped.
    pub weight: f32,
}

/// A level-range-scoped spawn configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnStage {
    /// Lowest player level the stage covers, inclusive.
    pub min_level: u32,
    /// Highest player level the stage covers, inclusive.
    pub max_level: u32,
    /// Interval at `min_level`, in seconds.
    pub base_interval: f32,
    /// Interval reduction per player level above `min_level`, in seconds.
    #[serde(default)]
    pub scale_per_level: f32,
    /// One-shot jitter applied to freshly computed intervals.
    #[serde(default)]
    pub jitter: JitterConfig,
    /// Sine oscillation applied to freshly computed intervals.
    #[serde(default)]
    pub oscillator: OscillatorConfig,
    /// Weighted mob table of the stage.
    pub entries: Vec<SpawnEntry>,
}

fn default_min_interval() -> f32 {
    0.5
}

fn default_max_interval() -> f32 {
    10.0
}

fn default_smoothing_alpha() -> f32 {
    0.2
}

fn default_max_mob() -> usize {
    200
}

/// Global spawn scheduling parameters plus the stage list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnConfig {
    /// Hard lower clamp on any scheduled interval, in seconds.
    #[serde(default = "default_min_interval")]
    pub min_interval: f32,
    /// Hard upper clamp on any scheduled interval, in seconds.
    #[serde(default = "default_max_interval")]
    pub max_interval: f32,
    /// Exponential smoothing factor blending new intervals with the previous.
    #[serde(default = "default_smoothing_alpha")]
    pub smoothing_alpha: f32,
    /// Live mob population above which the scheduler goes idle.
    #[serde(default = "default_max_mob")]
    pub max_mob: usize,
    /// Stage list; ranges are searched in order, first match wins.
    pub stages: Vec<SpawnStage>,
}

impl SpawnConfig {
    /// Finds the stage whose level range contains the given player level.
    #[must_use]
    pub fn stage_for_level(&self, level: u32) -> Option<&SpawnStage> {
        self.stages
            .iter()
            .find(|stage| stage.min_level <= level && level <= stage.max_level)
    }
}

/// The complete read-only table set the simulation indexes into.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameTables {
    /// Tower attribute tables keyed by type then rarity.
    pub towers: BTreeMap<TowerType, TowerAttribs>,
    /// Mob attribute tables keyed by type then rarity.
    pub mobs: BTreeMap<MobType, MobAttribs>,
    /// Purchasable talent nodes.
    pub talents: Vec<TalentSpec>,
    /// Spawn scheduling configuration.
    pub spawn: SpawnConfig,
}

impl GameTables {
    /// Attribute entry of a tower card.
    ///
    /// # Panics
    ///
    /// Panics when the `(type, rarity)` key is absent from the tables.
    #[must_use]
    pub fn tower(&self, card: Card) -> &TowerStats {
        self.towers
            .get(&card.tower)
            .and_then(|entry| entry.rarities.get(&card.rarity))
            .unwrap_or_else(|| {
                panic!(
                    "tower table entry missing for {:?} {:?}",
                    card.rarity, card.tower
                )
            })
    }

    /// Attribute entry of a mob.
    ///
    /// # Panics
    ///
    /// Panics when the `(type, rarity)` key is absent from the tables.
    #[must_use]
    pub fn mob(&self, mob: MobCard) -> &MobStats {
        self.mobs
            .get(&mob.mob)
            .and_then(|entry| entry.rarities.get(&mob.rarity))
            .unwrap_or_else(|| panic!("mob table entry missing for {:?} {:?}", mob.rarity, mob.mob))
    }

    /// Talent node by identifier.
    ///
    /// # Panics
    ///
    /// Panics when no node carries the identifier.
    #[must_use]
    pub fn talent(&self, id: TalentId) -> &TalentSpec {
        self.talents
            .iter()
            .find(|talent| talent.id == id)
            .unwrap_or_else(|| panic!("talent table entry missing for id {}", id.get()))
    }

    /// Built-in table set used by tests and the demo run.
    #[must_use]
    pub fn starter() -> Self {
        Self {
            towers: TowerType::ALL
                .iter()
                .map(|tower| (*tower, starter_tower(*tower)))
                .collect(),
            mobs: [
                MobType::Bee,
                MobType::Spider,
                MobType::Hornet,
                MobType::Roach,
                MobType::Fly,
                MobType::AntSoldier,
                MobType::Beetle,
                MobType::Missile,
            ]
            .iter()
            .map(|mob| (*mob, starter_mob(*mob)))
            .collect(),
            talents: starter_talents(),
            spawn: starter_spawn(),
        }
    }
}

fn attrib_map(pairs: &[(&str, f32)]) -> BTreeMap<String, f32> {
    pairs
        .iter()
        .map(|(name, value)| ((*name).to_owned(), *value))
        .collect()
}

fn starter_tower(tower: TowerType) -> TowerAttribs {
    TowerAttribs {
        rarities: Rarity::ALL
            .iter()
            .map(|rarity| (*rarity, starter_tower_entry(tower, *rarity)))
            .collect(),
    }
}

fn starter_tower_entry(tower: TowerType, rarity: Rarity) -> TowerStats {
    let level = f32::from(rarity.level());
    // Rough power curve; real deployments replace this from config.
    let power = 1.0 + 0.6 * (level - 1.0);
    let pairs: Vec<(&str, f32)> = match tower {
        TowerType::Basic => vec![
            ("reload", 1.5),
            ("range", 3.0),
            ("damage", (10.0 * power).floor()),
            ("speed", 6.0),
            ("hp", (8.0 * power).floor()),
        ],
        TowerType::Missile => vec![
            ("reload", 2.0),
            ("range", 3.5),
            ("damage", (14.0 * power).floor()),
            ("speed", 9.0),
            ("hp", (6.0 * power).floor()),
        ],
        TowerType::Stinger => vec![
            ("reload", 1.0),
            ("range", 2.0),
            ("damage", (18.0 * power).floor()),
            ("speed", 7.0),
            ("hp", (4.0 * power).floor()),
        ],
        TowerType::Triangle => vec![
            ("reload", 1.6),
            ("range", 3.0),
            ("damage", (8.0 * power).floor()),
            ("speed", 6.0),
            ("hp", (6.0 * power).floor()),
            ("damage_increase", (4.0 * power).floor()),
        ],
        TowerType::Lightning => vec![
            ("reload", 2.5),
            ("range", 3.0),
            ("damage", (9.0 * power).floor()),
            ("speed", 6.5),
            ("hp", (5.0 * power).floor()),
            ("bounce_range", 1.5),
            ("max_bounce", 3.0),
        ],
        TowerType::Laser => vec![
            ("reload", 2.0),
            ("range", 3.0),
            ("damage", (4.0 * power).floor()),
            ("hp", (10.0 * power).floor()),
            ("damage_ramp", 0.5),
            ("max_ramp", 3.0),
        ],
        TowerType::Dice => vec![
            ("reload", 1.8),
            ("range", 3.0),
            ("damage", (7.0 * power).floor()),
            ("speed", 6.0),
            ("hp", (5.0 * power).floor()),
            ("crit_prob", 0.1),
            ("crit_multiplier", 6.0),
        ],
        TowerType::Chip => vec![
            ("reload", 1.2),
            ("range", 3.0),
            ("damage", (9.0 * power).floor()),
            ("speed", 6.5),
            ("hp", (5.0 * power).floor()),
            ("miss_prob", 0.25),
        ],
        TowerType::Dahlia => vec![
            ("reload", 1.8),
            ("range", 3.0),
            ("damage", (6.0 * power).floor()),
            ("speed", 6.0),
            ("hp", (5.0 * power).floor()),
            ("copy", 3.0),
        ],
        TowerType::Web => vec![
            ("reload", 3.0),
            ("hp", (20.0 * power).floor()),
            ("damage", 0.0),
            ("slow_down", 0.4),
            ("duration", 4.0),
        ],
        TowerType::Pollen => vec![
            ("reload", 2.5),
            ("hp", (6.0 * power).floor()),
            ("damage", (12.0 * power).floor()),
            ("duration", 6.0),
        ],
        TowerType::Shovel => vec![
            ("reload", 4.0),
            ("hp", (40.0 * power).floor()),
            ("damage", (2.0 * power).floor()),
            ("knock_back", 1.5 + 0.2 * level),
        ],
        TowerType::AntEgg => vec![("reload", 5.0), ("copy", 2.0)],
        TowerType::BeetleEgg => vec![("reload", 7.0), ("copy", 1.0)],
        TowerType::Antennae => vec![("reload", 1.0), ("buff_antennae", level)],
        TowerType::Rose => vec![("reload", 2.0), ("heal", (5.0 * power).floor())],
        TowerType::Cutter => vec![("reload", 1.0), ("buff_reload", 0.1 * level)],
        TowerType::Leaf => vec![("reload", 1.0), ("buff_heal", 2.0 * level)],
        TowerType::Amulet => vec![("reload", 1.0), ("buff_damage", 3.0 * level)],
        TowerType::Coin => vec![("reload", 3.0), ("coin", 10.0 * level)],
    };
    TowerStats {
        price: (20.0 * power) as i64,
        attribs: attrib_map(&pairs),
    }
}

fn starter_mob(mob: MobType) -> MobAttribs {
    MobAttribs {
        rarities: Rarity::ALL
            .iter()
            .map(|rarity| (*rarity, starter_mob_entry(mob, *rarity)))
            .collect(),
    }
}

fn starter_mob_entry(mob: MobType, rarity: Rarity) -> MobStats {
    let level = i64::from(rarity.level());
    let power = 1.0 + 0.8 * (level - 1) as f32;
    let (hp, speed, damage, armor, pairs): (f32, f32, f32, f32, Vec<(&str, f32)>) = match mob {
        MobType::Bee => (12.0, 0.8, 5.0, 0.0, vec![]),
        MobType::Spider => (9.0, 1.3, 4.0, 0.0, vec![("rotation_speed", 180.0)]),
        MobType::Hornet => (
            14.0,
            0.6,
            6.0,
            1.0,
            vec![
                ("rotation_speed", 120.0),
                ("pre_shoot_delay", 0.5),
                ("post_shoot_delay", 0.7),
                ("shoot_interval", 3.0),
                ("shoot_interval_jitter", 1.0),
            ],
        ),
        MobType::Roach => (
            11.0,
            0.7,
            5.0,
            0.0,
            vec![
                ("running_speed", 2.0),
                ("speed_up_duration", 0.4),
                ("slow_down_duration", 0.4),
                ("rest_duration", 1.5),
                ("rest_duration_jitter", 0.5),
                ("running_duration", 1.0),
                ("running_duration_jitter", 0.4),
            ],
        ),
        MobType::Fly => (
            8.0,
            1.0,
            4.0,
            0.0,
            vec![
                ("rotation_speed", 90.0),
                ("rotation_range", 30.0),
                ("evasion", 0.2),
            ],
        ),
        MobType::AntSoldier => (10.0, 0.9, 6.0, 0.0, vec![]),
        MobType::Beetle => (30.0, 0.5, 10.0, 4.0, vec![]),
        MobType::Missile => (1.0, 3.0, 8.0, 0.0, vec![]),
    };
    MobStats {
        hp: (hp * power) as i32,
        speed,
        damage: (damage * power) as i32,
        armor: (armor * power) as i32,
        coin_drop: 2 * level * level,
        xp_drop: 3 * level * level,
        attribs: attrib_map(&pairs),
    }
}

fn starter_talents() -> Vec<TalentSpec> {
    vec![
        TalentSpec {
            id: TalentId::new(1),
            prev: None,
            rarity: Rarity::Common,
            buff: "damage".to_owned(),
            value: 2.0,
            cost: 1,
        },
        TalentSpec {
            id: TalentId::new(2),
            prev: Some(TalentId::new(1)),
            rarity: Rarity::Unusual,
            buff: "reload".to_owned(),
            value: 0.05,
            cost: 2,
        },
        TalentSpec {
            id: TalentId::new(3),
            prev: Some(TalentId::new(1)),
            rarity: Rarity::Rare,
            buff: "antennae".to_owned(),
            value: 1.0,
            cost: 3,
        },
        TalentSpec {
            id: TalentId::new(4),
            prev: Some(TalentId::new(2)),
            rarity: Rarity::Epic,
            buff: "health".to_owned(),
            value: 0.1,
            cost: 4,
        },
    ]
}

fn starter_spawn() -> SpawnConfig {
    let entry = |rarity, mob, weight| SpawnEntry {
        mob: MobCard::new(rarity, mob),
        weight,
    };
    SpawnConfig {
        min_interval: default_min_interval(),
        max_interval: default_max_interval(),
        smoothing_alpha: default_smoothing_alpha(),
        max_mob: default_max_mob(),
        stages: vec![
            SpawnStage {
                min_level: 0,
                max_level: 4,
                base_interval: 4.0,
                scale_per_level: 0.15,
                jitter: JitterConfig {
                    range: 0.5,
                    prob: 0.3,
                },
                oscillator: OscillatorConfig {
                    enabled: true,
                    period: 30.0,
                    amplitude: 1.0,
                },
                entries: vec![
                    entry(Rarity::Common, MobType::Bee, 6.0),
                    entry(Rarity::Common, MobType::Spider, 3.0),
                    entry(Rarity::Unusual, MobType::Bee, 1.0),
                ],
            },
            SpawnStage {
                min_level: 5,
                max_level: 9,
                base_interval: 3.5,
                scale_per_level: 0.2,
                jitter: JitterConfig {
                    range: 0.8,
                    prob: 0.4,
                },
                oscillator: OscillatorConfig {
                    enabled: true,
                    period: 25.0,
                    amplitude: 1.2,
                },
                entries: vec![
                    entry(Rarity::Unusual, MobType::Bee, 4.0),
                    entry(Rarity::Unusual, MobType::Spider, 3.0),
                    entry(Rarity::Rare, MobType::Hornet, 2.0),
                    entry(Rarity::Rare, MobType::Roach, 2.0),
                ],
            },
            SpawnStage {
                min_level: 10,
                max_level: 99,
                base_interval: 3.0,
                scale_per_level: 0.05,
                jitter: JitterConfig {
                    range: 1.0,
                    prob: 0.5,
                },
                oscillator: OscillatorConfig {
                    enabled: true,
                    period: 20.0,
                    amplitude: 1.5,
                },
                entries: vec![
                    entry(Rarity::Rare, MobType::Bee, 3.0),
                    entry(Rarity::Rare, MobType::Fly, 3.0),
                    entry(Rarity::Epic, MobType::Hornet, 2.0),
                    entry(Rarity::Epic, MobType::Roach, 2.0),
                    entry(Rarity::Legendary, MobType::Beetle, 1.0),
                ],
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starter_tables_cover_every_type_and_rarity() {
        let tables = GameTables::starter();
        for tower in TowerType::ALL {
            for rarity in Rarity::ALL {
                let entry = tables.tower(Card::new(rarity, tower));
                assert!(entry.attrib("reload") > 0.0);
            }
        }
        for mob in tables.mobs.keys() {
            for rarity in Rarity::ALL {
                let entry = tables.mob(MobCard::new(rarity, *mob));
                assert!(entry.hp > 0);
            }
        }
    }

    #[test]
    fn stage_lookup_matches_level_ranges() {
        let spawn = starter_spawn();
        assert_eq!(spawn.stage_for_level(0).map(|s| s.min_level), Some(0));
        assert_eq!(spawn.stage_for_level(7).map(|s| s.min_level), Some(5));
        assert_eq!(spawn.stage_for_level(50).map(|s| s.min_level), Some(10));
        assert!(spawn.stage_for_level(100).is_none());
    }

    #[test]
    fn talent_lookup_finds_nodes_by_id() {
        let tables = GameTables::starter();
        let node = tables.talent(TalentId::new(3));
        assert_eq!(node.buff, "antennae");
        assert_eq!(node.prev, Some(TalentId::new(1)));
    }

    #[test]
    fn spawn_config_round_trips_through_bincode() {
        let spawn = starter_spawn();
        let bytes = bincode::serialize(&spawn).expect("serialize");
        let restored: SpawnConfig = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(restored, spawn);
    }
}
