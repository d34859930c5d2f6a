#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Petal Defence engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters submit [`Command`] values
//! describing desired mutations, the world executes those commands via its
//! `apply` entry point, and then broadcasts [`Event`] values for systems and
//! presentation layers to react to deterministically. Systems consume event
//! streams, query immutable snapshots, and respond exclusively with new
//! command batches.

use std::time::Duration;

use serde::{Deserialize, Serialize};

mod tables;

pub use tables::{
    GameTables, JitterConfig, MobAttribs, MobStats, OscillatorConfig, SpawnConfig, SpawnEntry,
    SpawnStage, TalentSpec, TowerAttribs, TowerStats,
};

/// Number of grid rows in the map.
pub const GRID_ROWS: u32 = 11;
/// Number of grid columns in the map.
pub const GRID_COLUMNS: u32 = 10;
/// Side length of a single grid square in world units.
pub const SQUARE_SIZE: f32 = 100.0;
/// Path position at which a mob reaches the player.
pub const PATH_END: f32 = 39.0;
/// Fixed interval of the discrete simulation tick.
pub const TICK_INTERVAL: Duration = Duration::from_millis(125);

/// Rarity tiers in ascending order of power.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    /// Lowest tier.
    Common,
    /// Second tier.
    Unusual,
    /// Third tier.
    Rare,
    /// Fourth tier.
    Epic,
    /// Fifth tier.
    Legendary,
    /// Sixth tier.
    Mythic,
    /// Seventh tier.
    Ultra,
    /// Eighth tier.
    Super,
    /// Highest tier; cards only, never mobs.
    Unique,
}

impl Rarity {
    /// All rarities in ascending order.
    pub const ALL: [Rarity; 9] = [
        Rarity::Common,
        Rarity::Unusual,
        Rarity::Rare,
        Rarity::Epic,
        Rarity::Legendary,
        Rarity::Mythic,
        Rarity::Ultra,
        Rarity::Super,
        Rarity::Unique,
    ];

    /// Numeric level used for buff/debuff source precedence, 1..=9.
    #[must_use]
    pub const fn level(self) -> u8 {
        self as u8 + 1
    }

    /// Resistance factor applied to incoming slow-down debuffs.
    #[must_use]
    pub const fn slow_resistance(self) -> f32 {
        match self {
            Rarity::Common => 1.0,
            Rarity::Unusual => 0.95,
            Rarity::Rare => 0.9,
            Rarity::Epic => 0.8,
            Rarity::Legendary => 0.7,
            Rarity::Mythic => 0.6,
            Rarity::Ultra => 0.5,
            Rarity::Super | Rarity::Unique => 0.3,
        }
    }

    /// Resistance factor applied to incoming knockback impulses.
    #[must_use]
    pub const fn knockback_resistance(self) -> f32 {
        match self {
            Rarity::Common => 1.0,
            Rarity::Unusual => 0.9,
            Rarity::Rare => 0.8,
            Rarity::Epic => 0.7,
            Rarity::Legendary => 0.6,
            Rarity::Mythic => 0.5,
            Rarity::Ultra => 0.3,
            Rarity::Super | Rarity::Unique => 0.1,
        }
    }

    /// Sprite scale applied to mobs of this rarity.
    #[must_use]
    pub const fn mob_scale(self) -> f32 {
        match self {
            Rarity::Common => 0.12,
            Rarity::Unusual => 0.2,
            Rarity::Rare => 0.28,
            Rarity::Epic => 0.4,
            Rarity::Legendary => 0.5,
            Rarity::Mythic => 0.6,
            Rarity::Ultra => 0.76,
            Rarity::Super | Rarity::Unique => 1.0,
        }
    }
}

/// Broad behavioural family a tower belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TowerCategory {
    /// Fires targeting petals at mobs in range.
    Shoot,
    /// Fires one petal at each of several nearest mobs.
    MultiShoot,
    /// Maintains a stationary petal on its own path square.
    Defence,
    /// Summons friendly mob petals that march back along the path.
    Summon,
    /// Contributes to the player's buff group while active.
    Buff,
}

/// Damage delivery semantics of a petal hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    /// Armor is subtracted from the damage, clamped at zero.
    Normal,
    /// Armor is ignored entirely.
    Lightning,
}

/// Closed set of placeable tower card types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TowerType {
    /// Plain single-target shooter.
    Basic,
    /// Fast homing projectile shooter.
    Missile,
    /// Short-range high-damage shooter.
    Stinger,
    /// Shooter whose petals gain damage per adjacent same-card tower.
    Triangle,
    /// Shooter whose petals chain-damage a cluster of mobs.
    Lightning,
    /// Square-bound beam that ramps damage on a held target.
    Laser,
    /// Shooter whose petals roll rare critical damage.
    Dice,
    /// Shooter whose petals roll a chance to be shrugged off entirely.
    Chip,
    /// Multi-target shooter.
    Dahlia,
    /// Slowing web laid on the tower's path square.
    Web,
    /// Pollen cloud laid on the tower's path square.
    Pollen,
    /// Blocking petal laid on the tower's path square.
    Shovel,
    /// Summons ant soldiers.
    AntEgg,
    /// Summons beetles.
    BeetleEgg,
    /// Gates flower buffs and raises the antennae level.
    Antennae,
    /// Flower buff that heals the player while active.
    Rose,
    /// Flower buff raising reload speed.
    Cutter,
    /// Flower buff granting passive healing.
    Leaf,
    /// Flower buff raising damage.
    Amulet,
    /// Buff tower that mints coin while active.
    Coin,
}

impl TowerType {
    /// All tower types in declaration order.
    pub const ALL: [TowerType; 20] = [
        TowerType::Basic,
        TowerType::Missile,
        TowerType::Stinger,
        TowerType::Triangle,
        TowerType::Lightning,
        TowerType::Laser,
        TowerType::Dice,
        TowerType::Chip,
        TowerType::Dahlia,
        TowerType::Web,
        TowerType::Pollen,
        TowerType::Shovel,
        TowerType::AntEgg,
        TowerType::BeetleEgg,
        TowerType::Antennae,
        TowerType::Rose,
        TowerType::Cutter,
        TowerType::Leaf,
        TowerType::Amulet,
        TowerType::Coin,
    ];

    /// Behavioural family of the tower, fixed at creation.
    #[must_use]
    pub const fn category(self) -> TowerCategory {
        match self {
            TowerType::Basic
            | TowerType::Missile
            | TowerType::Stinger
            | TowerType::Triangle
            | TowerType::Lightning
            | TowerType::Laser
            | TowerType::Dice
            | TowerType::Chip => TowerCategory::Shoot,
            TowerType::Dahlia => TowerCategory::MultiShoot,
            TowerType::Web | TowerType::Pollen | TowerType::Shovel => TowerCategory::Defence,
            TowerType::AntEgg | TowerType::BeetleEgg => TowerCategory::Summon,
            TowerType::Antennae
            | TowerType::Rose
            | TowerType::Cutter
            | TowerType::Leaf
            | TowerType::Amulet
            | TowerType::Coin => TowerCategory::Buff,
        }
    }

    /// Square category required to host a tower of this type.
    #[must_use]
    pub const fn required_square(self) -> SquareCategory {
        match self.category() {
            TowerCategory::Defence => SquareCategory::Trail,
            TowerCategory::Buff => SquareCategory::Slot,
            TowerCategory::Shoot | TowerCategory::MultiShoot | TowerCategory::Summon => {
                SquareCategory::Grass
            }
        }
    }

    /// Damage delivery semantics of petals produced by this tower.
    #[must_use]
    pub const fn damage_type(self) -> DamageType {
        match self {
            TowerType::Lightning | TowerType::Laser => DamageType::Lightning,
            _ => DamageType::Normal,
        }
    }

    /// Mob card summoned by a summon-category tower of the given rarity.
    ///
    /// Summon rarity is capped below the card rarity at the top tiers.
    #[must_use]
    pub const fn summoned_mob(self, rarity: Rarity) -> Option<MobCard> {
        let mob = match self {
            TowerType::AntEgg => MobType::AntSoldier,
            TowerType::BeetleEgg => MobType::Beetle,
            _ => return None,
        };
        let capped = match rarity {
            Rarity::Ultra => Rarity::Mythic,
            Rarity::Super | Rarity::Unique => Rarity::Ultra,
            other => other,
        };
        Some(MobCard { rarity: capped, mob })
    }
}

/// Closed set of mob types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MobType {
    /// Plain walker.
    Bee,
    /// Walker that spins while moving.
    Spider,
    /// Ranged mob that periodically turns back and launches missiles.
    Hornet,
    /// Walker alternating rest and sprint phases.
    Roach,
    /// Weaving walker with a chance to evade normal damage.
    Fly,
    /// Summon emitted by ant eggs; hostile when spawned by stages.
    AntSoldier,
    /// Summon emitted by beetle eggs; hostile when spawned by stages.
    Beetle,
    /// Projectile mob launched by hornets.
    Missile,
}

/// Identity of a placeable card: `(rarity, type)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Card {
    /// Rarity tier of the card.
    pub rarity: Rarity,
    /// Tower type of the card.
    pub tower: TowerType,
}

impl Card {
    /// Creates a new card identity.
    #[must_use]
    pub const fn new(rarity: Rarity, tower: TowerType) -> Self {
        Self { rarity, tower }
    }
}

/// Identity of a mob: `(rarity, type)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MobCard {
    /// Rarity tier of the mob.
    pub rarity: Rarity,
    /// Type of the mob.
    pub mob: MobType,
}

impl MobCard {
    /// Creates a new mob identity.
    #[must_use]
    pub const fn new(rarity: Rarity, mob: MobType) -> Self {
        Self { rarity, mob }
    }
}

/// Static placement rule attached to each grid square.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SquareCategory {
    /// Accepts shoot, multi-shoot and summon towers.
    Grass,
    /// Part of the mob path; accepts defence towers only.
    Trail,
    /// Accepts nothing.
    Obstacle,
    /// Accepts buff towers only.
    Slot,
}

/// Location of a single grid square expressed as row and column indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SquareCoord {
    row: u32,
    column: u32,
}

impl SquareCoord {
    /// Creates a new grid square coordinate.
    #[must_use]
    pub const fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }

    /// Zero-based row index of the square.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Zero-based column index of the square.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Reports whether the square lies within the fixed grid bounds.
    #[must_use]
    pub const fn in_bounds(&self) -> bool {
        self.row < GRID_ROWS && self.column < GRID_COLUMNS
    }

    /// Center of the square in world units.
    #[must_use]
    pub fn center(&self) -> WorldPoint {
        WorldPoint::new(
            self.column as f32 * SQUARE_SIZE + SQUARE_SIZE / 2.0,
            self.row as f32 * SQUARE_SIZE + SQUARE_SIZE / 2.0,
        )
    }
}

/// Canonical mob path through the grid, ordered from spawn to the player.
///
/// The continuous path position `p` in `[0, 39]` places a mob between the
/// centers of `PATH_SQUARES[floor(p)]` and the following square.
pub const PATH_SQUARES: [SquareCoord; 39] = [
    SquareCoord::new(5, 0),
    SquareCoord::new(5, 1),
    SquareCoord::new(5, 2),
    SquareCoord::new(4, 2),
    SquareCoord::new(3, 2),
    SquareCoord::new(2, 2),
    SquareCoord::new(1, 2),
    SquareCoord::new(1, 3),
    SquareCoord::new(1, 4),
    SquareCoord::new(2, 4),
    SquareCoord::new(3, 4),
    SquareCoord::new(4, 4),
    SquareCoord::new(5, 4),
    SquareCoord::new(6, 4),
    SquareCoord::new(7, 4),
    SquareCoord::new(7, 3),
    SquareCoord::new(7, 2),
    SquareCoord::new(7, 1),
    SquareCoord::new(8, 1),
    SquareCoord::new(9, 1),
    SquareCoord::new(9, 2),
    SquareCoord::new(9, 3),
    SquareCoord::new(9, 4),
    SquareCoord::new(9, 5),
    SquareCoord::new(9, 6),
    SquareCoord::new(9, 7),
    SquareCoord::new(9, 8),
    SquareCoord::new(8, 8),
    SquareCoord::new(7, 8),
    SquareCoord::new(6, 8),
    SquareCoord::new(6, 7),
    SquareCoord::new(6, 6),
    SquareCoord::new(5, 6),
    SquareCoord::new(4, 6),
    SquareCoord::new(3, 6),
    SquareCoord::new(2, 6),
    SquareCoord::new(2, 7),
    SquareCoord::new(2, 8),
    SquareCoord::new(2, 9),
];

/// Squares reserved for buff towers.
pub const SLOT_SQUARES: [SquareCoord; 6] = [
    SquareCoord::new(0, 0),
    SquareCoord::new(0, 5),
    SquareCoord::new(0, 9),
    SquareCoord::new(10, 0),
    SquareCoord::new(10, 5),
    SquareCoord::new(10, 9),
];

/// Squares that never accept any placement.
pub const OBSTACLE_SQUARES: [SquareCoord; 3] = [
    SquareCoord::new(3, 0),
    SquareCoord::new(8, 5),
    SquareCoord::new(4, 8),
];

/// A point in continuous world space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldPoint {
    /// Horizontal coordinate in world units.
    pub x: f32,
    /// Vertical coordinate in world units.
    pub y: f32,
}

impl WorldPoint {
    /// Creates a new world point.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    #[must_use]
    pub fn distance_squared(&self, other: WorldPoint) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        dx * dx + dy * dy
    }
}

/// Identifier of a talent node within the talent table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TalentId(u32);

impl TalentId {
    /// Creates a new talent identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Advances the simulation by one frame of wall-clock time.
    ///
    /// The world performs the continuous per-frame update and, once the
    /// internal accumulator reaches [`TICK_INTERVAL`], exactly one discrete
    /// combat/economy tick.
    Advance {
        /// Duration of simulated time that elapsed since the previous frame.
        dt: Duration,
    },
    /// Requests placement of a card onto the provided square.
    PlaceCard {
        /// Square that should host the new tower.
        square: SquareCoord,
        /// Card identity to place.
        card: Card,
    },
    /// Requests placement of a card onto the first square that accepts it.
    ///
    /// Defence cards scan path squares in canonical path order; everything
    /// else scans the grid row-major. Nothing happens when the board has no
    /// free square for the card.
    DeployCard {
        /// Card identity to place.
        card: Card,
    },
    /// Requests that the tower on the provided square return to the hand.
    PickUpCard {
        /// Square currently hosting the tower.
        square: SquareCoord,
    },
    /// Requests removal of every placed copy of a card back to the backpack.
    ReturnCards {
        /// Card identity to collect.
        card: Card,
    },
    /// Requests the purchase of a talent node.
    PurchaseTalent {
        /// Identifier of the node to purchase.
        talent: TalentId,
    },
    /// Requests that a mob enter the path at position zero.
    SpawnMob {
        /// Identity of the mob to spawn.
        mob: MobCard,
    },
}

/// Reasons a card placement request may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlacementError {
    /// The requested square lies outside the grid.
    OutOfBounds,
    /// Obstacle squares never accept anything.
    Obstacle,
    /// The square's category does not match the card's requirement.
    WrongCategory,
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the simulation clock advanced by a frame.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the frame.
        dt: Duration,
    },
    /// Confirms that a discrete combat tick ran during the frame.
    TickCompleted,
    /// Confirms that a tower was placed onto a square.
    TowerPlaced {
        /// Square hosting the new tower.
        square: SquareCoord,
        /// Card identity of the tower.
        card: Card,
    },
    /// Confirms that a tower was removed from a square.
    TowerRemoved {
        /// Square the tower previously occupied.
        square: SquareCoord,
        /// Card identity of the removed tower.
        card: Card,
    },
    /// Reports that a placement request was rejected.
    PlacementRejected {
        /// Square provided in the placement request.
        square: SquareCoord,
        /// Card provided in the placement request.
        card: Card,
        /// Specific reason the placement failed.
        reason: PlacementError,
    },
    /// Confirms that every placed copy of a card returned to the backpack.
    CardsReturned {
        /// Card identity that was collected.
        card: Card,
        /// Number of towers removed from the grid.
        count: u32,
    },
    /// Confirms that a mob entered the path.
    MobSpawned {
        /// Identity of the new mob.
        mob: MobCard,
    },
    /// Reports that a mob died and dropped rewards.
    MobDied {
        /// Identity of the dead mob.
        mob: MobCard,
        /// Coin awarded to the player.
        coin: i64,
        /// Experience awarded to the player.
        xp: i64,
    },
    /// Reports damage dealt to the player by a mob at the path end.
    PlayerDamaged {
        /// Damage subtracted from the player's hit points.
        damage: i32,
    },
    /// Reports that the player's level increased.
    PlayerLevelledUp {
        /// Level reached after the increase.
        level: u32,
    },
    /// Confirms that a talent node was purchased.
    TalentPurchased {
        /// Identifier of the purchased node.
        talent: TalentId,
    },
    /// Reports a resolved chain-lightning strike for presentation.
    ChainLightning {
        /// Origin of the strike in world units.
        origin: WorldPoint,
        /// Positions of the struck mobs, nearest first.
        positions: Vec<WorldPoint>,
    },
}
