//! Petals: the transient combat entities towers emit.
//!
//! Three families share the struct: projectile-like petals steering toward a
//! target mob, square-bound defence petals occupying one path square, and
//! summoned mob petals marching backward along the path as friendly units.
//! Specialized behaviour (lightning bounce, laser ramp, dice crits, chip
//! misses) keys off the card type at the damage and resolution hooks.

use std::f32::consts::PI;
use std::time::Duration;

use petal_defence_core::{
    Card, DamageType, GameTables, MobCard, SquareCoord, TowerType, WorldPoint, GRID_COLUMNS,
    GRID_ROWS, SQUARE_SIZE,
};
use rand::Rng;

use crate::buff::{BuffGroup, DebuffBag, DurationDebuff, OneShotDebuff};
use crate::mob::{path_point, MobHandle};

/// Maximum steering turn rate of a projectile petal, in degrees per second.
pub const MAX_TURN_DEG_PER_SEC: f32 = 540.0;
/// Positional dead zone inside which steering stops, in world units.
pub const STEERING_DEAD_ZONE: f32 = 3.0;
/// Idle spin rate of a defence petal, in degrees per second.
pub const DEFENCE_SPIN_DEG_PER_SEC: f32 = 180.0;
/// Duration of the slow inflicted by a web on contact.
pub const WEB_SLOW_DURATION: Duration = Duration::from_millis(200);

/// Projectile petal state.
#[derive(Clone, Debug)]
pub struct ShootState {
    /// Firing position, anchoring the range check.
    pub start: WorldPoint,
    /// Current position in world units.
    pub position: WorldPoint,
    /// Current heading in radians.
    pub direction: f32,
    /// Target mob; dropped when the handle goes stale.
    pub target: Option<MobHandle>,
    /// Adjacent same-card towers at fire time (triangle bonus).
    pub adjacent: u32,
}

/// Square-bound defence petal state.
#[derive(Clone, Debug)]
pub struct DefenceState {
    /// Path square the petal occupies.
    pub square: SquareCoord,
    /// Time alive; webs and pollen expire against their duration attribute.
    pub age: Duration,
    /// Idle spin in degrees, cosmetic.
    pub spin_deg: f32,
}

/// Laser petal state: bound to its tower's square, ramping on a held target.
#[derive(Clone, Debug)]
pub struct LaserState {
    /// Square of the owning tower.
    pub square: SquareCoord,
    /// Currently held target.
    pub target: Option<MobHandle>,
    /// Seconds the current target has been held.
    pub held: f32,
}

/// Summoned mob petal state.
#[derive(Clone, Debug)]
pub struct SummonState {
    /// Mob identity backing the petal's stats.
    pub mob: MobCard,
    /// Path position, moving from the player back toward the spawn.
    pub position: f32,
}

/// Behavioural family of a petal.
#[derive(Clone, Debug)]
pub enum PetalVariant {
    /// Projectile steering toward a mob.
    Shoot(ShootState),
    /// Stationary petal on a path square.
    Defence(DefenceState),
    /// Square-bound ramping beam.
    Laser(LaserState),
    /// Friendly mob marching backward along the path.
    Summon(SummonState),
}

/// A live petal.
#[derive(Clone, Debug)]
pub struct Petal {
    card: Card,
    hp: i32,
    /// Family-specific state.
    pub variant: PetalVariant,
}

impl Petal {
    /// Fires a projectile petal from a tower toward a target.
    pub fn shoot(
        card: Card,
        tables: &GameTables,
        start: WorldPoint,
        target_point: WorldPoint,
        target: MobHandle,
        adjacent: u32,
    ) -> Self {
        let dx = target_point.x - start.x;
        let dy = target_point.y - start.y;
        let direction = if dx != 0.0 || dy != 0.0 {
            dy.atan2(dx)
        } else {
            0.0
        };
        Self {
            card,
            hp: tables.tower(card).attrib("hp") as i32,
            variant: PetalVariant::Shoot(ShootState {
                start,
                position: start,
                direction,
                target: Some(target),
                adjacent,
            }),
        }
    }

    /// Lays a defence petal on a path square.
    pub fn defence(card: Card, tables: &GameTables, square: SquareCoord) -> Self {
        Self {
            card,
            hp: tables.tower(card).attrib("hp") as i32,
            variant: PetalVariant::Defence(DefenceState {
                square,
                age: Duration::ZERO,
                spin_deg: 0.0,
            }),
        }
    }

    /// Binds a laser petal to its tower's square.
    pub fn laser(card: Card, tables: &GameTables, square: SquareCoord) -> Self {
        Self {
            card,
            hp: tables.tower(card).attrib("hp") as i32,
            variant: PetalVariant::Laser(LaserState {
                square,
                target: None,
                held: 0.0,
            }),
        }
    }

    /// Summons a friendly mob petal at the path end.
    ///
    /// # Panics
    ///
    /// Panics when the card is not a summon-category card.
    pub fn summon(card: Card, tables: &GameTables) -> Self {
        let mob = card
            .tower
            .summoned_mob(card.rarity)
            .unwrap_or_else(|| panic!("{:?} is not a summon card", card.tower));
        Self {
            card,
            hp: tables.mob(mob).hp,
            variant: PetalVariant::Summon(SummonState {
                mob,
                position: petal_defence_core::PATH_END,
            }),
        }
    }

    /// Card identity of the emitting tower.
    #[must_use]
    pub fn card(&self) -> Card {
        self.card
    }

    /// Remaining hit points.
    #[must_use]
    pub fn hp(&self) -> i32 {
        self.hp
    }

    /// Reports whether the petal is dead.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.hp <= 0
    }

    /// Kills the petal outright.
    pub fn kill(&mut self) {
        self.hp = 0;
    }

    /// Position of the petal in world units.
    #[must_use]
    pub fn world_point(&self) -> WorldPoint {
        match &self.variant {
            PetalVariant::Shoot(state) => state.position,
            PetalVariant::Defence(state) => state.square.center(),
            PetalVariant::Laser(state) => state.square.center(),
            PetalVariant::Summon(state) => path_point(state.position),
        }
    }

    /// Effective armor; webs shrug off all contact damage.
    #[must_use]
    pub fn armor(&self, tables: &GameTables) -> i32 {
        if self.card.tower == TowerType::Web {
            return i32::MAX;
        }
        if let PetalVariant::Summon(state) = &self.variant {
            return tables.mob(state.mob).armor;
        }
        tables.tower(self.card).attrib_or("armor", 0.0) as i32
    }

    /// Damage dealt on a hit, with variant-specific bonuses rolled in.
    pub fn damage<R: Rng>(&self, tables: &GameTables, buffs: &BuffGroup, rng: &mut R) -> i32 {
        if let PetalVariant::Summon(state) = &self.variant {
            return tables.mob(state.mob).damage;
        }
        let stats = tables.tower(self.card);
        let mut damage = buffs.damage.apply(stats.attrib("damage"));
        match self.card.tower {
            TowerType::Triangle => {
                if let PetalVariant::Shoot(state) = &self.variant {
                    damage += stats.attrib("damage_increase") * state.adjacent as f32;
                }
            }
            TowerType::Dice => {
                if rng.gen_range(0.0..1.0f32) <= stats.attrib("crit_prob") {
                    damage *= stats.attrib("crit_multiplier");
                }
            }
            TowerType::Laser => {
                if let PetalVariant::Laser(state) = &self.variant {
                    let ramp = (1.0 + stats.attrib("damage_ramp") * state.held)
                        .min(stats.attrib("max_ramp"));
                    damage *= ramp;
                }
            }
            _ => {}
        }
        damage as i32
    }

    /// Damage delivery semantics of this petal's hits.
    #[must_use]
    pub fn damage_type(&self) -> DamageType {
        self.card.tower.damage_type()
    }

    /// Applies a hit from a mob's contact damage.
    pub fn hit(&mut self, mut damage: i32, armor: i32) {
        if self.is_dead() {
            return;
        }
        damage = damage.saturating_sub(armor);
        if damage <= 0 {
            return;
        }
        self.hp -= damage;
    }

    /// Chip petals roll a chance that the mob shrugs the hit off entirely,
    /// as if it had infinite armor for that one hit.
    pub fn hit_misses<R: Rng>(&self, tables: &GameTables, rng: &mut R) -> bool {
        if self.card.tower != TowerType::Chip {
            return false;
        }
        rng.gen_range(0.0..1.0f32) <= tables.tower(self.card).attrib("miss_prob")
    }

    /// Inflicts this petal's on-hit debuff into a mob's bag under the
    /// rarity-override rule.
    pub fn apply_debuff(&self, tables: &GameTables, debuffs: &mut DebuffBag) {
        let stats = tables.tower(self.card);
        match self.card.tower {
            TowerType::Web => {
                debuffs.web_slow.swap(DurationDebuff::new(
                    stats.attrib("slow_down"),
                    self.card.rarity,
                    WEB_SLOW_DURATION,
                ));
            }
            TowerType::Pollen => {
                if let Some(slow) = stats.attribs.get("slow_down") {
                    debuffs.pollen_slow.swap(DurationDebuff::new(
                        *slow,
                        self.card.rarity,
                        WEB_SLOW_DURATION,
                    ));
                }
            }
            TowerType::Shovel => {
                debuffs.knockback.swap(OneShotDebuff::new(
                    stats.attrib("knock_back"),
                    self.card.rarity,
                ));
            }
            _ => {}
        }
    }

    /// Heals returned to the player when the petal dies.
    #[must_use]
    pub fn death_heal(&self, tables: &GameTables) -> f32 {
        tables.tower(self.card).attrib_or("death_heal", 0.0)
    }

    /// Remaining lifetime fraction of a timed defence petal, in `[0, 1]`.
    #[must_use]
    pub fn lifetime_delta(&self, tables: &GameTables) -> f32 {
        let PetalVariant::Defence(state) = &self.variant else {
            return 1.0;
        };
        let Some(duration) = tables.tower(self.card).attribs.get("duration") else {
            return 1.0;
        };
        (1.0 - state.age.as_secs_f32() / duration).max(0.0)
    }

    /// Advances the petal by one frame; `target_point` is the position of a
    /// still-valid target, if the petal holds one.
    ///
    /// Self-kills on bounds exit, range exhaustion, timed expiry, or (for
    /// summons) reaching the path start.
    pub fn update(
        &mut self,
        dt: Duration,
        tables: &GameTables,
        buffs: &BuffGroup,
        target_point: Option<WorldPoint>,
    ) {
        let card = self.card;
        let dt_secs = dt.as_secs_f32();
        let mut expired = false;
        match &mut self.variant {
            PetalVariant::Shoot(state) => {
                steer(state, target_point, dt_secs);
                let speed = buffs.speed.apply(tables.tower(card).attrib("speed")) * SQUARE_SIZE;
                state.position.x += state.direction.cos() * speed * dt_secs;
                state.position.y += state.direction.sin() * speed * dt_secs;

                if !in_bounds(state.position) {
                    expired = true;
                } else {
                    let travelled = state.start.distance_squared(state.position);
                    let range = tables.tower(card).attrib("range") * SQUARE_SIZE;
                    if travelled > range * range {
                        expired = true;
                    }
                }
            }
            PetalVariant::Defence(state) => {
                state.age = state.age.saturating_add(dt);
                state.spin_deg = (state.spin_deg + DEFENCE_SPIN_DEG_PER_SEC * dt_secs) % 360.0;
            }
            PetalVariant::Laser(state) => {
                if state.target.is_some() {
                    state.held += dt_secs;
                } else {
                    state.held = 0.0;
                }
            }
            PetalVariant::Summon(state) => {
                let speed = buffs.speed.apply(tables.mob(state.mob).speed);
                state.position = (state.position - dt_secs * speed).max(0.0);
                if state.position <= 0.0 {
                    expired = true;
                }
            }
        }
        if !expired && matches!(self.variant, PetalVariant::Defence(_)) {
            expired = self.lifetime_delta(tables) == 0.0;
        }
        if expired {
            self.kill();
        }
    }

    /// Drops the target when it matches the given handle.
    pub fn lose_target(&mut self, handle: MobHandle) {
        match &mut self.variant {
            PetalVariant::Shoot(state) => {
                if state.target == Some(handle) {
                    state.target = None;
                }
            }
            PetalVariant::Laser(state) => {
                if state.target == Some(handle) {
                    state.target = None;
                    state.held = 0.0;
                }
            }
            _ => {}
        }
    }

    /// Collision sprite scale of the petal.
    #[must_use]
    pub fn sprite_scale(&self) -> f32 {
        match &self.variant {
            PetalVariant::Summon(state) => state.mob.rarity.mob_scale() * 1.5,
            _ => match self.card.tower {
                TowerType::Web => 1.0,
                _ => 0.32,
            },
        }
    }
}

fn steer(state: &mut ShootState, target_point: Option<WorldPoint>, dt_secs: f32) {
    let Some(target) = target_point else {
        return;
    };
    let dx = target.x - state.position.x;
    let dy = target.y - state.position.y;
    if dx.abs() <= STEERING_DEAD_ZONE && dy.abs() <= STEERING_DEAD_ZONE {
        return;
    }

    let desired = dy.atan2(dx);
    let mut diff = desired - state.direction;
    while diff <= -PI {
        diff += 2.0 * PI;
    }
    while diff > PI {
        diff -= 2.0 * PI;
    }

    let max_step = MAX_TURN_DEG_PER_SEC.to_radians() * dt_secs;
    state.direction += diff.clamp(-max_step, max_step);
}

fn in_bounds(point: WorldPoint) -> bool {
    point.x >= 0.0
        && point.y >= 0.0
        && point.x <= GRID_COLUMNS as f32 * SQUARE_SIZE
        && point.y <= GRID_ROWS as f32 * SQUARE_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mob::{Mob, MobArena};
    use petal_defence_core::{MobType, Rarity};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn handle(tables: &GameTables, rng: &mut ChaCha8Rng) -> MobHandle {
        let mut arena = MobArena::new();
        arena.insert(Mob::new(
            MobCard::new(Rarity::Common, MobType::Bee),
            tables,
            5.0,
            rng,
        ))
    }

    #[test]
    fn shoot_petal_dies_beyond_its_range() {
        let tables = GameTables::starter();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let card = Card::new(Rarity::Common, TowerType::Basic);
        let target = handle(&tables, &mut rng);
        let mut petal = Petal::shoot(
            card,
            &tables,
            WorldPoint::new(500.0, 500.0),
            WorldPoint::new(900.0, 500.0),
            target,
            0,
        );
        let buffs = BuffGroup::default();
        // Fly straight with no live target until the range check trips.
        for _ in 0..40 {
            petal.update(Duration::from_millis(125), &tables, &buffs, None);
        }
        assert!(petal.is_dead());
    }

    #[test]
    fn steering_is_suppressed_inside_the_dead_zone() {
        let mut state = ShootState {
            start: WorldPoint::new(0.0, 0.0),
            position: WorldPoint::new(100.0, 100.0),
            direction: 0.0,
            target: None,
            adjacent: 0,
        };
        steer(&mut state, Some(WorldPoint::new(101.0, 102.0)), 0.125);
        assert_eq!(state.direction, 0.0);

        steer(&mut state, Some(WorldPoint::new(100.0, 200.0)), 0.125);
        assert!(state.direction > 0.0);
    }

    #[test]
    fn steering_turn_rate_is_bounded() {
        let mut state = ShootState {
            start: WorldPoint::new(0.0, 0.0),
            position: WorldPoint::new(0.0, 0.0),
            direction: 0.0,
            target: None,
            adjacent: 0,
        };
        // Target directly behind; one short frame cannot turn 180 degrees.
        steer(&mut state, Some(WorldPoint::new(-100.0, 0.0)), 0.05);
        let max_step = MAX_TURN_DEG_PER_SEC.to_radians() * 0.05;
        assert!(state.direction.abs() <= max_step + 1e-6);
        assert!(state.direction.abs() < PI);
    }

    #[test]
    fn triangle_damage_scales_with_adjacency() {
        let tables = GameTables::starter();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let card = Card::new(Rarity::Common, TowerType::Triangle);
        let target = handle(&tables, &mut rng);
        let buffs = BuffGroup::default();

        let lone = Petal::shoot(
            card,
            &tables,
            WorldPoint::new(0.0, 0.0),
            WorldPoint::new(10.0, 0.0),
            target,
            0,
        );
        let flanked = Petal::shoot(
            card,
            &tables,
            WorldPoint::new(0.0, 0.0),
            WorldPoint::new(10.0, 0.0),
            target,
            2,
        );
        let base = tables.tower(card).attrib("damage") as i32;
        let bonus = tables.tower(card).attrib("damage_increase") as i32;
        assert_eq!(lone.damage(&tables, &buffs, &mut rng), base);
        assert_eq!(flanked.damage(&tables, &buffs, &mut rng), base + 2 * bonus);
    }

    #[test]
    fn web_petal_expires_after_its_duration() {
        let tables = GameTables::starter();
        let card = Card::new(Rarity::Common, TowerType::Web);
        let mut petal = Petal::defence(card, &tables, SquareCoord::new(5, 0));
        let buffs = BuffGroup::default();
        let duration = tables.tower(card).attrib("duration");

        petal.update(Duration::from_secs_f32(duration / 2.0), &tables, &buffs, None);
        assert!(!petal.is_dead());
        assert!(petal.lifetime_delta(&tables) > 0.0);

        petal.update(Duration::from_secs_f32(duration), &tables, &buffs, None);
        assert!(petal.is_dead());
    }

    #[test]
    fn web_contact_damage_is_always_absorbed() {
        let tables = GameTables::starter();
        let card = Card::new(Rarity::Common, TowerType::Web);
        let mut petal = Petal::defence(card, &tables, SquareCoord::new(5, 0));
        petal.hit(1_000_000, petal.armor(&tables));
        assert!(!petal.is_dead());
    }

    #[test]
    fn summon_petal_marches_back_and_expires_at_the_spawn() {
        let tables = GameTables::starter();
        let card = Card::new(Rarity::Common, TowerType::AntEgg);
        let mut petal = Petal::summon(card, &tables);
        let buffs = BuffGroup::default();

        let start = match &petal.variant {
            PetalVariant::Summon(state) => state.position,
            _ => unreachable!(),
        };
        assert_eq!(start, petal_defence_core::PATH_END);

        for _ in 0..10_000 {
            petal.update(Duration::from_millis(125), &tables, &buffs, None);
            if petal.is_dead() {
                break;
            }
        }
        assert!(petal.is_dead());
    }

    #[test]
    fn laser_ramp_is_capped() {
        let tables = GameTables::starter();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let card = Card::new(Rarity::Common, TowerType::Laser);
        let mut petal = Petal::laser(card, &tables, SquareCoord::new(0, 1));
        let buffs = BuffGroup::default();
        let stats = tables.tower(card);

        if let PetalVariant::Laser(state) = &mut petal.variant {
            state.target = Some(handle(&tables, &mut rng));
            state.held = 1_000.0;
        }
        let capped = (stats.attrib("damage") * stats.attrib("max_ramp")) as i32;
        assert_eq!(petal.damage(&tables, &buffs, &mut rng), capped);
    }
}
