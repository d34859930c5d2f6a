//! Mobs: path movement, knockback blending, behavioural variants, and the
//! generation-counted arena that petals hold target handles into.

use std::time::Duration;

use petal_defence_core::{
    DamageType, GameTables, MobCard, MobType, WorldPoint, PATH_END, PATH_SQUARES, SQUARE_SIZE,
};
use rand::Rng;

use crate::buff::{apply_armor_break, apply_slow, DebuffBag};

/// Knockback magnitude below which the impulse has no effect.
pub const KNOCKBACK_THRESHOLD: f32 = 0.5;
/// Knockback magnitude at which forward motion is fully suppressed.
pub const KNOCKBACK_BLEND_RANGE: f32 = 3.0;
/// Per-second retention factor of the knockback magnitude.
pub const KNOCKBACK_DECAY_FACTOR: f32 = 0.02;

/// Stable handle to a mob slot; stays invalid after the mob is removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MobHandle {
    index: u32,
    generation: u32,
}

#[derive(Clone, Debug)]
struct Slot {
    generation: u32,
    mob: Option<Mob>,
}

/// Arena of live mobs with generation-counted handles.
///
/// Removing a mob bumps its slot generation, so a stale handle held by an
/// in-flight petal fails the validity check instead of aliasing a newcomer.
#[derive(Clone, Debug, Default)]
pub struct MobArena {
    slots: Vec<Slot>,
    live: usize,
}

impl MobArena {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live mobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Reports whether no mobs are alive.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Inserts a mob, reusing a free slot when one exists.
    pub fn insert(&mut self, mob: Mob) -> MobHandle {
        self.live += 1;
        if let Some(index) = self.slots.iter().position(|slot| slot.mob.is_none()) {
            self.slots[index].mob = Some(mob);
            return MobHandle {
                index: index as u32,
                generation: self.slots[index].generation,
            };
        }
        self.slots.push(Slot {
            generation: 0,
            mob: Some(mob),
        });
        MobHandle {
            index: (self.slots.len() - 1) as u32,
            generation: 0,
        }
    }

    /// Mob behind a handle, if the handle is still valid.
    #[must_use]
    pub fn get(&self, handle: MobHandle) -> Option<&Mob> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.mob.as_ref())
    }

    /// Mutable mob behind a handle, if the handle is still valid.
    #[must_use]
    pub fn get_mut(&mut self, handle: MobHandle) -> Option<&mut Mob> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.mob.as_mut())
    }

    /// Removes the mob behind a handle, invalidating all copies of it.
    pub fn remove(&mut self, handle: MobHandle) -> Option<Mob> {
        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)?;
        let mob = slot.mob.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.live -= 1;
        Some(mob)
    }

    /// Live mobs with their handles.
    pub fn iter(&self) -> impl Iterator<Item = (MobHandle, &Mob)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.mob.as_ref().map(|mob| {
                (
                    MobHandle {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    mob,
                )
            })
        })
    }

    /// Mutable variant of [`MobArena::iter`].
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (MobHandle, &mut Mob)> {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            let generation = slot.generation;
            slot.mob.as_mut().map(move |mob| {
                (
                    MobHandle {
                        index: index as u32,
                        generation,
                    },
                    mob,
                )
            })
        })
    }

    /// Handles of all live mobs.
    #[must_use]
    pub fn handles(&self) -> Vec<MobHandle> {
        self.iter().map(|(handle, _)| handle).collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum HornetState {
    Moving,
    TurningBack,
    WaitingBeforeShoot,
    Shooting,
    WaitingAfterShoot,
    TurningFront,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RoachState {
    Resting,
    SpeedUp,
    Running,
    SlowDown,
}

#[derive(Clone, Debug)]
enum Variant {
    Basic,
    Spider,
    Hornet {
        state: HornetState,
        clock: Duration,
        shoot_interval: f32,
        turn_deg: f32,
    },
    Roach {
        state: RoachState,
        clock: Duration,
        rest_time: f32,
        running_time: f32,
        speed: f32,
    },
    Fly {
        head_deg: f32,
    },
}

/// A live enemy walking the path toward the player.
#[derive(Clone, Debug)]
pub struct Mob {
    card: MobCard,
    position: f32,
    hp: i32,
    knockback: f32,
    rotation_offset_deg: f32,
    variant: Variant,
    /// Debuffs inflicted by combat; updated every frame.
    pub debuffs: DebuffBag,
}

impl Mob {
    /// Creates a mob at a path position, rolling variant timers.
    pub fn new<R: Rng>(
        card: MobCard,
        tables: &GameTables,
        position: f32,
        rng: &mut R,
    ) -> Self {
        let stats = tables.mob(card);
        let variant = match card.mob {
            MobType::Spider => Variant::Spider,
            MobType::Hornet => Variant::Hornet {
                state: HornetState::Moving,
                clock: Duration::ZERO,
                shoot_interval: roll_interval(
                    stats.attrib("shoot_interval"),
                    stats.attrib("shoot_interval_jitter"),
                    rng,
                ),
                turn_deg: 0.0,
            },
            MobType::Roach => Variant::Roach {
                state: RoachState::Resting,
                clock: Duration::ZERO,
                rest_time: roll_interval(
                    stats.attrib("rest_duration"),
                    stats.attrib("rest_duration_jitter"),
                    rng,
                ),
                running_time: roll_interval(
                    stats.attrib("running_duration"),
                    stats.attrib("running_duration_jitter"),
                    rng,
                ),
                speed: stats.speed,
            },
            MobType::Fly => Variant::Fly { head_deg: 0.0 },
            _ => Variant::Basic,
        };
        Self {
            card,
            position,
            hp: stats.hp,
            knockback: 0.0,
            rotation_offset_deg: 0.0,
            variant,
            debuffs: DebuffBag::default(),
        }
    }

    /// Identity of the mob.
    #[must_use]
    pub fn card(&self) -> MobCard {
        self.card
    }

    /// Continuous path position in `[0, 39]`.
    #[must_use]
    pub fn position(&self) -> f32 {
        self.position
    }

    /// Remaining hit points.
    #[must_use]
    pub fn hp(&self) -> i32 {
        self.hp
    }

    /// Reports whether the mob has run out of hit points.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.hp <= 0
    }

    /// Reports whether the mob stands at the path end.
    #[must_use]
    pub fn at_path_end(&self) -> bool {
        self.position >= PATH_END
    }

    /// Cosmetic rotation offset, in degrees, for presentation queries.
    #[must_use]
    pub fn rotation_offset_deg(&self) -> f32 {
        self.rotation_offset_deg
    }

    /// Position of the mob in world units.
    #[must_use]
    pub fn world_point(&self) -> WorldPoint {
        path_point(self.position)
    }

    /// Effective armor after armor debuffs.
    #[must_use]
    pub fn armor(&self, tables: &GameTables) -> i32 {
        let base = tables.mob(self.card).armor as f32;
        apply_armor_break(&self.debuffs.armor, base) as i32
    }

    /// Contact damage dealt to petals and the player.
    #[must_use]
    pub fn damage(&self, tables: &GameTables) -> i32 {
        tables.mob(self.card).damage
    }

    /// Applies a hit, honoring armor, damage type, and fly evasion.
    pub fn hit<R: Rng>(
        &mut self,
        mut damage: i32,
        damage_type: DamageType,
        tables: &GameTables,
        rng: &mut R,
    ) {
        if self.is_dead() {
            return;
        }
        if damage_type == DamageType::Normal {
            if let Variant::Fly { .. } = self.variant {
                let evasion = tables.mob(self.card).attrib("evasion");
                if rng.gen_range(0.0..1.0f32) <= evasion {
                    return;
                }
            }
            damage -= self.armor(tables);
            if damage <= 0 {
                return;
            }
        }
        self.hp -= damage;
    }

    /// Advances the mob by one frame: variant state machine, debuff timers,
    /// and path movement with knockback blending. Hornets push spawned
    /// missiles into `spawned`.
    pub fn update<R: Rng>(
        &mut self,
        dt: Duration,
        tables: &GameTables,
        rng: &mut R,
        spawned: &mut Vec<Mob>,
    ) {
        self.debuffs.update(dt);
        self.update_variant(dt, tables, rng, spawned);
        self.update_position(dt, tables);
    }

    fn update_variant<R: Rng>(
        &mut self,
        dt: Duration,
        tables: &GameTables,
        rng: &mut R,
        spawned: &mut Vec<Mob>,
    ) {
        let card = self.card;
        let position = self.position;
        let dt_secs = dt.as_secs_f32();
        match &mut self.variant {
            Variant::Basic => {}
            Variant::Spider => {
                let rotation = tables.mob(card).attrib("rotation_speed");
                self.rotation_offset_deg =
                    (self.rotation_offset_deg + rotation * dt_secs) % 360.0;
            }
            Variant::Hornet {
                state,
                clock,
                shoot_interval,
                turn_deg,
            } => {
                *clock = clock.saturating_add(dt);
                let stats = tables.mob(card);
                let rotation_speed = stats.attrib("rotation_speed");
                match state {
                    HornetState::Moving => {
                        // Never fires from the final stretch of the path.
                        if position < 36.0 && clock.as_secs_f32() >= *shoot_interval {
                            *state = HornetState::TurningBack;
                        }
                    }
                    HornetState::TurningBack => {
                        *turn_deg = (*turn_deg + rotation_speed * dt_secs).min(180.0);
                        if *turn_deg >= 180.0 {
                            *state = HornetState::WaitingBeforeShoot;
                            *clock = Duration::ZERO;
                        }
                    }
                    HornetState::WaitingBeforeShoot => {
                        if clock.as_secs_f32() >= stats.attrib("pre_shoot_delay") {
                            *state = HornetState::Shooting;
                        }
                    }
                    HornetState::Shooting => {
                        spawned.push(Mob::new(
                            MobCard::new(card.rarity, MobType::Missile),
                            tables,
                            position,
                            rng,
                        ));
                        *clock = Duration::ZERO;
                        *state = HornetState::WaitingAfterShoot;
                    }
                    HornetState::WaitingAfterShoot => {
                        if clock.as_secs_f32() >= stats.attrib("post_shoot_delay") {
                            *state = HornetState::TurningFront;
                        }
                    }
                    HornetState::TurningFront => {
                        *turn_deg = (*turn_deg - rotation_speed * dt_secs).max(0.0);
                        if *turn_deg <= 0.0 {
                            *state = HornetState::Moving;
                            *clock = Duration::ZERO;
                            *shoot_interval = roll_interval(
                                stats.attrib("shoot_interval"),
                                stats.attrib("shoot_interval_jitter"),
                                rng,
                            );
                        }
                    }
                }
                self.rotation_offset_deg = *turn_deg;
            }
            Variant::Roach {
                state,
                clock,
                rest_time,
                running_time,
                speed,
            } => {
                *clock = clock.saturating_add(dt);
                let stats = tables.mob(card);
                let base = stats.speed;
                let running = stats.attrib("running_speed");
                let elapsed = clock.as_secs_f32();
                match state {
                    RoachState::Resting => {
                        *speed = base;
                        if elapsed >= *rest_time {
                            *state = RoachState::SpeedUp;
                            *clock = Duration::ZERO;
                        }
                    }
                    RoachState::SpeedUp => {
                        let t = elapsed / stats.attrib("speed_up_duration");
                        if t >= 1.0 {
                            *speed = running;
                            *state = RoachState::Running;
                            *clock = Duration::ZERO;
                        } else {
                            *speed = base + (running - base) * t;
                        }
                    }
                    RoachState::Running => {
                        *speed = running;
                        if elapsed >= *running_time {
                            *state = RoachState::SlowDown;
                            *clock = Duration::ZERO;
                        }
                    }
                    RoachState::SlowDown => {
                        let t = elapsed / stats.attrib("slow_down_duration");
                        if t >= 1.0 {
                            *speed = base;
                            *state = RoachState::Resting;
                            *clock = Duration::ZERO;
                            *rest_time = roll_interval(
                                stats.attrib("rest_duration"),
                                stats.attrib("rest_duration_jitter"),
                                rng,
                            );
                            *running_time = roll_interval(
                                stats.attrib("running_duration"),
                                stats.attrib("running_duration_jitter"),
                                rng,
                            );
                        } else {
                            *speed = running + (base - running) * t;
                        }
                    }
                }
            }
            Variant::Fly { head_deg } => {
                let stats = tables.mob(card);
                let rotation_speed = stats.attrib("rotation_speed");
                let range = stats.attrib("rotation_range");
                let cycle = 4.0 * range;
                *head_deg = (*head_deg + rotation_speed * dt_secs) % cycle;
                self.rotation_offset_deg = if *head_deg < 2.0 * range {
                    -range + *head_deg
                } else {
                    3.0 * range - *head_deg
                };
            }
        }
    }

    fn update_position(&mut self, dt: Duration, tables: &GameTables) {
        let resistance = self.card.rarity.slow_resistance();
        let base = apply_slow(&self.debuffs.web_slow, self.forward_speed(tables), resistance);
        let base = apply_slow(&self.debuffs.pollen_slow, base, resistance);
        let mut speed = base;

        if self.knockback >= KNOCKBACK_THRESHOLD {
            let t = (self.knockback / KNOCKBACK_BLEND_RANGE).clamp(0.0, 1.0);
            let t = t * t * (3.0 - 2.0 * t);
            speed = base * (1.0 - t) - self.knockback;
        }

        let dt_secs = dt.as_secs_f32();
        self.position = (self.position + dt_secs * speed).clamp(0.0, PATH_END);

        let resisted = self
            .debuffs
            .knockback
            .take(self.card.rarity.knockback_resistance());
        self.knockback = self.knockback.max(resisted);
        if self.knockback >= KNOCKBACK_THRESHOLD {
            self.knockback *= KNOCKBACK_DECAY_FACTOR.powf(dt_secs);
            if self.knockback < KNOCKBACK_THRESHOLD {
                self.knockback = 0.0;
            }
        }
    }

    fn forward_speed(&self, tables: &GameTables) -> f32 {
        match &self.variant {
            Variant::Hornet { state, .. } => {
                if *state == HornetState::Moving {
                    tables.mob(self.card).speed
                } else {
                    0.0
                }
            }
            Variant::Roach { speed, .. } => *speed,
            _ => tables.mob(self.card).speed,
        }
    }
}

fn roll_interval<R: Rng>(base: f32, jitter: f32, rng: &mut R) -> f32 {
    if jitter > 0.0 {
        base + rng.gen_range(-jitter..jitter)
    } else {
        base
    }
}

/// World-space point of a continuous path position.
///
/// Position `p` sits between the centers of `PATH_SQUARES[floor(p)]` and the
/// following square; virtual squares just off both path ends keep the
/// interpolation defined at the boundaries.
#[must_use]
pub fn path_point(position: f32) -> WorldPoint {
    let count = PATH_SQUARES.len() as i32;
    let i = (position - 0.5 - 1e-3).floor() as i32;
    let (row0, col0) = if i >= 0 {
        let square = PATH_SQUARES[i as usize];
        (square.row() as f32, square.column() as f32)
    } else {
        (5.0, -1.0)
    };
    let (row1, col1) = if i + 1 < count {
        let square = PATH_SQUARES[(i + 1) as usize];
        (square.row() as f32, square.column() as f32)
    } else {
        (2.0, 10.0)
    };

    let t = position - i as f32 - 0.5;
    let x = (col0 + (col1 - col0) * t) * SQUARE_SIZE + SQUARE_SIZE / 2.0;
    let y = (row0 + (row1 - row0) * t) * SQUARE_SIZE + SQUARE_SIZE / 2.0;
    WorldPoint::new(x, y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use petal_defence_core::Rarity;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn tables() -> GameTables {
        GameTables::starter()
    }

    fn bee(tables: &GameTables, rng: &mut ChaCha8Rng) -> Mob {
        Mob::new(MobCard::new(Rarity::Common, MobType::Bee), tables, 0.0, rng)
    }

    #[test]
    fn stale_handles_fail_the_validity_check() {
        let tables = tables();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut arena = MobArena::new();
        let handle = arena.insert(bee(&tables, &mut rng));
        assert!(arena.get(handle).is_some());

        let _ = arena.remove(handle).expect("mob present");
        assert!(arena.get(handle).is_none());

        // The reused slot hands out a fresh generation.
        let replacement = arena.insert(bee(&tables, &mut rng));
        assert!(arena.get(handle).is_none());
        assert!(arena.get(replacement).is_some());
    }

    #[test]
    fn knockback_below_threshold_leaves_forward_speed_untouched() {
        let tables = tables();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut plain = bee(&tables, &mut rng);
        let mut nudged = bee(&tables, &mut rng);
        nudged.knockback = KNOCKBACK_THRESHOLD * 0.9;

        let dt = Duration::from_millis(125);
        plain.update_position(dt, &tables);
        nudged.update_position(dt, &tables);
        assert!((plain.position - nudged.position).abs() < 1e-6);
    }

    #[test]
    fn knockback_above_threshold_reduces_speed() {
        let tables = tables();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut plain = bee(&tables, &mut rng);
        let mut shoved = bee(&tables, &mut rng);
        plain.position = 5.0;
        shoved.position = 5.0;
        shoved.knockback = 2.0;

        let dt = Duration::from_millis(125);
        plain.update_position(dt, &tables);
        shoved.update_position(dt, &tables);
        assert!(shoved.position < plain.position);
    }

    #[test]
    fn knockback_decays_to_zero_below_threshold() {
        let tables = tables();
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut mob = bee(&tables, &mut rng);
        mob.knockback = 1.0;
        for _ in 0..40 {
            mob.update_position(Duration::from_millis(125), &tables);
        }
        assert_eq!(mob.knockback, 0.0);
    }

    #[test]
    fn normal_damage_subtracts_armor_and_clamps() {
        let tables = tables();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut mob = Mob::new(
            MobCard::new(Rarity::Common, MobType::Beetle),
            &tables,
            0.0,
            &mut rng,
        );
        mob.hp = 15;

        let armor = mob.armor(&tables);
        assert!(armor > 0);

        mob.hit(armor + 5, DamageType::Normal, &tables, &mut rng);
        assert_eq!(mob.hp, 10);

        // Fully absorbed hits deal nothing.
        mob.hit(armor, DamageType::Normal, &tables, &mut rng);
        assert_eq!(mob.hp, 10);

        // Lightning ignores armor entirely.
        mob.hit(10, DamageType::Lightning, &tables, &mut rng);
        assert_eq!(mob.hp, 0);
    }

    #[test]
    fn position_is_clamped_to_the_path() {
        let tables = tables();
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let mut mob = bee(&tables, &mut rng);
        mob.position = 38.9;
        for _ in 0..100 {
            mob.update_position(Duration::from_millis(125), &tables);
        }
        assert_eq!(mob.position, PATH_END);
        assert!(mob.at_path_end());
    }

    #[test]
    fn hornet_spawns_a_missile_of_its_own_rarity() {
        let tables = tables();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut hornet = Mob::new(
            MobCard::new(Rarity::Rare, MobType::Hornet),
            &tables,
            10.0,
            &mut rng,
        );
        let mut spawned = Vec::new();
        // Long enough to cycle through the full shoot state machine.
        for _ in 0..2_000 {
            hornet.update(Duration::from_millis(50), &tables, &mut rng, &mut spawned);
            if !spawned.is_empty() {
                break;
            }
        }
        assert_eq!(spawned.len(), 1);
        assert_eq!(spawned[0].card(), MobCard::new(Rarity::Rare, MobType::Missile));
    }

    #[test]
    fn path_interpolation_passes_through_square_centers() {
        let start = path_point(0.5);
        let center = PATH_SQUARES[0].center();
        assert!((start.x - center.x).abs() < 1e-3);
        assert!((start.y - center.y).abs() < 1e-3);

        let mid = path_point(1.0);
        let a = PATH_SQUARES[0].center();
        let b = PATH_SQUARES[1].center();
        assert!((mid.x - (a.x + b.x) / 2.0).abs() < 1e-3);
        assert!((mid.y - (a.y + b.y) / 2.0).abs() < 1e-3);
    }
}
