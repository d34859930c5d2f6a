#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Headless command-line adapter: runs the simulation for a fixed number of
//! frames, reports what happened, and optionally persists the run.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use petal_defence_core::{
    Card, Command, Event, GameTables, Rarity, SquareCoord, TowerType, SLOT_SQUARES, TICK_INTERVAL,
};
use petal_defence_system_spawning::{SelectionPolicy, Spawning};
use petal_defence_world::{apply, query, save::SaveGame, World};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

/// Command-line options of the headless run.
#[derive(Debug, Parser)]
#[command(name = "petal-defence", about = "Headless petal-defence simulation")]
struct Args {
    /// Seed for every stochastic decision of the run.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Number of frames to simulate; each frame advances one tick interval.
    #[arg(long, default_value_t = 480)]
    frames: u32,

    /// Attribute tables as JSON; the built-in starter tables when omitted.
    #[arg(long)]
    tables: Option<PathBuf>,

    /// Save file to resume from.
    #[arg(long)]
    load: Option<PathBuf>,

    /// Path to write the final state to.
    #[arg(long)]
    save: Option<PathBuf>,

    /// Gate spawn weights by player level instead of plain weighted choice.
    #[arg(long)]
    rarity_curve: bool,

    /// Skip placing the demo tower layout on a fresh run.
    #[arg(long)]
    no_demo_layout: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let tables = match &args.tables {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading tables from {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing tables from {}", path.display()))?
        }
        None => GameTables::starter(),
    };

    let mut world = match &args.load {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading save from {}", path.display()))?;
            let save: SaveGame = serde_json::from_str(&text)
                .with_context(|| format!("parsing save from {}", path.display()))?;
            let (world, report) = World::restore(tables, save);
            for placement in &report.returned_placements {
                println!(
                    "note: returned {:?} {:?} to the backpack (stale placement)",
                    placement.card.rarity, placement.card.tower
                );
            }
            for talent in &report.unknown_talents {
                println!("note: skipped unknown talent {}", talent.get());
            }
            world
        }
        None => World::new(tables),
    };

    let mut world_rng = ChaCha8Rng::seed_from_u64(labeled_seed(args.seed, "world"));
    let mut spawn_rng = ChaCha8Rng::seed_from_u64(labeled_seed(args.seed, "spawning"));
    let policy = if args.rarity_curve {
        SelectionPolicy::RarityCurve
    } else {
        SelectionPolicy::Weighted
    };
    let mut spawning = Spawning::new(&world.tables().spawn, policy);

    let mut events = Vec::new();
    if args.load.is_none() && !args.no_demo_layout {
        place_demo_layout(&mut world, &mut world_rng, &mut events);
    }

    let mut report = RunReport::default();
    report.absorb(&events);
    events.clear();

    for _ in 0..args.frames {
        let mut commands = Vec::new();
        spawning.handle(
            &events,
            &world.tables().spawn,
            query::player(&world).level,
            query::live_mob_count(&world),
            &mut spawn_rng,
            &mut commands,
        );
        events.clear();
        for command in commands {
            apply(&mut world, command, &mut world_rng, &mut events);
        }
        apply(
            &mut world,
            Command::Advance { dt: TICK_INTERVAL },
            &mut world_rng,
            &mut events,
        );
        report.absorb(&events);
        if query::is_defeated(&world) {
            break;
        }
    }

    print_report(&world, &report);

    if let Some(path) = &args.save {
        let save = world.snapshot();
        let text = serde_json::to_string_pretty(&save).context("serializing save")?;
        fs::write(path, text).with_context(|| format!("writing save to {}", path.display()))?;
        println!("saved to {}", path.display());
    }
    Ok(())
}

/// Derives an independent per-stream seed from the global seed.
fn labeled_seed(seed: u64, label: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_le_bytes());
    hasher.update(label.as_bytes());
    let digest = hasher.finalize();
    let bytes: [u8; 8] = digest[0..8].try_into().expect("sha256 digest slice length");
    u64::from_le_bytes(bytes)
}

/// A small layout covering each tower category, so a fresh run has defence.
fn place_demo_layout(world: &mut World, rng: &mut ChaCha8Rng, events: &mut Vec<Event>) {
    let placements = [
        (SquareCoord::new(4, 0), TowerType::Basic),
        (SquareCoord::new(6, 0), TowerType::Basic),
        (SquareCoord::new(4, 1), TowerType::Stinger),
        (SquareCoord::new(6, 5), TowerType::Lightning),
        (SquareCoord::new(8, 0), TowerType::AntEgg),
        (SquareCoord::new(5, 2), TowerType::Web),
        (SLOT_SQUARES[0], TowerType::Antennae),
        (SLOT_SQUARES[1], TowerType::Rose),
    ];
    for (square, tower) in placements {
        apply(
            world,
            Command::PlaceCard {
                square,
                card: Card::new(Rarity::Common, tower),
            },
            rng,
            events,
        );
    }
}

#[derive(Debug, Default)]
struct RunReport {
    ticks: u64,
    spawned: u64,
    died: u64,
    coin_earned: i64,
    damage_taken: i64,
    rejected_placements: u64,
}

impl RunReport {
    fn absorb(&mut self, events: &[Event]) {
        for event in events {
            match event {
                Event::TickCompleted => self.ticks += 1,
                Event::MobSpawned { .. } => self.spawned += 1,
                Event::MobDied { coin, .. } => {
                    self.died += 1;
                    self.coin_earned += coin;
                }
                Event::PlayerDamaged { damage } => self.damage_taken += i64::from(*damage),
                Event::PlacementRejected { .. } => self.rejected_placements += 1,
                _ => {}
            }
        }
    }
}

fn print_report(world: &World, report: &RunReport) {
    let player = query::player(world);
    println!("ticks:            {}", report.ticks);
    println!("mobs spawned:     {}", report.spawned);
    println!("mobs killed:      {}", report.died);
    println!("mobs alive:       {}", query::live_mob_count(world));
    println!("petals alive:     {}", query::petals(world).len());
    println!("coin earned:      {}", report.coin_earned);
    println!("damage taken:     {}", report.damage_taken);
    println!(
        "player:           level {} ({} / {} xp), {} / {} hp, {} coins",
        player.level, player.xp, player.required_xp, player.hp, player.hp_limit, player.coins
    );
    if report.rejected_placements > 0 {
        println!("rejected places:  {}", report.rejected_placements);
    }
    if query::is_defeated(world) {
        println!("the player was defeated");
    }
}
