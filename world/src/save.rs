//! Serializable snapshot types for persistence.
//!
//! The world produces and consumes these values; reading and writing them to
//! disk is an adapter concern. Restoration tolerates partial data: missing
//! numeric fields default, unknown talent identifiers are skipped, and
//! placements whose card no longer matches the square category return to the
//! backpack instead of being placed. Everything skipped is listed in the
//! [`RestoreReport`] so callers can surface it.

use petal_defence_core::{Card, SquareCoord, TalentId};
use serde::{Deserialize, Serialize};

use crate::player::Player;

/// One saved tower placement.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SavedPlacement {
    /// Square the tower occupied.
    pub square: SquareCoord,
    /// Card identity of the tower.
    pub card: Card,
    /// Reload accumulator at save time, in milliseconds.
    #[serde(default)]
    pub reload_millis: u64,
}

/// Complete persisted state of a run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SaveGame {
    /// Player counters and backpack.
    #[serde(default)]
    pub player: Player,
    /// Tower placements on the grid.
    #[serde(default)]
    pub placements: Vec<SavedPlacement>,
    /// Purchased talent node identifiers.
    #[serde(default)]
    pub talents: Vec<TalentId>,
}

/// What a restore could not reproduce verbatim.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RestoreReport {
    /// Placements skipped for failing the placement rules; their cards were
    /// returned to the backpack.
    pub returned_placements: Vec<SavedPlacement>,
    /// Talent identifiers absent from the current talent table.
    pub unknown_talents: Vec<TalentId>,
}

impl RestoreReport {
    /// Reports whether the restore reproduced the save exactly.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.returned_placements.is_empty() && self.unknown_talents.is_empty()
    }
}
