//! Talent tree purchases and the talent-sourced buff group.

use std::collections::BTreeSet;

use petal_defence_core::{GameTables, TalentId};
use thiserror::Error;

use crate::buff::BuffGroup;

/// Why a talent purchase was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum TalentError {
    /// The node was already purchased.
    #[error("talent already purchased")]
    AlreadyPurchased,
    /// The node's parent has not been purchased yet.
    #[error("parent talent not purchased")]
    ParentMissing,
    /// Not enough talent points.
    #[error("not enough talent points")]
    NotEnoughPoints,
}

/// Purchased talent nodes and their accumulated buffs.
///
/// Unlike the tower-sourced group, the talent group is never rebuilt: each
/// purchase folds its contribution in once and the node stays purchased for
/// the rest of the run.
#[derive(Clone, Debug, Default)]
pub struct Talents {
    purchased: BTreeSet<TalentId>,
    buffs: BuffGroup,
}

impl Talents {
    /// Reports whether a node has been purchased.
    #[must_use]
    pub fn is_purchased(&self, id: TalentId) -> bool {
        self.purchased.contains(&id)
    }

    /// Accumulated talent-sourced buffs.
    #[must_use]
    pub fn buffs(&self) -> &BuffGroup {
        &self.buffs
    }

    /// Antennae level granted by talents alone.
    #[must_use]
    pub fn antennae_level(&self) -> u8 {
        self.buffs.antennae.value() as u8
    }

    /// Validates a purchase against the tree structure and available points.
    pub fn check_purchase(
        &self,
        tables: &GameTables,
        id: TalentId,
        available_points: u32,
    ) -> Result<(), TalentError> {
        let spec = tables.talent(id);
        if self.is_purchased(id) {
            return Err(TalentError::AlreadyPurchased);
        }
        if let Some(prev) = spec.prev {
            if !self.is_purchased(prev) {
                return Err(TalentError::ParentMissing);
            }
        }
        if u64::from(available_points) < spec.cost as u64 {
            return Err(TalentError::NotEnoughPoints);
        }
        Ok(())
    }

    /// Records a validated purchase, folding its buff contribution in.
    pub fn purchase(&mut self, tables: &GameTables, id: TalentId) {
        let spec = tables.talent(id);
        if self.purchased.insert(id) {
            self.buffs.add(&spec.buff, spec.value);
        }
    }

    /// Purchased node identifiers, for persistence.
    pub fn iter_purchased(&self) -> impl Iterator<Item = TalentId> + '_ {
        self.purchased.iter().copied()
    }
}
