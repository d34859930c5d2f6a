//! Tower state: a card on a square plus its reload accumulator.
//!
//! Behaviour is dispatched by the tower's category at the tick hooks in the
//! world driver; the struct itself only tracks reload progress.

use std::time::Duration;

use petal_defence_core::Card;

/// A placed tower.
#[derive(Clone, Debug)]
pub struct Tower {
    card: Card,
    reload_timer: Duration,
    // Summon towers freeze their reload while at the summon cap.
    paused: bool,
}

impl Tower {
    /// Creates a freshly placed tower with an empty reload accumulator.
    #[must_use]
    pub fn new(card: Card) -> Self {
        Self {
            card,
            reload_timer: Duration::ZERO,
            paused: false,
        }
    }

    /// Card identity of the tower.
    #[must_use]
    pub fn card(&self) -> Card {
        self.card
    }

    /// Advances the reload accumulator by one frame.
    pub fn advance(&mut self, dt: Duration) {
        if !self.paused {
            self.reload_timer = self.reload_timer.saturating_add(dt);
        }
    }

    /// Freezes or resumes the reload accumulator.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Reload progress in `[0, 1]` against a buffed reload duration.
    #[must_use]
    pub fn reload_progress(&self, buffed_reload: f32) -> f32 {
        if buffed_reload <= 0.0 {
            return 1.0;
        }
        (self.reload_timer.as_secs_f32() / buffed_reload).min(1.0)
    }

    /// Reports whether the buffed reload duration has elapsed.
    #[must_use]
    pub fn ready(&self, buffed_reload: f32) -> bool {
        self.reload_timer.as_secs_f32() > buffed_reload
    }

    /// Restarts the reload accumulator after firing.
    pub fn reset_reload(&mut self) {
        self.reload_timer = Duration::ZERO;
    }

    /// Raw reload accumulator, for persistence.
    #[must_use]
    pub fn reload_timer(&self) -> Duration {
        self.reload_timer
    }

    /// Restores the reload accumulator from persistence.
    pub fn set_reload_timer(&mut self, timer: Duration) {
        self.reload_timer = timer;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use petal_defence_core::{Rarity, TowerType};

    #[test]
    fn reload_readiness_tracks_the_buffed_duration() {
        let mut tower = Tower::new(Card::new(Rarity::Common, TowerType::Basic));
        tower.advance(Duration::from_millis(900));
        assert!(!tower.ready(1.0));
        tower.advance(Duration::from_millis(200));
        assert!(tower.ready(1.0));
        // A reload buff that shortens the duration makes it ready sooner.
        assert!(tower.ready(0.5));

        tower.reset_reload();
        assert!(!tower.ready(0.5));
    }

    #[test]
    fn paused_towers_do_not_accumulate_reload() {
        let mut tower = Tower::new(Card::new(Rarity::Common, TowerType::AntEgg));
        tower.set_paused(true);
        tower.advance(Duration::from_secs(10));
        assert!(!tower.ready(1.0));
        tower.set_paused(false);
        tower.advance(Duration::from_secs(2));
        assert!(tower.ready(1.0));
    }
}
