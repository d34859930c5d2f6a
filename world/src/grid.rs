//! Grid map: square categories, tower ownership, placement rules.

use petal_defence_core::{
    Card, PlacementError, SquareCategory, SquareCoord, TowerCategory, GRID_COLUMNS, GRID_ROWS,
    OBSTACLE_SQUARES, PATH_SQUARES, SLOT_SQUARES,
};

use crate::tower::Tower;

/// 11x10 array of square categories and optional tower ownership.
#[derive(Clone, Debug)]
pub struct Grid {
    categories: Vec<SquareCategory>,
    towers: Vec<Option<Tower>>,
}

impl Default for Grid {
    fn default() -> Self {
        Self::new()
    }
}

impl Grid {
    /// Creates the fixed map: trail along the mob path, slots in the
    /// corners and mid edges, three obstacles, grass everywhere else.
    #[must_use]
    pub fn new() -> Self {
        let count = (GRID_ROWS * GRID_COLUMNS) as usize;
        let mut categories = vec![SquareCategory::Grass; count];
        for square in PATH_SQUARES {
            categories[index_of(square)] = SquareCategory::Trail;
        }
        for square in SLOT_SQUARES {
            categories[index_of(square)] = SquareCategory::Slot;
        }
        for square in OBSTACLE_SQUARES {
            categories[index_of(square)] = SquareCategory::Obstacle;
        }
        Self {
            categories,
            towers: vec![None; count],
        }
    }

    /// Category of a square.
    ///
    /// # Panics
    ///
    /// Panics when the square is out of bounds; callers validate first.
    #[must_use]
    pub fn category(&self, square: SquareCoord) -> SquareCategory {
        assert!(square.in_bounds(), "square out of bounds");
        self.categories[index_of(square)]
    }

    /// Validates a placement request against the square's category.
    pub fn check_placement(&self, square: SquareCoord, card: Card) -> Result<(), PlacementError> {
        if !square.in_bounds() {
            return Err(PlacementError::OutOfBounds);
        }
        match self.category(square) {
            SquareCategory::Obstacle => Err(PlacementError::Obstacle),
            category if category == card.tower.required_square() => Ok(()),
            _ => Err(PlacementError::WrongCategory),
        }
    }

    /// Tower on a square, if any.
    #[must_use]
    pub fn tower(&self, square: SquareCoord) -> Option<&Tower> {
        self.towers.get(index_of(square)).and_then(Option::as_ref)
    }

    /// Mutable tower on a square, if any.
    #[must_use]
    pub fn tower_mut(&mut self, square: SquareCoord) -> Option<&mut Tower> {
        self.towers.get_mut(index_of(square)).and_then(Option::as_mut)
    }

    /// Places a validated tower, returning the replaced occupant.
    pub fn place(&mut self, square: SquareCoord, tower: Tower) -> Option<Tower> {
        self.towers[index_of(square)].replace(tower)
    }

    /// Removes and returns the tower on a square.
    pub fn remove(&mut self, square: SquareCoord) -> Option<Tower> {
        self.towers[index_of(square)].take()
    }

    /// Removes every tower matching a card, returning the removed set.
    pub fn remove_all(&mut self, card: Card) -> Vec<Tower> {
        let mut removed = Vec::new();
        for slot in &mut self.towers {
            if slot.as_ref().is_some_and(|tower| tower.card() == card) {
                if let Some(tower) = slot.take() {
                    removed.push(tower);
                }
            }
        }
        removed
    }

    /// First empty square that accepts the card.
    ///
    /// Defence cards scan path squares in canonical path order; everything
    /// else scans the grid row-major.
    #[must_use]
    pub fn find_placeable_square(&self, card: Card) -> Option<SquareCoord> {
        if card.tower.category() == TowerCategory::Defence {
            return PATH_SQUARES
                .into_iter()
                .find(|square| self.accepts(*square, card));
        }
        self.iter_squares().find(|square| self.accepts(*square, card))
    }

    fn accepts(&self, square: SquareCoord, card: Card) -> bool {
        self.tower(square).is_none() && self.check_placement(square, card).is_ok()
    }

    /// All grid squares in row-major order.
    pub fn iter_squares(&self) -> impl Iterator<Item = SquareCoord> {
        (0..GRID_ROWS)
            .flat_map(|row| (0..GRID_COLUMNS).map(move |column| SquareCoord::new(row, column)))
    }

    /// All placed towers with their squares, row-major.
    pub fn iter_towers(&self) -> impl Iterator<Item = (SquareCoord, &Tower)> {
        self.towers.iter().enumerate().filter_map(|(index, slot)| {
            slot.as_ref().map(|tower| (square_of(index), tower))
        })
    }

    /// Mutable variant of [`Grid::iter_towers`].
    pub fn iter_towers_mut(&mut self) -> impl Iterator<Item = (SquareCoord, &mut Tower)> {
        self.towers.iter_mut().enumerate().filter_map(|(index, slot)| {
            slot.as_mut().map(|tower| (square_of(index), tower))
        })
    }
}

fn index_of(square: SquareCoord) -> usize {
    (square.row() * GRID_COLUMNS + square.column()) as usize
}

fn square_of(index: usize) -> SquareCoord {
    SquareCoord::new(index as u32 / GRID_COLUMNS, index as u32 % GRID_COLUMNS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use petal_defence_core::{Rarity, TowerType};

    fn card(tower: TowerType) -> Card {
        Card::new(Rarity::Common, tower)
    }

    #[test]
    fn placement_matrix_follows_square_categories() {
        let grid = Grid::new();
        let grass = SquareCoord::new(0, 1);
        let trail = PATH_SQUARES[0];
        let slot = SLOT_SQUARES[0];
        let obstacle = OBSTACLE_SQUARES[0];

        assert!(grid.check_placement(grass, card(TowerType::Basic)).is_ok());
        assert_eq!(
            grid.check_placement(grass, card(TowerType::Web)),
            Err(PlacementError::WrongCategory)
        );
        assert_eq!(
            grid.check_placement(grass, card(TowerType::Rose)),
            Err(PlacementError::WrongCategory)
        );

        assert!(grid.check_placement(trail, card(TowerType::Web)).is_ok());
        assert_eq!(
            grid.check_placement(trail, card(TowerType::Basic)),
            Err(PlacementError::WrongCategory)
        );

        assert!(grid.check_placement(slot, card(TowerType::Antennae)).is_ok());
        assert_eq!(
            grid.check_placement(slot, card(TowerType::AntEgg)),
            Err(PlacementError::WrongCategory)
        );

        for tower in TowerType::ALL {
            assert_eq!(
                grid.check_placement(obstacle, card(tower)),
                Err(PlacementError::Obstacle)
            );
        }

        assert_eq!(
            grid.check_placement(SquareCoord::new(11, 0), card(TowerType::Basic)),
            Err(PlacementError::OutOfBounds)
        );
    }

    #[test]
    fn remove_all_clears_every_matching_tower() {
        let mut grid = Grid::new();
        let target = card(TowerType::Basic);
        let other = card(TowerType::Stinger);
        let _ = grid.place(SquareCoord::new(0, 1), Tower::new(target));
        let _ = grid.place(SquareCoord::new(0, 2), Tower::new(target));
        let _ = grid.place(SquareCoord::new(0, 3), Tower::new(other));

        let removed = grid.remove_all(target);
        assert_eq!(removed.len(), 2);
        assert!(grid.tower(SquareCoord::new(0, 1)).is_none());
        assert!(grid.tower(SquareCoord::new(0, 3)).is_some());
    }

    #[test]
    fn defence_cards_auto_place_along_the_path_in_order() {
        let mut grid = Grid::new();
        let web = card(TowerType::Web);
        assert_eq!(grid.find_placeable_square(web), Some(PATH_SQUARES[0]));

        let _ = grid.place(PATH_SQUARES[0], Tower::new(web));
        assert_eq!(grid.find_placeable_square(web), Some(PATH_SQUARES[1]));
    }

    #[test]
    fn grass_cards_auto_place_row_major() {
        let grid = Grid::new();
        // (0,0) is a slot, so the first grass square row-major is (0,1).
        assert_eq!(
            grid.find_placeable_square(card(TowerType::Basic)),
            Some(SquareCoord::new(0, 1))
        );
    }
}
