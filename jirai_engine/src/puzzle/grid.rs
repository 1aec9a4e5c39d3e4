//! Cell storage for the puzzle board.
//!
//! Cells are addressed by a flat row-major index. A cell value of [`MINE`]
//! marks a mine; any other value is the count of neighbouring mines.

use std::collections::HashSet;

use log::warn;
use rand::Rng;

/// Cell value marking a mine.
pub const MINE: i8 = -1;

const DISPLACEMENTS: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    height: usize,
    values: Vec<i8>,
    revealed: Vec<bool>,
    flagged: Vec<bool>,
    mines_placed: bool,
    mine_count: usize,
}

impl Grid {
    /// An empty board. Mines are not placed until [`Grid::place_mines`].
    pub fn new(width: usize, height: usize, mine_count: usize) -> Self {
        let len = width * height;
        Self {
            width,
            height,
            values: vec![0; len],
            revealed: vec![false; len],
            flagged: vec![false; len],
            mines_placed: false,
            mine_count,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, cell: usize) -> bool {
        cell < self.len()
    }

    /// Effective mine count (after any clamping at placement).
    pub fn mine_count(&self) -> usize {
        self.mine_count
    }

    pub fn mines_placed(&self) -> bool {
        self.mines_placed
    }

    pub fn coords(&self, cell: usize) -> (usize, usize) {
        (cell % self.width, cell / self.width)
    }

    pub fn index(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }

    /// In-bounds neighbours of a cell (up to 8).
    pub fn neighbors(&self, cell: usize) -> impl Iterator<Item = usize> + '_ {
        let (x, y) = self.coords(cell);
        DISPLACEMENTS.iter().filter_map(move |(dx, dy)| {
            let nx = x.checked_add_signed(*dx)?;
            let ny = y.checked_add_signed(*dy)?;
            self.index(nx, ny)
        })
    }

    pub fn value(&self, cell: usize) -> i8 {
        self.values[cell]
    }

    pub fn is_mine(&self, cell: usize) -> bool {
        self.values[cell] == MINE
    }

    pub fn is_revealed(&self, cell: usize) -> bool {
        self.revealed[cell]
    }

    pub fn is_flagged(&self, cell: usize) -> bool {
        self.flagged[cell]
    }

    pub fn flagged_count(&self) -> usize {
        self.flagged.iter().filter(|f| **f).count()
    }

    /// Toggle a flag. Revealed cells cannot be flagged; returns the new flag state.
    pub fn toggle_flag(&mut self, cell: usize) -> Option<bool> {
        if self.revealed[cell] {
            return None;
        }
        self.flagged[cell] = !self.flagged[cell];
        Some(self.flagged[cell])
    }

    /// Place mines anywhere except `safe` and its neighbours, then compute counts.
    ///
    /// Returns the number of mines actually placed, which is lower than the
    /// requested count only when there are not enough eligible cells.
    pub fn place_mines<R: Rng + ?Sized>(&mut self, safe: usize, rng: &mut R) -> usize {
        let excluded: HashSet<usize> = std::iter::once(safe).chain(self.neighbors(safe)).collect();
        let eligible: Vec<usize> = (0..self.len()).filter(|c| !excluded.contains(c)).collect();

        let count = if self.mine_count > eligible.len() {
            warn!(
                "requested {} mines but only {} cells are eligible; clamping",
                self.mine_count,
                eligible.len()
            );
            eligible.len()
        } else {
            self.mine_count
        };

        for pick in rand::seq::index::sample(rng, eligible.len(), count) {
            self.values[eligible[pick]] = MINE;
        }
        self.mine_count = count;
        self.mines_placed = true;
        self.compute_counts();
        count
    }

    /// Place mines at exact positions. Used for scripted boards and tests.
    pub fn place_mines_at(&mut self, mines: &[usize]) {
        for &cell in mines {
            if let Some(value) = self.values.get_mut(cell) {
                *value = MINE;
            }
        }
        self.mine_count = self.values.iter().filter(|v| **v == MINE).count();
        self.mines_placed = true;
        self.compute_counts();
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    fn compute_counts(&mut self) {
        for cell in 0..self.len() {
            if self.is_mine(cell) {
                continue;
            }
            let near = self.neighbors(cell).filter(|n| self.values[*n] == MINE).count();
            self.values[cell] = near as i8;
        }
    }

    /// Reveal `start` and, if it is a zero cell, flood outward through zero cells.
    ///
    /// Flagged and already-revealed cells are never touched, which also bounds the
    /// fill: every cell is pushed at most once per revealed zero neighbour and
    /// revealed at most once. Returns the newly revealed cells in reveal order.
    pub fn flood_reveal(&mut self, start: usize) -> Vec<usize> {
        let mut opened = Vec::new();
        let mut stack = vec![start];
        while let Some(cell) = stack.pop() {
            if self.revealed[cell] || self.flagged[cell] {
                continue;
            }
            self.revealed[cell] = true;
            opened.push(cell);
            if self.values[cell] == 0 {
                stack.extend(self.neighbors(cell).filter(|n| !self.revealed[*n]));
            }
        }
        opened
    }

    /// Mark a single cell revealed (used for the triggering mine).
    pub fn reveal_one(&mut self, cell: usize) {
        self.flagged[cell] = false;
        self.revealed[cell] = true;
    }

    /// Reveal every mine on the board, clearing any flags on them.
    pub fn reveal_all_mines(&mut self) {
        for cell in 0..self.len() {
            if self.is_mine(cell) {
                self.reveal_one(cell);
            }
        }
    }

    /// True once every non-mine cell is revealed.
    pub fn all_safe_revealed(&self) -> bool {
        self.mines_placed && (0..self.len()).all(|c| self.is_mine(c) || self.revealed[c])
    }
}
