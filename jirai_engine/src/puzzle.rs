//! Puzzle module --
//!
//! A minesweeper round: lazy mine placement on first reveal, guarded flood fill,
//! flagging, and the countdown. The engine never schedules anything itself; the
//! session feeds it one-second ticks and turns a finished round into story beats.

pub mod difficulty;
pub mod grid;

pub use difficulty::*;
pub use grid::{Grid, MINE};

use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use variantly::Variantly;

use crate::state::Affection;

/// Affection lost on every failed round.
pub const LOSS_PENALTY: u8 = 20;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PuzzleError {
    #[error("cell {cell} is outside the {len}-cell board")]
    CellOutOfRange { cell: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, PuzzleError>;

/// Lifecycle of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Variantly)]
pub enum PuzzleState {
    /// Board is up, no cell revealed yet (mines not placed).
    Ready,
    Active,
    Won,
    Lost,
}

/// Why a round was lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LossReason {
    HitMine { cell: usize },
    TimedOut,
}

/// Final result of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PuzzleOutcome {
    Won {
        difficulty: Difficulty,
    },
    Lost {
        difficulty: Difficulty,
        reason: LossReason,
        affection: u8,
    },
}

impl PuzzleOutcome {
    pub fn difficulty(&self) -> Difficulty {
        match self {
            PuzzleOutcome::Won { difficulty } | PuzzleOutcome::Lost { difficulty, .. } => *difficulty,
        }
    }

    pub fn is_won(&self) -> bool {
        matches!(self, PuzzleOutcome::Won { .. })
    }
}

/// Result of a single reveal request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealOutcome {
    /// Flagged, already revealed, or the round is over.
    NoChange,
    Revealed(Vec<usize>),
    Finished(PuzzleOutcome),
}

/// What a host may show for one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellView {
    Hidden,
    Flagged,
    Revealed(u8),
    Mine,
}

#[derive(Debug, Clone)]
pub struct PuzzleEngine {
    difficulty: Difficulty,
    config: DifficultyConfig,
    grid: Grid,
    state: PuzzleState,
    elapsed_secs: u32,
    rng: StdRng,
}

impl PuzzleEngine {
    /// Start a round on the preset board for `difficulty`.
    pub fn start(difficulty: Difficulty, seed: u64) -> Self {
        Self::with_config(difficulty, difficulty.config(), seed)
    }

    /// Start a round on a custom board.
    pub fn with_config(difficulty: Difficulty, config: DifficultyConfig, seed: u64) -> Self {
        info!(
            "puzzle start: {difficulty} ({0}x{0}, {1} mines, {2}s)",
            config.size, config.mine_count, config.time_limit_secs
        );
        Self {
            difficulty,
            config,
            grid: Grid::new(config.size, config.size, config.mine_count),
            state: PuzzleState::Ready,
            elapsed_secs: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Start a round with mines already in place. The first-click safety rule does
    /// not apply.
    pub fn with_layout(difficulty: Difficulty, config: DifficultyConfig, mines: &[usize]) -> Self {
        let mut engine = Self::with_config(difficulty, config, 0);
        engine.grid.place_mines_at(mines);
        engine
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn config(&self) -> DifficultyConfig {
        self.config
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn state(&self) -> PuzzleState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, PuzzleState::Won | PuzzleState::Lost)
    }

    pub fn elapsed_secs(&self) -> u32 {
        self.elapsed_secs
    }

    pub fn time_remaining(&self) -> u32 {
        self.config.time_limit_secs.saturating_sub(self.elapsed_secs)
    }

    /// Mines minus flags, never negative.
    pub fn remaining_flag_budget(&self) -> usize {
        self.grid.mine_count().saturating_sub(self.grid.flagged_count())
    }

    fn check_cell(&self, cell: usize) -> Result<()> {
        if self.grid.contains(cell) {
            Ok(())
        } else {
            Err(PuzzleError::CellOutOfRange {
                cell,
                len: self.grid.len(),
            })
        }
    }

    /// Reveal a cell, placing mines first if this is the opening reveal.
    ///
    /// # Errors
    /// - if `cell` is outside the board
    pub fn reveal(&mut self, cell: usize, affection: &mut Affection) -> Result<RevealOutcome> {
        self.check_cell(cell)?;
        if self.is_finished() || self.grid.is_flagged(cell) || self.grid.is_revealed(cell) {
            return Ok(RevealOutcome::NoChange);
        }
        if !self.grid.mines_placed() {
            let placed = self.grid.place_mines(cell, &mut self.rng);
            info!("placed {placed} mines around safe cell {cell}");
        }
        self.state = PuzzleState::Active;

        if self.grid.is_mine(cell) {
            self.grid.reveal_one(cell);
            return Ok(RevealOutcome::Finished(self.lose(LossReason::HitMine { cell }, affection)));
        }

        let opened = self.grid.flood_reveal(cell);
        if self.grid.all_safe_revealed() {
            self.state = PuzzleState::Won;
            info!("puzzle won: {}", self.difficulty);
            return Ok(RevealOutcome::Finished(PuzzleOutcome::Won {
                difficulty: self.difficulty,
            }));
        }
        Ok(RevealOutcome::Revealed(opened))
    }

    /// Toggle a flag on a hidden cell. Returns the new flag state, or `None` if
    /// nothing changed.
    ///
    /// # Errors
    /// - if `cell` is outside the board
    pub fn toggle_flag(&mut self, cell: usize) -> Result<Option<bool>> {
        self.check_cell(cell)?;
        if self.is_finished() {
            return Ok(None);
        }
        Ok(self.grid.toggle_flag(cell))
    }

    /// Count one second. Returns the loss outcome when the time limit is reached.
    pub fn tick(&mut self, affection: &mut Affection) -> Option<PuzzleOutcome> {
        if self.is_finished() {
            return None;
        }
        self.elapsed_secs += 1;
        (self.elapsed_secs >= self.config.time_limit_secs).then(|| self.lose(LossReason::TimedOut, affection))
    }

    fn lose(&mut self, reason: LossReason, affection: &mut Affection) -> PuzzleOutcome {
        self.state = PuzzleState::Lost;
        self.grid.reveal_all_mines();
        let remaining = affection.penalize(LOSS_PENALTY);
        info!("puzzle lost: {} ({reason:?}), affection now {remaining}", self.difficulty);
        PuzzleOutcome::Lost {
            difficulty: self.difficulty,
            reason,
            affection: remaining,
        }
    }

    /// What a host may show for `cell`. Mines only show once revealed.
    ///
    /// # Errors
    /// - if `cell` is outside the board
    #[allow(clippy::cast_sign_loss)]
    pub fn cell_view(&self, cell: usize) -> Result<CellView> {
        self.check_cell(cell)?;
        Ok(if self.grid.is_revealed(cell) {
            if self.grid.is_mine(cell) {
                CellView::Mine
            } else {
                CellView::Revealed(self.grid.value(cell) as u8)
            }
        } else if self.grid.is_flagged(cell) {
            CellView::Flagged
        } else {
            CellView::Hidden
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> DifficultyConfig {
        DifficultyConfig {
            size: 3,
            mine_count: 1,
            time_limit_secs: 3,
        }
    }

    #[test]
    fn first_reveal_places_exact_mine_count_outside_safe_block() {
        let mut affection = Affection::default();
        let mut engine = PuzzleEngine::start(Difficulty::Easy, 42);
        assert!(engine.state().is_ready());
        engine.reveal(0, &mut affection).unwrap();

        let grid = engine.grid();
        let mines: Vec<_> = (0..grid.len()).filter(|c| grid.is_mine(*c)).collect();
        assert_eq!(mines.len(), 8);
        for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            assert!(!grid.is_mine(grid.index(x, y).unwrap()));
        }
    }

    #[test]
    fn hitting_a_mine_loses_and_penalizes() {
        let mut affection = Affection::default();
        let mut engine = PuzzleEngine::with_layout(Difficulty::Normal, tiny(), &[4]);
        let outcome = engine.reveal(4, &mut affection).unwrap();
        assert_eq!(
            outcome,
            RevealOutcome::Finished(PuzzleOutcome::Lost {
                difficulty: Difficulty::Normal,
                reason: LossReason::HitMine { cell: 4 },
                affection: 50,
            })
        );
        assert_eq!(affection.value(), 50);
        assert!(engine.state().is_lost());
        assert_eq!(engine.cell_view(4), Ok(CellView::Mine));
    }

    #[test]
    fn affection_floors_at_zero() {
        let mut affection = Affection::new(10);
        let mut engine = PuzzleEngine::with_layout(Difficulty::Easy, tiny(), &[0]);
        engine.reveal(0, &mut affection).unwrap();
        assert_eq!(affection.value(), 0);
    }

    #[test]
    fn revealing_every_safe_cell_wins() {
        let mut affection = Affection::default();
        let mut engine = PuzzleEngine::with_layout(Difficulty::Easy, tiny(), &[0]);
        // the far corner is a zero cell, so one reveal floods the whole board
        assert_eq!(
            engine.reveal(8, &mut affection).unwrap(),
            RevealOutcome::Finished(PuzzleOutcome::Won {
                difficulty: Difficulty::Easy
            })
        );
        assert!(engine.state().is_won());
        assert_eq!(affection.value(), 70);
    }

    #[test]
    fn finished_round_ignores_input() {
        let mut affection = Affection::default();
        let mut engine = PuzzleEngine::with_layout(Difficulty::Easy, tiny(), &[0]);
        engine.reveal(0, &mut affection).unwrap();
        assert_eq!(engine.reveal(1, &mut affection), Ok(RevealOutcome::NoChange));
        assert_eq!(engine.toggle_flag(1), Ok(None));
        assert_eq!(engine.tick(&mut affection), None);
        assert!(!engine.state().is_won());
    }

    #[test]
    fn flagged_cell_is_not_revealed() {
        let mut affection = Affection::default();
        let mut engine = PuzzleEngine::with_layout(Difficulty::Easy, tiny(), &[0]);
        assert_eq!(engine.toggle_flag(0), Ok(Some(true)));
        assert_eq!(engine.reveal(0, &mut affection), Ok(RevealOutcome::NoChange));
        assert_eq!(engine.cell_view(0), Ok(CellView::Flagged));
    }

    #[test]
    fn flag_budget_never_negative() {
        let mut engine = PuzzleEngine::with_layout(Difficulty::Easy, tiny(), &[0]);
        assert_eq!(engine.remaining_flag_budget(), 1);
        for cell in 0..4 {
            engine.toggle_flag(cell).unwrap();
        }
        assert_eq!(engine.remaining_flag_budget(), 0);
    }

    #[test]
    fn countdown_times_out_with_explicit_reason() {
        let mut affection = Affection::default();
        let mut engine = PuzzleEngine::with_config(Difficulty::Hard, tiny(), 1);
        assert_eq!(engine.tick(&mut affection), None);
        assert_eq!(engine.tick(&mut affection), None);
        assert_eq!(engine.time_remaining(), 1);
        let outcome = engine.tick(&mut affection).unwrap();
        assert!(matches!(
            outcome,
            PuzzleOutcome::Lost {
                reason: LossReason::TimedOut,
                affection: 50,
                ..
            }
        ));
        assert!(engine.state().is_lost());
    }

    #[test]
    fn out_of_range_cells_are_errors() {
        let mut affection = Affection::default();
        let mut engine = PuzzleEngine::start(Difficulty::Easy, 0);
        assert_eq!(
            engine.reveal(81, &mut affection),
            Err(PuzzleError::CellOutOfRange { cell: 81, len: 81 })
        );
        assert!(engine.toggle_flag(500).is_err());
        assert!(engine.cell_view(81).is_err());
    }

    #[test]
    fn same_seed_same_board() {
        let mut a = Affection::default();
        let mut b = Affection::default();
        let mut one = PuzzleEngine::start(Difficulty::Hard, 9);
        let mut two = PuzzleEngine::start(Difficulty::Hard, 9);
        one.reveal(100, &mut a).unwrap();
        two.reveal(100, &mut b).unwrap();
        assert_eq!(one.grid(), two.grid());
    }
}
