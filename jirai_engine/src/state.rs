//! Session-owned game state.
//!
//! Everything the story, puzzle and video layers share lives in one
//! [`SessionState`] owned by the session and passed down by reference.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use variantly::Variantly;

use crate::persistence::{SaveState, Settings};
use crate::puzzle::Difficulty;

/// Upper bound of the affection gauge.
pub const AFFECTION_MAX: u8 = 100;
/// Affection at the start of a new game.
pub const AFFECTION_START: u8 = 70;
/// At or below this, a failed round leads to the bad ending.
pub const AFFECTION_BAD_END: u8 = 20;

/// Ami's affection gauge, always within `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Affection(u8);

impl Affection {
    pub fn new(value: u8) -> Self {
        Self(value.min(AFFECTION_MAX))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Subtract `amount`, flooring at zero. Returns the new value.
    pub fn penalize(&mut self, amount: u8) -> u8 {
        self.0 = self.0.saturating_sub(amount);
        self.0
    }

    pub fn raise(&mut self, amount: u8) -> u8 {
        self.0 = self.0.saturating_add(amount).min(AFFECTION_MAX);
        self.0
    }
}

impl Default for Affection {
    fn default() -> Self {
        Self(AFFECTION_START)
    }
}

/// Which surface currently owns input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Variantly)]
pub enum Screen {
    #[default]
    Title,
    Novel,
    Puzzle,
    Video,
    Ending,
}

/// Mutable state of one play session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub affection: Affection,
    pub difficulty: Option<Difficulty>,
    pub screen: Screen,
    pub save: SaveState,
    pub settings: Settings,
    /// Age confirmation lasts for the session only and is never persisted.
    #[serde(skip)]
    pub age_confirmed: bool,
    /// Failed rounds per stage since the stage was last cleared.
    pub failed_attempts: BTreeMap<Difficulty, u32>,
}

impl SessionState {
    pub fn new(save: SaveState, settings: Settings) -> Self {
        Self {
            save,
            settings,
            ..Self::default()
        }
    }

    pub fn record_failure(&mut self, difficulty: Difficulty) -> u32 {
        let count = self.failed_attempts.entry(difficulty).or_insert(0);
        *count += 1;
        *count
    }

    /// Clear the failure count for a stage, returning whether it was a first-try clear.
    pub fn take_failures(&mut self, difficulty: Difficulty) -> bool {
        self.failed_attempts.remove(&difficulty).unwrap_or(0) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affection_is_clamped() {
        assert_eq!(Affection::new(250).value(), 100);
        let mut affection = Affection::new(95);
        assert_eq!(affection.raise(20), 100);
        assert_eq!(affection.penalize(120), 0);
        assert_eq!(Affection::default().value(), AFFECTION_START);
    }

    #[test]
    fn failures_reset_on_clear() {
        let mut state = SessionState::default();
        assert!(state.screen.is_title());
        assert_eq!(state.record_failure(Difficulty::Easy), 1);
        assert_eq!(state.record_failure(Difficulty::Easy), 2);
        assert!(!state.take_failures(Difficulty::Easy));
        assert!(state.take_failures(Difficulty::Easy));
    }
}
