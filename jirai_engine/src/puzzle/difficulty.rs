use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use variantly::Variantly;

/// Board size, mine count and time limit for one puzzle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyConfig {
    /// Side length of the square board.
    pub size: usize,
    pub mine_count: usize,
    pub time_limit_secs: u32,
}

/// The three puzzle stages, in story order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Variantly)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Normal,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Normal, Difficulty::Hard];

    /// Preset board for this stage.
    pub fn config(self) -> DifficultyConfig {
        match self {
            Difficulty::Easy => DifficultyConfig {
                size: 9,
                mine_count: 8,
                time_limit_secs: 180,
            },
            Difficulty::Normal => DifficultyConfig {
                size: 12,
                mine_count: 18,
                time_limit_secs: 240,
            },
            Difficulty::Hard => DifficultyConfig {
                size: 16,
                mine_count: 35,
                time_limit_secs: 300,
            },
        }
    }

    /// Lowercase key used in data tables and save checkpoints.
    pub fn key(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Normal => "normal",
            Difficulty::Hard => "hard",
        }
    }

    /// Reward clip key unlocked by clearing this stage.
    pub fn reward_video_key(self) -> String {
        format!("reward_{}", self.key())
    }

    /// Save checkpoint recorded after clearing this stage.
    pub fn clear_checkpoint(self) -> String {
        format!("{}_clear", self.key())
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "normal" => Ok(Difficulty::Normal),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_match_stage_table() {
        assert_eq!(
            Difficulty::Easy.config(),
            DifficultyConfig {
                size: 9,
                mine_count: 8,
                time_limit_secs: 180
            }
        );
        assert_eq!(Difficulty::Normal.config().mine_count, 18);
        assert_eq!(Difficulty::Hard.config().size, 16);
        assert_eq!(Difficulty::Hard.config().time_limit_secs, 300);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("HARD".parse::<Difficulty>(), Ok(Difficulty::Hard));
        assert_eq!(" normal ".parse::<Difficulty>(), Ok(Difficulty::Normal));
        assert!("nightmare".parse::<Difficulty>().is_err());
    }

    #[test]
    fn checkpoint_and_reward_keys() {
        assert_eq!(Difficulty::Normal.clear_checkpoint(), "normal_clear");
        assert_eq!(Difficulty::Easy.reward_video_key(), "reward_easy");
    }
}
