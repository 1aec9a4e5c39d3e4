//! What makes a trigger rule fire.

use serde::{Deserialize, Serialize};
use variantly::Variantly;

use crate::puzzle::Difficulty;
use crate::trigger::TriggerError;

/// Resolved `trigger_type` + `condition` of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Variantly)]
pub enum TriggerKind {
    /// Fires at an exact (scene, line index).
    DialogueEnd,
    /// Fires when the line text contains this literal substring.
    Keyword(String),
    GameClear(Difficulty),
    GameFail(Difficulty),
}

impl TriggerKind {
    /// Resolve a raw `trigger_type` tag and its condition.
    ///
    /// # Errors
    /// - on an unknown tag, an empty keyword, or an unknown difficulty
    pub fn parse(id: &str, tag: &str, condition: &str) -> Result<Self, TriggerError> {
        let difficulty = || {
            condition.parse::<Difficulty>().map_err(|detail| TriggerError::InvalidCondition {
                id: id.to_string(),
                detail,
            })
        };
        match tag {
            "dialogue_end" => Ok(TriggerKind::DialogueEnd),
            "keyword" if condition.is_empty() => Err(TriggerError::InvalidCondition {
                id: id.to_string(),
                detail: "keyword trigger with an empty keyword".into(),
            }),
            "keyword" => Ok(TriggerKind::Keyword(condition.to_string())),
            "game_clear" => Ok(TriggerKind::GameClear(difficulty()?)),
            "game_fail" => Ok(TriggerKind::GameFail(difficulty()?)),
            other => Err(TriggerError::UnknownTriggerType {
                id: id.to_string(),
                tag: other.to_string(),
            }),
        }
    }

    /// Does this kind answer a puzzle outcome for `difficulty`?
    pub fn matches_outcome(&self, outcome: OutcomeKind, difficulty: Difficulty) -> bool {
        match (self, outcome) {
            (TriggerKind::GameClear(d), OutcomeKind::Clear) | (TriggerKind::GameFail(d), OutcomeKind::Fail) => {
                *d == difficulty
            },
            _ => false,
        }
    }
}

/// Which side of a puzzle result to look up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Clear,
    Fail,
}

/// The dialogue position handed to custom predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialogueContext<'a> {
    pub scene_id: &'a str,
    pub line_index: usize,
    pub text: &'a str,
}
