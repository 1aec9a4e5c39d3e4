//! Session events.
//!
//! Components never print. Whatever a host should show is pushed here as a
//! [`SessionEvent`] and the host drains the log once per frame.

use variantly::Variantly;

use crate::puzzle::{Difficulty, DifficultyConfig, PuzzleOutcome};
use crate::trigger::{Ending, TriggerAction, Transition};

#[derive(Debug, Clone, PartialEq, Variantly)]
pub enum SessionEvent {
    SceneStarted {
        scene_id: String,
    },
    /// A line began displaying. Narration and skip mode show it in full at once.
    LineStarted {
        scene_id: String,
        index: usize,
        speaker: String,
        text: String,
        emotion: String,
        voice: Option<String>,
    },
    LineCompleted {
        index: usize,
    },
    SceneEnded {
        scene_id: String,
    },
    TriggerFired {
        trigger_id: String,
        action: TriggerAction,
    },
    Transition(Transition),
    PuzzleStarted {
        difficulty: Difficulty,
        config: DifficultyConfig,
    },
    CellsRevealed(Vec<usize>),
    FlagToggled {
        cell: usize,
        flagged: bool,
        remaining: usize,
    },
    PuzzleFinished(PuzzleOutcome),
    PuzzleAbandoned,
    VideoStarted {
        clip_id: String,
        title: String,
        path: String,
        start_time_secs: f64,
        volume: f64,
    },
    AgeConfirmationRequested {
        clip_id: String,
    },
    VideoClosed,
    VideoSequenceComplete,
    EndingShown(Ending),
    /// A `custom` trigger action for the host to interpret.
    CustomAction(String),
    /// One-line status message (save failures, retries, unlocks).
    Notice(String),
}

/// Ordered event buffer for one frame.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: Vec<SessionEvent>,
}

impl EventLog {
    pub fn push(&mut self, event: SessionEvent) {
        self.entries.push(event);
    }

    pub fn entries(&self) -> &[SessionEvent] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn drain(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.entries)
    }
}
