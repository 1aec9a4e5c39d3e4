//! Raw row definitions for the dialogue, trigger, and video tables.
//!
//! These are still "uncooked": tags such as `trigger_type` and `next_action`
//! remain strings here. The engine resolves them into closed enums at load.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::table::{CellValue, Record};

/// Scene id the video sequencer reports finished chains under.
pub const VIDEO_END_SCENE: &str = "video_end";
/// Line text reported alongside [`VIDEO_END_SCENE`].
pub const VIDEO_END_TEXT: &str = "sequence_completed";

/// Column order of the dialogue table.
pub const DIALOGUE_COLUMNS: [&str; 9] = [
    "scene_id",
    "sequence",
    "speaker",
    "text",
    "emotion",
    "voice_file",
    "is_trigger",
    "trigger_id",
    "action",
];

/// Column order of the trigger table.
pub const TRIGGER_COLUMNS: [&str; 8] = [
    "trigger_id",
    "scene_id",
    "dialogue_index",
    "trigger_type",
    "condition",
    "next_action",
    "action_params",
    "transition",
];

/// Column order of the video table.
pub const VIDEO_COLUMNS: [&str; 7] = ["id", "title", "path", "duration", "next_id", "category", "age_gated"];

/// Problems turning a [`Record`] into a typed row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("missing required column '{column}'")]
    MissingColumn { column: &'static str },
    #[error("column '{column}' is empty")]
    EmptyValue { column: &'static str },
    #[error("column '{column}' has invalid value '{value}'")]
    InvalidValue { column: &'static str, value: String },
}

fn required_text(record: &Record, column: &'static str) -> Result<String, RowError> {
    match record.get(column) {
        None => Err(RowError::MissingColumn { column }),
        Some(CellValue::Empty) => Err(RowError::EmptyValue { column }),
        Some(value) => Ok(value.as_text()),
    }
}

fn optional_index(record: &Record, column: &'static str) -> Result<Option<usize>, RowError> {
    match record.get(column) {
        None | Some(CellValue::Empty) => Ok(None),
        Some(value) => value.as_index().map(Some).ok_or_else(|| RowError::InvalidValue {
            column,
            value: value.as_text(),
        }),
    }
}

fn optional_text(record: &Record, column: &str) -> Option<String> {
    let text = record.text(column);
    if text.is_empty() { None } else { Some(text) }
}

/// One authored line of a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueRow {
    pub scene_id: String,
    pub sequence: usize,
    pub speaker: String,
    pub text: String,
    pub emotion: String,
    pub voice_file: Option<String>,
    pub is_trigger: bool,
    pub trigger_id: Option<String>,
    /// Legacy per-line action used by narrator lines (`start_game`, `show_ending`, `next_stage`).
    pub action: Option<String>,
}

impl DialogueRow {
    /// Build a dialogue row from a coerced record.
    ///
    /// # Errors
    /// - if `scene_id` or `sequence` is missing, or `sequence` is not an index
    pub fn from_record(record: &Record) -> Result<Self, RowError> {
        let scene_id = required_text(record, "scene_id")?;
        let sequence = optional_index(record, "sequence")?.ok_or(RowError::EmptyValue { column: "sequence" })?;
        Ok(Self {
            scene_id,
            sequence,
            speaker: record.text("speaker"),
            text: record.text("text"),
            emotion: record.text("emotion"),
            voice_file: optional_text(record, "voice_file"),
            is_trigger: record.get("is_trigger").and_then(CellValue::as_bool).unwrap_or(false),
            trigger_id: optional_text(record, "trigger_id"),
            action: optional_text(record, "action"),
        })
    }
}

/// One authored trigger rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerRow {
    pub trigger_id: String,
    pub scene_id: String,
    pub dialogue_index: Option<usize>,
    pub trigger_type: String,
    pub condition: String,
    pub next_action: String,
    pub action_params: String,
    pub transition: Option<String>,
}

impl TriggerRow {
    /// Build a trigger row from a coerced record.
    ///
    /// # Errors
    /// - if `trigger_id`, `trigger_type` or `next_action` is missing, or
    ///   `dialogue_index` is present but not an index
    pub fn from_record(record: &Record) -> Result<Self, RowError> {
        Ok(Self {
            trigger_id: required_text(record, "trigger_id")?,
            scene_id: record.text("scene_id"),
            dialogue_index: optional_index(record, "dialogue_index")?,
            trigger_type: required_text(record, "trigger_type")?,
            condition: record.text("condition"),
            next_action: required_text(record, "next_action")?,
            action_params: record.text("action_params"),
            transition: optional_text(record, "transition"),
        })
    }
}

/// One clip in the reward-video catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRow {
    pub id: String,
    pub title: String,
    pub path: String,
    pub duration: f64,
    pub next_id: Option<String>,
    pub category: String,
    pub age_gated: bool,
}

impl VideoRow {
    /// Build a video row from a coerced record.
    ///
    /// # Errors
    /// - if `id` or `path` is missing
    pub fn from_record(record: &Record) -> Result<Self, RowError> {
        Ok(Self {
            id: required_text(record, "id")?,
            title: record.text("title"),
            path: required_text(record, "path")?,
            duration: record.get("duration").and_then(CellValue::as_number).unwrap_or(0.0),
            next_id: optional_text(record, "next_id"),
            category: record.text("category"),
            age_gated: record.get("age_gated").and_then(CellValue::as_bool).unwrap_or(false),
        })
    }
}
