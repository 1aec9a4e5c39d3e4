//! Scene scripts.
//!
//! Dialogue rows are grouped by scene and ordered by sequence number once, at
//! load. After that the catalog is read-only.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use jirai_data::DialogueRow;
use log::warn;
use serde::{Deserialize, Serialize};
use variantly::Variantly;

use crate::puzzle::Difficulty;

/// Speakers whose lines are shown at once and may carry a [`LineAction`].
const NARRATOR_SPEAKERS: [&str; 3] = ["system", "narrator", ""];

/// Story order of the main scenes, used by `next_stage`.
const STAGE_ORDER: [(&str, &str); 6] = [
    ("meeting", "dinner_scene"),
    ("easy_reward", "dinner_scene"),
    ("dinner_scene", "home_scene"),
    ("normal_reward", "home_scene"),
    ("home_scene", "true_end"),
    ("hard_reward", "true_end"),
];

/// Per-line action attached to narrator lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Variantly)]
pub enum LineAction {
    StartGame,
    ShowEnding,
    NextStage,
}

impl LineAction {
    pub fn key(self) -> &'static str {
        match self {
            LineAction::StartGame => "start_game",
            LineAction::ShowEnding => "show_ending",
            LineAction::NextStage => "next_stage",
        }
    }
}

impl fmt::Display for LineAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for LineAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start_game" => Ok(LineAction::StartGame),
            "show_ending" => Ok(LineAction::ShowEnding),
            "next_stage" => Ok(LineAction::NextStage),
            other => Err(format!("unknown line action '{other}'")),
        }
    }
}

/// Puzzle stage played from a scene's `start_game` line.
pub fn stage_for_scene(scene_id: &str) -> Difficulty {
    match scene_id {
        "dinner_scene" => Difficulty::Normal,
        "home_scene" => Difficulty::Hard,
        _ => Difficulty::Easy,
    }
}

/// Scene that follows `scene_id` in story order.
pub fn next_stage(scene_id: &str) -> Option<&'static str> {
    STAGE_ORDER
        .iter()
        .find(|(from, _)| *from == scene_id)
        .map(|(_, to)| *to)
}

/// Story scene that follows a cleared stage (`None` after the last stage).
pub fn scene_after_clear(difficulty: Difficulty) -> Option<&'static str> {
    match difficulty {
        Difficulty::Easy => Some("dinner_scene"),
        Difficulty::Normal => Some("home_scene"),
        Difficulty::Hard => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueLine {
    pub speaker: String,
    pub text: String,
    pub emotion: String,
    pub voice_ref: Option<String>,
    pub is_trigger_flag: bool,
    pub trigger_id: Option<String>,
    pub action: Option<LineAction>,
}

impl DialogueLine {
    pub fn new(speaker: &str, text: &str, emotion: &str) -> Self {
        Self {
            speaker: speaker.to_string(),
            text: text.to_string(),
            emotion: emotion.to_string(),
            voice_ref: None,
            is_trigger_flag: false,
            trigger_id: None,
            action: None,
        }
    }

    #[must_use]
    pub fn with_action(mut self, action: LineAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn is_narration(&self) -> bool {
        NARRATOR_SPEAKERS.contains(&self.speaker.to_ascii_lowercase().as_str())
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// The first `chars` characters of the text.
    pub fn visible_text(&self, chars: usize) -> &str {
        match self.text.char_indices().nth(chars) {
            Some((byte, _)) => &self.text[..byte],
            None => &self.text,
        }
    }

    fn from_row(row: DialogueRow) -> Self {
        let action = row.action.as_deref().and_then(|raw| match raw.parse() {
            Ok(action) => Some(action),
            Err(err) => {
                warn!("{}#{}: {err}; ignoring", row.scene_id, row.sequence);
                None
            },
        });
        Self {
            speaker: row.speaker,
            text: row.text,
            emotion: row.emotion,
            voice_ref: row.voice_file,
            is_trigger_flag: row.is_trigger,
            trigger_id: row.trigger_id,
            action,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneScript {
    pub id: String,
    pub lines: Vec<DialogueLine>,
}

/// All scenes, by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptCatalog {
    scenes: HashMap<String, SceneScript>,
}

impl ScriptCatalog {
    /// Group rows by scene and order each scene by sequence number.
    pub fn from_rows(rows: Vec<DialogueRow>) -> Self {
        let mut grouped: HashMap<String, Vec<(usize, DialogueLine)>> = HashMap::new();
        for row in rows {
            let scene = row.scene_id.clone();
            let seq = row.sequence;
            grouped.entry(scene).or_default().push((seq, DialogueLine::from_row(row)));
        }
        let scenes = grouped
            .into_iter()
            .map(|(id, mut lines)| {
                lines.sort_by_key(|(seq, _)| *seq);
                let lines = lines.into_iter().map(|(_, line)| line).collect();
                (id.clone(), SceneScript { id, lines })
            })
            .collect();
        Self { scenes }
    }

    pub fn from_scenes(scenes: impl IntoIterator<Item = SceneScript>) -> Self {
        Self {
            scenes: scenes.into_iter().map(|s| (s.id.clone(), s)).collect(),
        }
    }

    pub fn scene(&self, id: &str) -> Option<&SceneScript> {
        self.scenes.get(id)
    }

    pub fn line(&self, scene_id: &str, index: usize) -> Option<&DialogueLine> {
        self.scene(scene_id).and_then(|s| s.lines.get(index))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.scenes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Scene ids, sorted.
    pub fn scene_ids(&self) -> Vec<&str> {
        let mut ids: Vec<_> = self.scenes.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(scene: &str, seq: usize, speaker: &str, action: Option<&str>) -> DialogueRow {
        DialogueRow {
            scene_id: scene.into(),
            sequence: seq,
            speaker: speaker.into(),
            text: format!("{scene} {seq}"),
            emotion: "normal".into(),
            voice_file: None,
            is_trigger: false,
            trigger_id: None,
            action: action.map(str::to_string),
        }
    }

    #[test]
    fn rows_are_grouped_and_sorted() {
        let catalog = ScriptCatalog::from_rows(vec![
            row("b", 1, "Ami", None),
            row("a", 2, "Ami", None),
            row("a", 0, "Ami", None),
            row("a", 1, "Ami", None),
        ]);
        assert_eq!(catalog.scene_ids(), vec!["a", "b"]);
        let texts: Vec<_> = catalog.scene("a").unwrap().lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, ["a 0", "a 1", "a 2"]);
    }

    #[test]
    fn unknown_line_actions_are_dropped() {
        let catalog = ScriptCatalog::from_rows(vec![
            row("a", 0, "system", Some("start_game")),
            row("a", 1, "system", Some("explode")),
        ]);
        assert_eq!(catalog.line("a", 0).unwrap().action, Some(LineAction::StartGame));
        assert_eq!(catalog.line("a", 1).unwrap().action, None);
    }

    #[test]
    fn narration_speakers() {
        assert!(DialogueLine::new("System", "", "").is_narration());
        assert!(DialogueLine::new("", "", "").is_narration());
        assert!(!DialogueLine::new("Ami", "", "").is_narration());
    }

    #[test]
    fn visible_text_counts_characters_not_bytes() {
        let line = DialogueLine::new("Ami", "おはよう!", "smile");
        assert_eq!(line.char_count(), 5);
        assert_eq!(line.visible_text(2), "おは");
        assert_eq!(line.visible_text(99), "おはよう!");
    }

    #[test]
    fn stage_lookups() {
        assert_eq!(stage_for_scene("dinner_scene"), Difficulty::Normal);
        assert_eq!(stage_for_scene("somewhere"), Difficulty::Easy);
        assert_eq!(next_stage("meeting"), Some("dinner_scene"));
        assert_eq!(next_stage("hard_reward"), Some("true_end"));
        assert_eq!(next_stage("true_end"), None);
        assert_eq!(scene_after_clear(Difficulty::Hard), None);
    }
}
