use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::*;

/// Validation error for malformed or dangling references between content tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    DuplicateId { kind: &'static str, id: String },
    MissingReference { kind: &'static str, id: String, context: String },
    InvalidValue { context: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::DuplicateId { kind, id } => {
                write!(f, "duplicate {kind} id '{id}'")
            },
            ValidationError::MissingReference { kind, id, context } => {
                write!(f, "missing {kind} '{id}' ({context})")
            },
            ValidationError::InvalidValue { context } => {
                write!(f, "invalid value ({context})")
            },
        }
    }
}

impl std::error::Error for ValidationError {}

/// Scene ids that are reported by the engine itself rather than authored.
const ENGINE_SCENES: [&str; 2] = [VIDEO_END_SCENE, "video_skip"];

/// Validate cross-references between the dialogue, trigger and video tables.
///
/// Problems are collected rather than returned on first hit so authors see the
/// full list at once. An empty result means the tables are consistent.
///
/// ```
/// use jirai_data::{DialogueRow, TriggerRow, validate_tables};
///
/// let line = DialogueRow {
///     scene_id: "meeting".into(),
///     sequence: 0,
///     speaker: "Ami".into(),
///     text: "You're late!".into(),
///     emotion: "smile".into(),
///     voice_file: None,
///     is_trigger: false,
///     trigger_id: None,
///     action: None,
/// };
/// let rule = TriggerRow {
///     trigger_id: "meeting_game".into(),
///     scene_id: "meeting".into(),
///     dialogue_index: Some(0),
///     trigger_type: "dialogue_end".into(),
///     condition: String::new(),
///     next_action: "start_game".into(),
///     action_params: "easy".into(),
///     transition: None,
/// };
/// assert!(validate_tables(&[line], &[rule], &[]).is_empty());
/// ```
pub fn validate_tables(dialogues: &[DialogueRow], triggers: &[TriggerRow], videos: &[VideoRow]) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let scenes: HashSet<&str> = dialogues.iter().map(|d| d.scene_id.as_str()).collect();

    let mut lines = HashSet::new();
    for line in dialogues {
        if !lines.insert((line.scene_id.as_str(), line.sequence)) {
            errors.push(ValidationError::DuplicateId {
                kind: "dialogue line",
                id: format!("{}#{}", line.scene_id, line.sequence),
            });
        }
    }

    let mut trigger_ids = HashSet::new();
    track_ids(
        "trigger",
        triggers.iter().map(|t| t.trigger_id.as_str()),
        &mut trigger_ids,
        &mut errors,
    );

    let mut video_ids = HashSet::new();
    track_ids("video", videos.iter().map(|v| v.id.as_str()), &mut video_ids, &mut errors);

    for line in dialogues {
        if let Some(trigger_id) = &line.trigger_id {
            check_ref(
                "trigger",
                trigger_id,
                &trigger_ids,
                format!("dialogue {}#{}", line.scene_id, line.sequence),
                &mut errors,
            );
        }
    }

    for rule in triggers {
        let context = format!("trigger '{}'", rule.trigger_id);
        match rule.trigger_type.as_str() {
            "dialogue_end" => {
                if rule.dialogue_index.is_none() {
                    errors.push(ValidationError::InvalidValue {
                        context: format!("{context}: dialogue_end without dialogue_index"),
                    });
                }
                check_scene(&rule.scene_id, &scenes, &context, &mut errors);
            },
            "keyword" => {
                if rule.condition.is_empty() {
                    errors.push(ValidationError::InvalidValue {
                        context: format!("{context}: keyword trigger with empty condition"),
                    });
                }
                check_scene(&rule.scene_id, &scenes, &context, &mut errors);
            },
            _ => {},
        }
        match rule.next_action.as_str() {
            "play_video" | "switch_video" => {
                check_ref("video", &rule.action_params, &video_ids, context.clone(), &mut errors);
            },
            "change_scene" => {
                check_scene(&rule.action_params, &scenes, &context, &mut errors);
            },
            _ => {},
        }
    }

    for video in videos {
        if let Some(next) = &video.next_id {
            check_ref("video", next, &video_ids, format!("next of video '{}'", video.id), &mut errors);
        }
    }
    check_video_cycles(videos, &mut errors);

    errors
}

fn check_scene(scene: &str, scenes: &HashSet<&str>, context: &str, errors: &mut Vec<ValidationError>) {
    if ENGINE_SCENES.contains(&scene) {
        return;
    }
    if !scenes.contains(scene) {
        errors.push(ValidationError::MissingReference {
            kind: "scene",
            id: scene.to_string(),
            context: context.to_string(),
        });
    }
}

fn track_ids<'a, I>(kind: &'static str, ids: I, seen: &mut HashSet<&'a str>, errors: &mut Vec<ValidationError>)
where
    I: IntoIterator<Item = &'a str>,
{
    for id in ids {
        if !seen.insert(id) {
            errors.push(ValidationError::DuplicateId {
                kind,
                id: id.to_string(),
            });
        }
    }
}

fn check_ref(kind: &'static str, id: &str, ids: &HashSet<&str>, context: String, errors: &mut Vec<ValidationError>) {
    if !ids.contains(id) {
        errors.push(ValidationError::MissingReference {
            kind,
            id: id.to_string(),
            context,
        });
    }
}

/// A chain that loops back on itself would auto-play forever.
fn check_video_cycles(videos: &[VideoRow], errors: &mut Vec<ValidationError>) {
    let next: HashMap<&str, &str> = videos
        .iter()
        .filter_map(|v| v.next_id.as_deref().map(|n| (v.id.as_str(), n)))
        .collect();
    let mut reported = HashSet::new();
    for video in videos {
        let mut seen = HashSet::from([video.id.as_str()]);
        let mut cursor = video.id.as_str();
        while let Some(&following) = next.get(cursor) {
            if !seen.insert(following) {
                if !reported.contains(following) {
                    // mark the whole loop so other entry points don't repeat it
                    let mut member = following;
                    while reported.insert(member) {
                        member = next[member];
                    }
                    errors.push(ValidationError::InvalidValue {
                        context: format!("video chain starting at '{}' loops at '{following}'", video.id),
                    });
                }
                break;
            }
            cursor = following;
        }
    }
}
