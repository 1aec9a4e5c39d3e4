//! What a fired trigger rule does, and the single place it gets done.

use std::fmt;
use std::str::FromStr;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use variantly::Variantly;

use crate::event::SessionEvent;
use crate::puzzle::Difficulty;
use crate::session::Session;
use crate::trigger::{TriggerError, TriggerRule};
use crate::video::PlayOptions;

/// Rules may chain into other rules (a scene whose first line fires again);
/// past this depth the chain is cut.
const MAX_DISPATCH_DEPTH: usize = 16;

/// The two story endings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Variantly)]
pub enum Ending {
    True,
    Bad,
}

impl Ending {
    /// Key used in save data and data tables.
    pub fn key(self) -> &'static str {
        match self {
            Ending::True => "true_end",
            Ending::Bad => "bad_end",
        }
    }
}

impl fmt::Display for Ending {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Ending {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "true" | "true_end" => Ok(Ending::True),
            "bad" | "bad_end" => Ok(Ending::Bad),
            other => Err(format!("unknown ending '{other}'")),
        }
    }
}

/// Resolved `next_action` + `action_params` of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Variantly)]
pub enum TriggerAction {
    ChangeScene(String),
    PlayVideo(String),
    SwitchVideo(String),
    StartGame(Difficulty),
    ShowEnding(Ending),
    /// Host-defined action, passed through by name.
    Custom(String),
}

impl TriggerAction {
    /// Resolve a raw `next_action` tag and its parameters.
    ///
    /// # Errors
    /// - on an unknown tag, or parameters the action cannot use
    pub fn parse(id: &str, tag: &str, params: &str) -> Result<Self, TriggerError> {
        let invalid = |detail: String| TriggerError::InvalidParams {
            id: id.to_string(),
            detail,
        };
        let required = |what: &str| {
            if params.is_empty() {
                Err(invalid(format!("{tag} needs a {what}")))
            } else {
                Ok(params.to_string())
            }
        };
        match tag {
            "change_scene" => Ok(TriggerAction::ChangeScene(required("scene id")?)),
            "play_video" => Ok(TriggerAction::PlayVideo(required("video id")?)),
            "switch_video" => Ok(TriggerAction::SwitchVideo(required("video id")?)),
            "start_game" if params.is_empty() => Ok(TriggerAction::StartGame(Difficulty::Easy)),
            "start_game" => params.parse().map(TriggerAction::StartGame).map_err(invalid),
            "show_ending" => params.parse().map(TriggerAction::ShowEnding).map_err(invalid),
            "custom" => Ok(TriggerAction::Custom(params.to_string())),
            other => Err(TriggerError::UnknownAction {
                id: id.to_string(),
                tag: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for TriggerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerAction::ChangeScene(scene) => write!(f, "change_scene({scene})"),
            TriggerAction::PlayVideo(id) => write!(f, "play_video({id})"),
            TriggerAction::SwitchVideo(id) => write!(f, "switch_video({id})"),
            TriggerAction::StartGame(d) => write!(f, "start_game({d})"),
            TriggerAction::ShowEnding(e) => write!(f, "show_ending({e})"),
            TriggerAction::Custom(name) => write!(f, "custom({name})"),
        }
    }
}

/// Carry out a fired rule against the session.
///
/// Never blocks: anything that takes time is scheduled by the component it is
/// handed to.
pub fn dispatch_action(session: &mut Session, rule: &TriggerRule) {
    if session.dispatch_depth >= MAX_DISPATCH_DEPTH {
        warn!("trigger '{}' not dispatched: rule chain deeper than {MAX_DISPATCH_DEPTH}", rule.id);
        return;
    }
    info!("└─ trigger '{}': {}", rule.id, rule.action);
    session.emit(SessionEvent::TriggerFired {
        trigger_id: rule.id.clone(),
        action: rule.action.clone(),
    });

    // hosts render the transition ahead of whatever the action starts
    if let Some(transition) = &rule.transition {
        session.emit(SessionEvent::Transition(transition.clone()));
    }

    session.dispatch_depth += 1;
    match &rule.action {
        TriggerAction::ChangeScene(scene) => session.start_scene(scene),
        TriggerAction::PlayVideo(id) => session.play_video(id, PlayOptions::default()),
        TriggerAction::SwitchVideo(id) => session.switch_video(id),
        TriggerAction::StartGame(difficulty) => session.start_puzzle(*difficulty),
        TriggerAction::ShowEnding(ending) => session.show_ending(*ending),
        TriggerAction::Custom(name) => session.emit(SessionEvent::CustomAction(name.clone())),
    }
    session.dispatch_depth -= 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_action_tag() {
        assert_eq!(
            TriggerAction::parse("t", "change_scene", "easy_reward"),
            Ok(TriggerAction::ChangeScene("easy_reward".into()))
        );
        assert_eq!(
            TriggerAction::parse("t", "play_video", "easy_reward_intro"),
            Ok(TriggerAction::PlayVideo("easy_reward_intro".into()))
        );
        assert_eq!(
            TriggerAction::parse("t", "switch_video", "b"),
            Ok(TriggerAction::SwitchVideo("b".into()))
        );
        assert_eq!(
            TriggerAction::parse("t", "start_game", "normal"),
            Ok(TriggerAction::StartGame(Difficulty::Normal))
        );
        assert_eq!(
            TriggerAction::parse("t", "show_ending", "bad_end"),
            Ok(TriggerAction::ShowEnding(Ending::Bad))
        );
        assert_eq!(
            TriggerAction::parse("t", "custom", "confetti"),
            Ok(TriggerAction::Custom("confetti".into()))
        );
    }

    #[test]
    fn empty_params_default_where_sensible() {
        assert_eq!(
            TriggerAction::parse("t", "start_game", ""),
            Ok(TriggerAction::StartGame(Difficulty::Easy))
        );
        assert_eq!(
            TriggerAction::parse("t", "show_ending", ""),
            Ok(TriggerAction::ShowEnding(Ending::True))
        );
        assert!(matches!(
            TriggerAction::parse("t", "play_video", ""),
            Err(TriggerError::InvalidParams { .. })
        ));
    }

    #[test]
    fn unknown_tags_are_rejected() {
        assert_eq!(
            TriggerAction::parse("t", "launch_rocket", "moon"),
            Err(TriggerError::UnknownAction {
                id: "t".into(),
                tag: "launch_rocket".into()
            })
        );
        assert!(matches!(
            TriggerAction::parse("t", "start_game", "extreme"),
            Err(TriggerError::InvalidParams { .. })
        ));
    }

    #[test]
    fn display_is_readable() {
        assert_eq!(TriggerAction::StartGame(Difficulty::Hard).to_string(), "start_game(hard)");
        assert_eq!(Ending::True.to_string(), "true_end");
    }
}
