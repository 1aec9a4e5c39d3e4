//! Trigger module --
//!
//! Declarative rules tie dialogue positions and puzzle outcomes to actions.
//! Rules are resolved into closed enums at load, kept in declaration order, and
//! the first match wins. Custom predicates registered at runtime are consulted
//! after every static rule.

pub mod action;
pub mod condition;

pub use action::*;
pub use condition::*;

use std::fmt;

use jirai_data::TriggerRow;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::puzzle::Difficulty;

/// Problems resolving a raw trigger row. Rules with errors are skipped at load.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriggerError {
    #[error("trigger '{id}': unknown trigger type '{tag}'")]
    UnknownTriggerType { id: String, tag: String },
    #[error("trigger '{id}': unknown action '{tag}'")]
    UnknownAction { id: String, tag: String },
    #[error("trigger '{id}': invalid condition ({detail})")]
    InvalidCondition { id: String, detail: String },
    #[error("trigger '{id}': invalid action parameters ({detail})")]
    InvalidParams { id: String, detail: String },
}

/// Opaque presentation tag handed to the host when a rule fires (`fade`, `white_flash`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition(pub String);

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resolved trigger rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRule {
    pub id: String,
    pub scene_id: String,
    pub dialogue_index: Option<usize>,
    pub kind: TriggerKind,
    pub action: TriggerAction,
    pub transition: Option<Transition>,
}

impl TriggerRule {
    /// Resolve a raw row into a rule.
    ///
    /// # Errors
    /// - on unknown trigger types or actions, or unusable conditions/params
    pub fn from_row(row: &TriggerRow) -> Result<Self, TriggerError> {
        let kind = TriggerKind::parse(&row.trigger_id, &row.trigger_type, &row.condition)?;
        if kind.is_dialogue_end() && row.dialogue_index.is_none() {
            return Err(TriggerError::InvalidCondition {
                id: row.trigger_id.clone(),
                detail: "dialogue_end without a dialogue_index".into(),
            });
        }
        let action = TriggerAction::parse(&row.trigger_id, &row.next_action, &row.action_params)?;
        Ok(Self {
            id: row.trigger_id.clone(),
            scene_id: row.scene_id.clone(),
            dialogue_index: row.dialogue_index,
            kind,
            action,
            transition: row.transition.clone().map(Transition),
        })
    }

    /// Resolve every row, logging and skipping the ones that fail.
    pub fn from_rows(rows: &[TriggerRow]) -> Vec<Self> {
        rows.iter()
            .filter_map(|row| match Self::from_row(row) {
                Ok(rule) => Some(rule),
                Err(err) => {
                    warn!("{err}; rule skipped");
                    None
                },
            })
            .collect()
    }

    /// Shorthand for outcome rules (used by the built-in set).
    pub fn on_outcome(
        id: &str,
        scene_id: &str,
        kind: TriggerKind,
        action: TriggerAction,
        transition: Option<&str>,
    ) -> Self {
        Self {
            id: id.to_string(),
            scene_id: scene_id.to_string(),
            dialogue_index: None,
            kind,
            action,
            transition: transition.map(|t| Transition(t.to_string())),
        }
    }

    fn matches_position(&self, scene_id: &str, index: usize) -> bool {
        self.kind.is_dialogue_end() && self.scene_id == scene_id && self.dialogue_index == Some(index)
    }

    fn matches_keyword(&self, scene_id: &str, text: &str) -> bool {
        match &self.kind {
            TriggerKind::Keyword(keyword) => self.scene_id == scene_id && text.contains(keyword.as_str()),
            _ => false,
        }
    }
}

type Predicate = Box<dyn Fn(&DialogueContext<'_>) -> bool>;

/// A predicate registered at runtime.
pub struct CustomTrigger {
    predicate: Predicate,
    action: TriggerAction,
}

impl fmt::Debug for CustomTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomTrigger")
            .field("action", &self.action)
            .finish_non_exhaustive()
    }
}

/// Where the current rule set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSource {
    Loaded,
    BuiltIn,
}

#[derive(Debug)]
pub struct TriggerRegistry {
    rules: Vec<TriggerRule>,
    custom: Vec<CustomTrigger>,
    source: RuleSource,
}

impl Default for TriggerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl TriggerRegistry {
    /// Registry holding only the built-in rule set.
    pub fn with_defaults() -> Self {
        Self {
            rules: crate::loader::fallback::default_rules(),
            custom: Vec::new(),
            source: RuleSource::BuiltIn,
        }
    }

    /// Replace the static rules. Custom predicates are kept.
    pub fn load(&mut self, rules: Vec<TriggerRule>) {
        info!("trigger registry: {} rules loaded", rules.len());
        self.rules = rules;
        self.source = RuleSource::Loaded;
    }

    /// Load rules, or fall back to the built-in set if loading failed.
    pub fn load_or_default(&mut self, rules: anyhow::Result<Vec<TriggerRule>>) {
        match rules {
            Ok(rules) => self.load(rules),
            Err(err) => {
                warn!("trigger rules unavailable ({err:#}); using built-in rules");
                self.rules = crate::loader::fallback::default_rules();
                self.source = RuleSource::BuiltIn;
            },
        }
    }

    pub fn rules(&self) -> &[TriggerRule] {
        &self.rules
    }

    pub fn source(&self) -> RuleSource {
        self.source
    }

    /// Find the rule for a shown line: exact dialogue_end position first, then a
    /// keyword contained in the text, then custom predicates.
    pub fn match_on_dialogue(&self, scene_id: &str, line_index: usize, text: &str) -> Option<TriggerRule> {
        if let Some(rule) = self.match_dialogue_end(scene_id, line_index) {
            return Some(rule);
        }
        if let Some(rule) = self.rules.iter().find(|r| r.matches_keyword(scene_id, text)) {
            return Some(rule.clone());
        }
        let context = DialogueContext {
            scene_id,
            line_index,
            text,
        };
        self.custom
            .iter()
            .find(|c| (c.predicate)(&context))
            .map(|custom| TriggerRule {
                id: format!("custom_{}", Uuid::new_v4()),
                scene_id: scene_id.to_string(),
                dialogue_index: Some(line_index),
                kind: TriggerKind::DialogueEnd,
                action: custom.action.clone(),
                transition: None,
            })
    }

    /// Only the exact-position rule for (scene, index), if any.
    pub fn match_dialogue_end(&self, scene_id: &str, line_index: usize) -> Option<TriggerRule> {
        self.rules
            .iter()
            .find(|r| r.matches_position(scene_id, line_index))
            .cloned()
    }

    /// Find the rule answering a puzzle result.
    pub fn match_on_outcome(&self, outcome: OutcomeKind, difficulty: Difficulty) -> Option<TriggerRule> {
        self.rules
            .iter()
            .find(|r| r.kind.matches_outcome(outcome, difficulty))
            .cloned()
    }

    /// Add a runtime predicate, consulted after every static rule.
    pub fn register_custom<F>(&mut self, predicate: F, action: TriggerAction)
    where
        F: Fn(&DialogueContext<'_>) -> bool + 'static,
    {
        info!("custom trigger registered: {action}");
        self.custom.push(CustomTrigger {
            predicate: Box::new(predicate),
            action,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn row(id: &str, scene: &str, index: Option<usize>, kind: &str, cond: &str, action: &str, params: &str) -> TriggerRow {
        TriggerRow {
            trigger_id: id.into(),
            scene_id: scene.into(),
            dialogue_index: index,
            trigger_type: kind.into(),
            condition: cond.into(),
            next_action: action.into(),
            action_params: params.into(),
            transition: None,
        }
    }

    fn registry(rows: &[TriggerRow]) -> TriggerRegistry {
        let mut registry = TriggerRegistry::with_defaults();
        registry.load(TriggerRule::from_rows(rows));
        registry
    }

    #[test]
    fn dialogue_end_beats_keyword_at_same_position() {
        let registry = registry(&[
            row("kw", "meeting", Some(2), "keyword", "game", "custom", "keyword"),
            row("end", "meeting", Some(2), "dialogue_end", "", "start_game", "easy"),
        ]);
        let rule = registry.match_on_dialogue("meeting", 2, "let's play a game").unwrap();
        assert_eq!(rule.id, "end");

        let rule = registry.match_on_dialogue("meeting", 1, "let's play a game").unwrap();
        assert_eq!(rule.id, "kw");
    }

    #[test]
    fn keyword_is_a_literal_substring() {
        let registry = registry(&[row("kw", "meeting", None, "keyword", "cat", "custom", "")]);
        // no word boundaries: "concatenate" contains "cat"
        assert!(registry.match_on_dialogue("meeting", 0, "concatenate").is_some());
        assert!(registry.match_on_dialogue("meeting", 0, "CAT").is_none());
        assert!(registry.match_on_dialogue("dinner_scene", 0, "cat").is_none());
    }

    #[test]
    fn first_declared_rule_wins() {
        let registry = registry(&[
            row("first", "s", Some(0), "dialogue_end", "", "custom", "one"),
            row("second", "s", Some(0), "dialogue_end", "", "custom", "two"),
        ]);
        assert_eq!(registry.match_on_dialogue("s", 0, "").unwrap().id, "first");
    }

    #[test]
    fn bad_rows_are_skipped_at_load() {
        let rules = TriggerRule::from_rows(&[
            row("ok", "s", Some(0), "dialogue_end", "", "custom", ""),
            row("bad_type", "s", Some(0), "on_blink", "", "custom", ""),
            row("bad_action", "s", Some(0), "dialogue_end", "", "teleport", ""),
            row("no_index", "s", None, "dialogue_end", "", "custom", ""),
        ]);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, "ok");
    }

    #[test]
    fn outcome_lookup() {
        let registry = registry(&[
            row("clear", "meeting_game", None, "game_clear", "easy", "play_video", "easy_reward_intro"),
            row("fail", "meeting_game", None, "game_fail", "easy", "show_ending", "bad_end"),
        ]);
        assert_eq!(
            registry.match_on_outcome(OutcomeKind::Clear, Difficulty::Easy).unwrap().action,
            TriggerAction::PlayVideo("easy_reward_intro".into())
        );
        assert_eq!(
            registry.match_on_outcome(OutcomeKind::Fail, Difficulty::Easy).unwrap().id,
            "fail"
        );
        assert!(registry.match_on_outcome(OutcomeKind::Clear, Difficulty::Hard).is_none());
    }

    #[test]
    fn failed_load_answers_from_defaults() {
        let mut registry = TriggerRegistry::with_defaults();
        registry.load(Vec::new());
        assert!(registry.match_on_outcome(OutcomeKind::Clear, Difficulty::Hard).is_none());

        registry.load_or_default(Err(anyhow!("triggers.toml missing")));
        assert_eq!(registry.source(), RuleSource::BuiltIn);
        let rule = registry.match_on_outcome(OutcomeKind::Clear, Difficulty::Hard).unwrap();
        assert_eq!(rule.action, TriggerAction::ChangeScene("hard_reward".into()));
        assert_eq!(rule.transition, Some(Transition("fade".into())));
    }

    #[test]
    fn custom_predicates_come_last_with_fresh_ids() {
        let mut registry = registry(&[row("kw", "s", None, "keyword", "hello", "custom", "static")]);
        registry.register_custom(|ctx| ctx.line_index == 4, TriggerAction::Custom("dynamic".into()));

        assert_eq!(registry.match_on_dialogue("s", 4, "hello").unwrap().id, "kw");

        let first = registry.match_on_dialogue("s", 4, "bye").unwrap();
        let second = registry.match_on_dialogue("s", 4, "bye").unwrap();
        assert!(first.id.starts_with("custom_"));
        assert_ne!(first.id, second.id);
        assert_eq!(first.action, TriggerAction::Custom("dynamic".into()));
        assert!(registry.match_on_dialogue("s", 3, "bye").is_none());
    }

    #[test]
    fn custom_predicates_survive_reload() {
        let mut registry = TriggerRegistry::with_defaults();
        registry.register_custom(|ctx| ctx.text.is_empty(), TriggerAction::Custom("empty".into()));
        registry.load(Vec::new());
        assert!(registry.match_on_dialogue("any", 0, "").is_some());
    }
}
