//! Dialogue playback.
//!
//! The engine walks one scene at a time: `Idle → Typing → AwaitingAdvance →
//! Typing | SceneEnd`. Each shown line is checked against the trigger registry
//! first; a match takes over and the line text is never displayed. Whatever the
//! engine cannot do itself (start a puzzle, change scene, ...) is handed back to
//! the session as a [`Handoff`].

use log::{info, warn};
use serde::{Deserialize, Serialize};
use variantly::Variantly;

use crate::event::{EventLog, SessionEvent};
use crate::scheduler::{Deferred, Millis, Scheduler, TaskHandle};
use crate::script::{DialogueLine, LineAction, ScriptCatalog};
use crate::trigger::{TriggerRegistry, TriggerRule};

/// Delay before a narrator line's action runs.
pub const LINE_ACTION_DELAY_MS: Millis = 2000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Variantly)]
pub enum Phase {
    #[default]
    Idle,
    Typing,
    AwaitingAdvance,
    SceneEnd,
}

/// Cursor and modes of the dialogue engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub scene_id: Option<String>,
    pub line_index: usize,
    pub phase: Phase,
    /// Advance automatically once a line is fully shown.
    pub auto: bool,
    /// Show lines in full without the typewriter.
    pub skip: bool,
    /// Characters of the current line revealed so far.
    pub revealed: usize,
    /// Lines shown in this scene.
    pub log: Vec<DialogueLine>,
}

/// Work the dialogue engine hands to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Handoff {
    Rule(TriggerRule),
    LineAction { action: LineAction, scene_id: String },
}

/// Everything the engine borrows from the session for one call.
pub struct NovelCtx<'a> {
    pub scripts: &'a ScriptCatalog,
    pub registry: &'a TriggerRegistry,
    pub scheduler: &'a mut Scheduler,
    pub events: &'a mut EventLog,
    pub now: Millis,
    pub text_speed_ms: Millis,
    pub auto_speed_ms: Millis,
}

#[derive(Debug, Clone, Default)]
pub struct DialogueEngine {
    playback: PlaybackState,
    typing_task: Option<TaskHandle>,
    auto_task: Option<TaskHandle>,
    action_task: Option<(TaskHandle, LineAction)>,
}

impl DialogueEngine {
    pub fn playback(&self) -> &PlaybackState {
        &self.playback
    }

    pub fn phase(&self) -> Phase {
        self.playback.phase
    }

    pub fn line_index(&self) -> usize {
        self.playback.line_index
    }

    pub fn scene_id(&self) -> Option<&str> {
        self.playback.scene_id.as_deref()
    }

    pub fn is_auto(&self) -> bool {
        self.playback.auto
    }

    pub fn is_skip(&self) -> bool {
        self.playback.skip
    }

    pub fn current_line<'s>(&self, scripts: &'s ScriptCatalog) -> Option<&'s DialogueLine> {
        scripts.line(self.scene_id()?, self.playback.line_index)
    }

    /// The part of the current line revealed so far.
    pub fn visible_text<'s>(&self, scripts: &'s ScriptCatalog) -> &'s str {
        self.current_line(scripts)
            .map_or("", |line| line.visible_text(self.playback.revealed))
    }

    /// Revoke every timer this engine owns.
    pub fn cancel_timers(&mut self, scheduler: &mut Scheduler) {
        scheduler.cancel_opt(&mut self.typing_task);
        scheduler.cancel_opt(&mut self.auto_task);
        if let Some((handle, _)) = self.action_task.take() {
            scheduler.cancel(handle);
        }
    }

    /// Start `scene_id` from its first line. Auto and skip modes carry over.
    pub fn start_scene(&mut self, scene_id: &str, ctx: &mut NovelCtx<'_>) -> Option<Handoff> {
        self.cancel_timers(ctx.scheduler);
        let (auto, skip) = (self.playback.auto, self.playback.skip);
        self.playback = PlaybackState {
            auto,
            skip,
            ..PlaybackState::default()
        };
        if !ctx.scripts.contains(scene_id) {
            warn!("scene '{scene_id}' not found; dialogue idle");
            return None;
        }
        info!("scene start: {scene_id}");
        self.playback.scene_id = Some(scene_id.to_string());
        ctx.events.push(SessionEvent::SceneStarted {
            scene_id: scene_id.to_string(),
        });
        self.show_current_line(ctx)
    }

    /// Display the line under the cursor, unless a trigger rule takes over.
    pub fn show_current_line(&mut self, ctx: &mut NovelCtx<'_>) -> Option<Handoff> {
        let scripts = ctx.scripts;
        let scene_id = self.playback.scene_id.clone()?;
        let index = self.playback.line_index;
        let Some(line) = scripts.line(&scene_id, index) else {
            self.end_scene(&scene_id, ctx);
            return None;
        };

        if let Some(rule) = ctx.registry.match_on_dialogue(&scene_id, index, &line.text) {
            self.cancel_timers(ctx.scheduler);
            self.playback.phase = Phase::AwaitingAdvance;
            return Some(Handoff::Rule(rule));
        }

        self.playback.log.push(line.clone());
        self.playback.revealed = 0;
        ctx.events.push(SessionEvent::LineStarted {
            scene_id: scene_id.clone(),
            index,
            speaker: line.speaker.clone(),
            text: line.text.clone(),
            emotion: line.emotion.clone(),
            voice: line.voice_ref.clone(),
        });

        if line.is_narration() {
            if let Some(action) = line.action {
                self.reveal_in_full(line.char_count(), ctx);
                let handle = ctx.scheduler.schedule_in(
                    ctx.now,
                    LINE_ACTION_DELAY_MS,
                    Deferred::LineAction(action),
                    Some(&format!("{scene_id}#{index}: {action}")),
                );
                self.action_task = Some((handle, action));
            } else {
                self.finish_line(line.char_count(), ctx);
            }
        } else if self.playback.skip || line.char_count() == 0 {
            self.finish_line(line.char_count(), ctx);
        } else {
            self.playback.phase = Phase::Typing;
            self.schedule_tick(ctx);
        }
        None
    }

    /// Player input: finish a reveal in progress, or move to the next line.
    pub fn advance(&mut self, ctx: &mut NovelCtx<'_>) -> Option<Handoff> {
        match self.playback.phase {
            Phase::Idle | Phase::SceneEnd => None,
            Phase::Typing => {
                self.complete_reveal(ctx);
                None
            },
            Phase::AwaitingAdvance => {
                let scene_id = self.playback.scene_id.clone()?;
                // advancing past a narrator line runs its action now
                if let Some((handle, action)) = self.action_task.take() {
                    ctx.scheduler.cancel(handle);
                    return Some(Handoff::LineAction { action, scene_id });
                }
                if let Some(rule) = ctx.registry.match_dialogue_end(&scene_id, self.playback.line_index) {
                    return Some(Handoff::Rule(rule));
                }
                self.step_forward(ctx)
            },
        }
    }

    /// Move past the current line without re-checking its rule. Used when the
    /// story resumes after something the current line started.
    pub fn resume(&mut self, ctx: &mut NovelCtx<'_>) -> Option<Handoff> {
        match self.playback.phase {
            Phase::Idle | Phase::SceneEnd => None,
            Phase::Typing | Phase::AwaitingAdvance => self.step_forward(ctx),
        }
    }

    /// Show the current line in full (player hurry-up or skip mode).
    pub fn complete_reveal(&mut self, ctx: &mut NovelCtx<'_>) {
        if !self.playback.phase.is_typing() {
            return;
        }
        let total = self.current_line(ctx.scripts).map_or(0, DialogueLine::char_count);
        self.finish_line(total, ctx);
    }

    /// Scheduler callback: reveal one more character.
    pub fn type_next_char(&mut self, ctx: &mut NovelCtx<'_>) {
        self.typing_task = None;
        if !self.playback.phase.is_typing() {
            return;
        }
        let total = self.current_line(ctx.scripts).map_or(0, DialogueLine::char_count);
        self.playback.revealed += 1;
        if self.playback.revealed >= total {
            self.finish_line(total, ctx);
        } else {
            self.schedule_tick(ctx);
        }
    }

    /// Scheduler callback: auto mode advance.
    pub fn auto_advance(&mut self, ctx: &mut NovelCtx<'_>) -> Option<Handoff> {
        self.auto_task = None;
        if self.playback.auto && self.playback.phase.is_awaiting_advance() {
            self.advance(ctx)
        } else {
            None
        }
    }

    /// Scheduler callback: a narrator line's action is due.
    pub fn line_action_due(&mut self) -> Option<Handoff> {
        let (_, action) = self.action_task.take()?;
        let scene_id = self.playback.scene_id.clone()?;
        Some(Handoff::LineAction { action, scene_id })
    }

    pub fn set_auto(&mut self, on: bool, ctx: &mut NovelCtx<'_>) {
        self.playback.auto = on;
        if on {
            if self.playback.phase.is_awaiting_advance() && self.action_task.is_none() && self.auto_task.is_none() {
                self.schedule_auto(ctx);
            }
        } else {
            ctx.scheduler.cancel_opt(&mut self.auto_task);
        }
    }

    pub fn set_skip(&mut self, on: bool, ctx: &mut NovelCtx<'_>) {
        self.playback.skip = on;
        if on {
            self.complete_reveal(ctx);
        }
    }

    fn step_forward(&mut self, ctx: &mut NovelCtx<'_>) -> Option<Handoff> {
        self.cancel_timers(ctx.scheduler);
        self.playback.line_index += 1;
        self.show_current_line(ctx)
    }

    fn reveal_in_full(&mut self, total: usize, ctx: &mut NovelCtx<'_>) {
        ctx.scheduler.cancel_opt(&mut self.typing_task);
        self.playback.revealed = total;
        self.playback.phase = Phase::AwaitingAdvance;
        ctx.events.push(SessionEvent::LineCompleted {
            index: self.playback.line_index,
        });
    }

    fn finish_line(&mut self, total: usize, ctx: &mut NovelCtx<'_>) {
        self.reveal_in_full(total, ctx);
        if self.playback.auto {
            self.schedule_auto(ctx);
        }
    }

    fn schedule_tick(&mut self, ctx: &mut NovelCtx<'_>) {
        self.typing_task = Some(
            ctx.scheduler
                .schedule_in(ctx.now, ctx.text_speed_ms, Deferred::TypeNextChar, None),
        );
    }

    fn schedule_auto(&mut self, ctx: &mut NovelCtx<'_>) {
        self.auto_task = Some(ctx.scheduler.schedule_in(
            ctx.now,
            ctx.auto_speed_ms,
            Deferred::AutoAdvance,
            Some("auto advance"),
        ));
    }

    fn end_scene(&mut self, scene_id: &str, ctx: &mut NovelCtx<'_>) {
        self.cancel_timers(ctx.scheduler);
        if !self.playback.phase.is_scene_end() {
            info!("scene end: {scene_id}");
            self.playback.phase = Phase::SceneEnd;
            ctx.events.push(SessionEvent::SceneEnded {
                scene_id: scene_id.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::SceneScript;
    use crate::trigger::{TriggerAction, TriggerRule};
    use jirai_data::TriggerRow;

    struct Rig {
        scripts: ScriptCatalog,
        registry: TriggerRegistry,
        scheduler: Scheduler,
        events: EventLog,
        now: Millis,
    }

    impl Rig {
        fn new(rules: &[TriggerRow]) -> Self {
            let scripts = ScriptCatalog::from_scenes([
                SceneScript {
                    id: "meeting".into(),
                    lines: vec![
                        DialogueLine::new("Ami", "Hi", "smile"),
                        DialogueLine::new("Ami", "Late again?", "irritated"),
                        DialogueLine::new("Ami", "Let's play a game", "angry"),
                        DialogueLine::new("system", "She is upset!", "").with_action(LineAction::StartGame),
                    ],
                },
                SceneScript {
                    id: "short".into(),
                    lines: vec![DialogueLine::new("Ami", "Bye", "smile")],
                },
            ]);
            let mut registry = TriggerRegistry::with_defaults();
            registry.load(TriggerRule::from_rows(rules));
            Self {
                scripts,
                registry,
                scheduler: Scheduler::default(),
                events: EventLog::default(),
                now: 0,
            }
        }

        fn ctx(&mut self) -> NovelCtx<'_> {
            NovelCtx {
                scripts: &self.scripts,
                registry: &self.registry,
                scheduler: &mut self.scheduler,
                events: &mut self.events,
                now: self.now,
                text_speed_ms: 50,
                auto_speed_ms: 2000,
            }
        }

        /// Run due tasks up to `until`, feeding them to the engine.
        fn run_until(&mut self, engine: &mut DialogueEngine, until: Millis) -> Vec<Handoff> {
            let mut handoffs = Vec::new();
            while let Some(due) = self.scheduler.next_due() {
                if due > until {
                    break;
                }
                self.now = due;
                let Some(task) = self.scheduler.pop_due(due) else { break };
                let mut ctx = self.ctx();
                let handoff = match task.task {
                    Deferred::TypeNextChar => {
                        engine.type_next_char(&mut ctx);
                        None
                    },
                    Deferred::AutoAdvance => engine.auto_advance(&mut ctx),
                    Deferred::LineAction(_) => engine.line_action_due(),
                    _ => None,
                };
                handoffs.extend(handoff);
            }
            self.now = until;
            handoffs
        }
    }

    fn end_rule(index: usize) -> TriggerRow {
        TriggerRow {
            trigger_id: "meeting_game".into(),
            scene_id: "meeting".into(),
            dialogue_index: Some(index),
            trigger_type: "dialogue_end".into(),
            condition: String::new(),
            next_action: "start_game".into(),
            action_params: "easy".into(),
            transition: None,
        }
    }

    #[test]
    fn typewriter_reveals_one_char_per_tick() {
        let mut rig = Rig::new(&[]);
        let mut engine = DialogueEngine::default();
        assert!(engine.start_scene("meeting", &mut rig.ctx()).is_none());
        assert!(engine.phase().is_typing());

        rig.run_until(&mut engine, 50);
        assert_eq!(engine.visible_text(&rig.scripts), "H");
        rig.run_until(&mut engine, 100);
        assert!(engine.phase().is_awaiting_advance());
        assert_eq!(engine.visible_text(&rig.scripts), "Hi");
    }

    #[test]
    fn advance_mid_reveal_only_completes_the_line() {
        let mut rig = Rig::new(&[]);
        let mut engine = DialogueEngine::default();
        engine.start_scene("meeting", &mut rig.ctx());
        engine.advance(&mut rig.ctx());
        assert!(engine.phase().is_awaiting_advance());
        assert_eq!(engine.line_index(), 0);
        // the cancelled tick never fires
        assert_eq!(rig.scheduler.pending(), 0);

        engine.advance(&mut rig.ctx());
        assert_eq!(engine.line_index(), 1);
        assert!(engine.phase().is_typing());
    }

    #[test]
    fn dialogue_end_rule_takes_over_and_holds_the_cursor() {
        let mut rig = Rig::new(&[end_rule(2)]);
        let mut engine = DialogueEngine::default();
        engine.start_scene("meeting", &mut rig.ctx());
        engine.set_skip(true, &mut rig.ctx());
        engine.advance(&mut rig.ctx());
        let handoff = engine.advance(&mut rig.ctx()).unwrap();
        assert_eq!(engine.line_index(), 2);
        match handoff {
            Handoff::Rule(rule) => assert_eq!(rule.action, TriggerAction::StartGame(crate::puzzle::Difficulty::Easy)),
            other => panic!("unexpected {other:?}"),
        }
        // the takeover line was never displayed
        assert!(
            !rig.events
                .entries()
                .iter()
                .any(|e| matches!(e, SessionEvent::LineStarted { index: 2, .. }))
        );

        let again = engine.advance(&mut rig.ctx());
        assert!(matches!(again, Some(Handoff::Rule(_))));
        assert_eq!(engine.line_index(), 2);
    }

    #[test]
    fn narrator_action_runs_after_delay() {
        let mut rig = Rig::new(&[]);
        let mut engine = DialogueEngine::default();
        engine.set_skip(true, &mut rig.ctx());
        engine.start_scene("meeting", &mut rig.ctx());
        for _ in 0..3 {
            engine.advance(&mut rig.ctx());
        }
        assert_eq!(engine.line_index(), 3);
        assert!(rig.run_until(&mut engine, 1999).is_empty());
        let handoffs = rig.run_until(&mut engine, 2000);
        assert_eq!(
            handoffs,
            vec![Handoff::LineAction {
                action: LineAction::StartGame,
                scene_id: "meeting".into()
            }]
        );
    }

    #[test]
    fn advancing_past_narrator_line_runs_action_immediately() {
        let mut rig = Rig::new(&[]);
        let mut engine = DialogueEngine::default();
        engine.set_skip(true, &mut rig.ctx());
        engine.start_scene("meeting", &mut rig.ctx());
        for _ in 0..3 {
            engine.advance(&mut rig.ctx());
        }
        let handoff = engine.advance(&mut rig.ctx());
        assert!(matches!(handoff, Some(Handoff::LineAction { .. })));
        assert_eq!(rig.scheduler.pending(), 0);
    }

    #[test]
    fn auto_mode_advances_after_delay() {
        let mut rig = Rig::new(&[]);
        let mut engine = DialogueEngine::default();
        engine.set_auto(true, &mut rig.ctx());
        engine.start_scene("meeting", &mut rig.ctx());
        // "Hi" types in 100ms, then 2000ms of auto delay
        rig.run_until(&mut engine, 2099);
        assert_eq!(engine.line_index(), 0);
        rig.run_until(&mut engine, 2100);
        assert_eq!(engine.line_index(), 1);

        engine.set_auto(false, &mut rig.ctx());
        rig.run_until(&mut engine, 60_000);
        assert_eq!(engine.line_index(), 1);
    }

    #[test]
    fn scene_end_and_restart_resets_cursor_and_log() {
        let mut rig = Rig::new(&[]);
        let mut engine = DialogueEngine::default();
        engine.set_skip(true, &mut rig.ctx());
        engine.start_scene("short", &mut rig.ctx());
        engine.advance(&mut rig.ctx());
        assert!(engine.phase().is_scene_end());
        assert!(
            rig.events
                .entries()
                .iter()
                .any(|e| matches!(e, SessionEvent::SceneEnded { .. }))
        );
        assert!(engine.advance(&mut rig.ctx()).is_none());

        engine.start_scene("meeting", &mut rig.ctx());
        assert_eq!(engine.line_index(), 0);
        assert_eq!(engine.playback().log.len(), 1);
        assert!(engine.is_skip());
    }

    #[test]
    fn unknown_scene_leaves_engine_idle() {
        let mut rig = Rig::new(&[]);
        let mut engine = DialogueEngine::default();
        assert!(engine.start_scene("nowhere", &mut rig.ctx()).is_none());
        assert!(engine.phase().is_idle());
        assert!(engine.scene_id().is_none());
    }

    #[test]
    fn restarting_a_scene_cancels_pending_ticks() {
        let mut rig = Rig::new(&[]);
        let mut engine = DialogueEngine::default();
        engine.start_scene("meeting", &mut rig.ctx());
        engine.start_scene("short", &mut rig.ctx());
        assert_eq!(rig.scheduler.pending(), 1);
        rig.run_until(&mut engine, 50);
        assert_eq!(engine.visible_text(&rig.scripts), "B");
    }
}
