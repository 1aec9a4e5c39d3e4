//! Session orchestration.
//!
//! A [`Session`] owns every component plus the state they share, and is the only
//! place where their results meet: dialogue handoffs are dispatched here, puzzle
//! outcomes become save mutations and story beats here, and a finished video
//! sequence hands the story back from here. Hosts drive it with input calls and
//! [`Session::advance_clock`], then drain the event log.

use jirai_data::{VIDEO_END_SCENE, VIDEO_END_TEXT};
use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::JIRAI_VERSION;
use crate::event::{EventLog, SessionEvent};
use crate::loader::GameData;
use crate::novel::{DialogueEngine, Handoff, NovelCtx};
use crate::persistence::{OPENING_SCENE, Persistence, Progress, SaveState, Settings};
use crate::puzzle::{self, Difficulty, LossReason, PuzzleEngine, PuzzleOutcome, RevealOutcome};
use crate::scheduler::{Deferred, Millis, ScheduledTask, Scheduler, TaskHandle};
use crate::script::{LineAction, ScriptCatalog, next_stage, scene_after_clear, stage_for_scene};
use crate::state::{AFFECTION_BAD_END, Affection, Screen, SessionState};
use crate::trigger::{
    DialogueContext, Ending, OutcomeKind, TriggerAction, TriggerRegistry, dispatch_action,
};
use crate::video::{MediaResolver, PlayOptions, VideoCatalog, VideoCtx, VideoSequencer, VideoStep};

/// Pause between the end of a puzzle round and the next story beat.
pub const AFTERMATH_DELAY_MS: Millis = 1500;
/// One countdown tick.
pub const COUNTDOWN_TICK_MS: Millis = 1000;

macro_rules! novel_ctx {
    ($session:ident) => {
        NovelCtx {
            scripts: &$session.scripts,
            registry: &$session.registry,
            scheduler: &mut $session.scheduler,
            events: &mut $session.events,
            now: $session.now,
            text_speed_ms: $session.state.settings.text_speed_ms,
            auto_speed_ms: $session.state.settings.auto_speed_ms,
        }
    };
}

macro_rules! video_ctx {
    ($session:ident) => {
        VideoCtx {
            catalog: &$session.catalog,
            media: &*$session.media,
            scheduler: &mut $session.scheduler,
            events: &mut $session.events,
            now: $session.now,
            age_confirmed: &mut $session.state.age_confirmed,
            default_volume: $session.state.settings.video_volume,
        }
    };
}

/// Where the story picks up once a video sequence is over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum ResumePoint {
    /// Step past the dialogue line that started the video.
    #[default]
    Dialogue,
    /// Start a scene (videos started from a puzzle outcome).
    Scene(String),
    /// Back to the title (gallery playback).
    Title,
}

pub struct Session {
    state: SessionState,
    scripts: ScriptCatalog,
    registry: TriggerRegistry,
    catalog: VideoCatalog,
    novel: DialogueEngine,
    puzzle: Option<PuzzleEngine>,
    videos: VideoSequencer,
    scheduler: Scheduler,
    events: EventLog,
    now: Millis,
    playtime_ms: Millis,
    countdown: Option<TaskHandle>,
    aftermath: Option<TaskHandle>,
    resume: ResumePoint,
    next_layout: Option<Vec<usize>>,
    persistence: Box<dyn Persistence>,
    media: Box<dyn MediaResolver>,
    rng: StdRng,
    pub(crate) dispatch_depth: usize,
}

impl Session {
    /// Build a session from loaded content and its collaborators. Save and
    /// settings problems are reported as notices; the session always starts.
    pub fn new(data: GameData, persistence: Box<dyn Persistence>, media: Box<dyn MediaResolver>) -> Self {
        let mut events = EventLog::default();
        let save = match persistence.load_save() {
            Ok(Some(save)) => {
                if save.version != JIRAI_VERSION {
                    warn!("save written by version {} (running {JIRAI_VERSION})", save.version);
                    events.push(SessionEvent::Notice(format!(
                        "Save data comes from version {}; loading it anyway.",
                        save.version
                    )));
                }
                save
            },
            Ok(None) => SaveState::default(),
            Err(err) => {
                warn!("save unreadable ({err:#}); starting fresh");
                events.push(SessionEvent::Notice("Save data could not be read; starting fresh.".into()));
                SaveState::default()
            },
        };
        let settings = persistence.load_settings().unwrap_or_else(|err| {
            warn!("settings unreadable ({err:#}); using defaults");
            Settings::default()
        });

        let mut registry = TriggerRegistry::with_defaults();
        registry.load_or_default(data.rules);

        info!("session ready: {} scenes, {} clips", data.scripts.len(), data.videos.len());
        Self {
            state: SessionState::new(save, settings),
            scripts: data.scripts,
            registry,
            catalog: data.videos,
            novel: DialogueEngine::default(),
            puzzle: None,
            videos: VideoSequencer::default(),
            scheduler: Scheduler::default(),
            events,
            now: 0,
            playtime_ms: 0,
            countdown: None,
            aftermath: None,
            resume: ResumePoint::default(),
            next_layout: None,
            persistence,
            media,
            rng: StdRng::from_os_rng(),
            dispatch_depth: 0,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn scripts(&self) -> &ScriptCatalog {
        &self.scripts
    }

    pub fn registry(&self) -> &TriggerRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &VideoCatalog {
        &self.catalog
    }

    pub fn dialogue(&self) -> &DialogueEngine {
        &self.novel
    }

    pub fn puzzle(&self) -> Option<&PuzzleEngine> {
        self.puzzle.as_ref()
    }

    pub fn video(&self) -> &VideoSequencer {
        &self.videos
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn now(&self) -> Millis {
        self.now
    }

    /// The part of the current line revealed so far.
    pub fn visible_text(&self) -> &str {
        self.novel.visible_text(&self.scripts)
    }

    pub fn emit(&mut self, event: SessionEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[SessionEvent] {
        self.events.entries()
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        self.events.drain()
    }

    /// Make mine placement reproducible.
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Use a fixed mine layout for the next round instead of random placement.
    pub fn set_next_layout(&mut self, mines: Vec<usize>) {
        self.next_layout = Some(mines);
    }

    /// Add a runtime dialogue predicate, consulted after every static rule.
    pub fn register_custom_trigger<F>(&mut self, predicate: F, action: TriggerAction)
    where
        F: Fn(&DialogueContext<'_>) -> bool + 'static,
    {
        self.registry.register_custom(predicate, action);
    }

    /// Drop every timer and in-flight component state.
    fn reset_runtime(&mut self) {
        self.scheduler.clear();
        self.novel = DialogueEngine::default();
        self.puzzle = None;
        self.videos = VideoSequencer::default();
        self.countdown = None;
        self.aftermath = None;
        self.resume = ResumePoint::default();
        self.state.affection = Affection::default();
        self.state.difficulty = None;
        self.state.failed_attempts.clear();
    }

    /// Start over from the opening scene. Statistics and gallery are kept.
    pub fn new_game(&mut self) {
        info!("new game");
        self.reset_runtime();
        self.state.save.progress = Progress::default();
        self.start_scene(OPENING_SCENE);
    }

    /// Resume from the saved checkpoint: the scene after a cleared stage, or a
    /// fresh round of the stage that was in progress. Returns false when there
    /// is nothing to continue.
    pub fn continue_game(&mut self) -> bool {
        let Some(checkpoint) = self.state.save.progress.checkpoint.clone() else {
            self.emit(SessionEvent::Notice("No saved game to continue.".into()));
            return false;
        };
        info!("continue from checkpoint '{checkpoint}'");
        self.reset_runtime();
        if let Some(stage) = checkpoint.strip_suffix("_clear") {
            match stage.parse::<Difficulty>() {
                Ok(difficulty) => {
                    let scene = scene_after_clear(difficulty).unwrap_or(Ending::True.key());
                    self.start_scene(scene);
                },
                Err(err) => {
                    warn!("bad checkpoint '{checkpoint}' ({err})");
                    let scene = self.state.save.progress.current_scene.clone();
                    self.start_scene(&scene);
                },
            }
        } else {
            match checkpoint.parse::<Difficulty>() {
                Ok(difficulty) => self.start_puzzle(difficulty),
                Err(err) => {
                    warn!("bad checkpoint '{checkpoint}' ({err})");
                    let scene = self.state.save.progress.current_scene.clone();
                    self.start_scene(&scene);
                },
            }
        }
        true
    }

    /// Leave whatever is running and go back to the title.
    pub fn return_to_title(&mut self) {
        self.reset_runtime();
        self.state.screen = Screen::Title;
    }

    /// Write the save through the persistence collaborator. A failure becomes a
    /// notice; play continues either way.
    pub fn save(&mut self) -> bool {
        self.state.save.progress.total_playtime_secs += self.playtime_ms / 1000;
        self.playtime_ms %= 1000;
        self.state.save.stamp();
        match self.persistence.save_save(&self.state.save) {
            Ok(()) => true,
            Err(err) => {
                error!("saving failed: {err:#}");
                self.emit(SessionEvent::Notice("Progress could not be saved.".into()));
                false
            },
        }
    }

    /// Change settings and persist them.
    pub fn update_settings(&mut self, change: impl FnOnce(&mut Settings)) -> bool {
        change(&mut self.state.settings);
        match self.persistence.save_settings(&self.state.settings) {
            Ok(()) => true,
            Err(err) => {
                error!("saving settings failed: {err:#}");
                self.emit(SessionEvent::Notice("Settings could not be saved.".into()));
                false
            },
        }
    }

    /// Move the session clock forward, running every task that comes due in
    /// order. Tasks scheduled while running are picked up if they fall inside
    /// the window.
    pub fn advance_clock(&mut self, ms: Millis) {
        let target = self.now.saturating_add(ms);
        while let Some(due) = self.scheduler.next_due()
            && due <= target
        {
            self.now = self.now.max(due);
            if let Some(task) = self.scheduler.pop_due(self.now) {
                self.run_task(task);
            }
        }
        self.now = target;
        self.playtime_ms = self.playtime_ms.saturating_add(ms);
    }

    fn run_task(&mut self, scheduled: ScheduledTask) {
        match scheduled.task {
            Deferred::TypeNextChar => self.novel.type_next_char(&mut novel_ctx!(self)),
            Deferred::AutoAdvance => {
                let handoff = self.novel.auto_advance(&mut novel_ctx!(self));
                self.handle(handoff);
            },
            Deferred::LineAction(_) => {
                let handoff = self.novel.line_action_due();
                self.handle(handoff);
            },
            Deferred::PuzzleCountdown => self.countdown_tick(),
            Deferred::PuzzleAftermath(outcome) => {
                self.aftermath = None;
                self.puzzle_aftermath(outcome);
            },
            Deferred::VideoChainAdvance => {
                let step = self.videos.chain_advance(&mut video_ctx!(self));
                self.video_step(step);
            },
            Deferred::VideoSequenceEnd => {
                let step = self.videos.sequence_end(&mut video_ctx!(self));
                self.video_step(step);
            },
        }
    }

    fn handle(&mut self, handoff: Option<Handoff>) {
        match handoff {
            Some(Handoff::Rule(rule)) => dispatch_action(self, &rule),
            Some(Handoff::LineAction { action, scene_id }) => self.run_line_action(action, &scene_id),
            None => {},
        }
    }

    /// Start `scene_id` from its first line. A missing scene lands on the title.
    pub fn start_scene(&mut self, scene_id: &str) {
        self.stop_puzzle();
        self.videos.close(&mut self.scheduler, &mut self.events);
        self.resume = ResumePoint::default();
        let known = self.scripts.contains(scene_id);
        if known {
            self.state.screen = Screen::Novel;
            self.state.save.progress.current_scene = scene_id.to_string();
        } else {
            self.emit(SessionEvent::Notice(format!("Scene '{scene_id}' is missing.")));
        }
        // an unknown id still resets the dialogue engine to idle
        let handoff = self.novel.start_scene(scene_id, &mut novel_ctx!(self));
        if !known {
            self.state.screen = Screen::Title;
        }
        self.handle(handoff);
    }

    /// Player input on the dialogue screen.
    pub fn advance(&mut self) {
        if !self.state.screen.is_novel() {
            return;
        }
        let handoff = self.novel.advance(&mut novel_ctx!(self));
        self.handle(handoff);
    }

    pub fn set_auto(&mut self, on: bool) {
        self.novel.set_auto(on, &mut novel_ctx!(self));
    }

    pub fn set_skip(&mut self, on: bool) {
        self.novel.set_skip(on, &mut novel_ctx!(self));
    }

    fn run_line_action(&mut self, action: LineAction, scene_id: &str) {
        info!("line action {action} from '{scene_id}'");
        match action {
            LineAction::StartGame => self.start_puzzle(stage_for_scene(scene_id)),
            LineAction::ShowEnding if scene_id == Ending::True.key() => self.show_ending(Ending::True),
            LineAction::ShowEnding => warn!("show_ending ignored outside '{}'", Ending::True.key()),
            LineAction::NextStage => match next_stage(scene_id) {
                Some(next) => self.start_scene(next),
                None => warn!("no stage follows '{scene_id}'"),
            },
        }
    }

    /// Start a round of `difficulty` and its countdown.
    pub fn start_puzzle(&mut self, difficulty: Difficulty) {
        self.stop_puzzle();
        self.novel.cancel_timers(&mut self.scheduler);
        self.videos.close(&mut self.scheduler, &mut self.events);

        let config = difficulty.config();
        let engine = match self.next_layout.take() {
            Some(mines) => PuzzleEngine::with_layout(difficulty, config, &mines),
            None => PuzzleEngine::start(difficulty, self.rng.random()),
        };
        self.puzzle = Some(engine);
        self.state.difficulty = Some(difficulty);
        self.state.screen = Screen::Puzzle;
        self.state.save.progress.checkpoint = Some(difficulty.key().to_string());
        self.emit(SessionEvent::PuzzleStarted { difficulty, config });
        self.countdown = Some(self.scheduler.schedule_in(
            self.now,
            COUNTDOWN_TICK_MS,
            Deferred::PuzzleCountdown,
            Some("puzzle countdown"),
        ));
        self.save();
    }

    /// Reveal a cell of the current round. Without a round this does nothing.
    ///
    /// # Errors
    /// - if `cell` is outside the board
    pub fn reveal(&mut self, cell: usize) -> puzzle::Result<RevealOutcome> {
        let Some(engine) = self.puzzle.as_mut() else {
            return Ok(RevealOutcome::NoChange);
        };
        let outcome = engine.reveal(cell, &mut self.state.affection)?;
        match &outcome {
            RevealOutcome::Revealed(cells) => self.emit(SessionEvent::CellsRevealed(cells.clone())),
            RevealOutcome::Finished(result) => self.finish_puzzle(*result),
            RevealOutcome::NoChange => {},
        }
        Ok(outcome)
    }

    /// Toggle a flag on the current round.
    ///
    /// # Errors
    /// - if `cell` is outside the board
    pub fn toggle_flag(&mut self, cell: usize) -> puzzle::Result<Option<bool>> {
        let Some(engine) = self.puzzle.as_mut() else {
            return Ok(None);
        };
        let toggled = engine.toggle_flag(cell)?;
        if let Some(flagged) = toggled {
            let remaining = engine.remaining_flag_budget();
            self.emit(SessionEvent::FlagToggled {
                cell,
                flagged,
                remaining,
            });
        }
        Ok(toggled)
    }

    /// Give up the current round and return to the title.
    pub fn abandon_puzzle(&mut self) {
        if self.puzzle.is_none() {
            return;
        }
        info!("puzzle abandoned");
        self.stop_puzzle();
        self.emit(SessionEvent::PuzzleAbandoned);
        self.state.screen = Screen::Title;
    }

    fn stop_puzzle(&mut self) {
        self.scheduler.cancel_opt(&mut self.countdown);
        self.scheduler.cancel_opt(&mut self.aftermath);
        self.puzzle = None;
    }

    fn countdown_tick(&mut self) {
        self.countdown = None;
        let Some(engine) = self.puzzle.as_mut() else {
            return;
        };
        if let Some(outcome) = engine.tick(&mut self.state.affection) {
            self.finish_puzzle(outcome);
        } else if !engine.is_finished() {
            self.countdown = Some(self.scheduler.schedule_in(
                self.now,
                COUNTDOWN_TICK_MS,
                Deferred::PuzzleCountdown,
                Some("puzzle countdown"),
            ));
        }
    }

    /// Book-keeping for a finished round; the story moves on after a pause.
    fn finish_puzzle(&mut self, outcome: PuzzleOutcome) {
        self.scheduler.cancel_opt(&mut self.countdown);
        self.emit(SessionEvent::PuzzleFinished(outcome));
        match outcome {
            PuzzleOutcome::Won { difficulty } => {
                let first_try = self.state.take_failures(difficulty);
                let reward = self.state.save.record_clear(difficulty, first_try);
                info!("stage {difficulty} cleared; '{reward}' unlocked");
                self.emit(SessionEvent::Notice(format!("Stage cleared! Reward video '{reward}' unlocked.")));
                self.save();
            },
            PuzzleOutcome::Lost {
                difficulty, reason, ..
            } => {
                let attempts = self.state.record_failure(difficulty);
                if matches!(reason, LossReason::HitMine { .. }) {
                    self.state.save.statistics.mines_hit += 1;
                }
                info!("stage {difficulty} failed ({attempts} so far)");
            },
        }
        self.aftermath = Some(self.scheduler.schedule_in(
            self.now,
            AFTERMATH_DELAY_MS,
            Deferred::PuzzleAftermath(outcome),
            Some("puzzle aftermath"),
        ));
    }

    fn puzzle_aftermath(&mut self, outcome: PuzzleOutcome) {
        self.puzzle = None;
        match outcome {
            PuzzleOutcome::Won { difficulty } => {
                let follow_up = scene_after_clear(difficulty).unwrap_or(Ending::True.key());
                if let Some(rule) = self.registry.match_on_outcome(OutcomeKind::Clear, difficulty) {
                    // a reward video started here returns to the next stage
                    self.resume = ResumePoint::Scene(follow_up.to_string());
                    dispatch_action(self, &rule);
                    if !self.videos.is_open() {
                        self.resume = ResumePoint::default();
                    }
                } else if difficulty.is_hard() && !self.scripts.contains(follow_up) {
                    self.show_ending(Ending::True);
                } else {
                    self.start_scene(follow_up);
                }
            },
            PuzzleOutcome::Lost {
                difficulty,
                affection,
                ..
            } => {
                if let Some(rule) = self.registry.match_on_outcome(OutcomeKind::Fail, difficulty) {
                    dispatch_action(self, &rule);
                } else if difficulty.is_hard() || affection <= AFFECTION_BAD_END {
                    self.show_ending(Ending::Bad);
                } else {
                    self.emit(SessionEvent::Notice("You stepped on a landmine... try again.".into()));
                    self.start_puzzle(difficulty);
                }
            },
        }
    }

    /// Play `id` (or hold it behind the age prompt).
    pub fn play_video(&mut self, id: &str, options: PlayOptions) {
        self.novel.cancel_timers(&mut self.scheduler);
        if self.videos.play(id, options, &mut video_ctx!(self)) {
            self.state.screen = Screen::Video;
        } else {
            self.emit(SessionEvent::Notice(format!("Video '{id}' is unavailable.")));
            self.resume_story();
        }
    }

    /// Replace the current clip, restarting at zero with the configured volume.
    pub fn switch_video(&mut self, id: &str) {
        self.novel.cancel_timers(&mut self.scheduler);
        if self.videos.switch(id, &mut video_ctx!(self)) {
            self.state.screen = Screen::Video;
        } else {
            self.emit(SessionEvent::Notice(format!("Video '{id}' is unavailable.")));
            self.resume_story();
        }
    }

    /// Replay a stage's reward chain from the gallery, if it has been unlocked.
    pub fn play_reward(&mut self, difficulty: Difficulty) -> bool {
        if !self.state.save.is_video_unlocked(&difficulty.reward_video_key()) {
            self.emit(SessionEvent::Notice(format!("The {difficulty} reward is still locked.")));
            return false;
        }
        self.play_video(&format!("{}_reward_intro", difficulty.key()), PlayOptions::default());
        if self.videos.is_open() {
            self.resume = ResumePoint::Title;
        }
        true
    }

    /// The host reports the current clip played to its end.
    pub fn video_finished(&mut self) {
        self.videos.clip_finished(&mut video_ctx!(self));
    }

    /// Skip to the next clip, or end the sequence on the last one.
    pub fn skip_video(&mut self) {
        let step = self.videos.skip(&mut video_ctx!(self));
        self.video_step(step);
    }

    /// Answer the age prompt.
    pub fn confirm_age(&mut self, yes: bool) {
        let step = self.videos.confirm_age(yes, &mut video_ctx!(self));
        self.video_step(step);
    }

    /// Close the player now and go back to the story.
    pub fn close_video(&mut self) {
        if !self.videos.is_open() {
            return;
        }
        self.videos.close(&mut self.scheduler, &mut self.events);
        self.resume_story();
    }

    fn video_step(&mut self, step: VideoStep) {
        match step {
            VideoStep::Continue => {},
            VideoStep::SequenceComplete => self.video_sequence_complete(),
            VideoStep::AgeDeclined => {
                self.emit(SessionEvent::Notice("Age confirmation declined; the video was skipped.".into()));
                self.resume_story();
            },
        }
    }

    fn video_sequence_complete(&mut self) {
        if let Some(rule) = self
            .registry
            .match_on_dialogue(VIDEO_END_SCENE, 0, VIDEO_END_TEXT)
        {
            self.resume = ResumePoint::default();
            dispatch_action(self, &rule);
        } else {
            self.resume_story();
        }
    }

    fn resume_story(&mut self) {
        match std::mem::take(&mut self.resume) {
            ResumePoint::Scene(scene) => self.start_scene(&scene),
            ResumePoint::Title => self.state.screen = Screen::Title,
            ResumePoint::Dialogue => {
                if self.novel.phase().is_idle() {
                    self.state.screen = Screen::Title;
                    return;
                }
                self.state.screen = Screen::Novel;
                let handoff = self.novel.resume(&mut novel_ctx!(self));
                self.handle(handoff);
            },
        }
    }

    /// Stop everything and show `ending`.
    pub fn show_ending(&mut self, ending: Ending) {
        info!("ending reached: {ending}");
        self.stop_puzzle();
        self.novel.cancel_timers(&mut self.scheduler);
        self.videos.close(&mut self.scheduler, &mut self.events);
        self.state.screen = Screen::Ending;
        self.state.save.record_ending(ending.key());
        match ending {
            Ending::True => self.state.save.statistics.true_end_achieved = true,
            Ending::Bad => self.state.save.statistics.bad_ends_seen += 1,
        }
        self.emit(SessionEvent::EndingShown(ending));
        self.save();
    }
}
