//! Reward video sequencing.
//!
//! Clips form chains through `next_id`. The host plays a clip and reports when
//! it finished; the sequencer waits a beat and moves to the next clip, or closes
//! the player and reports the whole sequence complete exactly once. Playback
//! itself (decoding, windows) belongs to the host.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use jirai_data::VideoRow;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use variantly::Variantly;

use crate::event::{EventLog, SessionEvent};
use crate::scheduler::{Deferred, Millis, Scheduler, TaskHandle};

/// Pause between a finished clip and the next clip of its chain.
pub const CHAIN_DELAY_MS: Millis = 1000;
/// Pause between the last clip of a chain and closing the player.
pub const CLOSE_DELAY_MS: Millis = 2000;
/// Placeholder played when a clip's file is missing.
pub const SAMPLE_CLIP: &str = "assets/videos/sample.mp4";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoClip {
    pub id: String,
    pub title: String,
    pub path: String,
    pub duration_hint: f64,
    pub next_id: Option<String>,
    pub category: String,
    /// Requires the session's age confirmation before playing.
    pub age_gated: bool,
}

impl From<VideoRow> for VideoClip {
    fn from(row: VideoRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            path: row.path,
            duration_hint: row.duration,
            next_id: row.next_id,
            category: row.category,
            age_gated: row.age_gated,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoCatalog {
    clips: HashMap<String, VideoClip>,
}

impl VideoCatalog {
    pub fn from_clips(clips: impl IntoIterator<Item = VideoClip>) -> Self {
        Self {
            clips: clips.into_iter().map(|c| (c.id.clone(), c)).collect(),
        }
    }

    pub fn from_rows(rows: Vec<VideoRow>) -> Self {
        Self::from_clips(rows.into_iter().map(VideoClip::from))
    }

    pub fn get(&self, id: &str) -> Option<&VideoClip> {
        self.clips.get(id)
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    /// Clip ids of the chain starting at `id`, stopping at a missing link or a loop.
    pub fn chain(&self, id: &str) -> Vec<&str> {
        let mut ids = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = self.clips.get(id);
        while let Some(clip) = cursor {
            if !seen.insert(clip.id.as_str()) {
                break;
            }
            ids.push(clip.id.as_str());
            cursor = clip.next_id.as_deref().and_then(|next| self.clips.get(next));
        }
        ids
    }
}

/// Optional overrides for [`VideoSequencer::play`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayOptions {
    pub start_time_secs: Option<f64>,
    pub volume: Option<f64>,
}

/// Turns a clip into a playable file path.
pub trait MediaResolver {
    fn resolve_video_path(&self, clip: &VideoClip) -> PathBuf;
}

/// Resolves clip paths against an asset root, substituting [`SAMPLE_CLIP`] for
/// missing files.
#[derive(Debug, Clone)]
pub struct AssetResolver {
    root: PathBuf,
}

impl AssetResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl MediaResolver for AssetResolver {
    fn resolve_video_path(&self, clip: &VideoClip) -> PathBuf {
        let candidate = self.root.join(&clip.path);
        if candidate.is_file() {
            candidate
        } else {
            warn!(
                "video asset for '{}' missing at {}; using placeholder",
                clip.id,
                candidate.display()
            );
            self.root.join(SAMPLE_CLIP)
        }
    }
}

/// Hands clip paths through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughResolver;

impl MediaResolver for PassthroughResolver {
    fn resolve_video_path(&self, clip: &VideoClip) -> PathBuf {
        PathBuf::from(&clip.path)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Variantly)]
pub enum PlayerState {
    #[default]
    Closed,
    AwaitingAgeConfirmation {
        clip_id: String,
        options: PlayOptions,
    },
    Playing {
        clip_id: String,
        /// The host reported the clip finished; a chain or close task is pending.
        finished: bool,
    },
}

/// What the session must do after a sequencer call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoStep {
    Continue,
    /// The chain ended; look up the `video_end` rule or resume the story.
    SequenceComplete,
    /// The player declined the age prompt; show fallback content.
    AgeDeclined,
}

/// Everything the sequencer borrows from the session for one call.
pub struct VideoCtx<'a> {
    pub catalog: &'a VideoCatalog,
    pub media: &'a dyn MediaResolver,
    pub scheduler: &'a mut Scheduler,
    pub events: &'a mut EventLog,
    pub now: Millis,
    pub age_confirmed: &'a mut bool,
    pub default_volume: f64,
}

#[derive(Debug, Clone, Default)]
pub struct VideoSequencer {
    player: PlayerState,
    pending: Option<TaskHandle>,
    /// A sequence is running and has not yet been reported complete.
    sequence_open: bool,
}

impl VideoSequencer {
    pub fn player(&self) -> &PlayerState {
        &self.player
    }

    pub fn is_open(&self) -> bool {
        !self.player.is_closed()
    }

    pub fn current_clip(&self) -> Option<&str> {
        match &self.player {
            PlayerState::Playing { clip_id, .. } | PlayerState::AwaitingAgeConfirmation { clip_id, .. } => {
                Some(clip_id)
            },
            PlayerState::Closed => None,
        }
    }

    /// Start `id`, or hold it behind the age prompt. Returns false for unknown clips.
    pub fn play(&mut self, id: &str, options: PlayOptions, ctx: &mut VideoCtx<'_>) -> bool {
        let catalog = ctx.catalog;
        let Some(clip) = catalog.get(id) else {
            error!("video '{id}' not in catalog");
            self.teardown(ctx.scheduler, ctx.events);
            return false;
        };
        ctx.scheduler.cancel_opt(&mut self.pending);
        self.sequence_open = true;
        if clip.age_gated && !*ctx.age_confirmed {
            info!("video '{id}' is age-gated; awaiting confirmation");
            self.player = PlayerState::AwaitingAgeConfirmation {
                clip_id: id.to_string(),
                options,
            };
            ctx.events.push(SessionEvent::AgeConfirmationRequested { clip_id: id.to_string() });
            return true;
        }
        self.start_clip(clip, options, ctx);
        true
    }

    /// Replace the current clip, restarting at zero with the configured volume.
    pub fn switch(&mut self, id: &str, ctx: &mut VideoCtx<'_>) -> bool {
        let options = PlayOptions {
            start_time_secs: Some(0.0),
            volume: Some(ctx.default_volume),
        };
        self.play(id, options, ctx)
    }

    fn start_clip(&mut self, clip: &VideoClip, options: PlayOptions, ctx: &mut VideoCtx<'_>) {
        let path = ctx.media.resolve_video_path(clip);
        info!("video start: {} ({})", clip.id, path.display());
        ctx.events.push(SessionEvent::VideoStarted {
            clip_id: clip.id.clone(),
            title: clip.title.clone(),
            path: path.display().to_string(),
            start_time_secs: options.start_time_secs.unwrap_or(0.0),
            volume: options.volume.unwrap_or(ctx.default_volume),
        });
        self.player = PlayerState::Playing {
            clip_id: clip.id.clone(),
            finished: false,
        };
    }

    /// Answer the age prompt. Yes confirms for the rest of the session.
    pub fn confirm_age(&mut self, yes: bool, ctx: &mut VideoCtx<'_>) -> VideoStep {
        let PlayerState::AwaitingAgeConfirmation { clip_id, options } = self.player.clone() else {
            return VideoStep::Continue;
        };
        if yes {
            *ctx.age_confirmed = true;
            let catalog = ctx.catalog;
            if let Some(clip) = catalog.get(&clip_id) {
                self.start_clip(clip, options, ctx);
            }
            VideoStep::Continue
        } else {
            info!("age confirmation declined for '{clip_id}'");
            self.close(ctx.scheduler, ctx.events);
            VideoStep::AgeDeclined
        }
    }

    /// The host reports the current clip played to its end.
    pub fn clip_finished(&mut self, ctx: &mut VideoCtx<'_>) {
        let PlayerState::Playing { clip_id, finished } = &mut self.player else {
            return;
        };
        if *finished {
            return;
        }
        *finished = true;
        let next = ctx.catalog.get(clip_id).and_then(|c| c.next_id.clone());
        let handle = match next {
            Some(next) => ctx.scheduler.schedule_in(
                ctx.now,
                CHAIN_DELAY_MS,
                Deferred::VideoChainAdvance,
                Some(&format!("{clip_id} -> {next}")),
            ),
            None => ctx.scheduler.schedule_in(
                ctx.now,
                CLOSE_DELAY_MS,
                Deferred::VideoSequenceEnd,
                Some(&format!("{clip_id} ends sequence")),
            ),
        };
        self.pending = Some(handle);
    }

    /// Scheduler callback: play the next clip of the chain. A broken link ends
    /// the sequence.
    pub fn chain_advance(&mut self, ctx: &mut VideoCtx<'_>) -> VideoStep {
        self.pending = None;
        match self.next_clip_id(ctx.catalog) {
            Some(next) if self.play(&next, PlayOptions::default(), ctx) => VideoStep::Continue,
            _ => self.finish_sequence(ctx),
        }
    }

    /// Scheduler callback: the last clip's pause is over.
    pub fn sequence_end(&mut self, ctx: &mut VideoCtx<'_>) -> VideoStep {
        self.pending = None;
        self.finish_sequence(ctx)
    }

    /// Jump to the next clip now, or end the sequence if this is the last one.
    pub fn skip(&mut self, ctx: &mut VideoCtx<'_>) -> VideoStep {
        match &self.player {
            PlayerState::Closed => VideoStep::Continue,
            PlayerState::AwaitingAgeConfirmation { .. } => self.confirm_age(false, ctx),
            PlayerState::Playing { .. } => match self.next_clip_id(ctx.catalog) {
                Some(next) if self.play(&next, PlayOptions::default(), ctx) => VideoStep::Continue,
                _ => self.finish_sequence(ctx),
            },
        }
    }

    /// Tear the player down and abandon the sequence without reporting it.
    pub fn close(&mut self, scheduler: &mut Scheduler, events: &mut EventLog) {
        self.teardown(scheduler, events);
        self.sequence_open = false;
    }

    fn finish_sequence(&mut self, ctx: &mut VideoCtx<'_>) -> VideoStep {
        self.teardown(ctx.scheduler, ctx.events);
        if self.sequence_open {
            self.sequence_open = false;
            info!("video sequence complete");
            ctx.events.push(SessionEvent::VideoSequenceComplete);
            VideoStep::SequenceComplete
        } else {
            VideoStep::Continue
        }
    }

    fn teardown(&mut self, scheduler: &mut Scheduler, events: &mut EventLog) {
        scheduler.cancel_opt(&mut self.pending);
        if !self.player.is_closed() {
            self.player = PlayerState::Closed;
            events.push(SessionEvent::VideoClosed);
        }
    }

    fn next_clip_id(&self, catalog: &VideoCatalog) -> Option<String> {
        let PlayerState::Playing { clip_id, .. } = &self.player else {
            return None;
        };
        catalog.get(clip_id)?.next_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn clip(id: &str, next: Option<&str>, gated: bool) -> VideoClip {
        VideoClip {
            id: id.into(),
            title: id.to_uppercase(),
            path: format!("assets/videos/{id}.mp4"),
            duration_hint: 30.0,
            next_id: next.map(str::to_string),
            category: "reward".into(),
            age_gated: gated,
        }
    }

    struct Rig {
        catalog: VideoCatalog,
        scheduler: Scheduler,
        events: EventLog,
        now: Millis,
        age_confirmed: bool,
    }

    impl Rig {
        fn new(clips: Vec<VideoClip>) -> Self {
            Self {
                catalog: VideoCatalog::from_clips(clips),
                scheduler: Scheduler::default(),
                events: EventLog::default(),
                now: 0,
                age_confirmed: false,
            }
        }

        fn ctx(&mut self) -> VideoCtx<'_> {
            VideoCtx {
                catalog: &self.catalog,
                media: &PassthroughResolver,
                scheduler: &mut self.scheduler,
                events: &mut self.events,
                now: self.now,
                age_confirmed: &mut self.age_confirmed,
                default_volume: 0.8,
            }
        }

        fn run_until(&mut self, seq: &mut VideoSequencer, until: Millis) -> Vec<VideoStep> {
            let mut steps = Vec::new();
            while let Some(due) = self.scheduler.next_due() {
                if due > until {
                    break;
                }
                self.now = due;
                let Some(task) = self.scheduler.pop_due(due) else { break };
                match task.task {
                    Deferred::VideoChainAdvance => steps.push(seq.chain_advance(&mut self.ctx())),
                    Deferred::VideoSequenceEnd => steps.push(seq.sequence_end(&mut self.ctx())),
                    _ => {},
                }
            }
            self.now = until;
            steps
        }

        fn count(&self, pred: impl Fn(&SessionEvent) -> bool) -> usize {
            self.events.entries().iter().filter(|e| pred(e)).count()
        }
    }

    fn abc() -> Vec<VideoClip> {
        vec![
            clip("a", Some("b"), false),
            clip("b", Some("c"), false),
            clip("c", None, false),
        ]
    }

    #[test]
    fn natural_chain_completes_exactly_once() {
        let mut rig = Rig::new(abc());
        let mut seq = VideoSequencer::default();
        assert!(seq.play("a", PlayOptions::default(), &mut rig.ctx()));

        let mut steps = Vec::new();
        for expected_next in ["b", "c"] {
            seq.clip_finished(&mut rig.ctx());
            let until = rig.now + CHAIN_DELAY_MS;
            steps.extend(rig.run_until(&mut seq, until));
            assert_eq!(seq.current_clip(), Some(expected_next));
        }
        seq.clip_finished(&mut rig.ctx());
        // a duplicate finish report changes nothing
        seq.clip_finished(&mut rig.ctx());
        let until = rig.now + CLOSE_DELAY_MS;
        steps.extend(rig.run_until(&mut seq, until));

        assert_eq!(
            steps,
            vec![VideoStep::Continue, VideoStep::Continue, VideoStep::SequenceComplete]
        );
        assert_eq!(rig.count(SessionEvent::is_video_sequence_complete), 1);
        assert_eq!(rig.count(SessionEvent::is_video_started), 3);
        assert!(!seq.is_open());
    }

    #[test]
    fn skip_on_last_clip_completes_once_and_cancels_close_task() {
        let mut rig = Rig::new(abc());
        let mut seq = VideoSequencer::default();
        seq.play("c", PlayOptions::default(), &mut rig.ctx());
        seq.clip_finished(&mut rig.ctx());
        assert_eq!(seq.skip(&mut rig.ctx()), VideoStep::SequenceComplete);
        assert!(rig.run_until(&mut seq, 10_000).is_empty());
        assert_eq!(seq.skip(&mut rig.ctx()), VideoStep::Continue);
        assert_eq!(rig.count(SessionEvent::is_video_sequence_complete), 1);
    }

    #[test]
    fn skip_mid_chain_advances_now() {
        let mut rig = Rig::new(abc());
        let mut seq = VideoSequencer::default();
        seq.play("a", PlayOptions::default(), &mut rig.ctx());
        seq.clip_finished(&mut rig.ctx());
        assert_eq!(seq.skip(&mut rig.ctx()), VideoStep::Continue);
        assert_eq!(seq.current_clip(), Some("b"));
        // the pending chain task from "a" was revoked
        rig.run_until(&mut seq, 5_000);
        assert_eq!(seq.current_clip(), Some("b"));
    }

    #[test]
    fn broken_chain_link_ends_the_sequence() {
        let mut rig = Rig::new(vec![clip("intro", Some("main"), false)]);
        let mut seq = VideoSequencer::default();
        seq.play("intro", PlayOptions::default(), &mut rig.ctx());
        seq.clip_finished(&mut rig.ctx());
        let steps = rig.run_until(&mut seq, CHAIN_DELAY_MS);
        assert_eq!(steps, vec![VideoStep::SequenceComplete]);
        assert!(!seq.is_open());
    }

    #[test]
    fn close_cancels_pending_chain() {
        let mut rig = Rig::new(abc());
        let mut seq = VideoSequencer::default();
        seq.play("a", PlayOptions::default(), &mut rig.ctx());
        seq.clip_finished(&mut rig.ctx());
        seq.close(&mut rig.scheduler, &mut rig.events);
        assert_eq!(rig.scheduler.pending(), 0);
        assert!(rig.run_until(&mut seq, 10_000).is_empty());
        assert!(!seq.is_open());
        assert_eq!(rig.count(SessionEvent::is_video_sequence_complete), 0);
    }

    #[test]
    fn age_gate_confirm_plays_and_is_remembered() {
        let mut rig = Rig::new(vec![clip("x", Some("y"), true), clip("y", None, true)]);
        let mut seq = VideoSequencer::default();
        seq.play("x", PlayOptions::default(), &mut rig.ctx());
        assert!(seq.player().is_awaiting_age_confirmation());
        assert_eq!(rig.count(SessionEvent::is_video_started), 0);

        assert_eq!(seq.confirm_age(true, &mut rig.ctx()), VideoStep::Continue);
        assert!(rig.age_confirmed);
        assert_eq!(seq.current_clip(), Some("x"));

        seq.clip_finished(&mut rig.ctx());
        rig.run_until(&mut seq, CHAIN_DELAY_MS);
        // no second prompt once confirmed
        assert_eq!(rig.count(SessionEvent::is_age_confirmation_requested), 1);
        assert_eq!(seq.current_clip(), Some("y"));
    }

    #[test]
    fn age_gate_decline_closes() {
        let mut rig = Rig::new(vec![clip("x", None, true)]);
        let mut seq = VideoSequencer::default();
        seq.play("x", PlayOptions::default(), &mut rig.ctx());
        assert_eq!(seq.confirm_age(false, &mut rig.ctx()), VideoStep::AgeDeclined);
        assert!(!seq.is_open());
        assert!(!rig.age_confirmed);
        assert_eq!(rig.count(SessionEvent::is_video_sequence_complete), 0);
    }

    #[test]
    fn unknown_clip_leaves_player_closed() {
        let mut rig = Rig::new(abc());
        let mut seq = VideoSequencer::default();
        assert!(!seq.play("zzz", PlayOptions::default(), &mut rig.ctx()));
        assert!(!seq.is_open());
    }

    #[test]
    fn switch_restarts_at_zero_with_configured_volume() {
        let mut rig = Rig::new(abc());
        let mut seq = VideoSequencer::default();
        let options = PlayOptions {
            start_time_secs: Some(12.5),
            volume: Some(0.1),
        };
        seq.play("a", options, &mut rig.ctx());
        seq.switch("c", &mut rig.ctx());
        let last = rig.events.entries().last().cloned();
        assert_eq!(
            last,
            Some(SessionEvent::VideoStarted {
                clip_id: "c".into(),
                title: "C".into(),
                path: "assets/videos/c.mp4".into(),
                start_time_secs: 0.0,
                volume: 0.8,
            })
        );
    }

    #[test]
    fn chain_listing_stops_at_loops_and_gaps() {
        let catalog = VideoCatalog::from_clips(vec![
            clip("a", Some("b"), false),
            clip("b", Some("a"), false),
            clip("c", Some("missing"), false),
        ]);
        assert_eq!(catalog.chain("a"), vec!["a", "b"]);
        assert_eq!(catalog.chain("c"), vec!["c"]);
        assert!(catalog.chain("nope").is_empty());
    }

    #[test]
    fn asset_resolver_falls_back_to_sample() -> anyhow::Result<()> {
        let dir = tempdir()?;
        std::fs::create_dir_all(dir.path().join("assets/videos"))?;
        std::fs::write(dir.path().join("assets/videos/a.mp4"), b"")?;
        let resolver = AssetResolver::new(dir.path());

        assert_eq!(
            resolver.resolve_video_path(&clip("a", None, false)),
            dir.path().join("assets/videos/a.mp4")
        );
        assert_eq!(
            resolver.resolve_video_path(&clip("b", None, false)),
            dir.path().join(SAMPLE_CLIP)
        );
        Ok(())
    }
}
