//! Save data, settings, and the stores that keep them.
//!
//! The session only talks to the [`Persistence`] trait. [`FileStore`] keeps the
//! save as RON and the settings as TOML under the platform data directory;
//! [`MemoryStore`] keeps both in memory for tests and throwaway sessions.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result, anyhow};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::JIRAI_VERSION;
use crate::puzzle::Difficulty;

pub const SAVE_FILE: &str = "jirai_save.ron";
pub const SETTINGS_FILE: &str = "settings.toml";
/// Scene a fresh save starts in.
pub const OPENING_SCENE: &str = "meeting";

/// Story progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Progress {
    pub current_scene: String,
    pub cleared_stages: BTreeSet<Difficulty>,
    pub unlocked_endings: BTreeSet<String>,
    pub total_playtime_secs: u64,
    /// `"<difficulty>"` while in a round, `"<difficulty>_clear"` after clearing it.
    pub checkpoint: Option<String>,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            current_scene: OPENING_SCENE.to_string(),
            cleared_stages: BTreeSet::new(),
            unlocked_endings: BTreeSet::new(),
            total_playtime_secs: 0,
            checkpoint: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Statistics {
    pub mines_hit: u32,
    pub perfect_clears: u32,
    pub bad_ends_seen: u32,
    pub true_end_achieved: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Gallery {
    pub cg_unlocked: BTreeSet<String>,
    pub videos_unlocked: BTreeSet<String>,
    pub endings_unlocked: BTreeSet<String>,
    /// Set once every stage has been cleared.
    pub full_clear_bonus: bool,
}

/// Everything persisted between sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveState {
    /// Engine version that wrote the save.
    pub version: String,
    pub saved_at: Option<String>,
    pub progress: Progress,
    pub statistics: Statistics,
    pub gallery: Gallery,
}

impl Default for SaveState {
    fn default() -> Self {
        Self {
            version: JIRAI_VERSION.to_string(),
            saved_at: None,
            progress: Progress::default(),
            statistics: Statistics::default(),
            gallery: Gallery::default(),
        }
    }
}

impl SaveState {
    /// Record a cleared stage: the stage itself, its checkpoint and its reward video.
    /// Returns the unlocked video key.
    pub fn record_clear(&mut self, difficulty: Difficulty, first_try: bool) -> String {
        self.progress.cleared_stages.insert(difficulty);
        self.progress.checkpoint = Some(difficulty.clear_checkpoint());
        let reward = difficulty.reward_video_key();
        self.gallery.videos_unlocked.insert(reward.clone());
        if first_try {
            self.statistics.perfect_clears += 1;
        }
        if self.all_stages_cleared() {
            self.gallery.full_clear_bonus = true;
        }
        reward
    }

    pub fn record_ending(&mut self, key: &str) {
        self.progress.unlocked_endings.insert(key.to_string());
        self.gallery.endings_unlocked.insert(key.to_string());
    }

    pub fn all_stages_cleared(&self) -> bool {
        Difficulty::ALL
            .iter()
            .all(|d| self.progress.cleared_stages.contains(d))
    }

    pub fn is_video_unlocked(&self, key: &str) -> bool {
        self.gallery.videos_unlocked.contains(key)
    }

    /// True when there is anything worth continuing from.
    pub fn has_progress(&self) -> bool {
        self.progress.checkpoint.is_some()
            || !self.progress.cleared_stages.is_empty()
            || self.progress.current_scene != OPENING_SCENE
    }

    /// Stamp the current engine version and local time before writing.
    pub fn stamp(&mut self) {
        self.version = JIRAI_VERSION.to_string();
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        self.saved_at = now.format(&Rfc3339).ok();
    }
}

/// Player preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Delay between revealed characters.
    pub text_speed_ms: u64,
    /// Delay before auto mode advances a fully shown line.
    pub auto_speed_ms: u64,
    pub bgm_volume: f64,
    pub se_volume: f64,
    pub voice_volume: f64,
    pub video_volume: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            text_speed_ms: 50,
            auto_speed_ms: 2000,
            bgm_volume: 0.7,
            se_volume: 0.8,
            voice_volume: 0.9,
            video_volume: 0.8,
        }
    }
}

/// Whether a save on disk can be loaded as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    Ready,
    VersionMismatch { save_version: String, current_version: String },
    Corrupted { message: String },
}

/// Where saves and settings come from and go to.
pub trait Persistence {
    /// # Errors
    /// - if an existing save cannot be read or parsed
    fn load_save(&self) -> Result<Option<SaveState>>;

    /// # Errors
    /// - if the save cannot be written
    fn save_save(&mut self, save: &SaveState) -> Result<()>;

    /// Stored settings, or defaults when none were saved.
    ///
    /// # Errors
    /// - if existing settings cannot be read or parsed
    fn load_settings(&self) -> Result<Settings>;

    /// # Errors
    /// - if the settings cannot be written
    fn save_settings(&mut self, settings: &Settings) -> Result<()>;
}

/// File-backed store: `jirai_save.ron` and `settings.toml` in one directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store under the platform data directory (`<data>/jirai`).
    ///
    /// # Errors
    /// - if the platform has no data directory
    pub fn platform_default() -> Result<Self> {
        dirs::data_dir()
            .or_else(dirs::data_local_dir)
            .map(|base| Self::new(base.join("jirai")))
            .ok_or_else(|| anyhow!("no platform data directory available"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save_path(&self) -> PathBuf {
        self.dir.join(SAVE_FILE)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE)
    }

    /// Check the save on disk without loading it into a session.
    pub fn inspect_save(&self) -> Option<SaveStatus> {
        let path = self.save_path();
        if !path.exists() {
            return None;
        }
        let status = match fs::read_to_string(&path) {
            Ok(raw) => match ron::from_str::<SaveState>(&raw) {
                Ok(save) if save.version == JIRAI_VERSION => SaveStatus::Ready,
                Ok(save) => SaveStatus::VersionMismatch {
                    save_version: save.version,
                    current_version: JIRAI_VERSION.to_string(),
                },
                Err(err) => SaveStatus::Corrupted {
                    message: format!("parse error: {err}"),
                },
            },
            Err(err) => SaveStatus::Corrupted {
                message: format!("read error: {err}"),
            },
        };
        Some(status)
    }

    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).with_context(|| format!("creating {}", self.dir.display()))
    }
}

impl Persistence for FileStore {
    fn load_save(&self) -> Result<Option<SaveState>> {
        let path = self.save_path();
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path).with_context(|| format!("reading save file {}", path.display()))?;
        let save = ron::from_str::<SaveState>(&raw).with_context(|| format!("parsing save file {}", path.display()))?;
        if save.version != JIRAI_VERSION {
            warn!(
                "save file {} was written by version {} (current {JIRAI_VERSION})",
                path.display(),
                save.version
            );
        }
        Ok(Some(save))
    }

    fn save_save(&mut self, save: &SaveState) -> Result<()> {
        self.ensure_dir()?;
        let path = self.save_path();
        let ron = ron::ser::to_string_pretty(save, ron::ser::PrettyConfig::default())
            .with_context(|| "serializing save state")?;
        fs::write(&path, ron).with_context(|| format!("writing save file {}", path.display()))?;
        info!("game saved to {}", path.display());
        Ok(())
    }

    fn load_settings(&self) -> Result<Settings> {
        let path = self.settings_path();
        if !path.exists() {
            return Ok(Settings::default());
        }
        let raw = fs::read_to_string(&path).with_context(|| format!("reading settings {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing settings {}", path.display()))
    }

    fn save_settings(&mut self, settings: &Settings) -> Result<()> {
        self.ensure_dir()?;
        let path = self.settings_path();
        let raw = toml::to_string_pretty(settings).with_context(|| "serializing settings")?;
        fs::write(&path, raw).with_context(|| format!("writing settings {}", path.display()))
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    save: Option<SaveState>,
    settings: Option<Settings>,
    fail_writes: bool,
    writes: usize,
}

/// In-memory store. Clones share the same storage, so a test can keep a handle
/// after giving one to a session.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Rc<RefCell<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that starts out holding `save`.
    pub fn with_save(save: SaveState) -> Self {
        let store = Self::default();
        store.inner.borrow_mut().save = Some(save);
        store
    }

    /// Make every write fail from now on.
    pub fn fail_writes(&self) {
        self.inner.borrow_mut().fail_writes = true;
    }

    pub fn saved(&self) -> Option<SaveState> {
        self.inner.borrow().save.clone()
    }

    /// Number of successful save writes.
    pub fn writes(&self) -> usize {
        self.inner.borrow().writes
    }
}

impl Persistence for MemoryStore {
    fn load_save(&self) -> Result<Option<SaveState>> {
        Ok(self.inner.borrow().save.clone())
    }

    fn save_save(&mut self, save: &SaveState) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if inner.fail_writes {
            return Err(anyhow!("storage unavailable"));
        }
        inner.save = Some(save.clone());
        inner.writes += 1;
        Ok(())
    }

    fn load_settings(&self) -> Result<Settings> {
        Ok(self.inner.borrow().settings.clone().unwrap_or_default())
    }

    fn save_settings(&mut self, settings: &Settings) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if inner.fail_writes {
            return Err(anyhow!("storage unavailable"));
        }
        inner.settings = Some(settings.clone());
        Ok(())
    }
}
