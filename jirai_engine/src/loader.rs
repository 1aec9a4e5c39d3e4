//! Loader utilities for building the session's content from data tables.
//!
//! Content comes from a primary tabular source (TOML tables in the data
//! directory). Each table falls back to the built-in set independently, so a
//! broken trigger table still leaves authored dialogue in play.

pub mod fallback;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use jirai_data::{DialogueRow, Record, RowError, Table, TriggerRow, VideoRow, validate_tables};
use log::{info, warn};

use crate::data_paths::data_root;
use crate::script::ScriptCatalog;
use crate::trigger::TriggerRule;
use crate::video::VideoCatalog;

pub const DIALOGUE_TABLE: &str = "dialogues";
pub const TRIGGER_TABLE: &str = "triggers";
pub const VIDEO_TABLE: &str = "videos";

/// Anything that can hand out named tables.
pub trait TabularSource {
    /// Where the tables come from, for log lines.
    fn describe(&self) -> String;

    /// Load the table called `name`.
    ///
    /// # Errors
    /// - if the table is missing or cannot be parsed
    fn load_table(&self, name: &str) -> Result<Table>;
}

/// Tables stored as `<name>.toml` files in one directory.
#[derive(Debug, Clone)]
pub struct TomlTableSource {
    dir: PathBuf,
}

impl TomlTableSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl TabularSource for TomlTableSource {
    fn describe(&self) -> String {
        self.dir.display().to_string()
    }

    fn load_table(&self, name: &str) -> Result<Table> {
        let path = self.dir.join(format!("{name}.toml"));
        let text = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        let table = toml::from_str::<Table>(&text).with_context(|| format!("parsing {}", path.display()))?;
        Ok(table)
    }
}

/// Which tier a piece of content came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Origin {
    Table,
    #[default]
    BuiltIn,
}

/// Origin of each table after a load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Provenance {
    pub dialogues: Origin,
    pub triggers: Origin,
    pub videos: Origin,
}

/// Everything a session needs from the content tables.
#[derive(Debug)]
pub struct GameData {
    pub scripts: ScriptCatalog,
    /// Rules are handed to the registry as-is; it owns the fallback for them.
    pub rules: Result<Vec<TriggerRule>>,
    pub videos: VideoCatalog,
    pub provenance: Provenance,
}

impl GameData {
    /// Built-in content only.
    pub fn built_in() -> Self {
        Self {
            scripts: ScriptCatalog::from_scenes(fallback::fallback_scenes()),
            rules: Ok(fallback::default_rules()),
            videos: VideoCatalog::from_clips(fallback::fallback_videos()),
            provenance: Provenance::default(),
        }
    }
}

/// Primary tabular source backed by the built-in fallback set.
#[derive(Debug, Clone)]
pub struct DataSource<S> {
    primary: S,
}

impl<S: TabularSource> DataSource<S> {
    pub fn new(primary: S) -> Self {
        Self { primary }
    }

    /// Load every table, substituting built-in content table by table.
    pub fn load(&self) -> GameData {
        info!("loading content tables from {}", self.primary.describe());
        let dialogues = self.rows(DIALOGUE_TABLE, DialogueRow::from_record);
        let triggers = self.rows(TRIGGER_TABLE, TriggerRow::from_record);
        let videos = self.rows(VIDEO_TABLE, VideoRow::from_record);

        if let (Ok(d), Ok(t), Ok(v)) = (&dialogues, &triggers, &videos) {
            for problem in validate_tables(d, t, v) {
                warn!("content validation: {problem}");
            }
        }

        let mut provenance = Provenance::default();
        let scripts = match dialogues {
            Ok(rows) => {
                provenance.dialogues = Origin::Table;
                ScriptCatalog::from_rows(rows)
            },
            Err(err) => {
                warn!("dialogue table unavailable ({err:#}); using built-in scenes");
                ScriptCatalog::from_scenes(fallback::fallback_scenes())
            },
        };
        let rules = triggers.and_then(|rows| {
            let rules = TriggerRule::from_rows(&rows);
            if rules.is_empty() {
                bail!("table '{TRIGGER_TABLE}' has no usable rules");
            }
            provenance.triggers = Origin::Table;
            Ok(rules)
        });
        let videos = match videos {
            Ok(rows) => {
                provenance.videos = Origin::Table;
                VideoCatalog::from_rows(rows)
            },
            Err(err) => {
                warn!("video table unavailable ({err:#}); using built-in catalog");
                VideoCatalog::from_clips(fallback::fallback_videos())
            },
        };

        info!("{} scenes loaded", scripts.len());
        if let Ok(rules) = &rules {
            info!("{} trigger rules loaded", rules.len());
        }
        info!("{} video clips loaded", videos.len());

        GameData {
            scripts,
            rules,
            videos,
            provenance,
        }
    }

    fn rows<T>(&self, name: &str, build: fn(&Record) -> Result<T, RowError>) -> Result<Vec<T>> {
        let table = self
            .primary
            .load_table(name)
            .with_context(|| format!("while loading table '{name}'"))?;
        for idx in table.malformed_rows() {
            warn!("table '{name}': row {idx} does not match the header; skipped");
        }
        let rows: Vec<T> = table
            .records()
            .iter()
            .enumerate()
            .filter_map(|(idx, record)| match build(record) {
                Ok(row) => Some(row),
                Err(err) => {
                    warn!("table '{name}': record {idx}: {err}; skipped");
                    None
                },
            })
            .collect();
        if rows.is_empty() {
            bail!("table '{name}' has no usable rows");
        }
        Ok(rows)
    }
}

/// Load content from the resolved data directory, with built-in fallback.
pub fn load_game_data() -> GameData {
    DataSource::new(TomlTableSource::new(data_root())).load()
}
