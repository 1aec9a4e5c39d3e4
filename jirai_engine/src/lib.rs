#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]

pub const JIRAI_VERSION: &str = env!("CARGO_PKG_VERSION");

// Core modules
pub mod command;
pub mod data_paths;
pub mod event;
pub mod loader;
pub mod novel;
pub mod persistence;
pub mod puzzle;
pub mod repl;
pub mod scheduler;
pub mod script;
pub mod session;
pub mod state;
pub mod style;
pub mod trigger;
pub mod video;

// Re-exports for convenience
pub use event::SessionEvent;
pub use loader::{DataSource, GameData, TomlTableSource, load_game_data};
pub use persistence::{FileStore, MemoryStore, Persistence};
pub use puzzle::{Difficulty, PuzzleEngine, PuzzleOutcome};
pub use repl::run_repl;
pub use session::Session;
pub use state::{Screen, SessionState};
pub use trigger::{TriggerAction, TriggerRegistry, TriggerRule};
pub use video::{AssetResolver, PlayOptions};
