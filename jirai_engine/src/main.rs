#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
//! ** Jirai **
//! Landmine-girlfriend visual novel with a minesweeper heart

use jirai_engine::data_paths::asset_root;
use jirai_engine::style::GameStyle;
use jirai_engine::{AssetResolver, FileStore, MemoryStore, Persistence, Session, load_game_data, run_repl};

use anyhow::Result;
use colored::Colorize;
use log::{info, warn};

use std::io::Write;

fn main() -> Result<()> {
    env_logger::init();
    info!("Start: loading Jirai content...");
    let data = load_game_data();

    let store: Box<dyn Persistence> = match FileStore::platform_default() {
        Ok(store) => Box::new(store),
        Err(err) => {
            warn!("no data directory for saves ({err:#}); progress will not persist");
            Box::new(MemoryStore::new())
        },
    };
    let mut session = Session::new(data, store, Box::new(AssetResolver::new(asset_root())));
    info!("Session created.");

    // clear the screen
    print!("\x1B[2J\x1B[H");
    std::io::stdout().flush()?;

    println!("{:^72}", "JIRAI: DON'T STEP ON HER LANDMINES".bright_magenta().underline());
    let hint = if session.state().save.has_progress() {
        "Press enter to continue where you left off, or type `new`."
    } else {
        "Press enter to meet Ami."
    };
    println!("\n{}\n", hint.narration_style());

    run_repl(&mut session)
}
