//! REPL and command handling.
//!
//! The terminal host reads a command, applies it to the [`Session`], lets the
//! session clock catch up with wall time, and prints whatever the session
//! reported. It owns no game rules.

mod input;
pub mod render;

use std::time::Instant;

use anyhow::Result;
use colored::Colorize;
use log::info;

use crate::command::{Command, parse_command};
use crate::puzzle::{Difficulty, PuzzleEngine, PuzzleError, RevealOutcome};
use crate::scheduler::Millis;
use crate::session::{AFTERMATH_DELAY_MS, Session};
use crate::state::{AFFECTION_MAX, Screen};
use crate::style::GameStyle;
use crate::video::CLOSE_DELAY_MS;

use input::{InputEvent, InputManager};
use render::{render_board, render_event};

/// Control flow signal used by handlers to exit the REPL.
pub enum ReplControl {
    Continue,
    Quit,
}

/// Run the main read–eval–print loop until the player quits.
///
/// # Errors
/// - if the terminal cannot be read at all
pub fn run_repl(session: &mut Session) -> Result<()> {
    let mut input_manager = InputManager::new();
    let mut last_tick = Instant::now();
    print_help();
    flush_events(session);

    loop {
        let prompt = prompt_for(session).prompt_style().to_string();
        let line = match input_manager.read_line(&prompt)? {
            InputEvent::Line(line) => line,
            InputEvent::Eof => "quit".to_string(),
            InputEvent::Interrupted => {
                println!("{}", "Command canceled.".notice_style());
                continue;
            },
        };

        // let timers that came due while the player was thinking run first
        let elapsed = Millis::try_from(last_tick.elapsed().as_millis()).unwrap_or(Millis::MAX);
        last_tick = Instant::now();
        session.advance_clock(elapsed);
        flush_events(session);

        let command = parse_command(&line);
        info!("command: {command:?}");
        if let ReplControl::Quit = handle_command(session, &command) {
            break;
        }
        flush_events(session);
    }
    Ok(())
}

fn prompt_for(session: &Session) -> String {
    let state = session.state();
    match state.screen {
        Screen::Title => "\n[title]> ".to_string(),
        Screen::Novel => format!("\n[{}/{AFFECTION_MAX} ♥]> ", state.affection.value()),
        Screen::Puzzle => {
            let remaining = session.puzzle().map_or(0, PuzzleEngine::time_remaining);
            format!("\n[{}/{AFFECTION_MAX} ♥|{remaining}s]> ", state.affection.value())
        },
        Screen::Video => "\n[video]> ".to_string(),
        Screen::Ending => "\n[fin]> ".to_string(),
    }
}

fn flush_events(session: &mut Session) {
    for event in session.drain_events() {
        if let Some(text) = render_event(&event, session) {
            println!("{text}");
        }
    }
}

/// Apply one command to the session.
pub fn handle_command(session: &mut Session, command: &Command) -> ReplControl {
    #[allow(clippy::enum_glob_use)]
    use Command::*;
    let screen = session.state().screen;
    match command {
        Next => match screen {
            Screen::Novel => {
                // the REPL prints whole lines, so a line still typing counts as shown
                if session.dialogue().phase().is_typing() {
                    session.advance();
                }
                session.advance();
            },
            Screen::Title => {
                if !session.continue_game() {
                    session.new_game();
                }
            },
            _ => {},
        },
        Auto => {
            let on = !session.dialogue().is_auto();
            session.set_auto(on);
            println!("{}", format!("auto {}", if on { "on" } else { "off" }).notice_style());
        },
        Skip if screen.is_video() => session.skip_video(),
        Skip => {
            let on = !session.dialogue().is_skip();
            session.set_skip(on);
            println!("{}", format!("skip {}", if on { "on" } else { "off" }).notice_style());
        },
        Reveal { x, y } => reveal_handler(session, *x, *y),
        Flag { x, y } => flag_handler(session, *x, *y),
        Board => match session.puzzle() {
            Some(engine) => println!("{}", render_board(engine)),
            None => println!("{}", "No board right now.".notice_style()),
        },
        GiveUp => session.abandon_puzzle(),
        Done => {
            session.video_finished();
            session.advance_clock(CLOSE_DELAY_MS);
        },
        CloseVideo => session.close_video(),
        Confirm(yes) => session.confirm_age(*yes),
        NewGame => session.new_game(),
        Continue => {
            session.continue_game();
        },
        Gallery => gallery_handler(session),
        Watch(difficulty) => {
            if screen.is_title() || screen.is_ending() {
                session.play_reward(*difficulty);
            } else {
                println!("{}", "The gallery is only open from the title screen.".notice_style());
            }
        },
        Wait(secs) => session.advance_clock(secs.saturating_mul(1000)),
        TextSpeed(ms) => {
            session.update_settings(|settings| settings.text_speed_ms = *ms);
            println!("{}", format!("text speed {ms} ms per character").notice_style());
        },
        Status => status_handler(session),
        Save => {
            if session.save() {
                println!("{}", "Saved.".notice_style());
            }
        },
        Title => session.return_to_title(),
        Help => print_help(),
        Quit => {
            session.save();
            println!("{}", "See you next time~".speaker_style());
            return ReplControl::Quit;
        },
        Unknown => println!("{}", "Didn't quite catch that? Type `help`.".error_style()),
    }
    ReplControl::Continue
}

fn cell_at(session: &Session, x: usize, y: usize) -> Option<usize> {
    session.puzzle()?.grid().index(x, y)
}

fn reveal_handler(session: &mut Session, x: usize, y: usize) {
    let Some(cell) = cell_at(session, x, y) else {
        println!("{}", "No such cell.".error_style());
        return;
    };
    match session.reveal(cell) {
        Ok(RevealOutcome::Revealed(_)) => {
            if let Some(engine) = session.puzzle() {
                println!("{}", render_board(engine));
            }
        },
        Ok(RevealOutcome::Finished(_)) => {
            // show the final board, then let the pause play out
            flush_events(session);
            session.advance_clock(AFTERMATH_DELAY_MS);
        },
        Ok(RevealOutcome::NoChange) => {},
        Err(PuzzleError::CellOutOfRange { cell, len }) => {
            println!("{}", format!("Cell {cell} is off the board ({len} cells).").error_style());
        },
    }
}

fn flag_handler(session: &mut Session, x: usize, y: usize) {
    let Some(cell) = cell_at(session, x, y) else {
        println!("{}", "No such cell.".error_style());
        return;
    };
    if let Ok(Some(_)) = session.toggle_flag(cell)
        && let Some(engine) = session.puzzle()
    {
        println!("{}", render_board(engine));
    }
}

fn gallery_handler(session: &Session) {
    let save = &session.state().save;
    println!("{}", "Gallery".heading_style());
    for difficulty in Difficulty::ALL {
        let key = difficulty.reward_video_key();
        let status = if save.is_video_unlocked(&key) {
            format!("unlocked (`watch {difficulty}`)").green().to_string()
        } else {
            "locked".dimmed().to_string()
        };
        println!("  {key:<14} {status}");
    }
    for ending in &save.gallery.endings_unlocked {
        println!("  {:<14} {}", ending, "seen".green());
    }
}

fn status_handler(session: &Session) {
    let state = session.state();
    let save = &state.save;
    println!("{}", "Status".heading_style());
    println!(
        "  affection  {}",
        format!("{}/{AFFECTION_MAX}", state.affection.value()).affection_style()
    );
    println!("  scene      {}", save.progress.current_scene);
    println!("  checkpoint {}", save.progress.checkpoint.as_deref().unwrap_or("-"));
    let cleared: Vec<String> = save.progress.cleared_stages.iter().map(ToString::to_string).collect();
    println!("  cleared    {}", if cleared.is_empty() { "-".to_string() } else { cleared.join(", ") });
    println!("  playtime   {}s", save.progress.total_playtime_secs);
    println!(
        "  mines hit {} | perfect clears {} | bad ends {}",
        save.statistics.mines_hit, save.statistics.perfect_clears, save.statistics.bad_ends_seen
    );
}

fn print_help() {
    println!("{}", "Commands".heading_style());
    let rows = [
        ("<enter> / next", "advance the story (on the title: continue or start)"),
        ("auto / skip", "toggle auto-advance / instant text (skip also skips a video clip)"),
        ("r x y / f x y", "reveal / flag a cell"),
        ("board, give up", "show the board / abandon the round"),
        ("done, close", "the video finished / close the player"),
        ("yes / no", "answer the age check"),
        ("new, continue", "start over / resume from the last checkpoint"),
        ("gallery, watch <stage>", "unlocked rewards"),
        ("wait [secs], speed <ms>", "let time pass / text speed"),
        ("status, save, title, quit", ""),
    ];
    for (cmd, what) in rows {
        println!("  {:<26} {}", cmd.prompt_style(), what);
    }
}
