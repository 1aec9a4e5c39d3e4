//! Terminal input for the Jirai REPL.
//!
//! A rustyline editor with command completion, inline hints and history when a
//! terminal is attached; plain stdin lines otherwise (piped scripts, tests).

use std::fs;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;

use colored::Colorize;
use log::{info, warn};
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};

/// One read from the player.
pub enum InputEvent {
    Line(String),
    Eof,
    Interrupted,
}

const COMMAND_TERMS: &[&str] = &[
    "auto", "board", "close", "continue", "done", "flag", "gallery", "give up", "help", "new game", "next", "no",
    "quit", "reveal", "save", "skip", "speed", "stats", "status", "title", "wait", "watch easy", "watch hard",
    "watch normal", "yes",
];

#[derive(Default)]
pub struct CommandHelper;

impl Helper for CommandHelper {}

impl Completer for CommandHelper {
    type Candidate = Pair;

    fn complete(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> rustyline::Result<(usize, Vec<Pair>)> {
        let start = typed_start(line, pos);
        let pairs = matching_terms(&line[start..pos])
            .map(|term| Pair {
                display: term.to_string(),
                replacement: term.to_string(),
            })
            .collect();
        Ok((start, pairs))
    }
}

impl Hinter for CommandHelper {
    type Hint = String;

    // only a single candidate is worth hinting at
    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        if pos < line.len() {
            return None;
        }
        let typed = &line[typed_start(line, pos)..pos];
        let mut terms = matching_terms(typed);
        match (terms.next(), terms.next()) {
            (Some(term), None) => Some(term[typed.len()..].to_string()),
            _ => None,
        }
    }
}

impl Highlighter for CommandHelper {
    fn highlight_hint<'h>(&self, hint: &'h str) -> std::borrow::Cow<'h, str> {
        hint.dimmed().to_string().into()
    }
}

impl Validator for CommandHelper {}

/// Byte offset where the typed command starts, past any leading spaces.
fn typed_start(line: &str, pos: usize) -> usize {
    let before = &line[..pos];
    pos - before.trim_start().len()
}

fn matching_terms(typed: &str) -> impl Iterator<Item = &'static str> {
    let typed = typed.to_lowercase();
    COMMAND_TERMS
        .iter()
        .copied()
        .filter(move |term| !typed.is_empty() && term.starts_with(&typed) && *term != typed)
}

/// Where the prompt reads from.
pub enum InputManager {
    Editor {
        editor: Box<Editor<CommandHelper, DefaultHistory>>,
        history: Option<PathBuf>,
    },
    Plain,
}

impl InputManager {
    pub fn new() -> Self {
        if !io::stdin().is_terminal() {
            info!("stdin is not a terminal; reading plain lines");
            return InputManager::Plain;
        }
        match Editor::new() {
            Ok(mut editor) => {
                editor.set_helper(Some(CommandHelper));
                let history = history_path();
                if let Some(path) = &history {
                    match editor.load_history(path) {
                        Ok(()) => info!("history loaded from {}", path.display()),
                        Err(ReadlineError::Io(err)) if err.kind() == io::ErrorKind::NotFound => {},
                        Err(err) => warn!("history at {} unreadable: {err}", path.display()),
                    }
                }
                InputManager::Editor {
                    editor: Box::new(editor),
                    history,
                }
            },
            Err(err) => {
                warn!("line editor unavailable ({err}); reading plain lines");
                InputManager::Plain
            },
        }
    }

    /// Read one line of player input.
    ///
    /// # Errors
    /// - on a terminal or stdin I/O failure
    pub fn read_line(&mut self, prompt: &str) -> io::Result<InputEvent> {
        match self {
            InputManager::Editor { editor, history } => match editor.readline(prompt) {
                Ok(line) => {
                    remember(editor, history.as_deref(), &line);
                    Ok(InputEvent::Line(line))
                },
                Err(err) => readline_event(err),
            },
            InputManager::Plain => {
                print!("{prompt}");
                io::stdout().flush()?;
                let mut line = String::new();
                if io::stdin().lock().read_line(&mut line)? == 0 {
                    return Ok(InputEvent::Eof);
                }
                Ok(InputEvent::Line(line.trim_end_matches(['\r', '\n']).to_string()))
            },
        }
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

fn remember(editor: &mut Editor<CommandHelper, DefaultHistory>, history: Option<&std::path::Path>, line: &str) {
    if line.trim().is_empty() {
        return;
    }
    if let Err(err) = editor.add_history_entry(line) {
        warn!("history entry dropped: {err}");
    }
    let Some(path) = history else {
        return;
    };
    if let Some(dir) = path.parent()
        && let Err(err) = fs::create_dir_all(dir)
    {
        warn!("cannot create {}: {err}", dir.display());
        return;
    }
    if let Err(err) = editor.save_history(path) {
        warn!("history not saved to {}: {err}", path.display());
    }
}

fn readline_event(err: ReadlineError) -> io::Result<InputEvent> {
    match err {
        ReadlineError::Interrupted => Ok(InputEvent::Interrupted),
        ReadlineError::Eof => Ok(InputEvent::Eof),
        ReadlineError::Io(err) => Err(err),
        other => Err(io::Error::other(other)),
    }
}

/// History sits beside the saves.
fn history_path() -> Option<PathBuf> {
    dirs::data_dir().map(|base| base.join("jirai").join("history.txt"))
}
