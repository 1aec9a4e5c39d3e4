//! Text rendering of session events and the puzzle board.

use colored::Colorize;
use textwrap::{Options, fill};

use crate::event::SessionEvent;
use crate::puzzle::{CellView, PuzzleEngine, PuzzleOutcome};
use crate::session::Session;
use crate::state::AFFECTION_MAX;
use crate::style::GameStyle;

const MIN_WIDTH: usize = 40;
const MAX_WIDTH: usize = 100;

fn wrap_width() -> usize {
    textwrap::termwidth().clamp(MIN_WIDTH, MAX_WIDTH)
}

fn wrapped(text: &str, indent: &str) -> String {
    let options = Options::new(wrap_width()).initial_indent(indent).subsequent_indent(indent);
    fill(text, options)
}

/// Render one event as zero or more lines of text.
pub fn render_event(event: &SessionEvent, session: &Session) -> Option<String> {
    let text = match event {
        SessionEvent::SceneStarted { scene_id } => format!("\n{}", scene_id.replace('_', " ").heading_style()),
        SessionEvent::LineStarted {
            speaker, text, emotion, ..
        } => {
            let narration = speaker.is_empty()
                || speaker.eq_ignore_ascii_case("system")
                || speaker.eq_ignore_ascii_case("narrator");
            if narration {
                wrapped(text, "  ").narration_style().to_string()
            } else {
                let mood = if emotion.is_empty() {
                    String::new()
                } else {
                    format!(" {}", emotion.emotion_style())
                };
                format!("{}{mood}\n{}", speaker.speaker_style(), wrapped(text, "  ").dialogue_style())
            }
        },
        SessionEvent::Transition(tag) => tag.to_string().transition_style().to_string(),
        SessionEvent::PuzzleStarted { difficulty, config } => format!(
            "{}\n{}",
            format!("Landmine check: {difficulty}").heading_style(),
            format!(
                "{0}x{0} board, {1} mines, {2}s on the clock. `r x y` reveals, `f x y` flags.",
                config.size, config.mine_count, config.time_limit_secs
            )
            .notice_style()
        ),
        SessionEvent::PuzzleFinished(outcome) => {
            let board = session.puzzle().map(render_board).unwrap_or_default();
            let verdict = match outcome {
                PuzzleOutcome::Won { .. } => "Cleared!".bold().green().to_string(),
                PuzzleOutcome::Lost { affection, .. } => format!(
                    "{} {}",
                    "Boom.".error_style(),
                    format!("Affection {affection}/{AFFECTION_MAX}").affection_style()
                ),
            };
            format!("{board}\n{verdict}")
        },
        SessionEvent::PuzzleAbandoned => "You walk away from the board.".notice_style().to_string(),
        SessionEvent::VideoStarted { title, path, .. } => format!(
            "{} {}\n{}",
            "[video]".video_style(),
            title.video_style(),
            format!("  {path}  (`done` when finished, `skip`, `close`)").dimmed()
        ),
        SessionEvent::AgeConfirmationRequested { clip_id } => format!(
            "{} '{clip_id}' is for adults only. Are you 18 or older? (yes/no)",
            "[video]".video_style()
        ),
        SessionEvent::VideoSequenceComplete => "[video] sequence complete".video_style().to_string(),
        SessionEvent::EndingShown(ending) => format!(
            "\n{}\n{}",
            ending.key().replace('_', " ").to_uppercase().ending_style(),
            "`title` to return, `new` to play again.".notice_style()
        ),
        SessionEvent::CustomAction(name) => format!("[{name}]").dimmed().to_string(),
        SessionEvent::Notice(message) => message.notice_style().to_string(),
        SessionEvent::LineCompleted { .. }
        | SessionEvent::SceneEnded { .. }
        | SessionEvent::TriggerFired { .. }
        | SessionEvent::CellsRevealed(_)
        | SessionEvent::FlagToggled { .. }
        | SessionEvent::VideoClosed => return None,
    };
    Some(text)
}

/// Draw the board with column and row numbers.
pub fn render_board(engine: &PuzzleEngine) -> String {
    let grid = engine.grid();
    let mut out = String::from("   ");
    for x in 0..grid.width() {
        out.push_str(&format!("{:>2}", x % 100));
    }
    out.push('\n');
    for y in 0..grid.height() {
        out.push_str(&format!("{y:>2} "));
        for x in 0..grid.width() {
            let Some(cell) = grid.index(x, y) else {
                continue;
            };
            let glyph = match engine.cell_view(cell) {
                Ok(CellView::Hidden) | Err(_) => " ·".hidden_cell_style().to_string(),
                Ok(CellView::Flagged) => " F".flag_style().to_string(),
                Ok(CellView::Mine) => " *".mine_style().to_string(),
                Ok(CellView::Revealed(0)) => "  ".to_string(),
                Ok(CellView::Revealed(n)) => format!(" {n}"),
            };
            out.push_str(&glyph);
        }
        out.push('\n');
    }
    out.push_str(&format!(
        "flags left {} | {}s left",
        engine.remaining_flag_budget(),
        engine.time_remaining()
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::puzzle::Difficulty;
    use crate::state::Affection;

    fn plain(text: &str) -> String {
        // strip ANSI sequences
        let mut out = String::new();
        let mut in_escape = false;
        for c in text.chars() {
            match (in_escape, c) {
                (false, '\u{1b}') => in_escape = true,
                (true, 'm') => in_escape = false,
                (false, c) => out.push(c),
                _ => {},
            }
        }
        out
    }

    #[test]
    fn board_shows_flags_numbers_and_budget() {
        let config = Difficulty::Easy.config();
        let mut engine = PuzzleEngine::with_layout(Difficulty::Easy, config, &[0]);
        let mut affection = Affection::default();
        engine.toggle_flag(0).unwrap();
        engine.reveal(1, &mut affection).unwrap();
        let board = plain(&render_board(&engine));
        let rows: Vec<&str> = board.lines().collect();
        assert_eq!(rows.len(), 1 + config.size + 1);
        assert!(rows[1].starts_with(" 0  F 1"));
        assert!(rows.last().unwrap().starts_with("flags left 0"));
    }
}
