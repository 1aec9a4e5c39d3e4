//! Command module
//!
//! Describes the commands a player can type at the prompt.
use crate::puzzle::Difficulty;

/// Commands that can be executed by the player. Several words mean different
/// things depending on the current screen; the REPL sorts that out.
#[derive(Debug, Clone, PartialEq, Eq, variantly::Variantly)]
pub enum Command {
    /// Empty line or `next`: advance dialogue.
    Next,
    Auto,
    Skip,
    Reveal { x: usize, y: usize },
    Flag { x: usize, y: usize },
    Board,
    GiveUp,
    /// The clip in the player finished.
    Done,
    CloseVideo,
    Confirm(bool),
    NewGame,
    Continue,
    Gallery,
    Watch(Difficulty),
    Wait(u64),
    TextSpeed(u64),
    Status,
    Save,
    Title,
    Help,
    Quit,
    Unknown,
}

fn coord(x: &str, y: &str) -> Option<(usize, usize)> {
    Some((x.parse().ok()?, y.parse().ok()?))
}

/// Parses an input string and returns the corresponding `Command`.
pub fn parse_command(input: &str) -> Command {
    let lowered = input.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();
    match words.as_slice() {
        [] | ["next" | "n"] => Command::Next,
        ["auto"] => Command::Auto,
        ["skip" | "s"] => Command::Skip,
        ["reveal" | "r" | "open", x, y] => coord(x, y).map_or(Command::Unknown, |(x, y)| Command::Reveal { x, y }),
        ["flag" | "f", x, y] => coord(x, y).map_or(Command::Unknown, |(x, y)| Command::Flag { x, y }),
        ["board" | "b"] => Command::Board,
        ["give", "up"] | ["giveup" | "forfeit"] => Command::GiveUp,
        ["done" | "finished"] => Command::Done,
        ["close"] => Command::CloseVideo,
        ["yes" | "y"] => Command::Confirm(true),
        ["no"] => Command::Confirm(false),
        ["new"] | ["new", "game"] | ["start"] => Command::NewGame,
        ["continue" | "load"] => Command::Continue,
        ["gallery"] => Command::Gallery,
        ["watch", stage] => stage.parse().map_or(Command::Unknown, Command::Watch),
        ["wait"] => Command::Wait(1),
        ["wait", secs] => secs.parse().map_or(Command::Unknown, Command::Wait),
        ["speed", ms] => ms.parse().map_or(Command::Unknown, Command::TextSpeed),
        ["status" | "stats"] => Command::Status,
        ["save"] => Command::Save,
        ["title" | "menu"] => Command::Title,
        ["help" | "?"] => Command::Help,
        ["quit" | "exit"] => Command::Quit,
        _ => Command::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_line_advances() {
        assert_eq!(parse_command(""), Command::Next);
        assert_eq!(parse_command("   \n"), Command::Next);
    }

    #[test]
    fn coordinates_parse_or_fail_cleanly() {
        assert_eq!(parse_command("r 3 4"), Command::Reveal { x: 3, y: 4 });
        assert_eq!(parse_command("FLAG 0 8"), Command::Flag { x: 0, y: 8 });
        assert_eq!(parse_command("r three 4"), Command::Unknown);
        assert_eq!(parse_command("r -1 4"), Command::Unknown);
    }

    #[test]
    fn stage_names_parse() {
        assert_eq!(parse_command("watch hard"), Command::Watch(Difficulty::Hard));
        assert_eq!(parse_command("watch extreme"), Command::Unknown);
    }

    #[test]
    fn synonyms() {
        assert!(parse_command("give up").is_give_up());
        assert!(parse_command("forfeit").is_give_up());
        assert_eq!(parse_command("y"), Command::Confirm(true));
        assert_eq!(parse_command("wait"), Command::Wait(1));
        assert_eq!(parse_command("wait 3"), Command::Wait(3));
    }
}
