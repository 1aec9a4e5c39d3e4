//! Styling helpers for terminal output.
//!
//! The [`GameStyle`] trait applies ANSI styling via the `colored` crate.
//! Implementations for `&str` and `String` are provided so string literals can
//! be styled directly.

use colored::{ColoredString, Colorize};

/// Convenience trait for applying color and style to text output.
pub trait GameStyle {
    fn speaker_style(&self) -> ColoredString;
    fn dialogue_style(&self) -> ColoredString;
    fn narration_style(&self) -> ColoredString;
    fn emotion_style(&self) -> ColoredString;
    fn notice_style(&self) -> ColoredString;
    fn transition_style(&self) -> ColoredString;
    fn video_style(&self) -> ColoredString;
    fn ending_style(&self) -> ColoredString;
    fn prompt_style(&self) -> ColoredString;
    fn heading_style(&self) -> ColoredString;
    fn error_style(&self) -> ColoredString;
    fn hidden_cell_style(&self) -> ColoredString;
    fn flag_style(&self) -> ColoredString;
    fn mine_style(&self) -> ColoredString;
    fn affection_style(&self) -> ColoredString;
}

impl GameStyle for &str {
    fn speaker_style(&self) -> ColoredString {
        self.bold().truecolor(250, 110, 180)
    }
    fn dialogue_style(&self) -> ColoredString {
        self.truecolor(240, 230, 240)
    }
    fn narration_style(&self) -> ColoredString {
        self.italic().truecolor(102, 208, 250)
    }
    fn emotion_style(&self) -> ColoredString {
        let bracketed = format!("({self})");
        bracketed.dimmed()
    }
    fn notice_style(&self) -> ColoredString {
        self.italic().truecolor(230, 230, 30)
    }
    fn transition_style(&self) -> ColoredString {
        let bracketed = format!("~ {self} ~");
        bracketed.truecolor(150, 150, 170)
    }
    fn video_style(&self) -> ColoredString {
        self.truecolor(180, 120, 255)
    }
    fn ending_style(&self) -> ColoredString {
        self.bold().underline().truecolor(255, 80, 140)
    }
    fn prompt_style(&self) -> ColoredString {
        self.truecolor(75, 180, 255)
    }
    fn heading_style(&self) -> ColoredString {
        self.underline()
    }
    fn error_style(&self) -> ColoredString {
        self.truecolor(230, 30, 30)
    }
    fn hidden_cell_style(&self) -> ColoredString {
        self.truecolor(90, 90, 100)
    }
    fn flag_style(&self) -> ColoredString {
        self.bold().truecolor(230, 80, 80)
    }
    fn mine_style(&self) -> ColoredString {
        self.bold().on_truecolor(120, 0, 0)
    }
    fn affection_style(&self) -> ColoredString {
        self.truecolor(255, 120, 170)
    }
}

impl GameStyle for String {
    fn speaker_style(&self) -> ColoredString {
        self.as_str().speaker_style()
    }
    fn dialogue_style(&self) -> ColoredString {
        self.as_str().dialogue_style()
    }
    fn narration_style(&self) -> ColoredString {
        self.as_str().narration_style()
    }
    fn emotion_style(&self) -> ColoredString {
        self.as_str().emotion_style()
    }
    fn notice_style(&self) -> ColoredString {
        self.as_str().notice_style()
    }
    fn transition_style(&self) -> ColoredString {
        self.as_str().transition_style()
    }
    fn video_style(&self) -> ColoredString {
        self.as_str().video_style()
    }
    fn ending_style(&self) -> ColoredString {
        self.as_str().ending_style()
    }
    fn prompt_style(&self) -> ColoredString {
        self.as_str().prompt_style()
    }
    fn heading_style(&self) -> ColoredString {
        self.as_str().heading_style()
    }
    fn error_style(&self) -> ColoredString {
        self.as_str().error_style()
    }
    fn hidden_cell_style(&self) -> ColoredString {
        self.as_str().hidden_cell_style()
    }
    fn flag_style(&self) -> ColoredString {
        self.as_str().flag_style()
    }
    fn mine_style(&self) -> ColoredString {
        self.as_str().mine_style()
    }
    fn affection_style(&self) -> ColoredString {
        self.as_str().affection_style()
    }
}
