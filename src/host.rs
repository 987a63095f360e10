//! The interpreter's only boundary to the outside world.
//!
//! Everything a story can observe about its environment (text output,
//! input lines, saved games, the status line, the screen split) goes
//! through this trait. Implementations decide what those mean: a terminal,
//! a test script, a web page.

/// What the two numbers of a version 3 status line mean
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    /// Globals 1 and 2 are score and turn count
    Score { score: i16, turns: u16 },
    /// Globals 1 and 2 are hours (0-23) and minutes
    Time { hours: u16, minutes: u16 },
}

/// Host callback surface
pub trait Host {
    /// Deliver decoded output text. `transcript` reports whether the story
    /// has transcripting switched on (Flags 2 bit 0).
    fn print(&mut self, text: &str, transcript: bool);

    /// Return the next input line, at most `max_len` characters.
    ///
    /// `None` means no input is available yet: the interpreter suspends and
    /// waits for `Interpreter::provide_input`.
    fn read(&mut self, max_len: usize) -> Option<String>;

    /// Persist a save-state buffer; returns success
    fn save(&mut self, state: &[u8]) -> bool;

    /// Return a previously saved buffer, or `None` if there is none
    fn restore(&mut self) -> Option<Vec<u8>>;

    /// Called after memory is (re)initialized from the story image
    fn restarted(&mut self) {}

    fn update_status_line(&mut self, _location: &str, _status: StatusKind) {}

    /// Select the lower (0) or upper (1) window
    fn screen(&mut self, _window: u16) {}

    /// Split off an upper window of `height` lines
    fn split(&mut self, _height: u16) {}

    /// Whether `split` does anything; advertised to the story in Flags 1
    fn supports_split(&self) -> bool {
        false
    }

    /// Toggle fixed-pitch rendering
    fn highlight(&mut self, _fixed_pitch: bool) {}
}

impl StatusKind {
    /// Format the right-hand side of a status line
    pub fn describe(&self) -> String {
        match self {
            StatusKind::Score { score, turns } => format!("Score: {}  Moves: {}", score, turns),
            StatusKind::Time { hours, minutes } => {
                let (h, suffix) = match hours % 24 {
                    0 => (12, "AM"),
                    h @ 1..=11 => (h, "AM"),
                    12 => (12, "PM"),
                    h => (h - 12, "PM"),
                };
                format!("Time: {}:{:02} {}", h, minutes, suffix)
            }
        }
    }
}
