//! Terminal host: stdin/stdout with a reverse-video status line
//!
//! When stdout is not a terminal (piped output, scripted runs) the status
//! line is skipped and only story text is written.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use crossterm::{
    cursor::{MoveTo, RestorePosition, SavePosition},
    execute,
    style::{Attribute, Print, SetAttribute},
    terminal,
};
use log::{debug, warn};

use crate::config::TerminalConfig;
use crate::host::{Host, StatusKind};

const DEFAULT_SAVE_FILE: &str = "gruesome.sav";

pub struct TerminalHost {
    status_line: bool,
    interactive: bool,
    transcript_path: Option<PathBuf>,
    transcript: Option<File>,
}

impl TerminalHost {
    pub fn new(config: &TerminalConfig) -> Self {
        let interactive = atty::is(atty::Stream::Stdout);
        debug!("Terminal host: interactive={}", interactive);
        TerminalHost {
            status_line: config.status_line && interactive,
            interactive,
            transcript_path: config.transcript.clone(),
            transcript: None,
        }
    }

    fn read_stdin_line() -> Option<String> {
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
            Err(e) => {
                warn!("Failed to read from stdin: {}", e);
                None
            }
        }
    }

    /// Ask for a file name, falling back to the default on an empty answer
    fn prompt_file_name(&mut self, verb: &str) -> Option<PathBuf> {
        print!("{} file name [{}]: ", verb, DEFAULT_SAVE_FILE);
        if io::stdout().flush().is_err() {
            return None;
        }
        let answer = Self::read_stdin_line()?;
        let name = answer.trim();
        Some(PathBuf::from(if name.is_empty() { DEFAULT_SAVE_FILE } else { name }))
    }

    fn append_transcript(&mut self, text: &str) {
        if self.transcript.is_none() {
            let Some(path) = &self.transcript_path else {
                return;
            };
            match OpenOptions::new().create(true).append(true).open(path) {
                Ok(file) => self.transcript = Some(file),
                Err(e) => {
                    warn!("Cannot open transcript {}: {}", path.display(), e);
                    self.transcript_path = None;
                    return;
                }
            }
        }
        if let Some(file) = self.transcript.as_mut() {
            if let Err(e) = file.write_all(text.as_bytes()) {
                warn!("Transcript write failed: {}", e);
            }
        }
    }

    fn draw_status_line(&self, content: &str) -> io::Result<()> {
        execute!(
            io::stdout(),
            SavePosition,
            MoveTo(0, 0),
            SetAttribute(Attribute::Reverse),
            Print(content),
            SetAttribute(Attribute::Reset),
            RestorePosition,
        )?;
        io::stdout().flush()
    }
}

impl Host for TerminalHost {
    fn print(&mut self, text: &str, transcript: bool) {
        print!("{}", text);
        if let Err(e) = io::stdout().flush() {
            warn!("stdout flush failed: {}", e);
        }
        if transcript {
            self.append_transcript(text);
        }
    }

    fn read(&mut self, max_len: usize) -> Option<String> {
        let line = Self::read_stdin_line()?;
        if !self.interactive {
            // Echo piped input so the output reads like a session
            println!("{}", line);
        }
        Some(line.chars().take(max_len).collect())
    }

    fn save(&mut self, state: &[u8]) -> bool {
        let Some(path) = self.prompt_file_name("Save") else {
            return false;
        };
        match fs::write(&path, state) {
            Ok(()) => {
                debug!("Saved {} bytes to {}", state.len(), path.display());
                true
            }
            Err(e) => {
                warn!("Cannot write {}: {}", path.display(), e);
                false
            }
        }
    }

    fn restore(&mut self) -> Option<Vec<u8>> {
        let path = self.prompt_file_name("Restore")?;
        match fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("Cannot read {}: {}", path.display(), e);
                None
            }
        }
    }

    fn update_status_line(&mut self, location: &str, status: StatusKind) {
        if !self.status_line {
            return;
        }
        let width = terminal::size().map(|(w, _)| w as usize).unwrap_or(80);
        let right = status.describe();
        let left = format!(" {}", location);
        let gap = width.saturating_sub(left.chars().count() + right.chars().count() + 1);
        let content = format!("{}{}{} ", left, " ".repeat(gap), right);
        if let Err(e) = self.draw_status_line(&content) {
            warn!("Status line update failed: {}", e);
        }
    }

    fn screen(&mut self, window: u16) {
        debug!("set_window {} ignored by terminal host", window);
    }

    fn split(&mut self, height: u16) {
        debug!("split_window {} ignored by terminal host", height);
    }
}
