//! Headless host for testing and embedding
//!
//! Input comes from a scripted queue, output is collected in memory and
//! saves are held in a single in-memory slot. When the queue runs dry,
//! `read` returns `None` and the interpreter suspends until the embedder
//! calls `provide_input`.

use std::collections::VecDeque;

use log::debug;

use crate::host::{Host, StatusKind};

#[derive(Debug)]
pub struct HeadlessHost {
    inputs: VecDeque<String>,
    output: String,
    transcript: String,
    print_calls: usize,
    saved: Option<Vec<u8>>,
    save_succeeds: bool,
    split_available: bool,
    pub status: Option<(String, StatusKind)>,
    pub restarts: usize,
    pub window: u16,
    pub upper_height: u16,
    pub fixed_pitch: bool,
}

impl Default for HeadlessHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessHost {
    pub fn new() -> Self {
        HeadlessHost {
            inputs: VecDeque::new(),
            output: String::new(),
            transcript: String::new(),
            print_calls: 0,
            saved: None,
            save_succeeds: true,
            split_available: false,
            status: None,
            restarts: 0,
            window: 0,
            upper_height: 0,
            fixed_pitch: false,
        }
    }

    /// Host that answers `read` from these lines, in order
    pub fn with_inputs<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut host = Self::new();
        host.inputs.extend(lines.into_iter().map(Into::into));
        host
    }

    pub fn push_input(&mut self, line: &str) {
        self.inputs.push_back(line.to_string());
    }

    /// Report split-screen support to the story
    pub fn with_split_screen(mut self) -> Self {
        self.split_available = true;
        self
    }

    /// Make every subsequent `save` fail
    pub fn fail_saves(&mut self) {
        self.save_succeeds = false;
    }

    /// All text printed so far
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Return and clear the collected output
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    /// Text printed while the story had transcripting on
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn print_calls(&self) -> usize {
        self.print_calls
    }

    pub fn saved_state(&self) -> Option<&[u8]> {
        self.saved.as_deref()
    }

    pub fn set_saved_state(&mut self, state: Option<Vec<u8>>) {
        self.saved = state;
    }
}

impl Host for HeadlessHost {
    fn print(&mut self, text: &str, transcript: bool) {
        self.print_calls += 1;
        self.output.push_str(text);
        if transcript {
            self.transcript.push_str(text);
        }
    }

    fn read(&mut self, max_len: usize) -> Option<String> {
        let line = self.inputs.pop_front()?;
        debug!("Headless input: {:?}", line);
        Some(line.chars().take(max_len).collect())
    }

    fn save(&mut self, state: &[u8]) -> bool {
        if self.save_succeeds {
            self.saved = Some(state.to_vec());
        }
        self.save_succeeds
    }

    fn restore(&mut self) -> Option<Vec<u8>> {
        self.saved.clone()
    }

    fn restarted(&mut self) {
        self.restarts += 1;
    }

    fn update_status_line(&mut self, location: &str, status: StatusKind) {
        self.status = Some((location.to_string(), status));
    }

    fn screen(&mut self, window: u16) {
        self.window = window;
    }

    fn split(&mut self, height: u16) {
        self.upper_height = height;
    }

    fn supports_split(&self) -> bool {
        self.split_available
    }

    fn highlight(&mut self, fixed_pitch: bool) {
        self.fixed_pitch = fixed_pitch;
    }
}
