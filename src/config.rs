use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ZResult;

/// Interpreter and CLI settings, read from a TOML file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub interpreter: InterpreterConfig,
    #[serde(default)]
    pub terminal: TerminalConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InterpreterConfig {
    /// Start the random generator in predictable mode with this seed
    #[serde(default)]
    pub seed: Option<u32>,
    /// Stop after this many instructions (0 = unlimited)
    #[serde(default)]
    pub instruction_limit: u64,
    /// Refuse story files whose version byte is not 3
    #[serde(default)]
    pub strict_version: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TerminalConfig {
    #[serde(default = "default_status_line")]
    pub status_line: bool,
    /// File that transcript text is appended to while transcripting is on
    #[serde(default)]
    pub transcript: Option<PathBuf>,
}

fn default_status_line() -> bool {
    true
}

impl Default for TerminalConfig {
    fn default() -> Self {
        TerminalConfig {
            status_line: default_status_line(),
            transcript: None,
        }
    }
}

impl InterpreterConfig {
    pub fn instruction_limit(&self) -> Option<u64> {
        (self.instruction_limit > 0).then_some(self.instruction_limit)
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> ZResult<Self> {
        let content = fs::read_to_string(path)?;
        Config::parse(&content)
    }

    pub fn parse(content: &str) -> ZResult<Self> {
        let mut config: Config = toml::from_str(content)?;
        // An empty path means "no transcript file"
        if config
            .terminal
            .transcript
            .as_ref()
            .is_some_and(|p| p.as_os_str().is_empty())
        {
            config.terminal.transcript = None;
        }
        Ok(config)
    }
}
