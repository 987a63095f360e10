//! Embeddable Z-Machine version 3 interpreter.
//!
//! Load a story with [`vm::Game::from_memory`], wrap it in an
//! [`interpreter::Interpreter`] together with a [`host::Host`]
//! implementation, then drive it with `run` and `provide_input`.

pub mod config;
pub mod dictionary;
pub mod error;
pub mod header;
pub mod host;
pub mod host_headless;
pub mod host_terminal;
pub mod instruction;
pub mod interpreter;
pub mod opcode_tables;
pub mod save_state;
pub mod text;
pub mod vm;
pub mod zobject;
pub mod zrand;

mod opcodes_display;
mod opcodes_math;
mod opcodes_memory;
mod opcodes_object;
mod opcodes_system;

pub use error::{ZError, ZResult};
pub use host::{Host, StatusKind};
pub use host_headless::HeadlessHost;
pub use interpreter::{Interpreter, RunState};
pub use vm::Game;
