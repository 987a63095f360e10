// Interpreter Error Handling

use thiserror::Error;

/// Errors that stop the interpreter.
///
/// Conditions the story file can observe (a failed `verify`, a dictionary
/// miss, a refused restore) are not errors; they come back through the
/// normal store/branch outcome of the opcode.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ZError {
    // Decode and dispatch
    #[error("Unknown {form} opcode 0x{opcode:02x} at PC 0x{pc:05x}")]
    UnknownOpcode { opcode: u8, form: &'static str, pc: u32 },

    #[error("Failed to decode instruction at 0x{pc:05x}: {reason}")]
    Decode { pc: u32, reason: String },

    // Stack machine
    #[error("Stack underflow at PC 0x{pc:05x}")]
    StackUnderflow { pc: u32 },

    #[error("Stack overflow at PC 0x{pc:05x}")]
    StackOverflow { pc: u32 },

    #[error("Division by zero at PC 0x{pc:05x}")]
    DivisionByZero { pc: u32 },

    // World model
    #[error("Invalid object number: {0}")]
    InvalidObject(u16),

    #[error("Invalid property {property} for object {object}")]
    InvalidProperty { object: u16, property: u16 },

    // Memory image
    #[error("{} memory address 0x{addr:05x}", access_kind(.write))]
    MemoryAccess { addr: u32, write: bool },

    #[error("Unsupported story file version {0}")]
    UnsupportedVersion(u8),

    #[error("Malformed story file: {0}")]
    BadStory(String),

    // Persistence
    #[error("Save state error: {0}")]
    SaveState(String),

    // Host / runtime
    #[error("Instruction limit of {0} reached")]
    InstructionLimit(u64),

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// io::Error is neither Clone nor PartialEq, so only its message is kept
    #[error("IO error: {0}")]
    Io(String),
}

fn access_kind(write: &bool) -> &'static str {
    if *write {
        "Illegal write to"
    } else {
        "Out of bounds read of"
    }
}

/// Result alias used throughout the interpreter
pub type ZResult<T> = Result<T, ZError>;

impl From<std::io::Error> for ZError {
    fn from(error: std::io::Error) -> Self {
        ZError::Io(error.to_string())
    }
}
