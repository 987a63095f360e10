use crate::error::{ZError, ZResult};
use crate::header::{Header, ADDR_FLAGS2, FLAGS2_FIXED_PITCH, FLAGS2_TRANSCRIPT};
use log::{debug, info, warn};

/// Maximum depth of a single frame's evaluation stack
pub const STACK_SIZE: usize = 1024;

/// Maximum number of local variables per routine
pub const MAX_LOCALS: usize = 15;

/// Maximum nesting of routine calls
pub const MAX_CALL_DEPTH: usize = 1024;

/// Represents a call frame on the VM call stack.
///
/// Frame 0 is the top-level context the story starts in: it has no locals
/// and is never popped. Every frame owns its evaluation stack, so a routine
/// can never see or disturb its caller's stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFrame {
    /// Return address (PC to resume the caller at)
    pub return_pc: u32,
    /// Where to store the return value (None = discard)
    pub return_store: Option<u8>,
    /// Local variable values, sized by the routine header
    pub locals: Vec<u16>,
    /// This frame's private evaluation stack
    pub stack: Vec<u16>,
}

impl CallFrame {
    /// The outermost frame a story starts executing in
    pub fn top_level() -> Self {
        CallFrame {
            return_pc: 0,
            return_store: None,
            locals: Vec::new(),
            stack: Vec::new(),
        }
    }
}

/// Represents a loaded game with owned memory
pub struct Game {
    /// The live game memory
    pub memory: Vec<u8>,
    /// The parsed header
    pub header: Header,
    /// Pristine image used by restart, verify and save-state compression
    pub original_memory: Vec<u8>,
}

impl Game {
    /// Create a new game from memory bytes
    pub fn from_memory(memory: Vec<u8>) -> ZResult<Self> {
        let header = Header::new(&memory)?;
        if header.version != 3 {
            warn!(
                "Story file reports version {}; only version 3 semantics are implemented",
                header.version
            );
        }
        let original_memory = memory.clone();
        Ok(Game {
            memory,
            header,
            original_memory,
        })
    }

    /// Size of the region saved, restored and writable by the story
    pub fn dynamic_size(&self) -> usize {
        self.header.base_static_mem
    }
}

/// The Z-Machine virtual machine state
pub struct VM {
    /// The game being executed
    pub game: Game,
    /// Program counter - current instruction address
    pub pc: u32,
    /// Call stack; index 0 is the top-level frame
    pub call_stack: Vec<CallFrame>,
    globals_addr: u32,
}

impl VM {
    /// Create a new VM instance with the given game
    pub fn new(game: Game) -> Self {
        let initial_pc = game.header.initial_pc as u32;
        let globals_addr = game.header.global_variables as u32;
        VM {
            game,
            pc: initial_pc,
            call_stack: vec![CallFrame::top_level()],
            globals_addr,
        }
    }

    /// Reinitialize memory from the pristine image and clear all frames.
    ///
    /// The transcript and fixed-pitch bits of Flags 2 survive, as they
    /// belong to the player's session rather than the story state.
    pub fn restart(&mut self) {
        let preserved = self.read_word(ADDR_FLAGS2 as u32) & (FLAGS2_TRANSCRIPT | FLAGS2_FIXED_PITCH);
        let original = self.game.original_memory.clone();
        self.game.memory = original;
        let flags2 = self.read_word(ADDR_FLAGS2 as u32) & !(FLAGS2_TRANSCRIPT | FLAGS2_FIXED_PITCH);
        let [hi, lo] = (flags2 | preserved).to_be_bytes();
        self.game.memory[ADDR_FLAGS2] = hi;
        self.game.memory[ADDR_FLAGS2 + 1] = lo;
        self.pc = self.game.header.initial_pc as u32;
        self.call_stack.clear();
        self.call_stack.push(CallFrame::top_level());
        info!("VM restarted at PC 0x{:05x}", self.pc);
    }

    /// Number of routine frames above the top level
    pub fn call_depth(&self) -> usize {
        self.call_stack.len() - 1
    }

    /// Check if we're executing at the top level
    pub fn is_main_routine(&self) -> bool {
        self.call_stack.len() == 1
    }

    fn frame(&self) -> &CallFrame {
        // The top-level frame is pushed at construction and never popped
        &self.call_stack[self.call_stack.len() - 1]
    }

    fn frame_mut(&mut self) -> &mut CallFrame {
        let last = self.call_stack.len() - 1;
        &mut self.call_stack[last]
    }

    /// The active frame's evaluation stack
    pub fn stack(&self) -> &[u16] {
        &self.frame().stack
    }

    /// Push a value onto the active frame's evaluation stack
    pub fn push(&mut self, value: u16) -> ZResult<()> {
        let pc = self.pc;
        let frame = self.frame_mut();
        if frame.stack.len() >= STACK_SIZE {
            return Err(ZError::StackOverflow { pc });
        }
        frame.stack.push(value);
        Ok(())
    }

    /// Pop a value from the active frame's evaluation stack
    pub fn pop(&mut self) -> ZResult<u16> {
        let pc = self.pc;
        self.frame_mut()
            .stack
            .pop()
            .ok_or(ZError::StackUnderflow { pc })
    }

    /// Peek at the top of the stack without removing it
    pub fn peek(&self) -> ZResult<u16> {
        self.frame()
            .stack
            .last()
            .copied()
            .ok_or(ZError::StackUnderflow { pc: self.pc })
    }

    /// Read a byte from memory; addresses past the end read as 0
    pub fn read_byte(&self, addr: u32) -> u8 {
        self.game.memory.get(addr as usize).copied().unwrap_or(0)
    }

    /// Read a word (2 bytes, big-endian) from memory
    pub fn read_word(&self, addr: u32) -> u16 {
        let high = self.read_byte(addr) as u16;
        let low = self.read_byte(addr + 1) as u16;
        (high << 8) | low
    }

    /// Write a byte to memory (only in dynamic memory)
    pub fn write_byte(&mut self, addr: u32, value: u8) -> ZResult<()> {
        if addr as usize >= self.game.dynamic_size() {
            return Err(ZError::MemoryAccess { addr, write: true });
        }
        self.game.memory[addr as usize] = value;
        Ok(())
    }

    /// Write a word to memory (only in dynamic memory)
    pub fn write_word(&mut self, addr: u32, value: u16) -> ZResult<()> {
        let [hi, lo] = value.to_be_bytes();
        self.write_byte(addr, hi)?;
        self.write_byte(addr + 1, lo)
    }

    /// Read a global variable (0x10-0xFF)
    pub fn read_global(&self, var: u8) -> ZResult<u16> {
        if var < 0x10 {
            return Err(ZError::Decode {
                pc: self.pc,
                reason: format!("invalid global variable number {var:02x}"),
            });
        }
        let addr = self.globals_addr + (var - 0x10) as u32 * 2;
        Ok(self.read_word(addr))
    }

    /// Write a global variable (0x10-0xFF)
    pub fn write_global(&mut self, var: u8, value: u16) -> ZResult<()> {
        if var < 0x10 {
            return Err(ZError::Decode {
                pc: self.pc,
                reason: format!("invalid global variable number {var:02x}"),
            });
        }
        let addr = self.globals_addr + (var - 0x10) as u32 * 2;
        self.write_word(addr, value)
    }

    fn read_local(&self, var: u8) -> u16 {
        let frame = self.frame();
        let index = (var - 1) as usize;
        match frame.locals.get(index) {
            Some(value) => *value,
            None => {
                warn!(
                    "Reading local variable {} but routine only has {} locals - returning 0",
                    var,
                    frame.locals.len()
                );
                0
            }
        }
    }

    fn write_local(&mut self, var: u8, value: u16) {
        let frame = self.frame_mut();
        let index = (var - 1) as usize;
        match frame.locals.get_mut(index) {
            Some(slot) => *slot = value,
            None => warn!(
                "Writing local variable {} but routine only has {} locals - ignoring",
                var,
                frame.locals.len()
            ),
        }
    }

    /// Read a variable (0x00 = pop stack, 0x01-0x0F = local, 0x10-0xFF = global)
    pub fn read_variable(&mut self, var: u8) -> ZResult<u16> {
        match var {
            0x00 => self.pop(),
            0x01..=0x0F => Ok(self.read_local(var)),
            _ => self.read_global(var),
        }
    }

    /// Write a variable (0x00 = push stack, 0x01-0x0F = local, 0x10-0xFF = global)
    pub fn write_variable(&mut self, var: u8, value: u16) -> ZResult<()> {
        match var {
            0x00 => self.push(value),
            0x01..=0x0F => {
                self.write_local(var, value);
                Ok(())
            }
            _ => self.write_global(var, value),
        }
    }

    /// Read a variable named by an operand; the stack is peeked, not popped.
    ///
    /// Used by opcodes whose operand is itself a variable reference
    /// (`inc`, `dec`, `load`, `store`, `pull`, `inc_chk`, `dec_chk`).
    pub fn read_variable_indirect(&self, var: u8) -> ZResult<u16> {
        match var {
            0x00 => self.peek(),
            0x01..=0x0F => Ok(self.read_local(var)),
            _ => self.read_global(var),
        }
    }

    /// Write a variable named by an operand; the stack top is replaced in place
    pub fn write_variable_indirect(&mut self, var: u8, value: u16) -> ZResult<()> {
        match var {
            0x00 => {
                let pc = self.pc;
                let top = self
                    .frame_mut()
                    .stack
                    .last_mut()
                    .ok_or(ZError::StackUnderflow { pc })?;
                *top = value;
                Ok(())
            }
            0x01..=0x0F => {
                self.write_local(var, value);
                Ok(())
            }
            _ => self.write_global(var, value),
        }
    }

    /// Enter a routine at byte address `addr`.
    ///
    /// Locals start from the routine header's defaults; the first N are then
    /// overwritten by the N supplied arguments. Arguments beyond the declared
    /// local count are discarded.
    pub fn enter_routine(&mut self, addr: u32, args: &[u16], return_store: Option<u8>) -> ZResult<()> {
        if self.call_stack.len() > MAX_CALL_DEPTH {
            return Err(ZError::StackOverflow { pc: self.pc });
        }
        let num_locals = self.read_byte(addr) as usize;
        if num_locals > MAX_LOCALS {
            return Err(ZError::Decode {
                pc: self.pc,
                reason: format!(
                    "routine at {addr:05x} declares {num_locals} locals (max {MAX_LOCALS})"
                ),
            });
        }

        let mut locals: Vec<u16> = (0..num_locals)
            .map(|i| self.read_word(addr + 1 + 2 * i as u32))
            .collect();
        for (slot, arg) in locals.iter_mut().zip(args.iter()) {
            *slot = *arg;
        }
        if args.len() > num_locals {
            debug!(
                "Discarding {} surplus argument(s) to routine at {:05x}",
                args.len() - num_locals,
                addr
            );
        }

        self.call_stack.push(CallFrame {
            return_pc: self.pc,
            return_store,
            locals,
            stack: Vec::new(),
        });
        self.pc = addr + 1 + 2 * num_locals as u32;
        Ok(())
    }

    /// Leave the active routine, returning the popped frame.
    ///
    /// The caller's PC is restored; storing the return value is left to the
    /// caller so that it happens in the caller's variable context.
    pub fn leave_routine(&mut self) -> ZResult<CallFrame> {
        if self.is_main_routine() {
            return Err(ZError::Decode {
                pc: self.pc,
                reason: "return from the top level".to_string(),
            });
        }
        let frame = self
            .call_stack
            .pop()
            .ok_or(ZError::StackUnderflow { pc: self.pc })?;
        self.pc = frame.return_pc;
        Ok(frame)
    }
}
