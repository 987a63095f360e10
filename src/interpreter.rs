use log::{debug, error, info, warn};

use crate::config::InterpreterConfig;
use crate::dictionary::{Dictionary, Token};
use crate::error::{ZError, ZResult};
use crate::header::{
    ADDR_FLAGS1, ADDR_FLAGS2, ADDR_INTERPRETER_NUMBER, ADDR_INTERPRETER_VERSION,
    ADDR_STANDARD_REVISION, FLAGS1_NO_STATUS_LINE, FLAGS1_SPLIT_AVAILABLE, FLAGS1_STATUS_TIME,
    FLAGS2_FIXED_PITCH, FLAGS2_TRANSCRIPT,
};
use crate::host::{Host, StatusKind};
use crate::instruction::{Instruction, OperandType};
use crate::opcode_tables::Opcode;
use crate::save_state::{ResumePoint, SaveState};
use crate::text;
use crate::vm::{Game, VM};
use crate::zobject::ObjectSystem;
use crate::zrand::ZRand;

/// Interpreter number written to the header (DECSystem-20 style generic)
const INTERPRETER_NUMBER: u8 = 6;
const INTERPRETER_VERSION: u8 = b'G';
/// Standard revision 1.1
const STANDARD_REVISION: u16 = 0x0101;
/// Maximum nesting of output stream 3
const MAX_STREAM3_DEPTH: usize = 16;

/// Result of executing an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionResult {
    /// Continue execution normally
    Continue,
    /// Branch taken, PC already updated
    Branched,
    /// Routine called, PC updated
    Called,
    /// Routine returned
    Returned(u16),
    /// `sread` is waiting for the host to supply a line
    WaitingForInput,
    /// Game should quit
    Quit,
}

/// Where the fetch loop stands between calls to `run`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    /// Suspended inside `sread`; resume with `provide_input`
    WaitingForInput { text: u16, parse: u16 },
    Quit,
}

/// State for managing output stream selection and redirection
#[derive(Debug, Clone)]
struct OutputStreamState {
    /// Stream 1 (screen) selected
    screen: bool,
    /// Stack of output stream 3 table addresses (innermost last)
    stream3_stack: Vec<u16>,
}

impl OutputStreamState {
    fn new() -> Self {
        OutputStreamState {
            screen: true,
            stream3_stack: Vec::new(),
        }
    }
}

/// The main Z-Machine interpreter
pub struct Interpreter<H: Host> {
    pub vm: VM,
    pub host: H,
    dictionary: Dictionary,
    rng: ZRand,
    state: RunState,
    output_streams: OutputStreamState,
    /// Address of the instruction currently executing
    current_pc: u32,
    instruction_count: u64,
    instruction_limit: Option<u64>,
}

impl<H: Host> Interpreter<H> {
    /// Create an interpreter with default settings
    pub fn new(game: Game, host: H) -> ZResult<Self> {
        Self::with_config(game, host, &InterpreterConfig::default())
    }

    pub fn with_config(game: Game, host: H, config: &InterpreterConfig) -> ZResult<Self> {
        let version = game.header.version;
        if version != 3 {
            if config.strict_version {
                return Err(ZError::UnsupportedVersion(version));
            }
            warn!("Running version {} story with version 3 semantics", version);
        }

        let dictionary = Dictionary::parse(&game.memory, game.header.dictionary)?;
        let rng = match config.seed {
            Some(seed) => ZRand::new_predictable(seed),
            None => ZRand::new_uniform(),
        };

        let vm = VM::new(game);
        let mut interp = Interpreter {
            current_pc: vm.pc,
            vm,
            host,
            dictionary,
            rng,
            state: RunState::Running,
            output_streams: OutputStreamState::new(),
            instruction_count: 0,
            instruction_limit: config.instruction_limit(),
        };
        interp.prepare_header();
        interp.host.restarted();

        info!(
            "Loaded story release {} serial {}, initial PC {:05x}",
            interp.vm.game.header.release,
            interp.vm.game.header.serial_string(),
            interp.vm.pc
        );
        Ok(interp)
    }

    /// Fill in the header bytes that belong to the interpreter
    fn prepare_header(&mut self) {
        let memory = &mut self.vm.game.memory;
        let mut flags1 = memory[ADDR_FLAGS1] & !(FLAGS1_NO_STATUS_LINE | FLAGS1_SPLIT_AVAILABLE);
        if self.host.supports_split() {
            flags1 |= FLAGS1_SPLIT_AVAILABLE;
        }
        memory[ADDR_FLAGS1] = flags1;
        memory[ADDR_INTERPRETER_NUMBER] = INTERPRETER_NUMBER;
        memory[ADDR_INTERPRETER_VERSION] = INTERPRETER_VERSION;
        let [hi, lo] = STANDARD_REVISION.to_be_bytes();
        memory[ADDR_STANDARD_REVISION] = hi;
        memory[ADDR_STANDARD_REVISION + 1] = lo;
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn instruction_count(&self) -> u64 {
        self.instruction_count
    }

    /// Run until the story quits or waits for input
    pub fn run(&mut self) -> ZResult<RunState> {
        while self.state == RunState::Running {
            if let Some(limit) = self.instruction_limit {
                if self.instruction_count >= limit {
                    error!("Stopping at PC {:05x}: instruction limit {} reached", self.vm.pc, limit);
                    return Err(ZError::InstructionLimit(limit));
                }
            }
            if let Err(e) = self.step() {
                error!("Fatal error: {}", e);
                return Err(e);
            }
        }
        Ok(self.state)
    }

    /// Fetch, decode and execute one instruction
    pub fn step(&mut self) -> ZResult<ExecutionResult> {
        let pc = self.vm.pc;
        let inst = Instruction::decode(
            &self.vm.game.memory,
            pc as usize,
            self.vm.game.header.abbrev_table,
        )?;
        debug!("{:05x}: {}", pc, inst);

        self.current_pc = pc;
        self.vm.pc = pc + inst.size as u32;
        self.instruction_count += 1;

        let result = self.execute_instruction(&inst)?;
        if result == ExecutionResult::Quit {
            self.state = RunState::Quit;
        }
        Ok(result)
    }

    /// Complete a suspended `sread` with the host's line and resume
    pub fn provide_input(&mut self, line: &str) -> ZResult<()> {
        match self.state {
            RunState::WaitingForInput { text, parse } => {
                self.store_line(line, text, parse)?;
                self.state = RunState::Running;
                Ok(())
            }
            other => {
                warn!("Input supplied while not waiting for input ({:?})", other);
                Ok(())
            }
        }
    }

    /// Run a routine from the current context to completion and return its
    /// value. The caller's frames, stack and PC are left as they were.
    pub fn call_routine(&mut self, packed: u16, args: &[u16]) -> ZResult<u16> {
        if packed == 0 {
            return Ok(0);
        }
        let depth = self.vm.call_stack.len();
        let addr = self.unpack_routine_address(packed)?;
        self.vm.enter_routine(addr, args, None)?;

        loop {
            match self.step()? {
                ExecutionResult::Returned(value) if self.vm.call_stack.len() == depth => {
                    return Ok(value);
                }
                ExecutionResult::Quit => return Ok(0),
                ExecutionResult::WaitingForInput => {
                    return Err(ZError::Decode {
                        pc: self.current_pc,
                        reason: "routine called by the host asked for input".to_string(),
                    });
                }
                _ => {}
            }
        }
    }

    /// Serialize the full machine state
    pub fn save_state(&self) -> Vec<u8> {
        let resume = match self.state {
            RunState::WaitingForInput { text, parse } => ResumePoint::AwaitingInput { text, parse },
            _ => ResumePoint::AtPc,
        };
        SaveState::capture(&self.vm, self.vm.pc, resume).to_bytes(&self.vm)
    }

    /// Restore a state produced by `save_state` (or the `save` opcode).
    /// On error nothing has been changed.
    pub fn restore_state(&mut self, bytes: &[u8]) -> ZResult<()> {
        let state = SaveState::from_bytes(bytes, &self.vm)?;
        let resume = state.head.resume;
        let save_inst = match resume {
            ResumePoint::SaveInstruction => Some(state.save_instruction(&self.vm)?),
            _ => None,
        };

        let preserved = self.vm.read_word(ADDR_FLAGS2 as u32) & (FLAGS2_TRANSCRIPT | FLAGS2_FIXED_PITCH);
        state.apply(&mut self.vm);
        let flags2 = self.vm.read_word(ADDR_FLAGS2 as u32) & !(FLAGS2_TRANSCRIPT | FLAGS2_FIXED_PITCH);
        self.set_flags2(flags2 | preserved);
        self.prepare_header();
        self.output_streams.stream3_stack.clear();

        self.state = RunState::Running;
        if let Some(inst) = save_inst {
            // Finish the save instruction as a successful save
            let pc = self.vm.pc;
            self.current_pc = pc;
            self.vm.pc = pc + inst.size as u32;
            self.do_branch(&inst, true)?;
        }
        if let ResumePoint::AwaitingInput { text, parse } = resume {
            self.state = RunState::WaitingForInput { text, parse };
        }
        Ok(())
    }

    /// Reinitialize memory and frames from the pristine story image
    pub fn restart(&mut self) {
        self.vm.restart();
        self.prepare_header();
        self.output_streams = OutputStreamState::new();
        self.state = RunState::Running;
        self.host.restarted();
    }

    fn set_flags2(&mut self, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.vm.game.memory[ADDR_FLAGS2] = hi;
        self.vm.game.memory[ADDR_FLAGS2 + 1] = lo;
    }

    /// Whether the story has transcripting switched on
    pub fn transcript_on(&self) -> bool {
        self.vm.read_word(ADDR_FLAGS2 as u32) & FLAGS2_TRANSCRIPT != 0
    }

    /// Execute an instruction whose PC has already been advanced
    pub fn execute_instruction(&mut self, inst: &Instruction) -> ZResult<ExecutionResult> {
        let operands = self.resolve_operands(inst)?;
        match inst.opcode {
            Opcode::Math(op) => self.execute_math_op(op, inst, &operands),
            Opcode::Object(op) => self.execute_object_op(op, inst, &operands),
            Opcode::Memory(op) => self.execute_memory_op(op, inst, &operands),
            Opcode::Display(op) => self.execute_display_op(op, inst, &operands),
            Opcode::System(op) => self.execute_system_op(op, inst, &operands),
        }
    }

    /// Read operand values; variable operands are fetched (stack operands popped)
    pub fn resolve_operands(&mut self, inst: &Instruction) -> ZResult<Vec<u16>> {
        inst.operands
            .iter()
            .zip(inst.operand_types.iter())
            .map(|(&operand, op_type)| match op_type {
                OperandType::Variable => self.vm.read_variable(operand as u8),
                _ => Ok(operand),
            })
            .collect()
    }

    /// Fetch operand `index`, failing if the instruction did not supply it
    pub(crate) fn operand(&self, operands: &[u16], index: usize, inst: &Instruction) -> ZResult<u16> {
        operands.get(index).copied().ok_or_else(|| ZError::Decode {
            pc: self.current_pc,
            reason: format!("{} expects at least {} operand(s)", inst.opcode, index + 1),
        })
    }

    /// Store an instruction's result in its store variable
    pub(crate) fn store_result(&mut self, inst: &Instruction, value: u16) -> ZResult<()> {
        match inst.store_var {
            Some(var) => self.vm.write_variable(var, value),
            None => Ok(()),
        }
    }

    pub(crate) fn do_branch(&mut self, inst: &Instruction, condition: bool) -> ZResult<ExecutionResult> {
        let Some(branch) = inst.branch else {
            return Ok(ExecutionResult::Continue);
        };
        if condition != branch.on_true {
            return Ok(ExecutionResult::Continue);
        }
        match branch.offset {
            0 => self.do_return(0),
            1 => self.do_return(1),
            offset => {
                // Relative to the instruction after the branch data
                self.vm.pc = (self.vm.pc as i64 + offset as i64 - 2) as u32;
                Ok(ExecutionResult::Branched)
            }
        }
    }

    pub(crate) fn do_call(&mut self, inst: &Instruction, operands: &[u16]) -> ZResult<ExecutionResult> {
        let packed = self.operand(operands, 0, inst)?;
        if packed == 0 {
            // Calling address 0 does nothing and returns false
            self.store_result(inst, 0)?;
            return Ok(ExecutionResult::Continue);
        }
        let addr = self.unpack_routine_address(packed)?;
        debug!(
            "call {:05x} with {:?} -> {:?}",
            addr,
            &operands[1..],
            inst.store_var
        );
        self.vm.enter_routine(addr, &operands[1..], inst.store_var)?;
        Ok(ExecutionResult::Called)
    }

    pub(crate) fn do_return(&mut self, value: u16) -> ZResult<ExecutionResult> {
        let frame = self.vm.leave_routine()?;
        debug!("Returning {} to {:05x}", value, frame.return_pc);
        if let Some(var) = frame.return_store {
            self.vm.write_variable(var, value)?;
        }
        Ok(ExecutionResult::Returned(value))
    }

    fn unpack_routine_address(&self, packed: u16) -> ZResult<u32> {
        let addr = packed as u32 * 2;
        if addr as usize >= self.vm.game.memory.len() {
            return Err(ZError::MemoryAccess { addr, write: false });
        }
        Ok(addr)
    }

    /// Send text to the active output stream
    pub(crate) fn output_text(&mut self, text: &str) -> ZResult<()> {
        if let Some(&table) = self.output_streams.stream3_stack.last() {
            let count = self.vm.read_word(table as u32);
            let mut written = 0u16;
            for ch in text.chars() {
                let code = text::char_to_zscii(ch).unwrap_or('?' as u16) as u8;
                let addr = (table as u32 + 2 + count as u32 + written as u32) & 0xFFFF;
                self.vm.write_byte(addr, code)?;
                written += 1;
            }
            return self.vm.write_word(table as u32, count.wrapping_add(written));
        }

        if self.output_streams.screen && !text.is_empty() {
            let transcript = self.transcript_on();
            self.host.print(text, transcript);
        }
        Ok(())
    }

    pub(crate) fn select_output_stream(&mut self, stream: i16, table: Option<u16>) -> ZResult<()> {
        match stream {
            0 => {}
            1 => self.output_streams.screen = true,
            -1 => self.output_streams.screen = false,
            2 | -2 => {
                let flags2 = self.vm.read_word(ADDR_FLAGS2 as u32);
                let flags2 = if stream > 0 {
                    flags2 | FLAGS2_TRANSCRIPT
                } else {
                    flags2 & !FLAGS2_TRANSCRIPT
                };
                self.set_flags2(flags2);
                debug!("Transcript {}", if stream > 0 { "on" } else { "off" });
            }
            3 => {
                let table = table.ok_or_else(|| ZError::Decode {
                    pc: self.current_pc,
                    reason: "output_stream 3 without a table".to_string(),
                })?;
                if self.output_streams.stream3_stack.len() >= MAX_STREAM3_DEPTH {
                    return Err(ZError::Decode {
                        pc: self.current_pc,
                        reason: format!("output stream 3 nested more than {MAX_STREAM3_DEPTH} deep"),
                    });
                }
                self.vm.write_word(table as u32, 0)?;
                self.output_streams.stream3_stack.push(table);
            }
            -3 => {
                if self.output_streams.stream3_stack.pop().is_none() {
                    debug!("output_stream -3 with no active table");
                }
            }
            4 | -4 => debug!("Ignoring output stream {}", stream),
            other => warn!("Unknown output stream {}", other),
        }
        Ok(())
    }

    /// Report location, score/turns or time to the host
    pub(crate) fn show_status(&mut self) -> ZResult<()> {
        let location = self.vm.read_global(0x10)?;
        let name = if location == 0 {
            String::new()
        } else {
            self.vm.object_name(location)?
        };
        let v1 = self.vm.read_global(0x11)?;
        let v2 = self.vm.read_global(0x12)?;
        let status = if self.vm.read_byte(ADDR_FLAGS1 as u32) & FLAGS1_STATUS_TIME != 0 {
            StatusKind::Time { hours: v1, minutes: v2 }
        } else {
            StatusKind::Score {
                score: v1 as i16,
                turns: v2,
            }
        };
        self.host.update_status_line(&name, status);
        Ok(())
    }

    /// Write a byte, telling the host when the fixed-pitch bit of Flags 2 flips
    pub(crate) fn write_byte_watched(&mut self, addr: u32, value: u8) -> ZResult<()> {
        let before = self.vm.read_word(ADDR_FLAGS2 as u32) & FLAGS2_FIXED_PITCH;
        self.vm.write_byte(addr, value)?;
        if addr == ADDR_FLAGS2 as u32 || addr == ADDR_FLAGS2 as u32 + 1 {
            let after = self.vm.read_word(ADDR_FLAGS2 as u32) & FLAGS2_FIXED_PITCH;
            if before != after {
                self.host.highlight(after != 0);
            }
        }
        Ok(())
    }

    /// Sum of the pristine story bytes from 0x40 to the header's file length
    pub(crate) fn compute_checksum(&self) -> u16 {
        let original = &self.vm.game.original_memory;
        let end = self.vm.game.header.len_file.min(original.len());
        original
            .get(0x40..end)
            .unwrap_or(&[])
            .iter()
            .fold(0u16, |sum, b| sum.wrapping_add(*b as u16))
    }

    /// Write a line into the text buffer and tokenize it into the parse buffer
    pub(crate) fn store_line(&mut self, line: &str, text: u16, parse: u16) -> ZResult<Vec<Token>> {
        self.vm
            .store_input(&self.dictionary, line, text as u32, parse as u32)
    }

    pub(crate) fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    pub(crate) fn rng_mut(&mut self) -> &mut ZRand {
        &mut self.rng
    }

    pub(crate) fn current_pc(&self) -> u32 {
        self.current_pc
    }

    pub(crate) fn suspend_for_input(&mut self, text: u16, parse: u16) {
        self.state = RunState::WaitingForInput { text, parse };
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::header::ADDR_CHECKSUM;
    use crate::host_headless::HeadlessHost;
    use test_log::test;

    pub(crate) const CODE_START: usize = 0x1000;
    const STORY_SIZE: usize = 0x2000;
    const OBJECTS: usize = 0x0300;
    const DICTIONARY: usize = 0x0800;

    fn put_word(memory: &mut [u8], addr: usize, value: u16) {
        memory[addr..addr + 2].copy_from_slice(&value.to_be_bytes());
    }

    /// A small v3 story: three objects ("room" holding "lamp" and "key"),
    /// a three-word dictionary and `code` at 0x1000.
    pub(crate) fn story_with_code(code: &[u8]) -> Vec<u8> {
        let mut memory = vec![0u8; STORY_SIZE];
        memory[0x00] = 3;
        put_word(&mut memory, 0x02, 1);
        put_word(&mut memory, 0x04, CODE_START as u16);
        put_word(&mut memory, 0x06, CODE_START as u16);
        put_word(&mut memory, 0x08, DICTIONARY as u16);
        put_word(&mut memory, 0x0A, OBJECTS as u16);
        put_word(&mut memory, 0x0C, 0x0100);
        put_word(&mut memory, 0x0E, 0x0800);
        memory[0x12..0x18].copy_from_slice(b"261016");
        put_word(&mut memory, 0x18, 0x0040);
        put_word(&mut memory, 0x1A, (STORY_SIZE / 2) as u16);

        // (name, parent, sibling, child)
        let objects = [("room", 0, 0, 2), ("lamp", 1, 3, 0), ("key", 1, 0, 0)];
        for (i, (name, parent, sibling, child)) in objects.iter().enumerate() {
            let number = i as u16 + 1;
            let entry = OBJECTS + 62 + i * 9;
            let props = 0x0400 + i * 0x20;
            memory[entry + 4] = *parent;
            memory[entry + 5] = *sibling;
            memory[entry + 6] = *child;
            put_word(&mut memory, entry + 7, props as u16);

            let encoded = text::encode_string(name);
            memory[props] = (encoded.len() / 2) as u8;
            let mut at = props + 1;
            memory[at..at + encoded.len()].copy_from_slice(&encoded);
            at += encoded.len();
            memory[at] = (1 << 5) | 10;
            put_word(&mut memory, at + 1, number * 100);
            memory[at + 3] = 5;
            memory[at + 4] = number as u8;
            memory[at + 5] = 0;
        }

        let header = [2, b'.', b',', 7, 0, 3];
        memory[DICTIONARY..DICTIONARY + header.len()].copy_from_slice(&header);
        for (i, word) in ["lamp", "north", "take"].iter().enumerate() {
            let entry = DICTIONARY + header.len() + i * 7;
            memory[entry..entry + 4].copy_from_slice(&text::encode_dictionary_word(word));
        }

        memory[CODE_START..CODE_START + code.len()].copy_from_slice(code);

        let checksum = memory[0x40..]
            .iter()
            .fold(0u16, |sum, b| sum.wrapping_add(*b as u16));
        put_word(&mut memory, ADDR_CHECKSUM, checksum);
        memory
    }

    pub(crate) fn interpreter_with_code(code: &[u8]) -> Interpreter<HeadlessHost> {
        let game = Game::from_memory(story_with_code(code)).expect("valid story");
        Interpreter::new(game, HeadlessHost::new()).expect("interpreter")
    }

    /// Write bytes into both live and pristine memory, as if part of the story
    pub(crate) fn place(interp: &mut Interpreter<HeadlessHost>, addr: usize, bytes: &[u8]) {
        interp.vm.game.memory[addr..addr + bytes.len()].copy_from_slice(bytes);
        interp.vm.game.original_memory[addr..addr + bytes.len()].copy_from_slice(bytes);
    }

    pub(crate) fn run_steps(interp: &mut Interpreter<HeadlessHost>, count: usize) {
        for _ in 0..count {
            interp.step().expect("instruction should execute");
        }
    }

    #[test]
    fn header_bytes_are_filled_in() {
        let game = Game::from_memory(story_with_code(&[0xBA])).unwrap();
        let interp = Interpreter::new(game, HeadlessHost::new().with_split_screen()).unwrap();
        let memory = &interp.vm.game.memory;
        assert_eq!(memory[ADDR_INTERPRETER_NUMBER], INTERPRETER_NUMBER);
        assert_eq!(memory[ADDR_INTERPRETER_VERSION], b'G');
        assert_ne!(memory[ADDR_FLAGS1] & FLAGS1_SPLIT_AVAILABLE, 0);
        assert_eq!(memory[ADDR_FLAGS1] & FLAGS1_NO_STATUS_LINE, 0);
        assert_eq!(interp.host.restarts, 1);
    }

    #[test]
    fn strict_version_refuses_other_versions() {
        let mut memory = story_with_code(&[0xBA]);
        memory[0] = 5;
        let config = InterpreterConfig {
            strict_version: true,
            ..Default::default()
        };
        let result = Interpreter::with_config(
            Game::from_memory(memory).unwrap(),
            HeadlessHost::new(),
            &config,
        );
        assert_eq!(result.err(), Some(ZError::UnsupportedVersion(5)));
    }

    #[test]
    fn instruction_limit_stops_run() {
        let config = InterpreterConfig {
            instruction_limit: 3,
            ..Default::default()
        };
        // jump -1: loops on itself
        let game = Game::from_memory(story_with_code(&[0x8C, 0xFF, 0xFF])).unwrap();
        let mut interp = Interpreter::with_config(game, HeadlessHost::new(), &config).unwrap();
        assert_eq!(interp.run(), Err(ZError::InstructionLimit(3)));
        assert_eq!(interp.instruction_count(), 3);
    }

    #[test]
    fn unknown_opcode_is_fatal() {
        let mut interp = interpreter_with_code(&[0xBE, 0x00]);
        assert_eq!(
            interp.run(),
            Err(ZError::UnknownOpcode {
                opcode: 0x00,
                form: "EXT",
                pc: 0x1000
            })
        );
    }

    #[test]
    fn call_routine_leaves_caller_untouched() {
        let mut interp = interpreter_with_code(&[0xBA]);
        // Routine at 0x1100: 1 local, pushes 7 then returns L1 * 2
        place(
            &mut interp,
            0x1100,
            &[0x01, 0x00, 0x00, 0xE8, 0x7F, 0x07, 0x56, 0x01, 0x02, 0x00, 0xB8],
        );
        interp.vm.push(42).unwrap();

        assert_eq!(interp.call_routine(0x0880, &[21]), Ok(42));
        assert_eq!(interp.vm.stack(), &[42]);
        assert_eq!(interp.vm.pc, 0x1000);
        assert!(interp.vm.is_main_routine());
        assert_eq!(interp.call_routine(0, &[1]), Ok(0));
    }

    #[test]
    fn save_state_round_trip_restores_everything() {
        let mut interp = interpreter_with_code(&[0xBA]);
        place(&mut interp, 0x1100, &[0x02, 0x00, 0x00, 0x00, 0x00]);
        interp.vm.write_global(0x10, 77).unwrap();
        interp.vm.push(5).unwrap();
        interp.vm.enter_routine(0x1100, &[1, 2], Some(0x11)).unwrap();
        interp.vm.push(9).unwrap();
        let saved = interp.save_state();
        let frames = interp.vm.call_stack.clone();
        let pc = interp.vm.pc;

        interp.restart();
        assert_eq!(interp.vm.read_global(0x10), Ok(0));

        interp.restore_state(&saved).unwrap();
        assert_eq!(interp.vm.read_global(0x10), Ok(77));
        assert_eq!(interp.vm.call_stack, frames);
        assert_eq!(interp.vm.pc, pc);
        assert_eq!(interp.state(), RunState::Running);
    }

    #[test]
    fn mismatched_save_is_refused_without_changes() {
        let mut interp = interpreter_with_code(&[0xBA]);
        let mut saved = interp.save_state();
        // HEAD data starts after FORM header (12) and chunk header (8); release follows version
        saved[21] ^= 0xFF;
        interp.vm.write_global(0x10, 5).unwrap();

        assert!(matches!(interp.restore_state(&saved), Err(ZError::SaveState(_))));
        assert_eq!(interp.vm.read_global(0x10), Ok(5));
    }

    #[test]
    fn undecodable_resume_instruction_is_refused_without_changes() {
        let mut interp = interpreter_with_code(&[0xBA, 0x00, 0x00, 0x00]);
        interp.vm.write_global(0x10, 77).unwrap();
        // 2OP:0x00 does not exist
        let saved = SaveState::capture(&interp.vm, 0x1001, ResumePoint::SaveInstruction)
            .to_bytes(&interp.vm);
        interp.vm.write_global(0x10, 5).unwrap();

        assert!(matches!(
            interp.restore_state(&saved),
            Err(ZError::UnknownOpcode { opcode: 0x00, .. })
        ));
        assert_eq!(interp.vm.read_global(0x10), Ok(5));
        assert_eq!(interp.vm.pc, 0x1000);
        assert_eq!(interp.state(), RunState::Running);
    }

    #[test]
    fn suspended_input_survives_save_and_restore() {
        let mut interp = interpreter_with_code(&[0xE4, 0x0F, 0x06, 0x00, 0x06, 0x80, 0xBA]);
        interp.vm.write_byte(0x600, 20).unwrap();
        interp.vm.write_byte(0x680, 2).unwrap();
        assert_eq!(
            interp.run(),
            Ok(RunState::WaitingForInput {
                text: 0x600,
                parse: 0x680
            })
        );
        let saved = interp.save_state();

        interp.restart();
        interp.restore_state(&saved).unwrap();
        assert!(matches!(interp.state(), RunState::WaitingForInput { .. }));

        interp.provide_input("take lamp").unwrap();
        assert_eq!(interp.run(), Ok(RunState::Quit));
        assert_eq!(interp.vm.read_byte(0x681), 2);
    }

    #[test]
    fn input_while_running_is_ignored() {
        let mut interp = interpreter_with_code(&[0xBA]);
        assert_eq!(interp.provide_input("look"), Ok(()));
        assert_eq!(interp.state(), RunState::Running);
    }
}
