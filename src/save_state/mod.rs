//! Save-state serialization
//!
//! A save state is an IFF `FORM` of type `GRSS` holding three chunks:
//! `HEAD` (story identity, pc and resume point), `CMem` (dynamic memory,
//! XOR-RLE against the pristine image) and `Stks` (all call frames with
//! their locals and private evaluation stacks). The layout is versioned by
//! the first byte of `HEAD` and is private to this interpreter.

pub mod chunks;
pub mod compressed_memory;
pub mod iff;

use log::{debug, info};

use crate::error::{ZError, ZResult};
use crate::instruction::{BranchInfo, Instruction};
use crate::opcode_tables::{Opcode, SystemOp};
use crate::vm::{CallFrame, VM};

use chunks::{HeadChunk, StksChunk};
pub use chunks::ResumePoint;
use compressed_memory::{compress_memory, decompress_memory};
use iff::IffFile;

pub const FORM_TYPE: [u8; 4] = *b"GRSS";
pub const FORMAT_VERSION: u8 = 1;

/// A fully decoded and validated save state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveState {
    pub head: HeadChunk,
    pub dynamic_memory: Vec<u8>,
    pub frames: Vec<CallFrame>,
}

impl SaveState {
    /// Snapshot the VM. `pc` and `resume` say how to continue after restore.
    pub fn capture(vm: &VM, pc: u32, resume: ResumePoint) -> SaveState {
        let header = &vm.game.header;
        SaveState {
            head: HeadChunk {
                version: FORMAT_VERSION,
                release: header.release,
                serial: header.serial,
                checksum: header.checksum_file,
                pc,
                resume,
            },
            dynamic_memory: vm.game.memory[..vm.game.dynamic_size()].to_vec(),
            frames: vm.call_stack.clone(),
        }
    }

    pub fn to_bytes(&self, vm: &VM) -> Vec<u8> {
        let original = &vm.game.original_memory[..vm.game.dynamic_size()];
        let mut iff = IffFile::new(FORM_TYPE);
        iff.add_chunk(*b"HEAD", self.head.to_bytes());
        iff.add_chunk(*b"CMem", compress_memory(&self.dynamic_memory, original));
        iff.add_chunk(*b"Stks", StksChunk::encode(&self.frames));
        let bytes = iff.to_bytes();
        debug!(
            "Save state: {} frames, {} bytes",
            self.frames.len(),
            bytes.len()
        );
        bytes
    }

    /// Decode a buffer and check that it belongs to the story loaded in `vm`.
    /// Nothing in `vm` is modified.
    pub fn from_bytes(bytes: &[u8], vm: &VM) -> ZResult<SaveState> {
        let iff = IffFile::from_bytes(bytes)?;
        if iff.form_type != FORM_TYPE {
            return Err(ZError::SaveState(format!(
                "unexpected form type {:?}",
                String::from_utf8_lossy(&iff.form_type)
            )));
        }

        let chunk = |id: &[u8; 4]| {
            iff.find_chunk(id).ok_or_else(|| {
                ZError::SaveState(format!("missing {} chunk", String::from_utf8_lossy(id)))
            })
        };

        let head = HeadChunk::from_bytes(&chunk(b"HEAD")?.data)?;
        if head.version != FORMAT_VERSION {
            return Err(ZError::SaveState(format!(
                "save format version {} (expected {})",
                head.version, FORMAT_VERSION
            )));
        }
        let header = &vm.game.header;
        if head.release != header.release
            || head.serial != header.serial
            || head.checksum != header.checksum_file
        {
            return Err(ZError::SaveState(format!(
                "save is for release {} serial {}, loaded story is release {} serial {}",
                head.release,
                String::from_utf8_lossy(&head.serial),
                header.release,
                header.serial_string()
            )));
        }
        if head.pc as usize >= vm.game.memory.len() {
            return Err(ZError::SaveState(format!("pc {:#x} outside story", head.pc)));
        }

        let original = &vm.game.original_memory[..vm.game.dynamic_size()];
        let dynamic_memory = decompress_memory(&chunk(b"CMem")?.data, original)?;
        let frames = StksChunk::decode(&chunk(b"Stks")?.data)?;

        Ok(SaveState {
            head,
            dynamic_memory,
            frames,
        })
    }

    /// Decode the `save` instruction a `SaveInstruction` state resumes
    /// after, reading this state's dynamic memory in place of the live one.
    /// Fails if finishing that instruction as a successful save could not
    /// complete, so callers can refuse the state before applying it.
    pub fn save_instruction(&self, vm: &VM) -> ZResult<Instruction> {
        let mut memory = self.dynamic_memory.clone();
        memory.extend_from_slice(&vm.game.memory[self.dynamic_memory.len()..]);
        let pc = self.head.pc;
        let inst = Instruction::decode(&memory, pc as usize, vm.game.header.abbrev_table)?;
        if inst.opcode != Opcode::System(SystemOp::Save) {
            return Err(ZError::SaveState(format!(
                "no save instruction at pc {:#x} (found {})",
                pc,
                inst.opcode.name()
            )));
        }
        // rtrue/rfalse branches need a routine frame to leave
        if let Some(BranchInfo { on_true: true, offset: 0 | 1 }) = inst.branch {
            if self.frames.len() < 2 {
                return Err(ZError::SaveState(format!(
                    "save at pc {:#x} returns from the top level",
                    pc
                )));
            }
        }
        Ok(inst)
    }

    /// Replace the VM's dynamic memory, frames and pc
    pub fn apply(self, vm: &mut VM) {
        let size = self.dynamic_memory.len();
        vm.game.memory[..size].copy_from_slice(&self.dynamic_memory);
        vm.call_stack = self.frames;
        vm.pc = self.head.pc;
        info!(
            "Restored state: pc {:05x}, call depth {}",
            vm.pc,
            vm.call_depth()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::Game;
    use test_log::test;

    fn test_vm(release: u8) -> VM {
        let mut memory = vec![0u8; 0x1000];
        memory[0x00] = 3;
        memory[0x03] = release;
        memory[0x06] = 0x08;
        memory[0x0c] = 0x01;
        memory[0x0e] = 0x04;
        memory[0x12..0x18].copy_from_slice(b"261016");
        memory[0x200] = 0x42;
        memory[0x800] = 1;
        VM::new(Game::from_memory(memory).unwrap())
    }

    #[test]
    fn state_round_trips_through_bytes() {
        let mut vm = test_vm(1);
        vm.write_word(0x110, 999).unwrap();
        vm.push(17).unwrap();
        vm.enter_routine(0x800, &[3], Some(0x20)).unwrap();
        vm.push(4).unwrap();

        let state = SaveState::capture(&vm, vm.pc, ResumePoint::AtPc);
        let bytes = state.to_bytes(&vm);

        let fresh = test_vm(1);
        let decoded = SaveState::from_bytes(&bytes, &fresh).unwrap();
        assert_eq!(decoded, state);

        let mut target = fresh;
        decoded.apply(&mut target);
        assert_eq!(target.read_word(0x110), 999);
        assert_eq!(target.read_byte(0x200), 0x42);
        assert_eq!(target.call_stack, vm.call_stack);
        assert_eq!(target.pc, vm.pc);
    }

    #[test]
    fn save_instruction_is_read_from_saved_memory() {
        let mut vm = test_vm(1);
        // save [TRUE +5] written into dynamic memory
        vm.write_byte(0x300, 0xB5).unwrap();
        vm.write_byte(0x301, 0xC5).unwrap();
        let state = SaveState::capture(&vm, 0x300, ResumePoint::SaveInstruction);
        let bytes = state.to_bytes(&vm);

        let fresh = test_vm(1);
        let decoded = SaveState::from_bytes(&bytes, &fresh).unwrap();
        let inst = decoded.save_instruction(&fresh).unwrap();
        assert_eq!(inst.size, 2);
        assert_eq!(inst.branch, Some(BranchInfo { on_true: true, offset: 5 }));
    }

    #[test]
    fn resume_at_other_instruction_is_refused() {
        let mut vm = test_vm(1);
        // rtrue is not a save
        vm.write_byte(0x300, 0xB0).unwrap();
        let state = SaveState::capture(&vm, 0x300, ResumePoint::SaveInstruction);
        assert!(matches!(state.save_instruction(&vm), Err(ZError::SaveState(_))));

        // save [TRUE RTRUE] with no routine to return from
        vm.write_byte(0x300, 0xB5).unwrap();
        vm.write_byte(0x301, 0xC1).unwrap();
        let state = SaveState::capture(&vm, 0x300, ResumePoint::SaveInstruction);
        assert!(matches!(state.save_instruction(&vm), Err(ZError::SaveState(_))));
    }

    #[test]
    fn other_story_is_refused() {
        let vm = test_vm(1);
        let bytes = SaveState::capture(&vm, vm.pc, ResumePoint::AtPc).to_bytes(&vm);
        let other = test_vm(2);
        assert!(matches!(
            SaveState::from_bytes(&bytes, &other),
            Err(ZError::SaveState(_))
        ));
    }
}
