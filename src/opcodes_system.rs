/// Control flow and system operations for Z-Machine interpreter
///
/// Routine calls and returns, unconditional jumps, and the
/// whole-machine operations (save, restore, restart, quit, verify).
use crate::error::ZResult;
use crate::host::Host;
use crate::instruction::Instruction;
use crate::interpreter::{ExecutionResult, Interpreter};
use crate::opcode_tables::SystemOp;
use crate::save_state::{ResumePoint, SaveState};
use log::{debug, info, warn};

impl<H: Host> Interpreter<H> {
    /// Handle control flow and system opcodes
    pub(crate) fn execute_system_op(
        &mut self,
        op: SystemOp,
        inst: &Instruction,
        operands: &[u16],
    ) -> ZResult<ExecutionResult> {
        match op {
            SystemOp::Call => self.do_call(inst, operands),
            SystemOp::Ret => {
                let value = self.operand(operands, 0, inst)?;
                self.do_return(value)
            }
            SystemOp::Rtrue => self.do_return(1),
            SystemOp::Rfalse => self.do_return(0),
            SystemOp::RetPopped => {
                let value = self.vm.pop()?;
                self.do_return(value)
            }
            SystemOp::Jump => {
                let offset = self.operand(operands, 0, inst)? as i16;
                self.vm.pc = (self.vm.pc as i64 + offset as i64 - 2) as u32;
                Ok(ExecutionResult::Branched)
            }
            SystemOp::Nop => Ok(ExecutionResult::Continue),
            SystemOp::Save => {
                let state =
                    SaveState::capture(&self.vm, self.current_pc(), ResumePoint::SaveInstruction);
                let bytes = state.to_bytes(&self.vm);
                let saved = self.host.save(&bytes);
                info!("Save of {} bytes {}", bytes.len(), if saved { "succeeded" } else { "failed" });
                self.do_branch(inst, saved)
            }
            SystemOp::Restore => {
                let Some(bytes) = self.host.restore() else {
                    debug!("Restore cancelled by host");
                    return self.do_branch(inst, false);
                };
                match self.restore_state(&bytes) {
                    // Execution continues after the original save instruction
                    Ok(()) => {
                        info!("Restored game state, resuming at {:05x}", self.vm.pc);
                        Ok(ExecutionResult::Branched)
                    }
                    Err(e) => {
                        warn!("Restore refused: {}", e);
                        self.do_branch(inst, false)
                    }
                }
            }
            SystemOp::Restart => {
                info!("Restarting story");
                self.restart();
                Ok(ExecutionResult::Branched)
            }
            SystemOp::Quit => Ok(ExecutionResult::Quit),
            SystemOp::Verify => {
                let checksum = self.compute_checksum();
                let expected = self.vm.game.header.checksum_file;
                debug!("verify: computed {:04x}, header {:04x}", checksum, expected);
                self.do_branch(inst, checksum == expected)
            }
            SystemOp::Piracy => self.do_branch(inst, true),
        }
    }
}
