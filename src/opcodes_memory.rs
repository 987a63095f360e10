/// Memory and variable operations for Z-Machine interpreter
///
/// Covers table access (`loadw`, `loadb`, `storew`, `storeb`), variable
/// access by reference and the evaluation stack. Opcodes whose first
/// operand names a variable address variable 0 in place: they peek or
/// replace the top of stack instead of popping or pushing it.
use crate::error::ZResult;
use crate::host::Host;
use crate::instruction::Instruction;
use crate::interpreter::{ExecutionResult, Interpreter};
use crate::opcode_tables::MemoryOp;
use log::debug;

impl<H: Host> Interpreter<H> {
    /// Handle memory and stack opcodes
    pub(crate) fn execute_memory_op(
        &mut self,
        op: MemoryOp,
        inst: &Instruction,
        operands: &[u16],
    ) -> ZResult<ExecutionResult> {
        match op {
            MemoryOp::Store => {
                let var = self.operand(operands, 0, inst)? as u8;
                let value = self.operand(operands, 1, inst)?;
                self.vm.write_variable_indirect(var, value)?;
                Ok(ExecutionResult::Continue)
            }
            MemoryOp::Load => {
                let var = self.operand(operands, 0, inst)? as u8;
                let value = self.vm.read_variable_indirect(var)?;
                self.store_result(inst, value)?;
                Ok(ExecutionResult::Continue)
            }
            MemoryOp::Loadw => {
                let addr = self.table_address(operands, inst, 2)?;
                let value = self.vm.read_word(addr);
                self.store_result(inst, value)?;
                Ok(ExecutionResult::Continue)
            }
            MemoryOp::Loadb => {
                let addr = self.table_address(operands, inst, 1)?;
                let value = self.vm.read_byte(addr) as u16;
                self.store_result(inst, value)?;
                Ok(ExecutionResult::Continue)
            }
            MemoryOp::Storew => {
                let addr = self.table_address(operands, inst, 2)?;
                let value = self.operand(operands, 2, inst)?;
                let [hi, lo] = value.to_be_bytes();
                self.write_byte_watched(addr, hi)?;
                self.write_byte_watched(addr + 1, lo)?;
                Ok(ExecutionResult::Continue)
            }
            MemoryOp::Storeb => {
                let addr = self.table_address(operands, inst, 1)?;
                let value = self.operand(operands, 2, inst)?;
                self.write_byte_watched(addr, value as u8)?;
                Ok(ExecutionResult::Continue)
            }
            MemoryOp::Inc | MemoryOp::Dec | MemoryOp::IncChk | MemoryOp::DecChk => {
                let var = self.operand(operands, 0, inst)? as u8;
                let old = self.vm.read_variable_indirect(var)? as i16;
                let new = match op {
                    MemoryOp::Inc | MemoryOp::IncChk => old.wrapping_add(1),
                    _ => old.wrapping_sub(1),
                };
                self.vm.write_variable_indirect(var, new as u16)?;

                match op {
                    MemoryOp::IncChk => {
                        let limit = self.operand(operands, 1, inst)? as i16;
                        self.do_branch(inst, new > limit)
                    }
                    MemoryOp::DecChk => {
                        let limit = self.operand(operands, 1, inst)? as i16;
                        self.do_branch(inst, new < limit)
                    }
                    _ => Ok(ExecutionResult::Continue),
                }
            }
            MemoryOp::Push => {
                let value = self.operand(operands, 0, inst)?;
                self.vm.push(value)?;
                Ok(ExecutionResult::Continue)
            }
            MemoryOp::Pull => {
                let var = self.operand(operands, 0, inst)? as u8;
                let value = self.vm.pop()?;
                debug!("pull {} into variable {:02x}", value, var);
                self.vm.write_variable_indirect(var, value)?;
                Ok(ExecutionResult::Continue)
            }
            MemoryOp::Pop => {
                self.vm.pop()?;
                Ok(ExecutionResult::Continue)
            }
        }
    }

    /// `array + scale * index`, wrapped to the 16-bit address space
    fn table_address(&self, operands: &[u16], inst: &Instruction, scale: u32) -> ZResult<u32> {
        let array = self.operand(operands, 0, inst)? as u32;
        let index = self.operand(operands, 1, inst)? as u32;
        Ok(array.wrapping_add(scale * index) & 0xFFFF)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ZError;
    use crate::header::{ADDR_FLAGS2, FLAGS2_FIXED_PITCH};
    use crate::interpreter::tests::{interpreter_with_code, run_steps};
    use test_log::test;

    #[test]
    fn table_words_and_bytes() {
        let mut interp = interpreter_with_code(&[
            0xE1, 0x13, 0x06, 0x00, 0x03, 0x12, 0x34, // storew #0x600 #3 #0x1234
            0xCF, 0x1F, 0x06, 0x00, 0x03, 0x10, // loadw #0x600 #3 -> g0
            0xD0, 0x1F, 0x06, 0x00, 0x07, 0x11, // loadb #0x600 #7 -> g1
        ]);
        run_steps(&mut interp, 3);
        assert_eq!(interp.vm.read_word(0x606), 0x1234);
        assert_eq!(interp.vm.read_global(0x10), Ok(0x1234));
        assert_eq!(interp.vm.read_global(0x11), Ok(0x34));
    }

    #[test]
    fn storeb_then_loadb() {
        let mut interp = interpreter_with_code(&[
            0xE2, 0x17, 0x06, 0x00, 0x01, 0xAB, // storeb #0x600 #1 #0xAB
            0xD0, 0x1F, 0x06, 0x00, 0x01, 0x10, // loadb #0x600 #1 -> g0
        ]);
        run_steps(&mut interp, 2);
        assert_eq!(interp.vm.read_global(0x10), Ok(0xAB));
    }

    #[test]
    fn storew_into_static_memory_is_fatal() {
        let mut interp =
            interpreter_with_code(&[0xE1, 0x13, 0x08, 0x00, 0x00, 0x12, 0x34]);
        assert_eq!(
            interp.step(),
            Err(ZError::MemoryAccess {
                addr: 0x0800,
                write: true
            })
        );
    }

    #[test]
    fn indirect_stack_reference_works_in_place() {
        let mut interp = interpreter_with_code(&[
            0xE8, 0x7F, 0x05, // push #5
            0x95, 0x00, // inc sp (in place)
            0x0D, 0x00, 0x09, // store sp #9 (replaces top)
            0x9E, 0x00, 0x10, // load sp -> g0 (peek)
        ]);
        run_steps(&mut interp, 4);
        assert_eq!(interp.vm.stack(), &[9]);
        assert_eq!(interp.vm.read_global(0x10), Ok(9));
    }

    #[test]
    fn inc_chk_and_dec_chk_are_signed() {
        let mut interp = interpreter_with_code(&[
            0x0D, 0x10, 0x00, // store g0 #0
            0x05, 0x10, 0x00, 0xC3, // inc_chk g0 #0 ?+3  (1 > 0)
            0xB0, // skipped
            0x0D, 0x11, 0x00, // store g1 #0
            0x04, 0x11, 0x00, 0x42, // dec_chk g1 #0 ?~+2  (-1 < 0)
        ]);
        run_steps(&mut interp, 4);
        assert_eq!(interp.vm.read_global(0x10), Ok(1));
        assert_eq!(interp.vm.read_global(0x11), Ok(0xFFFF));
        // Last branch was on false, so the true outcome fell through
        assert_eq!(interp.vm.pc, 0x1000 + 15);
    }

    #[test]
    fn push_pull_pop() {
        let mut interp = interpreter_with_code(&[
            0xE8, 0x7F, 0x07, // push #7
            0xE8, 0x7F, 0x08, // push #8
            0xE9, 0x7F, 0x10, // pull g0
            0xB9, // pop
            0xB9, // pop (empty)
        ]);
        run_steps(&mut interp, 4);
        assert_eq!(interp.vm.read_global(0x10), Ok(8));
        assert!(interp.vm.stack().is_empty());
        assert!(matches!(interp.step(), Err(ZError::StackUnderflow { .. })));
    }

    #[test]
    fn fixed_pitch_flag_notifies_host() {
        let flags2 = ADDR_FLAGS2 as u8 + 1;
        let mut interp = interpreter_with_code(&[
            0xE2, 0x57, 0x00, flags2, FLAGS2_FIXED_PITCH as u8, // storeb #0 #0x11 #2
        ]);
        run_steps(&mut interp, 1);
        assert!(interp.host.fixed_pitch);
    }
}
