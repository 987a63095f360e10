/// Mathematical and logical operations for Z-Machine interpreter
///
/// Arithmetic is signed 16-bit and wraps on overflow. Comparisons
/// (`jl`, `jg`) are signed; `je` compares its first operand against up
/// to three others.
use crate::error::{ZError, ZResult};
use crate::host::Host;
use crate::instruction::Instruction;
use crate::interpreter::{ExecutionResult, Interpreter};
use crate::opcode_tables::MathOp;
use log::debug;

impl<H: Host> Interpreter<H> {
    /// Handle mathematical and logical opcodes
    pub(crate) fn execute_math_op(
        &mut self,
        op: MathOp,
        inst: &Instruction,
        operands: &[u16],
    ) -> ZResult<ExecutionResult> {
        let a = self.operand(operands, 0, inst)?;

        match op {
            MathOp::Je => {
                // With a single operand there is nothing to compare against
                let equal = operands[1..].iter().any(|b| *b == a);
                self.do_branch(inst, equal)
            }
            MathOp::Jl => {
                let b = self.operand(operands, 1, inst)?;
                self.do_branch(inst, (a as i16) < (b as i16))
            }
            MathOp::Jg => {
                let b = self.operand(operands, 1, inst)?;
                self.do_branch(inst, (a as i16) > (b as i16))
            }
            MathOp::Jz => self.do_branch(inst, a == 0),
            MathOp::Test => {
                let flags = self.operand(operands, 1, inst)?;
                self.do_branch(inst, a & flags == flags)
            }
            MathOp::Not => {
                self.store_result(inst, !a)?;
                Ok(ExecutionResult::Continue)
            }
            MathOp::Random => {
                let value = self.rng_mut().random(a as i16);
                debug!("random {} -> {}", a as i16, value);
                self.store_result(inst, value)?;
                Ok(ExecutionResult::Continue)
            }
            MathOp::Or | MathOp::And | MathOp::Add | MathOp::Sub | MathOp::Mul | MathOp::Div | MathOp::Mod => {
                let b = self.operand(operands, 1, inst)?;
                let (x, y) = (a as i16, b as i16);
                let result = match op {
                    MathOp::Or => a | b,
                    MathOp::And => a & b,
                    MathOp::Add => x.wrapping_add(y) as u16,
                    MathOp::Sub => x.wrapping_sub(y) as u16,
                    MathOp::Mul => x.wrapping_mul(y) as u16,
                    _ => {
                        if y == 0 {
                            return Err(ZError::DivisionByZero {
                                pc: self.current_pc(),
                            });
                        }
                        // Both truncate toward zero; the remainder takes the dividend's sign
                        if op == MathOp::Div {
                            x.wrapping_div(y) as u16
                        } else {
                            x.wrapping_rem(y) as u16
                        }
                    }
                };
                self.store_result(inst, result)?;
                Ok(ExecutionResult::Continue)
            }
        }
    }
}
