/// Display and input operations for Z-Machine interpreter
///
/// Text output goes through `output_text` so that stream selection and
/// memory redirection apply uniformly. `sread` asks the host for a line
/// and suspends the machine when none is available yet.
use crate::error::ZResult;
use crate::host::Host;
use crate::instruction::Instruction;
use crate::interpreter::{ExecutionResult, Interpreter};
use crate::opcode_tables::DisplayOp;
use crate::text;
use log::debug;

impl<H: Host> Interpreter<H> {
    /// Handle text output, window and input opcodes
    pub(crate) fn execute_display_op(
        &mut self,
        op: DisplayOp,
        inst: &Instruction,
        operands: &[u16],
    ) -> ZResult<ExecutionResult> {
        match op {
            DisplayOp::Print => {
                if let Some(text) = &inst.text {
                    self.output_text(text)?;
                }
                Ok(ExecutionResult::Continue)
            }
            DisplayOp::PrintRet => {
                if let Some(text) = &inst.text {
                    self.output_text(text)?;
                }
                self.output_text("\n")?;
                self.do_return(1)
            }
            DisplayOp::PrintAddr => {
                let addr = self.operand(operands, 0, inst)?;
                let (string, _) = text::decode_string(
                    &self.vm.game.memory,
                    addr as usize,
                    self.vm.game.header.abbrev_table,
                )?;
                self.output_text(&string)?;
                Ok(ExecutionResult::Continue)
            }
            DisplayOp::PrintPaddr => {
                let packed = self.operand(operands, 0, inst)?;
                let string = text::decode_string_at_packed_addr(
                    &self.vm.game.memory,
                    packed,
                    self.vm.game.header.abbrev_table,
                )?;
                self.output_text(&string)?;
                Ok(ExecutionResult::Continue)
            }
            DisplayOp::PrintChar => {
                let code = self.operand(operands, 0, inst)?;
                if let Some(ch) = text::zscii_to_char(code) {
                    self.output_text(ch.encode_utf8(&mut [0u8; 4]))?;
                }
                Ok(ExecutionResult::Continue)
            }
            DisplayOp::PrintNum => {
                let value = self.operand(operands, 0, inst)? as i16;
                self.output_text(&value.to_string())?;
                Ok(ExecutionResult::Continue)
            }
            DisplayOp::NewLine => {
                self.output_text("\n")?;
                Ok(ExecutionResult::Continue)
            }
            DisplayOp::ShowStatus => {
                self.show_status()?;
                Ok(ExecutionResult::Continue)
            }
            DisplayOp::Sread => {
                let text_addr = self.operand(operands, 0, inst)?;
                let parse_addr = operands.get(1).copied().unwrap_or(0);
                self.show_status()?;

                let max_len = (self.vm.read_byte(text_addr as u32) as usize).saturating_sub(1);
                match self.host.read(max_len) {
                    Some(line) => {
                        let tokens = self.store_line(&line, text_addr, parse_addr)?;
                        debug!("sread {:?} -> {} token(s)", line, tokens.len());
                        Ok(ExecutionResult::Continue)
                    }
                    None => {
                        debug!("sread suspended waiting for input");
                        self.suspend_for_input(text_addr, parse_addr);
                        Ok(ExecutionResult::WaitingForInput)
                    }
                }
            }
            DisplayOp::SplitWindow => {
                let lines = self.operand(operands, 0, inst)?;
                self.host.split(lines);
                Ok(ExecutionResult::Continue)
            }
            DisplayOp::SetWindow => {
                let window = self.operand(operands, 0, inst)?;
                self.host.screen(window);
                Ok(ExecutionResult::Continue)
            }
            DisplayOp::OutputStream => {
                let stream = self.operand(operands, 0, inst)? as i16;
                self.select_output_stream(stream, operands.get(1).copied())?;
                Ok(ExecutionResult::Continue)
            }
            DisplayOp::InputStream => {
                debug!("input_stream {:?} ignored", operands.first());
                Ok(ExecutionResult::Continue)
            }
            DisplayOp::SoundEffect => {
                debug!("sound_effect {:?} ignored", operands);
                Ok(ExecutionResult::Continue)
            }
        }
    }
}
