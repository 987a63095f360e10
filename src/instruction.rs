use std::fmt::{Display, Error, Formatter};

use log::trace;

use crate::error::{ZError, ZResult};
use crate::opcode_tables::Opcode;
use crate::text;

/// Operand types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandType {
    /// Large constant (2 bytes)
    LargeConstant,
    /// Small constant (1 byte)
    SmallConstant,
    /// Variable number
    Variable,
    /// Omitted (not present)
    Omitted,
}

impl OperandType {
    /// Parse operand type from 2-bit value
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0b00 => OperandType::LargeConstant,
            0b01 => OperandType::SmallConstant,
            0b10 => OperandType::Variable,
            _ => OperandType::Omitted,
        }
    }

    /// Get the size in bytes for this operand type
    pub fn size(&self) -> usize {
        match self {
            OperandType::LargeConstant => 2,
            OperandType::SmallConstant | OperandType::Variable => 1,
            OperandType::Omitted => 0,
        }
    }
}

/// Instruction forms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionForm {
    Long,
    Short,
    Extended,
    Variable,
}

/// Operand count categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandCount {
    OP0,
    OP1,
    OP2,
    VAR,
}

impl OperandCount {
    fn label(&self) -> &'static str {
        match self {
            OperandCount::OP0 => "0OP",
            OperandCount::OP1 => "1OP",
            OperandCount::OP2 => "2OP",
            OperandCount::VAR => "VAR",
        }
    }
}

/// Branch information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchInfo {
    /// True if branch on true, false if branch on false
    pub on_true: bool,
    /// Branch offset (0-1 = return false/true, otherwise relative jump)
    pub offset: i16,
}

/// A decoded Z-Machine instruction
#[derive(Debug, Clone)]
pub struct Instruction {
    pub opcode: Opcode,
    /// The opcode number within its operand-count class
    pub number: u8,
    pub form: InstructionForm,
    pub operand_count: OperandCount,
    pub operand_types: Vec<OperandType>,
    /// Raw operand values; variable operands still hold the variable number
    pub operands: Vec<u16>,
    /// Variable to store result (if applicable)
    pub store_var: Option<u8>,
    /// Branch information (if applicable)
    pub branch: Option<BranchInfo>,
    /// String data for print opcodes
    pub text: Option<String>,
    /// Total size of instruction in bytes
    pub size: usize,
}

fn byte_at(memory: &[u8], offset: usize, what: &str, addr: usize) -> ZResult<u8> {
    memory.get(offset).copied().ok_or_else(|| ZError::Decode {
        pc: addr as u32,
        reason: format!("{what} out of bounds"),
    })
}

impl Instruction {
    /// Decode an instruction from memory at the given address
    pub fn decode(memory: &[u8], addr: usize, abbrev_table_addr: usize) -> ZResult<Self> {
        let mut offset = addr;
        let opcode_byte = byte_at(memory, offset, "instruction address", addr)?;
        offset += 1;

        // Determine instruction form based on top 2 bits
        let form = match opcode_byte >> 6 {
            0b11 => InstructionForm::Variable,
            0b10 if opcode_byte == 0xBE => InstructionForm::Extended,
            0b10 => InstructionForm::Short,
            _ => InstructionForm::Long,
        };

        let (number, operand_count) = match form {
            InstructionForm::Long => (opcode_byte & 0x1F, OperandCount::OP2),
            InstructionForm::Short => {
                let count = if (opcode_byte >> 4) & 0x03 == 0x03 {
                    OperandCount::OP0
                } else {
                    OperandCount::OP1
                };
                (opcode_byte & 0x0F, count)
            }
            InstructionForm::Variable => {
                let count = if opcode_byte & 0x20 == 0 {
                    OperandCount::OP2
                } else {
                    OperandCount::VAR
                };
                (opcode_byte & 0x1F, count)
            }
            InstructionForm::Extended => {
                // No extended opcodes exist before version 5
                let ext = byte_at(memory, offset, "extended opcode", addr)?;
                return Err(ZError::UnknownOpcode {
                    opcode: ext,
                    form: "EXT",
                    pc: addr as u32,
                });
            }
        };

        let opcode = Opcode::from_encoding(operand_count, number).ok_or(ZError::UnknownOpcode {
            opcode: opcode_byte,
            form: operand_count.label(),
            pc: addr as u32,
        })?;

        let mut operand_types = Vec::with_capacity(4);
        match form {
            InstructionForm::Long => {
                // Bits 6 and 5 select small constant or variable
                for mask in [0x40, 0x20] {
                    operand_types.push(if opcode_byte & mask != 0 {
                        OperandType::Variable
                    } else {
                        OperandType::SmallConstant
                    });
                }
            }
            InstructionForm::Short => {
                let op_type = OperandType::from_bits((opcode_byte >> 4) & 0x03);
                if op_type != OperandType::Omitted {
                    operand_types.push(op_type);
                }
            }
            _ => {
                let type_byte = byte_at(memory, offset, "operand types", addr)?;
                offset += 1;
                for i in 0..4 {
                    let op_type = OperandType::from_bits(type_byte >> (6 - i * 2));
                    if op_type == OperandType::Omitted {
                        break;
                    }
                    operand_types.push(op_type);
                }
            }
        }

        let mut operands = Vec::with_capacity(operand_types.len());
        for op_type in &operand_types {
            let value = match op_type {
                OperandType::LargeConstant => {
                    let hi = byte_at(memory, offset, "large constant", addr)?;
                    let lo = byte_at(memory, offset + 1, "large constant", addr)?;
                    u16::from_be_bytes([hi, lo])
                }
                _ => byte_at(memory, offset, "operand", addr)? as u16,
            };
            offset += op_type.size();
            operands.push(value);
        }

        let store_var = if opcode.stores_result() {
            let var = byte_at(memory, offset, "store variable", addr)?;
            offset += 1;
            Some(var)
        } else {
            None
        };

        let branch = if opcode.has_branch() {
            let first_byte = byte_at(memory, offset, "branch offset", addr)?;
            offset += 1;

            let on_true = (first_byte & 0x80) != 0;
            let offset_val = if (first_byte & 0x40) != 0 {
                // Short form: unsigned 6-bit offset
                (first_byte & 0x3F) as i16
            } else {
                // Long form: 14-bit signed offset
                let second_byte = byte_at(memory, offset, "branch offset", addr)?;
                offset += 1;
                let val = (((first_byte & 0x3F) as u16) << 8) | second_byte as u16;
                if val & 0x2000 != 0 {
                    (val | 0xC000) as i16
                } else {
                    val as i16
                }
            };
            Some(BranchInfo {
                on_true,
                offset: offset_val,
            })
        } else {
            None
        };

        let text = if opcode.has_text() {
            let (string, len) = text::decode_string(memory, offset, abbrev_table_addr)?;
            offset += len;
            Some(string)
        } else {
            None
        };

        let inst = Instruction {
            opcode,
            number,
            form,
            operand_count,
            operand_types,
            operands,
            store_var,
            branch,
            text,
            size: offset - addr,
        };
        trace!("{:05x}: {}", addr, inst);
        Ok(inst)
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{}", self.opcode.name())?;

        for (i, op) in self.operands.iter().enumerate() {
            f.write_str(if i == 0 { " " } else { ", " })?;
            match self.operand_types[i] {
                OperandType::Variable => write!(f, "V{:02x}", op)?,
                // A constant naming the variable to act on
                _ if i == 0 && self.opcode.takes_variable_reference() => {
                    write!(f, "'V{:02x}", op)?
                }
                _ => write!(f, "#{:04x}", op)?,
            }
        }

        if let Some(var) = self.store_var {
            write!(f, " -> V{:02x}", var)?;
        }

        if let Some(branch) = self.branch {
            write!(
                f,
                " [{}{}]",
                if branch.on_true { "TRUE" } else { "FALSE" },
                match branch.offset {
                    0 => " RFALSE".to_string(),
                    1 => " RTRUE".to_string(),
                    n => format!(" {:+}", n),
                }
            )?;
        }

        if let Some(text) = &self.text {
            write!(f, " \"{}\"", text)?;
        }

        Ok(())
    }
}
