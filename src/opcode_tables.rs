//! Closed opcode set for version 3 story files.
//!
//! Each family owns an enum that its `opcodes_*` module matches on
//! exhaustively, so adding an opcode without handling it fails to compile.
use std::fmt::{Display, Formatter};

use crate::instruction::OperandCount;

/// Arithmetic, bitwise and comparison opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathOp {
    Je,
    Jl,
    Jg,
    Jz,
    Test,
    Or,
    And,
    Not,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Random,
}

/// Object tree and property opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectOp {
    Jin,
    TestAttr,
    SetAttr,
    ClearAttr,
    InsertObj,
    RemoveObj,
    GetProp,
    GetPropAddr,
    GetNextProp,
    GetPropLen,
    PutProp,
    GetSibling,
    GetChild,
    GetParent,
    PrintObj,
}

/// Variable, stack and memory table opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryOp {
    Store,
    Load,
    Loadw,
    Loadb,
    Storew,
    Storeb,
    Inc,
    Dec,
    IncChk,
    DecChk,
    Push,
    Pull,
    Pop,
}

/// Text output, input and screen opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayOp {
    Print,
    PrintRet,
    PrintAddr,
    PrintPaddr,
    PrintChar,
    PrintNum,
    NewLine,
    ShowStatus,
    Sread,
    SplitWindow,
    SetWindow,
    OutputStream,
    InputStream,
    SoundEffect,
}

/// Control flow and interpreter-level opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemOp {
    Call,
    Ret,
    Rtrue,
    Rfalse,
    RetPopped,
    Jump,
    Nop,
    Save,
    Restore,
    Restart,
    Quit,
    Verify,
    Piracy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Math(MathOp),
    Object(ObjectOp),
    Memory(MemoryOp),
    Display(DisplayOp),
    System(SystemOp),
}

impl Opcode {
    /// Look up an opcode by its operand-count class and number.
    /// Returns None for numbers with no version 3 meaning.
    pub fn from_encoding(count: OperandCount, number: u8) -> Option<Opcode> {
        use DisplayOp as D;
        use MathOp as M;
        use MemoryOp as Mem;
        use ObjectOp as O;
        use Opcode::*;
        use SystemOp as S;

        let op = match count {
            OperandCount::OP2 => match number {
                0x01 => Math(M::Je),
                0x02 => Math(M::Jl),
                0x03 => Math(M::Jg),
                0x04 => Memory(Mem::DecChk),
                0x05 => Memory(Mem::IncChk),
                0x06 => Object(O::Jin),
                0x07 => Math(M::Test),
                0x08 => Math(M::Or),
                0x09 => Math(M::And),
                0x0A => Object(O::TestAttr),
                0x0B => Object(O::SetAttr),
                0x0C => Object(O::ClearAttr),
                0x0D => Memory(Mem::Store),
                0x0E => Object(O::InsertObj),
                0x0F => Memory(Mem::Loadw),
                0x10 => Memory(Mem::Loadb),
                0x11 => Object(O::GetProp),
                0x12 => Object(O::GetPropAddr),
                0x13 => Object(O::GetNextProp),
                0x14 => Math(M::Add),
                0x15 => Math(M::Sub),
                0x16 => Math(M::Mul),
                0x17 => Math(M::Div),
                0x18 => Math(M::Mod),
                _ => return None,
            },
            OperandCount::OP1 => match number {
                0x00 => Math(M::Jz),
                0x01 => Object(O::GetSibling),
                0x02 => Object(O::GetChild),
                0x03 => Object(O::GetParent),
                0x04 => Object(O::GetPropLen),
                0x05 => Memory(Mem::Inc),
                0x06 => Memory(Mem::Dec),
                0x07 => Display(D::PrintAddr),
                0x09 => Object(O::RemoveObj),
                0x0A => Object(O::PrintObj),
                0x0B => System(S::Ret),
                0x0C => System(S::Jump),
                0x0D => Display(D::PrintPaddr),
                0x0E => Memory(Mem::Load),
                0x0F => Math(M::Not),
                _ => return None,
            },
            OperandCount::OP0 => match number {
                0x00 => System(S::Rtrue),
                0x01 => System(S::Rfalse),
                0x02 => Display(D::Print),
                0x03 => Display(D::PrintRet),
                0x04 => System(S::Nop),
                0x05 => System(S::Save),
                0x06 => System(S::Restore),
                0x07 => System(S::Restart),
                0x08 => System(S::RetPopped),
                0x09 => Memory(Mem::Pop),
                0x0A => System(S::Quit),
                0x0B => Display(D::NewLine),
                0x0C => Display(D::ShowStatus),
                0x0D => System(S::Verify),
                0x0F => System(S::Piracy),
                _ => return None,
            },
            OperandCount::VAR => match number {
                0x00 => System(S::Call),
                0x01 => Memory(Mem::Storew),
                0x02 => Memory(Mem::Storeb),
                0x03 => Object(O::PutProp),
                0x04 => Display(D::Sread),
                0x05 => Display(D::PrintChar),
                0x06 => Display(D::PrintNum),
                0x07 => Math(M::Random),
                0x08 => Memory(Mem::Push),
                0x09 => Memory(Mem::Pull),
                0x0A => Display(D::SplitWindow),
                0x0B => Display(D::SetWindow),
                0x13 => Display(D::OutputStream),
                0x14 => Display(D::InputStream),
                0x15 => Display(D::SoundEffect),
                _ => return None,
            },
        };
        Some(op)
    }

    /// Get the name of an opcode as used in the Z-Machine Standard
    pub fn name(&self) -> &'static str {
        match self {
            Opcode::Math(op) => match op {
                MathOp::Je => "je",
                MathOp::Jl => "jl",
                MathOp::Jg => "jg",
                MathOp::Jz => "jz",
                MathOp::Test => "test",
                MathOp::Or => "or",
                MathOp::And => "and",
                MathOp::Not => "not",
                MathOp::Add => "add",
                MathOp::Sub => "sub",
                MathOp::Mul => "mul",
                MathOp::Div => "div",
                MathOp::Mod => "mod",
                MathOp::Random => "random",
            },
            Opcode::Object(op) => match op {
                ObjectOp::Jin => "jin",
                ObjectOp::TestAttr => "test_attr",
                ObjectOp::SetAttr => "set_attr",
                ObjectOp::ClearAttr => "clear_attr",
                ObjectOp::InsertObj => "insert_obj",
                ObjectOp::RemoveObj => "remove_obj",
                ObjectOp::GetProp => "get_prop",
                ObjectOp::GetPropAddr => "get_prop_addr",
                ObjectOp::GetNextProp => "get_next_prop",
                ObjectOp::GetPropLen => "get_prop_len",
                ObjectOp::PutProp => "put_prop",
                ObjectOp::GetSibling => "get_sibling",
                ObjectOp::GetChild => "get_child",
                ObjectOp::GetParent => "get_parent",
                ObjectOp::PrintObj => "print_obj",
            },
            Opcode::Memory(op) => match op {
                MemoryOp::Store => "store",
                MemoryOp::Load => "load",
                MemoryOp::Loadw => "loadw",
                MemoryOp::Loadb => "loadb",
                MemoryOp::Storew => "storew",
                MemoryOp::Storeb => "storeb",
                MemoryOp::Inc => "inc",
                MemoryOp::Dec => "dec",
                MemoryOp::IncChk => "inc_chk",
                MemoryOp::DecChk => "dec_chk",
                MemoryOp::Push => "push",
                MemoryOp::Pull => "pull",
                MemoryOp::Pop => "pop",
            },
            Opcode::Display(op) => match op {
                DisplayOp::Print => "print",
                DisplayOp::PrintRet => "print_ret",
                DisplayOp::PrintAddr => "print_addr",
                DisplayOp::PrintPaddr => "print_paddr",
                DisplayOp::PrintChar => "print_char",
                DisplayOp::PrintNum => "print_num",
                DisplayOp::NewLine => "new_line",
                DisplayOp::ShowStatus => "show_status",
                DisplayOp::Sread => "sread",
                DisplayOp::SplitWindow => "split_window",
                DisplayOp::SetWindow => "set_window",
                DisplayOp::OutputStream => "output_stream",
                DisplayOp::InputStream => "input_stream",
                DisplayOp::SoundEffect => "sound_effect",
            },
            Opcode::System(op) => match op {
                SystemOp::Call => "call",
                SystemOp::Ret => "ret",
                SystemOp::Rtrue => "rtrue",
                SystemOp::Rfalse => "rfalse",
                SystemOp::RetPopped => "ret_popped",
                SystemOp::Jump => "jump",
                SystemOp::Nop => "nop",
                SystemOp::Save => "save",
                SystemOp::Restore => "restore",
                SystemOp::Restart => "restart",
                SystemOp::Quit => "quit",
                SystemOp::Verify => "verify",
                SystemOp::Piracy => "piracy",
            },
        }
    }

    /// Check if an instruction stores a result
    pub fn stores_result(&self) -> bool {
        matches!(
            self,
            Opcode::Math(
                MathOp::Or
                    | MathOp::And
                    | MathOp::Not
                    | MathOp::Add
                    | MathOp::Sub
                    | MathOp::Mul
                    | MathOp::Div
                    | MathOp::Mod
                    | MathOp::Random
            ) | Opcode::Object(
                ObjectOp::GetProp
                    | ObjectOp::GetPropAddr
                    | ObjectOp::GetNextProp
                    | ObjectOp::GetPropLen
                    | ObjectOp::GetSibling
                    | ObjectOp::GetChild
                    | ObjectOp::GetParent
            ) | Opcode::Memory(MemoryOp::Load | MemoryOp::Loadw | MemoryOp::Loadb)
                | Opcode::System(SystemOp::Call)
        )
    }

    /// Check if an instruction has a branch
    pub fn has_branch(&self) -> bool {
        matches!(
            self,
            Opcode::Math(MathOp::Je | MathOp::Jl | MathOp::Jg | MathOp::Jz | MathOp::Test)
                | Opcode::Object(
                    ObjectOp::Jin | ObjectOp::TestAttr | ObjectOp::GetSibling | ObjectOp::GetChild
                )
                | Opcode::Memory(MemoryOp::IncChk | MemoryOp::DecChk)
                | Opcode::System(
                    SystemOp::Save | SystemOp::Restore | SystemOp::Verify | SystemOp::Piracy
                )
        )
    }

    /// Check if an instruction is followed by inline text
    pub fn has_text(&self) -> bool {
        matches!(self, Opcode::Display(DisplayOp::Print | DisplayOp::PrintRet))
    }

    /// Opcodes whose first operand names a variable rather than supplying a value
    pub fn takes_variable_reference(&self) -> bool {
        matches!(
            self,
            Opcode::Memory(
                MemoryOp::Store
                    | MemoryOp::Load
                    | MemoryOp::Inc
                    | MemoryOp::Dec
                    | MemoryOp::IncChk
                    | MemoryOp::DecChk
                    | MemoryOp::Pull
            )
        )
    }
}

impl Display for Opcode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
