//! The opcode metadata table.
//!
//! One row per opcode: its byte, mnemonic, operand layout and the VM handler
//! that executes it. The assembler, the disassembler and the VM all read the
//! same table, so adding an instruction means adding one row here and one
//! handler in [`crate::vm::exec`].

use std::fmt;

use crate::vm::exec;
use crate::vm::{Flow, Vm, VmResult};

use super::Bytecode;

/// How an operand is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandMode {
    /// Register number, `%r0` to `%r9`.
    Register,
    /// Literal value.
    Immediate,
    /// Offset from the start of the program, or a label in assembly.
    Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperandSpec {
    /// Encoded width in bytes.
    pub size: u8,
    pub mode: OperandMode,
}

const REG: OperandSpec = OperandSpec { size: 1, mode: OperandMode::Register };
const IMM64: OperandSpec = OperandSpec { size: 8, mode: OperandMode::Immediate };
const ADDR32: OperandSpec = OperandSpec { size: 4, mode: OperandMode::Address };

/// Executes the instruction at the current IP.
pub type Handler = fn(&mut Vm, &Bytecode, &mut dyn std::io::Write) -> VmResult<Flow>;

#[derive(Clone, Copy)]
pub struct OpcodeInfo {
    pub opcode: Opcode,
    pub mnemonic: &'static str,
    pub operands: &'static [OperandSpec],
    /// `None` means the instruction does nothing and falls through.
    pub handler: Option<Handler>,
}

impl OpcodeInfo {
    /// Encoded length of the instruction, opcode byte included.
    pub fn size(&self) -> usize {
        1 + self.operands.iter().map(|op| op.size as usize).sum::<usize>()
    }
}

impl fmt::Debug for OpcodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpcodeInfo")
            .field("opcode", &self.opcode)
            .field("mnemonic", &self.mnemonic)
            .field("operands", &self.operands)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Nop = 0x00,
    Hlt = 0x01,
    MovIr = 0x02,
    MovRr = 0x03,
    AddRr = 0x04,
    SubRr = 0x05,
    MulRr = 0x06,
    Jmp = 0x07,
    Jnz = 0x08,
    Regdump = 0x09,
    Syscall = 0x0a,
}

impl Opcode {
    #[inline]
    pub fn from_byte(byte: u8) -> Option<Opcode> {
        OPCODES.get(byte as usize).map(|info| info.opcode)
    }

    #[inline]
    pub fn info(self) -> &'static OpcodeInfo {
        &OPCODES[self as usize]
    }

    #[inline]
    pub fn mnemonic(self) -> &'static str {
        self.info().mnemonic
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Indexed by opcode byte.
pub static OPCODES: [OpcodeInfo; 11] = [
    OpcodeInfo { opcode: Opcode::Nop, mnemonic: "nop", operands: &[], handler: None },
    OpcodeInfo { opcode: Opcode::Hlt, mnemonic: "hlt", operands: &[], handler: Some(exec::hlt) },
    OpcodeInfo {
        opcode: Opcode::MovIr,
        mnemonic: "mov_ir",
        operands: &[REG, IMM64],
        handler: Some(exec::mov_ir),
    },
    OpcodeInfo {
        opcode: Opcode::MovRr,
        mnemonic: "mov_rr",
        operands: &[REG, REG],
        handler: Some(exec::mov_rr),
    },
    OpcodeInfo {
        opcode: Opcode::AddRr,
        mnemonic: "add_rr",
        operands: &[REG, REG],
        handler: Some(exec::add_rr),
    },
    OpcodeInfo {
        opcode: Opcode::SubRr,
        mnemonic: "sub_rr",
        operands: &[REG, REG],
        handler: Some(exec::sub_rr),
    },
    OpcodeInfo {
        opcode: Opcode::MulRr,
        mnemonic: "mul_rr",
        operands: &[REG, REG],
        handler: Some(exec::mul_rr),
    },
    OpcodeInfo { opcode: Opcode::Jmp, mnemonic: "jmp", operands: &[ADDR32], handler: Some(exec::jmp) },
    OpcodeInfo {
        opcode: Opcode::Jnz,
        mnemonic: "jnz",
        operands: &[REG, ADDR32],
        handler: Some(exec::jnz),
    },
    OpcodeInfo {
        opcode: Opcode::Regdump,
        mnemonic: "regdump",
        operands: &[],
        handler: Some(exec::regdump),
    },
    OpcodeInfo {
        opcode: Opcode::Syscall,
        mnemonic: "syscall",
        operands: &[],
        handler: Some(exec::syscall),
    },
];

/// Row for an opcode byte.
#[inline]
pub fn lookup(byte: u8) -> Option<&'static OpcodeInfo> {
    OPCODES.get(byte as usize)
}

/// Row for an assembly mnemonic, case-insensitive.
pub fn by_mnemonic(mnemonic: &str) -> Option<&'static OpcodeInfo> {
    OPCODES.iter().find(|info| info.mnemonic.eq_ignore_ascii_case(mnemonic))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_indexed_by_opcode() {
        for (i, info) in OPCODES.iter().enumerate() {
            assert_eq!(info.opcode as usize, i, "{}", info.mnemonic);
            assert_eq!(Opcode::from_byte(i as u8), Some(info.opcode));
        }
        assert_eq!(Opcode::from_byte(0xff), None);
    }

    #[test]
    fn test_sizes() {
        assert_eq!(Opcode::Nop.info().size(), 1);
        assert_eq!(Opcode::MovIr.info().size(), 10);
        assert_eq!(Opcode::AddRr.info().size(), 3);
        assert_eq!(Opcode::Jmp.info().size(), 5);
        assert_eq!(Opcode::Jnz.info().size(), 6);
    }

    #[test]
    fn test_only_nop_falls_through() {
        for info in &OPCODES {
            assert_eq!(info.handler.is_none(), info.opcode == Opcode::Nop);
        }
    }

    #[test]
    fn test_by_mnemonic() {
        assert_eq!(by_mnemonic("ADD_RR").map(|i| i.opcode), Some(Opcode::AddRr));
        assert!(by_mnemonic("push").is_none());
    }
}
