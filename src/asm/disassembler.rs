use std::fmt::{self, Write};

use crate::bytecode::opcode::{self, Opcode, OperandMode};
use crate::bytecode::{Bytecode, BytecodeError};
use crate::diagnostics::AsStr;
use crate::vm::Register;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Register(Register),
    Immediate(u64),
    Address(u64),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Register(reg) => write!(f, "{reg}"),
            Operand::Immediate(n) | Operand::Address(n) => write!(f, "{n:#x}"),
        }
    }
}

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// Offset of the opcode byte from the start of the program.
    pub offset: usize,
    pub opcode: Opcode,
    pub operands: Vec<Operand>,
}

impl Decoded {
    #[inline]
    pub fn size(&self) -> usize {
        self.opcode.info().size()
    }
}

impl fmt::Display for Decoded {
    /// Assemblable text: `mnemonic op, op`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.opcode.mnemonic())?;
        for (i, operand) in self.operands.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{sep}{operand}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisasmErrorKind {
    InvalidOpcode(u8),
    InvalidRegister(u8),
    Truncated(BytecodeError),
}

impl AsStr for DisasmErrorKind {
    fn as_str(&self) -> &'static str {
        match self {
            DisasmErrorKind::InvalidOpcode(_) => "invalid opcode",
            DisasmErrorKind::InvalidRegister(_) => "invalid register",
            DisasmErrorKind::Truncated(_) => "truncated instruction",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisasmError {
    pub offset: usize,
    pub kind: DisasmErrorKind,
}

impl fmt::Display for DisasmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DisasmErrorKind::InvalidOpcode(b) | DisasmErrorKind::InvalidRegister(b) => {
                write!(f, "{} {b:#04x} at offset {:#x}", self.kind.as_str(), self.offset)
            }
            DisasmErrorKind::Truncated(_) => write!(f, "{} at offset {:#x}", self.kind.as_str(), self.offset),
        }
    }
}

impl std::error::Error for DisasmError {}

/// A decoded program, kept together with its bytes for the listing.
#[derive(Debug, Clone)]
pub struct Disassembly<'code> {
    pub instructions: Vec<Decoded>,
    code: &'code Bytecode,
}

/// Walks `code` with the opcode table.
pub fn disassemble(code: &Bytecode) -> Result<Disassembly<'_>, DisasmError> {
    let mut instructions = Vec::new();
    let mut offset = 0;
    while offset < code.len() {
        let decoded = decode_at(code, offset)?;
        offset += decoded.size();
        instructions.push(decoded);
    }
    Ok(Disassembly { instructions, code })
}

/// Decodes the single instruction starting at `offset`.
pub fn decode_at(code: &Bytecode, offset: usize) -> Result<Decoded, DisasmError> {
    let err = |kind| DisasmError { offset, kind };
    let byte = code.get_byte(offset as u64).map_err(|e| err(DisasmErrorKind::Truncated(e)))?;
    let info = opcode::lookup(byte).ok_or_else(|| err(DisasmErrorKind::InvalidOpcode(byte)))?;

    let mut operands = Vec::with_capacity(info.operands.len());
    let mut at = offset as u64 + 1;
    for spec in info.operands {
        let raw = match spec.size {
            1 => code.get_byte(at).map(u64::from),
            2 => code.get_word(at).map(u64::from),
            4 => code.get_dword(at).map(u64::from),
            _ => code.get_qword(at),
        }
        .map_err(|e| err(DisasmErrorKind::Truncated(e)))?;
        operands.push(match spec.mode {
            OperandMode::Register => Register::from_operand(raw as u8)
                .map(Operand::Register)
                .ok_or_else(|| err(DisasmErrorKind::InvalidRegister(raw as u8)))?,
            OperandMode::Immediate => Operand::Immediate(raw),
            OperandMode::Address => Operand::Address(raw),
        });
        at += u64::from(spec.size);
    }
    Ok(Decoded { offset, opcode: info.opcode, operands })
}

impl Disassembly<'_> {
    /// Text that assembles back into the same bytes.
    pub fn to_source(&self) -> String {
        let mut out = String::new();
        for decoded in &self.instructions {
            let _ = writeln!(out, "{decoded}");
        }
        out
    }
}

/// Fixed column listing: `offset  bytes  mnemonic operands`.
impl fmt::Display for Disassembly<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.code.as_bytes();
        for decoded in &self.instructions {
            let mut hex = String::new();
            for b in &bytes[decoded.offset..decoded.offset + decoded.size()] {
                let _ = write!(hex, "{b:02x} ");
            }
            writeln!(f, "{:08x}  {:<30}  {decoded}", decoded.offset, hex.trim_end())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;

    #[test]
    fn test_decodes_operands() {
        let code = assemble("mov_ir %r2, 0x2a\njnz %r2, 0").unwrap();
        let listing = disassemble(&code).unwrap();
        assert_eq!(listing.instructions.len(), 2);
        assert_eq!(
            listing.instructions[0],
            Decoded {
                offset: 0,
                opcode: Opcode::MovIr,
                operands: vec![Operand::Register(Register::R2), Operand::Immediate(42)],
            }
        );
        assert_eq!(listing.instructions[1].offset, 10);
    }

    #[test]
    fn test_listing_columns() {
        let code = assemble("add_rr %r0, %r1\nhlt").unwrap();
        let text = disassemble(&code).unwrap().to_string();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(format!("00000000  {:<30}  add_rr %r0, %r1", "04 00 01").as_str()));
        assert_eq!(lines.next(), Some(format!("00000003  {:<30}  hlt", "01").as_str()));
    }

    #[test]
    fn test_source_round_trip() {
        let src = "start:\n mov_ir %r0, -5\n mov_rr %r1, %r0\n jnz %r1, start\n regdump\n nop\n syscall\n hlt\n";
        let code = assemble(src).unwrap();
        let text = disassemble(&code).unwrap().to_source();
        assert_eq!(assemble(&text).unwrap(), code);
    }

    #[test]
    fn test_truncated_and_invalid() {
        let err = disassemble(&Bytecode::from_bytes(vec![0x01, 0x04, 0x00])).unwrap_err();
        assert_eq!(err.offset, 1);
        assert!(matches!(err.kind, DisasmErrorKind::Truncated(_)));

        let err = disassemble(&Bytecode::from_bytes(vec![0x03, 0x00, 0x0c])).unwrap_err();
        assert_eq!(err.kind, DisasmErrorKind::InvalidRegister(0x0c));

        let err = disassemble(&Bytecode::from_bytes(vec![0x7f])).unwrap_err();
        assert_eq!(err.kind, DisasmErrorKind::InvalidOpcode(0x7f));
    }
}
