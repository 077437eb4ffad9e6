//! Textual assembly for the VM.
//!
//! ```text
//! ; r0 = 3 + 2
//! start:
//!     mov_ir %r0, $3
//!     mov_ir %r1, 2
//!     add_rr %r0, %r1
//!     hlt
//! ```

pub mod assembler;
pub mod disassembler;

use std::fmt;

use crate::diagnostics::{AsStr, Diagnostic, Location};

pub use assembler::assemble;
pub use disassembler::{Decoded, Disassembly, Operand, disassemble};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsmErrorKind {
    UnknownMnemonic(String),
    OperandCount { mnemonic: &'static str, expected: usize, found: usize },
    ExpectedRegister(String),
    ExpectedImmediate(String),
    InvalidRegister(String),
    UndefinedLabel(String),
    DuplicateLabel(String),
    ImmediateOutOfRange(String),
}

impl AsStr for AsmErrorKind {
    fn as_str(&self) -> &'static str {
        match self {
            AsmErrorKind::UnknownMnemonic(_) => "unknown mnemonic",
            AsmErrorKind::OperandCount { .. } => "wrong number of operands",
            AsmErrorKind::ExpectedRegister(_) => "expected a register",
            AsmErrorKind::ExpectedImmediate(_) => "expected an immediate",
            AsmErrorKind::InvalidRegister(_) => "invalid register",
            AsmErrorKind::UndefinedLabel(_) => "undefined label",
            AsmErrorKind::DuplicateLabel(_) => "label defined twice",
            AsmErrorKind::ImmediateOutOfRange(_) => "immediate out of range",
        }
    }
}

/// An assembly error on a 1-based source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsmError {
    pub line: usize,
    pub kind: AsmErrorKind,
}

impl AsmError {
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error("asm", self.to_string(), Location::LineColumn { line: self.line, column: 1 })
    }
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head = self.kind.as_str();
        match &self.kind {
            AsmErrorKind::OperandCount { mnemonic, expected, found } => {
                write!(f, "{head}: `{mnemonic}` takes {expected}, found {found}")
            }
            AsmErrorKind::UnknownMnemonic(text)
            | AsmErrorKind::ExpectedRegister(text)
            | AsmErrorKind::ExpectedImmediate(text)
            | AsmErrorKind::InvalidRegister(text)
            | AsmErrorKind::UndefinedLabel(text)
            | AsmErrorKind::DuplicateLabel(text)
            | AsmErrorKind::ImmediateOutOfRange(text) => write!(f, "{head} `{text}`"),
        }
    }
}

impl std::error::Error for AsmError {}
