#![allow(
    clippy::many_single_char_names,
    clippy::similar_names,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::too_many_lines
)]

#[macro_use]
pub mod macros;
pub mod asm;
pub mod builtins;
pub mod bytecode;
pub mod diagnostics;
pub mod runtime;
pub mod scope;
pub mod syntax;
pub mod value;
pub mod vm;

use std::fmt;

use crate::diagnostics::Diagnostic;
use crate::runtime::RuntimeError;
use crate::syntax::parser::ParseError;
use crate::syntax::scanner::LexError;

/// Anything that can stop a blang program: a syntax error found before it
/// ran, or a runtime error while it ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    Lex(LexError),
    Parse(ParseError),
    Runtime(RuntimeError),
}

impl Error {
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Error::Lex(err) => err.to_diagnostic(),
            Error::Parse(err) => err.to_diagnostic(),
            Error::Runtime(err) => err.to_diagnostic(),
        }
    }

    /// Status requested by `exit(code)`, if that is what stopped the program.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Error::Runtime(err) => err.exit_code(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Lex(err) => err.fmt(f),
            Error::Parse(err) => err.fmt(f),
            Error::Runtime(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Lex(err) => Some(err),
            Error::Parse(err) => Some(err),
            Error::Runtime(err) => Some(err),
        }
    }
}

impl From<LexError> for Error {
    fn from(err: LexError) -> Self {
        Error::Lex(err)
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::Parse(err)
    }
}

impl From<RuntimeError> for Error {
    fn from(err: RuntimeError) -> Self {
        Error::Runtime(err)
    }
}
