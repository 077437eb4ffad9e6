mod array;
mod io;

use crate::diagnostics::Span;
use crate::runtime::{EvalResult, Evaluator, RuntimeError, RuntimeErrorKind};
use crate::value::Value;

/// Built-in functions available in blang.
///
/// These are globally available functions implemented in the interpreter
/// rather than defined by user code. A user binding with the same name
/// shadows the builtin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    /// Print the arguments separated by spaces, then a newline
    Println,
    /// Like `println`, without the newline
    Print,
    /// Collect the arguments into an array
    Array,
    /// Same as `array`
    Vector,
    /// Keep the elements of an array for which a function returns truthy
    ArrayFilter,
    /// Read one line of input, optionally after writing a prompt
    Read,
    /// Stop the program with an exit status
    Exit,
}

impl Builtin {
    pub const ALL: [Builtin; 7] = [
        Builtin::Println,
        Builtin::Print,
        Builtin::Array,
        Builtin::Vector,
        Builtin::ArrayFilter,
        Builtin::Read,
        Builtin::Exit,
    ];

    /// Get the name of the built-in function as it appears in source code
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Builtin::Println => "println",
            Builtin::Print => "print",
            Builtin::Array => "array",
            Builtin::Vector => "vector",
            Builtin::ArrayFilter => "array_filter",
            Builtin::Read => "read",
            Builtin::Exit => "exit",
        }
    }

    /// Check if a function name refers to a built-in
    #[inline]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "println" => Some(Builtin::Println),
            "print" => Some(Builtin::Print),
            "array" => Some(Builtin::Array),
            "vector" => Some(Builtin::Vector),
            "array_filter" => Some(Builtin::ArrayFilter),
            "read" => Some(Builtin::Read),
            "exit" => Some(Builtin::Exit),
            _ => None,
        }
    }

    /// Runs the builtin on already evaluated arguments.
    pub fn call(self, ev: &mut Evaluator<'_>, args: Vec<Value>, span: Span) -> EvalResult<Value> {
        match self {
            Builtin::Println => io::print(ev, &args, true, span),
            Builtin::Print => io::print(ev, &args, false, span),
            Builtin::Array | Builtin::Vector => Ok(array::collect(args)),
            Builtin::ArrayFilter => array::filter(ev, args, span),
            Builtin::Read => io::read(ev, &args, span),
            Builtin::Exit => io::exit(&args, span),
        }
    }

    /// Fails with `BuiltinArity` unless `args.len()` lies in `range`.
    fn check_arity(
        self,
        args: &[Value],
        range: std::ops::RangeInclusive<usize>,
        expected: &'static str,
        span: Span,
    ) -> EvalResult<()> {
        if range.contains(&args.len()) {
            Ok(())
        } else {
            Err(RuntimeError::new(
                RuntimeErrorKind::BuiltinArity { name: self.name(), expected, found: args.len() },
                span,
            ))
        }
    }

    #[cold]
    fn bad_argument(self, expected: &'static str, span: Span) -> RuntimeError {
        RuntimeError::new(RuntimeErrorKind::BuiltinArgument { name: self.name(), expected }, span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for builtin in Builtin::ALL {
            assert_eq!(Builtin::from_name(builtin.name()), Some(builtin));
        }
        assert_eq!(Builtin::from_name("printf"), None);
    }
}
