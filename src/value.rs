//! Runtime values.

use std::fmt;

use crate::builtins::Builtin;
use crate::scope::ScopeId;
use crate::syntax::ast::FuncId;

/// The value types blang can work with at runtime.
///
/// Cloning a value is a deep copy: strings and arrays are uniquely owned, so
/// two variables never alias the same array. `Null`, booleans and builtin
/// descriptors carry no heap data and need no special lifetime handling.
#[derive(Debug, Clone, Default)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    #[default]
    Null,
    Array(Vec<Value>),
    Function(Callable),
}

/// Something that can be called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callable {
    Builtin(Builtin),
    /// A user-defined function: its definition in the AST arena plus the
    /// frame it was defined in.
    Closure { func: FuncId, env: ScopeId },
}

/// Type tag of a [`Value`], used in error messages.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    Integer,
    Float,
    Str,
    Bool,
    Null,
    Array,
    Function,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueType::Integer => "integer",
            ValueType::Float => "float",
            ValueType::Str => "string",
            ValueType::Bool => "boolean",
            ValueType::Null => "null",
            ValueType::Array => "array",
            ValueType::Function => "function",
        })
    }
}

impl Value {
    /// Shared null, for call sites that need a `&Value`.
    pub const NULL: Value = Value::Null;

    pub const fn type_of(&self) -> ValueType {
        match self {
            Value::Integer(_) => ValueType::Integer,
            Value::Float(_) => ValueType::Float,
            Value::Str(_) => ValueType::Str,
            Value::Bool(_) => ValueType::Bool,
            Value::Null => ValueType::Null,
            Value::Array(_) => ValueType::Array,
            Value::Function(_) => ValueType::Function,
        }
    }

    /// `null`, `false`, zero, and empty strings/arrays are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Integer(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Bool(b) => *b,
            Value::Null => false,
            Value::Array(items) => !items.is_empty(),
            Value::Function(_) => true,
        }
    }

    #[inline]
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view for mixed integer/float arithmetic.
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Display form used inside arrays, where strings get quoted.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => format!("\"{s}\""),
            other => other.to_string(),
        }
    }
}

impl PartialEq for Value {
    /// Numbers compare by value across integer and float; arrays compare
    /// element-wise; functions compare by identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a == b,
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{n}"),
            // Keep a trailing `.0` so `4 / 2` visibly stays a float.
            Value::Float(n) if n.is_finite() && n.fract() == 0.0 => write!(f, "{n:.1}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Str(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Null => f.write_str("null"),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(&item.repr())?;
                }
                f.write_str("]")
            }
            Value::Function(Callable::Builtin(builtin)) => write!(f, "<builtin {}>", builtin.name()),
            Value::Function(Callable::Closure { func, .. }) => write!(f, "<function #{}>", func.0),
        }
    }
}
