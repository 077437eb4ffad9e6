//! The runtime for blang.

use std::fmt;
use std::io::{self, BufRead, Write};

use crate::builtins::Builtin;
use crate::diagnostics::{AsStr, Diagnostic, Location, Span};
use crate::scope::{ScopeError, ScopeId, Scopes};
use crate::syntax::ast::*;
use crate::syntax::parser::parse_source;
use crate::value::{Callable, Value, ValueType};

/// Runtime errors that can occur during blang execution.
///
/// These represent the "dynamic" errors that we can only catch at runtime,
/// as opposed to syntax errors caught during scanning and parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    /// `/` or `%` with a zero divisor, integer or float
    DivisionByZero,
    /// Operator applied to operand types it does not support. `rhs` is
    /// `None` for unary operators.
    TypeMismatch { op: &'static str, lhs: ValueType, rhs: Option<ValueType> },
    UndefinedVariable(Name),
    AlreadyDeclared(Name),
    ConstViolation(Name),
    NotCallable(ValueType),
    ArityMismatch { expected: usize, found: usize },
    IndexOutOfBounds { index: i64, len: usize },
    /// Calls nested deeper than [`Options::max_call_depth`]
    StackOverflow,
    BuiltinArity { name: &'static str, expected: &'static str, found: usize },
    BuiltinArgument { name: &'static str, expected: &'static str },
    /// Raised by `exit(code)`; unwinds to the caller of the interpreter
    Exit(i32),
    Io(String),
}

impl AsStr for RuntimeErrorKind {
    fn as_str(&self) -> &'static str {
        match self {
            RuntimeErrorKind::DivisionByZero => "division by zero",
            RuntimeErrorKind::TypeMismatch { .. } => "type mismatch",
            RuntimeErrorKind::UndefinedVariable(_) => "undefined variable",
            RuntimeErrorKind::AlreadyDeclared(_) => "variable already declared in this scope",
            RuntimeErrorKind::ConstViolation(_) => "cannot assign to a constant",
            RuntimeErrorKind::NotCallable(_) => "value is not callable",
            RuntimeErrorKind::ArityMismatch { .. } => "wrong number of arguments",
            RuntimeErrorKind::IndexOutOfBounds { .. } => "index out of bounds",
            RuntimeErrorKind::StackOverflow => "maximum call depth exceeded",
            RuntimeErrorKind::BuiltinArity { .. } => "wrong number of arguments to builtin",
            RuntimeErrorKind::BuiltinArgument { .. } => "invalid argument to builtin",
            RuntimeErrorKind::Exit(_) => "exit",
            RuntimeErrorKind::Io(_) => "i/o error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeError {
    /// The specific kind of runtime error that occurred.
    pub kind: RuntimeErrorKind,
    /// Source range of the expression or statement that failed; `None` once
    /// the error has left the source that range belongs to.
    pub span: Option<Span>,
}

impl RuntimeError {
    #[inline]
    pub fn new(kind: RuntimeErrorKind, span: Span) -> Self {
        RuntimeError { kind, span: Some(span) }
    }

    #[cold]
    pub fn io(err: io::Error, span: Span) -> Self {
        RuntimeError::new(RuntimeErrorKind::Io(err.to_string()), span)
    }

    /// `Some(code)` when this error is a request to exit.
    pub fn exit_code(&self) -> Option<i32> {
        match self.kind {
            RuntimeErrorKind::Exit(code) => Some(code),
            _ => None,
        }
    }

    /// Makes the span relative to a source of `len` bytes starting at span
    /// offset `base`. A span from any other source is dropped: a closure
    /// defined on an earlier REPL line fails with offsets into that line.
    pub fn relative_to(mut self, base: usize, len: usize) -> Self {
        self.span = self
            .span
            .filter(|span| span.start >= base && span.end <= base + len)
            .map(|span| Span::new(span.start - base, span.end - base));
        self
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let location = self.span.map_or(Location::Unknown, Location::Span);
        Diagnostic::error("runtime", self.to_string(), location)
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head = self.kind.as_str();
        match &self.kind {
            RuntimeErrorKind::TypeMismatch { op, lhs, rhs: Some(rhs) } => {
                write!(f, "{head}: cannot apply `{op}` to {lhs} and {rhs}")
            }
            RuntimeErrorKind::TypeMismatch { op, lhs, rhs: None } => {
                write!(f, "{head}: cannot apply `{op}` to {lhs}")
            }
            RuntimeErrorKind::UndefinedVariable(name)
            | RuntimeErrorKind::AlreadyDeclared(name)
            | RuntimeErrorKind::ConstViolation(name) => write!(f, "{head}: `{name}`"),
            RuntimeErrorKind::NotCallable(ty) => write!(f, "{head}: found {ty}"),
            RuntimeErrorKind::ArityMismatch { expected, found } => {
                write!(f, "{head}: expected {expected}, found {found}")
            }
            RuntimeErrorKind::IndexOutOfBounds { index, len } => {
                write!(f, "{head}: index {index} but length is {len}")
            }
            RuntimeErrorKind::BuiltinArity { name, expected, found } => {
                write!(f, "{head}: `{name}` takes {expected}, found {found}")
            }
            RuntimeErrorKind::BuiltinArgument { name, expected } => {
                write!(f, "{head}: `{name}` expects {expected}")
            }
            RuntimeErrorKind::Exit(code) => write!(f, "{head} with status {code}"),
            RuntimeErrorKind::Io(message) => write!(f, "{head}: {message}"),
            RuntimeErrorKind::DivisionByZero | RuntimeErrorKind::StackOverflow => f.write_str(head),
        }
    }
}

impl std::error::Error for RuntimeError {}

pub type EvalResult<T> = Result<T, RuntimeError>;

/// Knobs for the evaluator.
#[derive(Debug, Clone)]
pub struct Options {
    /// Deepest allowed nesting of user function calls.
    pub max_call_depth: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options { max_call_depth: 128 }
    }
}

/// Tree-walking interpreter for blang.
///
/// The interpreter owns the AST arena, the scope arena and its I/O handles.
/// Source evaluated later is parsed into the same arena and run against the
/// same global frame, which is what keeps REPL sessions and closures created
/// on earlier lines working.
pub struct Interpreter {
    pub ast: Ast,
    scopes: Scopes,
    out: Box<dyn Write>,
    input: Box<dyn BufRead>,
    options: Options,
}

impl Interpreter {
    /// Creates an interpreter wired to the process's stdout and stdin.
    pub fn new(options: Options) -> Self {
        Self::with_io(options, Box::new(io::stdout()), Box::new(io::BufReader::new(io::stdin())))
    }

    pub fn with_io(options: Options, out: Box<dyn Write>, input: Box<dyn BufRead>) -> Self {
        Interpreter { ast: Ast::new(), scopes: Scopes::new(), out, input, options }
    }

    /// Scans, parses and runs `src`, returning the value of its last
    /// statement.
    ///
    /// Runtime error spans come back relative to `src`.
    pub fn eval_source(&mut self, src: &str) -> Result<Value, crate::Error> {
        let base = self.ast.source_end();
        let root = parse_source(src, &mut self.ast)?;
        self.run(root).map_err(|err| err.relative_to(base, src.len()).into())
    }

    /// Executes an already parsed root block in the global frame.
    ///
    /// We use a fail-fast approach where the first runtime error stops
    /// execution and gets returned.
    pub fn run(&mut self, root: BlockId) -> EvalResult<Value> {
        let mut ev = Evaluator {
            ast: &self.ast,
            scopes: &mut self.scopes,
            out: &mut *self.out,
            input: &mut *self.input,
            options: &self.options,
            depth: 0,
        };
        ev.eval_block(ScopeId::GLOBAL, root)
    }

    /// Value bound to `name` in the global frame.
    pub fn global(&self, name: &str) -> Option<&Value> {
        self.scopes.resolve(ScopeId::GLOBAL, name)
    }

    #[inline]
    pub fn scopes(&self) -> &Scopes {
        &self.scopes
    }

    #[inline]
    pub fn options(&self) -> &Options {
        &self.options
    }
}

/// One run of the interpreter, borrowing the pieces of [`Interpreter`] it
/// needs. Builtins receive it so they can do I/O and call back into user
/// functions.
pub struct Evaluator<'a> {
    ast: &'a Ast,
    scopes: &'a mut Scopes,
    out: &'a mut dyn Write,
    input: &'a mut dyn BufRead,
    options: &'a Options,
    depth: usize,
}

impl<'a> Evaluator<'a> {
    #[inline]
    pub fn output(&mut self) -> &mut dyn Write {
        &mut *self.out
    }

    #[inline]
    pub fn input(&mut self) -> &mut dyn BufRead {
        &mut *self.input
    }

    /// Number of parameters the function declares.
    #[inline]
    pub fn param_count(&self, func: FuncId) -> usize {
        self.ast.func(func).params.len()
    }

    /// Runs the statements of `block` in `scope`; the last value survives.
    pub fn eval_block(&mut self, scope: ScopeId, block: BlockId) -> EvalResult<Value> {
        let ast = self.ast;
        let mut last = Value::Null;
        for &stmt in &ast.block(block).stmts {
            last = self.exec_stmt(scope, stmt)?;
        }
        Ok(last)
    }

    fn exec_stmt(&mut self, scope: ScopeId, stmt: StmtId) -> EvalResult<Value> {
        let ast = self.ast;
        match ast.stmt(stmt) {
            Stmt::Expr(expr) => self.eval_expr(scope, *expr),
            Stmt::Declare { name, value, is_const, span } => {
                let value = self.eval_expr(scope, *value)?;
                self.scopes
                    .declare(scope, name.clone(), value.clone(), *is_const)
                    .map_err(|err| scope_error(err, name, *span))?;
                Ok(value)
            }
            Stmt::Assign { name, value, span } => {
                let value = self.eval_expr(scope, *value)?;
                self.scopes
                    .assign(scope, name, value.clone())
                    .map_err(|err| scope_error(err, name, *span))?;
                Ok(value)
            }
            Stmt::Function { name, func, span } => {
                let closure = self.closure(scope, *func);
                self.scopes
                    .declare(scope, name.clone(), closure.clone(), false)
                    .map_err(|err| scope_error(err, name, *span))?;
                Ok(closure)
            }
            Stmt::Block(block) => {
                let mark = self.scopes.mark();
                let child = self.scopes.push(scope);
                let result = self.eval_block(child, *block);
                self.release(mark, &result);
                result
            }
        }
    }

    pub fn eval_expr(&mut self, scope: ScopeId, expr: ExprId) -> EvalResult<Value> {
        let ast = self.ast;
        match ast.expr(expr) {
            Expr::Integer(n, _) => Ok(Value::Integer(*n)),
            Expr::Str(s, _) => Ok(Value::Str(s.clone())),
            Expr::Bool(b, _) => Ok(Value::Bool(*b)),
            Expr::Null(_) => Ok(Value::Null),
            Expr::Identifier(name, span) => {
                if let Some(value) = self.scopes.resolve(scope, name) {
                    return Ok(value.clone());
                }
                Builtin::from_name(name)
                    .map(|builtin| Value::Function(Callable::Builtin(builtin)))
                    .ok_or_else(|| {
                        RuntimeError::new(RuntimeErrorKind::UndefinedVariable(name.clone()), *span)
                    })
            }
            Expr::Binary { op, lhs, rhs, span } => {
                let lhs = self.eval_expr(scope, *lhs)?;
                let rhs = self.eval_expr(scope, *rhs)?;
                binary(*op, &lhs, &rhs, *span)
            }
            Expr::Unary { op, operand, span } => {
                let operand = self.eval_expr(scope, *operand)?;
                unary(*op, &operand, *span)
            }
            Expr::Call { callee, args, span } => {
                let callee = self.eval_expr(scope, *callee)?;
                let mut values = Vec::with_capacity(args.len());
                for &arg in args {
                    values.push(self.eval_expr(scope, arg)?);
                }
                match callee {
                    Value::Function(callable) => self.call(callable, values, *span),
                    other => Err(RuntimeError::new(
                        RuntimeErrorKind::NotCallable(other.type_of()),
                        *span,
                    )),
                }
            }
            Expr::Array(items, _) => {
                let mut values = Vec::with_capacity(items.len());
                for &item in items {
                    values.push(self.eval_expr(scope, item)?);
                }
                Ok(Value::Array(values))
            }
            Expr::Index { target, index, span } => {
                let target = self.eval_expr(scope, *target)?;
                let index = self.eval_expr(scope, *index)?;
                index_value(target, &index, *span)
            }
            Expr::Function(func, _) => Ok(self.closure(scope, *func)),
        }
    }

    /// Calls a function value with already evaluated arguments.
    ///
    /// A user function runs in a fresh frame whose parent is the frame the
    /// function was defined in, so every call starts from the same captured
    /// environment.
    pub fn call(&mut self, callee: Callable, args: Vec<Value>, span: Span) -> EvalResult<Value> {
        let (func, env) = match callee {
            Callable::Builtin(builtin) => return builtin.call(self, args, span),
            Callable::Closure { func, env } => (func, env),
        };
        let ast = self.ast;
        let def = ast.func(func);
        if args.len() != def.params.len() {
            return Err(RuntimeError::new(
                RuntimeErrorKind::ArityMismatch { expected: def.params.len(), found: args.len() },
                span,
            ));
        }
        if self.depth >= self.options.max_call_depth {
            return Err(RuntimeError::new(RuntimeErrorKind::StackOverflow, span));
        }

        let mark = self.scopes.mark();
        let frame = self.scopes.push(env);
        self.depth += 1;
        let result = self.invoke(frame, def, args, span);
        self.depth -= 1;
        self.release(mark, &result);
        result
    }

    fn invoke(
        &mut self,
        frame: ScopeId,
        def: &FuncDef,
        args: Vec<Value>,
        span: Span,
    ) -> EvalResult<Value> {
        for (param, arg) in def.params.iter().zip(args) {
            self.scopes
                .declare(frame, param.clone(), arg, false)
                .map_err(|err| scope_error(err, param, span))?;
        }
        match def.body {
            FuncBody::Block(block) => self.eval_block(frame, block),
            FuncBody::Expr(expr) => self.eval_expr(frame, expr),
        }
    }

    /// Drops the frames opened since `mark`, keeping those a closure in
    /// `result` still needs. A failed evaluation carries no value out.
    fn release(&mut self, mark: usize, result: &EvalResult<Value>) {
        match result {
            Ok(value) => self.scopes.release(mark, value),
            Err(_) => self.scopes.release(mark, &Value::Null),
        }
    }

    fn closure(&mut self, scope: ScopeId, func: FuncId) -> Value {
        self.scopes.capture(scope);
        Value::Function(Callable::Closure { func, env: scope })
    }
}

fn scope_error(err: ScopeError, name: &Name, span: Span) -> RuntimeError {
    let kind = match err {
        ScopeError::AlreadyDeclared => RuntimeErrorKind::AlreadyDeclared(name.clone()),
        ScopeError::NotFound => RuntimeErrorKind::UndefinedVariable(name.clone()),
        ScopeError::ConstViolation => RuntimeErrorKind::ConstViolation(name.clone()),
    };
    RuntimeError::new(kind, span)
}

#[cold]
fn mismatch(op: &'static str, lhs: &Value, rhs: Option<&Value>, span: Span) -> RuntimeError {
    RuntimeError::new(
        RuntimeErrorKind::TypeMismatch { op, lhs: lhs.type_of(), rhs: rhs.map(Value::type_of) },
        span,
    )
}

fn binary(op: BinaryOp, lhs: &Value, rhs: &Value, span: Span) -> EvalResult<Value> {
    match op {
        BinaryOp::Eq => return Ok(Value::Bool(lhs == rhs)),
        BinaryOp::NotEq => return Ok(Value::Bool(lhs != rhs)),
        _ => {}
    }
    match (lhs, rhs) {
        (Value::Integer(a), Value::Integer(b)) => integer_op(op, *a, *b, span),
        (Value::Str(a), Value::Str(b)) => match op {
            BinaryOp::Add => {
                let mut joined = String::with_capacity(a.len() + b.len());
                joined.push_str(a);
                joined.push_str(b);
                Ok(Value::Str(joined))
            }
            BinaryOp::Less => Ok(Value::Bool(a < b)),
            BinaryOp::LessEq => Ok(Value::Bool(a <= b)),
            BinaryOp::Greater => Ok(Value::Bool(a > b)),
            BinaryOp::GreaterEq => Ok(Value::Bool(a >= b)),
            _ => Err(mismatch(op.symbol(), lhs, Some(rhs), span)),
        },
        _ => match (lhs.as_f64(), rhs.as_f64()) {
            (Some(a), Some(b)) => float_op(op, a, b, span),
            _ => Err(mismatch(op.symbol(), lhs, Some(rhs), span)),
        },
    }
}

fn integer_op(op: BinaryOp, a: i64, b: i64, span: Span) -> EvalResult<Value> {
    let value = match op {
        BinaryOp::Add => Value::Integer(a.wrapping_add(b)),
        BinaryOp::Sub => Value::Integer(a.wrapping_sub(b)),
        BinaryOp::Mul => Value::Integer(a.wrapping_mul(b)),
        // Integer division is true division.
        BinaryOp::Div if b == 0 => return Err(division_by_zero(span)),
        BinaryOp::Div => Value::Float(a as f64 / b as f64),
        BinaryOp::Mod if b == 0 => return Err(division_by_zero(span)),
        BinaryOp::Mod => Value::Integer(a.wrapping_rem(b)),
        BinaryOp::Less => Value::Bool(a < b),
        BinaryOp::LessEq => Value::Bool(a <= b),
        BinaryOp::Greater => Value::Bool(a > b),
        BinaryOp::GreaterEq => Value::Bool(a >= b),
        BinaryOp::Eq => Value::Bool(a == b),
        BinaryOp::NotEq => Value::Bool(a != b),
    };
    Ok(value)
}

fn float_op(op: BinaryOp, a: f64, b: f64, span: Span) -> EvalResult<Value> {
    let value = match op {
        BinaryOp::Add => Value::Float(a + b),
        BinaryOp::Sub => Value::Float(a - b),
        BinaryOp::Mul => Value::Float(a * b),
        BinaryOp::Div | BinaryOp::Mod if b == 0.0 => return Err(division_by_zero(span)),
        BinaryOp::Div => Value::Float(a / b),
        BinaryOp::Mod => Value::Float(a % b),
        BinaryOp::Less => Value::Bool(a < b),
        BinaryOp::LessEq => Value::Bool(a <= b),
        BinaryOp::Greater => Value::Bool(a > b),
        BinaryOp::GreaterEq => Value::Bool(a >= b),
        BinaryOp::Eq => Value::Bool(a == b),
        BinaryOp::NotEq => Value::Bool(a != b),
    };
    Ok(value)
}

#[cold]
fn division_by_zero(span: Span) -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::DivisionByZero, span)
}

fn unary(op: UnaryOp, operand: &Value, span: Span) -> EvalResult<Value> {
    match (op, operand) {
        (UnaryOp::Neg, Value::Integer(n)) => Ok(Value::Integer(n.wrapping_neg())),
        (UnaryOp::Neg, Value::Float(n)) => Ok(Value::Float(-n)),
        (UnaryOp::Neg, other) => Err(mismatch("-", other, None, span)),
        (UnaryOp::Not, other) => Ok(Value::Bool(!other.is_truthy())),
    }
}

fn index_value(target: Value, index: &Value, span: Span) -> EvalResult<Value> {
    let out_of_bounds = |index: i64, len: usize| {
        RuntimeError::new(RuntimeErrorKind::IndexOutOfBounds { index, len }, span)
    };
    match (target, index) {
        (Value::Array(items), &Value::Integer(i)) => {
            let len = items.len();
            usize::try_from(i)
                .ok()
                .and_then(|i| items.into_iter().nth(i))
                .ok_or_else(|| out_of_bounds(i, len))
        }
        (Value::Str(s), &Value::Integer(i)) => usize::try_from(i)
            .ok()
            .and_then(|i| s.chars().nth(i))
            .map(|ch| Value::Str(ch.to_string()))
            .ok_or_else(|| out_of_bounds(i, s.chars().count())),
        (target, index) => Err(mismatch("[]", &target, Some(index), span)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(src: &str) -> EvalResult<Value> {
        let mut itp = Interpreter::with_io(Options::default(), Box::new(io::sink()), Box::new(io::empty()));
        match itp.eval_source(src) {
            Ok(value) => Ok(value),
            Err(crate::Error::Runtime(err)) => Err(err),
            Err(other) => panic!("unexpected syntax error: {other}"),
        }
    }

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(eval("2 + 3").unwrap(), Value::Integer(5));
        assert_eq!(eval("2 - 3").unwrap(), Value::Integer(-1));
        assert_eq!(eval("4 * 3").unwrap(), Value::Integer(12));
        assert_eq!(eval("7 % 3").unwrap(), Value::Integer(1));
        assert_eq!(eval("10 - 3 - 2").unwrap(), Value::Integer(5));
    }

    #[test]
    fn test_division_is_always_float() {
        assert!(matches!(eval("4 / 2").unwrap(), Value::Float(n) if n == 2.0));
        assert!(matches!(eval("7 / 2").unwrap(), Value::Float(n) if n == 3.5));
    }

    #[test]
    fn test_zero_divisor() {
        for src in ["1 / 0", "1 % 0", "(1 / 1) / 0", "(3 / 2) % 0", "var z = 0; 5 % z"] {
            assert_eq!(eval(src).unwrap_err().kind, RuntimeErrorKind::DivisionByZero, "{src}");
        }
    }

    #[test]
    fn test_wrapping() {
        assert_eq!(eval("9223372036854775807 + 1").unwrap(), Value::Integer(i64::MIN));
    }

    #[test]
    fn test_type_mismatch_names_types() {
        let err = eval("1 + \"a\"").unwrap_err();
        assert_eq!(
            err.kind,
            RuntimeErrorKind::TypeMismatch { op: "+", lhs: ValueType::Integer, rhs: Some(ValueType::Str) }
        );
        assert!(err.to_string().contains("integer and string"));
    }

    #[test]
    fn test_string_concat_and_compare() {
        assert_eq!(eval("'ab' + \"cd\"").unwrap(), Value::from("abcd"));
        assert_eq!(eval("'a' < 'b'").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_block_value() {
        assert_eq!(eval("").unwrap(), Value::Null);
        assert_eq!(eval("{ }").unwrap(), Value::Null);
        assert_eq!(eval("var x = 4; { var y = 1; x + y }").unwrap(), Value::Integer(5));
    }

    #[test]
    fn test_block_locals_do_not_leak() {
        let err = eval("{ var y = 1; } y").unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::UndefinedVariable("y".into()));
    }

    #[test]
    fn test_closure_outlives_call() {
        let src = "function make(n) { fn() => n } var f = make(3); make(9); f()";
        assert_eq!(eval(src).unwrap(), Value::Integer(3));
    }

    #[test]
    fn test_index() {
        assert_eq!(eval("[1, 2, 3][1]").unwrap(), Value::Integer(2));
        assert_eq!(eval("'abc'[2]").unwrap(), Value::from("c"));
        let err = eval("[1][1]").unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::IndexOutOfBounds { index: 1, len: 1 });
    }

    #[test]
    fn test_stack_overflow() {
        let mut itp = Interpreter::with_io(
            Options { max_call_depth: 16 },
            Box::new(io::sink()),
            Box::new(io::empty()),
        );
        let err = itp.eval_source("function f() { f() } f()").unwrap_err();
        let crate::Error::Runtime(err) = err else { panic!("expected runtime error") };
        assert_eq!(err.kind, RuntimeErrorKind::StackOverflow);
        assert_eq!(itp.scopes().len(), 1);
    }
}
