use crate::builtins::Builtin;
use crate::diagnostics::Span;
use crate::runtime::{EvalResult, Evaluator, RuntimeError, RuntimeErrorKind};
use crate::value::Value;

/// `println(...)` / `print(...)`
pub(super) fn print(
    ev: &mut Evaluator<'_>,
    args: &[Value],
    newline: bool,
    span: Span,
) -> EvalResult<Value> {
    let mut line = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            line.push(' ');
        }
        line.push_str(&arg.to_string());
    }
    if newline {
        line.push('\n');
    }
    let out = ev.output();
    out.write_all(line.as_bytes()).and_then(|()| out.flush()).map_err(|e| RuntimeError::io(e, span))?;
    Ok(Value::Null)
}

/// `read([prompt])`
pub(super) fn read(ev: &mut Evaluator<'_>, args: &[Value], span: Span) -> EvalResult<Value> {
    Builtin::Read.check_arity(args, 0..=1, "0 or 1", span)?;
    if let Some(prompt) = args.first() {
        let Value::Str(prompt) = prompt else {
            return Err(Builtin::Read.bad_argument("a string prompt", span));
        };
        let out = ev.output();
        out.write_all(prompt.as_bytes()).and_then(|()| out.flush()).map_err(|e| RuntimeError::io(e, span))?;
    }

    let mut line = String::new();
    let n = ev.input().read_line(&mut line).map_err(|e| RuntimeError::io(e, span))?;
    if n == 0 {
        return Ok(Value::Null);
    }
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    Ok(Value::Str(line))
}

/// `exit([code])`, with `code` a process status in `0..=255`.
pub(super) fn exit(args: &[Value], span: Span) -> EvalResult<Value> {
    Builtin::Exit.check_arity(args, 0..=1, "0 or 1", span)?;
    let code = match args.first() {
        None => 0,
        Some(Value::Integer(n @ 0..=255)) => *n as i32,
        Some(_) => return Err(Builtin::Exit.bad_argument("an integer status from 0 to 255", span)),
    };
    Err(RuntimeError::new(RuntimeErrorKind::Exit(code), span))
}
