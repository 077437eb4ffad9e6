use crate::builtins::Builtin;
use crate::diagnostics::Span;
use crate::runtime::{EvalResult, Evaluator};
use crate::value::{Callable, Value};

/// `array(...)` and `vector(...)`: the arguments are already owned copies.
#[inline]
pub(super) fn collect(args: Vec<Value>) -> Value {
    Value::Array(args)
}

/// `array_filter(array, fn)`
///
/// The predicate is called once per element, in order, and the input array is
/// left as it was. A zero-parameter function is called without arguments.
pub(super) fn filter(ev: &mut Evaluator<'_>, args: Vec<Value>, span: Span) -> EvalResult<Value> {
    Builtin::ArrayFilter.check_arity(&args, 2..=2, "2", span)?;
    let mut args = args.into_iter();
    let (Some(Value::Array(items)), Some(Value::Function(predicate))) = (args.next(), args.next())
    else {
        return Err(Builtin::ArrayFilter.bad_argument("an array and a function", span));
    };

    let takes = match predicate {
        Callable::Builtin(_) => 1,
        Callable::Closure { func, .. } => ev.param_count(func),
    };
    if takes > 1 {
        return Err(Builtin::ArrayFilter.bad_argument("a function of at most one parameter", span));
    }

    let mut kept = Vec::new();
    for item in items {
        let call_args = if takes == 1 { vec![item.clone()] } else { Vec::new() };
        if ev.call(predicate, call_args, span)?.is_truthy() {
            kept.push(item);
        }
    }
    Ok(Value::Array(kept))
}
