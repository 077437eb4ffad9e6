use blang::Error;
use blang::diagnostics::{AsStr, Location};
use blang::runtime::RuntimeErrorKind;
use blang::value::Value;

mod common;
use crate::common::interpreter_with_input;

#[macro_export]
macro_rules! assert_runtime {
    ($src:expr, value: $expected:expr) => {{
        let (mut itp, _) = interpreter_with_input("");
        match itp.eval_source($src) {
            Ok(value) => assert_eq!(value, Value::from($expected), "source: {}", $src),
            Err(err) => panic!("Expected {:?} from {:?}, got error: {err}", $expected, $src),
        }
    }};
    ($src:expr, output: $expected:expr) => {{
        let (mut itp, out) = interpreter_with_input("");
        if let Err(err) = itp.eval_source($src) {
            panic!("Expected no errors from {:?}, got: {err}", $src);
        }
        assert_eq!(out.contents(), $expected);
    }};
    ($src:expr, error: $kind:pat) => {{
        let (mut itp, _) = interpreter_with_input("");
        match itp.eval_source($src) {
            Err(Error::Runtime(err)) => assert!(
                matches!(err.kind, $kind),
                "Expected error: {}, got: {:?}",
                stringify!($kind),
                err.kind
            ),
            other => panic!("Expected error: {}, got: {other:?}", stringify!($kind)),
        }
    }};
}

#[test]
fn test_arithmetic() {
    assert_runtime!("2 + 3 * 4", value: 14i64);
    assert_runtime!("(2 + 3) * 4", value: 20i64);
    assert_runtime!("10 - 3 - 2", value: 5i64);
    assert_runtime!("17 % 5", value: 2i64);
    assert_runtime!("-7 + 2", value: -5i64);
    assert_runtime!("7 / 2", value: 3.5f64);
    assert_runtime!("6 / 3", value: 2.0f64);
}

#[test]
fn test_division_and_modulo_by_zero() {
    assert_runtime!("1 / 0", error: RuntimeErrorKind::DivisionByZero);
    assert_runtime!("1 % 0", error: RuntimeErrorKind::DivisionByZero);
    assert_runtime!("var z = 0; 10 / z", error: RuntimeErrorKind::DivisionByZero);
}

#[test]
fn test_comparison_and_logic() {
    assert_runtime!("1 < 2", value: true);
    assert_runtime!("2 <= 1", value: false);
    assert_runtime!("\"abc\" < \"abd\"", value: true);
    assert_runtime!("1 == 1 != false", value: true);
    assert_runtime!("!0", value: true);
    assert_runtime!("!\"text\"", value: false);
    assert_runtime!("[1, 2] == [1, 2]", value: true);
}

#[test]
fn test_string_concatenation() {
    assert_runtime!("var who = 'world'; \"hello \" + who", value: "hello world");
    assert_runtime!("\"a\" + 1", error: RuntimeErrorKind::TypeMismatch { op: "+", .. });
}

#[test]
fn test_inner_declaration_shadows() {
    assert_runtime!("var x = 1; { var x = 2; } x", value: 1i64);
}

#[test]
fn test_assignment_writes_through_to_outer_frame() {
    assert_runtime!("var x = 1; { x = 2; } x", value: 2i64);
    assert_runtime!("var x = 1; function bump() { x = x + 10 } bump(); bump(); x", value: 21i64);
}

#[test]
fn test_undeclared_assignment_fails() {
    assert_runtime!("y = 3", error: RuntimeErrorKind::UndefinedVariable(_));
    assert_runtime!("println(missing)", error: RuntimeErrorKind::UndefinedVariable(_));
}

#[test]
fn test_redeclaration_in_same_frame_fails() {
    assert_runtime!("var a = 1; var a = 2", error: RuntimeErrorKind::AlreadyDeclared(_));
}

#[test]
fn test_const_violation_keeps_value() {
    let (mut itp, _) = interpreter_with_input("");
    let err = itp.eval_source("const c = 1; c = 2").unwrap_err();
    let Error::Runtime(err) = err else { panic!("expected a runtime error, got {err:?}") };
    assert!(matches!(err.kind, RuntimeErrorKind::ConstViolation(ref name) if &**name == "c"));
    assert_eq!(err.kind.as_str(), "cannot assign to a constant");
    assert_eq!(itp.global("c"), Some(&Value::Integer(1)));
}

#[test]
fn test_functions_and_lambdas() {
    assert_runtime!("function add(a, b) { a + b } add(2, 3)", value: 5i64);
    assert_runtime!("var sq = fn(n) => n * n; sq(9)", value: 81i64);
    assert_runtime!("var twice = function(f, x) { f(f(x)) }; twice(fn(n) => n + 1, 0)", value: 2i64);
    assert_runtime!("function f(a) { a } f(1, 2)", error: RuntimeErrorKind::ArityMismatch { expected: 1, found: 2 });
    assert_runtime!("var n = 3; n(1)", error: RuntimeErrorKind::NotCallable(_));
}

#[test]
fn test_closure_keeps_its_frame() {
    let src = "function counter() { var n = 0; function step() { n = n + 1; n } step }\n\
               var c = counter(); c(); c(); c()";
    assert_runtime!(src, value: 3i64);
}

#[test]
fn test_runaway_recursion_is_stopped() {
    assert_runtime!("function loop() { loop() } loop()", error: RuntimeErrorKind::StackOverflow);
}

#[test]
fn test_indexing() {
    assert_runtime!("[10, 20, 30][1]", value: 20i64);
    assert_runtime!("\"hey\"[2]", value: "y");
    assert_runtime!("[1][1]", error: RuntimeErrorKind::IndexOutOfBounds { index: 1, len: 1 });
    assert_runtime!("[1][-1]", error: RuntimeErrorKind::IndexOutOfBounds { .. });
}

#[test]
fn test_println_and_print() {
    assert_runtime!("println(\"sum:\", 1 + 2); print(\"a\"); print(\"b\")", output: "sum: 3\nab");
    assert_runtime!("println(7 / 2, null, true, [1, \"x\"])", output: "3.5 null true [1, \"x\"]\n");
    assert_runtime!("println()", output: "\n");
}

#[test]
fn test_array_builtins() {
    assert_runtime!("array(1, 2, 3)", value: vec![1i64, 2, 3]);
    assert_runtime!("vector()", value: Vec::<i64>::new());
    assert_runtime!("array_filter([1, 2, 3, 4], fn(x) => x > 2)", value: vec![3i64, 4]);
}

#[test]
fn test_array_filter_leaves_input_alone() {
    let src = "var xs = [1, 2, 3, 4]; var big = array_filter(xs, fn(x) => x > 2); println(big, xs)";
    assert_runtime!(src, output: "[3, 4] [1, 2, 3, 4]\n");
}

#[test]
fn test_array_filter_arguments() {
    assert_runtime!("array_filter([1], fn(a, b) => a)", error: RuntimeErrorKind::BuiltinArgument { name: "array_filter", .. });
    assert_runtime!("array_filter(1, fn(x) => x)", error: RuntimeErrorKind::BuiltinArgument { .. });
    assert_runtime!("array_filter([1])", error: RuntimeErrorKind::BuiltinArity { found: 1, .. });
    assert_runtime!("array_filter([1, 2, 3], fn() => true)", value: vec![1i64, 2, 3]);
}

#[test]
fn test_assigning_an_array_copies_it() {
    assert_runtime!("var a = [1]; var b = a; a = [2]; b", value: vec![1i64]);
}

#[test]
fn test_read_lines_from_input() {
    let (mut itp, out) = interpreter_with_input("alice\r\nbob\n");
    let value = itp
        .eval_source("var first = read(\"name? \"); var second = read(); println(first + \"+\" + second); read()")
        .unwrap();
    assert_eq!(value, Value::Null);
    assert_eq!(out.contents(), "name? alice+bob\n");
}

#[test]
fn test_exit_stops_the_program() {
    let (mut itp, out) = interpreter_with_input("");
    let err = itp.eval_source("println(1); exit(3); println(2)").unwrap_err();
    assert_eq!(err.exit_code(), Some(3));
    assert_eq!(out.contents(), "1\n");
    assert_runtime!("exit(\"no\")", error: RuntimeErrorKind::BuiltinArgument { name: "exit", .. });
}

#[test]
fn test_exit_status_must_fit_a_byte() {
    let (mut itp, _) = interpreter_with_input("");
    let err = itp.eval_source("exit(255)").unwrap_err();
    assert_eq!(err.exit_code(), Some(255));
    assert_runtime!("exit(256)", error: RuntimeErrorKind::BuiltinArgument { name: "exit", .. });
    assert_runtime!("exit(-1)", error: RuntimeErrorKind::BuiltinArgument { name: "exit", .. });
}

#[test]
fn test_state_carries_across_sources() {
    let (mut itp, _) = interpreter_with_input("");
    itp.eval_source("var total = 1; function add(n) { total = total + n }").unwrap();
    itp.eval_source("add(4)").unwrap();
    assert_eq!(itp.eval_source("total").unwrap(), Value::Integer(5));
}

#[test]
fn test_error_diagnostic_points_at_the_expression() {
    let (mut itp, _) = interpreter_with_input("");
    let src = "var x = 1;\nx / 0";
    let err = itp.eval_source(src).unwrap_err();
    let diagnostic = err.to_diagnostic();
    assert_eq!(diagnostic.line_column(src), Some((2, 1)));
}

#[test]
fn test_error_in_closure_from_an_earlier_source() {
    let (mut itp, _) = interpreter_with_input("");
    itp.eval_source("var f = fn() => 1 / 0").unwrap();

    let src = "'ééééééééééé'; f()";
    let err = itp.eval_source(src).unwrap_err();
    assert!(matches!(err, Error::Runtime(ref e) if e.span.is_none()));
    let diagnostic = err.to_diagnostic();
    assert_eq!(diagnostic.location, Location::Unknown);
    let mut out = Vec::new();
    diagnostic.render(src, "<repl>", &mut out).unwrap();
    assert!(String::from_utf8(out).unwrap().contains("division by zero"));
}

#[test]
fn test_later_sources_report_their_own_positions() {
    let (mut itp, _) = interpreter_with_input("");
    itp.eval_source("var x = 'ééé'").unwrap();
    let src = "x;\n  1 / 0";
    let err = itp.eval_source(src).unwrap_err();
    assert_eq!(err.to_diagnostic().line_column(src), Some((2, 3)));
}

#[test]
fn test_frames_are_freed_when_closures_do_not_escape() {
    let (mut itp, _) = interpreter_with_input("");
    itp.eval_source("function g() { var t = fn() => 1; 0 }").unwrap();
    let before = itp.scopes().len();
    for _ in 0..1000 {
        assert_eq!(itp.eval_source("g()").unwrap(), Value::Integer(0));
    }
    assert_eq!(itp.scopes().len(), before);

    itp.eval_source("function mk(n) { fn() => n } var keep = mk(7); { var tmp = mk(1); 0 }").unwrap();
    assert_eq!(itp.scopes().len(), before + 1);
    assert_eq!(itp.eval_source("keep()").unwrap(), Value::Integer(7));
}
