use super::parse;
use crate::runtime::error::RuntimeError;
use crate::runtime::frame::Frame;
use crate::runtime::interpreter::{DebugListener, Interpreter};
use crate::runtime::scope::LexicalScope;
use crate::runtime::value::Value;
use std::cell::Cell;
use std::rc::Rc;

fn run(source: &str) -> Result<Value, RuntimeError> {
    let program = parse(source);
    let mut interpreter = Interpreter::new();
    interpreter.install_program(&program);
    interpreter.run()
}

fn run_capturing(source: &str) -> (Result<Value, RuntimeError>, Vec<String>) {
    let program = parse(source);
    let mut interpreter = Interpreter::new();
    interpreter.install_program(&program);
    interpreter.capture_output();
    let result = interpreter.run();
    let output = interpreter.captured_output().to_vec();
    (result, output)
}

#[test]
fn arithmetic_follows_precedence() {
    let result = run("function main() { return 1 + 2 * 3; }").expect("runs");
    assert!(result.equals(&Value::Long(7)));
}

#[test]
fn string_concatenation_applies_when_either_side_is_a_string() {
    let result = run(r#"function main() { return "x = " + 42; }"#).expect("runs");
    assert!(result.equals(&Value::string("x = 42")));
}

#[test]
fn while_loop_with_break_and_continue() {
    let source = "\
function main() {
    total = 0;
    i = 0;
    while (i < 10) {
        i = i + 1;
        if (i == 3) {
            continue;
        }
        if (i > 5) {
            break;
        }
        total = total + i;
    }
    return total;
}
";
    // 1 + 2 + 4 + 5
    let result = run(source).expect("runs");
    assert!(result.equals(&Value::Long(12)));
}

#[test]
fn user_functions_receive_positional_arguments() {
    let source = "\
function add(a, b) {
    return a + b;
}

function main() {
    return add(2, 40);
}
";
    let result = run(source).expect("runs");
    assert!(result.equals(&Value::Long(42)));
}

#[test]
fn missing_arguments_read_as_null() {
    let source = "\
function probe(a, b) {
    return isNull(b);
}

function main() {
    return probe(1);
}
";
    let result = run(source).expect("runs");
    assert!(result.equals(&Value::Boolean(true)));
}

#[test]
fn recursion_terminates() {
    let source = "\
function fib(n) {
    if (n <= 1) {
        return n;
    }
    return fib(n - 1) + fib(n - 2);
}

function main() {
    return fib(10);
}
";
    let result = run(source).expect("runs");
    assert!(result.equals(&Value::Long(55)));
}

#[test]
fn runaway_recursion_is_cut_off() {
    let source = "\
function loop(n) {
    return loop(n + 1);
}

function main() {
    return loop(0);
}
";
    assert!(matches!(
        run(source),
        Err(RuntimeError::CallDepthExceeded { .. })
    ));
}

#[test]
fn objects_hold_properties() {
    let source = r#"
function main() {
    o = new();
    o.greeting = "hello";
    o["target"] = "world";
    return o.greeting + " " + o.target + " " + getSize(o);
}
"#;
    let result = run(source).expect("runs");
    assert!(result.equals(&Value::string("hello world 2")));
}

#[test]
fn reading_an_undefined_property_fails() {
    let source = "\
function main() {
    o = new();
    return o.missing;
}
";
    assert!(matches!(
        run(source),
        Err(RuntimeError::UndefinedProperty { .. })
    ));
}

#[test]
fn type_introspection_builtins() {
    let (result, output) = run_capturing(
        r#"
function main() {
    println(typeOf(1));
    println(typeOf("s"));
    println(typeOf(main));
    println(isExecutable(main));
    println(isExecutable(1));
    return 0;
}
"#,
    );
    result.expect("runs");
    assert_eq!(output, ["Long", "String", "Function", "true", "false"]);
}

#[test]
fn calling_an_undefined_function_fails_at_call_time() {
    // Referencing the unknown name parses and even evaluates; only the
    // invocation reports the failure.
    let source = "\
function main() {
    f = missing;
    return f();
}
";
    assert!(matches!(
        run(source),
        Err(RuntimeError::UndefinedFunction { .. })
    ));
}

#[test]
fn define_function_installs_callable_code() {
    let source = r#"
function main() {
    defineFunction("function helper(n) { return n * 2; }");
    return helper(21);
}
"#;
    let result = run(source).expect("runs");
    assert!(result.equals(&Value::Long(42)));
}

#[test]
fn define_function_rejects_bad_source_without_breaking_the_registry() {
    let program = parse(
        r#"
function broken() {
    return defineFunction("function oops( {");
}

function ok() {
    return 7;
}
"#,
    );
    let mut interpreter = Interpreter::new();
    interpreter.install_program(&program);

    assert!(matches!(
        interpreter.invoke("broken", Vec::new()),
        Err(RuntimeError::Definition { .. })
    ));
    // Previously installed functions are untouched by the failure.
    let result = interpreter.invoke("ok", Vec::new()).expect("still callable");
    assert!(result.equals(&Value::Long(7)));
}

#[test]
fn non_boolean_condition_is_a_type_error() {
    assert!(matches!(
        run("function main() { if (1) { return 2; } return 3; }"),
        Err(RuntimeError::TypeMismatch { .. })
    ));
}

#[test]
fn division_by_zero_is_reported() {
    assert!(matches!(
        run("function main() { return 1 / 0; }"),
        Err(RuntimeError::DivisionByZero)
    ));
}

#[test]
fn function_without_return_yields_null() {
    let result = run("function main() { x = 1; }").expect("runs");
    assert!(result.is_null());
}

struct MutatingListener {
    hits: Rc<Cell<usize>>,
}

impl DebugListener for MutatingListener {
    fn on_halt(&mut self, scope: &LexicalScope<'_>, frame: &mut Frame) {
        self.hits.set(self.hits.get() + 1);
        let mut view = scope.variables(Some(frame));
        let seen = view.read("x").expect("x is bound at the halt");
        assert!(seen.equals(&Value::Long(1)));
        view.write("x", Value::Long(42)).expect("frame is live");
    }
}

#[test]
fn debugger_halt_exposes_and_mutates_the_live_frame() {
    let source = "\
function main() {
    x = 1;
    debugger;
    println(x);
    return x;
}
";
    let program = parse(source);
    let hits = Rc::new(Cell::new(0));
    let mut interpreter = Interpreter::new();
    interpreter.install_program(&program);
    interpreter.capture_output();
    interpreter.set_debug_listener(Box::new(MutatingListener { hits: hits.clone() }));

    let result = interpreter.run().expect("runs");
    assert_eq!(hits.get(), 1);
    assert!(result.equals(&Value::Long(42)));
    assert_eq!(interpreter.captured_output(), ["42"]);
}

struct ChainRecorder {
    names: Rc<std::cell::RefCell<Vec<String>>>,
}

impl DebugListener for ChainRecorder {
    fn on_halt(&mut self, scope: &LexicalScope<'_>, _frame: &mut Frame) {
        let mut current = Some(scope);
        while let Some(level) = current {
            self.names.borrow_mut().push(level.name().to_string());
            current = level.parent();
        }
    }
}

#[test]
fn debugger_halt_inside_nested_blocks_sees_the_whole_chain() {
    let source = "\
function outermost() {
    a = 1;
    {
        b = 2;
        debugger;
    }
    return a;
}

function main() {
    return outermost();
}
";
    let program = parse(source);
    let names = Rc::new(std::cell::RefCell::new(Vec::new()));
    let mut interpreter = Interpreter::new();
    interpreter.install_program(&program);
    interpreter.set_debug_listener(Box::new(ChainRecorder { names: names.clone() }));

    interpreter.run().expect("runs");
    assert_eq!(*names.borrow(), ["block", "outermost"]);
}
