use crate::language::ast::{Ast, BinaryOp, Function, NodeId, NodeKind};
use crate::language::parser::{parse_source, ParsedProgram};
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::frame::Frame;
use crate::runtime::scope::LexicalScope;
use crate::runtime::value::{ObjectValue, Value};
use std::collections::HashMap;
use std::io::BufRead;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

const MAX_CALL_DEPTH: usize = 256;

/// Callback invoked when a `debugger;` statement executes. The scope
/// descriptor is located fresh from the halt node; the frame is the live
/// activation record of the paused invocation.
pub trait DebugListener {
    fn on_halt(&mut self, scope: &LexicalScope<'_>, frame: &mut Frame);
}

#[derive(Clone)]
enum FunctionEntry {
    User {
        function: Rc<Function>,
        ast: Rc<Ast>,
    },
    Builtin(Builtin),
}

#[derive(Clone, Copy, Debug)]
enum Builtin {
    Println,
    Readln,
    NanoTime,
    NewObject,
    TypeOf,
    IsNull,
    GetSize,
    HasSize,
    IsExecutable,
    DefineFunction,
}

/// Control-flow result of executing one statement.
enum Signal {
    Value(Value),
    Return(Value),
    Break,
    Continue,
}

pub struct Interpreter {
    functions: HashMap<String, FunctionEntry>,
    listener: Option<Box<dyn DebugListener>>,
    captured: Option<Vec<String>>,
    depth: usize,
}

impl Interpreter {
    pub fn new() -> Self {
        let mut interpreter = Self {
            functions: HashMap::new(),
            listener: None,
            captured: None,
            depth: 0,
        };
        interpreter.install_builtins();
        interpreter
    }

    fn install_builtins(&mut self) {
        let builtins = [
            ("println", Builtin::Println),
            ("readln", Builtin::Readln),
            ("nanoTime", Builtin::NanoTime),
            ("new", Builtin::NewObject),
            ("typeOf", Builtin::TypeOf),
            ("isNull", Builtin::IsNull),
            ("getSize", Builtin::GetSize),
            ("hasSize", Builtin::HasSize),
            ("isExecutable", Builtin::IsExecutable),
            ("defineFunction", Builtin::DefineFunction),
        ];
        for (name, builtin) in builtins {
            self.functions
                .insert(name.to_string(), FunctionEntry::Builtin(builtin));
        }
    }

    /// Registers every function of a parse; an existing entry of the same
    /// name (builtin or user) is replaced.
    pub fn install_program(&mut self, program: &ParsedProgram) {
        for function in &program.functions {
            log::debug!("registering function `{}`", function.name);
            self.functions.insert(
                function.name.clone(),
                FunctionEntry::User {
                    function: function.clone(),
                    ast: program.ast.clone(),
                },
            );
        }
    }

    pub fn set_debug_listener(&mut self, listener: Box<dyn DebugListener>) {
        self.listener = Some(listener);
    }

    /// Redirects `println` into an internal buffer, for embedding and
    /// tests.
    pub fn capture_output(&mut self) {
        self.captured = Some(Vec::new());
    }

    pub fn captured_output(&self) -> &[String] {
        self.captured.as_deref().unwrap_or(&[])
    }

    /// Runs the program's `main()` with no arguments.
    pub fn run(&mut self) -> RuntimeResult<Value> {
        self.invoke("main", Vec::new())
    }

    pub fn invoke(&mut self, name: &str, arguments: Vec<Value>) -> RuntimeResult<Value> {
        let entry = self
            .functions
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::UndefinedFunction {
                name: name.to_string(),
            })?;
        if self.depth >= MAX_CALL_DEPTH {
            return Err(RuntimeError::CallDepthExceeded {
                limit: MAX_CALL_DEPTH,
            });
        }
        self.depth += 1;
        let result = match entry {
            FunctionEntry::Builtin(builtin) => self.call_builtin(builtin, arguments),
            FunctionEntry::User { function, ast } => {
                log::trace!("calling `{}`", function.name);
                let mut frame = Frame::new(&function.slots, arguments);
                self.execute(&ast, function.body, &mut frame)
                    .and_then(|signal| match signal {
                        Signal::Return(value) => Ok(value),
                        Signal::Value(_) => Ok(Value::Null),
                        Signal::Break => Err(RuntimeError::LoopEscape { statement: "break" }),
                        Signal::Continue => Err(RuntimeError::LoopEscape {
                            statement: "continue",
                        }),
                    })
            }
        };
        self.depth -= 1;
        result
    }

    fn execute(&mut self, ast: &Rc<Ast>, node: NodeId, frame: &mut Frame) -> RuntimeResult<Signal> {
        match ast.kind(node) {
            NodeKind::FunctionBody { block, .. } => self.execute(ast, *block, frame),
            NodeKind::Block { statements } => {
                for statement in statements.clone() {
                    match self.execute(ast, statement, frame)? {
                        Signal::Value(_) => {}
                        other => return Ok(other),
                    }
                }
                Ok(Signal::Value(Value::Null))
            }
            NodeKind::If {
                condition,
                then_block,
                else_block,
            } => {
                let (condition, then_block, else_block) = (*condition, *then_block, *else_block);
                if self.evaluate_condition(ast, condition, frame)? {
                    self.execute(ast, then_block, frame)
                } else if let Some(else_block) = else_block {
                    self.execute(ast, else_block, frame)
                } else {
                    Ok(Signal::Value(Value::Null))
                }
            }
            NodeKind::While { condition, body } => {
                let (condition, body) = (*condition, *body);
                while self.evaluate_condition(ast, condition, frame)? {
                    match self.execute(ast, body, frame)? {
                        Signal::Break => break,
                        Signal::Return(value) => return Ok(Signal::Return(value)),
                        Signal::Continue | Signal::Value(_) => {}
                    }
                }
                Ok(Signal::Value(Value::Null))
            }
            NodeKind::Break => Ok(Signal::Break),
            NodeKind::Continue => Ok(Signal::Continue),
            NodeKind::Return { value } => {
                let result = match *value {
                    Some(value) => self.evaluate(ast, value, frame)?,
                    None => Value::Null,
                };
                Ok(Signal::Return(result))
            }
            NodeKind::Debugger => {
                self.halt(ast, node, frame);
                Ok(Signal::Value(Value::Null))
            }
            _ => self
                .evaluate(ast, node, frame)
                .map(Signal::Value),
        }
    }

    fn evaluate_condition(
        &mut self,
        ast: &Rc<Ast>,
        node: NodeId,
        frame: &mut Frame,
    ) -> RuntimeResult<bool> {
        match self.evaluate(ast, node, frame)? {
            Value::Boolean(value) => Ok(value),
            other => Err(RuntimeError::TypeMismatch {
                message: format!("condition evaluated to {} instead of Boolean", other.type_name()),
            }),
        }
    }

    fn evaluate(&mut self, ast: &Rc<Ast>, node: NodeId, frame: &mut Frame) -> RuntimeResult<Value> {
        match ast.kind(node) {
            NodeKind::Long(value) => Ok(Value::Long(*value)),
            NodeKind::Str(value) => Ok(Value::string(value.as_str())),
            NodeKind::Paren { inner } => self.evaluate(ast, *inner, frame),
            NodeKind::ReadArgument { index } => Ok(frame.argument(*index)),
            NodeKind::ReadLocal { slot } => Ok(frame.get(slot)),
            NodeKind::WriteLocal { slot, value } => {
                let (slot, value) = (slot.clone(), *value);
                let result = self.evaluate(ast, value, frame)?;
                frame.set(&slot, result.clone());
                Ok(result)
            }
            NodeKind::FunctionRef { name } => Ok(Value::Function(name.as_str().into())),
            NodeKind::Binary { op, lhs, rhs } => {
                let (op, lhs, rhs) = (*op, *lhs, *rhs);
                let left = self.evaluate(ast, lhs, frame)?;
                let right = self.evaluate(ast, rhs, frame)?;
                apply_binary(op, left, right)
            }
            NodeKind::LogicalAnd { lhs, rhs } => {
                let (lhs, rhs) = (*lhs, *rhs);
                if !self.evaluate_condition(ast, lhs, frame)? {
                    return Ok(Value::Boolean(false));
                }
                Ok(Value::Boolean(self.evaluate_condition(ast, rhs, frame)?))
            }
            NodeKind::LogicalOr { lhs, rhs } => {
                let (lhs, rhs) = (*lhs, *rhs);
                if self.evaluate_condition(ast, lhs, frame)? {
                    return Ok(Value::Boolean(true));
                }
                Ok(Value::Boolean(self.evaluate_condition(ast, rhs, frame)?))
            }
            NodeKind::Call { callee, arguments } => {
                let (callee, arguments) = (*callee, arguments.clone());
                let callee_value = self.evaluate(ast, callee, frame)?;
                let mut args = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    args.push(self.evaluate(ast, argument, frame)?);
                }
                match callee_value {
                    Value::Function(name) => self.invoke(&name, args),
                    other => Err(RuntimeError::TypeMismatch {
                        message: format!("{} is not callable", other.type_name()),
                    }),
                }
            }
            NodeKind::ReadProperty { receiver, name } => {
                let (receiver, name) = (*receiver, *name);
                let object = self.evaluate_object(ast, receiver, frame)?;
                let key = self.evaluate_property_key(ast, name, frame)?;
                object
                    .get(&key)
                    .ok_or(RuntimeError::UndefinedProperty { name: key })
            }
            NodeKind::WriteProperty {
                receiver,
                name,
                value,
            } => {
                let (receiver, name, value) = (*receiver, *name, *value);
                let object = self.evaluate_object(ast, receiver, frame)?;
                let key = self.evaluate_property_key(ast, name, frame)?;
                let result = self.evaluate(ast, value, frame)?;
                object.set(key, result.clone());
                Ok(result)
            }
            NodeKind::Block { .. }
            | NodeKind::FunctionBody { .. }
            | NodeKind::If { .. }
            | NodeKind::While { .. }
            | NodeKind::Break
            | NodeKind::Continue
            | NodeKind::Return { .. }
            | NodeKind::Debugger => {
                unreachable!("statement nodes are executed, never evaluated")
            }
        }
    }

    fn evaluate_object(
        &mut self,
        ast: &Rc<Ast>,
        node: NodeId,
        frame: &mut Frame,
    ) -> RuntimeResult<ObjectValue> {
        match self.evaluate(ast, node, frame)? {
            Value::Object(object) => Ok(object),
            other => Err(RuntimeError::TypeMismatch {
                message: format!("{} has no properties", other.type_name()),
            }),
        }
    }

    fn evaluate_property_key(
        &mut self,
        ast: &Rc<Ast>,
        node: NodeId,
        frame: &mut Frame,
    ) -> RuntimeResult<String> {
        match self.evaluate(ast, node, frame)? {
            Value::Str(name) => Ok(name.to_string()),
            Value::Long(index) => Ok(index.to_string()),
            other => Err(RuntimeError::TypeMismatch {
                message: format!("{} cannot name a property", other.type_name()),
            }),
        }
    }

    fn halt(&mut self, ast: &Rc<Ast>, node: NodeId, frame: &mut Frame) {
        log::debug!("debugger halt at {:?}", ast.span(node));
        if let Some(listener) = self.listener.as_mut() {
            let scope = LexicalScope::locate(ast.as_ref(), node);
            listener.on_halt(&scope, frame);
        }
    }

    fn call_builtin(&mut self, builtin: Builtin, args: Vec<Value>) -> RuntimeResult<Value> {
        match builtin {
            Builtin::Println => {
                let value = argument(&args, 0);
                self.print_line(value.to_string());
                Ok(value)
            }
            Builtin::Readln => {
                let mut line = String::new();
                std::io::stdin()
                    .lock()
                    .read_line(&mut line)
                    .map_err(|err| RuntimeError::Input {
                        message: err.to_string(),
                    })?;
                while line.ends_with('\n') || line.ends_with('\r') {
                    line.pop();
                }
                Ok(Value::string(line))
            }
            Builtin::NanoTime => {
                let nanos = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|elapsed| elapsed.as_nanos() as i64)
                    .unwrap_or(0);
                Ok(Value::Long(nanos))
            }
            Builtin::NewObject => Ok(Value::Object(ObjectValue::new())),
            Builtin::TypeOf => Ok(Value::string(argument(&args, 0).type_name())),
            Builtin::IsNull => Ok(Value::Boolean(argument(&args, 0).is_null())),
            Builtin::GetSize => match argument(&args, 0) {
                Value::Str(text) => Ok(Value::Long(text.chars().count() as i64)),
                Value::Object(object) => Ok(Value::Long(object.len() as i64)),
                other => Err(RuntimeError::TypeMismatch {
                    message: format!("{} has no size", other.type_name()),
                }),
            },
            Builtin::HasSize => Ok(Value::Boolean(matches!(
                argument(&args, 0),
                Value::Str(_) | Value::Object(_)
            ))),
            Builtin::IsExecutable => Ok(Value::Boolean(matches!(
                argument(&args, 0),
                Value::Function(_)
            ))),
            Builtin::DefineFunction => match argument(&args, 0) {
                Value::Str(source) => match parse_source(&source) {
                    Ok(program) => {
                        self.install_program(&program);
                        Ok(Value::Null)
                    }
                    Err(errors) => Err(RuntimeError::Definition {
                        message: errors
                            .errors
                            .first()
                            .map(|err| err.message.clone())
                            .unwrap_or_else(|| "invalid source".to_string()),
                    }),
                },
                other => Err(RuntimeError::TypeMismatch {
                    message: format!("defineFunction expects a String, not {}", other.type_name()),
                }),
            },
        }
    }

    fn print_line(&mut self, text: String) {
        match self.captured.as_mut() {
            Some(buffer) => buffer.push(text),
            None => println!("{text}"),
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn argument(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Null)
}

fn apply_binary(op: BinaryOp, left: Value, right: Value) -> RuntimeResult<Value> {
    match op {
        BinaryOp::Add => match (&left, &right) {
            (Value::Str(_), _) | (_, Value::Str(_)) => {
                Ok(Value::string(format!("{left}{right}")))
            }
            (Value::Long(a), Value::Long(b)) => a
                .checked_add(*b)
                .map(Value::Long)
                .ok_or(RuntimeError::Overflow { operation: "+" }),
            _ => Err(type_mismatch(op, &left, &right)),
        },
        BinaryOp::Sub => long_binary(op, &left, &right, |a, b| {
            a.checked_sub(b).ok_or(RuntimeError::Overflow { operation: "-" })
        }),
        BinaryOp::Mul => long_binary(op, &left, &right, |a, b| {
            a.checked_mul(b).ok_or(RuntimeError::Overflow { operation: "*" })
        }),
        BinaryOp::Div => long_binary(op, &left, &right, |a, b| {
            if b == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            a.checked_div(b).ok_or(RuntimeError::Overflow { operation: "/" })
        }),
        BinaryOp::Lt => long_comparison(op, &left, &right, |a, b| a < b),
        BinaryOp::LtEq => long_comparison(op, &left, &right, |a, b| a <= b),
        BinaryOp::Gt => long_comparison(op, &left, &right, |a, b| a > b),
        BinaryOp::GtEq => long_comparison(op, &left, &right, |a, b| a >= b),
        BinaryOp::Eq => Ok(Value::Boolean(left.equals(&right))),
        BinaryOp::NotEq => Ok(Value::Boolean(!left.equals(&right))),
    }
}

fn long_binary(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    apply: impl Fn(i64, i64) -> RuntimeResult<i64>,
) -> RuntimeResult<Value> {
    match (left, right) {
        (Value::Long(a), Value::Long(b)) => apply(*a, *b).map(Value::Long),
        _ => Err(type_mismatch(op, left, right)),
    }
}

fn long_comparison(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    apply: impl Fn(i64, i64) -> bool,
) -> RuntimeResult<Value> {
    match (left, right) {
        (Value::Long(a), Value::Long(b)) => Ok(Value::Boolean(apply(*a, *b))),
        _ => Err(type_mismatch(op, left, right)),
    }
}

fn type_mismatch(op: BinaryOp, left: &Value, right: &Value) -> RuntimeError {
    RuntimeError::TypeMismatch {
        message: format!(
            "operation `{}` is not defined for {} and {}",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ),
    }
}
