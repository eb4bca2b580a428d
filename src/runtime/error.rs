use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Undefined function `{name}`")]
    UndefinedFunction { name: String },
    #[error("Undefined property `{name}`")]
    UndefinedProperty { name: String },
    #[error("Type mismatch: {message}")]
    TypeMismatch { message: String },
    #[error("Integer overflow in `{operation}`")]
    Overflow { operation: &'static str },
    #[error("Division by zero")]
    DivisionByZero,
    #[error("`{statement}` escaped the enclosing function body")]
    LoopEscape { statement: &'static str },
    #[error("Call depth limit of {limit} exceeded")]
    CallDepthExceeded { limit: usize },
    #[error("No binding named `{name}` in this scope")]
    UnknownBinding { name: String },
    #[error("Scope is not paused on a live activation record; variables cannot be written")]
    UnsupportedMutation,
    #[error("Cannot define functions from this source: {message}")]
    Definition { message: String },
    #[error("I/O failure while reading input: {message}")]
    Input { message: String },
}
