use thiserror::Error;

/// Everything the evaluator can trip over at run time. None of these abort a
/// program: the interpreter logs the first one per run and substitutes null.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Variable '{name}' is not defined")]
    UndefinedVariable { name: String },

    #[error("Undefined function: '{name}'")]
    UndefinedFunction { name: String },

    #[error("Method '{method}' not found in class '{class_name}'")]
    UnknownMethod { class_name: String, method: String },

    #[error("Class '{name}' not defined")]
    UndefinedClass { name: String },

    #[error("Attribute '{attribute}' not found on object")]
    UnknownAttribute { attribute: String },

    #[error("Attribute '{attribute}' has null value")]
    NullAttribute { attribute: String },

    #[error("{message}")]
    TypeMismatch { message: String },

    #[error("{operation} by zero")]
    DivisionByZero { operation: &'static str },

    #[error("Integer overflow in operation '{operation}'")]
    IntegerOverflow { operation: &'static str },

    #[error("Index {index} out of range for tuple of length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("Function '{name}' expects {expected} arguments, got {found}")]
    FunctionArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("Method '{method}' expects {expected} arguments, got {found}")]
    MethodArityMismatch {
        method: String,
        expected: usize,
        found: usize,
    },

    #[error("String interpolation error: undefined variable '{name}'")]
    InterpolationUndefined { name: String },

    #[error("Input interrupted by user")]
    InterruptedInput,

    #[error("Failed to read input: {message}")]
    InputFailed { message: String },

    #[error("Native library not loaded")]
    NativeUnavailable,

    #[error("Failed to initialize rendering context")]
    NativeInitFailed,

    #[error("{name} expects {signature}")]
    NativeSignature {
        name: String,
        signature: &'static str,
    },

    #[error("{message}")]
    InvalidStatement { message: String },
}
