//! Runtime errors for the interpreter

use std::fmt;

use crate::runtime::Fault;

/// Runtime error raised by an operator or a constructor
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
}

/// Kinds of runtime errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operand or argument of the wrong type
    TypeError,
    /// Right type, unacceptable value
    ValueError,
    /// Division or modulo by zero
    ZeroDivision,
    /// Integer result out of range
    Overflow,
    /// Argument count mismatch
    ArityMismatch,
    /// Class cannot be constructed at all
    NotInstantiable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::TypeError => "TypeError",
            ErrorKind::ValueError => "ValueError",
            ErrorKind::ZeroDivision => "ZeroDivisionError",
            ErrorKind::Overflow => "OverflowError",
            ErrorKind::ArityMismatch => "TypeError",
            ErrorKind::NotInstantiable => "TypeError",
        };
        f.write_str(name)
    }
}

impl RuntimeError {
    pub fn type_error(expected: &str, got: &str) -> Self {
        RuntimeError {
            kind: ErrorKind::TypeError,
            message: format!("expected {expected}, got {got}"),
        }
    }

    pub fn unsupported_operands(op: &str, left: &str, right: &str) -> Self {
        RuntimeError {
            kind: ErrorKind::TypeError,
            message: format!("unsupported operand type(s) for {op}: '{left}' and '{right}'"),
        }
    }

    pub fn not_orderable(op: &str, left: &str, right: &str) -> Self {
        RuntimeError {
            kind: ErrorKind::TypeError,
            message: format!("'{op}' not supported between instances of '{left}' and '{right}'"),
        }
    }

    pub fn bad_operand(op: &str, operand: &str) -> Self {
        RuntimeError {
            kind: ErrorKind::TypeError,
            message: format!("bad operand type for unary {op}: '{operand}'"),
        }
    }

    pub fn value_error(msg: impl Into<String>) -> Self {
        RuntimeError {
            kind: ErrorKind::ValueError,
            message: msg.into(),
        }
    }

    pub fn division_by_zero() -> Self {
        RuntimeError {
            kind: ErrorKind::ZeroDivision,
            message: "division by zero".to_string(),
        }
    }

    pub fn overflow(what: &str) -> Self {
        RuntimeError {
            kind: ErrorKind::Overflow,
            message: format!("{what} out of range"),
        }
    }

    pub fn arity_mismatch(name: &str, expected: &str, got: usize) -> Self {
        RuntimeError {
            kind: ErrorKind::ArityMismatch,
            message: format!("{name}() takes {expected} argument(s) ({got} given)"),
        }
    }

    pub fn not_instantiable(name: &str) -> Self {
        RuntimeError {
            kind: ErrorKind::NotInstantiable,
            message: format!("cannot create '{name}' instances"),
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for RuntimeError {}

impl From<RuntimeError> for Fault {
    fn from(err: RuntimeError) -> Self {
        Fault::Raised(err.to_string())
    }
}

/// Result type for interpreter operations
pub type InterpResult<T> = Result<T, RuntimeError>;
