//! Error kinds shared by every phase of the front-end

use crate::position::Position;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Everything that can go wrong while compiling a program
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ErrorKind {
    #[error("Out of memory")]
    Oom,

    #[error("Expected {expected}, found '{found}'")]
    ExpectedToken { expected: String, found: String },

    #[error("Identifier expected, found '{0}'")]
    IdExpected(String),

    #[error("Keyword expected, found '{0}'")]
    KeywordExpected(String),

    #[error("Numeric expression expected")]
    NumericExpected,

    #[error("Integer expression expected")]
    IntegerExpected,

    #[error("String expression expected")]
    StringExpected,

    #[error("Unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("'{0}' is already defined")]
    AlreadyDefined(String),

    #[error("Unknown procedure '{0}'")]
    UnknownProcedure(String),

    #[error("Unknown function '{0}'")]
    UnknownFunction(String),

    #[error("'{0}' is a function, not a procedure")]
    ProcedureExpected(String),

    #[error("'{0}' is a procedure, not a function")]
    FunctionExpected(String),

    #[error("'{name}' expects {expected} arguments, {actual} given")]
    BadArgCount {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("Argument {arg} of '{name}': cannot pass {actual} where {expected} is required")]
    BadArgType {
        name: String,
        arg: usize,
        expected: String,
        actual: String,
    },

    #[error("Cannot convert {from} to {to}")]
    BadConversion { from: String, to: String },

    #[error("Cannot zero extend {0}")]
    BadZeroExtend(String),

    #[error("Malformed expression")]
    BadExpression,

    #[error("Assignment operator expected, found '{0}'")]
    AssignmentOpExpected(String),

    #[error("')' expected, found '{0}'")]
    RightBktExpected(String),

    #[error("Expression expected, found '{0}'")]
    ExpExpected(String),

    #[error("Bad DIM")]
    BadDim,

    #[error("Array index out of range")]
    BadIndex,

    #[error("Wrong number of indices: array has {expected}, {actual} given")]
    BadIndexCount { expected: usize, actual: usize },

    #[error("Too many dimensions (maximum {0})")]
    TooManyDims(usize),

    #[error("Array type mismatch")]
    ArrayTypeMismatch,

    #[error("DIM is not allowed inside a procedure or function")]
    DimInProc,

    #[error("Procedures cannot be nested")]
    NestedProcedure,

    #[error("'<-' is not allowed in the main program")]
    ReturnInMain,

    #[error("'<-' is not allowed in a procedure")]
    ReturnInProc,

    #[error("PROC is not allowed in the main program body")]
    ProcInMain,

    #[error("ENDPROC is not allowed inside a function")]
    ProcInFn,

    #[error("Operation '{op}' is not supported on {type_name}")]
    NotSupported { op: String, type_name: String },

    #[error("Statement has no effect")]
    UselessStatement,

    #[error("Division by zero")]
    DivideByZero,

    #[error("STEP of zero")]
    ZeroStep,

    #[error("Compound statement not terminated")]
    CompoundNotTerminated,

    #[error("Unknown SYS call '{0}'")]
    SysCallUnknown(String),

    #[error("Bad arguments to SYS call")]
    SysBadArgs,

    #[error("Too many arguments to SYS call (maximum {0})")]
    SysTooManyArgs(usize),

    #[error("Assertion failed: internal compiler error")]
    AssertionFailed,
}

/// A compile error: what went wrong and where it was first observed
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{kind} at {pos}")]
pub struct Error {
    pub kind: ErrorKind,
    pub pos: Position,
}

impl Error {
    pub fn new(kind: ErrorKind, pos: Position) -> Self {
        Self { kind, pos }
    }

    /// Shorthand for the invariant-violation error used when the compiler
    /// itself is at fault
    pub fn assertion_failed(pos: Position) -> Self {
        Self::new(ErrorKind::AssertionFailed, pos)
    }

    /// An invariant violation with no useful source location
    pub fn internal() -> Self {
        Self::assertion_failed(Position::none())
    }

    pub fn not_supported(op: &str, type_name: impl Into<String>, pos: Position) -> Self {
        Self::new(
            ErrorKind::NotSupported {
                op: op.to_string(),
                type_name: type_name.into(),
            },
            pos,
        )
    }
}

/// Result type used throughout the front-end
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_display() {
        let err = Error::new(
            ErrorKind::UnknownVariable("counter%".to_string()),
            Position::new(12, 3),
        );
        assert_eq!(err.to_string(), "Unknown variable 'counter%' at 12:3");
    }

    #[test]
    fn test_not_supported_display() {
        let err = Error::not_supported("append", "integer", Position::start());
        assert_eq!(
            err.to_string(),
            "Operation 'append' is not supported on integer at 1:1"
        );
    }
}
