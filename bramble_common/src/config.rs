//! Compile-time limits and well-known runtime error codes

/// Maximum number of array dimensions
pub const MAX_DIMS: usize = 10;

/// Maximum number of arguments accepted by the SYS statement
pub const SYS_MAX_ARGS: usize = 10;

/// Runtime error code written to `err` when an array access is out of range
/// or a DIM request is malformed
pub const ERR_CODE_BAD_DIM: i32 = 10;

/// Runtime error code for heap exhaustion
pub const ERR_CODE_OOM: i32 = 11;

/// Runtime error code for division by zero
pub const ERR_CODE_DIV_BY_ZERO: i32 = 18;

/// Runtime error code for a numeric conversion that overflows
pub const ERR_CODE_NUMBER_TOO_BIG: i32 = 20;

/// Name of the hidden integer variable holding the last runtime error code
pub const ERR_HIDDEN_VAR: &str = "__err";

/// Name of the hidden integer variable flagging an unhandled runtime error
pub const EFLAG_HIDDEN_VAR: &str = "__eflag";
