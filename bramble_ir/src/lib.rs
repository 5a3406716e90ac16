//! Typed three-address IR for the Bramble compiler
//!
//! The parser emits into [`Section`]s held by a [`Program`]; a back-end
//! consumes the finished program. Sections allocate virtual registers
//! monotonically in two banks (integer and floating) and support in-place
//! promotion of placeholder instructions, which is how argument coercions
//! and the lazy cleanup-counter initialisation are bound late.

pub mod instruction;
pub mod operand;
pub mod program;
pub mod section;
pub mod types;

pub use instruction::{CallInfo, CallKind, Instr, IrArg, Op, Opcode, CALLEE_UNRESOLVED};
pub use operand::{Operand, RegisterClass, REG_GLOBAL, REG_LOCAL, TEMP_START};
pub use program::Program;
pub use section::Section;
pub use types::{IrType, Param, TypeSignature};
