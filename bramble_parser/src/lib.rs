//! The Bramble front-end
//!
//! Reads BASIC source text and emits a typed three-address IR program for a
//! separate back-end. The expression engine dispatches every operation
//! through per-type implementations, heap values are reference counted
//! through a per-function cleanup stack, and calls are bound to their
//! sections by a resolution pass after parsing.

pub mod array;
pub mod builtins;
pub mod call;
pub mod context;
pub mod exp;
pub mod expr_parser;
pub mod parser_call;
pub mod rec;
pub mod reference;
pub mod stmt;
pub mod symbol;
pub mod type_if;
pub mod types;

use bramble_common::Result;
use bramble_ir::Program;
use log::debug;

pub use context::Parser;
pub use exp::Exp;
pub use types::{ArrayType, RecType, Type};

/// Compile a source stream into an IR program.
///
/// Drives the statement loop over the whole input, closes the main section,
/// then resolves every recorded call against the completed section table
/// and prunes the placeholders that were never promoted.
pub fn parse_program(source: &str, stream_name: &str) -> Result<Program> {
    let mut p = Parser::new(source, stream_name)?;

    loop {
        p.skip_separators()?;
        if p.at_eof() {
            break;
        }
        stmt::statement(&mut p)?;
    }

    stmt::end_main(&mut p)?;
    p.seal_globals();

    debug!("resolving {} calls", p.calls.len());
    let calls = std::mem::take(&mut p.calls);
    call::resolve_calls(&mut p.prog, &calls)?;
    p.prog.prune_nops();
    p.prog.validate()?;

    Ok(p.prog)
}
