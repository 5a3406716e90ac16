//! Call-site parsing for FN and PROC invocations
//!
//! Arguments are materialised into registers, each behind a placeholder the
//! resolver may later promote to a coercion, and the call is recorded for
//! the post-parse resolution pass.

use crate::context::Parser;
use crate::exp::{self, Exp};
use crate::expr_parser;
use crate::type_if;
use crate::types::Type;
use bramble_common::{Error, ErrorKind, Position, Result};
use bramble_ir::{IrArg, RegisterClass};
use bramble_lexer::{IdentType, Keyword, TokenKind};

fn return_type(id_type: Option<IdentType>, pos: Position) -> Result<Type> {
    match id_type {
        Some(IdentType::Int) => Ok(Type::Int),
        Some(IdentType::Real) | None => Ok(Type::Real),
        Some(IdentType::Byte) => Ok(Type::Byte),
        Some(IdentType::Str) => Err(Error::not_supported("string-returning function", "string", pos)),
    }
}

/// Parse the argument list, materialising each argument behind its own
/// placeholder. Returns the emitted argument records and their types.
fn arguments(p: &mut Parser) -> Result<(Vec<IrArg>, Vec<Type>)> {
    let mut args = Vec::new();
    let mut arg_types = Vec::new();

    if !p.token().is_operator("(") {
        return Ok((args, arg_types));
    }
    p.advance()?;
    if p.token().is_operator(")") {
        p.advance()?;
        return Ok((args, arg_types));
    }

    loop {
        let e = expr_parser::expression(p)?;
        // bytes travel as full integers in the calling convention
        let e = if matches!(e.ty, Type::Byte) {
            type_if::to_int32(p, e)?
        } else {
            e
        };
        let e = type_if::exp_to_var(p, e)?;
        let class = match &e.kind {
            crate::exp::ExpKind::Var(bramble_ir::Operand::Freg(_)) => RegisterClass::Real,
            _ => RegisterClass::Integer,
        };
        let reg = e.reg()?;
        let nop = p.section().add_nop();
        args.push(IrArg { class, reg, nop });
        arg_types.push(e.ty.runtime_type());

        if p.token().is_operator(",") {
            p.advance()?;
            continue;
        }
        if p.token().is_operator(")") {
            p.advance()?;
            return Ok((args, arg_types));
        }
        return Err(Error::new(
            ErrorKind::RightBktExpected(p.token().lexeme.clone()),
            p.pos(),
        ));
    }
}

/// Parse `FNname(args)` in expression context
pub fn fn_call(p: &mut Parser) -> Result<Exp> {
    let pos = p.pos();
    let TokenKind::Keyword {
        keyword: Keyword::Fn,
        id_type,
    } = p.token().kind.clone()
    else {
        return Err(Error::assertion_failed(pos));
    };
    let name = p.token().lexeme.clone();
    p.advance()?;

    let ret = return_type(id_type, pos)?;
    let (args, arg_types) = arguments(p)?;
    exp::add_call(p, name, arg_types, args, &ret, pos)?.ok_or_else(Error::internal)
}

/// Parse `PROCname(args)` in statement context
pub fn proc_call(p: &mut Parser) -> Result<()> {
    let pos = p.pos();
    let name = p.token().lexeme.clone();
    p.advance()?;

    let (args, arg_types) = arguments(p)?;
    exp::add_call(p, name, arg_types, args, &Type::Void, pos)?;
    Ok(())
}
