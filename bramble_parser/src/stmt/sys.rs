//! SYS: operating-system service calls

use crate::context::Parser;
use crate::exp;
use crate::expr_parser;
use crate::type_if;
use crate::types::Type;
use bramble_common::config::SYS_MAX_ARGS;
use bramble_common::{Error, ErrorKind, Result};
use bramble_lexer::TokenKind;

/// `SYS id [, arg ...]`: the call id must be a constant; arguments are
/// integer expressions passed in order
pub fn sys_stmt(p: &mut Parser) -> Result<()> {
    p.advance()?;
    let pos = p.pos();

    if let TokenKind::Str(name) = &p.token().kind {
        // named calls would need an OS-specific table this layer does not have
        return Err(Error::new(ErrorKind::SysCallUnknown(name.clone()), pos));
    }

    let id = expr_parser::expression(p)?;
    let call_id = match &id.ty {
        Type::ConstInt => id.int_value()? as u32,
        _ => return Err(Error::new(ErrorKind::IntegerExpected, pos)),
    };

    let mut in_regs = Vec::new();
    while p.token().is_operator(",") {
        p.advance()?;
        if in_regs.len() == SYS_MAX_ARGS {
            return Err(Error::new(ErrorKind::SysTooManyArgs(SYS_MAX_ARGS), p.pos()));
        }
        let e = expr_parser::expression(p)?;
        if !e.ty.is_numeric() {
            return Err(Error::new(ErrorKind::SysBadArgs, e.pos));
        }
        let e = type_if::to_int32(p, e)?;
        let e = type_if::exp_to_var(p, e)?;
        in_regs.push(e.reg()?);
    }

    p.section().add_sys_call(call_id, in_regs, Vec::new(), None);
    exp::handle_errors(p)
}
