//! DEF PROC and DEF FN

use super::{end_function, statement};
use crate::context::Parser;
use crate::expr_parser;
use crate::reference;
use crate::symbol::SymbolTable;
use crate::type_if;
use crate::types::Type;
use bramble_common::{Error, ErrorKind, Result};
use bramble_ir::{Operand, Param, TypeSignature};
use bramble_lexer::{IdentType, Keyword, TokenKind};

fn param_type(id_type: IdentType, pos: bramble_common::Position) -> Result<Type> {
    match id_type {
        IdentType::Int => Ok(Type::Int),
        IdentType::Real => Ok(Type::Real),
        IdentType::Str => Ok(Type::Str),
        IdentType::Byte => Err(Error::not_supported("byte parameter", "byte", pos)),
    }
}

fn return_type(id_type: Option<IdentType>, pos: bramble_common::Position) -> Result<Type> {
    match id_type {
        Some(IdentType::Int) => Ok(Type::Int),
        Some(IdentType::Real) | None => Ok(Type::Real),
        Some(IdentType::Byte) => Ok(Type::Byte),
        Some(IdentType::Str) => Err(Error::not_supported(
            "string-returning function",
            "string",
            pos,
        )),
    }
}

/// `DEF PROCname(params) ... ENDPROC` and
/// `DEF FNname(params) = expr` / `DEF FNname(params) ... <- expr`
pub fn def_stmt(p: &mut Parser) -> Result<()> {
    let pos = p.pos();
    p.advance()?;
    if p.in_proc {
        return Err(Error::new(ErrorKind::NestedProcedure, pos));
    }

    let (keyword, id_type) = match &p.token().kind {
        TokenKind::Keyword { keyword, id_type } if matches!(keyword, Keyword::Proc | Keyword::Fn) => {
            (*keyword, *id_type)
        }
        _ => {
            return Err(Error::new(
                ErrorKind::IdExpected(p.token().lexeme.clone()),
                p.pos(),
            ))
        }
    };
    let name = p.token().lexeme.clone();
    let def_pos = p.pos();
    p.advance()?;

    let ret = match keyword {
        Keyword::Fn => Some(return_type(id_type, def_pos)?),
        _ => None,
    };

    // parameter list
    let mut params: Vec<(String, Type)> = Vec::new();
    if p.token().is_operator("(") {
        p.advance()?;
        if p.token().is_operator(")") {
            p.advance()?;
        } else {
            loop {
                let TokenKind::Identifier {
                    name: param_name,
                    id_type,
                } = p.token().kind.clone()
                else {
                    return Err(Error::new(
                        ErrorKind::IdExpected(p.token().lexeme.clone()),
                        p.pos(),
                    ));
                };
                let ty = param_type(id_type, p.pos())?;
                params.push((param_name, ty));
                p.advance()?;
                if p.token().is_operator(",") {
                    p.advance()?;
                    continue;
                }
                if p.token().is_operator(")") {
                    p.advance()?;
                    break;
                }
                return Err(Error::new(
                    ErrorKind::RightBktExpected(p.token().lexeme.clone()),
                    p.pos(),
                ));
            }
        }
    }

    let sig = TypeSignature::new(
        ret.as_ref().map(|t| t.to_ir_type()).unwrap_or(bramble_ir::IrType::Void),
        params
            .iter()
            .map(|(name, ty)| Param {
                name: name.clone(),
                ty: ty.to_ir_type(),
            })
            .collect(),
    );
    let index = p.prog.section_new(&name, Some(sig), def_pos)?;

    let saved_section = p.current_index();
    p.set_current(index);
    p.st = SymbolTable::new();
    p.in_proc = true;
    p.fn_ret = ret.clone();
    p.reserve_cleanup_nop();

    let body = parse_body(p, keyword, &name, &params, &ret);

    // restore the context even when the body failed to parse
    p.set_current(saved_section);
    p.st = SymbolTable::new();
    p.in_proc = false;
    p.fn_ret = None;
    body
}

fn parse_body(
    p: &mut Parser,
    keyword: Keyword,
    _name: &str,
    params: &[(String, Type)],
    ret: &Option<Type>,
) -> Result<()> {
    bind_params(p, params)?;

    match keyword {
        Keyword::Fn => fn_body(p, ret),
        _ => proc_body(p, ret),
    }
}

/// Scalar parameters stay in their entry registers; reference parameters
/// arrive as header pointers and are copied into the callee's frame so the
/// callee owns a counted reference.
fn bind_params(p: &mut Parser, params: &[(String, Type)]) -> Result<()> {
    let entry_regs = p.section_ref().param_regs();
    for ((name, ty), entry) in params.iter().zip(entry_regs) {
        let pos = p.pos();
        let reg = match entry {
            Operand::Reg(reg) | Operand::Freg(reg) => reg,
            _ => return Err(Error::internal()),
        };
        if ty.is_reference() {
            let symbol = p.st.insert(name, ty.clone(), pos)?;
            let loc = symbol.offset()?;
            reference::copy_ref(p, bramble_ir::REG_LOCAL, loc, reg)?;
        } else {
            p.st.insert_reg(name, ty.clone(), reg, pos)?;
        }
    }
    Ok(())
}

fn assign_return(p: &mut Parser, ret: &Option<Type>) -> Result<()> {
    let ret_ty = ret.clone().ok_or_else(Error::internal)?;
    let e = expr_parser::expression(p)?;
    let e = type_if::coerce(p, e, &ret_ty)?;
    let e = type_if::exp_to_var(p, e)?;
    let ret_reg = p.section_ref().ret_reg;
    type_if::assign_reg(p, ret_reg, e)
}

fn fn_body(p: &mut Parser, ret: &Option<Type>) -> Result<()> {
    // single-line form: DEF FNf(x) = expr
    if p.token().is_operator("=") {
        p.advance()?;
        assign_return(p, ret)?;
        return end_function(p, ret.as_ref());
    }

    loop {
        p.skip_separators()?;
        if p.at_eof() {
            return Err(Error::new(ErrorKind::CompoundNotTerminated, p.pos()));
        }
        if p.token().is_operator("<-") {
            p.advance()?;
            assign_return(p, ret)?;
            return end_function(p, ret.as_ref());
        }
        if p.token().is_keyword(Keyword::EndProc) {
            return Err(Error::new(ErrorKind::ProcInFn, p.pos()));
        }
        statement(p)?;
    }
}

fn proc_body(p: &mut Parser, ret: &Option<Type>) -> Result<()> {
    loop {
        p.skip_separators()?;
        if p.at_eof() {
            return Err(Error::new(ErrorKind::CompoundNotTerminated, p.pos()));
        }
        if p.token().is_keyword(Keyword::EndProc) {
            p.advance()?;
            return end_function(p, ret.as_ref());
        }
        if p.token().is_operator("<-") {
            return Err(Error::new(ErrorKind::ReturnInProc, p.pos()));
        }
        statement(p)?;
    }
}
