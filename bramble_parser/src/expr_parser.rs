//! The expression parser
//!
//! Precedence, highest first: primaries (literals, brackets, identifiers,
//! unary minus, NOT, builtin functions, FN calls), then `^`, then
//! `* / MOD DIV`, then `+ -`, then the comparisons and shifts, then AND,
//! then OR and EOR. All levels associate left except `^`, which recurses
//! right. Folding happens for free: const-tagged operands stay const until
//! an operator with a non-const partner materialises them.

use crate::context::Parser;
use crate::exp::Exp;
use crate::parser_call;
use crate::symbol::{Storage, Symbol};
use crate::type_if;
use crate::types::Type;
use bramble_common::{Error, ErrorKind, Position, Result};
use bramble_ir::{Opcode, Operand, RegisterClass, REG_GLOBAL};
use bramble_lexer::{Keyword, TokenKind};

/// Parse a full expression
pub fn expression(p: &mut Parser) -> Result<Exp> {
    parse_or(p)
}

/// Parse an expression and coerce it to an integer register
pub fn int_var_expression(p: &mut Parser) -> Result<Exp> {
    let e = expression(p)?;
    let e = type_if::to_int32(p, e)?;
    type_if::exp_to_var(p, e)
}

/// Parse a bracketed expression coerced to a real register
pub fn real_bracketed_exp(p: &mut Parser) -> Result<Exp> {
    let e = bracketed_exp(p)?;
    let e = type_if::to_float64(p, e)?;
    type_if::exp_to_var(p, e)
}

/// Parse a bracketed expression coerced to an integer register
pub fn integer_bracketed_exp(p: &mut Parser) -> Result<Exp> {
    let e = bracketed_exp(p)?;
    let e = type_if::to_int32(p, e)?;
    type_if::exp_to_var(p, e)
}

fn bracketed_exp(p: &mut Parser) -> Result<Exp> {
    p.expect_operator("(")?;
    let e = expression(p)?;
    if !p.token().is_operator(")") {
        return Err(Error::new(
            ErrorKind::RightBktExpected(p.token().lexeme.clone()),
            p.pos(),
        ));
    }
    p.advance()?;
    Ok(e)
}

fn parse_or(p: &mut Parser) -> Result<Exp> {
    let mut e = parse_and(p)?;
    loop {
        if p.token().is_keyword(Keyword::Or) {
            p.advance()?;
            let rhs = parse_and(p)?;
            e = type_if::or(p, e, rhs)?;
        } else if p.token().is_keyword(Keyword::Eor) {
            p.advance()?;
            let rhs = parse_and(p)?;
            e = type_if::eor(p, e, rhs)?;
        } else {
            return Ok(e);
        }
    }
}

fn parse_and(p: &mut Parser) -> Result<Exp> {
    let mut e = parse_comparison(p)?;
    while p.token().is_keyword(Keyword::And) {
        p.advance()?;
        let rhs = parse_comparison(p)?;
        e = type_if::and(p, e, rhs)?;
    }
    Ok(e)
}

fn parse_comparison(p: &mut Parser) -> Result<Exp> {
    let mut e = parse_additive(p)?;
    loop {
        let op = match &p.token().kind {
            TokenKind::Operator(op)
                if matches!(
                    op.as_str(),
                    "=" | "<>" | ">" | "<=" | "<" | ">=" | "<<" | ">>" | ">>>"
                ) =>
            {
                op.clone()
            }
            _ => return Ok(e),
        };
        p.advance()?;
        let rhs = parse_additive(p)?;
        e = match op.as_str() {
            "=" => type_if::eq(p, e, rhs)?,
            "<>" => type_if::neq(p, e, rhs)?,
            ">" => type_if::gt(p, e, rhs)?,
            "<=" => type_if::lte(p, e, rhs)?,
            "<" => type_if::lt(p, e, rhs)?,
            ">=" => type_if::gte(p, e, rhs)?,
            "<<" => type_if::lsl(p, e, rhs)?,
            ">>" => type_if::lsr(p, e, rhs)?,
            _ => type_if::asr(p, e, rhs)?,
        };
    }
}

fn parse_additive(p: &mut Parser) -> Result<Exp> {
    let mut e = parse_multiplicative(p)?;
    loop {
        if p.token().is_operator("+") {
            p.advance()?;
            let rhs = parse_multiplicative(p)?;
            e = type_if::add(p, e, rhs)?;
        } else if p.token().is_operator("-") {
            p.advance()?;
            let rhs = parse_multiplicative(p)?;
            e = type_if::sub(p, e, rhs)?;
        } else {
            return Ok(e);
        }
    }
}

fn parse_multiplicative(p: &mut Parser) -> Result<Exp> {
    let mut e = parse_power(p)?;
    loop {
        if p.token().is_operator("*") {
            p.advance()?;
            let rhs = parse_power(p)?;
            e = type_if::mul(p, e, rhs)?;
        } else if p.token().is_operator("/") {
            p.advance()?;
            let rhs = parse_power(p)?;
            e = type_if::divide(p, e, rhs)?;
        } else if p.token().is_keyword(Keyword::Mod) {
            p.advance()?;
            let rhs = parse_power(p)?;
            e = type_if::modulo(p, e, rhs)?;
        } else if p.token().is_keyword(Keyword::Div) {
            p.advance()?;
            let rhs = parse_power(p)?;
            e = type_if::div(p, e, rhs)?;
        } else {
            return Ok(e);
        }
    }
}

fn parse_power(p: &mut Parser) -> Result<Exp> {
    let e = parse_unary(p)?;
    if p.token().is_operator("^") {
        p.advance()?;
        let rhs = parse_power(p)?;
        return type_if::pow(p, e, rhs);
    }
    Ok(e)
}

fn parse_unary(p: &mut Parser) -> Result<Exp> {
    let pos = p.pos();
    match p.token().kind.clone() {
        TokenKind::Integer(value) => {
            p.advance()?;
            Ok(Exp::int_const(value, pos))
        }
        TokenKind::Real(value) => {
            p.advance()?;
            Ok(Exp::real_const(value, pos))
        }
        TokenKind::Str(value) => {
            p.advance()?;
            Ok(Exp::str_const(value.into_bytes(), pos))
        }
        TokenKind::Operator(op) if op == "(" => bracketed_exp(p),
        TokenKind::Operator(op) if op == "-" => {
            p.advance()?;
            let e = parse_unary(p)?;
            type_if::unary_minus(p, e)
        }
        TokenKind::Keyword { keyword, .. } => match keyword {
            Keyword::Not => {
                p.advance()?;
                let e = parse_unary(p)?;
                type_if::not(p, e)
            }
            Keyword::True => {
                p.advance()?;
                Ok(Exp::int_const(-1, pos))
            }
            Keyword::False => {
                p.advance()?;
                Ok(Exp::int_const(0, pos))
            }
            Keyword::Err => {
                p.advance()?;
                let offset = p.prog.error_offset;
                let reg = p.section().add_instr(
                    Opcode::LoadoI32,
                    Operand::Reg(REG_GLOBAL),
                    Operand::I32(offset),
                )?;
                Ok(Exp::int_var(reg, pos))
            }
            Keyword::Abs => {
                p.advance()?;
                let e = parse_unary(p)?;
                type_if::abs(p, e)
            }
            Keyword::Sgn => {
                p.advance()?;
                let e = parse_unary(p)?;
                type_if::sgn(p, e)
            }
            Keyword::Fn => parser_call::fn_call(p),
            _ => Err(Error::new(
                ErrorKind::ExpExpected(p.token().lexeme.clone()),
                pos,
            )),
        },
        TokenKind::Identifier { name, .. } => {
            p.advance()?;
            variable_reference(p, &name, pos)
        }
        _ => Err(Error::new(
            ErrorKind::ExpExpected(p.token().lexeme.clone()),
            pos,
        )),
    }
}

/// Resolve the frame base and offset a memory-backed symbol lives at, or
/// the pointer register a reference parameter arrived in
pub fn symbol_base(symbol: &Symbol, frame_base: u32) -> Result<(u32, u32)> {
    match &symbol.storage {
        Storage::Memory(offset) => Ok((frame_base, *offset)),
        Storage::Register(reg) => Ok((*reg, 0)),
    }
}

fn variable_reference(p: &mut Parser, name: &str, pos: Position) -> Result<Exp> {
    let (symbol, frame_base) = p
        .lookup_var(name)
        .ok_or_else(|| Error::new(ErrorKind::UnknownVariable(name.to_string()), pos))?;

    // indexed collection access; an empty bracket pair names the whole
    // collection
    if p.token().is_operator("(") || p.token().is_operator("{") {
        if symbol.ty.is_collection() {
            let close = if p.token().is_operator("(") { ")" } else { "}" };
            p.advance()?;
            let (base, loc) = symbol_base(&symbol, frame_base)?;
            if p.token().is_operator(close) {
                p.advance()?;
                return type_if::load_mem(p, &symbol.ty, base, loc, pos);
            }
            let indices = parse_indices(p, close)?;
            return type_if::indexed_read(p, &symbol.ty, base, loc, indices, pos);
        }
        return Err(Error::new(ErrorKind::BadIndex, pos));
    }

    // record field path
    if p.token().is_operator(".") {
        let (base, loc, field_ty) = field_path(p, &symbol, frame_base)?;
        return type_if::load_mem(p, &field_ty, base, loc, pos);
    }

    match &symbol.storage {
        Storage::Register(reg) => match symbol.ty.to_ir_type().register_class() {
            Some(RegisterClass::Real) => Ok(Exp::var(symbol.ty, Operand::Freg(*reg), pos)),
            _ => Ok(Exp::var(symbol.ty, Operand::Reg(*reg), pos)),
        },
        Storage::Memory(offset) => type_if::load_mem(p, &symbol.ty, frame_base, *offset, pos),
    }
}

/// Parse a comma-separated index list up to `close`; the opening bracket
/// has already been consumed
pub fn parse_indices(p: &mut Parser, close: &str) -> Result<Vec<Exp>> {
    let mut indices = Vec::new();
    loop {
        indices.push(expression(p)?);
        if p.token().is_operator(",") {
            p.advance()?;
            continue;
        }
        if p.token().is_operator(close) {
            p.advance()?;
            return Ok(indices);
        }
        return Err(Error::new(
            ErrorKind::ExpectedToken {
                expected: format!("'{}'", close),
                found: p.token().lexeme.clone(),
            },
            p.pos(),
        ));
    }
}

/// Walk a `.field[.field...]` path from a record symbol, returning the
/// frame base, the resolved offset and the final field's type
pub fn field_path(p: &mut Parser, symbol: &Symbol, frame_base: u32) -> Result<(u32, u32, Type)> {
    let (base, mut loc) = symbol_base(symbol, frame_base)?;
    let mut ty = symbol.ty.clone();

    while p.token().is_operator(".") {
        let Type::Rec(rec) = &ty else {
            return Err(Error::new(
                ErrorKind::IdExpected(p.token().lexeme.clone()),
                p.pos(),
            ));
        };
        p.advance()?;
        let TokenKind::Identifier { name, .. } = p.token().kind.clone() else {
            return Err(Error::new(
                ErrorKind::IdExpected(p.token().lexeme.clone()),
                p.pos(),
            ));
        };
        let (field_offset, field_ty) = match rec.field(&name) {
            Some(field) => (field.offset, field.ty.clone()),
            None => {
                return Err(Error::new(ErrorKind::UnknownVariable(name.clone()), p.pos()))
            }
        };
        loc += field_offset;
        ty = field_ty;
        p.advance()?;
    }

    Ok((base, loc, ty))
}
