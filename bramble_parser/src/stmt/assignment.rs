//! Assignment statements: `=`, `+=`, `-=` over scalars, collections,
//! elements and record fields, plus SWAP and APPEND

use crate::context::Parser;
use crate::exp::{Exp, ExpKind};
use crate::expr_parser;
use crate::reference;
use crate::symbol::{Storage, Symbol};
use crate::type_if;
use crate::types::Type;
use bramble_common::{Error, ErrorKind, Position, Result};
use bramble_lexer::{IdentType, TokenKind};

fn sigil_type(id_type: IdentType) -> Type {
    match id_type {
        IdentType::Int => Type::Int,
        IdentType::Real => Type::Real,
        IdentType::Str => Type::Str,
        IdentType::Byte => Type::Byte,
    }
}

fn assignment_op(p: &mut Parser) -> Result<String> {
    match &p.token().kind {
        TokenKind::Operator(op) if matches!(op.as_str(), "=" | "+=" | "-=") => {
            let op = op.clone();
            p.advance()?;
            Ok(op)
        }
        _ => Err(Error::new(
            ErrorKind::AssignmentOpExpected(p.token().lexeme.clone()),
            p.pos(),
        )),
    }
}

pub fn assignment(p: &mut Parser) -> Result<()> {
    let pos = p.pos();
    let TokenKind::Identifier { name, id_type } = p.token().kind.clone() else {
        return Err(Error::new(
            ErrorKind::IdExpected(p.token().lexeme.clone()),
            pos,
        ));
    };
    p.advance()?;

    if p.token().is_operator("(") || p.token().is_operator("{") {
        return collection_assignment(p, &name, pos);
    }
    if p.token().is_operator(".") {
        return field_assignment(p, &name, pos);
    }
    scalar_assignment(p, &name, id_type, pos)
}

fn scalar_assignment(p: &mut Parser, name: &str, id_type: IdentType, pos: Position) -> Result<()> {
    let op = assignment_op(p)?;
    let e = expr_parser::expression(p)?;

    match p.lookup_var(name) {
        Some((symbol, base)) => match op.as_str() {
            "=" => assign_existing(p, &symbol, base, e),
            "+=" => modify_existing(p, &symbol, base, e, false),
            _ => modify_existing(p, &symbol, base, e, true),
        },
        None => {
            if op != "=" || p.in_proc {
                return Err(Error::new(ErrorKind::UnknownVariable(name.to_string()), pos));
            }
            // an unsigiled name takes a record type from its initialiser
            if let (IdentType::Real, Type::Rec(rec)) = (id_type, &e.ty) {
                let rec = rec.clone();
                let ty = Type::Rec(rec.clone());
                let (symbol, base) = p.create_global(name, ty, pos)?;
                let loc = symbol.offset()?;
                if rec.has_references() {
                    p.rec_globals.push((loc, rec));
                }
                return type_if::assign_new_mem(p, base, loc, e);
            }
            let ty = sigil_type(id_type);
            // a literal creating a string initialises its heap copy in
            // place, reference count one
            if ty == Type::Str {
                if let ExpKind::StrConst(bytes) = &e.kind {
                    let bytes = bytes.clone();
                    let (symbol, base) = p.create_global(name, ty, pos)?;
                    let loc = symbol.offset()?;
                    return type_if::init_var_from_const(p, base, loc, &bytes);
                }
            }
            let e = type_if::coerce(p, e, &ty)?;
            let (symbol, base) = p.create_global(name, ty, pos)?;
            let loc = symbol.offset()?;
            type_if::assign_new_mem(p, base, loc, e)
        }
    }
}

fn assign_existing(p: &mut Parser, symbol: &Symbol, base: u32, e: Exp) -> Result<()> {
    let e = type_if::coerce(p, e, &symbol.ty)?;
    match &symbol.storage {
        Storage::Register(reg) => {
            let e = type_if::exp_to_var(p, e)?;
            type_if::assign_reg(p, *reg, e)
        }
        Storage::Memory(offset) => {
            let e = type_if::exp_to_var(p, e)?;
            type_if::assign_mem(p, base, *offset, e)
        }
    }
}

fn modify_existing(
    p: &mut Parser,
    symbol: &Symbol,
    base: u32,
    e: Exp,
    subtract: bool,
) -> Result<()> {
    let pos = e.pos;

    // string and vector += are the append operation
    if !subtract && matches!(symbol.ty, Type::Str | Type::Vector(_)) {
        let loc = symbol.offset()?;
        return type_if::append(p, &symbol.ty, base, loc, e);
    }
    if !symbol.ty.is_numeric() {
        return Err(Error::not_supported(
            if subtract { "-=" } else { "+=" },
            symbol.ty.name(),
            pos,
        ));
    }

    let current = match &symbol.storage {
        Storage::Register(reg) => match symbol.ty.to_ir_type().register_class() {
            Some(bramble_ir::RegisterClass::Real) => {
                Exp::var(symbol.ty.clone(), bramble_ir::Operand::Freg(*reg), pos)
            }
            _ => Exp::var(symbol.ty.clone(), bramble_ir::Operand::Reg(*reg), pos),
        },
        Storage::Memory(offset) => type_if::load_mem(p, &symbol.ty, base, *offset, pos)?,
    };
    let result = if subtract {
        type_if::sub(p, current, e)?
    } else {
        type_if::add(p, current, e)?
    };
    assign_existing(p, symbol, base, result)
}

fn collection_assignment(p: &mut Parser, name: &str, pos: Position) -> Result<()> {
    let (symbol, base) = p
        .lookup_var(name)
        .ok_or_else(|| Error::new(ErrorKind::UnknownVariable(name.to_string()), pos))?;
    if !symbol.ty.is_collection() {
        return Err(Error::new(ErrorKind::BadIndex, pos));
    }
    let loc = symbol.offset()?;

    // an immediately-closed bracket addresses the collection as a whole
    let close = if p.token().is_operator("(") { ")" } else { "}" };
    p.advance()?;
    let whole = if p.token().is_operator(close) {
        p.advance()?;
        true
    } else {
        false
    };

    if whole {
        assignment_op_expect_eq(p)?;
        let e = expr_parser::expression(p)?;
        if e.ty == symbol.ty {
            let e = type_if::exp_to_var(p, e)?;
            return type_if::assign_mem(p, base, loc, e);
        }
        if e.ty.is_collection() {
            return Err(Error::new(ErrorKind::ArrayTypeMismatch, pos));
        }
        return type_if::set(p, &symbol.ty, base, loc, e);
    }

    let indices = expr_parser::parse_indices(p, close)?;
    let op = assignment_op(p)?;
    let e = expr_parser::expression(p)?;
    match op.as_str() {
        "=" => type_if::indexed_write(p, &symbol.ty, base, loc, e, indices),
        "+=" => type_if::indexed_add(p, &symbol.ty, base, loc, e, indices),
        _ => type_if::indexed_sub(p, &symbol.ty, base, loc, e, indices),
    }
}

fn assignment_op_expect_eq(p: &mut Parser) -> Result<()> {
    if p.token().is_operator("=") {
        p.advance()
    } else {
        Err(Error::new(
            ErrorKind::AssignmentOpExpected(p.token().lexeme.clone()),
            p.pos(),
        ))
    }
}

fn field_assignment(p: &mut Parser, name: &str, pos: Position) -> Result<()> {
    let (symbol, frame_base) = p
        .lookup_var(name)
        .ok_or_else(|| Error::new(ErrorKind::UnknownVariable(name.to_string()), pos))?;
    let (base, loc, field_ty) = expr_parser::field_path(p, &symbol, frame_base)?;

    let op = assignment_op(p)?;
    let e = expr_parser::expression(p)?;

    match op.as_str() {
        "=" => {
            let e = type_if::coerce(p, e, &field_ty)?;
            let e = type_if::exp_to_var(p, e)?;
            type_if::assign_mem(p, base, loc, e)
        }
        "+=" if field_ty == Type::Str => type_if::append(p, &field_ty, base, loc, e),
        "+=" => {
            let current = type_if::load_mem(p, &field_ty, base, loc, pos)?;
            let result = type_if::add(p, current, e)?;
            let result = type_if::coerce(p, result, &field_ty)?;
            let result = type_if::exp_to_var(p, result)?;
            type_if::assign_mem(p, base, loc, result)
        }
        _ => {
            let current = type_if::load_mem(p, &field_ty, base, loc, pos)?;
            let result = type_if::sub(p, current, e)?;
            let result = type_if::coerce(p, result, &field_ty)?;
            let result = type_if::exp_to_var(p, result)?;
            type_if::assign_mem(p, base, loc, result)
        }
    }
}

/// `SWAP a, b`: exchange the contents of two variables of the same type
pub fn swap_stmt(p: &mut Parser) -> Result<()> {
    p.advance()?;
    let pos = p.pos();

    let first = swap_operand(p)?;
    p.expect_operator(",")?;
    let second = swap_operand(p)?;

    if first.0.ty != second.0.ty {
        return Err(Error::new(
            ErrorKind::BadConversion {
                from: second.0.ty.name(),
                to: first.0.ty.name(),
            },
            pos,
        ));
    }

    let (a_sym, a_base) = first;
    let (b_sym, b_base) = second;
    let a_loc = a_sym.offset()?;
    let b_loc = b_sym.offset()?;

    if a_sym.ty.is_reference() {
        return reference::swap(p, a_base, a_loc, b_base, b_loc, a_sym.ty.size());
    }
    if !a_sym.ty.is_numeric() {
        return Err(Error::not_supported("SWAP", a_sym.ty.name(), pos));
    }

    let a = type_if::load_mem(p, &a_sym.ty, a_base, a_loc, pos)?;
    let b = type_if::load_mem(p, &b_sym.ty, b_base, b_loc, pos)?;
    type_if::assign_mem(p, a_base, a_loc, b)?;
    type_if::assign_mem(p, b_base, b_loc, a)
}

fn swap_operand(p: &mut Parser) -> Result<(Symbol, u32)> {
    let pos = p.pos();
    let TokenKind::Identifier { name, .. } = p.token().kind.clone() else {
        return Err(Error::new(
            ErrorKind::IdExpected(p.token().lexeme.clone()),
            pos,
        ));
    };
    p.advance()?;
    let found = p
        .lookup_var(&name)
        .ok_or_else(|| Error::new(ErrorKind::UnknownVariable(name), pos))?;
    if matches!(found.0.storage, Storage::Register(_)) {
        return Err(Error::not_supported("SWAP", "a register variable", pos));
    }
    Ok(found)
}

/// `APPEND v, e`: grow a vector or string in place
pub fn append_stmt(p: &mut Parser) -> Result<()> {
    p.advance()?;
    let pos = p.pos();

    let TokenKind::Identifier { name, .. } = p.token().kind.clone() else {
        return Err(Error::new(
            ErrorKind::IdExpected(p.token().lexeme.clone()),
            pos,
        ));
    };
    p.advance()?;
    // vectors may be written `v%{}` at the statement head
    if p.token().is_operator("{") {
        p.advance()?;
        p.expect_operator("}")?;
    }
    p.expect_operator(",")?;

    let (symbol, base) = p
        .lookup_var(&name)
        .ok_or_else(|| Error::new(ErrorKind::UnknownVariable(name), pos))?;
    let loc = symbol.offset()?;

    let e = expr_parser::expression(p)?;
    match &symbol.ty {
        Type::Vector(_) | Type::Str => type_if::append(p, &symbol.ty, base, loc, e),
        other => Err(Error::not_supported("APPEND", other.name(), pos)),
    }
}
