//! DIM and LOCAL

use crate::array;
use crate::context::Parser;
use crate::exp::Exp;
use crate::expr_parser;
use crate::type_if;
use crate::types::Type;
use bramble_common::{Error, ErrorKind, Position, Result};
use bramble_ir::REG_LOCAL;
use bramble_lexer::{IdentType, Keyword, TokenKind};

fn element_type(id_type: IdentType) -> Type {
    match id_type {
        IdentType::Int => Type::Int,
        IdentType::Real => Type::Real,
        IdentType::Str => Type::Str,
        IdentType::Byte => Type::Byte,
    }
}

/// `DIM a%(d1, d2)`, `DIM v%{n}`, `DIM v%{}`, `DIM r AS TYPE T`
pub fn dim_stmt(p: &mut Parser) -> Result<()> {
    let pos = p.pos();
    p.advance()?;
    if p.in_proc {
        return Err(Error::new(ErrorKind::DimInProc, pos));
    }

    let TokenKind::Identifier { name, id_type } = p.token().kind.clone() else {
        return Err(Error::new(
            ErrorKind::IdExpected(p.token().lexeme.clone()),
            p.pos(),
        ));
    };
    p.advance()?;

    if p.token().is_keyword(Keyword::As) {
        return dim_record(p, &name, pos);
    }
    if p.token().is_operator("(") {
        return dim_array(p, &name, element_type(id_type), pos);
    }
    if p.token().is_operator("{") {
        return dim_vector(p, &name, element_type(id_type), pos);
    }
    Err(Error::new(ErrorKind::BadDim, p.pos()))
}

fn dim_array(p: &mut Parser, name: &str, elem: Type, pos: Position) -> Result<()> {
    p.advance()?;

    let mut dim_exps: Vec<Exp> = Vec::new();
    loop {
        let e = expr_parser::expression(p)?;
        let e = type_if::to_int32(p, e)?;
        dim_exps.push(e);
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

    let declared: Vec<Option<i32>> = dim_exps
        .iter()
        .map(|e| match &e.ty {
            Type::ConstInt => e.int_value().ok(),
            _ => None,
        })
        .collect();
    let ty = Type::array(elem, declared, pos)?;

    let (symbol, base) = p.create_global(name, ty.clone(), pos)?;
    let loc = symbol.offset()?;
    array::init_collection(p, &ty, base, loc, dim_exps, pos)
}

fn dim_vector(p: &mut Parser, name: &str, elem: Type, pos: Position) -> Result<()> {
    p.advance()?;

    let ty = Type::vector(elem);
    if p.token().is_operator("}") {
        // an empty vector grows by appending
        p.advance()?;
        let (symbol, base) = p.create_global(name, ty.clone(), pos)?;
        let loc = symbol.offset()?;
        return type_if::zero_ref(p, &ty, base, loc, true, pos);
    }

    let count = expr_parser::expression(p)?;
    let count = type_if::to_int32(p, count)?;
    if !p.token().is_operator("}") {
        return Err(Error::new(
            ErrorKind::ExpectedToken {
                expected: "'}'".to_string(),
                found: p.token().lexeme.clone(),
            },
            p.pos(),
        ));
    }
    p.advance()?;

    let (symbol, base) = p.create_global(name, ty.clone(), pos)?;
    let loc = symbol.offset()?;
    array::init_collection(p, &ty, base, loc, vec![count], pos)
}

fn dim_record(p: &mut Parser, name: &str, pos: Position) -> Result<()> {
    p.advance()?;
    p.expect_keyword(Keyword::Type)?;

    let TokenKind::Identifier {
        name: type_name, ..
    } = p.token().kind.clone()
    else {
        return Err(Error::new(
            ErrorKind::IdExpected(p.token().lexeme.clone()),
            p.pos(),
        ));
    };
    let rec = p
        .rec_types
        .get(&type_name)
        .cloned()
        .ok_or_else(|| Error::new(ErrorKind::UnknownVariable(type_name), p.pos()))?;
    p.advance()?;

    let ty = Type::Rec(rec.clone());
    let (symbol, base) = p.create_global(name, ty.clone(), pos)?;
    let loc = symbol.offset()?;
    type_if::zero_ref(p, &ty, base, loc, false, pos)?;
    if rec.has_references() {
        p.rec_globals.push((loc, rec));
    }
    Ok(())
}

/// `LOCAL name [= expr]`: declare a function-local variable
pub fn local_stmt(p: &mut Parser) -> Result<()> {
    let pos = p.pos();
    p.advance()?;
    if !p.in_proc {
        return Err(Error::new(ErrorKind::UselessStatement, pos));
    }

    let TokenKind::Identifier { name, id_type } = p.token().kind.clone() else {
        return Err(Error::new(
            ErrorKind::IdExpected(p.token().lexeme.clone()),
            p.pos(),
        ));
    };
    p.advance()?;

    let ty = element_type(id_type);
    let symbol = p.st.insert(&name, ty.clone(), pos)?;
    let loc = symbol.offset()?;

    if p.token().is_operator("=") {
        p.advance()?;
        let e = expr_parser::expression(p)?;
        let e = type_if::coerce(p, e, &ty)?;
        let e = type_if::exp_to_var(p, e)?;
        return type_if::assign_new_mem(p, REG_LOCAL, loc, e);
    }

    match &ty {
        Type::Str => type_if::zero_ref(p, &ty, REG_LOCAL, loc, true, pos),
        _ => {
            let zero = type_if::zero(p, &ty, pos)?;
            let zero = type_if::coerce(p, zero, &ty)?;
            type_if::assign_new_mem(p, REG_LOCAL, loc, zero)
        }
    }
}
