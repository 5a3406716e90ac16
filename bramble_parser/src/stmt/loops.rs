//! Control flow: IF, WHILE, FOR and REPEAT

use super::{block, enter_block, leave_block};
use crate::context::Parser;
use crate::exp::Exp;
use crate::expr_parser;
use crate::symbol::Storage;
use crate::type_if;
use crate::types::Type;
use bramble_common::{Error, ErrorKind, Position, Result};
use bramble_ir::{Opcode, Operand, REG_LOCAL};
use bramble_lexer::{IdentType, Keyword, TokenKind};

fn condition(p: &mut Parser) -> Result<u32> {
    let e = expr_parser::int_var_expression(p)?;
    e.reg()
}

/// `IF cond THEN ... [ELSE ...] ENDIF`
pub fn if_stmt(p: &mut Parser) -> Result<()> {
    p.advance()?;
    let cond = condition(p)?;
    p.expect_keyword(Keyword::Then)?;

    let then_label = p.section().new_label();
    let else_label = p.section().new_label();
    p.section().add_instr_reg(
        Opcode::Jmpc,
        Operand::Reg(cond),
        Operand::Label(then_label),
        Operand::Label(else_label),
    );
    p.section().add_label(then_label)?;

    let saved = enter_block(p)?;
    let terminator = block(p, &[Keyword::Else, Keyword::EndIf])?;
    leave_block(p, saved)?;

    if terminator == Keyword::Else {
        let end_label = p.section().new_label();
        p.section()
            .add_instr_no_reg(Opcode::Jmp, Operand::Label(end_label));
        p.section().add_label(else_label)?;

        let saved = enter_block(p)?;
        block(p, &[Keyword::EndIf])?;
        leave_block(p, saved)?;
        p.section().add_label(end_label)
    } else {
        p.section().add_label(else_label)
    }
}

/// `WHILE cond ... ENDWHILE`
pub fn while_stmt(p: &mut Parser) -> Result<()> {
    p.advance()?;

    let top = p.section().new_label();
    p.section().add_label(top)?;

    let cond = condition(p)?;
    let body = p.section().new_label();
    let done = p.section().new_label();
    p.section().add_instr_reg(
        Opcode::Jmpc,
        Operand::Reg(cond),
        Operand::Label(body),
        Operand::Label(done),
    );
    p.section().add_label(body)?;

    let saved = enter_block(p)?;
    block(p, &[Keyword::EndWhile])?;
    leave_block(p, saved)?;

    p.section()
        .add_instr_no_reg(Opcode::Jmp, Operand::Label(top));
    p.section().add_label(done)
}

/// `REPEAT ... UNTIL cond`: the body runs at least once
pub fn repeat_stmt(p: &mut Parser) -> Result<()> {
    p.advance()?;

    let top = p.section().new_label();
    p.section().add_label(top)?;

    let saved = enter_block(p)?;
    block(p, &[Keyword::Until])?;
    leave_block(p, saved)?;

    let cond = condition(p)?;
    let done = p.section().new_label();
    p.section().add_instr_reg(
        Opcode::Jmpc,
        Operand::Reg(cond),
        Operand::Label(done),
        Operand::Label(top),
    );
    p.section().add_label(done)
}

fn loop_var_type(id_type: IdentType, pos: Position) -> Result<Type> {
    match id_type {
        IdentType::Int => Ok(Type::Int),
        IdentType::Real => Ok(Type::Real),
        IdentType::Byte => Ok(Type::Byte),
        IdentType::Str => Err(Error::new(ErrorKind::NumericExpected, pos)),
    }
}

/// `FOR v = start TO limit [STEP step] ... NEXT`. A literal zero STEP is
/// rejected at compile time; a variable step selects its comparison at
/// runtime.
pub fn for_stmt(p: &mut Parser) -> Result<()> {
    p.advance()?;
    let pos = p.pos();

    let TokenKind::Identifier { name, id_type } = p.token().kind.clone() else {
        return Err(Error::new(
            ErrorKind::IdExpected(p.token().lexeme.clone()),
            pos,
        ));
    };
    p.advance()?;
    let var_ty = loop_var_type(id_type, pos)?;

    let (symbol, base) = match p.lookup_var(&name) {
        Some(found) => found,
        None if p.in_proc => {
            let symbol = p.st.insert(&name, var_ty.clone(), pos)?;
            (symbol, REG_LOCAL)
        }
        None => p.create_global(&name, var_ty.clone(), pos)?,
    };

    p.expect_operator("=")?;
    let start = expr_parser::expression(p)?;
    let start = type_if::coerce(p, start, &symbol.ty)?;
    let start = type_if::exp_to_var(p, start)?;
    store_loop_var(p, &symbol, base, start)?;

    p.expect_keyword(Keyword::To)?;
    let limit = expr_parser::expression(p)?;
    let limit = type_if::coerce(p, limit, &symbol.ty)?;
    let limit = type_if::exp_to_var(p, limit)?;

    let step = if p.token().is_keyword(Keyword::Step) {
        p.advance()?;
        let step = expr_parser::expression(p)?;
        match &step.ty {
            Type::ConstInt => {
                if step.int_value()? == 0 {
                    return Err(Error::new(ErrorKind::ZeroStep, step.pos));
                }
            }
            Type::ConstReal => {
                if step.real_value()? == 0.0 {
                    return Err(Error::new(ErrorKind::ZeroStep, step.pos));
                }
            }
            _ => {}
        }
        type_if::coerce(p, step, &symbol.ty)?
    } else {
        type_if::coerce(p, Exp::int_const(1, pos), &symbol.ty)?
    };

    let top = p.section().new_label();
    p.section().add_label(top)?;

    let saved = enter_block(p)?;
    block(p, &[Keyword::Next])?;
    leave_block(p, saved)?;

    // v += step
    let current = load_loop_var(p, &symbol, base, pos)?;
    let next = type_if::add(p, current, type_if::dup(&step)?)?;
    let next = type_if::coerce(p, next, &symbol.ty)?;
    let next = type_if::exp_to_var(p, next)?;
    store_loop_var(p, &symbol, base, next)?;

    let done = p.section().new_label();
    let step_sign = step_direction(&step)?;
    match step_sign {
        Some(positive) => {
            let current = load_loop_var(p, &symbol, base, pos)?;
            let cond = if positive {
                type_if::lte(p, current, type_if::dup(&limit)?)?
            } else {
                type_if::gte(p, current, type_if::dup(&limit)?)?
            };
            let cond = type_if::exp_to_var(p, cond)?;
            p.section().add_instr_reg(
                Opcode::Jmpc,
                cond.operand()?,
                Operand::Label(top),
                Operand::Label(done),
            );
        }
        None => {
            // direction only known at runtime
            let ascending = p.section().new_label();
            let descending = p.section().new_label();
            let step_var = type_if::exp_to_var(p, type_if::dup(&step)?)?;
            let zero = type_if::coerce(p, Exp::int_const(0, pos), &symbol.ty)?;
            let positive = type_if::gte(p, step_var, zero)?;
            let positive = type_if::exp_to_var(p, positive)?;
            p.section().add_instr_reg(
                Opcode::Jmpc,
                positive.operand()?,
                Operand::Label(ascending),
                Operand::Label(descending),
            );

            p.section().add_label(ascending)?;
            let current = load_loop_var(p, &symbol, base, pos)?;
            let cond = type_if::lte(p, current, type_if::dup(&limit)?)?;
            let cond = type_if::exp_to_var(p, cond)?;
            p.section().add_instr_reg(
                Opcode::Jmpc,
                cond.operand()?,
                Operand::Label(top),
                Operand::Label(done),
            );

            p.section().add_label(descending)?;
            let current = load_loop_var(p, &symbol, base, pos)?;
            let cond = type_if::gte(p, current, type_if::dup(&limit)?)?;
            let cond = type_if::exp_to_var(p, cond)?;
            p.section().add_instr_reg(
                Opcode::Jmpc,
                cond.operand()?,
                Operand::Label(top),
                Operand::Label(done),
            );
        }
    }

    p.section().add_label(done)
}

/// `Some(true)` ascending, `Some(false)` descending, `None` unknown until
/// runtime
fn step_direction(step: &Exp) -> Result<Option<bool>> {
    match &step.ty {
        Type::ConstInt => Ok(Some(step.int_value()? > 0)),
        Type::ConstReal => Ok(Some(step.real_value()? > 0.0)),
        _ => Ok(None),
    }
}

fn load_loop_var(p: &mut Parser, symbol: &crate::symbol::Symbol, base: u32, pos: Position) -> Result<Exp> {
    match &symbol.storage {
        Storage::Memory(offset) => type_if::load_mem(p, &symbol.ty, base, *offset, pos),
        Storage::Register(reg) => match symbol.ty.to_ir_type().register_class() {
            Some(bramble_ir::RegisterClass::Real) => {
                Ok(Exp::var(symbol.ty.clone(), Operand::Freg(*reg), pos))
            }
            _ => Ok(Exp::var(symbol.ty.clone(), Operand::Reg(*reg), pos)),
        },
    }
}

fn store_loop_var(
    p: &mut Parser,
    symbol: &crate::symbol::Symbol,
    base: u32,
    e: Exp,
) -> Result<()> {
    match &symbol.storage {
        Storage::Memory(offset) => type_if::assign_mem(p, base, *offset, e),
        Storage::Register(reg) => type_if::assign_reg(p, *reg, e),
    }
}
