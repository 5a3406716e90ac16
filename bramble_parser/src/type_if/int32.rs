//! Integer operations
//!
//! `ConstIntOps` folds everything at compile time under two's-complement
//! int32 semantics; `IntOps` emits instructions, selecting the
//! immediate-operand variant when the (pre-ordered) right-hand side is a
//! constant and promoting to real arithmetic when it is real.

use super::{byte, float64, ns, string, TypeOps};
use crate::context::Parser;
use crate::exp::Exp;
use crate::types::Type;
use bramble_common::{Error, ErrorKind, Position, Result};
use bramble_ir::{Opcode, Operand, RegisterClass};

/// Emit a binary instruction and wrap the result in an expression of the
/// opcode's result class
pub(super) fn emit_binary(
    p: &mut Parser,
    opcode: Opcode,
    lhs: Operand,
    rhs: Operand,
    pos: Position,
) -> Result<Exp> {
    let reg = p.section().add_instr(opcode, lhs, rhs)?;
    match opcode.result_class() {
        Some(RegisterClass::Real) => Ok(Exp::real_var(reg, pos)),
        _ => Ok(Exp::int_var(reg, pos)),
    }
}

pub(super) fn emit_unary(p: &mut Parser, opcode: Opcode, src: Operand, pos: Position) -> Result<Exp> {
    emit_binary(p, opcode, src, Operand::None, pos)
}

/// Promote an integer-register expression to the floating bank
pub(super) fn promote_to_real(p: &mut Parser, e: Exp) -> Result<Exp> {
    let pos = e.pos;
    emit_unary(p, Opcode::MovI32Fp, e.operand()?, pos)
}

/// Opcode selection for a commutative integer operator with optional real
/// forms
struct Commutative {
    imm: Opcode,
    reg: Opcode,
    real: Option<(Opcode, Opcode)>,
}

fn int_commutative(p: &mut Parser, a1: Exp, a2: Exp, sel: Commutative) -> Result<Exp> {
    let pos = a1.pos;
    match &a2.ty {
        Type::ConstInt => emit_binary(p, sel.imm, a1.operand()?, Operand::I32(a2.int_value()?), pos),
        Type::Int => emit_binary(p, sel.reg, a1.operand()?, a2.operand()?, pos),
        Type::Byte => {
            let a2 = byte::sign_extend(p, a2)?;
            emit_binary(p, sel.reg, a1.operand()?, a2.operand()?, pos)
        }
        Type::ConstReal => match sel.real {
            Some((rimm, _)) => {
                let a1 = promote_to_real(p, a1)?;
                emit_binary(p, rimm, a1.operand()?, Operand::Real(a2.real_value()?), pos)
            }
            None => ns("real operand", "integer", pos),
        },
        Type::Real => match sel.real {
            Some((_, rreg)) => {
                let a1 = promote_to_real(p, a1)?;
                emit_binary(p, rreg, a1.operand()?, a2.operand()?, pos)
            }
            None => ns("real operand", "integer", pos),
        },
        other => ns("arithmetic", &other.name(), pos),
    }
}

/// Opcode selection for an ordered comparison; `imm_swapped` is the mirror
/// used when ordering moved the constant to the right
struct Comparison {
    imm: Opcode,
    imm_swapped: Opcode,
    reg: Opcode,
    rimm: Opcode,
    rimm_swapped: Opcode,
    rreg: Opcode,
}

fn int_compare(p: &mut Parser, a1: Exp, a2: Exp, swapped: bool, sel: Comparison) -> Result<Exp> {
    let pos = a1.pos;
    match &a2.ty {
        Type::ConstInt => {
            let opcode = if swapped { sel.imm_swapped } else { sel.imm };
            emit_binary(p, opcode, a1.operand()?, Operand::I32(a2.int_value()?), pos)
        }
        Type::Int => emit_binary(p, sel.reg, a1.operand()?, a2.operand()?, pos),
        Type::Byte => {
            let a2 = byte::sign_extend(p, a2)?;
            emit_binary(p, sel.reg, a1.operand()?, a2.operand()?, pos)
        }
        Type::ConstReal => {
            let opcode = if swapped { sel.rimm_swapped } else { sel.rimm };
            let a1 = promote_to_real(p, a1)?;
            emit_binary(p, opcode, a1.operand()?, Operand::Real(a2.real_value()?), pos)
        }
        Type::Real => {
            let a1 = promote_to_real(p, a1)?;
            emit_binary(p, sel.rreg, a1.operand()?, a2.operand()?, pos)
        }
        other => ns("comparison", &other.name(), pos),
    }
}

fn fold_bool(value: bool, pos: Position) -> Exp {
    Exp::int_const(if value { -1 } else { 0 }, pos)
}

pub struct ConstIntOps;

impl TypeOps for ConstIntOps {
    fn name(&self) -> &'static str {
        "const integer"
    }

    fn is_const(&self) -> bool {
        true
    }

    fn exp_to_var(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        emit_unary(p, Opcode::MoviI32, Operand::I32(e.int_value()?), pos)
    }

    fn copy_var(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        self.exp_to_var(p, e)
    }

    fn assign_reg(&self, p: &mut Parser, reg: u32, e: Exp) -> Result<()> {
        p.section().add_instr_reg(
            Opcode::MoviI32,
            Operand::Reg(reg),
            Operand::I32(e.int_value()?),
            Operand::None,
        );
        Ok(())
    }

    fn assign_mem(&self, p: &mut Parser, base: u32, loc: u32, e: Exp) -> Result<()> {
        let e = self.exp_to_var(p, e)?;
        p.section().add_instr_reg(
            Opcode::StoreoI32,
            e.operand()?,
            Operand::Reg(base),
            Operand::I32(loc as i32),
        );
        Ok(())
    }

    fn assign_new_mem(&self, p: &mut Parser, base: u32, loc: u32, e: Exp) -> Result<()> {
        self.assign_mem(p, base, loc, e)
    }

    fn to_int32(&self, _p: &mut Parser, e: Exp) -> Result<Exp> {
        Ok(e)
    }

    fn zerox(&self, _p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        Ok(Exp::int_const(e.int_value()? & 0xff, pos))
    }

    fn to_byte(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        let reg = p
            .section()
            .add_instr(Opcode::MoviI32, Operand::I32(e.int_value()? & 0xff), Operand::None)?;
        Ok(Exp::var(Type::Byte, Operand::Reg(reg), pos))
    }

    fn to_float64(&self, _p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        Ok(Exp::real_const(e.int_value()? as f64, pos))
    }

    fn to_string(&self, _p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        Ok(Exp::str_const(e.int_value()?.to_string().into_bytes(), pos))
    }

    fn to_hex_string(&self, _p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        Ok(Exp::str_const(
            format!("{:X}", e.int_value()?).into_bytes(),
            pos,
        ))
    }

    fn coerce(&self, p: &mut Parser, e: Exp, target: &Type) -> Result<Exp> {
        match target {
            Type::ConstInt | Type::Int => Ok(e),
            Type::ConstReal | Type::Real => self.to_float64(p, e),
            Type::Byte => self.to_byte(p, e),
            other => {
                let pos = e.pos;
                Err(Error::new(
                    ErrorKind::BadConversion {
                        from: self.name().to_string(),
                        to: other.name(),
                    },
                    pos,
                ))
            }
        }
    }

    fn add(&self, _p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let pos = a1.pos;
        match &a2.ty {
            Type::ConstInt => Ok(Exp::int_const(
                a1.int_value()?.wrapping_add(a2.int_value()?),
                pos,
            )),
            Type::ConstReal => Ok(Exp::real_const(
                a1.int_value()? as f64 + a2.real_value()?,
                pos,
            )),
            other => ns("+", &other.name(), pos),
        }
    }

    fn mul(&self, _p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let pos = a1.pos;
        match &a2.ty {
            Type::ConstInt => Ok(Exp::int_const(
                a1.int_value()?.wrapping_mul(a2.int_value()?),
                pos,
            )),
            Type::ConstReal => Ok(Exp::real_const(
                a1.int_value()? as f64 * a2.real_value()?,
                pos,
            )),
            other => ns("*", &other.name(), pos),
        }
    }

    fn and(&self, _p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let pos = a1.pos;
        Ok(Exp::int_const(a1.int_value()? & a2.int_value()?, pos))
    }

    fn or(&self, _p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let pos = a1.pos;
        Ok(Exp::int_const(a1.int_value()? | a2.int_value()?, pos))
    }

    fn eor(&self, _p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let pos = a1.pos;
        Ok(Exp::int_const(a1.int_value()? ^ a2.int_value()?, pos))
    }

    fn eq(&self, _p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let pos = a1.pos;
        match &a2.ty {
            Type::ConstInt => Ok(fold_bool(a1.int_value()? == a2.int_value()?, pos)),
            Type::ConstReal => Ok(fold_bool(a1.int_value()? as f64 == a2.real_value()?, pos)),
            other => ns("=", &other.name(), pos),
        }
    }

    fn neq(&self, _p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let pos = a1.pos;
        match &a2.ty {
            Type::ConstInt => Ok(fold_bool(a1.int_value()? != a2.int_value()?, pos)),
            Type::ConstReal => Ok(fold_bool(a1.int_value()? as f64 != a2.real_value()?, pos)),
            other => ns("<>", &other.name(), pos),
        }
    }

    fn sub(&self, _p: &mut Parser, a1: Exp, a2: Exp, _swapped: bool) -> Result<Exp> {
        let pos = a1.pos;
        match &a2.ty {
            Type::ConstInt => Ok(Exp::int_const(
                a1.int_value()?.wrapping_sub(a2.int_value()?),
                pos,
            )),
            Type::ConstReal => Ok(Exp::real_const(
                a1.int_value()? as f64 - a2.real_value()?,
                pos,
            )),
            other => ns("-", &other.name(), pos),
        }
    }

    fn divr(&self, p: &mut Parser, a1: Exp, a2: Exp, swapped: bool) -> Result<Exp> {
        // the dispatcher coerces both sides to real first
        let a1 = self.to_float64(p, a1)?;
        float64::ConstRealOps.divr(p, a1, a2, swapped)
    }

    fn gt(&self, _p: &mut Parser, a1: Exp, a2: Exp, _swapped: bool) -> Result<Exp> {
        let pos = a1.pos;
        Ok(fold_bool(a1.int_value()? > a2.int_value()?, pos))
    }

    fn lte(&self, _p: &mut Parser, a1: Exp, a2: Exp, _swapped: bool) -> Result<Exp> {
        let pos = a1.pos;
        Ok(fold_bool(a1.int_value()? <= a2.int_value()?, pos))
    }

    fn lt(&self, _p: &mut Parser, a1: Exp, a2: Exp, _swapped: bool) -> Result<Exp> {
        let pos = a1.pos;
        Ok(fold_bool(a1.int_value()? < a2.int_value()?, pos))
    }

    fn gte(&self, _p: &mut Parser, a1: Exp, a2: Exp, _swapped: bool) -> Result<Exp> {
        let pos = a1.pos;
        Ok(fold_bool(a1.int_value()? >= a2.int_value()?, pos))
    }

    fn div(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        // DIV does not reorder its operands, so the divisor may be a variable
        if !a2.ty.is_const() {
            let a1 = self.exp_to_var(p, a1)?;
            return IntOps.div(p, a1, a2);
        }
        let pos = a2.pos;
        let divisor = a2.int_value()?;
        if divisor == 0 {
            return Err(Error::new(ErrorKind::DivideByZero, pos));
        }
        Ok(Exp::int_const(a1.int_value()?.wrapping_div(divisor), a1.pos))
    }

    fn modulo(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        if !a2.ty.is_const() {
            let a1 = self.exp_to_var(p, a1)?;
            return IntOps.modulo(p, a1, a2);
        }
        let pos = a2.pos;
        let divisor = a2.int_value()?;
        if divisor == 0 {
            return Err(Error::new(ErrorKind::DivideByZero, pos));
        }
        Ok(Exp::int_const(a1.int_value()?.wrapping_rem(divisor), a1.pos))
    }

    fn lsl(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        if !a2.ty.is_const() {
            let a1 = self.exp_to_var(p, a1)?;
            return IntOps.lsl(p, a1, a2);
        }
        let pos = a1.pos;
        Ok(Exp::int_const(
            a1.int_value()?.wrapping_shl(a2.int_value()? as u32),
            pos,
        ))
    }

    fn lsr(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        if !a2.ty.is_const() {
            let a1 = self.exp_to_var(p, a1)?;
            return IntOps.lsr(p, a1, a2);
        }
        let pos = a1.pos;
        Ok(Exp::int_const(
            (a1.int_value()? as u32).wrapping_shr(a2.int_value()? as u32) as i32,
            pos,
        ))
    }

    fn asr(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        if !a2.ty.is_const() {
            let a1 = self.exp_to_var(p, a1)?;
            return IntOps.asr(p, a1, a2);
        }
        let pos = a1.pos;
        Ok(Exp::int_const(
            a1.int_value()?.wrapping_shr(a2.int_value()? as u32),
            pos,
        ))
    }

    fn pow(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let pos = a1.pos;
        match &a2.ty {
            Type::ConstInt => {
                let exponent = a2.int_value()?;
                if exponent == 0 {
                    return Ok(Exp::int_const(1, pos));
                }
                if exponent == 1 {
                    return Ok(a1);
                }
                Ok(Exp::real_const((a1.int_value()? as f64).powi(exponent), pos))
            }
            Type::ConstReal => Ok(Exp::real_const(
                (a1.int_value()? as f64).powf(a2.real_value()?),
                pos,
            )),
            _ => {
                // variable exponent: promote the base and emit POWR
                let a1 = self.to_float64(p, a1)?;
                float64::ConstRealOps.pow(p, a1, a2)
            }
        }
    }

    fn abs(&self, _p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        Ok(Exp::int_const(e.int_value()?.wrapping_abs(), pos))
    }

    fn sgn(&self, _p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        Ok(Exp::int_const(e.int_value()?.signum(), pos))
    }

    fn not(&self, _p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        Ok(Exp::int_const(!e.int_value()?, pos))
    }

    fn unary_minus(&self, _p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        Ok(Exp::int_const(e.int_value()?.wrapping_neg(), pos))
    }

    fn print(&self, p: &mut Parser, e: Exp) -> Result<()> {
        let e = self.exp_to_var(p, e)?;
        IntOps.print(p, e)
    }
}

pub struct IntOps;

impl TypeOps for IntOps {
    fn name(&self) -> &'static str {
        "integer"
    }

    fn zero(&self, _p: &mut Parser, pos: Position) -> Result<Exp> {
        Ok(Exp::int_const(0, pos))
    }

    fn zero_reg(&self, p: &mut Parser, reg: u32, _pos: Position) -> Result<()> {
        p.section().add_instr_reg(
            Opcode::MoviI32,
            Operand::Reg(reg),
            Operand::I32(0),
            Operand::None,
        );
        Ok(())
    }

    fn exp_to_var(&self, _p: &mut Parser, e: Exp) -> Result<Exp> {
        Ok(e)
    }

    fn copy_var(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        emit_unary(p, Opcode::Mov, e.operand()?, pos)
    }

    fn assign_reg(&self, p: &mut Parser, reg: u32, e: Exp) -> Result<()> {
        p.section().add_instr_reg(
            Opcode::Mov,
            Operand::Reg(reg),
            e.operand()?,
            Operand::None,
        );
        Ok(())
    }

    fn assign_mem(&self, p: &mut Parser, base: u32, loc: u32, e: Exp) -> Result<()> {
        p.section().add_instr_reg(
            Opcode::StoreoI32,
            e.operand()?,
            Operand::Reg(base),
            Operand::I32(loc as i32),
        );
        Ok(())
    }

    fn assign_new_mem(&self, p: &mut Parser, base: u32, loc: u32, e: Exp) -> Result<()> {
        self.assign_mem(p, base, loc, e)
    }

    fn load_mem(
        &self,
        p: &mut Parser,
        _ty: &Type,
        base: u32,
        loc: u32,
        pos: Position,
    ) -> Result<Exp> {
        emit_binary(
            p,
            Opcode::LoadoI32,
            Operand::Reg(base),
            Operand::I32(loc as i32),
            pos,
        )
    }

    fn to_int32(&self, _p: &mut Parser, e: Exp) -> Result<Exp> {
        Ok(e)
    }

    fn zerox(&self, _p: &mut Parser, e: Exp) -> Result<Exp> {
        Ok(e)
    }

    fn to_byte(&self, _p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        Ok(Exp::var(Type::Byte, e.operand()?, pos))
    }

    fn to_float64(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        promote_to_real(p, e)
    }

    fn to_string(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        string::int_to_string(p, e)
    }

    fn to_hex_string(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        string::int_to_hex_string(p, e)
    }

    fn coerce(&self, p: &mut Parser, e: Exp, target: &Type) -> Result<Exp> {
        match target {
            Type::Int => Ok(e),
            Type::ConstReal | Type::Real => self.to_float64(p, e),
            Type::Byte => self.to_byte(p, e),
            other => {
                let pos = e.pos;
                Err(Error::new(
                    ErrorKind::BadConversion {
                        from: self.name().to_string(),
                        to: other.name(),
                    },
                    pos,
                ))
            }
        }
    }

    fn add(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        int_commutative(
            p,
            a1,
            a2,
            Commutative {
                imm: Opcode::AddiI32,
                reg: Opcode::AddI32,
                real: Some((Opcode::AddiReal, Opcode::AddReal)),
            },
        )
    }

    fn mul(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        int_commutative(
            p,
            a1,
            a2,
            Commutative {
                imm: Opcode::MuliI32,
                reg: Opcode::MulI32,
                real: Some((Opcode::MuliReal, Opcode::MulReal)),
            },
        )
    }

    fn and(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        int_commutative(
            p,
            a1,
            a2,
            Commutative {
                imm: Opcode::AndiI32,
                reg: Opcode::AndI32,
                real: None,
            },
        )
    }

    fn or(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        int_commutative(
            p,
            a1,
            a2,
            Commutative {
                imm: Opcode::OriI32,
                reg: Opcode::OrI32,
                real: None,
            },
        )
    }

    fn eor(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        int_commutative(
            p,
            a1,
            a2,
            Commutative {
                imm: Opcode::EoriI32,
                reg: Opcode::EorI32,
                real: None,
            },
        )
    }

    fn eq(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let pos = a1.pos;
        match &a2.ty {
            // equality zero-extends byte operands
            Type::Byte => {
                let a2 = super::zerox(p, a2)?;
                emit_binary(p, Opcode::EqI32, a1.operand()?, a2.operand()?, pos)
            }
            _ => int_commutative(
                p,
                a1,
                a2,
                Commutative {
                    imm: Opcode::EqiI32,
                    reg: Opcode::EqI32,
                    real: Some((Opcode::EqiReal, Opcode::EqReal)),
                },
            ),
        }
    }

    fn neq(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let pos = a1.pos;
        match &a2.ty {
            Type::Byte => {
                let a2 = super::zerox(p, a2)?;
                emit_binary(p, Opcode::NeqI32, a1.operand()?, a2.operand()?, pos)
            }
            _ => int_commutative(
                p,
                a1,
                a2,
                Commutative {
                    imm: Opcode::NeqiI32,
                    reg: Opcode::NeqI32,
                    real: Some((Opcode::NeqiReal, Opcode::NeqReal)),
                },
            ),
        }
    }

    fn sub(&self, p: &mut Parser, a1: Exp, a2: Exp, swapped: bool) -> Result<Exp> {
        let pos = a1.pos;
        match &a2.ty {
            Type::ConstInt => {
                let opcode = if swapped {
                    Opcode::RsubiI32
                } else {
                    Opcode::SubiI32
                };
                emit_binary(p, opcode, a1.operand()?, Operand::I32(a2.int_value()?), pos)
            }
            Type::Int => emit_binary(p, Opcode::SubI32, a1.operand()?, a2.operand()?, pos),
            Type::Byte => {
                let a2 = byte::sign_extend(p, a2)?;
                emit_binary(p, Opcode::SubI32, a1.operand()?, a2.operand()?, pos)
            }
            Type::ConstReal => {
                let opcode = if swapped {
                    Opcode::RsubiReal
                } else {
                    Opcode::SubiReal
                };
                let a1 = promote_to_real(p, a1)?;
                emit_binary(p, opcode, a1.operand()?, Operand::Real(a2.real_value()?), pos)
            }
            Type::Real => {
                let a1 = promote_to_real(p, a1)?;
                emit_binary(p, Opcode::SubReal, a1.operand()?, a2.operand()?, pos)
            }
            other => ns("-", &other.name(), pos),
        }
    }

    fn divr(&self, p: &mut Parser, a1: Exp, a2: Exp, swapped: bool) -> Result<Exp> {
        // only reachable with a real RHS; the dispatcher coerces
        let a1 = promote_to_real(p, a1)?;
        float64::RealOps.divr(p, a1, a2, swapped)
    }

    fn gt(&self, p: &mut Parser, a1: Exp, a2: Exp, swapped: bool) -> Result<Exp> {
        int_compare(
            p,
            a1,
            a2,
            swapped,
            Comparison {
                imm: Opcode::GtiI32,
                imm_swapped: Opcode::LtiI32,
                reg: Opcode::GtI32,
                rimm: Opcode::GtiReal,
                rimm_swapped: Opcode::LtiReal,
                rreg: Opcode::GtReal,
            },
        )
    }

    fn lte(&self, p: &mut Parser, a1: Exp, a2: Exp, swapped: bool) -> Result<Exp> {
        int_compare(
            p,
            a1,
            a2,
            swapped,
            Comparison {
                imm: Opcode::LteiI32,
                imm_swapped: Opcode::GteiI32,
                reg: Opcode::LteI32,
                rimm: Opcode::LteiReal,
                rimm_swapped: Opcode::GteiReal,
                rreg: Opcode::LteReal,
            },
        )
    }

    fn lt(&self, p: &mut Parser, a1: Exp, a2: Exp, swapped: bool) -> Result<Exp> {
        int_compare(
            p,
            a1,
            a2,
            swapped,
            Comparison {
                imm: Opcode::LtiI32,
                imm_swapped: Opcode::GtiI32,
                reg: Opcode::LtI32,
                rimm: Opcode::LtiReal,
                rimm_swapped: Opcode::GtiReal,
                rreg: Opcode::LtReal,
            },
        )
    }

    fn gte(&self, p: &mut Parser, a1: Exp, a2: Exp, swapped: bool) -> Result<Exp> {
        int_compare(
            p,
            a1,
            a2,
            swapped,
            Comparison {
                imm: Opcode::GteiI32,
                imm_swapped: Opcode::LteiI32,
                reg: Opcode::GteI32,
                rimm: Opcode::GteiReal,
                rimm_swapped: Opcode::LteiReal,
                rreg: Opcode::GteReal,
            },
        )
    }

    fn div(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let pos = a1.pos;
        match &a2.ty {
            Type::ConstInt => {
                if a2.int_value()? == 0 {
                    return Err(Error::new(ErrorKind::DivideByZero, a2.pos));
                }
                emit_binary(p, Opcode::DiviI32, a1.operand()?, Operand::I32(a2.int_value()?), pos)
            }
            Type::Int => {
                // the divisor is only known at runtime; a zero raises there
                let result = emit_binary(p, Opcode::DivI32, a1.operand()?, a2.operand()?, pos)?;
                crate::exp::handle_errors(p)?;
                Ok(result)
            }
            other => ns("DIV", &other.name(), pos),
        }
    }

    fn modulo(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let pos = a1.pos;
        match &a2.ty {
            Type::ConstInt => {
                if a2.int_value()? == 0 {
                    return Err(Error::new(ErrorKind::DivideByZero, a2.pos));
                }
                let a2 = ConstIntOps.exp_to_var(p, a2)?;
                emit_binary(p, Opcode::ModI32, a1.operand()?, a2.operand()?, pos)
            }
            Type::Int => {
                let result = emit_binary(p, Opcode::ModI32, a1.operand()?, a2.operand()?, pos)?;
                crate::exp::handle_errors(p)?;
                Ok(result)
            }
            other => ns("MOD", &other.name(), pos),
        }
    }

    fn lsl(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        int_commutative(
            p,
            a1,
            a2,
            Commutative {
                imm: Opcode::LsliI32,
                reg: Opcode::LslI32,
                real: None,
            },
        )
    }

    fn lsr(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        int_commutative(
            p,
            a1,
            a2,
            Commutative {
                imm: Opcode::LsriI32,
                reg: Opcode::LsrI32,
                real: None,
            },
        )
    }

    fn asr(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        int_commutative(
            p,
            a1,
            a2,
            Commutative {
                imm: Opcode::AsriI32,
                reg: Opcode::AsrI32,
                real: None,
            },
        )
    }

    fn pow(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        if let Type::ConstInt = &a2.ty {
            let exponent = a2.int_value()?;
            if exponent == 0 {
                return Ok(Exp::int_const(1, a1.pos));
            }
            if exponent == 1 {
                return Ok(a1);
            }
        }
        let a1 = promote_to_real(p, a1)?;
        float64::RealOps.pow(p, a1, a2)
    }

    fn abs(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        // branchless: (x ^ (x >> 31)) - (x >> 31)
        let pos = e.pos;
        let sign = emit_binary(p, Opcode::AsriI32, e.operand()?, Operand::I32(31), pos)?;
        let flipped = emit_binary(p, Opcode::EorI32, e.operand()?, sign.operand()?, pos)?;
        emit_binary(p, Opcode::SubI32, flipped.operand()?, sign.operand()?, pos)
    }

    fn sgn(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        // (x < 0) - (x > 0), with comparisons yielding 0 / -1
        let pos = e.pos;
        let neg = emit_binary(p, Opcode::LtiI32, e.operand()?, Operand::I32(0), pos)?;
        let posi = emit_binary(p, Opcode::GtiI32, e.operand()?, Operand::I32(0), pos)?;
        emit_binary(p, Opcode::SubI32, neg.operand()?, posi.operand()?, pos)
    }

    fn not(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        emit_unary(p, Opcode::NotI32, e.operand()?, pos)
    }

    fn unary_minus(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        emit_binary(p, Opcode::RsubiI32, e.operand()?, Operand::I32(0), pos)
    }

    fn ret(&self, p: &mut Parser, reg: u32, _pos: Position) -> Result<()> {
        p.section()
            .add_instr_no_reg(Opcode::RetI32, Operand::Reg(reg));
        Ok(())
    }

    fn print(&self, p: &mut Parser, e: Exp) -> Result<()> {
        let s = string::int_to_string(p, e)?;
        super::print(p, s)
    }
}
