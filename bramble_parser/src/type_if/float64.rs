//! Real (64-bit float) operations

use super::int32::{emit_binary, emit_unary};
use super::{byte, ns, TypeOps};
use crate::context::Parser;
use crate::exp::Exp;
use crate::types::Type;
use bramble_common::{Error, ErrorKind, Position, Result};
use bramble_ir::{Opcode, Operand};

fn fold_bool(value: bool, pos: Position) -> Exp {
    Exp::int_const(if value { -1 } else { 0 }, pos)
}

/// Any numeric operand as a compile-time real, for const folding
fn const_operand(e: &Exp) -> Result<f64> {
    match &e.ty {
        Type::ConstInt => Ok(e.int_value()? as f64),
        Type::ConstReal => Ok(e.real_value()?),
        _ => Err(Error::assertion_failed(e.pos)),
    }
}

/// Coerce a numeric operand to a floating register
fn to_real_var(p: &mut Parser, e: Exp) -> Result<Exp> {
    match &e.ty {
        Type::Real => Ok(e),
        Type::ConstReal => {
            let pos = e.pos;
            emit_unary(p, Opcode::MoviReal, Operand::Real(e.real_value()?), pos)
        }
        Type::ConstInt => {
            let pos = e.pos;
            emit_unary(p, Opcode::MoviReal, Operand::Real(e.int_value()? as f64), pos)
        }
        Type::Int => {
            let pos = e.pos;
            emit_unary(p, Opcode::MovI32Fp, e.operand()?, pos)
        }
        Type::Byte => {
            let e = byte::sign_extend(p, e)?;
            let pos = e.pos;
            emit_unary(p, Opcode::MovI32Fp, e.operand()?, pos)
        }
        _ => {
            let pos = e.pos;
            ns("real conversion", &e.ty.name(), pos)
        }
    }
}

struct Commutative {
    imm: Opcode,
    reg: Opcode,
}

fn real_commutative(p: &mut Parser, a1: Exp, a2: Exp, sel: Commutative) -> Result<Exp> {
    let pos = a1.pos;
    match &a2.ty {
        Type::ConstReal => emit_binary(p, sel.imm, a1.operand()?, Operand::Real(a2.real_value()?), pos),
        Type::ConstInt => emit_binary(
            p,
            sel.imm,
            a1.operand()?,
            Operand::Real(a2.int_value()? as f64),
            pos,
        ),
        Type::Real => emit_binary(p, sel.reg, a1.operand()?, a2.operand()?, pos),
        Type::Int | Type::Byte => {
            let a2 = to_real_var(p, a2)?;
            emit_binary(p, sel.reg, a1.operand()?, a2.operand()?, pos)
        }
        other => ns("arithmetic", &other.name(), pos),
    }
}

struct Comparison {
    imm: Opcode,
    imm_swapped: Opcode,
    reg: Opcode,
}

fn real_compare(p: &mut Parser, a1: Exp, a2: Exp, swapped: bool, sel: Comparison) -> Result<Exp> {
    let pos = a1.pos;
    match &a2.ty {
        Type::ConstReal | Type::ConstInt => {
            let value = const_operand(&a2)?;
            let opcode = if swapped { sel.imm_swapped } else { sel.imm };
            emit_binary(p, opcode, a1.operand()?, Operand::Real(value), pos)
        }
        Type::Real | Type::Int | Type::Byte => {
            let a2 = to_real_var(p, a2)?;
            emit_binary(p, sel.reg, a1.operand()?, a2.operand()?, pos)
        }
        other => ns("comparison", &other.name(), pos),
    }
}

pub struct ConstRealOps;

impl TypeOps for ConstRealOps {
    fn name(&self) -> &'static str {
        "const real"
    }

    fn is_const(&self) -> bool {
        true
    }

    fn exp_to_var(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        emit_unary(p, Opcode::MoviReal, Operand::Real(e.real_value()?), pos)
    }

    fn copy_var(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        self.exp_to_var(p, e)
    }

    fn assign_reg(&self, p: &mut Parser, reg: u32, e: Exp) -> Result<()> {
        p.section().add_instr_reg(
            Opcode::MoviReal,
            Operand::Freg(reg),
            Operand::Real(e.real_value()?),
            Operand::None,
        );
        Ok(())
    }

    fn assign_mem(&self, p: &mut Parser, base: u32, loc: u32, e: Exp) -> Result<()> {
        let e = self.exp_to_var(p, e)?;
        p.section().add_instr_reg(
            Opcode::StoreoReal,
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
        // rounds to nearest, matching the runtime move
        let pos = e.pos;
        Ok(Exp::int_const(e.real_value()?.round() as i32, pos))
    }

    fn to_byte(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let e = self.to_int32(p, e)?;
        super::to_byte(p, e)
    }

    fn to_float64(&self, _p: &mut Parser, e: Exp) -> Result<Exp> {
        Ok(e)
    }

    fn to_string(&self, _p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        Ok(Exp::str_const(
            format_real(e.real_value()?).into_bytes(),
            pos,
        ))
    }

    fn coerce(&self, p: &mut Parser, e: Exp, target: &Type) -> Result<Exp> {
        match target {
            Type::ConstReal | Type::Real => Ok(e),
            Type::ConstInt | Type::Int => self.to_int32(p, e),
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
        Ok(Exp::real_const(a1.real_value()? + const_operand(&a2)?, pos))
    }

    fn mul(&self, _p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let pos = a1.pos;
        Ok(Exp::real_const(a1.real_value()? * const_operand(&a2)?, pos))
    }

    fn eq(&self, _p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let pos = a1.pos;
        Ok(fold_bool(a1.real_value()? == const_operand(&a2)?, pos))
    }

    fn neq(&self, _p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let pos = a1.pos;
        Ok(fold_bool(a1.real_value()? != const_operand(&a2)?, pos))
    }

    fn sub(&self, _p: &mut Parser, a1: Exp, a2: Exp, _swapped: bool) -> Result<Exp> {
        let pos = a1.pos;
        Ok(Exp::real_const(a1.real_value()? - const_operand(&a2)?, pos))
    }

    fn divr(&self, _p: &mut Parser, a1: Exp, a2: Exp, _swapped: bool) -> Result<Exp> {
        let pos = a2.pos;
        let divisor = const_operand(&a2)?;
        if divisor == 0.0 {
            return Err(Error::new(ErrorKind::DivideByZero, pos));
        }
        Ok(Exp::real_const(a1.real_value()? / divisor, a1.pos))
    }

    fn gt(&self, _p: &mut Parser, a1: Exp, a2: Exp, _swapped: bool) -> Result<Exp> {
        let pos = a1.pos;
        Ok(fold_bool(a1.real_value()? > const_operand(&a2)?, pos))
    }

    fn lte(&self, _p: &mut Parser, a1: Exp, a2: Exp, _swapped: bool) -> Result<Exp> {
        let pos = a1.pos;
        Ok(fold_bool(a1.real_value()? <= const_operand(&a2)?, pos))
    }

    fn lt(&self, _p: &mut Parser, a1: Exp, a2: Exp, _swapped: bool) -> Result<Exp> {
        let pos = a1.pos;
        Ok(fold_bool(a1.real_value()? < const_operand(&a2)?, pos))
    }

    fn gte(&self, _p: &mut Parser, a1: Exp, a2: Exp, _swapped: bool) -> Result<Exp> {
        let pos = a1.pos;
        Ok(fold_bool(a1.real_value()? >= const_operand(&a2)?, pos))
    }

    fn pow(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let pos = a1.pos;
        match &a2.ty {
            Type::ConstInt => {
                let exponent = a2.int_value()?;
                if exponent == 0 {
                    return Ok(Exp::real_const(1.0, pos));
                }
                if exponent == 1 {
                    return Ok(a1);
                }
                Ok(Exp::real_const(a1.real_value()?.powi(exponent), pos))
            }
            Type::ConstReal => Ok(Exp::real_const(
                a1.real_value()?.powf(a2.real_value()?),
                pos,
            )),
            _ => {
                let a1 = self.exp_to_var(p, a1)?;
                RealOps.pow(p, a1, a2)
            }
        }
    }

    fn abs(&self, _p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        Ok(Exp::real_const(e.real_value()?.abs(), pos))
    }

    fn sgn(&self, _p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        let v = e.real_value()?;
        Ok(Exp::int_const(if v > 0.0 { 1 } else if v < 0.0 { -1 } else { 0 }, pos))
    }

    fn is_inf(&self, _p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        Ok(fold_bool(e.real_value()?.is_infinite(), pos))
    }

    fn unary_minus(&self, _p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        Ok(Exp::real_const(-e.real_value()?, pos))
    }

    fn print(&self, p: &mut Parser, e: Exp) -> Result<()> {
        let e = self.exp_to_var(p, e)?;
        RealOps.print(p, e)
    }
}

pub struct RealOps;

impl TypeOps for RealOps {
    fn name(&self) -> &'static str {
        "real"
    }

    fn zero(&self, _p: &mut Parser, pos: Position) -> Result<Exp> {
        Ok(Exp::real_const(0.0, pos))
    }

    fn zero_reg(&self, p: &mut Parser, reg: u32, _pos: Position) -> Result<()> {
        p.section().add_instr_reg(
            Opcode::MoviReal,
            Operand::Freg(reg),
            Operand::Real(0.0),
            Operand::None,
        );
        Ok(())
    }

    fn exp_to_var(&self, _p: &mut Parser, e: Exp) -> Result<Exp> {
        Ok(e)
    }

    fn copy_var(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        emit_unary(p, Opcode::Movfp, e.operand()?, pos)
    }

    fn assign_reg(&self, p: &mut Parser, reg: u32, e: Exp) -> Result<()> {
        p.section().add_instr_reg(
            Opcode::Movfp,
            Operand::Freg(reg),
            e.operand()?,
            Operand::None,
        );
        Ok(())
    }

    fn assign_mem(&self, p: &mut Parser, base: u32, loc: u32, e: Exp) -> Result<()> {
        p.section().add_instr_reg(
            Opcode::StoreoReal,
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
            Opcode::LoadoReal,
            Operand::Reg(base),
            Operand::I32(loc as i32),
            pos,
        )
    }

    fn to_int32(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        emit_unary(p, Opcode::MovFpI32, e.operand()?, pos)
    }

    fn to_byte(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let e = self.to_int32(p, e)?;
        super::to_byte(p, e)
    }

    fn to_float64(&self, _p: &mut Parser, e: Exp) -> Result<Exp> {
        Ok(e)
    }

    fn coerce(&self, p: &mut Parser, e: Exp, target: &Type) -> Result<Exp> {
        match target {
            Type::Real => Ok(e),
            Type::ConstInt | Type::Int => self.to_int32(p, e),
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
        real_commutative(
            p,
            a1,
            a2,
            Commutative {
                imm: Opcode::AddiReal,
                reg: Opcode::AddReal,
            },
        )
    }

    fn mul(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        real_commutative(
            p,
            a1,
            a2,
            Commutative {
                imm: Opcode::MuliReal,
                reg: Opcode::MulReal,
            },
        )
    }

    fn eq(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        real_commutative(
            p,
            a1,
            a2,
            Commutative {
                imm: Opcode::EqiReal,
                reg: Opcode::EqReal,
            },
        )
    }

    fn neq(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        real_commutative(
            p,
            a1,
            a2,
            Commutative {
                imm: Opcode::NeqiReal,
                reg: Opcode::NeqReal,
            },
        )
    }

    fn sub(&self, p: &mut Parser, a1: Exp, a2: Exp, swapped: bool) -> Result<Exp> {
        let pos = a1.pos;
        match &a2.ty {
            Type::ConstReal | Type::ConstInt => {
                let value = const_operand(&a2)?;
                let opcode = if swapped {
                    Opcode::RsubiReal
                } else {
                    Opcode::SubiReal
                };
                emit_binary(p, opcode, a1.operand()?, Operand::Real(value), pos)
            }
            Type::Real | Type::Int | Type::Byte => {
                let a2 = to_real_var(p, a2)?;
                emit_binary(p, Opcode::SubReal, a1.operand()?, a2.operand()?, pos)
            }
            other => ns("-", &other.name(), pos),
        }
    }

    fn divr(&self, p: &mut Parser, a1: Exp, a2: Exp, swapped: bool) -> Result<Exp> {
        let pos = a1.pos;
        match &a2.ty {
            Type::ConstReal | Type::ConstInt => {
                let value = const_operand(&a2)?;
                if value == 0.0 && !swapped {
                    return Err(Error::new(ErrorKind::DivideByZero, a2.pos));
                }
                let opcode = if swapped {
                    Opcode::RdiviReal
                } else {
                    Opcode::DiviReal
                };
                emit_binary(p, opcode, a1.operand()?, Operand::Real(value), pos)
            }
            Type::Real | Type::Int | Type::Byte => {
                let a2 = to_real_var(p, a2)?;
                emit_binary(p, Opcode::DivReal, a1.operand()?, a2.operand()?, pos)
            }
            other => ns("/", &other.name(), pos),
        }
    }

    fn gt(&self, p: &mut Parser, a1: Exp, a2: Exp, swapped: bool) -> Result<Exp> {
        real_compare(
            p,
            a1,
            a2,
            swapped,
            Comparison {
                imm: Opcode::GtiReal,
                imm_swapped: Opcode::LtiReal,
                reg: Opcode::GtReal,
            },
        )
    }

    fn lte(&self, p: &mut Parser, a1: Exp, a2: Exp, swapped: bool) -> Result<Exp> {
        real_compare(
            p,
            a1,
            a2,
            swapped,
            Comparison {
                imm: Opcode::LteiReal,
                imm_swapped: Opcode::GteiReal,
                reg: Opcode::LteReal,
            },
        )
    }

    fn lt(&self, p: &mut Parser, a1: Exp, a2: Exp, swapped: bool) -> Result<Exp> {
        real_compare(
            p,
            a1,
            a2,
            swapped,
            Comparison {
                imm: Opcode::LtiReal,
                imm_swapped: Opcode::GtiReal,
                reg: Opcode::LtReal,
            },
        )
    }

    fn gte(&self, p: &mut Parser, a1: Exp, a2: Exp, swapped: bool) -> Result<Exp> {
        real_compare(
            p,
            a1,
            a2,
            swapped,
            Comparison {
                imm: Opcode::GteiReal,
                imm_swapped: Opcode::LteiReal,
                reg: Opcode::GteReal,
            },
        )
    }

    fn pow(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let pos = a1.pos;
        if let Type::ConstInt = &a2.ty {
            let exponent = a2.int_value()?;
            if exponent == 0 {
                return Ok(Exp::real_const(1.0, pos));
            }
            if exponent == 1 {
                return Ok(a1);
            }
        }
        let a2 = super::to_float64(p, a2)?;
        let a2 = to_real_var(p, a2)?;
        emit_binary(p, Opcode::Powr, a1.operand()?, a2.operand()?, pos)
    }

    fn abs(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        emit_unary(p, Opcode::Absr, e.operand()?, pos)
    }

    fn sgn(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        let neg = emit_binary(p, Opcode::LtiReal, e.operand()?, Operand::Real(0.0), pos)?;
        let posi = emit_binary(p, Opcode::GtiReal, e.operand()?, Operand::Real(0.0), pos)?;
        emit_binary(p, Opcode::SubI32, neg.operand()?, posi.operand()?, pos)
    }

    fn is_inf(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        let magnitude = emit_unary(p, Opcode::Absr, e.operand()?, pos)?;
        emit_binary(
            p,
            Opcode::EqiReal,
            magnitude.operand()?,
            Operand::Real(f64::INFINITY),
            pos,
        )
    }

    fn not(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let e = self.to_int32(p, e)?;
        super::not(p, e)
    }

    fn unary_minus(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        emit_binary(p, Opcode::RsubiReal, e.operand()?, Operand::Real(0.0), pos)
    }

    fn ret(&self, p: &mut Parser, reg: u32, _pos: Position) -> Result<()> {
        p.section()
            .add_instr_no_reg(Opcode::RetReal, Operand::Freg(reg));
        Ok(())
    }

    fn print(&self, p: &mut Parser, e: Exp) -> Result<()> {
        p.section()
            .add_instr_no_reg(Opcode::PrintFp, e.operand()?);
        Ok(())
    }
}

/// Compile-time rendering of a real literal, shared by const folding
fn format_real(value: f64) -> String {
    if value == value.trunc() && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
