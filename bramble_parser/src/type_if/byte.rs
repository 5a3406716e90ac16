//! Byte operations
//!
//! Bytes travel in integer registers with only the low eight bits
//! significant. Arithmetic and ordered comparisons sign-extend to 32 bits;
//! equality zero-extends.

use super::int32::{emit_binary, emit_unary, IntOps};
use super::TypeOps;
use crate::context::Parser;
use crate::exp::Exp;
use crate::types::Type;
use bramble_common::{Error, ErrorKind, Position, Result};
use bramble_ir::{Opcode, Operand};

/// Sign-extend a byte expression into a 32-bit integer expression
pub(super) fn sign_extend(p: &mut Parser, e: Exp) -> Result<Exp> {
    let pos = e.pos;
    emit_unary(p, Opcode::Signx8To32, e.operand()?, pos)
}

fn zero_extend(p: &mut Parser, e: Exp) -> Result<Exp> {
    let pos = e.pos;
    emit_binary(p, Opcode::AndiI32, e.operand()?, Operand::I32(0xff), pos)
}

pub struct ByteOps;

impl TypeOps for ByteOps {
    fn name(&self) -> &'static str {
        "byte"
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
        let copy = emit_unary(p, Opcode::Mov, e.operand()?, pos)?;
        Ok(Exp::var(Type::Byte, copy.operand()?, pos))
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
            Opcode::StoreoI8,
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
        let loaded = emit_binary(
            p,
            Opcode::LoadoI8,
            Operand::Reg(base),
            Operand::I32(loc as i32),
            pos,
        )?;
        Ok(Exp::var(Type::Byte, loaded.operand()?, pos))
    }

    fn to_int32(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        sign_extend(p, e)
    }

    fn zerox(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        zero_extend(p, e)
    }

    fn to_byte(&self, _p: &mut Parser, e: Exp) -> Result<Exp> {
        Ok(e)
    }

    fn to_float64(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let e = sign_extend(p, e)?;
        super::to_float64(p, e)
    }

    fn to_string(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let e = sign_extend(p, e)?;
        super::to_string(p, e)
    }

    fn to_hex_string(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let e = zero_extend(p, e)?;
        super::to_hex_string(p, e)
    }

    fn coerce(&self, p: &mut Parser, e: Exp, target: &Type) -> Result<Exp> {
        match target {
            Type::Byte => Ok(e),
            Type::ConstInt | Type::Int => self.to_int32(p, e),
            Type::ConstReal | Type::Real => self.to_float64(p, e),
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
        let a1 = sign_extend(p, a1)?;
        IntOps.add(p, a1, a2)
    }

    fn mul(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let a1 = sign_extend(p, a1)?;
        IntOps.mul(p, a1, a2)
    }

    fn and(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let a1 = sign_extend(p, a1)?;
        IntOps.and(p, a1, a2)
    }

    fn or(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let a1 = sign_extend(p, a1)?;
        IntOps.or(p, a1, a2)
    }

    fn eor(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let a1 = sign_extend(p, a1)?;
        IntOps.eor(p, a1, a2)
    }

    fn eq(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let a1 = zero_extend(p, a1)?;
        IntOps.eq(p, a1, a2)
    }

    fn neq(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let a1 = zero_extend(p, a1)?;
        IntOps.neq(p, a1, a2)
    }

    fn sub(&self, p: &mut Parser, a1: Exp, a2: Exp, swapped: bool) -> Result<Exp> {
        let a1 = sign_extend(p, a1)?;
        IntOps.sub(p, a1, a2, swapped)
    }

    fn divr(&self, p: &mut Parser, a1: Exp, a2: Exp, swapped: bool) -> Result<Exp> {
        let a1 = self.to_float64(p, a1)?;
        super::float64::RealOps.divr(p, a1, a2, swapped)
    }

    fn gt(&self, p: &mut Parser, a1: Exp, a2: Exp, swapped: bool) -> Result<Exp> {
        let a1 = sign_extend(p, a1)?;
        IntOps.gt(p, a1, a2, swapped)
    }

    fn lte(&self, p: &mut Parser, a1: Exp, a2: Exp, swapped: bool) -> Result<Exp> {
        let a1 = sign_extend(p, a1)?;
        IntOps.lte(p, a1, a2, swapped)
    }

    fn lt(&self, p: &mut Parser, a1: Exp, a2: Exp, swapped: bool) -> Result<Exp> {
        let a1 = sign_extend(p, a1)?;
        IntOps.lt(p, a1, a2, swapped)
    }

    fn gte(&self, p: &mut Parser, a1: Exp, a2: Exp, swapped: bool) -> Result<Exp> {
        let a1 = sign_extend(p, a1)?;
        IntOps.gte(p, a1, a2, swapped)
    }

    fn div(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let a1 = sign_extend(p, a1)?;
        IntOps.div(p, a1, a2)
    }

    fn modulo(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let a1 = sign_extend(p, a1)?;
        IntOps.modulo(p, a1, a2)
    }

    fn lsl(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let a1 = sign_extend(p, a1)?;
        IntOps.lsl(p, a1, a2)
    }

    fn lsr(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let a1 = zero_extend(p, a1)?;
        IntOps.lsr(p, a1, a2)
    }

    fn asr(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let a1 = sign_extend(p, a1)?;
        IntOps.asr(p, a1, a2)
    }

    fn pow(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let a1 = sign_extend(p, a1)?;
        IntOps.pow(p, a1, a2)
    }

    fn abs(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let e = sign_extend(p, e)?;
        IntOps.abs(p, e)
    }

    fn sgn(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let e = sign_extend(p, e)?;
        IntOps.sgn(p, e)
    }

    fn not(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let e = sign_extend(p, e)?;
        IntOps.not(p, e)
    }

    fn unary_minus(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let e = sign_extend(p, e)?;
        IntOps.unary_minus(p, e)
    }

    fn ret(&self, p: &mut Parser, reg: u32, _pos: Position) -> Result<()> {
        p.section()
            .add_instr_no_reg(Opcode::RetI32, Operand::Reg(reg));
        Ok(())
    }

    fn print(&self, p: &mut Parser, e: Exp) -> Result<()> {
        let e = sign_extend(p, e)?;
        IntOps.print(p, e)
    }
}
