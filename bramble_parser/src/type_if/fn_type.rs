//! Function-pointer and void operations

use super::TypeOps;
use crate::context::Parser;
use crate::exp::Exp;
use crate::types::Type;
use bramble_common::{Position, Result};
use bramble_ir::{Opcode, Operand};

pub struct FnOps;

impl TypeOps for FnOps {
    fn name(&self) -> &'static str {
        "function pointer"
    }

    fn exp_to_var(&self, _p: &mut Parser, e: Exp) -> Result<Exp> {
        Ok(e)
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
        ty: &Type,
        base: u32,
        loc: u32,
        pos: Position,
    ) -> Result<Exp> {
        let reg = p.section().add_instr(
            Opcode::LoadoI32,
            Operand::Reg(base),
            Operand::I32(loc as i32),
        )?;
        Ok(Exp::var(ty.clone(), Operand::Reg(reg), pos))
    }
}

pub struct VoidOps;

impl TypeOps for VoidOps {
    fn name(&self) -> &'static str {
        "void"
    }

    fn ret(&self, p: &mut Parser, _reg: u32, _pos: Position) -> Result<()> {
        p.section().add_instr_no_arg(Opcode::Ret);
        Ok(())
    }
}
