//! Record operations
//!
//! A register-backed record expression holds the address of the instance.
//! Assignment and zeroing go through the record's synthesised helper
//! sections.

use super::TypeOps;
use crate::context::Parser;
use crate::exp::Exp;
use crate::rec;
use crate::reference;
use crate::types::Type;
use bramble_common::{Error, Position, Result};
use bramble_ir::Operand;

fn rec_of(ty: &Type) -> Result<&crate::types::RecType> {
    match ty {
        Type::Rec(rec) => Ok(rec),
        _ => Err(Error::internal()),
    }
}

pub struct RecOps;

impl TypeOps for RecOps {
    fn name(&self) -> &'static str {
        "record"
    }

    fn zero_ref(
        &self,
        p: &mut Parser,
        ty: &Type,
        base: u32,
        loc: u32,
        _push: bool,
        _pos: Position,
    ) -> Result<()> {
        let rec = rec_of(ty)?.clone();
        let ptr = reference::get_pointer(p, base, loc)?;
        rec::call_rec_zero(p, &rec, ptr)
    }

    fn exp_to_var(&self, _p: &mut Parser, e: Exp) -> Result<Exp> {
        Ok(e)
    }

    fn copy_var(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        let ty = e.ty.clone();
        let rec = rec_of(&ty)?.clone();
        let (symbol, base) = p.tmp_var(ty.clone())?;
        let loc = symbol.offset()?;
        let dest = reference::get_pointer(p, base, loc)?;
        rec::call_rec_zero(p, &rec, dest)?;
        rec::call_rec_copy(p, &rec, dest, e.reg()?)?;
        Ok(Exp::var(ty, Operand::Reg(dest), pos))
    }

    fn assign_mem(&self, p: &mut Parser, base: u32, loc: u32, e: Exp) -> Result<()> {
        let rec = rec_of(&e.ty)?.clone();
        let dest = reference::get_pointer(p, base, loc)?;
        rec::call_rec_copy(p, &rec, dest, e.reg()?)
    }

    fn assign_new_mem(&self, p: &mut Parser, base: u32, loc: u32, e: Exp) -> Result<()> {
        // zero first so the field-wise copy never releases garbage
        let rec = rec_of(&e.ty)?.clone();
        let dest = reference::get_pointer(p, base, loc)?;
        rec::call_rec_zero(p, &rec, dest)?;
        rec::call_rec_copy(p, &rec, dest, e.reg()?)
    }

    fn load_mem(
        &self,
        p: &mut Parser,
        ty: &Type,
        base: u32,
        loc: u32,
        pos: Position,
    ) -> Result<Exp> {
        let ptr = reference::get_pointer(p, base, loc)?;
        Ok(Exp::var(ty.clone(), Operand::Reg(ptr), pos))
    }

    fn destructor(&self, p: &mut Parser, ty: &Type, _pos: Position) -> Result<Option<usize>> {
        let rec = rec_of(ty)?.clone();
        if !rec.has_references() {
            return Ok(None);
        }
        Ok(Some(rec::ensure_rec_deref(p, &rec)?))
    }
}
