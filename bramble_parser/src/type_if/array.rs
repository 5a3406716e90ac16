//! Collection operations
//!
//! Arrays and vectors are reference types; most capabilities forward to the
//! element type or to the machinery in [`crate::array`]. Element access on
//! record elements is limited to reads; in-place record element assignment
//! is refused.

use super::TypeOps;
use crate::array;
use crate::context::Parser;
use crate::exp::Exp;
use crate::reference;
use crate::type_if;
use crate::types::Type;
use bramble_common::{Error, Position, Result};
use bramble_ir::Operand;

fn dims_of(ty: &Type) -> u32 {
    match ty {
        Type::Array(arr) => arr.dims.len() as u32,
        Type::Vector(_) => 1,
        _ => 0,
    }
}

fn collection_copy_var(p: &mut Parser, ty: &Type, e: Exp) -> Result<Exp> {
    let pos = e.pos;
    let (symbol, base) = p.tmp_var(ty.clone())?;
    let loc = symbol.offset()?;
    let src = e.reg()?;
    reference::copy_ref(p, base, loc, src)?;
    array::copy_dims(p, dims_of(ty) as usize, base, loc, src)?;
    let ptr = reference::get_pointer(p, base, loc)?;
    Ok(Exp::var(ty.clone(), Operand::Reg(ptr), pos))
}

fn collection_assign_mem(p: &mut Parser, ty: &Type, base: u32, loc: u32, e: Exp) -> Result<()> {
    let src = e.reg()?;
    reference::assign_ref(p, base, loc, src)?;
    array::copy_dims(p, dims_of(ty) as usize, base, loc, src)
}

fn collection_assign_new_mem(p: &mut Parser, ty: &Type, base: u32, loc: u32, e: Exp) -> Result<()> {
    let src = e.reg()?;
    reference::new_ref(p, base, loc, src)?;
    array::copy_dims(p, dims_of(ty) as usize, base, loc, src)?;
    reference::push_reference(p, base, loc)
}

fn collection_read(
    p: &mut Parser,
    ty: &Type,
    base: u32,
    loc: u32,
    indices: Vec<Exp>,
    pos: Position,
) -> Result<Exp> {
    let elem = ty.element().ok_or(Error::assertion_failed(pos))?.clone();
    let addr = array::element_address(p, ty, base, loc, indices, pos)?;
    type_if::load_mem(p, &elem, addr.reg()?, 0, pos)
}

fn collection_write(
    p: &mut Parser,
    ty: &Type,
    base: u32,
    loc: u32,
    e: Exp,
    indices: Vec<Exp>,
) -> Result<()> {
    let pos = e.pos;
    let elem = ty.element().ok_or(Error::assertion_failed(pos))?.clone();
    if matches!(elem, Type::Rec(_)) {
        return Err(Error::not_supported("indexed write", elem.name(), pos));
    }
    let e = type_if::coerce(p, e, &elem)?;
    let e = type_if::exp_to_var(p, e)?;
    let addr = array::element_address(p, ty, base, loc, indices, pos)?;
    if elem.is_reference() {
        return reference::assign_ref(p, addr.reg()?, 0, e.reg()?);
    }
    // the value takes a private register so the store never sees its own
    // address register as the source
    let e = type_if::copy_var(p, e)?;
    type_if::assign_mem(p, addr.reg()?, 0, e)
}

fn collection_modify(
    p: &mut Parser,
    ty: &Type,
    base: u32,
    loc: u32,
    e: Exp,
    indices: Vec<Exp>,
    subtract: bool,
) -> Result<()> {
    let pos = e.pos;
    let elem = ty.element().ok_or(Error::assertion_failed(pos))?.clone();
    if !elem.is_numeric() {
        return Err(Error::not_supported("indexed update", elem.name(), pos));
    }
    let addr = array::element_address(p, ty, base, loc, indices, pos)?;
    let addr_reg = addr.reg()?;
    let current = type_if::load_mem(p, &elem, addr_reg, 0, pos)?;
    let result = if subtract {
        type_if::sub(p, current, e)?
    } else {
        type_if::add(p, current, e)?
    };
    let result = type_if::coerce(p, result, &elem)?;
    let result = type_if::exp_to_var(p, result)?;
    let result = type_if::copy_var(p, result)?;
    type_if::assign_mem(p, addr_reg, 0, result)
}

pub struct ArrayOps;

impl TypeOps for ArrayOps {
    fn name(&self) -> &'static str {
        "array"
    }

    fn zero_ref(
        &self,
        p: &mut Parser,
        ty: &Type,
        base: u32,
        loc: u32,
        push: bool,
        _pos: Position,
    ) -> Result<()> {
        reference::zero_ref(p, base, loc, dims_of(ty), push)
    }

    fn exp_to_var(&self, _p: &mut Parser, e: Exp) -> Result<Exp> {
        Ok(e)
    }

    fn copy_var(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let ty = e.ty.clone();
        collection_copy_var(p, &ty, e)
    }

    fn assign_mem(&self, p: &mut Parser, base: u32, loc: u32, e: Exp) -> Result<()> {
        let ty = e.ty.clone();
        collection_assign_mem(p, &ty, base, loc, e)
    }

    fn assign_new_mem(&self, p: &mut Parser, base: u32, loc: u32, e: Exp) -> Result<()> {
        let ty = e.ty.clone();
        collection_assign_new_mem(p, &ty, base, loc, e)
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

    fn indexed_read(
        &self,
        p: &mut Parser,
        ty: &Type,
        base: u32,
        loc: u32,
        indices: Vec<Exp>,
        pos: Position,
    ) -> Result<Exp> {
        collection_read(p, ty, base, loc, indices, pos)
    }

    fn indexed_write(
        &self,
        p: &mut Parser,
        ty: &Type,
        base: u32,
        loc: u32,
        e: Exp,
        indices: Vec<Exp>,
    ) -> Result<()> {
        collection_write(p, ty, base, loc, e, indices)
    }

    fn indexed_add(
        &self,
        p: &mut Parser,
        ty: &Type,
        base: u32,
        loc: u32,
        e: Exp,
        indices: Vec<Exp>,
    ) -> Result<()> {
        collection_modify(p, ty, base, loc, e, indices, false)
    }

    fn indexed_sub(
        &self,
        p: &mut Parser,
        ty: &Type,
        base: u32,
        loc: u32,
        e: Exp,
        indices: Vec<Exp>,
    ) -> Result<()> {
        collection_modify(p, ty, base, loc, e, indices, true)
    }

    fn indexed_address(
        &self,
        p: &mut Parser,
        ty: &Type,
        base: u32,
        loc: u32,
        indices: Vec<Exp>,
        pos: Position,
    ) -> Result<Exp> {
        array::element_address(p, ty, base, loc, indices, pos)
    }

    fn set(&self, p: &mut Parser, ty: &Type, base: u32, loc: u32, e: Exp) -> Result<()> {
        array::fill(p, ty, base, loc, e)
    }

    fn zero_buf(
        &self,
        p: &mut Parser,
        ty: &Type,
        data_reg: u32,
        size_reg: u32,
        pos: Position,
    ) -> Result<()> {
        let elem = ty.element().ok_or(Error::assertion_failed(pos))?.clone();
        array::zero_buf(p, &elem, data_reg, size_reg)
    }

    fn destructor(&self, p: &mut Parser, ty: &Type, pos: Position) -> Result<Option<usize>> {
        let elem = ty.element().ok_or(Error::assertion_failed(pos))?.clone();
        array::element_destructor(p, &elem)
    }
}

pub struct VectorOps;

impl TypeOps for VectorOps {
    fn name(&self) -> &'static str {
        "vector"
    }

    fn zero_ref(
        &self,
        p: &mut Parser,
        ty: &Type,
        base: u32,
        loc: u32,
        push: bool,
        _pos: Position,
    ) -> Result<()> {
        reference::zero_ref(p, base, loc, dims_of(ty), push)
    }

    fn exp_to_var(&self, _p: &mut Parser, e: Exp) -> Result<Exp> {
        Ok(e)
    }

    fn copy_var(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let ty = e.ty.clone();
        collection_copy_var(p, &ty, e)
    }

    fn assign_mem(&self, p: &mut Parser, base: u32, loc: u32, e: Exp) -> Result<()> {
        let ty = e.ty.clone();
        collection_assign_mem(p, &ty, base, loc, e)
    }

    fn assign_new_mem(&self, p: &mut Parser, base: u32, loc: u32, e: Exp) -> Result<()> {
        let ty = e.ty.clone();
        collection_assign_new_mem(p, &ty, base, loc, e)
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

    fn indexed_read(
        &self,
        p: &mut Parser,
        ty: &Type,
        base: u32,
        loc: u32,
        indices: Vec<Exp>,
        pos: Position,
    ) -> Result<Exp> {
        collection_read(p, ty, base, loc, indices, pos)
    }

    fn indexed_write(
        &self,
        p: &mut Parser,
        ty: &Type,
        base: u32,
        loc: u32,
        e: Exp,
        indices: Vec<Exp>,
    ) -> Result<()> {
        collection_write(p, ty, base, loc, e, indices)
    }

    fn indexed_add(
        &self,
        p: &mut Parser,
        ty: &Type,
        base: u32,
        loc: u32,
        e: Exp,
        indices: Vec<Exp>,
    ) -> Result<()> {
        collection_modify(p, ty, base, loc, e, indices, false)
    }

    fn indexed_sub(
        &self,
        p: &mut Parser,
        ty: &Type,
        base: u32,
        loc: u32,
        e: Exp,
        indices: Vec<Exp>,
    ) -> Result<()> {
        collection_modify(p, ty, base, loc, e, indices, true)
    }

    fn indexed_address(
        &self,
        p: &mut Parser,
        ty: &Type,
        base: u32,
        loc: u32,
        indices: Vec<Exp>,
        pos: Position,
    ) -> Result<Exp> {
        array::element_address(p, ty, base, loc, indices, pos)
    }

    fn set(&self, p: &mut Parser, ty: &Type, base: u32, loc: u32, e: Exp) -> Result<()> {
        array::fill(p, ty, base, loc, e)
    }

    fn append(&self, p: &mut Parser, ty: &Type, base: u32, loc: u32, e: Exp) -> Result<()> {
        array::append(p, ty, base, loc, e)
    }

    fn zero_buf(
        &self,
        p: &mut Parser,
        ty: &Type,
        data_reg: u32,
        size_reg: u32,
        pos: Position,
    ) -> Result<()> {
        let elem = ty.element().ok_or(Error::assertion_failed(pos))?.clone();
        array::zero_buf(p, &elem, data_reg, size_reg)
    }

    fn destructor(&self, p: &mut Parser, ty: &Type, pos: Position) -> Result<Option<usize>> {
        let elem = ty.element().ok_or(Error::assertion_failed(pos))?.clone();
        array::element_destructor(p, &elem)
    }
}
