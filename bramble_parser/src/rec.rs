//! Record machinery
//!
//! Records are stored inline; their reference-typed fields own heap data.
//! Each record type gets synthesised helper sections, created once per
//! program: `_<name>_zero` initialises an instance, `_<name>_copy` assigns
//! one over another field by field, and `_<name>_deref` releases the
//! reference fields. The deref helper doubles as the element destructor for
//! collections of this record type.

use crate::builtins;
use crate::context::Parser;
use crate::reference;
use crate::types::{RecType, Type};
use bramble_common::Result;
use bramble_ir::{Opcode, Operand, RegisterClass};

fn zero_name(rec: &RecType) -> String {
    format!("_{}_zero", rec.name)
}

fn copy_name(rec: &RecType) -> String {
    format!("_{}_copy", rec.name)
}

fn deref_name(rec: &RecType) -> String {
    format!("_{}_deref", rec.name)
}

/// `_<name>_zero(ptr)`: zero every field in declaration order
pub fn ensure_rec_zero(p: &mut Parser, rec: &RecType) -> Result<usize> {
    let name = zero_name(rec);
    let rec = rec.clone();
    builtins::get_or_create(p, &name, move |p| {
        let ptr = p.section().alloc_reg(RegisterClass::Integer);
        let zero = p
            .section()
            .add_instr(Opcode::MoviI32, Operand::I32(0), Operand::None)?;

        for field in &rec.fields {
            match &field.ty {
                Type::ConstInt | Type::Int | Type::Fn(_) => {
                    reference::store_i32(p, zero, ptr, field.offset);
                }
                Type::Byte => {
                    p.section().add_instr_reg(
                        Opcode::StoreoI8,
                        Operand::Reg(zero),
                        Operand::Reg(ptr),
                        Operand::I32(field.offset as i32),
                    );
                }
                Type::ConstReal | Type::Real => {
                    let fzero = p.section().add_instr(
                        Opcode::MoviReal,
                        Operand::Real(0.0),
                        Operand::None,
                    )?;
                    p.section().add_instr_reg(
                        Opcode::StoreoReal,
                        Operand::Freg(fzero),
                        Operand::Reg(ptr),
                        Operand::I32(field.offset as i32),
                    );
                }
                Type::ConstStr | Type::Str | Type::Vector(_) => {
                    reference::zero_ref(p, ptr, field.offset, 0, false)?;
                }
                Type::Array(arr) => {
                    reference::zero_ref(p, ptr, field.offset, arr.dims.len() as u32, false)?;
                }
                Type::Rec(nested) => {
                    let field_ptr = reference::get_pointer(p, ptr, field.offset)?;
                    call_rec_zero(p, nested, field_ptr)?;
                }
                Type::Void => {}
            }
        }

        let end = p.section_ref().end_label;
        p.section().add_label(end)?;
        p.section().add_instr_no_arg(Opcode::Ret);
        Ok(())
    })
}

/// `_<name>_copy(dest, src)`: scalar fields are stored, reference fields
/// release the old data and share the new
pub fn ensure_rec_copy(p: &mut Parser, rec: &RecType) -> Result<usize> {
    let name = copy_name(rec);
    let rec = rec.clone();
    builtins::get_or_create(p, &name, move |p| {
        let dest = p.section().alloc_reg(RegisterClass::Integer);
        let src = p.section().alloc_reg(RegisterClass::Integer);

        for field in &rec.fields {
            let offset = field.offset;
            match &field.ty {
                Type::ConstInt | Type::Int | Type::Fn(_) => {
                    let value = reference::load_i32(p, src, offset)?;
                    reference::store_i32(p, value, dest, offset);
                }
                Type::Byte => {
                    let value = p.section().add_instr(
                        Opcode::LoadoI8,
                        Operand::Reg(src),
                        Operand::I32(offset as i32),
                    )?;
                    p.section().add_instr_reg(
                        Opcode::StoreoI8,
                        Operand::Reg(value),
                        Operand::Reg(dest),
                        Operand::I32(offset as i32),
                    );
                }
                Type::ConstReal | Type::Real => {
                    let value = p.section().add_instr(
                        Opcode::LoadoReal,
                        Operand::Reg(src),
                        Operand::I32(offset as i32),
                    )?;
                    p.section().add_instr_reg(
                        Opcode::StoreoReal,
                        Operand::Freg(value),
                        Operand::Reg(dest),
                        Operand::I32(offset as i32),
                    );
                }
                Type::ConstStr | Type::Str | Type::Vector(_) => {
                    let field_ptr = reference::get_pointer(p, src, offset)?;
                    reference::assign_ref(p, dest, offset, field_ptr)?;
                }
                Type::Array(arr) => {
                    let field_ptr = reference::get_pointer(p, src, offset)?;
                    reference::assign_ref(p, dest, offset, field_ptr)?;
                    crate::array::copy_dims(p, arr.dims.len(), dest, offset, field_ptr)?;
                }
                Type::Rec(nested) => {
                    let dest_ptr = reference::get_pointer(p, dest, offset)?;
                    let src_ptr = reference::get_pointer(p, src, offset)?;
                    call_rec_copy(p, nested, dest_ptr, src_ptr)?;
                }
                Type::Void => {}
            }
        }

        let end = p.section_ref().end_label;
        p.section().add_label(end)?;
        p.section().add_instr_no_arg(Opcode::Ret);
        Ok(())
    })
}

/// `_<name>_deref(ptr)`: release every field that owns heap data, in
/// declaration order
pub fn ensure_rec_deref(p: &mut Parser, rec: &RecType) -> Result<usize> {
    let name = deref_name(rec);
    let rec = rec.clone();
    builtins::get_or_create(p, &name, move |p| {
        let ptr = p.section().alloc_reg(RegisterClass::Integer);

        for field in &rec.fields {
            match &field.ty {
                Type::ConstStr | Type::Str | Type::Array(_) | Type::Vector(_) => {
                    reference::deref(p, ptr, field.offset)?;
                }
                Type::Rec(nested) if nested.has_references() => {
                    let field_ptr = reference::get_pointer(p, ptr, field.offset)?;
                    call_rec_deref(p, nested, field_ptr)?;
                }
                _ => {}
            }
        }

        let end = p.section_ref().end_label;
        p.section().add_label(end)?;
        p.section().add_instr_no_arg(Opcode::Ret);
        Ok(())
    })
}

pub fn call_rec_zero(p: &mut Parser, rec: &RecType, ptr_reg: u32) -> Result<()> {
    let name = zero_name(rec);
    ensure_rec_zero(p, rec)?;
    builtins::call_builtin_proc(p, &name, &[(RegisterClass::Integer, ptr_reg)])
}

pub fn call_rec_copy(p: &mut Parser, rec: &RecType, dest_reg: u32, src_reg: u32) -> Result<()> {
    let name = copy_name(rec);
    ensure_rec_copy(p, rec)?;
    builtins::call_builtin_proc(
        p,
        &name,
        &[
            (RegisterClass::Integer, dest_reg),
            (RegisterClass::Integer, src_reg),
        ],
    )
}

pub fn call_rec_deref(p: &mut Parser, rec: &RecType, ptr_reg: u32) -> Result<()> {
    let name = deref_name(rec);
    ensure_rec_deref(p, rec)?;
    builtins::call_builtin_proc(p, &name, &[(RegisterClass::Integer, ptr_reg)])
}
