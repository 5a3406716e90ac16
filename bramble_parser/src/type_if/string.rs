//! String operations
//!
//! A register-backed string expression holds the address of its reference
//! header. Constant strings live in the literal constant area and are copied
//! to the heap when materialised.

use super::int32::emit_binary;
use super::{ns, TypeOps};
use crate::builtins;
use crate::context::Parser;
use crate::exp::{Exp, ExpKind};
use crate::reference;
use crate::types::Type;
use bramble_common::{Error, ErrorKind, Position, Result};
use bramble_ir::{Opcode, Operand, RegisterClass};

/// Materialise the address of a string-pool constant
pub fn lca_const(p: &mut Parser, bytes: &[u8]) -> Result<u32> {
    let id = p.prog.add_string(bytes.to_vec());
    p.section()
        .add_instr(Opcode::Lca, Operand::I32(id as i32), Operand::None)
}

/// Copy a constant string to the heap behind a fresh temporary header and
/// return a register-backed expression for it
pub fn const_str_to_var(p: &mut Parser, bytes: &[u8], pos: Position) -> Result<Exp> {
    let (symbol, base) = p.tmp_var(Type::Str)?;
    let loc = symbol.offset()?;

    if bytes.is_empty() {
        reference::zero_ref(p, base, loc, 0, true)?;
    } else {
        let size = p.section().add_instr(
            Opcode::MoviI32,
            Operand::I32(bytes.len() as i32),
            Operand::None,
        )?;
        let data = reference::alloc(p, &Type::Str, base, loc, size, true)?;
        let lca = lca_const(p, bytes)?;
        builtins::memcpy(p, data, lca, size)?;
    }

    let ptr = reference::get_pointer(p, base, loc)?;
    Ok(Exp::var(Type::Str, Operand::Reg(ptr), pos))
}

/// Initialise a brand-new string variable's header directly from a
/// constant, giving the copy a reference count of one
pub fn init_var_from_const(p: &mut Parser, base: u32, loc: u32, bytes: &[u8]) -> Result<()> {
    if bytes.is_empty() {
        return reference::zero_ref(p, base, loc, 0, true);
    }
    let size = p.section().add_instr(
        Opcode::MoviI32,
        Operand::I32(bytes.len() as i32),
        Operand::None,
    )?;
    let data = reference::alloc(p, &Type::Str, base, loc, size, true)?;
    let lca = lca_const(p, bytes)?;
    builtins::memcpy(p, data, lca, size)
}

/// Render an integer into a fresh temporary string
pub fn int_to_string(p: &mut Parser, e: Exp) -> Result<Exp> {
    let pos = e.pos;
    let value = e.reg()?;

    let (symbol, base) = p.tmp_var(Type::Str)?;
    let loc = symbol.offset()?;
    // widest int32 rendering is 11 characters
    let size = p
        .section()
        .add_instr(Opcode::MoviI32, Operand::I32(16), Operand::None)?;
    let data = reference::alloc(p, &Type::Str, base, loc, size, true)?;
    let length = p
        .section()
        .add_instr(Opcode::I32Todec, Operand::Reg(value), Operand::Reg(data))?;
    reference::store_i32(p, length, base, loc + reference::SIZE_OFF);

    let ptr = reference::get_pointer(p, base, loc)?;
    Ok(Exp::var(Type::Str, Operand::Reg(ptr), pos))
}

/// Render an integer in hex into a fresh temporary string
pub fn int_to_hex_string(p: &mut Parser, e: Exp) -> Result<Exp> {
    let pos = e.pos;
    let value = e.reg()?;

    let (symbol, base) = p.tmp_var(Type::Str)?;
    let loc = symbol.offset()?;
    let size = p
        .section()
        .add_instr(Opcode::MoviI32, Operand::I32(8), Operand::None)?;
    let data = reference::alloc(p, &Type::Str, base, loc, size, true)?;

    builtins::ensure_hex_to_str(p)?;
    let length = builtins::call_builtin_i32(
        p,
        "_hex_to_str",
        &[
            (RegisterClass::Integer, value),
            (RegisterClass::Integer, data),
        ],
    )?;
    reference::store_i32(p, length, base, loc + reference::SIZE_OFF);

    let ptr = reference::get_pointer(p, base, loc)?;
    Ok(Exp::var(Type::Str, Operand::Reg(ptr), pos))
}

pub struct ConstStrOps;

impl TypeOps for ConstStrOps {
    fn name(&self) -> &'static str {
        "const string"
    }

    fn is_const(&self) -> bool {
        true
    }

    fn exp_to_var(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        match &e.kind {
            ExpKind::StrConst(bytes) => const_str_to_var(p, &bytes.clone(), pos),
            _ => Err(Error::assertion_failed(pos)),
        }
    }

    fn copy_var(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        self.exp_to_var(p, e)
    }

    fn assign_mem(&self, p: &mut Parser, base: u32, loc: u32, e: Exp) -> Result<()> {
        let e = self.exp_to_var(p, e)?;
        StrOps.assign_mem(p, base, loc, e)
    }

    fn assign_new_mem(&self, p: &mut Parser, base: u32, loc: u32, e: Exp) -> Result<()> {
        let e = self.exp_to_var(p, e)?;
        StrOps.assign_new_mem(p, base, loc, e)
    }

    fn to_string(&self, _p: &mut Parser, e: Exp) -> Result<Exp> {
        Ok(e)
    }

    fn coerce(&self, p: &mut Parser, e: Exp, target: &Type) -> Result<Exp> {
        match target {
            Type::ConstStr => Ok(e),
            Type::Str => self.exp_to_var(p, e),
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
        // ordering guarantees the partner of a const is also const
        let pos = a1.pos;
        match (&a1.kind, &a2.kind) {
            (ExpKind::StrConst(left), ExpKind::StrConst(right)) => {
                let mut joined = left.clone();
                joined.extend_from_slice(right);
                Ok(Exp::str_const(joined, pos))
            }
            _ => ns("+", self.name(), pos),
        }
    }

    fn print(&self, p: &mut Parser, e: Exp) -> Result<()> {
        let pos = e.pos;
        match &e.kind {
            ExpKind::StrConst(bytes) if bytes.is_empty() => Ok(()),
            ExpKind::StrConst(bytes) => {
                let len = bytes.len() as i32;
                let lca = lca_const(p, &bytes.clone())?;
                p.section()
                    .add_instr2_no_reg(Opcode::PrintStr, Operand::Reg(lca), Operand::I32(len));
                Ok(())
            }
            _ => Err(Error::assertion_failed(pos)),
        }
    }
}

pub struct StrOps;

impl TypeOps for StrOps {
    fn name(&self) -> &'static str {
        "string"
    }

    fn zero(&self, _p: &mut Parser, pos: Position) -> Result<Exp> {
        Ok(Exp::str_const(Vec::new(), pos))
    }

    fn zero_ref(
        &self,
        p: &mut Parser,
        _ty: &Type,
        base: u32,
        loc: u32,
        push: bool,
        _pos: Position,
    ) -> Result<()> {
        reference::zero_ref(p, base, loc, 0, push)
    }

    fn exp_to_var(&self, _p: &mut Parser, e: Exp) -> Result<Exp> {
        Ok(e)
    }

    fn copy_var(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        // fresh header sharing the data, counted on the cleanup stack
        let pos = e.pos;
        let (symbol, base) = p.tmp_var(Type::Str)?;
        let loc = symbol.offset()?;
        reference::copy_ref(p, base, loc, e.reg()?)?;
        let ptr = reference::get_pointer(p, base, loc)?;
        Ok(Exp::var(Type::Str, Operand::Reg(ptr), pos))
    }

    fn assign_mem(&self, p: &mut Parser, base: u32, loc: u32, e: Exp) -> Result<()> {
        reference::assign_ref(p, base, loc, e.reg()?)
    }

    fn assign_new_mem(&self, p: &mut Parser, base: u32, loc: u32, e: Exp) -> Result<()> {
        reference::new_ref(p, base, loc, e.reg()?)?;
        reference::push_reference(p, base, loc)
    }

    fn load_mem(
        &self,
        p: &mut Parser,
        _ty: &Type,
        base: u32,
        loc: u32,
        pos: Position,
    ) -> Result<Exp> {
        let ptr = reference::get_pointer(p, base, loc)?;
        Ok(Exp::var(Type::Str, Operand::Reg(ptr), pos))
    }

    fn to_string(&self, _p: &mut Parser, e: Exp) -> Result<Exp> {
        Ok(e)
    }

    fn add(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        // concatenation into a fresh temporary
        let pos = a1.pos;
        let a2 = super::exp_to_var(p, a2)?;
        let left = a1.reg()?;
        let right = a2.reg()?;

        let (symbol, base) = p.tmp_var(Type::Str)?;
        let loc = symbol.offset()?;

        let size1 = reference::load_i32(p, left, reference::SIZE_OFF)?;
        let size2 = reference::load_i32(p, right, reference::SIZE_OFF)?;
        let total = emit_binary(p, Opcode::AddI32, Operand::Reg(size1), Operand::Reg(size2), pos)?;
        let data = reference::alloc(p, &Type::Str, base, loc, total.reg()?, true)?;

        let src1 = reference::load_i32(p, left, reference::DATA_OFF)?;
        builtins::memcpy(p, data, src1, size1)?;
        let dest2 = emit_binary(p, Opcode::AddI32, Operand::Reg(data), Operand::Reg(size1), pos)?;
        let src2 = reference::load_i32(p, right, reference::DATA_OFF)?;
        builtins::memcpy(p, dest2.reg()?, src2, size2)?;

        let ptr = reference::get_pointer(p, base, loc)?;
        Ok(Exp::var(Type::Str, Operand::Reg(ptr), pos))
    }

    fn append(&self, p: &mut Parser, _ty: &Type, base: u32, loc: u32, e: Exp) -> Result<()> {
        let e = super::exp_to_var(p, e)?;
        let other = e.reg()?;

        let size2 = reference::load_i32(p, other, reference::SIZE_OFF)?;
        let skip = p.section().new_label();
        let grow = p.section().new_label();
        let nonempty = p.section().add_instr(
            Opcode::GtiI32,
            Operand::Reg(size2),
            Operand::I32(0),
        )?;
        p.section().add_instr_reg(
            Opcode::Jmpc,
            Operand::Reg(nonempty),
            Operand::Label(grow),
            Operand::Label(skip),
        );
        p.section().add_label(grow)?;

        let data = reference::ensure_unique(p, base, loc)?;
        let size1 = reference::get_size(p, base, loc)?;
        let total = p
            .section()
            .add_instr(Opcode::AddI32, Operand::Reg(size1), Operand::Reg(size2))?;
        let fresh = p
            .section()
            .add_instr(Opcode::Realloc, Operand::Reg(data), Operand::Reg(total))?;
        crate::exp::handle_errors(p)?;
        reference::store_i32(p, fresh, base, loc + reference::DATA_OFF);
        reference::store_i32(p, total, base, loc + reference::SIZE_OFF);

        let dest = p
            .section()
            .add_instr(Opcode::AddI32, Operand::Reg(fresh), Operand::Reg(size1))?;
        let src = reference::load_i32(p, other, reference::DATA_OFF)?;
        builtins::memcpy(p, dest, src, size2)?;

        p.section().add_label(skip)
    }

    fn coerce(&self, _p: &mut Parser, e: Exp, target: &Type) -> Result<Exp> {
        match target {
            Type::Str => Ok(e),
            other => {
                let pos = e.pos;
                Err(Error::new(
                    ErrorKind::BadConversion {
                        from: "string".to_string(),
                        to: other.name(),
                    },
                    pos,
                ))
            }
        }
    }

    fn print(&self, p: &mut Parser, e: Exp) -> Result<()> {
        let ptr = e.reg()?;
        let size = reference::load_i32(p, ptr, reference::SIZE_OFF)?;
        let data = reference::load_i32(p, ptr, reference::DATA_OFF)?;
        p.section()
            .add_instr2_no_reg(Opcode::PrintStr, Operand::Reg(data), Operand::Reg(size));
        Ok(())
    }
}
