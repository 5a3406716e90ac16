//! Synthesised builtin sections
//!
//! Each builtin is an IR section created at most once per program and
//! memoised by name. Builtins carry no declared type signature, which tells
//! the call resolver to bind them without argument checks; their bodies are
//! emitted here with the same section builder ordinary code uses.
//!
//! Calling convention inside a builtin body: integer parameters occupy the
//! first registers handed out by the allocator (`TEMP_START`, ...), real
//! parameters the same slots of the floating bank.

use crate::context::Parser;
use crate::exp;
use crate::types::Type;
use bramble_common::{Error, ErrorKind, Position, Result};
use bramble_ir::{IrArg, Opcode, Operand, RegisterClass};
use log::debug;

/// Look the builtin up, creating and building it on first use. A concurrent
/// registration of the same name is not an error: the earlier definition is
/// authoritative.
pub fn get_or_create(
    p: &mut Parser,
    name: &str,
    build: impl FnOnce(&mut Parser) -> Result<()>,
) -> Result<usize> {
    if let Some(index) = p.prog.find(name) {
        return Ok(index);
    }
    debug!("synthesising builtin '{}'", name);
    let index = match p.prog.section_new(name, None, Position::none()) {
        Ok(index) => index,
        Err(err) if matches!(err.kind, ErrorKind::AlreadyDefined(_)) => {
            return p.prog.find(name).ok_or_else(Error::internal)
        }
        Err(err) => return Err(err),
    };
    p.with_section(index, build)?;
    Ok(index)
}

/// Emit a call to a builtin procedure
pub fn call_builtin_proc(p: &mut Parser, name: &str, regs: &[(RegisterClass, u32)]) -> Result<()> {
    let args = make_args(p, regs);
    let pos = p.pos();
    exp::add_call(p, name.to_string(), Vec::new(), args, &Type::Void, pos)?;
    Ok(())
}

/// Emit a call to a builtin returning an integer
pub fn call_builtin_i32(p: &mut Parser, name: &str, regs: &[(RegisterClass, u32)]) -> Result<u32> {
    let args = make_args(p, regs);
    let pos = p.pos();
    let result = exp::add_call(p, name.to_string(), Vec::new(), args, &Type::Int, pos)?
        .ok_or_else(Error::internal)?;
    result.reg()
}

fn make_args(p: &mut Parser, regs: &[(RegisterClass, u32)]) -> Vec<IrArg> {
    regs.iter()
        .map(|(class, reg)| {
            let nop = p.section().add_nop();
            IrArg {
                class: *class,
                reg: *reg,
                nop,
            }
        })
        .collect()
}

fn finish_proc_body(p: &mut Parser) -> Result<()> {
    let end = p.section_ref().end_label;
    p.section().add_label(end)?;
    p.section().add_instr_no_arg(Opcode::Ret);
    Ok(())
}

// ----- memory builtins -----

/// `_memcpy(dest, src, size)`: byte copy loop
pub fn ensure_memcpy(p: &mut Parser) -> Result<usize> {
    get_or_create(p, "_memcpy", |p| {
        let dest = p.section().alloc_reg(RegisterClass::Integer);
        let src = p.section().alloc_reg(RegisterClass::Integer);
        let size = p.section().alloc_reg(RegisterClass::Integer);

        let loop_label = p.section().new_label();
        let body = p.section().new_label();
        let done = p.section().new_label();

        p.section().add_label(loop_label)?;
        let more = p
            .section()
            .add_instr(Opcode::GtiI32, Operand::Reg(size), Operand::I32(0))?;
        p.section().add_instr_reg(
            Opcode::Jmpc,
            Operand::Reg(more),
            Operand::Label(body),
            Operand::Label(done),
        );
        p.section().add_label(body)?;
        let byte = p
            .section()
            .add_instr(Opcode::LoadoI8, Operand::Reg(src), Operand::I32(0))?;
        p.section().add_instr_reg(
            Opcode::StoreoI8,
            Operand::Reg(byte),
            Operand::Reg(dest),
            Operand::I32(0),
        );
        for reg in [dest, src] {
            p.section().add_instr_reg(
                Opcode::AddiI32,
                Operand::Reg(reg),
                Operand::Reg(reg),
                Operand::I32(1),
            );
        }
        p.section().add_instr_reg(
            Opcode::AddiI32,
            Operand::Reg(size),
            Operand::Reg(size),
            Operand::I32(-1),
        );
        p.section()
            .add_instr_no_reg(Opcode::Jmp, Operand::Label(loop_label));
        p.section().add_label(done)?;

        finish_proc_body(p)
    })
}

/// Emit a `_memcpy` call
pub fn memcpy(p: &mut Parser, dest: u32, src: u32, size: u32) -> Result<()> {
    ensure_memcpy(p)?;
    call_builtin_proc(
        p,
        "_memcpy",
        &[
            (RegisterClass::Integer, dest),
            (RegisterClass::Integer, src),
            (RegisterClass::Integer, size),
        ],
    )
}

fn memset_body(p: &mut Parser, stride: i32, store: Opcode, value_class: RegisterClass) -> Result<()> {
    let dest = p.section().alloc_reg(RegisterClass::Integer);
    let size = p.section().alloc_reg(RegisterClass::Integer);
    let value = p.section().alloc_reg(value_class);
    let value_operand = match value_class {
        RegisterClass::Integer => Operand::Reg(value),
        RegisterClass::Real => Operand::Freg(value),
    };

    let loop_label = p.section().new_label();
    let body = p.section().new_label();
    let done = p.section().new_label();

    p.section().add_label(loop_label)?;
    let more = p
        .section()
        .add_instr(Opcode::GtiI32, Operand::Reg(size), Operand::I32(0))?;
    p.section().add_instr_reg(
        Opcode::Jmpc,
        Operand::Reg(more),
        Operand::Label(body),
        Operand::Label(done),
    );
    p.section().add_label(body)?;
    p.section()
        .add_instr_reg(store, value_operand, Operand::Reg(dest), Operand::I32(0));
    p.section().add_instr_reg(
        Opcode::AddiI32,
        Operand::Reg(dest),
        Operand::Reg(dest),
        Operand::I32(stride),
    );
    p.section().add_instr_reg(
        Opcode::AddiI32,
        Operand::Reg(size),
        Operand::Reg(size),
        Operand::I32(-stride),
    );
    p.section()
        .add_instr_no_reg(Opcode::Jmp, Operand::Label(loop_label));
    p.section().add_label(done)?;

    finish_proc_body(p)
}

/// `_memseti8(dest, size, value)`
pub fn ensure_memseti8(p: &mut Parser) -> Result<usize> {
    get_or_create(p, "_memseti8", |p| {
        memset_body(p, 1, Opcode::StoreoI8, RegisterClass::Integer)
    })
}

/// `_memseti32(dest, size, value)`
pub fn ensure_memseti32(p: &mut Parser) -> Result<usize> {
    get_or_create(p, "_memseti32", |p| {
        memset_body(p, 4, Opcode::StoreoI32, RegisterClass::Integer)
    })
}

/// `_memseti64(dest, size, value)`: the value travels in the floating bank
pub fn ensure_memseti64(p: &mut Parser) -> Result<usize> {
    get_or_create(p, "_memseti64", |p| {
        memset_body(p, 8, Opcode::StoreoReal, RegisterClass::Real)
    })
}

// ----- destructor plumbing -----

/// `_call_deref(header_ptr, destructor_id)`: indirect call to a synthesised
/// destructor through its section id
pub fn ensure_call_deref(p: &mut Parser) -> Result<usize> {
    get_or_create(p, "_call_deref", |p| {
        let ptr = p.section().alloc_reg(RegisterClass::Integer);
        let target = p.section().alloc_reg(RegisterClass::Integer);
        let nop = p.section().add_nop();
        p.section().add_call_ptr(
            bramble_ir::CallKind::Proc,
            vec![IrArg {
                class: RegisterClass::Integer,
                reg: ptr,
                nop,
            }],
            target,
        );
        finish_proc_body(p)
    })
}

/// Emit a `_call_deref` call
pub fn call_deref(p: &mut Parser, ptr_reg: u32, destructor_reg: u32) -> Result<()> {
    ensure_call_deref(p)?;
    call_builtin_proc(
        p,
        "_call_deref",
        &[
            (RegisterClass::Integer, ptr_reg),
            (RegisterClass::Integer, destructor_reg),
        ],
    )
}

/// `_hex_to_str(value, buf)`: render a 32-bit value as uppercase hex,
/// skipping leading zeros, returning the length
pub fn ensure_hex_to_str(p: &mut Parser) -> Result<usize> {
    get_or_create(p, "_hex_to_str", |p| {
        let value = p.section().alloc_reg(RegisterClass::Integer);
        let buf = p.section().alloc_reg(RegisterClass::Integer);

        let cursor = p
            .section()
            .add_instr(Opcode::Mov, Operand::Reg(buf), Operand::None)?;
        let shift = p
            .section()
            .add_instr(Opcode::MoviI32, Operand::I32(28), Operand::None)?;
        let started = p
            .section()
            .add_instr(Opcode::MoviI32, Operand::I32(0), Operand::None)?;

        let loop_label = p.section().new_label();
        let body = p.section().new_label();
        let emit = p.section().new_label();
        let skip = p.section().new_label();
        let digit = p.section().new_label();
        let alpha = p.section().new_label();
        let store = p.section().new_label();
        let done = p.section().new_label();

        p.section().add_label(loop_label)?;
        let more = p
            .section()
            .add_instr(Opcode::GteiI32, Operand::Reg(shift), Operand::I32(0))?;
        p.section().add_instr_reg(
            Opcode::Jmpc,
            Operand::Reg(more),
            Operand::Label(body),
            Operand::Label(done),
        );
        p.section().add_label(body)?;

        let nibble = p
            .section()
            .add_instr(Opcode::LsrI32, Operand::Reg(value), Operand::Reg(shift))?;
        let nibble = p
            .section()
            .add_instr(Opcode::AndiI32, Operand::Reg(nibble), Operand::I32(0xf))?;

        // emit once a nonzero nibble has been seen, and always for the last
        let nonzero = p
            .section()
            .add_instr(Opcode::NeqiI32, Operand::Reg(nibble), Operand::I32(0))?;
        p.section().add_instr_reg(
            Opcode::OrI32,
            Operand::Reg(started),
            Operand::Reg(started),
            Operand::Reg(nonzero),
        );
        let last = p
            .section()
            .add_instr(Opcode::EqiI32, Operand::Reg(shift), Operand::I32(0))?;
        let wanted = p
            .section()
            .add_instr(Opcode::OrI32, Operand::Reg(started), Operand::Reg(last))?;
        p.section().add_instr_reg(
            Opcode::Jmpc,
            Operand::Reg(wanted),
            Operand::Label(emit),
            Operand::Label(skip),
        );
        p.section().add_label(emit)?;

        let is_digit = p
            .section()
            .add_instr(Opcode::LtiI32, Operand::Reg(nibble), Operand::I32(10))?;
        p.section().add_instr_reg(
            Opcode::Jmpc,
            Operand::Reg(is_digit),
            Operand::Label(digit),
            Operand::Label(alpha),
        );
        p.section().add_label(digit)?;
        let ch_digit = p
            .section()
            .add_instr(Opcode::AddiI32, Operand::Reg(nibble), Operand::I32('0' as i32))?;
        p.section().add_instr_reg(
            Opcode::Mov,
            Operand::Reg(nibble),
            Operand::Reg(ch_digit),
            Operand::None,
        );
        p.section()
            .add_instr_no_reg(Opcode::Jmp, Operand::Label(store));
        p.section().add_label(alpha)?;
        let ch_alpha = p.section().add_instr(
            Opcode::AddiI32,
            Operand::Reg(nibble),
            Operand::I32('A' as i32 - 10),
        )?;
        p.section().add_instr_reg(
            Opcode::Mov,
            Operand::Reg(nibble),
            Operand::Reg(ch_alpha),
            Operand::None,
        );
        p.section().add_label(store)?;
        p.section().add_instr_reg(
            Opcode::StoreoI8,
            Operand::Reg(nibble),
            Operand::Reg(cursor),
            Operand::I32(0),
        );
        p.section().add_instr_reg(
            Opcode::AddiI32,
            Operand::Reg(cursor),
            Operand::Reg(cursor),
            Operand::I32(1),
        );

        p.section().add_label(skip)?;
        p.section().add_instr_reg(
            Opcode::AddiI32,
            Operand::Reg(shift),
            Operand::Reg(shift),
            Operand::I32(-4),
        );
        p.section()
            .add_instr_no_reg(Opcode::Jmp, Operand::Label(loop_label));

        p.section().add_label(done)?;
        let length = p
            .section()
            .add_instr(Opcode::SubI32, Operand::Reg(cursor), Operand::Reg(buf))?;
        let end = p.section_ref().end_label;
        p.section().add_label(end)?;
        p.section()
            .add_instr_no_reg(Opcode::RetI32, Operand::Reg(length));
        Ok(())
    })
}
