//! Array and vector machinery
//!
//! Size computation, dimension setup, element addressing with bounds
//! checking, fills and vector growth. The element-address polynomial for
//! rank N with extents `d[0..N]` and indices `i[0..N]` is
//! `elem_size * sum(i[k] * prod(d[j]+1 for j > k))`, evaluated Horner-style
//! so constant dimensions fold at compile time. Overflow of the size
//! computation wraps; no runtime overflow check is emitted.

use crate::builtins;
use crate::context::Parser;
use crate::exp::Exp;
use crate::reference;
use crate::type_if;
use crate::types::{ArrayType, Type};
use bramble_common::{Error, ErrorKind, Position, Result};
use bramble_ir::{Opcode, Operand, RegisterClass};

/// The label of the shared out-of-range trap, reserved on first use. The
/// epilogue materialises the BAD_DIM error behind it.
pub fn ensure_array_access_label(p: &mut Parser) -> u32 {
    if let Some(label) = p.section_ref().array_access_label {
        return label;
    }
    let label = p.section().new_label();
    p.section().array_access_label = Some(label);
    label
}

/// Emit `index in 0..=extent` checks branching to the shared trap.
/// `extent` is an immediate for declared dimensions and a register for
/// dynamic ones.
fn check_index(p: &mut Parser, index_reg: u32, extent: Operand) -> Result<()> {
    let fail = ensure_array_access_label(p);

    let ok_low = p.section().new_label();
    let negative = p.section().add_instr(
        Opcode::LtiI32,
        Operand::Reg(index_reg),
        Operand::I32(0),
    )?;
    p.section().add_instr_reg(
        Opcode::Jmpc,
        Operand::Reg(negative),
        Operand::Label(fail),
        Operand::Label(ok_low),
    );
    p.section().add_label(ok_low)?;

    let ok_high = p.section().new_label();
    let over = match extent {
        Operand::I32(limit) => p.section().add_instr(
            Opcode::GtiI32,
            Operand::Reg(index_reg),
            Operand::I32(limit),
        )?,
        Operand::Reg(limit) => p.section().add_instr(
            Opcode::GtI32,
            Operand::Reg(index_reg),
            Operand::Reg(limit),
        )?,
        _ => return Err(Error::internal()),
    };
    p.section().add_instr_reg(
        Opcode::Jmpc,
        Operand::Reg(over),
        Operand::Label(fail),
        Operand::Label(ok_high),
    );
    p.section().add_label(ok_high)
}

/// Byte offset of the addressed element, constant when every index and
/// extent is known. Bounds of constant indices against declared dimensions
/// are rejected at compile time and emit no checking code.
fn element_offset(
    p: &mut Parser,
    arr: &ArrayType,
    base: u32,
    loc: u32,
    indices: Vec<Exp>,
    pos: Position,
) -> Result<Exp> {
    if indices.len() != arr.dims.len() {
        return Err(Error::new(
            ErrorKind::BadIndexCount {
                expected: arr.dims.len(),
                actual: indices.len(),
            },
            pos,
        ));
    }

    let elem_size = arr.elem.size() as i32;
    let mut offset: Option<Exp> = None;

    for (k, index) in indices.into_iter().enumerate() {
        let index = type_if::to_int32(p, index)?;

        let index = match (&index.ty, arr.dims[k]) {
            (Type::ConstInt, Some(declared)) => {
                let value = index.int_value()?;
                if value < 0 || value > declared {
                    return Err(Error::new(ErrorKind::BadIndex, index.pos));
                }
                index
            }
            (_, declared) => {
                let index = type_if::exp_to_var(p, index)?;
                let extent = match declared {
                    Some(declared) => Operand::I32(declared),
                    None => {
                        let ext =
                            reference::load_i32(p, base, loc + reference::DIMS_OFF + k as u32 * 4)?;
                        Operand::Reg(ext)
                    }
                };
                check_index(p, index.reg()?, extent)?;
                index
            }
        };

        offset = Some(match offset {
            None => index,
            Some(acc) => {
                // acc * (d[k] + 1) + i[k]
                let span = match arr.dims[k] {
                    Some(declared) => Exp::int_const(declared.wrapping_add(1), pos),
                    None => {
                        let ext =
                            reference::load_i32(p, base, loc + reference::DIMS_OFF + k as u32 * 4)?;
                        let span = p.section().add_instr(
                            Opcode::AddiI32,
                            Operand::Reg(ext),
                            Operand::I32(1),
                        )?;
                        Exp::int_var(span, pos)
                    }
                };
                let scaled = type_if::mul(p, acc, span)?;
                type_if::add(p, scaled, index)?
            }
        });
    }

    let offset = offset.ok_or_else(Error::internal)?;
    type_if::mul(p, offset, Exp::int_const(elem_size, pos))
}

/// Vector element offset: one index, checked against the live size
fn vector_offset(
    p: &mut Parser,
    elem: &Type,
    base: u32,
    loc: u32,
    indices: Vec<Exp>,
    pos: Position,
) -> Result<Exp> {
    if indices.len() != 1 {
        return Err(Error::new(
            ErrorKind::BadIndexCount {
                expected: 1,
                actual: indices.len(),
            },
            pos,
        ));
    }
    let Some(index) = indices.into_iter().next() else {
        return Err(Error::internal());
    };
    let index = type_if::to_int32(p, index)?;
    let index = type_if::exp_to_var(p, index)?;

    let offset = type_if::mul(p, index, Exp::int_const(elem.size() as i32, pos))?;
    let offset = type_if::exp_to_var(p, offset)?;

    // the last check is against the byte size, which tracks appends
    let fail = ensure_array_access_label(p);
    let ok_low = p.section().new_label();
    let negative = p.section().add_instr(
        Opcode::LtiI32,
        offset.operand()?,
        Operand::I32(0),
    )?;
    p.section().add_instr_reg(
        Opcode::Jmpc,
        Operand::Reg(negative),
        Operand::Label(fail),
        Operand::Label(ok_low),
    );
    p.section().add_label(ok_low)?;

    let size = reference::get_size(p, base, loc)?;
    let ok_high = p.section().new_label();
    let over = p.section().add_instr(
        Opcode::GteI32,
        offset.operand()?,
        Operand::Reg(size),
    )?;
    p.section().add_instr_reg(
        Opcode::Jmpc,
        Operand::Reg(over),
        Operand::Label(fail),
        Operand::Label(ok_high),
    );
    p.section().add_label(ok_high)?;
    Ok(offset)
}

/// Address of the element selected by `indices`, as an integer expression
pub fn element_address(
    p: &mut Parser,
    collection: &Type,
    base: u32,
    loc: u32,
    indices: Vec<Exp>,
    pos: Position,
) -> Result<Exp> {
    let offset = match collection {
        Type::Array(arr) => element_offset(p, arr, base, loc, indices, pos)?,
        Type::Vector(elem) => vector_offset(p, elem, base, loc, indices, pos)?,
        _ => return Err(Error::assertion_failed(pos)),
    };

    let data = reference::get_data(p, base, loc)?;
    let addr = match &offset.ty {
        Type::ConstInt => p.section().add_instr(
            Opcode::AddiI32,
            Operand::Reg(data),
            Operand::I32(offset.int_value()?),
        )?,
        _ => p
            .section()
            .add_instr(Opcode::AddI32, Operand::Reg(data), offset.operand()?)?,
    };
    Ok(Exp::int_var(addr, pos))
}

/// DIM allocation: store the declared extents, allocate
/// `product(d[k]+1) * elem_size` bytes and zero-fill them
pub fn init_collection(
    p: &mut Parser,
    collection: &Type,
    base: u32,
    loc: u32,
    dim_exps: Vec<Exp>,
    pos: Position,
) -> Result<()> {
    let elem = collection.element().ok_or(Error::assertion_failed(pos))?.clone();
    let mut total: Exp = Exp::int_const(1, pos);

    for (k, dim) in dim_exps.into_iter().enumerate() {
        let dim = type_if::to_int32(p, dim)?;
        if matches!(dim.ty, Type::ConstInt) && dim.int_value()? < 0 {
            return Err(Error::new(ErrorKind::BadDim, dim.pos));
        }
        let dim = type_if::exp_to_var(p, dim)?;
        reference::store_i32(p, dim.reg()?, base, loc + reference::DIMS_OFF + k as u32 * 4);

        let span = p
            .section()
            .add_instr(Opcode::AddiI32, dim.operand()?, Operand::I32(1))?;
        total = type_if::mul(p, total, Exp::int_var(span, pos))?;
    }

    let size = type_if::mul(p, total, Exp::int_const(elem.size() as i32, pos))?;
    let size = type_if::exp_to_var(p, size)?;
    let data = reference::alloc(p, collection, base, loc, size.reg()?, true)?;
    zero_buf(p, &elem, data, size.reg()?)
}

/// Fill a raw element buffer with the zero of the element type. Reference
/// elements get all-zero headers.
pub fn zero_buf(p: &mut Parser, elem: &Type, data_reg: u32, size_reg: u32) -> Result<()> {
    match elem {
        Type::Byte => {
            builtins::ensure_memseti8(p)?;
            let zero = p
                .section()
                .add_instr(Opcode::MoviI32, Operand::I32(0), Operand::None)?;
            builtins::call_builtin_proc(
                p,
                "_memseti8",
                &[
                    (RegisterClass::Integer, data_reg),
                    (RegisterClass::Integer, size_reg),
                    (RegisterClass::Integer, zero),
                ],
            )
        }
        Type::ConstReal | Type::Real => {
            builtins::ensure_memseti64(p)?;
            let zero = p
                .section()
                .add_instr(Opcode::MoviReal, Operand::Real(0.0), Operand::None)?;
            builtins::call_builtin_proc(
                p,
                "_memseti64",
                &[
                    (RegisterClass::Integer, data_reg),
                    (RegisterClass::Integer, size_reg),
                    (RegisterClass::Real, zero),
                ],
            )
        }
        _ => {
            // ints and reference headers zero word-wise
            builtins::ensure_memseti32(p)?;
            let zero = p
                .section()
                .add_instr(Opcode::MoviI32, Operand::I32(0), Operand::None)?;
            builtins::call_builtin_proc(
                p,
                "_memseti32",
                &[
                    (RegisterClass::Integer, data_reg),
                    (RegisterClass::Integer, size_reg),
                    (RegisterClass::Integer, zero),
                ],
            )
        }
    }
}

/// Fill every element of the collection at `base + loc` with a scalar
pub fn fill(p: &mut Parser, collection: &Type, base: u32, loc: u32, e: Exp) -> Result<()> {
    let pos = e.pos;
    let elem = collection.element().ok_or(Error::assertion_failed(pos))?.clone();
    let e = type_if::coerce(p, e, &elem)?;
    let e = type_if::exp_to_var(p, e)?;

    let data = reference::ensure_unique(p, base, loc)?;
    let size = reference::get_size(p, base, loc)?;

    match elem {
        Type::Byte => {
            builtins::ensure_memseti8(p)?;
            builtins::call_builtin_proc(
                p,
                "_memseti8",
                &[
                    (RegisterClass::Integer, data),
                    (RegisterClass::Integer, size),
                    (RegisterClass::Integer, e.reg()?),
                ],
            )
        }
        Type::ConstReal | Type::Real => {
            builtins::ensure_memseti64(p)?;
            builtins::call_builtin_proc(
                p,
                "_memseti64",
                &[
                    (RegisterClass::Integer, data),
                    (RegisterClass::Integer, size),
                    (RegisterClass::Real, e.reg()?),
                ],
            )
        }
        Type::Int | Type::ConstInt => {
            builtins::ensure_memseti32(p)?;
            builtins::call_builtin_proc(
                p,
                "_memseti32",
                &[
                    (RegisterClass::Integer, data),
                    (RegisterClass::Integer, size),
                    (RegisterClass::Integer, e.reg()?),
                ],
            )
        }
        other => Err(Error::not_supported("set", other.name(), pos)),
    }
}

/// Append one element, or another vector's elements, to the vector at
/// `base + loc`
pub fn append(p: &mut Parser, collection: &Type, base: u32, loc: u32, e: Exp) -> Result<()> {
    let pos = e.pos;
    let Type::Vector(elem) = collection else {
        return Err(Error::not_supported("append", collection.name(), pos));
    };
    let elem = elem.as_ref().clone();

    if e.ty == *collection {
        return append_vector(p, &elem, base, loc, e);
    }

    let e = type_if::coerce(p, e, &elem)?;
    let e = type_if::exp_to_var(p, e)?;

    let data = reference::ensure_unique(p, base, loc)?;
    let size = reference::get_size(p, base, loc)?;
    let total = p.section().add_instr(
        Opcode::AddiI32,
        Operand::Reg(size),
        Operand::I32(elem.size() as i32),
    )?;
    let fresh = p
        .section()
        .add_instr(Opcode::Realloc, Operand::Reg(data), Operand::Reg(total))?;
    crate::exp::handle_errors(p)?;
    reference::store_i32(p, fresh, base, loc + reference::DATA_OFF);
    reference::store_i32(p, total, base, loc + reference::SIZE_OFF);

    let slot = p
        .section()
        .add_instr(Opcode::AddI32, Operand::Reg(fresh), Operand::Reg(size))?;

    if elem.is_reference() {
        // copy the header into the buffer and take a reference on its data
        reference::new_ref(p, slot, 0, e.reg()?)
    } else {
        type_if::assign_mem(p, slot, 0, e)
    }
}

fn append_vector(p: &mut Parser, elem: &Type, base: u32, loc: u32, e: Exp) -> Result<()> {
    let other = e.reg()?;

    let size2 = reference::load_i32(p, other, reference::SIZE_OFF)?;
    let skip = p.section().new_label();
    let grow = p.section().new_label();
    let nonempty = p
        .section()
        .add_instr(Opcode::GtiI32, Operand::Reg(size2), Operand::I32(0))?;
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

    if elem.is_reference() {
        // every copied element shares its data; count the new owners
        let cursor = p
            .section()
            .add_instr(Opcode::Mov, Operand::Reg(dest), Operand::None)?;
        let end = p
            .section()
            .add_instr(Opcode::AddI32, Operand::Reg(dest), Operand::Reg(size2))?;
        let loop_label = p.section().new_label();
        let body = p.section().new_label();
        let done = p.section().new_label();
        p.section().add_label(loop_label)?;
        let more = p
            .section()
            .add_instr(Opcode::LtI32, Operand::Reg(cursor), Operand::Reg(end))?;
        p.section().add_instr_reg(
            Opcode::Jmpc,
            Operand::Reg(more),
            Operand::Label(body),
            Operand::Label(done),
        );
        p.section().add_label(body)?;
        let elem_data = reference::load_i32(p, cursor, reference::DATA_OFF)?;
        let live = p.section().new_label();
        let next = p.section().new_label();
        let nonzero = p.section().add_instr(
            Opcode::NeqiI32,
            Operand::Reg(elem_data),
            Operand::I32(0),
        )?;
        p.section().add_instr_reg(
            Opcode::Jmpc,
            Operand::Reg(nonzero),
            Operand::Label(live),
            Operand::Label(next),
        );
        p.section().add_label(live)?;
        p.section()
            .add_instr_no_reg(Opcode::Ref, Operand::Reg(elem_data));
        p.section().add_label(next)?;
        p.section().add_instr_reg(
            Opcode::AddiI32,
            Operand::Reg(cursor),
            Operand::Reg(cursor),
            Operand::I32(elem.size() as i32),
        );
        p.section()
            .add_instr_no_reg(Opcode::Jmp, Operand::Label(loop_label));
        p.section().add_label(done)?;
    }

    p.section().add_label(skip)
}

/// Copy the extent slots of an array header
pub fn copy_dims(p: &mut Parser, dims: usize, dest_base: u32, dest_loc: u32, src_ptr: u32) -> Result<()> {
    for k in 0..dims {
        let ext = reference::load_i32(p, src_ptr, reference::DIMS_OFF + k as u32 * 4)?;
        reference::store_i32(p, ext, dest_base, dest_loc + reference::DIMS_OFF + k as u32 * 4);
    }
    Ok(())
}

/// The synthesised per-element-type destructor for collections whose
/// elements own heap data, memoised by mangled name
pub fn element_destructor(p: &mut Parser, elem: &Type) -> Result<Option<usize>> {
    if !elem.needs_cleanup() {
        return Ok(None);
    }

    // the plain-reference loop is shared by string elements; richer element
    // types get their own specialisation
    let name = match elem {
        Type::Str => "_deref_array".to_string(),
        other => format!("_deref_array_{}", other.mangled_name()),
    };
    let elem = elem.clone();
    let elem_size = elem.size() as i32;

    let index = builtins::get_or_create(p, &name, move |p| {
        let ptr = p.section().alloc_reg(RegisterClass::Integer);

        let size = reference::load_i32(p, ptr, reference::SIZE_OFF)?;
        let cursor = reference::load_i32(p, ptr, reference::DATA_OFF)?;
        let end = p
            .section()
            .add_instr(Opcode::AddI32, Operand::Reg(cursor), Operand::Reg(size))?;

        let loop_label = p.section().new_label();
        let body = p.section().new_label();
        let done = p.section().new_label();
        p.section().add_label(loop_label)?;
        let more = p
            .section()
            .add_instr(Opcode::LtI32, Operand::Reg(cursor), Operand::Reg(end))?;
        p.section().add_instr_reg(
            Opcode::Jmpc,
            Operand::Reg(more),
            Operand::Label(body),
            Operand::Label(done),
        );
        p.section().add_label(body)?;

        match &elem {
            Type::Rec(rec) => crate::rec::call_rec_deref(p, rec, cursor)?,
            _ => reference::deref(p, cursor, 0)?,
        }

        p.section().add_instr_reg(
            Opcode::AddiI32,
            Operand::Reg(cursor),
            Operand::Reg(cursor),
            Operand::I32(elem_size),
        );
        p.section()
            .add_instr_no_reg(Opcode::Jmp, Operand::Label(loop_label));
        p.section().add_label(done)?;

        let end_label = p.section_ref().end_label;
        p.section().add_label(end_label)?;
        p.section().add_instr_no_arg(Opcode::Ret);
        Ok(())
    })?;
    Ok(Some(index))
}
