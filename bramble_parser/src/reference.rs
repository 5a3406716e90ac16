//! The reference runtime
//!
//! Heap-allocated values (strings, arrays, vectors) are described by a
//! fixed-size header in the owner's frame: size, data pointer, original
//! size, heap word and destructor id, with array extents following. This
//! module emits the IR sequences that create, share, copy and destroy those
//! headers, and maintains the per-function cleanup stack that guarantees
//! every live reference is dereferenced on scope and function exit.

use crate::builtins;
use crate::context::Parser;
use crate::exp;
use crate::types::Type;
use bramble_common::{Error, Result};
use bramble_ir::{Instr, Opcode, Operand, RegisterClass};

/// Header field offsets
pub const SIZE_OFF: u32 = 0;
pub const DATA_OFF: u32 = 4;
pub const ORIG_SIZE_OFF: u32 = 8;
pub const HEAP_OFF: u32 = 12;
pub const DESTRUCTOR_OFF: u32 = 16;
/// First dimension extent of an array header
pub const DIMS_OFF: u32 = 20;

// ----- small emission helpers -----

pub fn store_i32(p: &mut Parser, value_reg: u32, base_reg: u32, offset: u32) {
    p.section().add_instr_reg(
        Opcode::StoreoI32,
        Operand::Reg(value_reg),
        Operand::Reg(base_reg),
        Operand::I32(offset as i32),
    );
}

pub fn load_i32(p: &mut Parser, base_reg: u32, offset: u32) -> Result<u32> {
    p.section().add_instr(
        Opcode::LoadoI32,
        Operand::Reg(base_reg),
        Operand::I32(offset as i32),
    )
}

/// Materialise the address of `base + loc` in a fresh register
pub fn get_pointer(p: &mut Parser, base_reg: u32, loc: u32) -> Result<u32> {
    p.section().add_instr(
        Opcode::AddiI32,
        Operand::Reg(base_reg),
        Operand::I32(loc as i32),
    )
}

/// Load a header's data pointer
pub fn get_data(p: &mut Parser, base_reg: u32, loc: u32) -> Result<u32> {
    load_i32(p, base_reg, loc + DATA_OFF)
}

/// Load a header's size in bytes
pub fn get_size(p: &mut Parser, base_reg: u32, loc: u32) -> Result<u32> {
    load_i32(p, base_reg, loc + SIZE_OFF)
}

// ----- cleanup stack -----

/// Allocate the cleanup-stack counter on first use, rewriting the entry
/// placeholder so the counter starts at zero. If no reference is ever
/// pushed the placeholder is elided instead.
pub fn ensure_cleanup_stack(p: &mut Parser) -> Result<u32> {
    if let Some(reg) = p.section_ref().cleanup_stack_reg {
        return Ok(reg);
    }
    let reg = p.section().alloc_reg(RegisterClass::Integer);
    let nop = p
        .section_ref()
        .cleanup_stack_nop
        .ok_or_else(Error::internal)?;
    p.section().rewrite_nop(
        nop,
        Instr::new(
            Opcode::MoviI32,
            Operand::Reg(reg),
            Operand::I32(0),
            Operand::None,
        ),
    )?;
    p.section().cleanup_stack_reg = Some(reg);
    Ok(reg)
}

pub fn inc_cleanup_stack(p: &mut Parser) -> Result<()> {
    let reg = ensure_cleanup_stack(p)?;
    p.section().add_instr_reg(
        Opcode::AddiI32,
        Operand::Reg(reg),
        Operand::Reg(reg),
        Operand::I32(1),
    );
    Ok(())
}

fn dec_cleanup_stack(p: &mut Parser) -> Result<()> {
    let reg = ensure_cleanup_stack(p)?;
    p.section().add_instr_reg(
        Opcode::AddiI32,
        Operand::Reg(reg),
        Operand::Reg(reg),
        Operand::I32(-1),
    );
    Ok(())
}

/// Push a pointer to the header at `base + loc` onto the runtime cleanup
/// stack and count it
pub fn push_reference(p: &mut Parser, base_reg: u32, loc: u32) -> Result<()> {
    let ptr = get_pointer(p, base_reg, loc)?;
    inc_cleanup_stack(p)?;
    p.section()
        .add_instr_no_reg(Opcode::PushI32, Operand::Reg(ptr));
    Ok(())
}

// ----- ref / deref -----

/// Copy size, data and destructor from the header pointed to by
/// `src_ptr_reg` into the header at `dest + loc`, taking a new reference on
/// the data. With `check_size` the data copy is skipped for empty sources.
pub fn init_ref(
    p: &mut Parser,
    dest_base: u32,
    dest_loc: u32,
    src_ptr_reg: u32,
    check_size: bool,
) -> Result<()> {
    let size = load_i32(p, src_ptr_reg, SIZE_OFF)?;
    store_i32(p, size, dest_base, dest_loc + SIZE_OFF);

    let zero_label = if check_size {
        let zero = p.section().new_label();
        let gtzero = p.section().new_label();
        p.section().add_instr_reg(
            Opcode::Jmpc,
            Operand::Reg(size),
            Operand::Label(gtzero),
            Operand::Label(zero),
        );
        p.section().add_label(gtzero)?;
        Some(zero)
    } else {
        None
    };

    let data = load_i32(p, src_ptr_reg, DATA_OFF)?;
    p.section()
        .add_instr_no_reg(Opcode::Ref, Operand::Reg(data));
    store_i32(p, data, dest_base, dest_loc + DATA_OFF);

    let destructor = load_i32(p, src_ptr_reg, DESTRUCTOR_OFF)?;
    store_i32(p, destructor, dest_base, dest_loc + DESTRUCTOR_OFF);

    if let Some(zero) = zero_label {
        p.section().add_label(zero)?;
    }
    Ok(())
}

/// Reference copy used when binding reference parameters: the callee copies
/// the caller's header into its own frame slot and registers it for cleanup.
/// Safe to run before any other allocation because the cleanup counter is
/// initialised lazily.
pub fn copy_ref(p: &mut Parser, dest_base: u32, dest_loc: u32, src_ptr_reg: u32) -> Result<()> {
    init_ref(p, dest_base, dest_loc, src_ptr_reg, false)?;
    push_reference(p, dest_base, dest_loc)
}

/// Bind a reference into a freshly-entered, guaranteed-uninitialised slot:
/// as [`assign_ref`] but with no dereference of prior contents
pub fn new_ref(p: &mut Parser, dest_base: u32, dest_loc: u32, src_ptr_reg: u32) -> Result<()> {
    init_ref(p, dest_base, dest_loc, src_ptr_reg, false)
}

/// Reference assignment to a slot that may hold a live reference: take the
/// new reference first, then release the old data
pub fn assign_ref(p: &mut Parser, dest_base: u32, dest_loc: u32, src_ptr_reg: u32) -> Result<()> {
    let old_data = get_data(p, dest_base, dest_loc)?;
    init_ref(p, dest_base, dest_loc, src_ptr_reg, false)?;
    deref_data(p, old_data)
}

/// Zero-initialise the header at `base + loc` (and `dims` extents),
/// optionally registering it on the cleanup stack
pub fn zero_ref(p: &mut Parser, base_reg: u32, loc: u32, dims: u32, push: bool) -> Result<()> {
    let zero = p
        .section()
        .add_instr(Opcode::MoviI32, Operand::I32(0), Operand::None)?;
    for field in [SIZE_OFF, DATA_OFF, ORIG_SIZE_OFF, HEAP_OFF, DESTRUCTOR_OFF] {
        store_i32(p, zero, base_reg, loc + field);
    }
    for dim in 0..dims {
        store_i32(p, zero, base_reg, loc + DIMS_OFF + dim * 4);
    }
    if push {
        push_reference(p, base_reg, loc)?;
    }
    Ok(())
}

/// Release one counted reference to a data block, running the element
/// destructor when this is the last reference. `data_reg` may be zero
/// (an empty reference); the whole sequence is skipped then.
///
/// The destructor is found via the owning header, which is why this takes
/// the header address rather than the bare data pointer.
fn deref_header_ptr(p: &mut Parser, ptr_reg: u32) -> Result<()> {
    let data = load_i32(p, ptr_reg, DATA_OFF)?;
    let skip = p.section().new_label();
    let live = p.section().new_label();
    let nonzero = p.section().add_instr(
        Opcode::NeqiI32,
        Operand::Reg(data),
        Operand::I32(0),
    )?;
    p.section().add_instr_reg(
        Opcode::Jmpc,
        Operand::Reg(nonzero),
        Operand::Label(live),
        Operand::Label(skip),
    );
    p.section().add_label(live)?;

    let destructor = load_i32(p, ptr_reg, DESTRUCTOR_OFF)?;
    let plain = p.section().new_label();
    let destroy = p.section().new_label();
    let has_destructor = p.section().add_instr(
        Opcode::NeqiI32,
        Operand::Reg(destructor),
        Operand::I32(0),
    )?;
    p.section().add_instr_reg(
        Opcode::Jmpc,
        Operand::Reg(has_destructor),
        Operand::Label(destroy),
        Operand::Label(plain),
    );
    p.section().add_label(destroy)?;

    // elements are destroyed only when the block itself is about to die
    let refs = p
        .section()
        .add_instr(Opcode::Getref, Operand::Reg(data), Operand::None)?;
    let last = p.section().add_instr(
        Opcode::EqiI32,
        Operand::Reg(refs),
        Operand::I32(1),
    )?;
    let run = p.section().new_label();
    p.section().add_instr_reg(
        Opcode::Jmpc,
        Operand::Reg(last),
        Operand::Label(run),
        Operand::Label(plain),
    );
    p.section().add_label(run)?;
    builtins::call_deref(p, ptr_reg, destructor)?;

    p.section().add_label(plain)?;
    p.section()
        .add_instr_no_reg(Opcode::Deref, Operand::Reg(data));
    p.section().add_label(skip)
}

/// Deref the data owned by a bare data pointer with no destructor
/// bookkeeping (the caller knows the elements are scalar)
pub fn deref_data(p: &mut Parser, data_reg: u32) -> Result<()> {
    let skip = p.section().new_label();
    let live = p.section().new_label();
    let nonzero = p.section().add_instr(
        Opcode::NeqiI32,
        Operand::Reg(data_reg),
        Operand::I32(0),
    )?;
    p.section().add_instr_reg(
        Opcode::Jmpc,
        Operand::Reg(nonzero),
        Operand::Label(live),
        Operand::Label(skip),
    );
    p.section().add_label(live)?;
    p.section()
        .add_instr_no_reg(Opcode::Deref, Operand::Reg(data_reg));
    p.section().add_label(skip)
}

/// Deref the reference header at `base + loc`
pub fn deref(p: &mut Parser, base_reg: u32, loc: u32) -> Result<()> {
    let ptr = get_pointer(p, base_reg, loc)?;
    deref_header_ptr(p, ptr)
}

/// Pop one header pointer off the runtime cleanup stack and deref it
pub fn pop_and_deref(p: &mut Parser) -> Result<()> {
    let ptr = p.section().add_instr1(Opcode::PopI32)?;
    dec_cleanup_stack(p)?;
    deref_header_ptr(p, ptr)
}

/// Emit the loop that drains the cleanup stack down to `target` (a saved
/// counter register, or the immediate 0 at function exit). No code is
/// emitted if the function never pushed a reference.
pub fn emit_drain_loop(p: &mut Parser, target: Operand) -> Result<()> {
    let Some(counter) = p.section_ref().cleanup_stack_reg else {
        return Ok(());
    };
    let loop_label = p.section().new_label();
    let body = p.section().new_label();
    let done = p.section().new_label();

    p.section().add_label(loop_label)?;
    let more = match target {
        Operand::I32(0) => p.section().add_instr(
            Opcode::NeqiI32,
            Operand::Reg(counter),
            Operand::I32(0),
        )?,
        Operand::Reg(saved) => p.section().add_instr(
            Opcode::NeqI32,
            Operand::Reg(counter),
            Operand::Reg(saved),
        )?,
        _ => return Err(Error::internal()),
    };
    p.section().add_instr_reg(
        Opcode::Jmpc,
        Operand::Reg(more),
        Operand::Label(body),
        Operand::Label(done),
    );
    p.section().add_label(body)?;

    let ptr = p.section().add_instr1(Opcode::PopI32)?;
    p.section().add_instr_reg(
        Opcode::AddiI32,
        Operand::Reg(counter),
        Operand::Reg(counter),
        Operand::I32(-1),
    );
    deref_header_ptr(p, ptr)?;
    p.section()
        .add_instr_no_reg(Opcode::Jmp, Operand::Label(loop_label));

    p.section().add_label(done)
}

/// Capture the current cleanup depth so an inner scope can drain back to it
pub fn save_cleanup_depth(p: &mut Parser) -> Result<u32> {
    let counter = ensure_cleanup_stack(p)?;
    p.section()
        .add_instr(Opcode::Mov, Operand::Reg(counter), Operand::None)
}

// ----- allocation -----

/// The allocation protocol: store the size, obtain the data block, register
/// the header for cleanup, and fill in the data pointer and destructor id.
/// Returns the data-pointer register.
pub fn alloc(
    p: &mut Parser,
    ty: &Type,
    base_reg: u32,
    loc: u32,
    size_reg: u32,
    push: bool,
) -> Result<u32> {
    store_i32(p, size_reg, base_reg, loc + SIZE_OFF);
    store_i32(p, size_reg, base_reg, loc + ORIG_SIZE_OFF);

    let data = p
        .section()
        .add_instr(Opcode::Alloc, Operand::Reg(size_reg), Operand::None)?;
    exp::handle_errors(p)?;

    if push {
        push_reference(p, base_reg, loc)?;
    }

    store_i32(p, data, base_reg, loc + DATA_OFF);

    let destructor = destructor_id(p, ty)?;
    let destructor_reg = p.section().add_instr(
        Opcode::MoviI32,
        Operand::I32(destructor),
        Operand::None,
    )?;
    store_i32(p, destructor_reg, base_reg, loc + DESTRUCTOR_OFF);

    Ok(data)
}

/// The destructor section index stored in headers of this type, or 0 when
/// plain deallocation suffices
pub fn destructor_id(p: &mut Parser, ty: &Type) -> Result<i32> {
    let id = crate::type_if::destructor(p, ty)?;
    Ok(id.map(|idx| idx as i32).unwrap_or(0))
}

// ----- copy-on-write -----

/// Make the data block at `base + loc` safe to mutate in place: if its
/// refcount exceeds one, allocate a fresh buffer, copy the contents and
/// release the shared block. Returns the (possibly new) data pointer.
pub fn ensure_unique(p: &mut Parser, base_reg: u32, loc: u32) -> Result<u32> {
    let data = get_data(p, base_reg, loc)?;
    let refs = p
        .section()
        .add_instr(Opcode::Getref, Operand::Reg(data), Operand::None)?;
    let shared = p.section().add_instr(
        Opcode::GtiI32,
        Operand::Reg(refs),
        Operand::I32(1),
    )?;
    let copy = p.section().new_label();
    let join = p.section().new_label();
    p.section().add_instr_reg(
        Opcode::Jmpc,
        Operand::Reg(shared),
        Operand::Label(copy),
        Operand::Label(join),
    );
    p.section().add_label(copy)?;

    let size = get_size(p, base_reg, loc)?;
    let fresh = p
        .section()
        .add_instr(Opcode::Alloc, Operand::Reg(size), Operand::None)?;
    exp::handle_errors(p)?;
    builtins::memcpy(p, fresh, data, size)?;
    p.section()
        .add_instr_no_reg(Opcode::Deref, Operand::Reg(data));
    store_i32(p, fresh, base_reg, loc + DATA_OFF);

    p.section().add_label(join)?;
    // reload after the join so both paths agree
    get_data(p, base_reg, loc)
}

/// Swap two reference headers field for field; `header_words` covers the
/// extents of array headers
pub fn swap(
    p: &mut Parser,
    a_base: u32,
    a_loc: u32,
    b_base: u32,
    b_loc: u32,
    header_bytes: u32,
) -> Result<()> {
    let mut offset = 0;
    while offset < header_bytes {
        let a = load_i32(p, a_base, a_loc + offset)?;
        let b = load_i32(p, b_base, b_loc + offset)?;
        store_i32(p, b, a_base, a_loc + offset);
        store_i32(p, a, b_base, b_loc + offset);
        offset += 4;
    }
    Ok(())
}
