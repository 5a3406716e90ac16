//! Type-dispatched operations
//!
//! Every value kind implements [`TypeOps`]; the free functions here order
//! operands, apply the shared coercion rules and dispatch to the
//! implementation for the left-hand type. Capabilities a kind does not
//! support fall through to default methods that fail with `NotSupported`.
//!
//! Operand ordering: when exactly one operand of a binary operator is
//! const-tagged it is moved to the right-hand side so the immediate-operand
//! instruction variant can be selected. Non-commutative operators receive a
//! `swapped` flag and mirror their semantics accordingly.

mod array;
mod byte;
mod float64;
mod fn_type;
mod int32;
mod rec;
mod string;

use crate::context::Parser;
use crate::exp::Exp;
use crate::types::Type;
use bramble_common::{Error, ErrorKind, Position, Result};

pub use string::{const_str_to_var, init_var_from_const, lca_const};

/// Shorthand for the `NotSupported` failure every default method raises
fn ns<T>(op: &str, type_name: &str, pos: Position) -> Result<T> {
    Err(Error::not_supported(op, type_name, pos))
}

#[allow(unused_variables)]
pub trait TypeOps {
    fn name(&self) -> &'static str;

    fn is_const(&self) -> bool {
        false
    }

    // ----- values -----

    fn zero(&self, p: &mut Parser, pos: Position) -> Result<Exp> {
        ns("zero", self.name(), pos)
    }

    fn zero_reg(&self, p: &mut Parser, reg: u32, pos: Position) -> Result<()> {
        ns("zero register", self.name(), pos)
    }

    /// Zero-initialise an in-place reference header, optionally registering
    /// it on the cleanup stack
    fn zero_ref(
        &self,
        p: &mut Parser,
        ty: &Type,
        base: u32,
        loc: u32,
        push: bool,
        pos: Position,
    ) -> Result<()> {
        ns("zero reference", self.name(), pos)
    }

    /// Materialise a possibly-constant expression into a register-backed one
    fn exp_to_var(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        ns("materialise", self.name(), pos)
    }

    /// Produce a fresh register initialised from an existing expression
    fn copy_var(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        ns("copy", self.name(), pos)
    }

    /// Duplicate an expression that must be consumed twice
    fn dup(&self, e: &Exp) -> Result<Exp> {
        Ok(e.clone())
    }

    fn assign_reg(&self, p: &mut Parser, reg: u32, e: Exp) -> Result<()> {
        let pos = e.pos;
        ns("register assignment", self.name(), pos)
    }

    fn assign_mem(&self, p: &mut Parser, base: u32, loc: u32, e: Exp) -> Result<()> {
        let pos = e.pos;
        ns("assignment", self.name(), pos)
    }

    /// Store to a slot with no prior valid contents; reference types skip
    /// the dereference of the old value
    fn assign_new_mem(&self, p: &mut Parser, base: u32, loc: u32, e: Exp) -> Result<()> {
        let pos = e.pos;
        ns("initialising assignment", self.name(), pos)
    }

    fn load_mem(
        &self,
        p: &mut Parser,
        ty: &Type,
        base: u32,
        loc: u32,
        pos: Position,
    ) -> Result<Exp> {
        ns("load", self.name(), pos)
    }

    // ----- collections -----

    fn indexed_read(
        &self,
        p: &mut Parser,
        ty: &Type,
        base: u32,
        loc: u32,
        indices: Vec<Exp>,
        pos: Position,
    ) -> Result<Exp> {
        ns("indexed read", self.name(), pos)
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
        let pos = e.pos;
        ns("indexed write", self.name(), pos)
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
        let pos = e.pos;
        ns("indexed add", self.name(), pos)
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
        let pos = e.pos;
        ns("indexed subtract", self.name(), pos)
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
        ns("indexed address", self.name(), pos)
    }

    /// Fill every element with a scalar
    fn set(&self, p: &mut Parser, ty: &Type, base: u32, loc: u32, e: Exp) -> Result<()> {
        let pos = e.pos;
        ns("set", self.name(), pos)
    }

    /// Grow a vector by one element or another vector's worth
    fn append(&self, p: &mut Parser, ty: &Type, base: u32, loc: u32, e: Exp) -> Result<()> {
        let pos = e.pos;
        ns("append", self.name(), pos)
    }

    /// Fill a raw buffer with a scalar
    fn zero_buf(
        &self,
        p: &mut Parser,
        ty: &Type,
        data_reg: u32,
        size_reg: u32,
        pos: Position,
    ) -> Result<()> {
        ns("zero buffer", self.name(), pos)
    }

    // ----- conversions -----

    fn to_int32(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        ns("integer conversion", self.name(), pos)
    }

    /// Zero-extend to a 32-bit integer
    fn zerox(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        Err(Error::new(
            ErrorKind::BadZeroExtend(self.name().to_string()),
            pos,
        ))
    }

    fn to_byte(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        ns("byte conversion", self.name(), pos)
    }

    fn to_float64(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        ns("real conversion", self.name(), pos)
    }

    fn to_string(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        ns("string conversion", self.name(), pos)
    }

    fn to_hex_string(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        ns("hex string conversion", self.name(), pos)
    }

    /// Convert to an arbitrary target type
    fn coerce(&self, p: &mut Parser, e: Exp, target: &Type) -> Result<Exp> {
        if *target == e.ty {
            return Ok(e);
        }
        let pos = e.pos;
        Err(Error::new(
            ErrorKind::BadConversion {
                from: self.name().to_string(),
                to: target.name(),
            },
            pos,
        ))
    }

    // ----- operators; inputs arrive pre-ordered -----

    fn add(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let pos = a1.pos;
        ns("+", self.name(), pos)
    }

    fn mul(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let pos = a1.pos;
        ns("*", self.name(), pos)
    }

    fn and(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let pos = a1.pos;
        ns("AND", self.name(), pos)
    }

    fn or(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let pos = a1.pos;
        ns("OR", self.name(), pos)
    }

    fn eor(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let pos = a1.pos;
        ns("EOR", self.name(), pos)
    }

    fn eq(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let pos = a1.pos;
        ns("=", self.name(), pos)
    }

    fn neq(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let pos = a1.pos;
        ns("<>", self.name(), pos)
    }

    fn sub(&self, p: &mut Parser, a1: Exp, a2: Exp, swapped: bool) -> Result<Exp> {
        let pos = a1.pos;
        ns("-", self.name(), pos)
    }

    fn divr(&self, p: &mut Parser, a1: Exp, a2: Exp, swapped: bool) -> Result<Exp> {
        let pos = a1.pos;
        ns("/", self.name(), pos)
    }

    fn gt(&self, p: &mut Parser, a1: Exp, a2: Exp, swapped: bool) -> Result<Exp> {
        let pos = a1.pos;
        ns(">", self.name(), pos)
    }

    fn lte(&self, p: &mut Parser, a1: Exp, a2: Exp, swapped: bool) -> Result<Exp> {
        let pos = a1.pos;
        ns("<=", self.name(), pos)
    }

    fn lt(&self, p: &mut Parser, a1: Exp, a2: Exp, swapped: bool) -> Result<Exp> {
        let pos = a1.pos;
        ns("<", self.name(), pos)
    }

    fn gte(&self, p: &mut Parser, a1: Exp, a2: Exp, swapped: bool) -> Result<Exp> {
        let pos = a1.pos;
        ns(">=", self.name(), pos)
    }

    fn div(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let pos = a1.pos;
        ns("DIV", self.name(), pos)
    }

    fn modulo(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let pos = a1.pos;
        ns("MOD", self.name(), pos)
    }

    fn lsl(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let pos = a1.pos;
        ns("<<", self.name(), pos)
    }

    fn lsr(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let pos = a1.pos;
        ns(">>", self.name(), pos)
    }

    fn asr(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let pos = a1.pos;
        ns(">>>", self.name(), pos)
    }

    fn pow(&self, p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
        let pos = a1.pos;
        ns("^", self.name(), pos)
    }

    fn abs(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        ns("ABS", self.name(), pos)
    }

    fn sgn(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        ns("SGN", self.name(), pos)
    }

    fn is_inf(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        ns("INF test", self.name(), pos)
    }

    fn not(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        ns("NOT", self.name(), pos)
    }

    fn unary_minus(&self, p: &mut Parser, e: Exp) -> Result<Exp> {
        let pos = e.pos;
        ns("unary minus", self.name(), pos)
    }

    // ----- calls, printing, destruction -----

    /// Emit a return of the value in `reg`
    fn ret(&self, p: &mut Parser, reg: u32, pos: Position) -> Result<()> {
        ns("return", self.name(), pos)
    }

    fn print(&self, p: &mut Parser, e: Exp) -> Result<()> {
        let pos = e.pos;
        ns("print", self.name(), pos)
    }

    /// The section index of the synthesised per-instance destructor, or
    /// `None` when plain deallocation suffices
    fn destructor(&self, p: &mut Parser, ty: &Type, pos: Position) -> Result<Option<usize>> {
        Ok(None)
    }
}

/// The vtable for a type
pub fn ops(ty: &Type) -> &'static dyn TypeOps {
    match ty {
        Type::ConstInt => &int32::ConstIntOps,
        Type::Int => &int32::IntOps,
        Type::ConstReal => &float64::ConstRealOps,
        Type::Real => &float64::RealOps,
        Type::Byte => &byte::ByteOps,
        Type::ConstStr => &string::ConstStrOps,
        Type::Str => &string::StrOps,
        Type::Void => &fn_type::VoidOps,
        Type::Fn(_) => &fn_type::FnOps,
        Type::Array(_) => &array::ArrayOps,
        Type::Vector(_) => &array::VectorOps,
        Type::Rec(_) => &rec::RecOps,
    }
}

/// Swap the operands if necessary so that a lone constant ends up on the
/// right. Returns true if they were swapped.
pub fn order_expressions(a1: Exp, a2: Exp) -> (Exp, Exp, bool) {
    if a1.ty.is_const() && !a2.ty.is_const() {
        (a2, a1, true)
    } else {
        (a1, a2, false)
    }
}

// ----- value dispatchers -----

pub fn zero(p: &mut Parser, ty: &Type, pos: Position) -> Result<Exp> {
    ops(ty).zero(p, pos)
}

pub fn zero_reg(p: &mut Parser, ty: &Type, reg: u32) -> Result<()> {
    ops(ty).zero_reg(p, reg, Position::none())
}

pub fn zero_ref(p: &mut Parser, ty: &Type, base: u32, loc: u32, push: bool, pos: Position) -> Result<()> {
    ops(ty).zero_ref(p, ty, base, loc, push, pos)
}

pub fn exp_to_var(p: &mut Parser, e: Exp) -> Result<Exp> {
    ops(&e.ty.clone()).exp_to_var(p, e)
}

pub fn copy_var(p: &mut Parser, e: Exp) -> Result<Exp> {
    ops(&e.ty.clone()).copy_var(p, e)
}

pub fn dup(e: &Exp) -> Result<Exp> {
    ops(&e.ty).dup(e)
}

pub fn assign_reg(p: &mut Parser, reg: u32, e: Exp) -> Result<()> {
    ops(&e.ty.clone()).assign_reg(p, reg, e)
}

pub fn assign_mem(p: &mut Parser, base: u32, loc: u32, e: Exp) -> Result<()> {
    ops(&e.ty.clone()).assign_mem(p, base, loc, e)
}

pub fn assign_new_mem(p: &mut Parser, base: u32, loc: u32, e: Exp) -> Result<()> {
    ops(&e.ty.clone()).assign_new_mem(p, base, loc, e)
}

pub fn load_mem(p: &mut Parser, ty: &Type, base: u32, loc: u32, pos: Position) -> Result<Exp> {
    ops(ty).load_mem(p, ty, base, loc, pos)
}

// ----- collection dispatchers -----

pub fn indexed_read(
    p: &mut Parser,
    ty: &Type,
    base: u32,
    loc: u32,
    indices: Vec<Exp>,
    pos: Position,
) -> Result<Exp> {
    ops(ty).indexed_read(p, ty, base, loc, indices, pos)
}

pub fn indexed_write(
    p: &mut Parser,
    ty: &Type,
    base: u32,
    loc: u32,
    e: Exp,
    indices: Vec<Exp>,
) -> Result<()> {
    ops(ty).indexed_write(p, ty, base, loc, e, indices)
}

pub fn indexed_add(
    p: &mut Parser,
    ty: &Type,
    base: u32,
    loc: u32,
    e: Exp,
    indices: Vec<Exp>,
) -> Result<()> {
    ops(ty).indexed_add(p, ty, base, loc, e, indices)
}

pub fn indexed_sub(
    p: &mut Parser,
    ty: &Type,
    base: u32,
    loc: u32,
    e: Exp,
    indices: Vec<Exp>,
) -> Result<()> {
    ops(ty).indexed_sub(p, ty, base, loc, e, indices)
}

pub fn indexed_address(
    p: &mut Parser,
    ty: &Type,
    base: u32,
    loc: u32,
    indices: Vec<Exp>,
    pos: Position,
) -> Result<Exp> {
    ops(ty).indexed_address(p, ty, base, loc, indices, pos)
}

pub fn set(p: &mut Parser, ty: &Type, base: u32, loc: u32, e: Exp) -> Result<()> {
    ops(ty).set(p, ty, base, loc, e)
}

pub fn append(p: &mut Parser, ty: &Type, base: u32, loc: u32, e: Exp) -> Result<()> {
    ops(ty).append(p, ty, base, loc, e)
}

pub fn zero_buf(p: &mut Parser, ty: &Type, data_reg: u32, size_reg: u32, pos: Position) -> Result<()> {
    ops(ty).zero_buf(p, ty, data_reg, size_reg, pos)
}

// ----- conversion dispatchers -----

pub fn to_int32(p: &mut Parser, e: Exp) -> Result<Exp> {
    ops(&e.ty.clone()).to_int32(p, e)
}

pub fn zerox(p: &mut Parser, e: Exp) -> Result<Exp> {
    ops(&e.ty.clone()).zerox(p, e)
}

pub fn to_byte(p: &mut Parser, e: Exp) -> Result<Exp> {
    ops(&e.ty.clone()).to_byte(p, e)
}

pub fn to_float64(p: &mut Parser, e: Exp) -> Result<Exp> {
    ops(&e.ty.clone()).to_float64(p, e)
}

pub fn to_string(p: &mut Parser, e: Exp) -> Result<Exp> {
    ops(&e.ty.clone()).to_string(p, e)
}

pub fn to_hex_string(p: &mut Parser, e: Exp) -> Result<Exp> {
    ops(&e.ty.clone()).to_hex_string(p, e)
}

pub fn coerce(p: &mut Parser, e: Exp, target: &Type) -> Result<Exp> {
    if e.ty == *target {
        return Ok(e);
    }
    ops(&e.ty.clone()).coerce(p, e, target)
}

// ----- operator dispatchers -----

pub fn add(p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
    let (a1, a2, _) = order_expressions(a1, a2);
    ops(&a1.ty.clone()).add(p, a1, a2)
}

pub fn mul(p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
    let (a1, a2, _) = order_expressions(a1, a2);
    ops(&a1.ty.clone()).mul(p, a1, a2)
}

pub fn and(p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
    let a1 = to_int32(p, a1)?;
    let a2 = to_int32(p, a2)?;
    let (a1, a2, _) = order_expressions(a1, a2);
    ops(&a1.ty.clone()).and(p, a1, a2)
}

pub fn or(p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
    let a1 = to_int32(p, a1)?;
    let a2 = to_int32(p, a2)?;
    let (a1, a2, _) = order_expressions(a1, a2);
    ops(&a1.ty.clone()).or(p, a1, a2)
}

pub fn eor(p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
    let a1 = to_int32(p, a1)?;
    let a2 = to_int32(p, a2)?;
    let (a1, a2, _) = order_expressions(a1, a2);
    ops(&a1.ty.clone()).eor(p, a1, a2)
}

pub fn eq(p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
    let (a1, a2, _) = order_expressions(a1, a2);
    ops(&a1.ty.clone()).eq(p, a1, a2)
}

pub fn neq(p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
    let (a1, a2, _) = order_expressions(a1, a2);
    ops(&a1.ty.clone()).neq(p, a1, a2)
}

pub fn sub(p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
    let (a1, a2, swapped) = order_expressions(a1, a2);
    ops(&a1.ty.clone()).sub(p, a1, a2, swapped)
}

pub fn divide(p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
    let a1 = to_float64(p, a1)?;
    let a2 = to_float64(p, a2)?;
    let (a1, a2, swapped) = order_expressions(a1, a2);
    ops(&a1.ty.clone()).divr(p, a1, a2, swapped)
}

pub fn gt(p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
    let (a1, a2, swapped) = order_expressions(a1, a2);
    ops(&a1.ty.clone()).gt(p, a1, a2, swapped)
}

pub fn lte(p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
    let (a1, a2, swapped) = order_expressions(a1, a2);
    ops(&a1.ty.clone()).lte(p, a1, a2, swapped)
}

pub fn lt(p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
    let (a1, a2, swapped) = order_expressions(a1, a2);
    ops(&a1.ty.clone()).lt(p, a1, a2, swapped)
}

pub fn gte(p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
    let (a1, a2, swapped) = order_expressions(a1, a2);
    ops(&a1.ty.clone()).gte(p, a1, a2, swapped)
}

pub fn div(p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
    let a1 = to_int32(p, a1)?;
    let a2 = to_int32(p, a2)?;
    ops(&a1.ty.clone()).div(p, a1, a2)
}

pub fn modulo(p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
    let a1 = to_int32(p, a1)?;
    let a2 = to_int32(p, a2)?;
    ops(&a1.ty.clone()).modulo(p, a1, a2)
}

pub fn lsl(p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
    let a1 = to_int32(p, a1)?;
    let a2 = to_int32(p, a2)?;
    ops(&a1.ty.clone()).lsl(p, a1, a2)
}

pub fn lsr(p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
    let a1 = to_int32(p, a1)?;
    let a2 = to_int32(p, a2)?;
    ops(&a1.ty.clone()).lsr(p, a1, a2)
}

pub fn asr(p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
    let a1 = to_int32(p, a1)?;
    let a2 = to_int32(p, a2)?;
    ops(&a1.ty.clone()).asr(p, a1, a2)
}

pub fn pow(p: &mut Parser, a1: Exp, a2: Exp) -> Result<Exp> {
    ops(&a1.ty.clone()).pow(p, a1, a2)
}

pub fn not(p: &mut Parser, e: Exp) -> Result<Exp> {
    let e = to_int32(p, e)?;
    ops(&e.ty.clone()).not(p, e)
}

pub fn abs(p: &mut Parser, e: Exp) -> Result<Exp> {
    ops(&e.ty.clone()).abs(p, e)
}

pub fn sgn(p: &mut Parser, e: Exp) -> Result<Exp> {
    ops(&e.ty.clone()).sgn(p, e)
}

pub fn is_inf(p: &mut Parser, e: Exp) -> Result<Exp> {
    ops(&e.ty.clone()).is_inf(p, e)
}

pub fn unary_minus(p: &mut Parser, e: Exp) -> Result<Exp> {
    ops(&e.ty.clone()).unary_minus(p, e)
}

pub fn ret(p: &mut Parser, ty: &Type, reg: u32, pos: Position) -> Result<()> {
    ops(ty).ret(p, reg, pos)
}

pub fn print(p: &mut Parser, e: Exp) -> Result<()> {
    ops(&e.ty.clone()).print(p, e)
}

pub fn destructor(p: &mut Parser, ty: &Type) -> Result<Option<usize>> {
    ops(ty).destructor(p, ty, Position::none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exp::Exp;
    use pretty_assertions::assert_eq;

    fn parser() -> Parser {
        Parser::new("", "test").unwrap()
    }

    #[test]
    fn test_ordering_moves_const_right() {
        let pos = Position::start();
        let (a1, a2, swapped) =
            order_expressions(Exp::int_const(1, pos), Exp::int_var(4, pos));
        assert!(swapped);
        assert_eq!(a1.ty, Type::Int);
        assert_eq!(a2.ty, Type::ConstInt);

        let (a1, _, swapped) =
            order_expressions(Exp::int_var(4, pos), Exp::int_const(1, pos));
        assert!(!swapped);
        assert_eq!(a1.ty, Type::Int);
    }

    #[test]
    fn test_coercion_round_trips() {
        let mut p = parser();
        let pos = Position::start();

        let widened = coerce(&mut p, Exp::int_const(5, pos), &Type::Real).unwrap();
        assert_eq!(widened.real_value().unwrap(), 5.0);
        let back = coerce(&mut p, widened, &Type::Int).unwrap();
        assert_eq!(back.int_value().unwrap(), 5);
    }

    #[test]
    fn test_real_to_int_rounds() {
        let mut p = parser();
        let pos = Position::start();
        let narrowed = to_int32(&mut p, Exp::real_const(2.5, pos)).unwrap();
        assert_eq!(narrowed.int_value().unwrap(), 3);
        let narrowed = to_int32(&mut p, Exp::real_const(-2.5, pos)).unwrap();
        assert_eq!(narrowed.int_value().unwrap(), -3);
    }

    #[test]
    fn test_const_division_by_zero() {
        let mut p = parser();
        let pos = Position::start();
        let err = div(&mut p, Exp::int_const(1, pos), Exp::int_const(0, pos)).unwrap_err();
        assert_eq!(err.kind, bramble_common::ErrorKind::DivideByZero);
    }

    #[test]
    fn test_comparison_results_are_zero_or_minus_one() {
        let mut p = parser();
        let pos = Position::start();
        let truthy = lt(&mut p, Exp::int_const(1, pos), Exp::int_const(2, pos)).unwrap();
        assert_eq!(truthy.int_value().unwrap(), -1);
        let falsy = gt(&mut p, Exp::int_const(1, pos), Exp::int_const(2, pos)).unwrap();
        assert_eq!(falsy.int_value().unwrap(), 0);
    }

    #[test]
    fn test_pow_folds_trivial_exponents() {
        let mut p = parser();
        let pos = Position::start();
        let one = pow(&mut p, Exp::int_var(5, pos), Exp::int_const(0, pos)).unwrap();
        assert_eq!(one.int_value().unwrap(), 1);
        let base = pow(&mut p, Exp::int_var(5, pos), Exp::int_const(1, pos)).unwrap();
        assert_eq!(base.reg().unwrap(), 5);
    }

    #[test]
    fn test_unsupported_operation_reports_type() {
        let mut p = parser();
        let pos = Position::start();
        let err = modulo(
            &mut p,
            Exp::str_const(b"a".to_vec(), pos),
            Exp::int_const(1, pos),
        )
        .unwrap_err();
        assert!(matches!(
            err.kind,
            bramble_common::ErrorKind::NotSupported { .. }
        ));
    }
}

