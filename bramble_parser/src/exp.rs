//! Expression values
//!
//! An [`Exp`] carries its type and either an IR operand (variables and
//! computed results), a folded immediate (const-tagged types), or a literal
//! string buffer. Expressions are move-only: every operator and helper
//! consumes its inputs, so a failed path drops partially-built values
//! instead of double-emitting their side effects.

use crate::call::PendingCall;
use crate::context::Parser;
use crate::type_if;
use crate::types::Type;
use bramble_common::{Error, Position, Result};
use bramble_ir::{CallKind, IrArg, Opcode, Operand};

#[derive(Debug, Clone, PartialEq)]
pub enum ExpKind {
    IntConst(i32),
    RealConst(f64),
    StrConst(Vec<u8>),
    Var(Operand),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Exp {
    pub ty: Type,
    pub kind: ExpKind,
    pub pos: Position,
}

impl Exp {
    pub fn int_const(value: i32, pos: Position) -> Self {
        Self {
            ty: Type::ConstInt,
            kind: ExpKind::IntConst(value),
            pos,
        }
    }

    pub fn real_const(value: f64, pos: Position) -> Self {
        Self {
            ty: Type::ConstReal,
            kind: ExpKind::RealConst(value),
            pos,
        }
    }

    pub fn str_const(value: Vec<u8>, pos: Position) -> Self {
        Self {
            ty: Type::ConstStr,
            kind: ExpKind::StrConst(value),
            pos,
        }
    }

    pub fn int_var(reg: u32, pos: Position) -> Self {
        Self {
            ty: Type::Int,
            kind: ExpKind::Var(Operand::Reg(reg)),
            pos,
        }
    }

    pub fn real_var(reg: u32, pos: Position) -> Self {
        Self {
            ty: Type::Real,
            kind: ExpKind::Var(Operand::Freg(reg)),
            pos,
        }
    }

    pub fn var(ty: Type, operand: Operand, pos: Position) -> Self {
        Self {
            ty,
            kind: ExpKind::Var(operand),
            pos,
        }
    }

    /// The operand of a register-backed expression
    pub fn operand(&self) -> Result<Operand> {
        match &self.kind {
            ExpKind::Var(op) => Ok(*op),
            _ => Err(Error::assertion_failed(self.pos)),
        }
    }

    /// The register number of a register-backed expression
    pub fn reg(&self) -> Result<u32> {
        self.operand()?.reg().ok_or(Error::assertion_failed(self.pos))
    }

    pub fn int_value(&self) -> Result<i32> {
        match &self.kind {
            ExpKind::IntConst(v) => Ok(*v),
            _ => Err(Error::assertion_failed(self.pos)),
        }
    }

    pub fn real_value(&self) -> Result<f64> {
        match &self.kind {
            ExpKind::RealConst(v) => Ok(*v),
            _ => Err(Error::assertion_failed(self.pos)),
        }
    }
}

/// Coerce an expression to a concrete target type
pub fn coerce_type(p: &mut Parser, e: Exp, target: &Type) -> Result<Exp> {
    type_if::coerce(p, e, target)
}

/// Zero the current function's return register and jump to its end label.
/// Used on error paths and as the default return.
pub fn return_default_value(p: &mut Parser) -> Result<()> {
    let end_label = p.section_ref().end_label;
    let ret = p
        .section_ref()
        .typ
        .as_ref()
        .map(|sig| sig.ret.clone());
    let returns_value = !p.in_main() && !matches!(ret, Some(bramble_ir::IrType::Void) | None);

    if returns_value {
        let ret_reg = p.section_ref().ret_reg;
        let ty = p.fn_ret.clone().ok_or_else(Error::internal)?;
        type_if::zero_reg(p, &ty, ret_reg)?;
    }
    p.section()
        .add_instr_no_reg(Opcode::Jmp, Operand::Label(end_label));
    Ok(())
}

/// Emit the post-operation error check: test the error flag and route
/// control to the innermost handler, or to the function's default-value
/// return when there is none
pub fn handle_errors(p: &mut Parser) -> Result<()> {
    if p.section_ref().in_error_handler {
        // already handling an error; ignore any new one and continue
        p.section().add_instr_no_arg(Opcode::Cleare);
        return Ok(());
    }

    let flag = p.section().add_instr1(Opcode::Teste)?;
    let ok_label = p.section().new_label();

    if let Some(handler) = p.section_ref().current_handler() {
        p.section().add_instr_reg(
            Opcode::Jmpc,
            Operand::Reg(flag),
            Operand::Label(handler),
            Operand::Label(ok_label),
        );
    } else if p.in_main() || returns_void(p) {
        // nothing to zero, jump straight to the exit code
        let end_label = p.section_ref().end_label;
        p.section().add_instr_reg(
            Opcode::Jmpc,
            Operand::Reg(flag),
            Operand::Label(end_label),
            Operand::Label(ok_label),
        );
    } else {
        let error_label = p.section().new_label();
        p.section().add_instr_reg(
            Opcode::Jmpc,
            Operand::Reg(flag),
            Operand::Label(error_label),
            Operand::Label(ok_label),
        );
        p.section().add_label(error_label)?;
        return_default_value(p)?;
    }

    p.section().add_label(ok_label)
}

/// Assign a runtime error code and transfer control the way an error does:
/// into the innermost handler if one exists, otherwise out of the function
/// with the error flag set. Consumes `e`.
pub fn generate_error(p: &mut Parser, e: Exp) -> Result<()> {
    let e = type_if::exp_to_var(p, e)?;
    let reg = e.reg()?;
    p.assign_err(reg);

    if p.section_ref().in_error_handler {
        p.section().add_instr_no_arg(Opcode::Sete);
        return_default_value(p)
    } else if let Some(handler) = p.section_ref().current_handler() {
        p.section()
            .add_instr_no_reg(Opcode::Jmp, Operand::Label(handler));
        Ok(())
    } else {
        p.section().add_instr_no_arg(Opcode::Sete);
        return_default_value(p)
    }
}

fn returns_void(p: &Parser) -> bool {
    matches!(
        p.section_ref().typ.as_ref().map(|sig| &sig.ret),
        Some(bramble_ir::IrType::Void) | None
    )
}

/// Emit a call and record it for resolution. `arg_types` are the types the
/// arguments were emitted as; `fn_type` is the return type the call site
/// expects, `Void` for procedures. Returns the result expression for
/// function calls.
pub fn add_call(
    p: &mut Parser,
    name: String,
    arg_types: Vec<Type>,
    args: Vec<IrArg>,
    fn_type: &Type,
    pos: Position,
) -> Result<Option<Exp>> {
    let result = match fn_type {
        Type::Void => {
            p.section().add_call(args);
            None
        }
        Type::Int | Type::Byte => {
            let reg = p.section().add_i32_call(args)?;
            Some(Exp::int_var(reg, pos))
        }
        Type::Real => {
            let reg = p.section().add_real_call(args)?;
            Some(Exp::real_var(reg, pos))
        }
        other => {
            return Err(Error::not_supported("call", other.name(), pos));
        }
    };

    let site = p.section_ref().next_offset() - 1;
    let in_error_handler = p.section_ref().in_error_handler;

    handle_errors(p)?;

    p.calls.push(PendingCall {
        name,
        section: p.current_index(),
        site,
        in_error_handler,
        pos,
        arg_types,
        expects: match fn_type {
            Type::Void => None,
            other => Some(other.clone()),
        },
    });

    Ok(result)
}

/// Emit an indirect call through a function pointer register
pub fn add_call_ptr(
    p: &mut Parser,
    args: Vec<IrArg>,
    fn_type: &Type,
    ptr: u32,
    pos: Position,
) -> Result<Option<Exp>> {
    let kind = match fn_type {
        Type::Void => CallKind::Proc,
        Type::Int | Type::Byte => CallKind::I32,
        Type::Real => CallKind::Real,
        other => return Err(Error::not_supported("indirect call", other.name(), pos)),
    };
    let result = p.section().add_call_ptr(kind, args, ptr);
    let e = match (kind, result) {
        (CallKind::I32, Some(reg)) => Some(Exp::int_var(reg, pos)),
        (CallKind::Real, Some(reg)) => Some(Exp::real_var(reg, pos)),
        _ => None,
    };
    handle_errors(p)?;
    Ok(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_const_constructors() {
        let pos = Position::start();
        assert_eq!(Exp::int_const(3, pos).ty, Type::ConstInt);
        assert_eq!(Exp::real_const(1.5, pos).ty, Type::ConstReal);
        assert_eq!(Exp::str_const(b"hi".to_vec(), pos).ty, Type::ConstStr);
        assert_eq!(Exp::int_var(4, pos).ty, Type::Int);
    }

    #[test]
    fn test_accessors_reject_wrong_kind() {
        let pos = Position::start();
        assert!(Exp::int_const(3, pos).reg().is_err());
        assert!(Exp::int_var(3, pos).int_value().is_err());
        assert_eq!(Exp::int_var(3, pos).reg().unwrap(), 3);
        assert_eq!(Exp::int_const(3, pos).int_value().unwrap(), 3);
    }
}
