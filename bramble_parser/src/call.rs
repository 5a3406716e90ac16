//! Pending calls and the post-parse resolution pass
//!
//! During parsing every call emits its arguments into placeholder-backed
//! registers and a `CALL*` op carrying a sentinel callee index. A
//! [`PendingCall`] captures everything the resolver needs; after parsing,
//! [`resolve_calls`] binds each call to its section, checks arity and
//! parameter types, and promotes argument placeholders to coercions where
//! the declared and required types differ by an int/real move.

use crate::types::Type;
use bramble_common::{Error, ErrorKind, Position, Result};
use bramble_ir::{IrArg, IrType, Op, Opcode, Operand, Program, RegisterClass};
use log::debug;

#[derive(Debug, Clone)]
pub struct PendingCall {
    pub name: String,
    /// Section the call was emitted in
    pub section: usize,
    /// Op offset of the `CALL*`, relative to the stream it was emitted into
    pub site: usize,
    /// True if the call was emitted inside an error handler; its offsets are
    /// then relative to the handler base
    pub in_error_handler: bool,
    pub pos: Position,
    /// Types of the arguments as they were emitted at the call site
    pub arg_types: Vec<Type>,
    /// The return type the call site expects; `None` when invoked as a
    /// procedure
    pub expects: Option<Type>,
}

/// Resolve every pending call against the completed section table
pub fn resolve_calls(prog: &mut Program, calls: &[PendingCall]) -> Result<()> {
    for call in calls {
        resolve_one(prog, call)?;
    }
    Ok(())
}

fn resolve_one(prog: &mut Program, call: &PendingCall) -> Result<()> {
    let callee = prog.find(&call.name).ok_or_else(|| {
        let kind = match call.expects {
            Some(_) => ErrorKind::UnknownFunction(call.name.clone()),
            None => ErrorKind::UnknownProcedure(call.name.clone()),
        };
        Error::new(kind, call.pos)
    })?;
    let callee_sig = prog.section(callee).typ.clone();
    debug!("resolving call to '{}' at {}", call.name, call.pos);

    let caller = prog.section_mut(call.section);
    let base = if call.in_error_handler {
        caller.handler_base.ok_or_else(Error::internal)?
    } else {
        0
    };
    let site = base + call.site;

    let args: Vec<IrArg> = match caller.op_at_mut(site) {
        Some(Op::Call { info, .. }) | Some(Op::CallPtr { info, .. }) => {
            info.callee = callee;
            info.args.clone()
        }
        _ => return Err(Error::internal()),
    };

    // Builtins that implement operators carry no declared type; the
    // expression engine already checked their arguments.
    let Some(sig) = callee_sig else {
        return Ok(());
    };

    match (&call.expects, &sig.ret) {
        (None, IrType::Void) | (Some(_), IrType::I32 | IrType::Real | IrType::Byte) => {}
        (None, _) => {
            return Err(Error::new(
                ErrorKind::ProcedureExpected(call.name.clone()),
                call.pos,
            ))
        }
        (Some(_), IrType::Void) => {
            return Err(Error::new(
                ErrorKind::FunctionExpected(call.name.clone()),
                call.pos,
            ))
        }
        (Some(_), _) => {}
    }

    if sig.params.len() != call.arg_types.len() {
        return Err(Error::new(
            ErrorKind::BadArgCount {
                name: call.name.clone(),
                expected: sig.params.len(),
                actual: call.arg_types.len(),
            },
            call.pos,
        ));
    }

    for (i, (arg, declared)) in args.iter().zip(call.arg_types.iter()).enumerate() {
        let declared_ir = declared.to_ir_type();
        let param_ir = &sig.params[i].ty;
        if declared_ir == *param_ir {
            continue;
        }

        let (opcode, src, class) = match (&declared_ir, param_ir) {
            (IrType::I32, IrType::Real) => {
                (Opcode::MovI32Fp, Operand::Reg(arg.reg), RegisterClass::Real)
            }
            (IrType::Real, IrType::I32) => {
                (Opcode::MovFpI32, Operand::Freg(arg.reg), RegisterClass::Integer)
            }
            _ => {
                return Err(Error::new(
                    ErrorKind::BadArgType {
                        name: call.name.clone(),
                        arg: i + 1,
                        expected: param_ir.to_string(),
                        actual: declared_ir.to_string(),
                    },
                    call.pos,
                ))
            }
        };

        let new_reg = caller.promote_nop(base + arg.nop, opcode, src)?;
        match caller.op_at_mut(site) {
            Some(Op::Call { info, .. }) | Some(Op::CallPtr { info, .. }) => {
                info.args[i] = IrArg {
                    class,
                    reg: new_reg,
                    nop: arg.nop,
                };
            }
            _ => return Err(Error::internal()),
        }
    }

    Ok(())
}
