//! IR sections and the instruction stream builder
//!
//! A section is one IR-level function body. It owns an ordered op stream,
//! a monotonic label allocator and one monotonic register allocator per
//! bank. Registers are never reused within a section.
//!
//! Error-handler code is collected in a separate stream while the handler is
//! being parsed and appended after the end label when the section is closed;
//! call sites recorded inside a handler are later fixed up relative to
//! [`Section::handler_base`].

use crate::instruction::{CallInfo, CallKind, Instr, IrArg, Op, Opcode, CALLEE_UNRESOLVED};
use crate::operand::{Operand, RegisterClass, TEMP_START};
use crate::types::TypeSignature;
use bramble_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    /// Declared signature. `None` for internal builtins that implement
    /// operators; calls to those skip type checking entirely.
    pub typ: Option<TypeSignature>,
    ops: Vec<Op>,
    error_ops: Vec<Op>,
    pub in_error_handler: bool,
    label_counter: u32,
    reg_counter: u32,
    freg_counter: u32,
    defined_labels: HashSet<u32>,
    /// Register the function's return value is placed in before jumping to
    /// `end_label`
    pub ret_reg: u32,
    /// Label every return path jumps to
    pub end_label: u32,
    /// Exit label that skips cleanup (main only)
    pub nofree_label: Option<u32>,
    /// Compile-time counter register for the runtime cleanup stack,
    /// allocated lazily on the first push
    pub cleanup_stack_reg: Option<u32>,
    /// Offset of the placeholder at function entry that is rewritten to
    /// initialise the cleanup counter, or elided if never needed
    pub cleanup_stack_nop: Option<usize>,
    /// Label of the shared out-of-range trap, reserved on first use
    pub array_access_label: Option<u32>,
    /// Labels of active ONERROR handlers, innermost last
    pub handler_list: Vec<u32>,
    /// Offset at which the error-handler stream was appended
    pub handler_base: Option<usize>,
    /// Local frame size in bytes
    pub locals: u32,
    /// Offset of the `eflag` pseudo-variable in the global frame
    pub eflag_offset: i32,
    /// Offset of the `err` pseudo-variable in the global frame
    pub error_offset: i32,
}

impl Section {
    pub fn new(
        name: impl Into<String>,
        typ: Option<TypeSignature>,
        eflag_offset: i32,
        error_offset: i32,
    ) -> Self {
        let mut int_params = 0;
        let mut real_params = 0;
        if let Some(sig) = &typ {
            for param in &sig.params {
                match param.ty.register_class() {
                    Some(RegisterClass::Real) => real_params += 1,
                    Some(RegisterClass::Integer) => int_params += 1,
                    None => {}
                }
            }
        }

        let mut section = Self {
            name: name.into(),
            ops: Vec::new(),
            error_ops: Vec::new(),
            in_error_handler: false,
            label_counter: 0,
            reg_counter: TEMP_START + int_params,
            freg_counter: TEMP_START + real_params,
            defined_labels: HashSet::new(),
            ret_reg: 0,
            end_label: 0,
            nofree_label: None,
            cleanup_stack_reg: None,
            cleanup_stack_nop: None,
            array_access_label: None,
            handler_list: Vec::new(),
            handler_base: None,
            locals: 0,
            eflag_offset,
            error_offset,
            typ,
        };

        section.end_label = section.new_label();
        section.ret_reg = match section
            .typ
            .as_ref()
            .and_then(|sig| sig.ret.register_class())
        {
            Some(RegisterClass::Real) => section.alloc_reg(RegisterClass::Real),
            Some(RegisterClass::Integer) => section.alloc_reg(RegisterClass::Integer),
            None => 0,
        };
        section
    }

    /// Entry registers for each declared parameter, in declaration order
    pub fn param_regs(&self) -> Vec<Operand> {
        let mut ints = 0;
        let mut reals = 0;
        let mut regs = Vec::new();
        if let Some(sig) = &self.typ {
            for param in &sig.params {
                match param.ty.register_class() {
                    Some(RegisterClass::Real) => {
                        regs.push(Operand::Freg(TEMP_START + reals));
                        reals += 1;
                    }
                    _ => {
                        regs.push(Operand::Reg(TEMP_START + ints));
                        ints += 1;
                    }
                }
            }
        }
        regs
    }

    /// Number of ops in the main stream
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of ops in the pending error-handler stream
    pub fn error_len(&self) -> usize {
        self.error_ops.len()
    }

    /// Offset of the op the next emission will occupy, in whichever stream
    /// is active
    pub fn next_offset(&self) -> usize {
        if self.in_error_handler {
            self.error_ops.len()
        } else {
            self.ops.len()
        }
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn op_at_mut(&mut self, offset: usize) -> Option<&mut Op> {
        self.ops.get_mut(offset)
    }

    pub fn reg_count(&self) -> u32 {
        self.reg_counter
    }

    pub fn freg_count(&self) -> u32 {
        self.freg_counter
    }

    pub fn new_label(&mut self) -> u32 {
        let label = self.label_counter;
        self.label_counter += 1;
        label
    }

    pub fn alloc_reg(&mut self, class: RegisterClass) -> u32 {
        match class {
            RegisterClass::Integer => {
                let reg = self.reg_counter;
                self.reg_counter += 1;
                reg
            }
            RegisterClass::Real => {
                let reg = self.freg_counter;
                self.freg_counter += 1;
                reg
            }
        }
    }

    fn stream_mut(&mut self) -> &mut Vec<Op> {
        if self.in_error_handler {
            &mut self.error_ops
        } else {
            &mut self.ops
        }
    }

    /// Record that the next instruction starts at `label`. Defining the same
    /// label twice is a compiler bug.
    pub fn add_label(&mut self, label: u32) -> Result<()> {
        if !self.defined_labels.insert(label) {
            return Err(Error::internal());
        }
        self.stream_mut().push(Op::Label(label));
        Ok(())
    }

    fn alloc_result(&mut self, opcode: Opcode) -> Result<Operand> {
        match opcode.result_class() {
            Some(RegisterClass::Real) => Ok(Operand::Freg(self.alloc_reg(RegisterClass::Real))),
            Some(RegisterClass::Integer) => {
                Ok(Operand::Reg(self.alloc_reg(RegisterClass::Integer)))
            }
            None => Err(Error::internal()),
        }
    }

    /// Append an instruction whose result is a freshly allocated register
    /// and return that register
    pub fn add_instr(&mut self, opcode: Opcode, op1: Operand, op2: Operand) -> Result<u32> {
        let dest = self.alloc_result(opcode)?;
        self.stream_mut()
            .push(Op::Instr(Instr::new(opcode, dest, op1, op2)));
        Ok(dest.reg().ok_or_else(Error::internal)?)
    }

    /// Append a source-less instruction that only produces a value, e.g.
    /// `TESTE`
    pub fn add_instr1(&mut self, opcode: Opcode) -> Result<u32> {
        self.add_instr(opcode, Operand::None, Operand::None)
    }

    /// Append an instruction with no result register
    pub fn add_instr_no_reg(&mut self, opcode: Opcode, op0: Operand) {
        self.stream_mut()
            .push(Op::Instr(Instr::new(opcode, op0, Operand::None, Operand::None)));
    }

    pub fn add_instr2_no_reg(&mut self, opcode: Opcode, op0: Operand, op1: Operand) {
        self.stream_mut()
            .push(Op::Instr(Instr::new(opcode, op0, op1, Operand::None)));
    }

    /// Append an instruction with every operand supplied by the caller.
    /// Used for stores (`value, base, offset`), conditional branches
    /// (`cond, true, false`) and instructions writing a caller-chosen
    /// destination.
    pub fn add_instr_reg(&mut self, opcode: Opcode, op0: Operand, op1: Operand, op2: Operand) {
        self.stream_mut()
            .push(Op::Instr(Instr::new(opcode, op0, op1, op2)));
    }

    pub fn add_instr_no_arg(&mut self, opcode: Opcode) {
        self.stream_mut().push(Op::Instr(Instr::new(
            opcode,
            Operand::None,
            Operand::None,
            Operand::None,
        )));
    }

    /// Append a placeholder and return its offset for later promotion
    pub fn add_nop(&mut self) -> usize {
        let stream = self.stream_mut();
        stream.push(Op::Instr(Instr::nop()));
        stream.len() - 1
    }

    /// Rewrite the nop at `offset` of the main stream in place to a unary
    /// instruction with a fresh destination register, returning the register.
    /// References held to the section across promotion stay valid: the op is
    /// overwritten, never moved.
    pub fn promote_nop(&mut self, offset: usize, opcode: Opcode, src: Operand) -> Result<u32> {
        let dest = self.alloc_result(opcode)?;
        let slot = self.ops.get_mut(offset).ok_or_else(Error::internal)?;
        match slot {
            Op::Instr(instr) if instr.opcode == Opcode::Nop => {
                *instr = Instr::new(opcode, dest, src, Operand::None);
                Ok(dest.reg().ok_or_else(Error::internal)?)
            }
            _ => Err(Error::internal()),
        }
    }

    /// Rewrite the nop at `offset` of the main stream to an arbitrary
    /// instruction. Used for the lazy cleanup-counter initialisation.
    pub fn rewrite_nop(&mut self, offset: usize, instr: Instr) -> Result<()> {
        let slot = self.ops.get_mut(offset).ok_or_else(Error::internal)?;
        match slot {
            Op::Instr(old) if old.opcode == Opcode::Nop => {
                *old = instr;
                Ok(())
            }
            _ => Err(Error::internal()),
        }
    }

    fn add_call_inner(
        &mut self,
        kind: CallKind,
        args: Vec<IrArg>,
        ptr: Option<u32>,
    ) -> Option<u32> {
        let result = match kind {
            CallKind::Proc => None,
            CallKind::I32 => Some(self.alloc_reg(RegisterClass::Integer)),
            CallKind::Real => Some(self.alloc_reg(RegisterClass::Real)),
        };
        let info = CallInfo {
            args,
            callee: CALLEE_UNRESOLVED,
            result,
        };
        let op = match ptr {
            Some(ptr) => Op::CallPtr { kind, info, ptr },
            None => Op::Call { kind, info },
        };
        self.stream_mut().push(op);
        result
    }

    /// Emit a procedure call
    pub fn add_call(&mut self, args: Vec<IrArg>) {
        self.add_call_inner(CallKind::Proc, args, None);
    }

    /// Emit a call returning an integer-bank value
    pub fn add_i32_call(&mut self, args: Vec<IrArg>) -> Result<u32> {
        self.add_call_inner(CallKind::I32, args, None)
            .ok_or_else(Error::internal)
    }

    /// Emit a call returning a floating-bank value
    pub fn add_real_call(&mut self, args: Vec<IrArg>) -> Result<u32> {
        self.add_call_inner(CallKind::Real, args, None)
            .ok_or_else(Error::internal)
    }

    /// Emit an indirect call through a function pointer held in `ptr`
    pub fn add_call_ptr(&mut self, kind: CallKind, args: Vec<IrArg>, ptr: u32) -> Option<u32> {
        self.add_call_inner(kind, args, Some(ptr))
    }

    /// Emit an operating-system service call
    pub fn add_sys_call(
        &mut self,
        call_id: u32,
        in_regs: Vec<u32>,
        out_regs: Vec<u32>,
        flags_reg: Option<u32>,
    ) {
        self.stream_mut().push(Op::Sys {
            call_id,
            in_regs,
            out_regs,
            flags_reg,
        });
    }

    /// Begin collecting ops for the handler starting at `label`
    pub fn start_error_handler(&mut self, label: u32) -> Result<()> {
        self.in_error_handler = true;
        self.handler_list.push(label);
        self.add_label(label)
    }

    pub fn end_error_handler(&mut self) {
        self.in_error_handler = false;
    }

    /// The innermost active ONERROR handler, if any
    pub fn current_handler(&self) -> Option<u32> {
        self.handler_list.last().copied()
    }

    /// Move the collected handler code to the end of the main stream,
    /// recording the base offset handler-relative call sites are fixed up
    /// against
    pub fn append_error_ops(&mut self) {
        self.handler_base = Some(self.ops.len());
        let handlers = std::mem::take(&mut self.error_ops);
        self.ops.extend(handlers);
    }

    /// Drop every placeholder that was never promoted. Only valid once call
    /// resolution has run: op offsets recorded in pending calls go stale.
    pub fn prune_nops(&mut self) {
        self.ops
            .retain(|op| !matches!(op, Op::Instr(instr) if instr.opcode == Opcode::Nop));
    }

    /// Check the structural invariants: every branch target is a label
    /// defined in this section and the handler stream has been merged
    pub fn validate(&self) -> Result<()> {
        if !self.error_ops.is_empty() {
            return Err(Error::internal());
        }
        for op in &self.ops {
            let Op::Instr(instr) = op else { continue };
            let targets: &[Operand] = match instr.opcode {
                Opcode::Jmp => &instr.ops[0..1],
                Opcode::Jmpc | Opcode::JmpcNf => &instr.ops[1..3],
                _ => continue,
            };
            for target in targets {
                let label = target.label().ok_or_else(Error::internal)?;
                if !self.defined_labels.contains(&label) {
                    return Err(Error::internal());
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.typ {
            Some(sig) => writeln!(f, "section {} {}", self.name, sig)?,
            None => writeln!(f, "section {}", self.name)?,
        }
        for op in &self.ops {
            writeln!(f, "{}", op)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IrType, Param};
    use pretty_assertions::assert_eq;

    fn plain_section() -> Section {
        Section::new("main", Some(TypeSignature::proc(Vec::new())), 0, 4)
    }

    #[test]
    fn test_register_allocation_is_monotonic() {
        let mut section = plain_section();
        let r0 = section
            .add_instr(Opcode::MoviI32, Operand::I32(1), Operand::None)
            .unwrap();
        let r1 = section
            .add_instr(Opcode::AddiI32, Operand::Reg(r0), Operand::I32(2))
            .unwrap();
        assert!(r1 > r0);
        assert!(r0 >= TEMP_START);
    }

    #[test]
    fn test_param_regs_split_banks() {
        let sig = TypeSignature::new(
            IrType::Void,
            vec![
                Param {
                    name: "a%".into(),
                    ty: IrType::I32,
                },
                Param {
                    name: "x".into(),
                    ty: IrType::Real,
                },
                Param {
                    name: "b%".into(),
                    ty: IrType::I32,
                },
            ],
        );
        let section = Section::new("PROCp", Some(sig), 0, 4);
        assert_eq!(
            section.param_regs(),
            vec![
                Operand::Reg(TEMP_START),
                Operand::Freg(TEMP_START),
                Operand::Reg(TEMP_START + 1),
            ]
        );
    }

    #[test]
    fn test_duplicate_label_rejected() {
        let mut section = plain_section();
        let label = section.new_label();
        section.add_label(label).unwrap();
        assert!(section.add_label(label).is_err());
    }

    #[test]
    fn test_promote_nop_in_place() {
        let mut section = plain_section();
        let nop = section.add_nop();
        let len_before = section.len();
        let reg = section
            .promote_nop(nop, Opcode::MovI32Fp, Operand::Reg(2))
            .unwrap();
        assert_eq!(section.len(), len_before);
        match &section.ops()[nop] {
            Op::Instr(instr) => {
                assert_eq!(instr.opcode, Opcode::MovI32Fp);
                assert_eq!(instr.ops[0], Operand::Freg(reg));
                assert_eq!(instr.ops[1], Operand::Reg(2));
            }
            other => panic!("expected instruction, got {:?}", other),
        }
    }

    #[test]
    fn test_promote_requires_nop() {
        let mut section = plain_section();
        section.add_instr_no_arg(Opcode::PrintNl);
        assert!(section
            .promote_nop(0, Opcode::MovI32Fp, Operand::Reg(2))
            .is_err());
    }

    #[test]
    fn test_error_stream_merge() {
        let mut section = plain_section();
        section.add_instr_no_arg(Opcode::PrintNl);
        let handler = section.new_label();
        section.start_error_handler(handler).unwrap();
        section.add_instr_no_arg(Opcode::Sete);
        section.end_error_handler();
        assert_eq!(section.len(), 1);
        assert_eq!(section.error_len(), 2);

        section.append_error_ops();
        assert_eq!(section.handler_base, Some(1));
        assert_eq!(section.len(), 3);
        assert_eq!(section.error_len(), 0);
    }

    #[test]
    fn test_validate_catches_undefined_target() {
        let mut section = plain_section();
        let label = section.new_label();
        section.add_instr_no_reg(Opcode::Jmp, Operand::Label(label));
        assert!(section.validate().is_err());
        section.add_label(label).unwrap();
        assert!(section.validate().is_ok());
    }

    #[test]
    fn test_prune_nops() {
        let mut section = plain_section();
        section.add_nop();
        section.add_instr_no_arg(Opcode::PrintNl);
        let nop = section.add_nop();
        section
            .promote_nop(nop, Opcode::MovFpI32, Operand::Freg(2))
            .unwrap();
        section.prune_nops();
        assert_eq!(section.len(), 2);
    }
}
