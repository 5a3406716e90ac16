//! Instruction and opcode definitions

use crate::operand::{Operand, RegisterClass};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The opcode catalogue.
///
/// Naming follows the convention `<op>_<class>`, with an `i` suffix on the
/// mnemonic for variants whose second source operand is an immediate
/// (`AddiI32` is `add r, r, #imm`).
///
/// Heap contract assumed by emitted code: `GETREF` of a null data pointer
/// yields 1, and `REALLOC` of a null pointer behaves as a fresh `ALLOC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    // Integer arithmetic
    AddI32,
    AddiI32,
    SubI32,
    SubiI32,
    RsubiI32,
    MulI32,
    MuliI32,
    DivI32,
    DiviI32,
    ModI32,

    // Real arithmetic
    AddReal,
    AddiReal,
    SubReal,
    SubiReal,
    RsubiReal,
    MulReal,
    MuliReal,
    DivReal,
    DiviReal,
    RdiviReal,
    Powr,
    Absr,
    Sin,
    Cos,
    Tan,
    Log,
    Ln,
    Sqr,
    Expr,

    // Logical
    AndI32,
    AndiI32,
    OrI32,
    OriI32,
    EorI32,
    EoriI32,
    NotI32,

    // Integer comparison (result is 0 or -1)
    EqI32,
    EqiI32,
    NeqI32,
    NeqiI32,
    GtI32,
    GtiI32,
    LteI32,
    LteiI32,
    LtI32,
    LtiI32,
    GteI32,
    GteiI32,

    // Real comparison (integer result, 0 or -1)
    EqReal,
    EqiReal,
    NeqReal,
    NeqiReal,
    GtReal,
    GtiReal,
    LteReal,
    LteiReal,
    LtReal,
    LtiReal,
    GteReal,
    GteiReal,

    // Shifts
    LslI32,
    LsliI32,
    LsrI32,
    LsriI32,
    AsrI32,
    AsriI32,

    // Conversions
    MovI32Fp,
    MovFpI32,
    MovFprdI32,
    Signx8To32,

    // Control
    Jmp,
    Jmpc,
    JmpcNf,
    Ret,
    RetI32,
    RetReal,

    // Memory
    LoadoI8,
    LoadoI32,
    LoadoReal,
    StoreoI8,
    StoreoI32,
    StoreoReal,
    Alloc,
    Realloc,
    Ref,
    Deref,
    Getref,
    HeapFree,
    PushI32,
    PopI32,
    Mov,
    Movfp,
    MoviI32,
    MoviReal,
    CmovI32,
    /// Load the address of a string-pool constant
    Lca,

    // Runtime services
    PrintNl,
    PrintStr,
    PrintFp,
    I32Todec,
    Teste,
    Sete,
    Cleare,
    End,

    /// Placeholder that may be promoted in place to a real instruction
    Nop,
}

impl Opcode {
    /// The register bank the destination of this opcode lives in, or `None`
    /// for instructions that produce no value
    pub fn result_class(&self) -> Option<RegisterClass> {
        use Opcode::*;
        match self {
            AddReal | AddiReal | SubReal | SubiReal | RsubiReal | MulReal | MuliReal | DivReal
            | DiviReal | RdiviReal | Powr | Absr | Sin | Cos | Tan | Log | Ln | Sqr | Expr
            | MovI32Fp | LoadoReal | Movfp | MoviReal => Some(RegisterClass::Real),

            AddI32 | AddiI32 | SubI32 | SubiI32 | RsubiI32 | MulI32 | MuliI32 | DivI32
            | DiviI32 | ModI32 | AndI32 | AndiI32 | OrI32 | OriI32 | EorI32 | EoriI32 | NotI32
            | EqI32 | EqiI32 | NeqI32 | NeqiI32 | GtI32 | GtiI32 | LteI32 | LteiI32 | LtI32
            | LtiI32 | GteI32 | GteiI32 | EqReal | EqiReal | NeqReal | NeqiReal | GtReal
            | GtiReal | LteReal | LteiReal | LtReal | LtiReal | GteReal | GteiReal | LslI32
            | LsliI32 | LsrI32 | LsriI32 | AsrI32 | AsriI32 | MovFpI32 | MovFprdI32
            | Signx8To32 | LoadoI8 | LoadoI32 | Alloc | Realloc | Getref | PopI32 | Mov
            | MoviI32 | CmovI32 | Lca | Teste | I32Todec => Some(RegisterClass::Integer),

            Jmp | Jmpc | JmpcNf | Ret | RetI32 | RetReal | StoreoI8 | StoreoI32 | StoreoReal
            | Ref | Deref | HeapFree | PushI32 | PrintNl | PrintStr | PrintFp | Sete | Cleare
            | End | Nop => None,
        }
    }

    pub fn mnemonic(&self) -> &'static str {
        use Opcode::*;
        match self {
            AddI32 => "addi32",
            AddiI32 => "addii32",
            SubI32 => "subi32",
            SubiI32 => "subii32",
            RsubiI32 => "rsubii32",
            MulI32 => "muli32",
            MuliI32 => "mulii32",
            DivI32 => "divi32",
            DiviI32 => "divii32",
            ModI32 => "modi32",
            AddReal => "addr",
            AddiReal => "addir",
            SubReal => "subr",
            SubiReal => "subir",
            RsubiReal => "rsubir",
            MulReal => "mulr",
            MuliReal => "mulir",
            DivReal => "divr",
            DiviReal => "divir",
            RdiviReal => "rdivir",
            Powr => "powr",
            Absr => "absr",
            Sin => "sin",
            Cos => "cos",
            Tan => "tan",
            Log => "log",
            Ln => "ln",
            Sqr => "sqr",
            Expr => "expr",
            AndI32 => "andi32",
            AndiI32 => "andii32",
            OrI32 => "ori32",
            OriI32 => "orii32",
            EorI32 => "eori32",
            EoriI32 => "eorii32",
            NotI32 => "noti32",
            EqI32 => "eqi32",
            EqiI32 => "eqii32",
            NeqI32 => "neqi32",
            NeqiI32 => "neqii32",
            GtI32 => "gti32",
            GtiI32 => "gtii32",
            LteI32 => "ltei32",
            LteiI32 => "lteii32",
            LtI32 => "lti32",
            LtiI32 => "ltii32",
            GteI32 => "gtei32",
            GteiI32 => "gteii32",
            EqReal => "eqr",
            EqiReal => "eqir",
            NeqReal => "neqr",
            NeqiReal => "neqir",
            GtReal => "gtr",
            GtiReal => "gtir",
            LteReal => "lter",
            LteiReal => "lteir",
            LtReal => "ltr",
            LtiReal => "ltir",
            GteReal => "gter",
            GteiReal => "gteir",
            LslI32 => "lsli32",
            LsliI32 => "lslii32",
            LsrI32 => "lsri32",
            LsriI32 => "lsrii32",
            AsrI32 => "asri32",
            AsriI32 => "asrii32",
            MovI32Fp => "movi32fp",
            MovFpI32 => "movfpi32",
            MovFprdI32 => "movfprdi32",
            Signx8To32 => "signx8to32",
            Jmp => "jmp",
            Jmpc => "jmpc",
            JmpcNf => "jmpcnf",
            Ret => "ret",
            RetI32 => "reti32",
            RetReal => "retr",
            LoadoI8 => "loadoi8",
            LoadoI32 => "loadoi32",
            LoadoReal => "loador",
            StoreoI8 => "storeoi8",
            StoreoI32 => "storeoi32",
            StoreoReal => "storeor",
            Alloc => "alloc",
            Realloc => "realloc",
            Ref => "ref",
            Deref => "deref",
            Getref => "getref",
            HeapFree => "heapfree",
            PushI32 => "pushi32",
            PopI32 => "popi32",
            Mov => "mov",
            Movfp => "movfp",
            MoviI32 => "movii32",
            MoviReal => "movir",
            CmovI32 => "cmovi32",
            Lca => "lca",
            PrintNl => "printnl",
            PrintStr => "printstr",
            PrintFp => "printfp",
            I32Todec => "i32todec",
            Teste => "teste",
            Sete => "sete",
            Cleare => "cleare",
            End => "end",
            Nop => "nop",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

/// A three-address instruction. The destination, when there is one, is
/// `ops[0]`; promotion of a nop is a plain overwrite of this record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Instr {
    pub opcode: Opcode,
    pub ops: [Operand; 3],
}

impl Instr {
    pub fn new(opcode: Opcode, op0: Operand, op1: Operand, op2: Operand) -> Self {
        Self {
            opcode,
            ops: [op0, op1, op2],
        }
    }

    pub fn nop() -> Self {
        Self::new(Opcode::Nop, Operand::None, Operand::None, Operand::None)
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode)?;
        for op in &self.ops {
            if *op != Operand::None {
                write!(f, " {}", op)?;
            }
        }
        Ok(())
    }
}

/// How a call delivers its result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallKind {
    /// No result (procedure)
    Proc,
    /// Integer-bank result
    I32,
    /// Floating-bank result
    Real,
}

/// One argument of a call: the register it was materialised into and the
/// offset of the placeholder instruction the resolver may promote to a
/// coercion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrArg {
    pub class: RegisterClass,
    pub reg: u32,
    pub nop: usize,
}

/// Sentinel callee id carried by a call until the resolver patches it
pub const CALLEE_UNRESOLVED: usize = usize::MAX;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallInfo {
    pub args: Vec<IrArg>,
    /// Dense section index of the callee; `CALLEE_UNRESOLVED` until the
    /// resolution pass runs
    pub callee: usize,
    /// Result register, absent for procedure calls
    pub result: Option<u32>,
}

/// An entry in a section's op stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    Instr(Instr),
    Label(u32),
    Call { kind: CallKind, info: CallInfo },
    CallPtr { kind: CallKind, info: CallInfo, ptr: u32 },
    Sys { call_id: u32, in_regs: Vec<u32>, out_regs: Vec<u32>, flags_reg: Option<u32> },
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Instr(instr) => write!(f, "  {}", instr),
            Op::Label(l) => write!(f, "label_{}:", l),
            Op::Call { kind, info } => {
                match kind {
                    CallKind::Proc => write!(f, "  call")?,
                    CallKind::I32 => write!(f, "  calli32")?,
                    CallKind::Real => write!(f, "  callr")?,
                }
                if info.callee != CALLEE_UNRESOLVED {
                    write!(f, " @{}", info.callee)?;
                } else {
                    write!(f, " @?")?;
                }
                for arg in &info.args {
                    match arg.class {
                        RegisterClass::Integer => write!(f, " r{}", arg.reg)?,
                        RegisterClass::Real => write!(f, " f{}", arg.reg)?,
                    }
                }
                if let Some(reg) = info.result {
                    match kind {
                        CallKind::Real => write!(f, " -> f{}", reg)?,
                        _ => write!(f, " -> r{}", reg)?,
                    }
                }
                Ok(())
            }
            Op::CallPtr { kind, info, ptr } => {
                match kind {
                    CallKind::Proc => write!(f, "  callptr")?,
                    CallKind::I32 => write!(f, "  callptri32")?,
                    CallKind::Real => write!(f, "  callptrr")?,
                }
                write!(f, " [r{}]", ptr)?;
                for arg in &info.args {
                    match arg.class {
                        RegisterClass::Integer => write!(f, " r{}", arg.reg)?,
                        RegisterClass::Real => write!(f, " f{}", arg.reg)?,
                    }
                }
                if let Some(reg) = info.result {
                    match kind {
                        CallKind::Real => write!(f, " -> f{}", reg)?,
                        _ => write!(f, " -> r{}", reg)?,
                    }
                }
                Ok(())
            }
            Op::Sys { call_id, in_regs, out_regs, flags_reg } => {
                write!(f, "  sys &{:X}", call_id)?;
                for reg in in_regs {
                    write!(f, " r{}", reg)?;
                }
                write!(f, " ->")?;
                for reg in out_regs {
                    write!(f, " r{}", reg)?;
                }
                if let Some(reg) = flags_reg {
                    write!(f, " flags r{}", reg)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_result_classes() {
        assert_eq!(Opcode::AddI32.result_class(), Some(RegisterClass::Integer));
        assert_eq!(Opcode::AddReal.result_class(), Some(RegisterClass::Real));
        assert_eq!(Opcode::MovI32Fp.result_class(), Some(RegisterClass::Real));
        assert_eq!(Opcode::MovFpI32.result_class(), Some(RegisterClass::Integer));
        assert_eq!(Opcode::Jmp.result_class(), None);
        assert_eq!(Opcode::StoreoI32.result_class(), None);
    }

    #[test]
    fn test_instr_display() {
        let instr = Instr::new(
            Opcode::AddiI32,
            Operand::Reg(4),
            Operand::Reg(2),
            Operand::I32(1),
        );
        assert_eq!(instr.to_string(), "addii32 r4 r2 #1");
    }

    #[test]
    fn test_call_display() {
        let op = Op::Call {
            kind: CallKind::I32,
            info: CallInfo {
                args: vec![IrArg {
                    class: RegisterClass::Integer,
                    reg: 3,
                    nop: 0,
                }],
                callee: 2,
                result: Some(7),
            },
        };
        assert_eq!(op.to_string(), "  calli32 @2 r3 -> r7");
    }
}
