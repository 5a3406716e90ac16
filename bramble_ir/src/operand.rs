//! Operands and virtual registers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Register 0 of the integer bank holds the global frame pointer
pub const REG_GLOBAL: u32 = 0;

/// Register 1 of the integer bank holds the local frame pointer
pub const REG_LOCAL: u32 = 1;

/// First freely-allocatable register in each bank. Integer parameters occupy
/// `TEMP_START + k` in declaration order; floating parameters the same slots
/// of the floating bank.
pub const TEMP_START: u32 = 2;

/// The two virtual register banks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegisterClass {
    Integer,
    Real,
}

impl fmt::Display for RegisterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterClass::Integer => write!(f, "int"),
            RegisterClass::Real => write!(f, "real"),
        }
    }
}

/// An instruction operand: a register of either bank, a label, or an
/// immediate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    /// Integer-bank virtual register
    Reg(u32),
    /// Floating-bank virtual register
    Freg(u32),
    /// Label id
    Label(u32),
    /// Integer immediate
    I32(i32),
    /// Real immediate
    Real(f64),
    /// Unused operand slot
    None,
}

impl Operand {
    pub fn reg(&self) -> Option<u32> {
        match self {
            Operand::Reg(r) | Operand::Freg(r) => Some(*r),
            _ => None,
        }
    }

    pub fn label(&self) -> Option<u32> {
        match self {
            Operand::Label(l) => Some(*l),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(r) => write!(f, "r{}", r),
            Operand::Freg(r) => write!(f, "f{}", r),
            Operand::Label(l) => write!(f, "label_{}", l),
            Operand::I32(i) => write!(f, "#{}", i),
            Operand::Real(r) => write!(f, "#{}", r),
            Operand::None => write!(f, "_"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operand_display() {
        assert_eq!(Operand::Reg(3).to_string(), "r3");
        assert_eq!(Operand::Freg(1).to_string(), "f1");
        assert_eq!(Operand::Label(7).to_string(), "label_7");
        assert_eq!(Operand::I32(-4).to_string(), "#-4");
    }

    #[test]
    fn test_operand_accessors() {
        assert_eq!(Operand::Reg(5).reg(), Some(5));
        assert_eq!(Operand::Label(5).reg(), None);
        assert_eq!(Operand::Label(5).label(), Some(5));
    }
}
