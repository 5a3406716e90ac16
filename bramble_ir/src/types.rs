//! IR-level type signatures
//!
//! Sections carry a signature describing their return and parameter types.
//! These mirror the source-language types by shape; the parser lowers its
//! richer descriptors into them when it creates a section.

use crate::operand::RegisterClass;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IrType {
    Void,
    I32,
    Real,
    Byte,
    Str,
    /// Function pointer
    Fn,
    Array(Box<IrType>),
    Vector(Box<IrType>),
    /// Record, identified by its declared name
    Rec(String),
}

impl IrType {
    /// The register bank a value of this type travels in. Reference types
    /// are passed as header pointers in the integer bank.
    pub fn register_class(&self) -> Option<RegisterClass> {
        match self {
            IrType::Void => None,
            IrType::Real => Some(RegisterClass::Real),
            _ => Some(RegisterClass::Integer),
        }
    }

    /// True for types whose values live behind a reference header
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            IrType::Str | IrType::Array(_) | IrType::Vector(_) | IrType::Rec(_)
        )
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::Void => write!(f, "void"),
            IrType::I32 => write!(f, "i32"),
            IrType::Real => write!(f, "real"),
            IrType::Byte => write!(f, "byte"),
            IrType::Str => write!(f, "string"),
            IrType::Fn => write!(f, "fn"),
            IrType::Array(elem) => write!(f, "array of {}", elem),
            IrType::Vector(elem) => write!(f, "vector of {}", elem),
            IrType::Rec(name) => write!(f, "record {}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: IrType,
}

/// Return and parameter types of a section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeSignature {
    pub ret: IrType,
    pub params: Vec<Param>,
}

impl TypeSignature {
    pub fn new(ret: IrType, params: Vec<Param>) -> Self {
        Self { ret, params }
    }

    pub fn proc(params: Vec<Param>) -> Self {
        Self::new(IrType::Void, params)
    }
}

impl fmt::Display for TypeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", param.name, param.ty)?;
        }
        write!(f, ") -> {}", self.ret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_classes() {
        assert_eq!(IrType::I32.register_class(), Some(RegisterClass::Integer));
        assert_eq!(IrType::Real.register_class(), Some(RegisterClass::Real));
        assert_eq!(IrType::Str.register_class(), Some(RegisterClass::Integer));
        assert_eq!(IrType::Void.register_class(), None);
    }

    #[test]
    fn test_signature_display() {
        let sig = TypeSignature::new(
            IrType::Real,
            vec![
                Param {
                    name: "x".to_string(),
                    ty: IrType::Real,
                },
                Param {
                    name: "n%".to_string(),
                    ty: IrType::I32,
                },
            ],
        );
        assert_eq!(sig.to_string(), "(x: real, n%: i32) -> real");
    }
}
