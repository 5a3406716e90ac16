//! Source-language type descriptors
//!
//! A [`Type`] is a tagged descriptor: scalar kinds are plain variants,
//! collections carry their element type and extents, records carry their
//! field table. Equality is structural. Const-tagged kinds are only produced
//! by literal evaluation and fold at compile time.

use bramble_common::config::MAX_DIMS;
use bramble_common::{Error, ErrorKind, Position, Result};
use bramble_ir::IrType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Size in bytes of a reference header without dimension extents:
/// size, data, orig_size, heap, destructor_id
pub const REFERENCE_HEADER_SIZE: u32 = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Type {
    ConstInt,
    Int,
    ConstReal,
    Real,
    Byte,
    ConstStr,
    Str,
    Void,
    /// Function pointer with the signature of its target
    Fn(Box<FnSignature>),
    Array(ArrayType),
    Vector(Box<Type>),
    Rec(RecType),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayType {
    pub elem: Box<Type>,
    /// Declared extent per dimension; `None` is DYNAMIC
    pub dims: Vec<Option<i32>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FnSignature {
    pub ret: Box<Type>,
    pub params: Vec<Type>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub ty: Type,
    pub offset: u32,
}

/// A record descriptor owns its field types. Offsets are assigned at
/// declaration: monotonically increasing, each respecting its field's
/// alignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecType {
    pub name: String,
    pub fields: Vec<Field>,
}

impl RecType {
    /// Lay out a record from its declared fields
    pub fn build(name: impl Into<String>, fields: Vec<(String, Type)>, pos: Position) -> Result<Self> {
        let mut laid = Vec::with_capacity(fields.len());
        let mut offset = 0u32;
        for (field_name, ty) in fields {
            if laid.iter().any(|f: &Field| f.name == field_name) {
                return Err(Error::new(ErrorKind::AlreadyDefined(field_name), pos));
            }
            let align = ty.align();
            let misalign = offset % align;
            if misalign != 0 {
                offset += align - misalign;
            }
            let size = ty.size();
            laid.push(Field {
                name: field_name,
                ty,
                offset,
            });
            offset += size;
        }
        Ok(Self {
            name: name.into(),
            fields: laid,
        })
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn align(&self) -> u32 {
        self.fields.iter().map(|f| f.ty.align()).max().unwrap_or(1)
    }

    pub fn size(&self) -> u32 {
        let end = self
            .fields
            .last()
            .map(|f| f.offset + f.ty.size())
            .unwrap_or(0);
        let align = self.align();
        end.div_ceil(align) * align
    }

    /// True if destroying an instance has to do per-field work
    pub fn has_references(&self) -> bool {
        self.fields.iter().any(|f| f.ty.needs_cleanup())
    }
}

impl Type {
    pub fn array(elem: Type, dims: Vec<Option<i32>>, pos: Position) -> Result<Type> {
        if dims.is_empty() || dims.len() > MAX_DIMS {
            return Err(Error::new(ErrorKind::TooManyDims(MAX_DIMS), pos));
        }
        Ok(Type::Array(ArrayType {
            elem: Box::new(elem),
            dims,
        }))
    }

    pub fn vector(elem: Type) -> Type {
        Type::Vector(Box::new(elem))
    }

    /// Byte size of the value's in-frame storage: the header for reference
    /// types, the scalar width otherwise
    pub fn size(&self) -> u32 {
        match self {
            Type::ConstInt | Type::Int => 4,
            Type::ConstReal | Type::Real => 8,
            Type::Byte => 1,
            Type::ConstStr | Type::Str => REFERENCE_HEADER_SIZE,
            Type::Void => 0,
            Type::Fn(_) => 4,
            Type::Array(arr) => REFERENCE_HEADER_SIZE + arr.dims.len() as u32 * 4,
            Type::Vector(_) => REFERENCE_HEADER_SIZE + 4,
            Type::Rec(rec) => rec.size(),
        }
    }

    pub fn align(&self) -> u32 {
        match self {
            Type::Byte => 1,
            Type::ConstReal | Type::Real => 8,
            Type::Rec(rec) => rec.align(),
            _ => 4,
        }
    }

    /// Byte size of a collection's backing buffer for `count` elements
    pub fn data_size(&self, count: u32) -> u32 {
        self.size() * count
    }

    pub fn is_const(&self) -> bool {
        matches!(self, Type::ConstInt | Type::ConstReal | Type::ConstStr)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Type::ConstInt | Type::Int | Type::ConstReal | Type::Real | Type::Byte
        )
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Type::ConstInt | Type::Int | Type::Byte)
    }

    /// True for types whose values live behind a reference header. Records
    /// are stored inline; only their reference-typed fields own heap data.
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            Type::ConstStr | Type::Str | Type::Array(_) | Type::Vector(_)
        )
    }

    /// True if scope exit has to run deallocation for a value of this type
    pub fn needs_cleanup(&self) -> bool {
        match self {
            Type::Rec(rec) => rec.has_references(),
            other => other.is_reference(),
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Type::Array(_) | Type::Vector(_))
    }

    /// The element type of a collection
    pub fn element(&self) -> Option<&Type> {
        match self {
            Type::Array(arr) => Some(&arr.elem),
            Type::Vector(elem) => Some(elem),
            _ => None,
        }
    }

    /// Strip the const tag from a literal's type
    pub fn runtime_type(&self) -> Type {
        match self {
            Type::ConstInt => Type::Int,
            Type::ConstReal => Type::Real,
            Type::ConstStr => Type::Str,
            other => other.clone(),
        }
    }

    /// Human-readable name used in diagnostics
    pub fn name(&self) -> String {
        match self {
            Type::ConstInt => "const integer".to_string(),
            Type::Int => "integer".to_string(),
            Type::ConstReal => "const real".to_string(),
            Type::Real => "real".to_string(),
            Type::Byte => "byte".to_string(),
            Type::ConstStr => "const string".to_string(),
            Type::Str => "string".to_string(),
            Type::Void => "void".to_string(),
            Type::Fn(sig) => format!("fn{}", sig_name(sig)),
            Type::Array(arr) => format!("array of {}", arr.elem.name()),
            Type::Vector(elem) => format!("vector of {}", elem.name()),
            Type::Rec(rec) => format!("record {}", rec.name),
        }
    }

    /// A short name safe to embed in a mangled section name,
    /// e.g. `_deref_array_string`
    pub fn mangled_name(&self) -> String {
        match self {
            Type::ConstInt | Type::Int => "int32".to_string(),
            Type::ConstReal | Type::Real => "float64".to_string(),
            Type::Byte => "byte".to_string(),
            Type::ConstStr | Type::Str => "string".to_string(),
            Type::Void => "void".to_string(),
            Type::Fn(_) => "fn".to_string(),
            Type::Array(arr) => format!("array_{}", arr.elem.mangled_name()),
            Type::Vector(elem) => format!("vector_{}", elem.mangled_name()),
            Type::Rec(rec) => rec.name.clone(),
        }
    }

    /// Lower to the IR-level signature type
    pub fn to_ir_type(&self) -> IrType {
        match self {
            Type::ConstInt | Type::Int => IrType::I32,
            Type::ConstReal | Type::Real => IrType::Real,
            Type::Byte => IrType::Byte,
            Type::ConstStr | Type::Str => IrType::Str,
            Type::Void => IrType::Void,
            Type::Fn(_) => IrType::Fn,
            Type::Array(arr) => IrType::Array(Box::new(arr.elem.to_ir_type())),
            Type::Vector(elem) => IrType::Vector(Box::new(elem.to_ir_type())),
            Type::Rec(rec) => IrType::Rec(rec.name.clone()),
        }
    }
}

fn sig_name(sig: &FnSignature) -> String {
    let params: Vec<String> = sig.params.iter().map(|p| p.name()).collect();
    format!("({}) -> {}", params.join(", "), sig.ret.name())
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test_case::test_case(Type::Int, 4, 4 ; "int")]
    #[test_case::test_case(Type::ConstInt, 4, 4 ; "const int")]
    #[test_case::test_case(Type::Real, 8, 8 ; "real")]
    #[test_case::test_case(Type::Byte, 1, 1 ; "byte")]
    #[test_case::test_case(Type::Str, REFERENCE_HEADER_SIZE, 4 ; "string header")]
    fn test_scalar_size_and_align(ty: Type, size: u32, align: u32) {
        assert_eq!(ty.size(), size);
        assert_eq!(ty.align(), align);
    }

    #[test]
    fn test_array_header_includes_dims() {
        let arr = Type::array(Type::Int, vec![Some(10), None], Position::start()).unwrap();
        assert_eq!(arr.size(), REFERENCE_HEADER_SIZE + 8);
    }

    #[test]
    fn test_too_many_dims() {
        let dims = vec![Some(1); MAX_DIMS + 1];
        let err = Type::array(Type::Int, dims, Position::start()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TooManyDims(MAX_DIMS));
    }

    #[test]
    fn test_record_layout_respects_alignment() {
        let rec = RecType::build(
            "T",
            vec![
                ("flag&".to_string(), Type::Byte),
                ("x".to_string(), Type::Real),
                ("n%".to_string(), Type::Int),
            ],
            Position::start(),
        )
        .unwrap();
        assert_eq!(rec.fields[0].offset, 0);
        assert_eq!(rec.fields[1].offset, 8);
        assert_eq!(rec.fields[2].offset, 16);
        // padded out to the record's own alignment
        assert_eq!(rec.size(), 24);
    }

    #[test]
    fn test_record_offsets_monotonic() {
        let rec = RecType::build(
            "T",
            vec![
                ("a%".to_string(), Type::Int),
                ("b$".to_string(), Type::Str),
                ("c&".to_string(), Type::Byte),
            ],
            Position::start(),
        )
        .unwrap();
        let mut last = 0;
        for field in &rec.fields {
            assert!(field.offset >= last);
            assert_eq!(field.offset % field.ty.align(), 0);
            last = field.offset;
        }
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let err = RecType::build(
            "T",
            vec![
                ("a%".to_string(), Type::Int),
                ("a%".to_string(), Type::Int),
            ],
            Position::start(),
        )
        .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::AlreadyDefined(_)));
    }

    #[test]
    fn test_structural_equality() {
        let a = Type::array(Type::Int, vec![Some(4)], Position::start()).unwrap();
        let b = Type::array(Type::Int, vec![Some(4)], Position::start()).unwrap();
        let c = Type::array(Type::Int, vec![None], Position::start()).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_const_runtime_types() {
        assert!(Type::ConstInt.is_const());
        assert_eq!(Type::ConstInt.runtime_type(), Type::Int);
        assert_eq!(Type::ConstStr.runtime_type(), Type::Str);
        assert!(!Type::Str.is_const());
    }
}
