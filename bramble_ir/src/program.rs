//! The program-wide section table and constant pool

use crate::section::Section;
use crate::types::TypeSignature;
use bramble_common::{Error, ErrorKind, Position, Result};
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An IR program: a dense, ordered table of sections keyed by name, the
/// string constant pool, and the global frame layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    sections: Vec<Section>,
    by_name: IndexMap<String, usize>,
    /// Literal constant area: read-only string data, copied to the heap on
    /// first dynamic use
    pub string_pool: Vec<Vec<u8>>,
    /// Bytes reserved in the global frame
    pub globals_size: u32,
    /// Global-frame offset of the `eflag` pseudo-variable
    pub eflag_offset: i32,
    /// Global-frame offset of the `err` pseudo-variable
    pub error_offset: i32,
}

impl Program {
    pub fn new() -> Self {
        // eflag and err occupy the first two global slots
        Self {
            sections: Vec::new(),
            by_name: IndexMap::new(),
            string_pool: Vec::new(),
            globals_size: 8,
            eflag_offset: 0,
            error_offset: 4,
        }
    }

    /// Create a section, failing with `AlreadyDefined` if the name is taken.
    /// Returns the dense index used at call sites.
    pub fn section_new(
        &mut self,
        name: &str,
        typ: Option<TypeSignature>,
        pos: Position,
    ) -> Result<usize> {
        if self.by_name.contains_key(name) {
            return Err(Error::new(ErrorKind::AlreadyDefined(name.to_string()), pos));
        }
        debug!("new section '{}'", name);
        let index = self.sections.len();
        self.sections
            .push(Section::new(name, typ, self.eflag_offset, self.error_offset));
        self.by_name.insert(name.to_string(), index);
        Ok(index)
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn section(&self, index: usize) -> &Section {
        &self.sections[index]
    }

    pub fn section_mut(&mut self, index: usize) -> &mut Section {
        &mut self.sections[index]
    }

    pub fn num_sections(&self) -> usize {
        self.sections.len()
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Intern a string constant, returning its pool id
    pub fn add_string(&mut self, data: Vec<u8>) -> usize {
        if let Some(id) = self.string_pool.iter().position(|s| *s == data) {
            return id;
        }
        self.string_pool.push(data);
        self.string_pool.len() - 1
    }

    /// Reserve `size` bytes in the global frame, honouring `align`, and
    /// return the offset
    pub fn alloc_global(&mut self, size: u32, align: u32) -> i32 {
        let misalign = self.globals_size % align;
        if misalign != 0 {
            self.globals_size += align - misalign;
        }
        let offset = self.globals_size;
        self.globals_size += size;
        offset as i32
    }

    /// Drop every placeholder that was never promoted, in every section.
    /// Must run after call resolution.
    pub fn prune_nops(&mut self) {
        for section in &mut self.sections {
            section.prune_nops();
        }
    }

    /// Validate every section's structural invariants
    pub fn validate(&self) -> Result<()> {
        for section in &self.sections {
            section.validate()?;
        }
        Ok(())
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, section) in self.sections.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", section)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IrType;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_section_table() {
        let mut prog = Program::new();
        let main = prog
            .section_new("main", Some(TypeSignature::proc(Vec::new())), Position::start())
            .unwrap();
        let f = prog
            .section_new(
                "FNf",
                Some(TypeSignature::new(IrType::Real, Vec::new())),
                Position::start(),
            )
            .unwrap();
        assert_eq!(main, 0);
        assert_eq!(f, 1);
        assert_eq!(prog.find("FNf"), Some(1));
        assert_eq!(prog.find("FNg"), None);
    }

    #[test]
    fn test_duplicate_section_rejected() {
        let mut prog = Program::new();
        prog.section_new("PROCa", None, Position::start()).unwrap();
        let err = prog
            .section_new("PROCa", None, Position::new(3, 1))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::AlreadyDefined("PROCa".to_string()));
        assert_eq!(err.pos, Position::new(3, 1));
    }

    #[test]
    fn test_string_pool_dedup() {
        let mut prog = Program::new();
        let a = prog.add_string(b"hello".to_vec());
        let b = prog.add_string(b"world".to_vec());
        let c = prog.add_string(b"hello".to_vec());
        assert_eq!(a, c);
        assert_ne!(a, b);
    }

    #[test]
    fn test_global_alloc_alignment() {
        let mut prog = Program::new();
        let a = prog.alloc_global(1, 1);
        let b = prog.alloc_global(4, 4);
        assert_eq!(a, 8);
        assert_eq!(b, 12);
    }
}
