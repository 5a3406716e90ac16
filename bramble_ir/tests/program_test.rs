//! Program-level tests: serialization and builder invariants

use bramble_common::Position;
use bramble_ir::{Opcode, Operand, Program, Section, TypeSignature};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

#[test]
fn test_program_serialises_and_reloads() {
    let mut prog = Program::new();
    let main = prog
        .section_new("main", Some(TypeSignature::proc(Vec::new())), Position::start())
        .unwrap();
    let section = prog.section_mut(main);
    let reg = section
        .add_instr(Opcode::MoviI32, Operand::I32(42), Operand::None)
        .unwrap();
    section.add_instr_no_reg(Opcode::RetI32, Operand::Reg(reg));
    prog.add_string(b"hello".to_vec());

    let json = serde_json::to_string(&prog).unwrap();
    let reloaded: Program = serde_json::from_str(&json).unwrap();

    assert_eq!(reloaded.num_sections(), 1);
    assert_eq!(reloaded.find("main"), Some(0));
    assert_eq!(reloaded.string_pool, prog.string_pool);
    assert_eq!(
        reloaded.section(0).ops().len(),
        prog.section(0).ops().len()
    );
    assert_eq!(prog.to_string(), reloaded.to_string());
}

proptest! {
    /// Labels and registers are handed out monotonically no matter how the
    /// builder is driven
    #[test]
    fn builder_ids_are_monotonic(steps in proptest::collection::vec(0u8..4, 1..64)) {
        let mut section = Section::new("t", Some(TypeSignature::proc(Vec::new())), 0, 4);
        let mut last_reg = section.reg_count();
        let mut last_freg = section.freg_count();
        let mut last_label = 0u32;

        for step in steps {
            match step {
                0 => {
                    let reg = section
                        .add_instr(Opcode::MoviI32, Operand::I32(1), Operand::None)
                        .unwrap();
                    prop_assert!(reg >= last_reg);
                    last_reg = reg + 1;
                }
                1 => {
                    let reg = section
                        .add_instr(Opcode::MoviReal, Operand::Real(1.0), Operand::None)
                        .unwrap();
                    prop_assert!(reg >= last_freg);
                    last_freg = reg + 1;
                }
                2 => {
                    let label = section.new_label();
                    prop_assert!(label >= last_label);
                    last_label = label + 1;
                }
                _ => {
                    let nop = section.add_nop();
                    let reg = section
                        .promote_nop(nop, Opcode::MovI32Fp, Operand::Reg(2))
                        .unwrap();
                    prop_assert!(reg >= last_freg);
                    last_freg = reg + 1;
                }
            }
        }

        prop_assert!(section.validate().is_ok());
    }
}
