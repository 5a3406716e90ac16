//! Property tests for the expression engine

use bramble_ir::{Op, Opcode, Operand};
use bramble_parser::parse_program;
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Tree {
    Leaf(i32),
    Add(Box<Tree>, Box<Tree>),
    Sub(Box<Tree>, Box<Tree>),
    Mul(Box<Tree>, Box<Tree>),
}

fn tree() -> impl Strategy<Value = Tree> {
    let leaf = (-1000i32..1000).prop_map(Tree::Leaf);
    leaf.prop_recursive(4, 32, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| Tree::Add(Box::new(a), Box::new(b))),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| Tree::Sub(Box::new(a), Box::new(b))),
            (inner.clone(), inner).prop_map(|(a, b)| Tree::Mul(Box::new(a), Box::new(b))),
        ]
    })
}

fn render(tree: &Tree) -> String {
    match tree {
        Tree::Leaf(v) if *v < 0 => format!("(0 - {})", -(*v as i64)),
        Tree::Leaf(v) => v.to_string(),
        Tree::Add(a, b) => format!("({} + {})", render(a), render(b)),
        Tree::Sub(a, b) => format!("({} - {})", render(a), render(b)),
        Tree::Mul(a, b) => format!("({} * {})", render(a), render(b)),
    }
}

fn eval(tree: &Tree) -> i32 {
    match tree {
        Tree::Leaf(v) => *v,
        Tree::Add(a, b) => eval(a).wrapping_add(eval(b)),
        Tree::Sub(a, b) => eval(a).wrapping_sub(eval(b)),
        Tree::Mul(a, b) => eval(a).wrapping_mul(eval(b)),
    }
}

proptest! {
    /// A fully-constant expression folds at parse time: the assignment
    /// materialises exactly the host-evaluated value and no arithmetic
    /// opcodes survive.
    #[test]
    fn const_folding_matches_host_semantics(t in tree()) {
        let source = format!("x% = {}", render(&t));
        let prog = parse_program(&source, "prop").unwrap();
        let expected = eval(&t);

        let mut materialised = false;
        for op in prog.section(0).ops() {
            if let Op::Instr(instr) = op {
                prop_assert!(
                    !matches!(
                        instr.opcode,
                        Opcode::AddI32
                            | Opcode::AddiI32
                            | Opcode::SubI32
                            | Opcode::SubiI32
                            | Opcode::RsubiI32
                            | Opcode::MulI32
                            | Opcode::MuliI32
                    ),
                    "arithmetic survived folding: {:?}",
                    instr.opcode
                );
                if instr.opcode == Opcode::MoviI32 && instr.ops[1] == Operand::I32(expected) {
                    materialised = true;
                }
            }
        }
        prop_assert!(materialised, "expected value {} not materialised", expected);
    }

    /// Register ids in every operand stay within the section's allocators
    #[test]
    fn registers_stay_in_bounds(a in 0i32..100, b in 1i32..100) {
        let source = format!(
            "x% = {a}\ny% = x% * {b}\nz = y% / {b}\nDIM v%(x%)\nv%(0) = y%"
        );
        let prog = parse_program(&source, "prop").unwrap();
        for idx in 0..prog.num_sections() {
            let section = prog.section(idx);
            for op in section.ops() {
                if let Op::Instr(instr) = op {
                    for operand in &instr.ops {
                        match operand {
                            Operand::Reg(r) => prop_assert!(*r < section.reg_count()),
                            Operand::Freg(r) => prop_assert!(*r < section.freg_count()),
                            _ => {}
                        }
                    }
                }
            }
        }
    }
}
