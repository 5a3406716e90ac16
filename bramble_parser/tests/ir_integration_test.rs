//! End-to-end tests: compile source text and check the shape of the
//! emitted IR

use bramble_common::ErrorKind;
use bramble_ir::{CallKind, Op, Opcode, Operand, Program, RegisterClass};
use bramble_parser::parse_program;
use pretty_assertions::assert_eq;

fn compile(source: &str) -> Program {
    let _ = env_logger::builder().is_test(true).try_init();
    match parse_program(source, "test") {
        Ok(prog) => prog,
        Err(err) => panic!("compile failed: {}", err),
    }
}

fn compile_err(source: &str) -> ErrorKind {
    parse_program(source, "test")
        .expect_err("expected a compile error")
        .kind
}

fn opcodes(prog: &Program, section: usize) -> Vec<Opcode> {
    prog.section(section)
        .ops()
        .iter()
        .filter_map(|op| match op {
            Op::Instr(instr) => Some(instr.opcode),
            _ => None,
        })
        .collect()
}

fn count(prog: &Program, section: usize, opcode: Opcode) -> usize {
    opcodes(prog, section)
        .into_iter()
        .filter(|op| *op == opcode)
        .count()
}

#[test]
fn test_const_expression_folds_completely() {
    let prog = compile("PRINT 2+3*4");
    let ops = opcodes(&prog, 0);

    // no arithmetic survives; the folded 14 is materialised once
    for op in &ops {
        assert!(
            !matches!(
                op,
                Opcode::AddI32 | Opcode::AddiI32 | Opcode::MulI32 | Opcode::MuliI32
            ),
            "unexpected arithmetic opcode {:?}",
            op
        );
    }
    let materialised = prog.section(0).ops().iter().any(|op| match op {
        Op::Instr(instr) => {
            instr.opcode == Opcode::MoviI32 && instr.ops[1] == Operand::I32(14)
        }
        _ => false,
    });
    assert!(materialised, "folded constant 14 not found");
    assert!(count(&prog, 0, Opcode::PrintNl) >= 1);
}

#[test]
fn test_const_comparison_folds_to_minus_one() {
    let prog = compile("x% = 2 < 3");
    let stored_true = prog.section(0).ops().iter().any(|op| match op {
        Op::Instr(instr) => {
            instr.opcode == Opcode::MoviI32 && instr.ops[1] == Operand::I32(-1)
        }
        _ => false,
    });
    assert!(stored_true);
}

#[test]
fn test_dynamic_dim_emits_alloc_and_bounds_check() {
    let prog = compile("n% = 9\nDIM a%(n%)\na%(n%-1) = 7");
    let ops = opcodes(&prog, 0);

    assert!(ops.contains(&Opcode::Alloc), "no allocation emitted");
    // dynamic extent: index checked against the header at runtime
    assert!(ops.contains(&Opcode::LtiI32), "no lower bounds check");
    assert!(ops.contains(&Opcode::GtI32), "no upper bounds check");
    assert!(ops.contains(&Opcode::StoreoI32));

    // the shared trap materialises the BAD_DIM error code
    let bad_dim = prog.section(0).ops().iter().any(|op| match op {
        Op::Instr(instr) => {
            instr.opcode == Opcode::MoviI32 && instr.ops[1] == Operand::I32(10)
        }
        _ => false,
    });
    assert!(bad_dim, "BAD_DIM error code not materialised");
}

#[test]
fn test_constant_indices_skip_bounds_checks() {
    let prog = compile("DIM a%(4)\na%(2) = 1");
    let ops = opcodes(&prog, 0);
    // both extent and index are compile-time constants
    assert!(!ops.contains(&Opcode::GtI32));
    assert!(!ops.contains(&Opcode::GtiI32));
}

#[test]
fn test_out_of_range_constant_index_rejected() {
    assert_eq!(compile_err("DIM a%(4)\na%(5) = 1"), ErrorKind::BadIndex);
}

#[test]
fn test_string_append_uses_copy_on_write() {
    let prog = compile("a$ = \"x\"\na$ += \"y\"");
    let ops = opcodes(&prog, 0);

    assert!(ops.contains(&Opcode::Lca), "literal not loaded from the pool");
    assert!(ops.contains(&Opcode::Alloc));
    assert!(ops.contains(&Opcode::Getref), "no refcount inspection");
    assert!(ops.contains(&Opcode::Realloc), "no in-place growth");
    assert!(ops.contains(&Opcode::PushI32), "reference not registered");
    // scope exit drains the cleanup stack
    assert!(ops.contains(&Opcode::PopI32));
    assert!(ops.contains(&Opcode::Deref));
}

#[test]
fn test_fn_call_promotes_integer_argument() {
    let prog = compile("DEF FNf(x) = x*2\nPRINT FNf(3)");

    let fnf = prog.find("FNf").expect("FNf not defined");
    let call = prog.section(0).ops().iter().find_map(|op| match op {
        Op::Call { kind, info } => Some((*kind, info.clone())),
        _ => None,
    });
    let (kind, info) = call.expect("no call emitted");

    assert_eq!(kind, CallKind::Real);
    assert_eq!(info.callee, fnf);
    assert_eq!(info.args.len(), 1);
    // the const-int argument was promoted into the floating bank
    assert_eq!(info.args[0].class, RegisterClass::Real);
    assert!(opcodes(&prog, 0).contains(&Opcode::MovI32Fp));
}

#[test]
fn test_fn_body_multiplies_parameter() {
    let prog = compile("DEF FNf(x) = x*2\nPRINT FNf(3)");
    let fnf = prog.find("FNf").unwrap();
    let ops = opcodes(&prog, fnf);
    assert!(ops.contains(&Opcode::MuliReal));
    assert!(ops.contains(&Opcode::RetReal));
}

#[test]
fn test_onerror_handler_and_runtime_division() {
    let prog = compile("ONERROR\nPRINT ERR\nENDERROR\ny% = 0\nx% = 1 DIV y%");
    let section = prog.section(0);
    let ops = opcodes(&prog, 0);

    assert!(ops.contains(&Opcode::DivI32));
    // the division is followed by an error-flag test
    let div_at = ops.iter().position(|op| *op == Opcode::DivI32).unwrap();
    assert!(
        ops[div_at..].contains(&Opcode::Teste),
        "no error check after DIV"
    );
    // the handler was collected and appended after the end label
    assert!(section.handler_base.is_some());
}

#[test]
fn test_error_statement_routes_to_handler() {
    let prog = compile("ONERROR\nPRINT ERR\nENDERROR\nERROR 42");
    let ops = opcodes(&prog, 0);
    // the error code is stored to the err pseudo-variable
    let stores_err = prog.section(0).ops().iter().any(|op| match op {
        Op::Instr(instr) => {
            instr.opcode == Opcode::StoreoI32 && instr.ops[2] == Operand::I32(4)
        }
        _ => false,
    });
    assert!(stores_err);
    assert!(ops.contains(&Opcode::Jmp));
}

#[test]
fn test_record_copy_goes_through_synthesised_helper() {
    let prog = compile(
        "TYPE T\nname$\ncount%\nENDTYPE\nDIM r AS TYPE T\nr.name$ = \"ada\"\nr2 = r",
    );

    let copy = prog.find("_T_copy").expect("_T_copy not synthesised");
    assert!(prog.find("_T_zero").is_some());
    assert!(prog.find("_T_deref").is_some());

    let copy_called = prog.section(0).ops().iter().any(|op| match op {
        Op::Call { info, .. } => info.callee == copy,
        _ => false,
    });
    assert!(copy_called, "record assignment does not call _T_copy");

    // the copy helper rebinds the string field: deref old, ref new
    let ops = opcodes(&prog, copy);
    assert!(ops.contains(&Opcode::Ref));
    assert!(ops.contains(&Opcode::Deref));
}

#[test]
fn test_builtins_are_memoised() {
    let prog = compile("a$ = \"x\"\nb$ = \"y\"\nc$ = \"z\"");
    let memcpys = (0..prog.num_sections())
        .filter(|idx| prog.section(*idx).name == "_memcpy")
        .count();
    assert_eq!(memcpys, 1);
}

#[test]
fn test_cleanup_stack_counter_initialised_once() {
    let prog = compile("a$ = \"x\"\nb$ = \"y\"");
    let section = prog.section(0);
    assert!(section.cleanup_stack_reg.is_some());
    // the entry placeholder became the counter initialisation
    let init_count = section
        .ops()
        .iter()
        .filter(|op| match op {
            Op::Instr(instr) => {
                instr.opcode == Opcode::MoviI32
                    && instr.ops[0] == Operand::Reg(section.cleanup_stack_reg.unwrap())
                    && instr.ops[1] == Operand::I32(0)
            }
            _ => false,
        })
        .count();
    assert_eq!(init_count, 1);
}

#[test]
fn test_no_cleanup_counter_without_references() {
    let prog = compile("x% = 1\ny% = x% + 2");
    let section = prog.section(0);
    assert!(section.cleanup_stack_reg.is_none());
    // the reserved placeholder was elided
    assert_eq!(count(&prog, 0, Opcode::Nop), 0);
}

#[test]
fn test_main_ends_with_nofree_exit() {
    let prog = compile("x% = 1");
    let section = prog.section(0);
    assert!(section.nofree_label.is_some());
    assert!(opcodes(&prog, 0).contains(&Opcode::End));
}

#[test]
fn test_procedures_resolve_and_return() {
    let prog = compile("PROCgreet\nDEF PROCgreet\nPRINT \"hi\"\nENDPROC");
    let target = prog.find("PROCgreet").unwrap();
    let resolved = prog.section(0).ops().iter().any(|op| match op {
        Op::Call { kind, info } => *kind == CallKind::Proc && info.callee == target,
        _ => false,
    });
    assert!(resolved);
    assert!(opcodes(&prog, target).contains(&Opcode::Ret));
}

#[test]
fn test_unknown_procedure_reported() {
    assert_eq!(
        compile_err("PROCmissing"),
        ErrorKind::UnknownProcedure("PROCmissing".to_string())
    );
}

#[test]
fn test_unknown_function_reported() {
    assert_eq!(
        compile_err("PRINT FNmissing(1)"),
        ErrorKind::UnknownFunction("FNmissing".to_string())
    );
}

#[test]
fn test_arity_mismatch_reported() {
    let err = compile_err("DEF FNf(x) = x\nPRINT FNf(1, 2)");
    assert!(matches!(err, ErrorKind::BadArgCount { expected: 1, actual: 2, .. }));
}

#[test]
fn test_string_argument_cannot_become_real() {
    let err = compile_err("DEF FNf(x) = x\na$ = \"s\"\nPRINT FNf(a$)");
    assert!(matches!(err, ErrorKind::BadArgType { .. }));
}

#[test]
fn test_function_invoked_as_procedure_rejected() {
    // FN targets must receive their result
    let err = compile_err("PROCf\nDEF FNf(x) = x");
    assert!(matches!(err, ErrorKind::UnknownProcedure(_)));

    let err = compile_err("PROCf\nDEF FNf = 1");
    assert!(matches!(err, ErrorKind::UnknownProcedure(_)));
}

#[test]
fn test_division_by_literal_zero_rejected() {
    assert_eq!(compile_err("x% = 1 DIV 0"), ErrorKind::DivideByZero);
    assert_eq!(compile_err("x% = 1 MOD 0"), ErrorKind::DivideByZero);
    assert_eq!(compile_err("x = 1 / 0"), ErrorKind::DivideByZero);
}

#[test]
fn test_zero_step_rejected() {
    assert_eq!(
        compile_err("FOR i% = 1 TO 10 STEP 0\nNEXT"),
        ErrorKind::ZeroStep
    );
}

#[test]
fn test_unterminated_compound_rejected() {
    assert_eq!(
        compile_err("IF 1 THEN\nPRINT 1"),
        ErrorKind::CompoundNotTerminated
    );
    assert_eq!(
        compile_err("WHILE 1\nPRINT 1"),
        ErrorKind::CompoundNotTerminated
    );
}

#[test]
fn test_nested_procedure_rejected() {
    let err = compile_err("DEF PROCa\nDEF PROCb\nENDPROC\nENDPROC");
    assert_eq!(err, ErrorKind::NestedProcedure);
}

#[test]
fn test_dim_inside_procedure_rejected() {
    let err = compile_err("DEF PROCa\nDIM a%(4)\nENDPROC");
    assert_eq!(err, ErrorKind::DimInProc);
}

#[test]
fn test_duplicate_definition_rejected() {
    let err = compile_err("DEF PROCa\nENDPROC\nDEF PROCa\nENDPROC");
    assert!(matches!(err, ErrorKind::AlreadyDefined(_)));
}

#[test]
fn test_while_loop_shape() {
    let prog = compile("i% = 0\nWHILE i% < 3\ni% += 1\nENDWHILE");
    let ops = opcodes(&prog, 0);
    assert!(ops.contains(&Opcode::LtiI32));
    assert!(ops.contains(&Opcode::Jmpc));
    assert!(ops.contains(&Opcode::Jmp));
    prog.validate().unwrap();
}

#[test]
fn test_for_loop_constant_step_descending() {
    let prog = compile("FOR i% = 10 TO 1 STEP -1\nPRINT i%\nNEXT");
    let ops = opcodes(&prog, 0);
    // descending comparison mirrors to >=
    assert!(ops.contains(&Opcode::GteiI32) || ops.contains(&Opcode::GteI32));
    prog.validate().unwrap();
}

#[test]
fn test_vector_append_grows_buffer() {
    let prog = compile("DIM v%{}\nAPPEND v%, 42");
    let ops = opcodes(&prog, 0);
    assert!(ops.contains(&Opcode::Realloc));
    assert!(ops.contains(&Opcode::Getref));
}

#[test]
fn test_swap_exchanges_headers() {
    let prog = compile("a$ = \"x\"\nb$ = \"y\"\nSWAP a$, b$");
    let ops = opcodes(&prog, 0);
    // five header words are exchanged through registers
    assert!(count(&prog, 0, Opcode::LoadoI32) >= 10);
    assert!(ops.contains(&Opcode::StoreoI32));
}

#[test]
fn test_hex_print_uses_conversion_builtin() {
    let prog = compile("x% = 255\nPRINT ~x%");
    assert!(prog.find("_hex_to_str").is_some());
}

#[test]
fn test_local_string_cleaned_up_in_procedure() {
    let prog = compile("PROCwork\nDEF PROCwork\nLOCAL s$\ns$ += \"data\"\nENDPROC");
    let idx = prog.find("PROCwork").unwrap();
    let ops = opcodes(&prog, idx);
    assert!(ops.contains(&Opcode::PushI32));
    assert!(ops.contains(&Opcode::PopI32));
    assert!(ops.contains(&Opcode::Deref));
    assert!(ops.contains(&Opcode::Ret));
}

#[test]
fn test_reference_parameter_copied_into_callee() {
    let prog = compile("a$ = \"x\"\nPROCshow(a$)\nDEF PROCshow(s$)\nPRINT s$\nENDPROC");
    let idx = prog.find("PROCshow").unwrap();
    let ops = opcodes(&prog, idx);
    // the callee takes its own counted reference on the data
    assert!(ops.contains(&Opcode::Ref));
    assert!(ops.contains(&Opcode::PushI32));
}

#[test]
fn test_emitted_program_round_trips_through_json() {
    let prog = compile("a$ = \"x\"\nPRINT a$");
    let json = serde_json::to_string(&prog).unwrap();
    let reloaded: Program = serde_json::from_str(&json).unwrap();
    assert_eq!(prog.to_string(), reloaded.to_string());
    assert_eq!(reloaded.find("_memcpy"), prog.find("_memcpy"));
}

#[test]
fn test_whole_program_validates() {
    let prog = compile(
        "TYPE T\nname$\nENDTYPE\n\
         DIM r AS TYPE T\n\
         DIM a%(3)\n\
         a%(1) = 2\n\
         s$ = \"start\"\n\
         s$ += \"!\"\n\
         FOR i% = 0 TO 3\n\
         PRINT a%(1)\n\
         NEXT\n\
         PROCshow(s$)\n\
         DEF PROCshow(t$)\n\
         PRINT t$\n\
         ENDPROC",
    );
    prog.validate().unwrap();
    // every call is bound to a real section
    for idx in 0..prog.num_sections() {
        for op in prog.section(idx).ops() {
            if let Op::Call { info, .. } = op {
                assert!(info.callee < prog.num_sections());
            }
        }
    }
}
