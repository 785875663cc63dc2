use super::*;

#[test]
fn arithmetic_reaches_lwrite() {
    let image = assemble(|code, _| {
        code.emit(Instruction::Const(5));
        code.emit(Instruction::Const(7));
        code.emit(Instruction::Binop(BinOp::Add));
        code.emit(Instruction::Lwrite);
        code.emit(Instruction::Stop);
    });
    let vm = run(&image).unwrap();
    assert_eq!(vm.runtime().output, vec![12]);
    // Lwrite leaves the unit value behind
    assert_eq!(vm.stack().peek(0).unwrap(), Value::UNIT);
    assert_eq!(vm.runtime().inits, 1);
}

#[test]
fn relational_binops_push_booleans() {
    let image = assemble(|code, _| {
        code.emit(Instruction::Const(6));
        code.emit(Instruction::Const(2));
        code.emit(Instruction::Binop(BinOp::Lt));
        code.emit(Instruction::Lwrite);
        code.emit(Instruction::Const(2));
        code.emit(Instruction::Const(2));
        code.emit(Instruction::Binop(BinOp::Le));
        code.emit(Instruction::Lwrite);
        code.emit(Instruction::Stop);
    });
    assert_eq!(output_of(&image), vec![0, 1]);
}

#[test]
fn conditional_jumps_follow_the_popped_condition() {
    for (cond, expected) in [(0, vec![2]), (1, vec![1, 2])] {
        let image = assemble(|code, _| {
            code.emit(Instruction::Const(cond));
            let skip = code.emit(Instruction::CJmpZ(0));
            code.emit(Instruction::Const(1));
            code.emit(Instruction::Lwrite);
            code.emit(Instruction::Drop);
            let target = code.here();
            code.emit(Instruction::Const(2));
            code.emit(Instruction::Lwrite);
            code.emit(Instruction::Stop);
            code.patch_target(skip, target).unwrap();
        });
        assert_eq!(output_of(&image), expected, "cond = {cond}");
    }

    for (cond, expected) in [(0, vec![1, 2]), (-3, vec![2])] {
        let image = assemble(|code, _| {
            code.emit(Instruction::Const(cond));
            let skip = code.emit(Instruction::CJmpNz(0));
            code.emit(Instruction::Const(1));
            code.emit(Instruction::Lwrite);
            code.emit(Instruction::Drop);
            let target = code.here();
            code.emit(Instruction::Const(2));
            code.emit(Instruction::Lwrite);
            code.emit(Instruction::Stop);
            code.patch_target(skip, target).unwrap();
        });
        assert_eq!(output_of(&image), expected, "cond = {cond}");
    }
}

#[test]
fn unconditional_jump_skips_code() {
    let image = assemble(|code, _| {
        let jmp = code.emit(Instruction::Jmp(0));
        code.emit(Instruction::Const(1));
        code.emit(Instruction::Lwrite);
        let target = code.here();
        code.emit(Instruction::Const(3));
        code.emit(Instruction::Lwrite);
        code.emit(Instruction::Stop);
        code.patch_target(jmp, target).unwrap();
    });
    assert_eq!(output_of(&image), vec![3]);
}

#[test]
fn countdown_loop_over_a_global() {
    let image = assemble(|code, b| {
        b.globals(1);
        code.emit(Instruction::Const(5));
        code.emit(Instruction::St(Loc::global(0)));
        code.emit(Instruction::Drop);
        let head = code.here();
        code.emit(Instruction::Ld(Loc::global(0)));
        let exit = code.emit(Instruction::CJmpZ(0));
        code.emit(Instruction::Ld(Loc::global(0)));
        code.emit(Instruction::Lwrite);
        code.emit(Instruction::Drop);
        code.emit(Instruction::Ld(Loc::global(0)));
        code.emit(Instruction::Const(1));
        code.emit(Instruction::Binop(BinOp::Sub));
        code.emit(Instruction::St(Loc::global(0)));
        code.emit(Instruction::Drop);
        code.emit(Instruction::Jmp(head as i32));
        let done = code.here();
        code.emit(Instruction::Stop);
        code.patch_target(exit, done).unwrap();
    });
    let vm = run(&image).unwrap();
    assert_eq!(vm.runtime().output, vec![5, 4, 3, 2, 1]);
    assert_eq!(vm.globals(), &[Value::int(0)]);
}

#[test]
fn globals_start_zeroed() {
    let image = assemble(|code, b| {
        b.globals(3);
        code.emit(Instruction::Ld(Loc::global(2)));
        code.emit(Instruction::Lwrite);
        code.emit(Instruction::Stop);
    });
    assert_eq!(output_of(&image), vec![0]);
}

#[test]
fn lread_feeds_the_program() {
    let image = assemble(|code, _| {
        code.emit(Instruction::Lread);
        code.emit(Instruction::Lread);
        code.emit(Instruction::Binop(BinOp::Mul));
        code.emit(Instruction::Lwrite);
        code.emit(Instruction::Stop);
    });
    let vm = run_with(&image, TestRuntime::with_input(&[6, 7])).unwrap();
    assert_eq!(vm.runtime().output, vec![42]);
}

#[test]
fn input_can_be_queued_after_construction() {
    let image = assemble(|code, _| {
        code.emit(Instruction::Lread);
        code.emit(Instruction::Lwrite);
        code.emit(Instruction::Stop);
    });
    let mut vm = Interpreter::new(&image, TestRuntime::default()).unwrap();
    vm.runtime_mut().input.push_back(-9);
    vm.eval().unwrap();
    assert_eq!(vm.into_runtime().output, vec![-9]);
}

#[test]
fn fail_reports_the_source_position_and_last_line() {
    let image = assemble(|code, _| {
        code.emit(Instruction::Line(7));
        code.emit(Instruction::Const(1));
        code.emit(Instruction::Fail { line: 3, col: 4 });
    });
    let msg = failure_of(&image);
    assert!(msg.contains("matching value failure at 3:4"), "{msg}");
    assert!(msg.contains("line 7"), "{msg}");
    assert!(msg.contains("at offset 0x0000000a"), "{msg}");
}

#[test]
fn line_is_recorded() {
    let image = assemble(|code, _| {
        code.emit(Instruction::Line(12));
        code.emit(Instruction::Stop);
    });
    assert_eq!(run(&image).unwrap().line(), Some(12));
}

#[test]
fn ret_is_rejected() {
    let image = assemble(|code, _| {
        code.emit(Instruction::Const(1));
        code.emit(Instruction::Ret);
    });
    assert!(failure_of(&image).contains("unsupported instruction RET"));
}

#[test]
fn division_by_zero_is_fatal() {
    let image = assemble(|code, _| {
        code.emit(Instruction::Const(1));
        code.emit(Instruction::Const(0));
        code.emit(Instruction::Binop(BinOp::Div));
        code.emit(Instruction::Stop);
    });
    assert!(failure_of(&image).contains("division by zero"));
}

#[test]
fn invalid_opcode_is_fatal() {
    let image = Image::new(Vec::new(), Vec::new(), vec![0x10, 1, 0, 0, 0, 0x8F], 0);
    let msg = failure_of(&image);
    assert!(msg.contains("invalid opcode 8-15"), "{msg}");
}

#[test]
fn running_off_the_code_is_fatal() {
    let image = assemble(|code, _| {
        code.emit(Instruction::Const(1));
    });
    assert!(failure_of(&image).contains("ran past the end of the code"));
}

#[test]
fn jump_targets_must_lie_inside_the_code() {
    let image = assemble(|code, _| {
        code.emit(Instruction::Jmp(4096));
        code.emit(Instruction::Stop);
    });
    assert!(failure_of(&image).contains("outside the code"));
}

#[test]
fn branch_conditions_must_be_scalars() {
    let image = assemble(|code, b| {
        let s = b.string("x");
        code.emit(Instruction::String(s));
        code.emit(Instruction::CJmpZ(0));
        code.emit(Instruction::Stop);
    });
    assert!(failure_of(&image).contains("branch condition"));
}
