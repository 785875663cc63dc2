use super::*;

#[test]
fn bottom_frame_is_in_place_before_the_first_instruction() {
    let image = assemble(|code, _| {
        code.emit(Instruction::Stop);
    });
    let vm = Interpreter::new(&image, TestRuntime::default()).unwrap();
    assert_eq!(vm.ip(), 0);
    assert_eq!(vm.fp(), vm.stack().top());
    assert_eq!(
        vm.stack().live(),
        &[Value::int(2), Value::int(-1), Value::UNIT, Value::UNIT]
    );
}

#[test]
fn dup_swap_drop() {
    let image = assemble(|code, _| {
        code.emit(Instruction::Const(1));
        code.emit(Instruction::Const(2));
        code.emit(Instruction::Swap);
        code.emit(Instruction::Dup);
        code.emit(Instruction::Const(3));
        code.emit(Instruction::Drop);
        code.emit(Instruction::Stop);
    });
    let vm = run(&image).unwrap();
    assert_eq!(vm.stack().window(3).unwrap(), &[Value::int(1), Value::int(1), Value::int(2)]);
}

#[test]
fn stack_size_follows_pushes_and_pops() {
    let image = assemble(|code, _| {
        for n in 0..10 {
            code.emit(Instruction::Const(n));
        }
        for _ in 0..4 {
            code.emit(Instruction::Binop(BinOp::Add));
        }
        code.emit(Instruction::Drop);
        code.emit(Instruction::Stop);
    });
    let vm = run(&image).unwrap();
    assert_eq!(vm.stack().size(), 4 + 10 - 4 - 1);
}

#[test]
fn pop_on_an_empty_stack_is_fatal() {
    let image = assemble(|code, _| {
        for _ in 0..5 {
            code.emit(Instruction::Drop);
        }
        code.emit(Instruction::Stop);
    });
    let msg = failure_of(&image);
    assert!(msg.contains("STACK: pop"), "{msg}");
    assert!(msg.contains("at offset 0x00000004"), "{msg}");
}

#[test]
fn stack_capacity_is_configurable() {
    let image = assemble(|code, _| {
        for n in 0..8 {
            code.emit(Instruction::Const(n));
        }
        code.emit(Instruction::Stop);
    });
    let options = VmOptions { stack_capacity: 8 };
    let mut vm = Interpreter::with_options(&image, TestRuntime::default(), options).unwrap();
    let err = vm.eval().unwrap_err();
    assert!(format!("{err:#}").contains("STACK: push"));
    assert_eq!(vm.stack().capacity(), 8);

    let roomy = VmOptions { stack_capacity: 12 };
    let mut vm = Interpreter::with_options(&image, TestRuntime::default(), roomy).unwrap();
    vm.eval().unwrap();
    assert_eq!(vm.stack().size(), 12);
}

#[test]
fn capacity_too_small_for_the_bottom_frame() {
    let image = assemble(|code, _| {
        code.emit(Instruction::Stop);
    });
    let options = VmOptions { stack_capacity: 3 };
    assert!(Interpreter::with_options(&image, TestRuntime::default(), options).is_err());
}
