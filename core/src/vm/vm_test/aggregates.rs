use super::*;

#[test]
fn sexp_keeps_fields_in_declaration_order() {
    let image = assemble(|code, b| {
        let cons = b.string("Cons");
        code.emit(Instruction::Const(1));
        code.emit(Instruction::Const(2));
        code.emit(Instruction::Const(3));
        code.emit(Instruction::Sexp { tag: cons, arity: 3 });
        code.emit(Instruction::Dup);
        code.emit(Instruction::Tag { tag: cons, arity: 3 });
        code.emit(Instruction::Lwrite);
        code.emit(Instruction::Drop);
        code.emit(Instruction::Dup);
        code.emit(Instruction::Tag { tag: cons, arity: 2 });
        code.emit(Instruction::Lwrite);
        code.emit(Instruction::Stop);
    });
    let vm = run(&image).unwrap();
    assert_eq!(vm.runtime().output, vec![1, 0]);
    let sexp = vm.runtime().obj(vm.stack().peek(1).unwrap()).unwrap();
    let hash = vm.runtime().tag_hash(b"Cons").unwrap();
    assert_eq!(sexp.kind, Kind::Sexp(hash));
    assert_eq!(sexp.fields, vec![Value::int(1), Value::int(2), Value::int(3)]);
    // the three operands were consumed
    assert_eq!(vm.stack().size(), 4 + 2);
}

#[test]
fn barray_and_elem() {
    let image = assemble(|code, _| {
        code.emit(Instruction::Const(10));
        code.emit(Instruction::Const(20));
        code.emit(Instruction::Const(30));
        code.emit(Instruction::Barray(3));
        code.emit(Instruction::Dup);
        code.emit(Instruction::Const(1));
        code.emit(Instruction::Elem);
        code.emit(Instruction::Lwrite);
        code.emit(Instruction::Drop);
        code.emit(Instruction::Llength);
        code.emit(Instruction::Lwrite);
        code.emit(Instruction::Stop);
    });
    assert_eq!(output_of(&image), vec![20, 3]);
}

#[test]
fn sta_with_an_index_stores_into_the_container() {
    let image = assemble(|code, b| {
        b.globals(1);
        code.emit(Instruction::Const(1));
        code.emit(Instruction::Const(2));
        code.emit(Instruction::Barray(2));
        code.emit(Instruction::St(Loc::global(0)));
        code.emit(Instruction::Const(0));
        code.emit(Instruction::Const(9));
        code.emit(Instruction::Sta);
        code.emit(Instruction::Lwrite);
        code.emit(Instruction::Drop);
        code.emit(Instruction::Ld(Loc::global(0)));
        code.emit(Instruction::Const(0));
        code.emit(Instruction::Elem);
        code.emit(Instruction::Lwrite);
        code.emit(Instruction::Stop);
    });
    let vm = run(&image).unwrap();
    assert_eq!(vm.runtime().output, vec![9, 9]);
    let array = vm.runtime().obj(vm.globals()[0]).unwrap();
    assert_eq!(array.fields, vec![Value::int(9), Value::int(2)]);
}

#[test]
fn array_pattern_checks_the_length() {
    let image = assemble(|code, _| {
        code.emit(Instruction::Const(7));
        code.emit(Instruction::Barray(1));
        code.emit(Instruction::Dup);
        code.emit(Instruction::Array(1));
        code.emit(Instruction::Lwrite);
        code.emit(Instruction::Drop);
        code.emit(Instruction::Array(2));
        code.emit(Instruction::Lwrite);
        code.emit(Instruction::Stop);
    });
    assert_eq!(output_of(&image), vec![1, 0]);
}

#[test]
fn string_patterns() {
    let image = assemble(|code, b| {
        let abc = b.string("abc");
        let abd = b.string("abd");
        code.emit(Instruction::String(abc));
        code.emit(Instruction::String(abc));
        code.emit(Instruction::Patt(PattKind::StrEq));
        code.emit(Instruction::Lwrite);
        code.emit(Instruction::Drop);
        code.emit(Instruction::String(abc));
        code.emit(Instruction::String(abd));
        code.emit(Instruction::Patt(PattKind::StrEq));
        code.emit(Instruction::Lwrite);
        code.emit(Instruction::Drop);
        code.emit(Instruction::String(abd));
        code.emit(Instruction::Patt(PattKind::IsString));
        code.emit(Instruction::Lwrite);
        code.emit(Instruction::Drop);
        code.emit(Instruction::String(abd));
        code.emit(Instruction::Llength);
        code.emit(Instruction::Lwrite);
        code.emit(Instruction::Stop);
    });
    assert_eq!(output_of(&image), vec![1, 0, 1, 3]);
}

#[test]
fn kind_patterns() {
    let cases = [
        (PattKind::IsArray, 1),
        (PattKind::IsSexp, 0),
        (PattKind::IsBoxed, 1),
        (PattKind::IsUnboxed, 0),
        (PattKind::IsClosure, 0),
        (PattKind::IsString, 0),
    ];
    for (kind, expected) in cases {
        let image = assemble(|code, _| {
            code.emit(Instruction::Barray(0));
            code.emit(Instruction::Patt(kind));
            code.emit(Instruction::Lwrite);
            code.emit(Instruction::Stop);
        });
        assert_eq!(output_of(&image), vec![expected], "{kind:?}");
    }

    let image = assemble(|code, _| {
        code.emit(Instruction::Const(4));
        code.emit(Instruction::Patt(PattKind::IsUnboxed));
        code.emit(Instruction::Lwrite);
        code.emit(Instruction::Const(4));
        code.emit(Instruction::Patt(PattKind::IsBoxed));
        code.emit(Instruction::Lwrite);
        code.emit(Instruction::Stop);
    });
    assert_eq!(output_of(&image), vec![1, 0]);
}

#[test]
fn lstring_allocates_the_printed_form() {
    let image = assemble(|code, _| {
        code.emit(Instruction::Const(-42));
        code.emit(Instruction::Lstring);
        code.emit(Instruction::Stop);
    });
    let vm = run(&image).unwrap();
    let s = vm.runtime().obj(vm.stack().peek(0).unwrap()).unwrap();
    assert_eq!(s.kind, Kind::Str);
    assert_eq!(s.bytes, b"-42");
}

#[test]
fn string_operands_must_be_in_the_table() {
    let image = assemble(|code, _| {
        code.emit(Instruction::String(64));
        code.emit(Instruction::Stop);
    });
    assert!(failure_of(&image).contains("outside the string table"));
}

#[test]
fn negative_counts_are_fatal() {
    let image = assemble(|code, _| {
        code.emit(Instruction::Barray(-1));
        code.emit(Instruction::Stop);
    });
    assert!(failure_of(&image).contains("negative count -1"));
}
