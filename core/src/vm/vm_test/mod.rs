use std::collections::VecDeque;

use anyhow::{Result, bail, ensure};

pub(super) use crate::{
    rt::Runtime,
    vm::{
        BinOp, CodeBuilder, HeapRef, Image, ImageBuilder, Instruction, Interpreter, Loc, PattKind, Slot, Value,
        VmOptions,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Kind {
    Str,
    Array,
    Sexp(i32),
    Closure,
}

#[derive(Debug, Clone)]
pub(super) struct Obj {
    pub kind: Kind,
    pub bytes: Vec<u8>,
    pub fields: Vec<Value>,
}

/// Minimal in-memory runtime: a flat object arena, scripted input and
/// captured output.
#[derive(Debug, Default)]
pub(super) struct TestRuntime {
    pub heap: Vec<Obj>,
    pub input: VecDeque<i32>,
    pub output: Vec<i32>,
    pub inits: usize,
}

impl TestRuntime {
    pub fn with_input(input: &[i32]) -> Self {
        Self {
            input: input.iter().copied().collect(),
            ..Self::default()
        }
    }

    fn alloc(&mut self, kind: Kind, bytes: Vec<u8>, fields: Vec<Value>) -> HeapRef {
        self.heap.push(Obj { kind, bytes, fields });
        HeapRef::new(self.heap.len() as u32 - 1)
    }

    pub fn obj(&self, v: Value) -> Option<&Obj> {
        match v {
            Value::Ref(r) => self.heap.get(r.index()),
            _ => None,
        }
    }

    fn obj_mut(&mut self, v: Value) -> Result<&mut Obj> {
        match v {
            Value::Ref(r) => match self.heap.get_mut(r.index()) {
                Some(obj) => Ok(obj),
                None => bail!("dangling reference"),
            },
            other => bail!("not an object: {}", other),
        }
    }

    fn kind_is(&self, v: Value, pred: impl Fn(&Kind) -> bool) -> bool {
        self.obj(v).is_some_and(|o| pred(&o.kind))
    }
}

impl Runtime for TestRuntime {
    fn init(&mut self) -> Result<()> {
        self.inits += 1;
        Ok(())
    }

    fn string(&mut self, bytes: &[u8]) -> Result<HeapRef> {
        Ok(self.alloc(Kind::Str, bytes.to_vec(), Vec::new()))
    }

    fn array(&mut self, items: &[Value]) -> Result<HeapRef> {
        Ok(self.alloc(Kind::Array, Vec::new(), items.to_vec()))
    }

    fn sexp(&mut self, tag: i32, fields: &[Value]) -> Result<HeapRef> {
        Ok(self.alloc(Kind::Sexp(tag), Vec::new(), fields.to_vec()))
    }

    fn closure(&mut self, entry: usize, captured: &[Value]) -> Result<HeapRef> {
        let mut fields = vec![Value::int(entry as i32)];
        fields.extend_from_slice(captured);
        Ok(self.alloc(Kind::Closure, Vec::new(), fields))
    }

    fn field(&self, object: HeapRef, index: usize) -> Result<Value> {
        match self.heap.get(object.index()).and_then(|o| o.fields.get(index)) {
            Some(v) => Ok(*v),
            None => bail!("no field {} in {:?}", index, object),
        }
    }

    fn set_field(&mut self, object: HeapRef, index: usize, value: Value) -> Result<()> {
        let obj = self.obj_mut(Value::Ref(object))?;
        ensure!(index < obj.fields.len(), "no field {}", index);
        obj.fields[index] = value;
        Ok(())
    }

    fn elem(&self, container: Value, index: i32) -> Result<Value> {
        let Some(obj) = self.obj(container) else {
            bail!("not an object: {}", container);
        };
        let i = index as usize;
        match obj.kind {
            Kind::Str => Ok(Value::int(i32::from(obj.bytes[i]))),
            _ => Ok(obj.fields[i]),
        }
    }

    fn store_elem(&mut self, container: Value, index: i32, value: Value) -> Result<()> {
        let obj = self.obj_mut(container)?;
        let i = index as usize;
        match obj.kind {
            Kind::Str => obj.bytes[i] = value.as_int()? as u8,
            _ => obj.fields[i] = value,
        }
        Ok(())
    }

    fn tag_hash(&self, name: &[u8]) -> Result<i32> {
        Ok(name.iter().fold(7i32, |h, &b| h.wrapping_mul(31).wrapping_add(i32::from(b))) & 0x3FFF_FFFF)
    }

    fn string_eq(&self, a: Value, b: Value) -> Result<bool> {
        match (self.obj(a), self.obj(b)) {
            (Some(x), Some(y)) if x.kind == Kind::Str && y.kind == Kind::Str => Ok(x.bytes == y.bytes),
            _ => Ok(false),
        }
    }

    fn is_string(&self, v: Value) -> bool {
        self.kind_is(v, |k| *k == Kind::Str)
    }

    fn is_array(&self, v: Value) -> bool {
        self.kind_is(v, |k| *k == Kind::Array)
    }

    fn is_sexp(&self, v: Value) -> bool {
        self.kind_is(v, |k| matches!(k, Kind::Sexp(_)))
    }

    fn is_closure(&self, v: Value) -> bool {
        self.kind_is(v, |k| *k == Kind::Closure)
    }

    fn tag_matches(&self, v: Value, tag: i32, arity: usize) -> bool {
        self.obj(v).is_some_and(|o| o.kind == Kind::Sexp(tag) && o.fields.len() == arity)
    }

    fn array_matches(&self, v: Value, len: usize) -> bool {
        self.obj(v).is_some_and(|o| o.kind == Kind::Array && o.fields.len() == len)
    }

    fn read_int(&mut self) -> Result<i32> {
        match self.input.pop_front() {
            Some(n) => Ok(n),
            None => bail!("input exhausted"),
        }
    }

    fn write_int(&mut self, n: i32) -> Result<()> {
        self.output.push(n);
        Ok(())
    }

    fn length(&self, v: Value) -> Result<i32> {
        match self.obj(v) {
            Some(o) if o.kind == Kind::Str => Ok(o.bytes.len() as i32),
            Some(o) => Ok(o.fields.len() as i32),
            None => bail!("length of a scalar"),
        }
    }

    fn stringify(&mut self, v: Value) -> Result<HeapRef> {
        let text = v.to_string().into_bytes();
        Ok(self.alloc(Kind::Str, text, Vec::new()))
    }
}

pub(super) fn assemble(build: impl FnOnce(&mut CodeBuilder, &mut ImageBuilder)) -> Image {
    let mut code = CodeBuilder::new();
    let mut builder = ImageBuilder::new();
    build(&mut code, &mut builder);
    builder.build(code)
}

pub(super) fn run_with(image: &Image, runtime: TestRuntime) -> Result<Interpreter<'_, TestRuntime>> {
    let mut vm = Interpreter::new(image, runtime)?;
    vm.eval()?;
    Ok(vm)
}

pub(super) fn run(image: &Image) -> Result<Interpreter<'_, TestRuntime>> {
    run_with(image, TestRuntime::default())
}

/// Runs the image and returns everything written through `Lwrite`.
pub(super) fn output_of(image: &Image) -> Vec<i32> {
    run(image).expect("program should run").into_runtime().output
}

/// Fault message of a program expected to fail, with its whole context chain.
pub(super) fn failure_of(image: &Image) -> String {
    match run(image) {
        Ok(_) => panic!("program was expected to fail"),
        Err(err) => format!("{err:#}"),
    }
}

mod aggregates;
mod control_flow;
mod stack_discipline;
