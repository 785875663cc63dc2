//! Native object runtime for the byterun interpreter.
//!
//! [`NativeRuntime`] keeps every string, array, aggregate and closure in an
//! append-only [`Heap`] and talks to the outside world through an integer
//! [`Console`].

pub mod console;
pub mod heap;
pub mod render;
pub mod tag;


use std::io::{self, BufRead, StdinLock, Stdout, Write};

use anyhow::{Result, bail, ensure};
use byterun_core::{
    rt::Runtime,
    vm::{HeapRef, Value},
};
use tracing::debug;

pub use console::Console;
pub use heap::{Heap, Object};

/// Runtime wired to the process's standard input and output.
pub type StdioRuntime = NativeRuntime<StdinLock<'static>, Stdout>;

#[derive(Debug)]
pub struct NativeRuntime<I, O> {
    heap: Heap,
    console: Console<I, O>,
}

impl StdioRuntime {
    pub fn stdio() -> Self {
        NativeRuntime::with_io(io::stdin().lock(), io::stdout())
    }
}

impl<I: BufRead, O: Write> NativeRuntime<I, O> {
    pub fn with_io(input: I, output: O) -> Self {
        Self {
            heap: Heap::new(),
            console: Console::new(input, output),
        }
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn output(&self) -> &O {
        self.console.output()
    }

    pub fn into_output(self) -> O {
        self.console.into_output()
    }

    fn object_mut(&mut self, v: Value) -> Result<&mut Object> {
        self.heap.get_mut(v.as_heap()?)
    }
}

fn element_index(object: &Object, index: i32) -> Result<usize> {
    ensure!(
        index >= 0 && (index as usize) < object.len(),
        "index {} out of bounds for {} of length {}",
        index,
        object.kind(),
        object.len()
    );
    Ok(index as usize)
}

impl<I: BufRead, O: Write> Runtime for NativeRuntime<I, O> {
    fn init(&mut self) -> Result<()> {
        debug!(target: "byterun::runtime", "native runtime initialized");
        Ok(())
    }

    fn string(&mut self, bytes: &[u8]) -> Result<HeapRef> {
        self.heap.alloc(Object::Str(bytes.to_vec()))
    }

    fn array(&mut self, items: &[Value]) -> Result<HeapRef> {
        self.heap.alloc(Object::Array(items.to_vec()))
    }

    fn sexp(&mut self, tag: i32, fields: &[Value]) -> Result<HeapRef> {
        self.heap.alloc(Object::Sexp {
            tag,
            fields: fields.to_vec(),
        })
    }

    fn closure(&mut self, entry: usize, captured: &[Value]) -> Result<HeapRef> {
        self.heap.alloc(Object::Closure {
            entry,
            captured: captured.to_vec(),
        })
    }

    fn field(&self, object: HeapRef, index: usize) -> Result<Value> {
        let field = match self.heap.get(object)? {
            Object::Str(bytes) => bytes.get(index).map(|&b| Value::int(i32::from(b))),
            Object::Array(items) => items.get(index).copied(),
            Object::Sexp { fields, .. } => fields.get(index).copied(),
            Object::Closure { entry, captured } => match index {
                0 => Some(Value::Scalar(i32::try_from(*entry)?)),
                i => captured.get(i - 1).copied(),
            },
        };
        match field {
            Some(v) => Ok(v),
            None => bail!("no field {} in object @{}", index, object.index()),
        }
    }

    fn set_field(&mut self, object: HeapRef, index: usize, value: Value) -> Result<()> {
        let slot = match self.heap.get_mut(object)? {
            Object::Str(bytes) => {
                if let Some(b) = bytes.get_mut(index) {
                    *b = value.as_int()? as u8;
                    return Ok(());
                }
                None
            }
            Object::Array(items) => items.get_mut(index),
            Object::Sexp { fields, .. } => fields.get_mut(index),
            Object::Closure { captured, .. } => match index {
                0 => bail!("the entry of a closure cannot be overwritten"),
                i => captured.get_mut(i - 1),
            },
        };
        match slot {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => bail!("no field {} in object @{}", index, object.index()),
        }
    }

    fn closure_entry(&self, closure: HeapRef) -> Result<usize> {
        match self.heap.get(closure)? {
            Object::Closure { entry, .. } => Ok(*entry),
            other => bail!("expected a closure, found {}", other.kind()),
        }
    }

    fn elem(&self, container: Value, index: i32) -> Result<Value> {
        let object = self.heap.resolve(container)?;
        let i = element_index(object, index)?;
        Ok(match object {
            Object::Str(bytes) => Value::int(i32::from(bytes[i])),
            Object::Array(items) => items[i],
            Object::Sexp { fields, .. } => fields[i],
            Object::Closure { .. } => bail!("cannot index a closure"),
        })
    }

    fn store_elem(&mut self, container: Value, index: i32, value: Value) -> Result<()> {
        let object = self.object_mut(container)?;
        let i = element_index(object, index)?;
        match object {
            Object::Str(bytes) => bytes[i] = value.as_int()? as u8,
            Object::Array(items) => items[i] = value,
            Object::Sexp { fields, .. } => fields[i] = value,
            Object::Closure { .. } => bail!("cannot index a closure"),
        }
        Ok(())
    }

    fn tag_hash(&self, name: &[u8]) -> Result<i32> {
        tag::tag_hash(name)
    }

    fn string_eq(&self, a: Value, b: Value) -> Result<bool> {
        match (self.heap.deref(a), self.heap.deref(b)) {
            (Some(Object::Str(x)), Some(Object::Str(y))) => Ok(x == y),
            _ => Ok(false),
        }
    }

    fn is_string(&self, v: Value) -> bool {
        matches!(self.heap.deref(v), Some(Object::Str(_)))
    }

    fn is_array(&self, v: Value) -> bool {
        matches!(self.heap.deref(v), Some(Object::Array(_)))
    }

    fn is_sexp(&self, v: Value) -> bool {
        matches!(self.heap.deref(v), Some(Object::Sexp { .. }))
    }

    fn is_closure(&self, v: Value) -> bool {
        matches!(self.heap.deref(v), Some(Object::Closure { .. }))
    }

    fn tag_matches(&self, v: Value, tag: i32, arity: usize) -> bool {
        matches!(
            self.heap.deref(v),
            Some(Object::Sexp { tag: t, fields }) if *t == tag && fields.len() == arity
        )
    }

    fn array_matches(&self, v: Value, len: usize) -> bool {
        matches!(self.heap.deref(v), Some(Object::Array(items)) if items.len() == len)
    }

    fn read_int(&mut self) -> Result<i32> {
        self.console.read_int()
    }

    fn write_int(&mut self, n: i32) -> Result<()> {
        self.console.write_int(n)
    }

    fn length(&self, v: Value) -> Result<i32> {
        let object = self.heap.resolve(v)?;
        Ok(i32::try_from(object.len())?)
    }

    fn stringify(&mut self, v: Value) -> Result<HeapRef> {
        let text = render::render(&self.heap, v);
        self.heap.alloc(Object::Str(text.into_bytes()))
    }
}
