//! The object runtime the interpreter delegates to.
//!
//! The interpreter only manipulates stack words. Anything that needs to know
//! how strings, arrays, tagged aggregates or closures are laid out goes through
//! this trait, so the dispatch loop stays independent of the heap
//! representation. Every fallible entry point returns `anyhow::Result`; an
//! `Err` aborts evaluation.

use anyhow::Result;

use crate::vm::{HeapRef, Value};

pub trait Runtime {
    /// Called once before the first instruction runs.
    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    /// Allocates a string holding `bytes`.
    fn string(&mut self, bytes: &[u8]) -> Result<HeapRef>;

    /// Allocates an array whose elements are `items`, in order.
    fn array(&mut self, items: &[Value]) -> Result<HeapRef>;

    /// Allocates a tagged aggregate. `tag` is the value produced by [`Runtime::tag_hash`].
    fn sexp(&mut self, tag: i32, fields: &[Value]) -> Result<HeapRef>;

    /// Allocates a closure. Field 0 holds `Scalar(entry)`, the captures follow.
    fn closure(&mut self, entry: usize, captured: &[Value]) -> Result<HeapRef>;

    /// Raw field access: element `index` of an array or aggregate, or word
    /// `index` of a closure (0 is the entry address).
    fn field(&self, object: HeapRef, index: usize) -> Result<Value>;

    fn set_field(&mut self, object: HeapRef, index: usize, value: Value) -> Result<()>;

    /// Code offset a closure starts at.
    fn closure_entry(&self, closure: HeapRef) -> Result<usize> {
        let entry = self.field(closure, 0)?.as_int()?;
        anyhow::ensure!(entry >= 0, "closure entry {} is negative", entry);
        Ok(entry as usize)
    }

    /// `container[index]` for strings, arrays and aggregates.
    fn elem(&self, container: Value, index: i32) -> Result<Value>;

    /// `container[index] = value` for strings, arrays and aggregates.
    fn store_elem(&mut self, container: Value, index: i32, value: Value) -> Result<()>;

    /// Hash of a constructor name, as stored in aggregates and compared by `TAG`.
    fn tag_hash(&self, name: &[u8]) -> Result<i32>;

    fn string_eq(&self, a: Value, b: Value) -> Result<bool>;

    fn is_string(&self, v: Value) -> bool;

    fn is_array(&self, v: Value) -> bool;

    fn is_sexp(&self, v: Value) -> bool;

    fn is_closure(&self, v: Value) -> bool;

    fn is_boxed(&self, v: Value) -> bool {
        v.is_ref()
    }

    fn is_unboxed(&self, v: Value) -> bool {
        v.is_scalar()
    }

    /// `v` is an aggregate with tag hash `tag` and exactly `arity` fields.
    fn tag_matches(&self, v: Value, tag: i32, arity: usize) -> bool;

    /// `v` is an array of exactly `len` elements.
    fn array_matches(&self, v: Value, len: usize) -> bool;

    fn read_int(&mut self) -> Result<i32>;

    fn write_int(&mut self, n: i32) -> Result<()>;

    /// Length of a string, array or aggregate.
    fn length(&self, v: Value) -> Result<i32>;

    /// Allocates a string with the printed form of `v`.
    fn stringify(&mut self, v: Value) -> Result<HeapRef>;
}
