//! Tagged values.
//!
//! A machine word of the compiled program is either a scalar, stored as
//! `(n << 1) | 1`, or a reference owned by the runtime. The interpreter keeps
//! the two apart with [`Value`] and only touches raw words through the three
//! helpers below.

use std::fmt;

use anyhow::{Result, bail};

/// Smallest integer that survives a round trip through a scalar word.
pub const SCALAR_MIN: i32 = -(1 << 30);
/// Largest integer that survives a round trip through a scalar word.
pub const SCALAR_MAX: i32 = (1 << 30) - 1;

/// Encodes `n` as a scalar word. Bits above the 31-bit payload are discarded.
#[inline]
pub const fn box_word(n: i32) -> i32 {
    (n << 1) | 1
}

/// Decodes a scalar word back into its integer payload.
#[inline]
pub const fn unbox_word(word: i32) -> i32 {
    word >> 1
}

/// Returns `true` when the low tag bit marks `word` as a scalar.
#[inline]
pub const fn is_boxed_word(word: i32) -> bool {
    word & 1 == 1
}

/// Opaque handle to an object owned by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapRef(u32);

impl HeapRef {
    #[inline]
    pub const fn new(index: u32) -> Self {
        HeapRef(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Address of a variable, produced by `LDA` and consumed by indirect stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Index into the globals area.
    Global(usize),
    /// Absolute position inside the operand/frame stack.
    Stack(usize),
    /// Raw field of a runtime object (closure captures live at `1..`).
    Field { object: HeapRef, index: usize },
}

/// One word of the operand stack, the globals area or a heap object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    /// Unboxed integer payload, always within `SCALAR_MIN..=SCALAR_MAX`.
    Scalar(i32),
    Ref(HeapRef),
    Slot(Slot),
}

impl Value {
    /// The scalar `0`, used for fresh slots and as the result of `Lwrite`.
    pub const UNIT: Value = Value::Scalar(0);

    /// Builds a scalar, wrapping `n` into the 31-bit payload exactly like boxing does.
    #[inline]
    pub const fn int(n: i32) -> Self {
        Value::Scalar(unbox_word(box_word(n)))
    }

    #[inline]
    pub const fn bool(flag: bool) -> Self {
        Value::Scalar(flag as i32)
    }

    #[inline]
    pub const fn is_scalar(&self) -> bool {
        matches!(self, Value::Scalar(_))
    }

    #[inline]
    pub const fn is_ref(&self) -> bool {
        matches!(self, Value::Ref(_))
    }

    pub fn as_int(self) -> Result<i32> {
        match self {
            Value::Scalar(n) => Ok(n),
            other => bail!("expected a scalar, found {}", other.type_name()),
        }
    }

    pub fn as_heap(self) -> Result<HeapRef> {
        match self {
            Value::Ref(r) => Ok(r),
            other => bail!("expected a heap reference, found {}", other.type_name()),
        }
    }

    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Scalar(_) => "scalar",
            Value::Ref(_) => "reference",
            Value::Slot(_) => "location",
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::UNIT
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(n) => write!(f, "{n}"),
            Value::Ref(r) => write!(f, "@{}", r.index()),
            Value::Slot(Slot::Global(i)) => write!(f, "&G({i})"),
            Value::Slot(Slot::Stack(i)) => write!(f, "&S({i})"),
            Value::Slot(Slot::Field { object, index }) => write!(f, "&@{}[{index}]", object.index()),
        }
    }
}
