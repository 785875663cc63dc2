use anyhow::{Result, bail};
use byterun_core::vm::{HeapRef, Value};

/// A runtime-owned object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    Str(Vec<u8>),
    Array(Vec<Value>),
    /// Tagged aggregate; `tag` is the constructor name hash.
    Sexp { tag: i32, fields: Vec<Value> },
    Closure { entry: usize, captured: Vec<Value> },
}

impl Object {
    pub fn kind(&self) -> &'static str {
        match self {
            Object::Str(_) => "string",
            Object::Array(_) => "array",
            Object::Sexp { .. } => "sexp",
            Object::Closure { .. } => "closure",
        }
    }

    /// Number of elements, or of words for a closure (entry included).
    pub fn len(&self) -> usize {
        match self {
            Object::Str(bytes) => bytes.len(),
            Object::Array(items) => items.len(),
            Object::Sexp { fields, .. } => fields.len(),
            Object::Closure { captured, .. } => captured.len() + 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Append-only object arena. Objects are never freed; a reference is an
/// index into the arena and stays valid for the life of the heap.
#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<Object>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, object: Object) -> Result<HeapRef> {
        let Ok(index) = u32::try_from(self.objects.len()) else {
            bail!("heap exhausted after {} objects", self.objects.len());
        };
        self.objects.push(object);
        Ok(HeapRef::new(index))
    }

    pub fn get(&self, r: HeapRef) -> Result<&Object> {
        match self.objects.get(r.index()) {
            Some(object) => Ok(object),
            None => bail!("dangling reference @{}", r.index()),
        }
    }

    pub fn get_mut(&mut self, r: HeapRef) -> Result<&mut Object> {
        match self.objects.get_mut(r.index()) {
            Some(object) => Ok(object),
            None => bail!("dangling reference @{}", r.index()),
        }
    }

    /// The object `v` refers to, if it is a live reference.
    pub fn deref(&self, v: Value) -> Option<&Object> {
        match v {
            Value::Ref(r) => self.objects.get(r.index()),
            _ => None,
        }
    }

    /// Like [`Heap::deref`], failing for scalars and locations.
    pub fn resolve(&self, v: Value) -> Result<&Object> {
        self.get(v.as_heap()?)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
