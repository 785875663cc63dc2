//! Boundary between the interpreter and the object runtime.

mod runtime;

pub use runtime::Runtime;
