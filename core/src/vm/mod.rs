//! Bytecode image, stack machine and dispatch loop.

mod bytecode;
pub mod disasm;
mod image;
mod stack;
mod value;
#[allow(clippy::module_inception)]
mod vm;

pub use bytecode::*;
pub use image::*;
pub use stack::Stack;
pub use value::*;
pub use vm::{DEFAULT_STACK_CAPACITY, Interpreter, VmOptions};

#[cfg(test)]
mod vm_test;
