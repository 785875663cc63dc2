//! Stack-based interpreter for compiled SM bytecode units.
//!
//! The crate is split the same way a unit is processed: [`vm::Image`] unpacks a
//! bytecode file, [`vm::Instruction`] decodes the instruction stream, and
//! [`vm::Interpreter`] runs it against a [`rt::Runtime`] that owns every heap object.

pub mod rt;
pub mod vm;
