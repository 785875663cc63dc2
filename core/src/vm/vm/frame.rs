//! Frame layout and variable resolution.
//!
//! Relative to the frame pointer `fp` of a running function:
//!
//! ```text
//!   fp - 1 - i   local i
//!   fp           saved fp of the caller
//!   fp + 1       argument count
//!   fp + 2       return address
//!   fp + 3 + i   argument i
//! ```
//!
//! A closure call passes the closure itself as the last argument, which is
//! where bound variables are read from.

use anyhow::{Context, Result, bail, ensure};
use tracing::debug;

use super::{Flow, Interpreter, NO_RETURN};
use crate::rt::Runtime;
use crate::vm::bytecode::{Loc, LocClass};
use crate::vm::value::{HeapRef, Slot, Value};

impl<R: Runtime> Interpreter<'_, R> {
    /// Where the variable `loc` lives in the current frame.
    pub(crate) fn address(&self, loc: Loc) -> Result<Slot> {
        ensure!(loc.index >= 0, "negative {} index {}", loc.class.letter(), loc.index);
        let index = loc.index as usize;
        Ok(match loc.class {
            LocClass::Global => {
                ensure!(
                    index < self.globals.len(),
                    "global {} outside the globals area ({} words)",
                    index,
                    self.globals.len()
                );
                Slot::Global(index)
            }
            LocClass::Local => match self.fp.checked_sub(index + 1) {
                Some(addr) => Slot::Stack(addr),
                None => bail!("local {} is below the stack", index),
            },
            LocClass::Arg => Slot::Stack(self.fp + 3 + index),
            LocClass::Bound => Slot::Field {
                object: self.bound_closure()?,
                index: index + 1,
            },
        })
    }

    pub(crate) fn load(&self, loc: Loc) -> Result<Value> {
        let slot = self.address(loc)?;
        self.read_slot(slot).with_context(|| format!("cannot load {loc}"))
    }

    pub(crate) fn store(&mut self, loc: Loc, value: Value) -> Result<()> {
        let slot = self.address(loc)?;
        self.write_slot(slot, value).with_context(|| format!("cannot store {loc}"))
    }

    pub(crate) fn read_slot(&self, slot: Slot) -> Result<Value> {
        match slot {
            Slot::Global(i) => self
                .globals
                .get(i)
                .copied()
                .ok_or_else(|| anyhow::anyhow!("global {} outside the globals area", i)),
            Slot::Stack(addr) => self.stack.get(addr),
            Slot::Field { object, index } => self.runtime.field(object, index),
        }
    }

    pub(crate) fn write_slot(&mut self, slot: Slot, value: Value) -> Result<()> {
        match slot {
            Slot::Global(i) => match self.globals.get_mut(i) {
                Some(word) => {
                    *word = value;
                    Ok(())
                }
                None => bail!("global {} outside the globals area", i),
            },
            Slot::Stack(addr) => self.stack.set(addr, value),
            Slot::Field { object, index } => self.runtime.set_field(object, index, value),
        }
    }

    /// Stores through a location produced by `LDA`.
    pub(crate) fn store_indirect(&mut self, target: Value, value: Value) -> Result<()> {
        match target {
            Value::Slot(slot) => self.write_slot(slot, value),
            other => bail!("cannot store through a {}", other.type_name()),
        }
    }

    fn frame_argc(&self) -> Result<usize> {
        let argc = self.stack.get(self.fp + 1)?.as_int().context("corrupted argument count")?;
        ensure!(argc >= 0, "negative argument count {}", argc);
        Ok(argc as usize)
    }

    fn bound_closure(&self) -> Result<HeapRef> {
        let argc = self.frame_argc()?;
        ensure!(argc > 0, "bound variable used in a frame without a closure");
        self.stack
            .get(self.fp + 3 + argc - 1)?
            .as_heap()
            .context("bound variable used in a frame without a closure")
    }

    /// `BEGIN`/`CBEGIN`: links a new frame and allocates its locals.
    pub(crate) fn enter(&mut self, nlocals: usize) -> Result<()> {
        self.stack.push(Value::Scalar(self.fp as i32))?;
        self.fp = self.stack.top();
        self.stack.reserve(nlocals)
    }

    /// Pushes the call linkage over the `argc` arguments on top and jumps to `entry`.
    ///
    /// `linkage_argc` is the count the callee will drop on return, which
    /// includes the closure for `CALLC`.
    pub(crate) fn call(&mut self, entry: usize, argc: usize, linkage_argc: usize) -> Result<()> {
        self.stack.reverse(argc)?;
        self.stack.push(Value::Scalar(i32::try_from(self.ip)?))?;
        self.stack.push(Value::Scalar(i32::try_from(linkage_argc)?))?;
        self.ip = entry;
        self.depth += 1;
        debug!(target: "byterun::vm::call", depth = self.depth, entry, argc, "call");
        Ok(())
    }

    /// `END`: unwinds the frame and returns to the caller.
    pub(crate) fn leave(&mut self) -> Result<Flow> {
        let result = self.stack.pop()?;
        self.stack.set_top(self.fp)?;
        let saved_fp = self.stack.pop()?.as_int().context("corrupted frame link")?;
        ensure!(
            saved_fp >= 0 && saved_fp as usize <= self.stack.bottom(),
            "saved frame pointer {} is outside the stack",
            saved_fp
        );
        let argc = self.stack.pop()?.as_int().context("corrupted argument count")?;
        ensure!(argc >= 0, "negative argument count {}", argc);
        let ret = self.stack.pop()?.as_int().context("corrupted return address")?;
        self.stack.drop(argc as usize)?;
        self.stack.push(result)?;
        self.fp = saved_fp as usize;

        if ret == NO_RETURN {
            return Ok(Flow::Halt);
        }
        let ret = self.target(ret).context("corrupted return address")?;
        self.depth = self.depth.saturating_sub(1);
        debug!(target: "byterun::vm::call", depth = self.depth, ret, %result, "return");
        self.ip = ret;
        Ok(Flow::Continue)
    }
}
