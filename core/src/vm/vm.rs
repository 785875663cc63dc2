mod exec;
mod frame;
mod math;

use anyhow::{Result, ensure};
use tracing::debug;

use crate::rt::Runtime;
use crate::vm::image::Image;
use crate::vm::stack::{Stack, zeroed_words};
use crate::vm::value::{SCALAR_MAX, Value};

/// Stack size used when no [`VmOptions`] are given, in words.
pub const DEFAULT_STACK_CAPACITY: usize = 1 << 20;

/// Return address stored in the synthetic bottom frame. Returning to it ends evaluation.
pub(crate) const NO_RETURN: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmOptions {
    /// Capacity of the operand/frame stack in words.
    pub stack_capacity: usize,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            stack_capacity: DEFAULT_STACK_CAPACITY,
        }
    }
}

/// What the dispatch loop does after an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Halt,
}

/// Stack-machine interpreter for one bytecode image.
///
/// Owns the operand/frame stack, the globals area and the object runtime; the
/// image is only borrowed. All registers (`ip`, `fp`, the stack top) live in
/// this struct, so several interpreters can run side by side.
pub struct Interpreter<'a, R: Runtime> {
    image: &'a Image,
    runtime: R,
    stack: Stack,
    globals: Vec<Value>,
    fp: usize,
    ip: usize,
    line: Option<i32>,
    depth: usize,
}

impl<'a, R: Runtime> Interpreter<'a, R> {
    pub fn new(image: &'a Image, runtime: R) -> Result<Self> {
        Self::with_options(image, runtime, VmOptions::default())
    }

    pub fn with_options(image: &'a Image, mut runtime: R, options: VmOptions) -> Result<Self> {
        ensure!(
            options.stack_capacity <= SCALAR_MAX as usize,
            "stack capacity {} does not fit a frame pointer",
            options.stack_capacity
        );
        runtime.init()?;
        let mut stack = Stack::new(options.stack_capacity)?;
        let globals = zeroed_words(image.global_area_size(), "globals")?;
        // Bottom frame: two placeholder arguments, the null return address and argc.
        stack.push(Value::UNIT)?;
        stack.push(Value::UNIT)?;
        stack.push(Value::Scalar(NO_RETURN))?;
        stack.push(Value::Scalar(2))?;
        let fp = stack.top();
        debug!(
            target: "byterun::vm",
            globals = image.global_area_size(),
            code = image.code().len(),
            stack = options.stack_capacity,
            "interpreter ready"
        );
        Ok(Self {
            image,
            runtime,
            stack,
            globals,
            fp,
            ip: 0,
            line: None,
            depth: 0,
        })
    }

    #[inline]
    pub fn image(&self) -> &'a Image {
        self.image
    }

    #[inline]
    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    #[inline]
    pub fn globals(&self) -> &[Value] {
        &self.globals
    }

    /// Frame pointer of the running function.
    #[inline]
    pub fn fp(&self) -> usize {
        self.fp
    }

    /// Offset of the next instruction.
    #[inline]
    pub fn ip(&self) -> usize {
        self.ip
    }

    /// Last source line announced by `LINE`.
    #[inline]
    pub fn line(&self) -> Option<i32> {
        self.line
    }

    /// Number of calls that have not returned yet.
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    pub fn into_runtime(self) -> R {
        self.runtime
    }

    /// Validates a jump, call or closure address.
    fn target(&self, addr: i32) -> Result<usize> {
        ensure!(
            addr >= 0 && (addr as usize) < self.image.code().len(),
            "address 0x{:08x} is outside the code ({} bytes)",
            addr,
            self.image.code().len()
        );
        Ok(addr as usize)
    }
}

/// Converts an instruction count operand.
fn count(n: i32) -> Result<usize> {
    ensure!(n >= 0, "negative count {}", n);
    Ok(n as usize)
}
