use anyhow::{Context, Result, bail};
use tracing::{info, trace};

use super::{Flow, Interpreter, count, math};
use crate::rt::Runtime;
use crate::vm::bytecode::{Cursor, Instruction, PattKind};
use crate::vm::value::Value;

impl<R: Runtime> Interpreter<'_, R> {
    /// Runs the image from the current instruction until `STOP` or until the
    /// bottom frame returns. Any fault aborts with an error that names the
    /// offending offset.
    pub fn eval(&mut self) -> Result<()> {
        let image = self.image;
        let code = image.code();
        loop {
            let at = self.ip;
            if at >= code.len() {
                bail!("ran past the end of the code at 0x{:08x}", at);
            }
            let mut cursor = Cursor::new(code, at);
            let instr = Instruction::decode(&mut cursor).with_context(|| self.position(at))?;
            self.ip = cursor.pos();
            trace!(target: "byterun::vm::dispatch", offset = at, instr = ?instr);

            match self.step(instr).with_context(|| self.position(at))? {
                Flow::Continue => {}
                Flow::Halt => {
                    info!(target: "byterun::vm", offset = at, stack = self.stack.size(), "halted");
                    return Ok(());
                }
            }
        }
    }

    fn position(&self, at: usize) -> String {
        match self.line {
            Some(line) => format!("at offset 0x{at:08x} (line {line})"),
            None => format!("at offset 0x{at:08x}"),
        }
    }

    fn step(&mut self, instr: Instruction) -> Result<Flow> {
        match instr {
            Instruction::Binop(op) => {
                let y = self.stack.pop()?;
                let x = self.stack.pop()?;
                self.stack.push(math::binop(op, x, y)?)?;
            }
            Instruction::Const(n) => self.stack.push(Value::int(n))?,
            Instruction::String(offset) => {
                let bytes = self.image.string_at(offset)?;
                let s = self.runtime.string(bytes)?;
                self.stack.push(Value::Ref(s))?;
            }
            Instruction::Sexp { tag, arity } => {
                let n = count(arity)?;
                let hash = self.runtime.tag_hash(self.image.string_at(tag)?)?;
                self.stack.reverse(n)?;
                let sexp = self.runtime.sexp(hash, self.stack.window(n)?)?;
                self.stack.drop(n)?;
                self.stack.push(Value::Ref(sexp))?;
            }
            Instruction::Sti => {
                let value = self.stack.pop()?;
                let target = self.stack.pop()?;
                self.store_indirect(target, value)?;
                self.stack.push(value)?;
            }
            Instruction::Sta => {
                let value = self.stack.pop()?;
                let index = self.stack.pop()?;
                match index {
                    Value::Scalar(i) => {
                        let container = self.stack.pop()?;
                        self.runtime.store_elem(container, i, value)?;
                    }
                    target => self.store_indirect(target, value)?,
                }
                self.stack.push(value)?;
            }
            Instruction::Jmp(addr) => self.ip = self.target(addr)?,
            Instruction::End => return self.leave(),
            Instruction::Ret => bail!("unsupported instruction RET"),
            Instruction::Drop => {
                self.stack.pop()?;
            }
            Instruction::Dup => {
                let top = self.stack.peek(0)?;
                self.stack.push(top)?;
            }
            Instruction::Swap => {
                let y = self.stack.pop()?;
                let x = self.stack.pop()?;
                self.stack.push(y)?;
                self.stack.push(x)?;
            }
            Instruction::Elem => {
                let index = self.stack.pop()?.as_int().context("element index")?;
                let container = self.stack.pop()?;
                let value = self.runtime.elem(container, index)?;
                self.stack.push(value)?;
            }
            Instruction::Ld(loc) => {
                let value = self.load(loc)?;
                self.stack.push(value)?;
            }
            Instruction::Lda(loc) => {
                let slot = self.address(loc)?;
                self.stack.push(Value::Slot(slot))?;
            }
            Instruction::St(loc) => {
                let value = self.stack.peek(0)?;
                self.store(loc, value)?;
            }
            Instruction::CJmpZ(addr) => {
                if self.stack.pop()?.as_int().context("branch condition")? == 0 {
                    self.ip = self.target(addr)?;
                }
            }
            Instruction::CJmpNz(addr) => {
                if self.stack.pop()?.as_int().context("branch condition")? != 0 {
                    self.ip = self.target(addr)?;
                }
            }
            Instruction::Begin { nlocals, .. } | Instruction::CBegin { nlocals, .. } => {
                self.enter(count(nlocals)?)?;
            }
            Instruction::Closure { addr, captures } => {
                let entry = self.target(addr)?;
                let values = captures
                    .iter()
                    .map(|&loc| self.load(loc))
                    .collect::<Result<Vec<_>>>()?;
                let closure = self.runtime.closure(entry, &values)?;
                self.stack.push(Value::Ref(closure))?;
            }
            Instruction::CallC { argc } => {
                let n = count(argc)?;
                let closure = self.stack.peek(n)?.as_heap().context("CALLC target is not a closure")?;
                let entry = self.runtime.closure_entry(closure)?;
                let entry = self.target(i32::try_from(entry)?)?;
                self.call(entry, n, n + 1)?;
            }
            Instruction::Call { addr, argc } => {
                let n = count(argc)?;
                let entry = self.target(addr)?;
                self.call(entry, n, n)?;
            }
            Instruction::Tag { tag, arity } => {
                let hash = self.runtime.tag_hash(self.image.string_at(tag)?)?;
                let value = self.stack.pop()?;
                let matched = self.runtime.tag_matches(value, hash, count(arity)?);
                self.stack.push(Value::bool(matched))?;
            }
            Instruction::Array(len) => {
                let value = self.stack.pop()?;
                let matched = self.runtime.array_matches(value, count(len)?);
                self.stack.push(Value::bool(matched))?;
            }
            Instruction::Fail { line, col } => bail!("matching value failure at {}:{}", line, col),
            Instruction::Line(line) => self.line = Some(line),
            Instruction::Patt(kind) => {
                let matched = match kind {
                    PattKind::StrEq => {
                        let y = self.stack.pop()?;
                        let x = self.stack.pop()?;
                        self.runtime.string_eq(x, y)?
                    }
                    kind => {
                        let v = self.stack.pop()?;
                        match kind {
                            PattKind::IsString => self.runtime.is_string(v),
                            PattKind::IsArray => self.runtime.is_array(v),
                            PattKind::IsSexp => self.runtime.is_sexp(v),
                            PattKind::IsBoxed => self.runtime.is_boxed(v),
                            PattKind::IsUnboxed => self.runtime.is_unboxed(v),
                            PattKind::IsClosure => self.runtime.is_closure(v),
                            PattKind::StrEq => unreachable!("string equality pops two operands"),
                        }
                    }
                };
                self.stack.push(Value::bool(matched))?;
            }
            Instruction::Lread => {
                let n = self.runtime.read_int()?;
                self.stack.push(Value::int(n))?;
            }
            Instruction::Lwrite => {
                let n = self.stack.pop()?.as_int().context("Lwrite argument")?;
                self.runtime.write_int(n)?;
                self.stack.push(Value::UNIT)?;
            }
            Instruction::Llength => {
                let v = self.stack.pop()?;
                let len = self.runtime.length(v)?;
                self.stack.push(Value::int(len))?;
            }
            Instruction::Lstring => {
                let v = self.stack.pop()?;
                let s = self.runtime.stringify(v)?;
                self.stack.push(Value::Ref(s))?;
            }
            Instruction::Barray(len) => {
                let n = count(len)?;
                self.stack.reverse(n)?;
                let array = self.runtime.array(self.stack.window(n)?)?;
                self.stack.drop(n)?;
                self.stack.push(Value::Ref(array))?;
            }
            Instruction::Stop => return Ok(Flow::Halt),
        }
        Ok(Flow::Continue)
    }
}
