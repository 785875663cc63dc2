use std::fmt;

use anyhow::{Result, bail, ensure};

/// Arithmetic, relational and logical operators of `BINOP`, numbered by their low nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add = 1,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinOp {
    pub const ALL: [BinOp; 13] = [
        BinOp::Add,
        BinOp::Sub,
        BinOp::Mul,
        BinOp::Div,
        BinOp::Mod,
        BinOp::Lt,
        BinOp::Le,
        BinOp::Gt,
        BinOp::Ge,
        BinOp::Eq,
        BinOp::Ne,
        BinOp::And,
        BinOp::Or,
    ];

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code).checked_sub(1)?).copied()
    }

    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::And => "&&",
            BinOp::Or => "!!",
        }
    }
}

/// Storage class of a variable reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocClass {
    Global = 0,
    Local = 1,
    Arg = 2,
    /// Captured by the closure running in the current frame.
    Bound = 3,
}

impl LocClass {
    pub fn from_code(code: u8) -> Result<Self> {
        Ok(match code {
            0 => LocClass::Global,
            1 => LocClass::Local,
            2 => LocClass::Arg,
            3 => LocClass::Bound,
            other => bail!("invalid location class {}", other),
        })
    }

    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn letter(self) -> char {
        match self {
            LocClass::Global => 'G',
            LocClass::Local => 'L',
            LocClass::Arg => 'A',
            LocClass::Bound => 'C',
        }
    }
}

/// A `(class, index)` operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Loc {
    pub class: LocClass,
    pub index: i32,
}

impl Loc {
    pub const fn global(index: i32) -> Self {
        Loc {
            class: LocClass::Global,
            index,
        }
    }

    pub const fn local(index: i32) -> Self {
        Loc {
            class: LocClass::Local,
            index,
        }
    }

    pub const fn arg(index: i32) -> Self {
        Loc {
            class: LocClass::Arg,
            index,
        }
    }

    pub const fn bound(index: i32) -> Self {
        Loc {
            class: LocClass::Bound,
            index,
        }
    }
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.class.letter(), self.index)
    }
}

/// Pattern tests of the `PATT` family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PattKind {
    /// Pops two operands and compares them as strings.
    StrEq = 0,
    IsString,
    IsArray,
    IsSexp,
    IsBoxed,
    IsUnboxed,
    IsClosure,
}

impl PattKind {
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => PattKind::StrEq,
            1 => PattKind::IsString,
            2 => PattKind::IsArray,
            3 => PattKind::IsSexp,
            4 => PattKind::IsBoxed,
            5 => PattKind::IsUnboxed,
            6 => PattKind::IsClosure,
            _ => return None,
        })
    }

    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn mnemonic(self) -> &'static str {
        match self {
            PattKind::StrEq => "=str",
            PattKind::IsString => "#string",
            PattKind::IsArray => "#array",
            PattKind::IsSexp => "#sexp",
            PattKind::IsBoxed => "#ref",
            PattKind::IsUnboxed => "#val",
            PattKind::IsClosure => "#fun",
        }
    }
}

/// One decoded instruction. Integer operands are kept exactly as stored in the
/// file; the interpreter validates counts and addresses when it executes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Binop(BinOp),
    Const(i32),
    /// String table offset.
    String(i32),
    Sexp { tag: i32, arity: i32 },
    Sti,
    Sta,
    Jmp(i32),
    End,
    Ret,
    Drop,
    Dup,
    Swap,
    Elem,
    Ld(Loc),
    Lda(Loc),
    St(Loc),
    CJmpZ(i32),
    CJmpNz(i32),
    Begin { argc: i32, nlocals: i32 },
    CBegin { argc: i32, nlocals: i32 },
    Closure { addr: i32, captures: Vec<Loc> },
    CallC { argc: i32 },
    Call { addr: i32, argc: i32 },
    Tag { tag: i32, arity: i32 },
    Array(i32),
    Fail { line: i32, col: i32 },
    Line(i32),
    Patt(PattKind),
    Lread,
    Lwrite,
    Llength,
    Lstring,
    Barray(i32),
    Stop,
}

/// Bounded reader over the code section. Every read is checked, so a
/// truncated operand is reported instead of running past the code.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    code: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(code: &'a [u8], pos: usize) -> Self {
        Self { code, pos }
    }

    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Bytes left between the cursor and the end of code.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.code.len().saturating_sub(self.pos)
    }

    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.code.len()
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        if self.pos >= self.code.len() {
            bail!("unexpected end of code while reading a byte at 0x{:08x}", self.pos);
        }
        let value = self.code[self.pos];
        self.pos += 1;
        Ok(value)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        if self.pos + 4 > self.code.len() {
            bail!("unexpected end of code while reading an int at 0x{:08x}", self.pos);
        }
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.code[self.pos..self.pos + 4]);
        self.pos += 4;
        Ok(i32::from_le_bytes(buf))
    }

    fn read_loc(&mut self, class: u8) -> Result<Loc> {
        let class = LocClass::from_code(class)?;
        let index = self.read_i32()?;
        Ok(Loc { class, index })
    }
}

impl Instruction {
    /// Decodes the instruction at the cursor and leaves the cursor on the next one.
    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Instruction> {
        let at = cursor.pos();
        let byte = cursor.read_u8()?;
        let (hi, lo) = (byte >> 4, byte & 0x0F);
        let invalid = || anyhow::anyhow!("invalid opcode {}-{} at 0x{:08x}", hi, lo, at);
        let instr = match hi {
            0 => Instruction::Binop(BinOp::from_code(lo).ok_or_else(invalid)?),
            1 => match lo {
                0 => Instruction::Const(cursor.read_i32()?),
                1 => Instruction::String(cursor.read_i32()?),
                2 => Instruction::Sexp {
                    tag: cursor.read_i32()?,
                    arity: cursor.read_i32()?,
                },
                3 => Instruction::Sti,
                4 => Instruction::Sta,
                5 => Instruction::Jmp(cursor.read_i32()?),
                6 => Instruction::End,
                7 => Instruction::Ret,
                8 => Instruction::Drop,
                9 => Instruction::Dup,
                10 => Instruction::Swap,
                11 => Instruction::Elem,
                _ => return Err(invalid()),
            },
            2 => Instruction::Ld(cursor.read_loc(lo)?),
            3 => Instruction::Lda(cursor.read_loc(lo)?),
            4 => Instruction::St(cursor.read_loc(lo)?),
            5 => match lo {
                0 => Instruction::CJmpZ(cursor.read_i32()?),
                1 => Instruction::CJmpNz(cursor.read_i32()?),
                2 => Instruction::Begin {
                    argc: cursor.read_i32()?,
                    nlocals: cursor.read_i32()?,
                },
                3 => Instruction::CBegin {
                    argc: cursor.read_i32()?,
                    nlocals: cursor.read_i32()?,
                },
                4 => {
                    let addr = cursor.read_i32()?;
                    let n = cursor.read_i32()?;
                    ensure!(n >= 0, "negative capture count {} at 0x{:08x}", n, at);
                    // each capture is a class byte and an int index
                    ensure!(
                        (n as usize).saturating_mul(5) <= cursor.remaining(),
                        "capture count {} overruns the code at 0x{:08x}",
                        n,
                        at
                    );
                    let mut captures = Vec::with_capacity(n as usize);
                    for _ in 0..n {
                        let class = cursor.read_u8()?;
                        captures.push(cursor.read_loc(class)?);
                    }
                    Instruction::Closure { addr, captures }
                }
                5 => Instruction::CallC {
                    argc: cursor.read_i32()?,
                },
                6 => Instruction::Call {
                    addr: cursor.read_i32()?,
                    argc: cursor.read_i32()?,
                },
                7 => Instruction::Tag {
                    tag: cursor.read_i32()?,
                    arity: cursor.read_i32()?,
                },
                8 => Instruction::Array(cursor.read_i32()?),
                9 => Instruction::Fail {
                    line: cursor.read_i32()?,
                    col: cursor.read_i32()?,
                },
                10 => Instruction::Line(cursor.read_i32()?),
                _ => return Err(invalid()),
            },
            6 => Instruction::Patt(PattKind::from_code(lo).ok_or_else(invalid)?),
            7 => match lo {
                0 => Instruction::Lread,
                1 => Instruction::Lwrite,
                2 => Instruction::Llength,
                3 => Instruction::Lstring,
                4 => Instruction::Barray(cursor.read_i32()?),
                _ => return Err(invalid()),
            },
            15 => Instruction::Stop,
            _ => return Err(invalid()),
        };
        Ok(instr)
    }

    /// Appends the binary form of the instruction.
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Instruction::Binop(op) => out.push(op.code()),
            Instruction::Const(v) => encode_op1(out, 0x10, *v),
            Instruction::String(s) => encode_op1(out, 0x11, *s),
            Instruction::Sexp { tag, arity } => encode_op2(out, 0x12, *tag, *arity),
            Instruction::Sti => out.push(0x13),
            Instruction::Sta => out.push(0x14),
            Instruction::Jmp(addr) => encode_op1(out, 0x15, *addr),
            Instruction::End => out.push(0x16),
            Instruction::Ret => out.push(0x17),
            Instruction::Drop => out.push(0x18),
            Instruction::Dup => out.push(0x19),
            Instruction::Swap => out.push(0x1A),
            Instruction::Elem => out.push(0x1B),
            Instruction::Ld(loc) => encode_op1(out, 0x20 | loc.class.code(), loc.index),
            Instruction::Lda(loc) => encode_op1(out, 0x30 | loc.class.code(), loc.index),
            Instruction::St(loc) => encode_op1(out, 0x40 | loc.class.code(), loc.index),
            Instruction::CJmpZ(addr) => encode_op1(out, 0x50, *addr),
            Instruction::CJmpNz(addr) => encode_op1(out, 0x51, *addr),
            Instruction::Begin { argc, nlocals } => encode_op2(out, 0x52, *argc, *nlocals),
            Instruction::CBegin { argc, nlocals } => encode_op2(out, 0x53, *argc, *nlocals),
            Instruction::Closure { addr, captures } => {
                encode_op2(out, 0x54, *addr, captures.len() as i32);
                for loc in captures {
                    out.push(loc.class.code());
                    write_i32(out, loc.index);
                }
            }
            Instruction::CallC { argc } => encode_op1(out, 0x55, *argc),
            Instruction::Call { addr, argc } => encode_op2(out, 0x56, *addr, *argc),
            Instruction::Tag { tag, arity } => encode_op2(out, 0x57, *tag, *arity),
            Instruction::Array(n) => encode_op1(out, 0x58, *n),
            Instruction::Fail { line, col } => encode_op2(out, 0x59, *line, *col),
            Instruction::Line(n) => encode_op1(out, 0x5A, *n),
            Instruction::Patt(kind) => out.push(0x60 | kind.code()),
            Instruction::Lread => out.push(0x70),
            Instruction::Lwrite => out.push(0x71),
            Instruction::Llength => out.push(0x72),
            Instruction::Lstring => out.push(0x73),
            Instruction::Barray(n) => encode_op1(out, 0x74, *n),
            Instruction::Stop => out.push(0xFF),
        }
    }
}

fn encode_op1(out: &mut Vec<u8>, opcode: u8, a: i32) {
    out.push(opcode);
    write_i32(out, a);
}

fn encode_op2(out: &mut Vec<u8>, opcode: u8, a: i32, b: i32) {
    out.push(opcode);
    write_i32(out, a);
    write_i32(out, b);
}

fn write_i32(out: &mut Vec<u8>, value: i32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Emits a code section instruction by instruction.
///
/// Forward jumps are emitted with a placeholder target and fixed up with
/// [`CodeBuilder::patch_target`] once the destination offset is known.
#[derive(Debug, Clone, Default)]
pub struct CodeBuilder {
    code: Vec<u8>,
}

impl CodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset the next instruction will be emitted at.
    #[inline]
    pub fn here(&self) -> usize {
        self.code.len()
    }

    /// Emits `instr` and returns its offset.
    pub fn emit(&mut self, instr: Instruction) -> usize {
        let at = self.code.len();
        instr.encode(&mut self.code);
        at
    }

    /// Rewrites the address operand of the jump, call or closure emitted at `at`.
    pub fn patch_target(&mut self, at: usize, target: usize) -> Result<()> {
        let opcode = *self
            .code
            .get(at)
            .ok_or_else(|| anyhow::anyhow!("no instruction at 0x{:08x}", at))?;
        ensure!(
            matches!(opcode, 0x15 | 0x50 | 0x51 | 0x54 | 0x56),
            "instruction 0x{:02x} at 0x{:08x} has no address operand",
            opcode,
            at
        );
        let target = i32::try_from(target)?;
        self.code[at + 1..at + 5].copy_from_slice(&target.to_le_bytes());
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.code
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.code
    }
}
