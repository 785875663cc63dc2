//! Bytecode listing and instruction frequency analysis.

use std::fmt::Write as _;

use anyhow::{Context, Result};
use rustc_hash::FxHashMap;
use serde::Serialize;

use super::bytecode::{Cursor, Instruction};
use super::image::Image;

/// One decoded instruction together with its place in the code section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub offset: usize,
    pub len: usize,
    pub instr: Instruction,
}

impl Decoded {
    pub fn bytes<'i>(&self, image: &'i Image) -> &'i [u8] {
        &image.code()[self.offset..self.offset + self.len]
    }
}

/// Decodes the code section in order, stopping after the first `STOP` or at
/// the end of the code.
pub fn decode_all(image: &Image) -> Result<Vec<Decoded>> {
    let code = image.code();
    let mut cursor = Cursor::new(code, 0);
    let mut out = Vec::new();
    while !cursor.is_at_end() {
        let offset = cursor.pos();
        let instr = Instruction::decode(&mut cursor).with_context(|| format!("at offset 0x{offset:08x}"))?;
        let stop = instr == Instruction::Stop;
        out.push(Decoded {
            offset,
            len: cursor.pos() - offset,
            instr,
        });
        if stop {
            break;
        }
    }
    Ok(out)
}

/// Human-readable form of `instr`; string operands are looked up in `image`.
pub fn mnemonic(instr: &Instruction, image: &Image) -> Result<String> {
    Ok(match instr {
        Instruction::Binop(op) => format!("BINOP\t{}", op.symbol()),
        Instruction::Const(n) => format!("CONST\t{n}"),
        Instruction::String(s) => format!("STRING\t{}", image.str_at(*s)?),
        Instruction::Sexp { tag, arity } => format!("SEXP\t{} {arity}", image.str_at(*tag)?),
        Instruction::Sti => "STI".to_string(),
        Instruction::Sta => "STA".to_string(),
        Instruction::Jmp(addr) => format!("JMP\t0x{addr:08x}"),
        Instruction::End => "END".to_string(),
        Instruction::Ret => "RET".to_string(),
        Instruction::Drop => "DROP".to_string(),
        Instruction::Dup => "DUP".to_string(),
        Instruction::Swap => "SWAP".to_string(),
        Instruction::Elem => "ELEM".to_string(),
        Instruction::Ld(loc) => format!("LD\t{loc}"),
        Instruction::Lda(loc) => format!("LDA\t{loc}"),
        Instruction::St(loc) => format!("ST\t{loc}"),
        Instruction::CJmpZ(addr) => format!("CJMPz\t0x{addr:08x}"),
        Instruction::CJmpNz(addr) => format!("CJMPnz\t0x{addr:08x}"),
        Instruction::Begin { argc, nlocals } => format!("BEGIN\t{argc} {nlocals}"),
        Instruction::CBegin { argc, nlocals } => format!("CBEGIN\t{argc} {nlocals}"),
        Instruction::Closure { addr, captures } => {
            let mut s = format!("CLOSURE\t0x{addr:08x}");
            for loc in captures {
                let _ = write!(s, " {loc}");
            }
            s
        }
        Instruction::CallC { argc } => format!("CALLC\t{argc}"),
        Instruction::Call { addr, argc } => format!("CALL\t0x{addr:08x} {argc}"),
        Instruction::Tag { tag, arity } => format!("TAG\t{} {arity}", image.str_at(*tag)?),
        Instruction::Array(n) => format!("ARRAY\t{n}"),
        Instruction::Fail { line, col } => format!("FAIL\t{line} {col}"),
        Instruction::Line(n) => format!("LINE\t{n}"),
        Instruction::Patt(kind) => format!("PATT\t{}", kind.mnemonic()),
        Instruction::Lread => "CALL\tLread".to_string(),
        Instruction::Lwrite => "CALL\tLwrite".to_string(),
        Instruction::Llength => "CALL\tLlength".to_string(),
        Instruction::Lstring => "CALL\tLstring".to_string(),
        Instruction::Barray(n) => format!("CALL\tBarray\t{n}"),
        Instruction::Stop => "<end>".to_string(),
    })
}

/// Listing lines of the form `0x{offset:08x}:\t{mnemonic}`.
pub fn disassemble(image: &Image) -> Result<Vec<String>> {
    decode_all(image)?
        .iter()
        .map(|d| Ok(format!("0x{:08x}:\t{}", d.offset, mnemonic(&d.instr, image)?)))
        .collect()
}

/// How often one exact instruction (opcode plus operands) occurs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatEntry {
    pub count: usize,
    pub mnemonic: String,
    /// Offset of the first occurrence.
    pub offset: usize,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

/// Counts identical instructions and orders them by descending count, then by
/// their encoded bytes.
///
/// Bytes compare as unsigned, so the order does not depend on the platform's
/// `char` signedness: an operand byte of `0x80` sorts after `0x01`.
pub fn frequency(image: &Image) -> Result<Vec<StatEntry>> {
    let decoded = decode_all(image)?;
    let mut counter: FxHashMap<&[u8], (usize, &Decoded)> = FxHashMap::default();
    for d in &decoded {
        counter.entry(d.bytes(image)).or_insert((0, d)).0 += 1;
    }

    let mut entries = counter
        .into_iter()
        .map(|(bytes, (count, first))| {
            Ok(StatEntry {
                count,
                mnemonic: mnemonic(&first.instr, image)?,
                offset: first.offset,
                bytes: bytes.to_vec(),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.bytes.cmp(&b.bytes)));
    Ok(entries)
}

/// Report lines of the form `{count}: {mnemonic}`.
pub fn frequency_report(entries: &[StatEntry]) -> Vec<String> {
    entries.iter().map(|e| format!("{}: {}", e.count, e.mnemonic)).collect()
}

/// Pretty-printed JSON array of the frequency entries.
pub fn frequency_json(entries: &[StatEntry]) -> Result<String> {
    serde_json::to_string_pretty(entries).context("failed to serialize instruction statistics")
}
