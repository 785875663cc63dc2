//! Bytecode image loading and serialization.
//!
//! A compiled unit is one contiguous block: a header of little-endian `i32`
//! fields, the public-symbol table, the string table and finally the code.
//! Two header revisions exist; the later one adds the code size.

use std::borrow::Cow;
use std::path::Path;

use anyhow::{Context, Result, bail, ensure};
use rustc_hash::FxHashMap;

use super::bytecode::CodeBuilder;

/// Header revision of a bytecode file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderLayout {
    /// `stringtab_size, global_area_size, public_symbols_number`; code runs to end of file.
    Classic,
    /// `stringtab_size, global_area_size, bytecode_size, public_symbols_number`.
    Sized,
    /// Pick `Sized` when its sizes account for the whole file, `Classic` otherwise.
    #[default]
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicSymbol {
    /// String table offset of the symbol name.
    pub name: u32,
    /// Code offset the symbol points at.
    pub offset: u32,
}

/// Unpacked, read-only view of one compiled unit.
///
/// The globals area is only described here (`global_area_size`); the
/// interpreter allocates and owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    strings: Vec<u8>,
    publics: Vec<PublicSymbol>,
    code: Vec<u8>,
    global_area_size: usize,
}

impl Image {
    pub fn new(strings: Vec<u8>, publics: Vec<PublicSymbol>, code: Vec<u8>, global_area_size: usize) -> Self {
        Self {
            strings,
            publics,
            code,
            global_area_size,
        }
    }

    /// Reads and unpacks a bytecode file.
    pub fn load(path: impl AsRef<Path>) -> Result<Image> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).with_context(|| format!("failed to read '{}'", path.display()))?;
        Image::parse(&bytes).with_context(|| format!("failed to load bytecode from '{}'", path.display()))
    }

    pub fn parse(bytes: &[u8]) -> Result<Image> {
        Image::parse_with(bytes, HeaderLayout::Auto)
    }

    pub fn parse_with(bytes: &[u8], layout: HeaderLayout) -> Result<Image> {
        match layout {
            HeaderLayout::Classic => parse_classic(bytes),
            HeaderLayout::Sized => parse_sized(bytes),
            HeaderLayout::Auto => {
                if sized_header_fits(bytes) {
                    parse_sized(bytes)
                } else {
                    parse_classic(bytes)
                }
            }
        }
    }

    /// Serializes the image. `Auto` writes the sized layout.
    pub fn encode(&self, layout: HeaderLayout) -> Vec<u8> {
        let mut out = Vec::with_capacity(16 + self.publics.len() * 8 + self.strings.len() + self.code.len());
        write_len(&mut out, self.strings.len());
        write_len(&mut out, self.global_area_size);
        if layout != HeaderLayout::Classic {
            write_len(&mut out, self.code.len());
        }
        write_len(&mut out, self.publics.len());
        for sym in &self.publics {
            out.extend_from_slice(&(sym.name as i32).to_le_bytes());
            out.extend_from_slice(&(sym.offset as i32).to_le_bytes());
        }
        out.extend_from_slice(&self.strings);
        out.extend_from_slice(&self.code);
        out
    }

    #[inline]
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    #[inline]
    pub fn strings(&self) -> &[u8] {
        &self.strings
    }

    #[inline]
    pub fn global_area_size(&self) -> usize {
        self.global_area_size
    }

    #[inline]
    pub fn publics(&self) -> &[PublicSymbol] {
        &self.publics
    }

    /// Bytes of the NUL-terminated string starting at `offset` (terminator excluded).
    pub fn string_at(&self, offset: i32) -> Result<&[u8]> {
        ensure!(
            offset >= 0 && (offset as usize) < self.strings.len(),
            "string offset {} outside the string table ({} bytes)",
            offset,
            self.strings.len()
        );
        let tail = &self.strings[offset as usize..];
        let end = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| anyhow::anyhow!("string at offset {} is not NUL-terminated", offset))?;
        Ok(&tail[..end])
    }

    /// Lossy UTF-8 view of [`Image::string_at`] for diagnostics and listings.
    pub fn str_at(&self, offset: i32) -> Result<Cow<'_, str>> {
        self.string_at(offset).map(String::from_utf8_lossy)
    }

    pub fn public_name(&self, sym: &PublicSymbol) -> Result<Cow<'_, str>> {
        self.str_at(sym.name as i32)
    }

    /// Code offset of the public symbol called `name`.
    pub fn public_symbol(&self, name: &str) -> Option<usize> {
        self.publics
            .iter()
            .find(|sym| self.string_at(sym.name as i32).is_ok_and(|s| s == name.as_bytes()))
            .map(|sym| sym.offset as usize)
    }
}

fn header_field(bytes: &[u8], index: usize) -> Result<i32> {
    let at = index * 4;
    if at + 4 > bytes.len() {
        bail!("file too small for its header ({} bytes)", bytes.len());
    }
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[at..at + 4]);
    Ok(i32::from_le_bytes(buf))
}

fn size_field(bytes: &[u8], index: usize, name: &str) -> Result<usize> {
    let raw = header_field(bytes, index)?;
    ensure!(raw >= 0, "negative {} {}", name, raw);
    Ok(raw as usize)
}

fn sized_header_fits(bytes: &[u8]) -> bool {
    let fields = (0..4).map(|i| header_field(bytes, i)).collect::<Result<Vec<_>>>();
    let Ok(fields) = fields else {
        return false;
    };
    if fields.iter().any(|&f| f < 0) {
        return false;
    }
    let [strtab, _globals, code, publics] = [fields[0], fields[1], fields[2], fields[3]].map(|f| f as u64);
    16 + publics * 8 + strtab + code == bytes.len() as u64
}

fn parse_classic(bytes: &[u8]) -> Result<Image> {
    let strtab = size_field(bytes, 0, "string table size")?;
    let globals = size_field(bytes, 1, "global area size")?;
    let publics = size_field(bytes, 2, "public symbol count")?;
    let (publics, strings, rest) = split_tables(bytes, 12, publics, strtab)?;
    Ok(Image::new(strings, publics, rest.to_vec(), globals))
}

fn parse_sized(bytes: &[u8]) -> Result<Image> {
    let strtab = size_field(bytes, 0, "string table size")?;
    let globals = size_field(bytes, 1, "global area size")?;
    let code_size = size_field(bytes, 2, "bytecode size")?;
    let publics = size_field(bytes, 3, "public symbol count")?;
    let (publics, strings, rest) = split_tables(bytes, 16, publics, strtab)?;
    ensure!(
        rest.len() >= code_size,
        "code section truncated: header announces {} bytes, file holds {}",
        code_size,
        rest.len()
    );
    Ok(Image::new(strings, publics, rest[..code_size].to_vec(), globals))
}

fn split_tables(bytes: &[u8], header: usize, publics: usize, strtab: usize) -> Result<(Vec<PublicSymbol>, Vec<u8>, &[u8])> {
    let publics_end = publics
        .checked_mul(8)
        .and_then(|n| n.checked_add(header))
        .filter(|&end| end <= bytes.len())
        .ok_or_else(|| anyhow::anyhow!("public symbol table ({} entries) overruns the file", publics))?;
    let strings_end = publics_end
        .checked_add(strtab)
        .filter(|&end| end <= bytes.len())
        .ok_or_else(|| anyhow::anyhow!("string table ({} bytes) overruns the file", strtab))?;

    let symbols = bytes[header..publics_end]
        .chunks_exact(8)
        .map(|pair| {
            let name = i32::from_le_bytes([pair[0], pair[1], pair[2], pair[3]]);
            let offset = i32::from_le_bytes([pair[4], pair[5], pair[6], pair[7]]);
            ensure!(name >= 0 && offset >= 0, "malformed public symbol ({}, {})", name, offset);
            Ok(PublicSymbol {
                name: name as u32,
                offset: offset as u32,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((symbols, bytes[publics_end..strings_end].to_vec(), &bytes[strings_end..]))
}

fn write_len(out: &mut Vec<u8>, value: usize) {
    out.extend_from_slice(&(value as i32).to_le_bytes());
}

/// Assembles an [`Image`] from code, interned strings and public symbols.
#[derive(Debug, Default)]
pub struct ImageBuilder {
    strings: Vec<u8>,
    interned: FxHashMap<String, i32>,
    publics: Vec<PublicSymbol>,
    globals: usize,
}

impl ImageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `s` and returns its string table offset.
    pub fn string(&mut self, s: &str) -> i32 {
        if let Some(&offset) = self.interned.get(s) {
            return offset;
        }
        let offset = self.strings.len() as i32;
        self.strings.extend_from_slice(s.as_bytes());
        self.strings.push(0);
        self.interned.insert(s.to_string(), offset);
        offset
    }

    pub fn public(&mut self, name: &str, offset: usize) -> &mut Self {
        let name = self.string(name) as u32;
        self.publics.push(PublicSymbol {
            name,
            offset: offset as u32,
        });
        self
    }

    pub fn globals(&mut self, count: usize) -> &mut Self {
        self.globals = count;
        self
    }

    pub fn build(self, code: CodeBuilder) -> Image {
        Image::new(self.strings, self.publics, code.into_bytes(), self.globals)
    }
}
