//! Constructor name hashing.
//!
//! A tag packs up to five characters of [`TAG_CHARS`] at six bits each, the
//! first character in the highest bits. Longer names are truncated. A name
//! that does not survive the round trip through [`de_hash`] (for example one
//! starting with `_`, whose code is zero) is rejected.

use anyhow::{Result, bail};

pub const TAG_CHARS: &[u8; 64] = b"_abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789'";

/// Number of significant characters in a tag.
pub const TAG_LEN: usize = 5;

pub fn tag_hash(name: &[u8]) -> Result<i32> {
    let mut hash = 0i32;
    for &c in name.iter().take(TAG_LEN) {
        let Some(code) = TAG_CHARS.iter().position(|&t| t == c) else {
            bail!("tagHash: character not found: {}", c.escape_ascii());
        };
        hash = (hash << 6) | code as i32;
    }
    let prefix = &name[..name.len().min(TAG_LEN)];
    let back = de_hash(hash);
    if back.as_bytes() != prefix {
        bail!("tagHash: {} <-> {}", String::from_utf8_lossy(prefix), back);
    }
    Ok(hash)
}

/// Name a tag hash decodes to.
pub fn de_hash(mut hash: i32) -> String {
    let mut chars = Vec::with_capacity(TAG_LEN);
    while hash != 0 && chars.len() < TAG_LEN {
        chars.push(TAG_CHARS[(hash & 0x3F) as usize]);
        hash >>= 6;
    }
    chars.reverse();
    String::from_utf8_lossy(&chars).into_owned()
}
