use anyhow::{Context, Result, bail};

use super::value::Value;

/// Fixed-capacity operand/frame stack.
///
/// Words grow toward lower indices: `bottom()` is fixed at the capacity and
/// `top()` is the index of the most recently pushed word, so the live words
/// are `top()..bottom()`. Every out-of-bounds request is an error; nothing is
/// clamped or resized.
#[derive(Debug, Clone)]
pub struct Stack {
    words: Vec<Value>,
    top: usize,
}

/// Allocates `len` words set to scalar zero, failing instead of aborting when
/// the allocator refuses.
pub(crate) fn zeroed_words(len: usize, what: &str) -> Result<Vec<Value>> {
    let mut words = Vec::new();
    words
        .try_reserve_exact(len)
        .with_context(|| format!("cannot allocate {} {}", len, what))?;
    words.resize(len, Value::UNIT);
    Ok(words)
}

impl Stack {
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self {
            words: zeroed_words(capacity, "stack words")?,
            top: capacity,
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.words.len()
    }

    #[inline]
    pub fn bottom(&self) -> usize {
        self.words.len()
    }

    #[inline]
    pub fn top(&self) -> usize {
        self.top
    }

    /// Number of live words.
    #[inline]
    pub fn size(&self) -> usize {
        self.bottom() - self.top
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn push(&mut self, value: Value) -> Result<()> {
        if self.top == 0 {
            bail!("STACK: push - not enough empty space");
        }
        self.top -= 1;
        self.words[self.top] = value;
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Value> {
        if self.is_empty() {
            bail!("STACK: pop - stack is empty");
        }
        let value = self.words[self.top];
        self.top += 1;
        Ok(value)
    }

    /// Word at depth `n` (0 is the top) without removing it.
    pub fn peek(&self, n: usize) -> Result<Value> {
        if n >= self.size() {
            bail!("STACK: peek - index {} is too large for {} live words", n, self.size());
        }
        Ok(self.words[self.top + n])
    }

    pub fn drop(&mut self, n: usize) -> Result<()> {
        if n > self.size() {
            bail!("STACK: drop - cannot drop {} of {} live words", n, self.size());
        }
        self.top += n;
        Ok(())
    }

    /// Allocates `n` words below the top, initialized to scalar zero.
    pub fn reserve(&mut self, n: usize) -> Result<()> {
        if n > self.top {
            bail!("STACK: reserve - not enough empty space for {} words", n);
        }
        let new_top = self.top - n;
        self.words[new_top..self.top].fill(Value::UNIT);
        self.top = new_top;
        Ok(())
    }

    /// Reverses the order of the top `n` words.
    pub fn reverse(&mut self, n: usize) -> Result<()> {
        if n > self.size() {
            bail!("STACK: reverse - cannot reverse {} of {} live words", n, self.size());
        }
        self.words[self.top..self.top + n].reverse();
        Ok(())
    }

    /// Top `n` words, lowest index (the current top) first.
    pub fn window(&self, n: usize) -> Result<&[Value]> {
        if n > self.size() {
            bail!("STACK: window - cannot view {} of {} live words", n, self.size());
        }
        Ok(&self.words[self.top..self.top + n])
    }

    /// Discards every word above `top`. Only shrinking is allowed.
    pub fn set_top(&mut self, top: usize) -> Result<()> {
        if top < self.top || top > self.bottom() {
            bail!(
                "STACK: set_top - {} is outside the live range {}..{}",
                top,
                self.top,
                self.bottom()
            );
        }
        self.top = top;
        Ok(())
    }

    /// Live word at absolute index `addr`.
    pub fn get(&self, addr: usize) -> Result<Value> {
        if addr < self.top || addr >= self.bottom() {
            bail!("STACK: read of {} outside the live range {}..{}", addr, self.top, self.bottom());
        }
        Ok(self.words[addr])
    }

    pub fn set(&mut self, addr: usize, value: Value) -> Result<()> {
        if addr < self.top || addr >= self.bottom() {
            bail!("STACK: write of {} outside the live range {}..{}", addr, self.top, self.bottom());
        }
        self.words[addr] = value;
        Ok(())
    }

    /// Live words from the top down to the bottom.
    pub fn live(&self) -> &[Value] {
        &self.words[self.top..]
    }
}
