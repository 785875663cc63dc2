use std::collections::VecDeque;
use std::io::{BufRead, Write};

use anyhow::{Context, Result, bail};

/// Integer console behind `Lread` and `Lwrite`.
///
/// Input is consumed one whitespace-separated token at a time, so several
/// numbers may share a line.
#[derive(Debug)]
pub struct Console<I, O> {
    input: I,
    output: O,
    pending: VecDeque<String>,
}

impl<I: BufRead, O: Write> Console<I, O> {
    pub fn new(input: I, output: O) -> Self {
        Self {
            input,
            output,
            pending: VecDeque::new(),
        }
    }

    /// Prints the `> ` prompt and reads the next integer.
    pub fn read_int(&mut self) -> Result<i32> {
        self.output.write_all(b"> ").context("Lread: cannot write prompt")?;
        self.output.flush().context("Lread: cannot flush output")?;
        let token = self.next_token()?;
        token
            .parse::<i32>()
            .with_context(|| format!("Lread: expected an integer, found '{token}'"))
    }

    pub fn write_int(&mut self, n: i32) -> Result<()> {
        writeln!(self.output, "{n}").context("Lwrite: cannot write output")?;
        self.output.flush().context("Lwrite: cannot flush output")
    }

    fn next_token(&mut self) -> Result<String> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Ok(token);
            }
            let mut line = String::new();
            let read = self.input.read_line(&mut line).context("Lread: cannot read input")?;
            if read == 0 {
                bail!("Lread: unexpected end of input");
            }
            self.pending.extend(line.split_whitespace().map(str::to_string));
        }
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn into_output(self) -> O {
        self.output
    }
}
