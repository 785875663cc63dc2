use std::io::{self, Write};
use std::path::PathBuf;

use byterun_core::vm::{Image, disasm};
use clap::Parser;

#[cfg(test)]
mod dump_test;

#[derive(Debug, Parser)]
#[command(
    name = "byterun-dump",
    author,
    version,
    about = "Disassembles a bytecode file or reports instruction frequencies",
    long_about = None
)]
struct DumpArgs {
    /// Bytecode file to inspect
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Count identical instructions instead of listing them
    #[arg(long)]
    stats: bool,

    /// Print the frequency report as JSON
    #[arg(long, requires = "stats")]
    json: bool,

    /// List public symbols and their code offsets
    #[arg(long, conflicts_with = "stats")]
    publics: bool,
}

fn dump(args: &DumpArgs, out: &mut impl Write) -> anyhow::Result<()> {
    let image = Image::load(&args.file)?;
    if args.publics {
        for sym in image.publics() {
            writeln!(out, "{}\t0x{:08x}", image.public_name(sym)?, sym.offset)?;
        }
        return Ok(());
    }
    if !args.stats {
        for line in disasm::disassemble(&image)? {
            writeln!(out, "{line}")?;
        }
        return Ok(());
    }

    let entries = disasm::frequency(&image)?;
    if args.json {
        writeln!(out, "{}", disasm::frequency_json(&entries)?)?;
    } else {
        for line in disasm::frequency_report(&entries) {
            writeln!(out, "{line}")?;
        }
    }
    Ok(())
}

fn main() {
    let args = DumpArgs::parse();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if let Err(err) = dump(&args, &mut out) {
        eprintln!("*** FAILURE: {err:#}");
        std::process::exit(255);
    }
}
