use std::path::{Path, PathBuf};
use std::sync::Once;

use anyhow::{Context, ensure};
use byterun_core::vm::{Image, Interpreter, VmOptions};
use byterun_runtime::NativeRuntime;
use clap::Parser;


static TRACE_INIT: Once = Once::new();
const DEFAULT_TRACE_FILTER: &str = "byterun::vm=info,byterun::vm::call=debug,byterun::runtime=debug,byterun=info";

/// Exit status for every fatal interpreter condition, load errors included.
const FAILURE_EXIT_CODE: i32 = 255;

#[derive(Debug, Parser)]
#[command(
    name = "byterun",
    author,
    version,
    about = "Runs a compiled SM bytecode file",
    long_about = None,
    after_help = "Environment: BYTERUN_TRACE enables tracing, BYTERUN_STACK_SIZE sets the stack size in words"
)]
struct CliArgs {
    /// Bytecode file to execute
    #[arg(value_name = "FILE")]
    file: PathBuf,
}

fn env_toggle_enabled(raw: &str) -> bool {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return false;
    }
    !(trimmed.eq_ignore_ascii_case("0") || trimmed.eq_ignore_ascii_case("false") || trimmed.eq_ignore_ascii_case("off"))
}

fn filter_expr_from(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("1")
        || trimmed.eq_ignore_ascii_case("true")
        || trimmed.eq_ignore_ascii_case("on")
    {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn maybe_init_tracing() {
    let raw = match std::env::var("BYTERUN_TRACE") {
        Ok(value) => value,
        Err(_) => return,
    };

    if !env_toggle_enabled(&raw) {
        return;
    }

    TRACE_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        use tracing_subscriber::fmt;

        let builder = fmt().with_writer(std::io::stderr);
        let builder = match filter_expr_from(&raw).and_then(|expr| EnvFilter::try_new(expr).ok()) {
            Some(filter) => builder.with_env_filter(filter),
            None => builder.with_env_filter(DEFAULT_TRACE_FILTER),
        };

        let _ = builder.try_init();
    });
}

fn parse_stack_size(raw: &str) -> anyhow::Result<usize> {
    let words = raw
        .trim()
        .parse::<usize>()
        .with_context(|| format!("invalid BYTERUN_STACK_SIZE '{}'", raw))?;
    ensure!(words > 0, "BYTERUN_STACK_SIZE must be positive");
    Ok(words)
}

fn vm_options_from_env() -> anyhow::Result<VmOptions> {
    let mut options = VmOptions::default();
    if let Ok(raw) = std::env::var("BYTERUN_STACK_SIZE") {
        options.stack_capacity = parse_stack_size(&raw)?;
    }
    Ok(options)
}

fn run(path: &Path) -> anyhow::Result<()> {
    let image = Image::load(path)?;
    tracing::debug!(
        target: "byterun",
        path = %path.display(),
        code = image.code().len(),
        publics = image.publics().len(),
        "bytecode loaded"
    );
    let options = vm_options_from_env()?;
    let mut vm = Interpreter::with_options(&image, NativeRuntime::stdio(), options)?;
    vm.eval()
}

fn main() {
    maybe_init_tracing();

    let CliArgs { file } = CliArgs::parse();
    if let Err(err) = run(&file) {
        eprintln!("*** FAILURE: {err:#}");
        std::process::exit(FAILURE_EXIT_CODE);
    }
}
