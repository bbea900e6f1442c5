// ABOUTME: CLI entry point for the Cirno interpreter

use cirno::builtins;
use cirno::config;
use cirno::interp::Interp;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

/// Cirno script interpreter
#[derive(Parser, Debug)]
#[command(name = "cirno")]
#[command(version = config::VERSION)]
#[command(about = "Run a Cirno script")]
struct CliArgs {
    /// Script file to execute
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Print a heap report after the run
    #[arg(short = 'D', long = "debug-heap")]
    debug_heap: bool,
}

fn main() -> ExitCode {
    let args = CliArgs::parse();
    let mut interp = Interp::new();

    if let Err(e) = builtins::install(&mut interp) {
        eprintln!("cirno: failed to load prelude: {}", e);
        return ExitCode::FAILURE;
    }

    let status = match interp.load(&args.file) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    };

    if args.debug_heap {
        let stats = interp.heap_stats();
        eprintln!(
            "heap: {} live blocks, {} bytes",
            stats.live_blocks, stats.live_bytes
        );
    }

    status
}
