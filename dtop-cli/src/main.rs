//! `dtop` - CPU, RAM and GPU status of remote hosts over SSH
//!
//! Connects to every host given with `--hosts`, runs `vmstat`, `free` and
//! `nvidia-smi` there, and prints one line per host in the order given.

mod cli;
mod commands;
mod error;

use clap::Parser;
use cli::Cli;
use dtop_core::tracing::{TracingConfig, TracingLevel, TracingOutput, init_tracing};

fn main() {
    let cli = Cli::parse();

    let mut tracing_config =
        TracingConfig::new().with_level(TracingLevel::from_verbosity(cli.verbose, cli.quiet));
    if let Some(path) = &cli.log_file {
        tracing_config = tracing_config.with_output(TracingOutput::File { path: path.clone() });
    }
    if let Err(e) = init_tracing(&tracing_config)
        && !cli.quiet
    {
        eprintln!("Warning: {e}");
    }

    if let Err(e) = commands::cmd_poll(&cli) {
        if !cli.quiet {
            eprintln!("Error: {e}");
        }
        std::process::exit(e.exit_code());
    }
}
