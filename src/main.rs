//! pipekit CLI: run a pipeline script over files or stdin.

use anyhow::Result;
use clap::Parser;
use pipekit::engine::arg_parser::Cli;
use pipekit::engine::handle_run;
use std::process::ExitCode;
use std::time::Instant;

fn main() -> Result<ExitCode> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    let code = handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(code)
}
