//! CLI command handler: build the input pipe, apply the script, run its terminal.

use anyhow::{Context, Result};
use log::{debug, error};
use std::fs::File;
use std::io::{self, Read};
use std::process::ExitCode;

use crate::engine::arg_parser::Cli;
use crate::engine::script::{Terminal, parse_script};
use crate::utils::pipekit_toml::{apply_file_to_opts, load_pipekit_toml};
use crate::utils::setup_logging;
use crate::{Pipe, PipeError, ScriptOpts};

macro_rules! apply_cli_opt {
    ($cli:expr, $opts:expr, $field:ident) => {
        if let Some(v) = $cli.$field {
            $opts.$field = v;
        }
    };
}

/// Defaults, then `.pipekit.toml` from the working directory, then flags.
fn setup_opts(cli: &Cli) -> ScriptOpts {
    let mut opts = ScriptOpts::default();
    if let Ok(cwd) = std::env::current_dir()
        && let Some(file) = load_pipekit_toml(&cwd)
    {
        apply_file_to_opts(&file, &mut opts);
    }
    apply_cli_opt!(cli, opts, stream);
    apply_cli_opt!(cli, opts, verbose);
    if cli.channel_cap.is_some() {
        opts.channel_cap = cli.channel_cap;
    }
    setup_logging(opts.verbose);
    opts
}

/// Concatenated input files, or stdin when none are given. Files are opened up front so a
/// missing one is reported before anything runs.
fn input_pipe(cli: &Cli) -> Result<Pipe> {
    if cli.files.is_empty() {
        return Ok(Pipe::stdin());
    }
    let mut reader: Box<dyn Read + Send> = Box::new(io::empty());
    for path in &cli.files {
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        reader = Box::new(reader.chain(file));
    }
    Ok(Pipe::from_reader(reader))
}

/// Map a pipeline failure to the process outcome: a subprocess exit status is passed
/// through, anything else is an error.
fn exit_code_for(err: PipeError) -> Result<ExitCode> {
    match err.exit_status() {
        0 => Err(err.into()),
        status => {
            error!("{}", err);
            Ok(ExitCode::from(u8::try_from(status).unwrap_or(u8::MAX)))
        }
    }
}

/// Run the script from `cli` and return the process exit code.
pub fn handle_run(cli: &Cli) -> Result<ExitCode> {
    let opts = setup_opts(cli);
    debug!("{} CONFIG: {:?}", env!("CARGO_PKG_NAME").to_uppercase(), opts);
    let script = parse_script(&cli.script)?;
    let terminal = script.terminal;

    let mut pipe = input_pipe(cli)?;
    if let Some(cap) = opts.channel_cap {
        pipe = pipe.with_channel_capacity(cap);
    }
    if opts.stream {
        debug!("Streaming mode");
        pipe = pipe.stream();
    }
    let pipe = script.apply(pipe);

    let outcome = match terminal {
        Terminal::Stdout => pipe.stdout().map(|n| debug!("{} byte(s) written", n)),
        Terminal::Count => pipe.count_lines().map(|n| println!("{n}")),
        Terminal::Sha256 => pipe.sha256_sum().map(|sum| println!("{sum}")),
    };
    match outcome {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => exit_code_for(err),
    }
}
