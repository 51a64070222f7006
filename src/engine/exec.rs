//! Subprocess stages.
//!
//! A command that exits non-zero fails its stage with the error text `exit status <N>`,
//! which [`Pipe::exit_status`] turns back into `N`. Every other failure (command not found,
//! I/O) has a different text and therefore reads as exit status 0.

use anyhow::{Context, Result, anyhow, bail};
use log::debug;
use std::io::{self, Read, Write};
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use std::thread;

use crate::Pipe;
use crate::engine::tools::{render_template, scan_lines, split_fields};
use crate::pipeline::chain::lock;
use crate::utils::config::{
    FIRST_PLACEHOLDER, LINE_PLACEHOLDER, SECOND_PLACEHOLDER, StreamingConsts,
};

type SharedWriter<'a> = Mutex<&'a mut (dyn Write + Send)>;

fn build_command(cmd_line: &str) -> Result<Command> {
    let words = split_fields(cmd_line)?;
    let (program, args) = words
        .split_first()
        .ok_or_else(|| anyhow!("empty command line"))?;
    let mut command = Command::new(program);
    command.args(args);
    Ok(command)
}

/// Copy `r` into the shared writer one read at a time, so stdout and stderr interleave at
/// chunk boundaries.
fn copy_shared<R: Read>(mut r: R, out: &SharedWriter<'_>) -> Result<()> {
    let mut buf = vec![0u8; StreamingConsts::READ_CHUNK_SIZE];
    loop {
        let n = match r.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        lock(out).write_all(&buf[..n])?;
    }
}

/// Pump the child's stdout and stderr into `w` and its stdin from `input`. If writing the
/// output fails, the child is killed so the pumps can finish.
fn pump(
    child: &mut Child,
    input: Option<&mut (dyn Read + Send)>,
    w: &mut (dyn Write + Send),
) -> Result<()> {
    let stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let out: SharedWriter<'_> = Mutex::new(w);

    thread::scope(|s| {
        if let (Some(mut stdin), Some(input)) = (stdin, input) {
            // The child may exit without reading everything; a broken pipe here is normal.
            s.spawn(move || {
                let _ = io::copy(input, &mut stdin);
            });
        }
        let errors = stderr.map(|e| s.spawn(|| copy_shared(e, &out)));
        let copied = match stdout {
            Some(o) => copy_shared(o, &out),
            None => Ok(()),
        };
        if copied.is_err() {
            let _ = child.kill();
        }
        let errors = match errors {
            Some(handle) => handle
                .join()
                .unwrap_or_else(|_| Err(anyhow!("stderr reader panicked"))),
            None => Ok(()),
        };
        copied.and(errors)
    })
}

/// Run `cmd_line`, feeding it `input` (or nothing), writing stdout and stderr to `w`.
fn run_command(
    cmd_line: &str,
    input: Option<&mut (dyn Read + Send)>,
    w: &mut (dyn Write + Send),
) -> Result<()> {
    let mut command = build_command(cmd_line)?;
    command
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = command
        .spawn()
        .with_context(|| format!("spawn `{cmd_line}`"))?;
    debug!("exec `{}`: pid {}", cmd_line, child.id());

    let pumped = pump(&mut child, input, w);
    let status = child
        .wait()
        .with_context(|| format!("wait for `{cmd_line}`"))?;
    pumped?;
    if status.success() {
        return Ok(());
    }
    match status.code() {
        Some(code) => bail!("exit status {code}"),
        None => bail!("`{cmd_line}` {status}"),
    }
}

impl Pipe {
    /// Pipe holding the output of `cmd_line` run with empty input.
    pub fn exec_cmd(cmd_line: impl Into<String>) -> Pipe {
        Pipe::new().exec(cmd_line)
    }

    /// Run `cmd_line` with this pipe's data as its standard input. Its standard output
    /// and standard error both become the output. The command line is split into words
    /// with shell-like quoting but is not run through a shell.
    pub fn exec(self, cmd_line: impl Into<String>) -> Pipe {
        let cmd_line = cmd_line.into();
        self.filter(move |r, w| run_command(&cmd_line, Some(r), w))
    }

    /// For each line, run `template` with `{{.}}` replaced by the line. Outputs are
    /// concatenated. A failing command does not stop later lines; the first failure is
    /// reported once all lines ran.
    pub fn exec_for_each(self, template: impl Into<String>) -> Pipe {
        let template = template.into();
        self.filter(move |r, w| {
            let mut first_failure: Option<anyhow::Error> = None;
            scan_lines(r, |line| {
                let cmd_line = render_template(&template, &[(LINE_PLACEHOLDER, line)]);
                if let Err(err) = run_command(&cmd_line, None, &mut *w) {
                    debug!("exec_for_each `{}`: {:#}", cmd_line, err);
                    first_failure.get_or_insert(err);
                }
                Ok(true)
            })?;
            match first_failure {
                Some(err) => Err(err),
                None => Ok(()),
            }
        })
    }

    /// Fold the lines through a command. `{{.First}}` is the accumulator (starting at
    /// `init`) and `{{.Second}}` the current line; the command's output, without trailing
    /// whitespace, becomes the new accumulator. Outputs the final accumulator.
    pub fn exec_reduce(self, template: impl Into<String>, init: impl Into<String>) -> Pipe {
        let template = template.into();
        let init = init.into();
        self.filter(move |r, w| {
            let mut acc = init;
            scan_lines(r, |line| {
                let cmd_line = render_template(
                    &template,
                    &[(FIRST_PLACEHOLDER, acc.as_str()), (SECOND_PLACEHOLDER, line)],
                );
                let mut output: Vec<u8> = Vec::new();
                run_command(&cmd_line, None, &mut output)?;
                acc = String::from_utf8_lossy(&output).trim_end().to_string();
                Ok(true)
            })?;
            writeln!(w, "{acc}")?;
            Ok(())
        })
    }
}
