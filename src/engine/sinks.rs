//! Sinks: drain a pipe into a value or a side effect.
//!
//! Every sink releases the pipe once, joins any streaming stages still running and returns
//! the chain's sticky error in place of its result. On an absent pipe they return the
//! zero value and touch nothing.

use anyhow::Context;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

use crate::engine::hashing::sha256_reader;
use crate::engine::tools::scan_lines;
use crate::pipeline::chain::lock;
use crate::{Pipe, PipeError, Result};

/// Held by a stdout sink for its whole drain, so two sinks never interleave.
static STDOUT_SINK: Mutex<()> = Mutex::new(());

/// Writes each chunk under the process stdout lock and releases it in between. A stage of
/// the chain being drained may print to stdout without waiting for the sink to finish.
struct StdoutChunks;

impl Write for StdoutChunks {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stdout().lock().write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().lock().flush()
    }
}

impl Pipe {
    /// All remaining data.
    pub fn bytes(self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.drain_to(&mut out)?;
        Ok(out)
    }

    /// All remaining data as UTF-8 text.
    pub fn string(self) -> Result<String> {
        let bytes = self.bytes()?;
        String::from_utf8(bytes)
            .map_err(|e| PipeError::from(anyhow::Error::new(e).context("pipe data is not UTF-8")))
    }

    /// The remaining lines, without their newlines.
    pub fn lines(self) -> Result<Vec<String>> {
        self.consume(|pipe| {
            let mut lines = Vec::new();
            scan_lines(pipe, |line| {
                lines.push(line.to_string());
                Ok(true)
            })?;
            Ok(lines)
        })
    }

    /// Number of lines. A final line without a newline counts.
    pub fn count_lines(self) -> Result<usize> {
        self.consume(|pipe| {
            let mut count = 0;
            scan_lines(pipe, |_| {
                count += 1;
                Ok(true)
            })?;
            Ok(count)
        })
    }

    /// Hex SHA-256 of all remaining data.
    pub fn sha256_sum(self) -> Result<String> {
        self.consume(|pipe| sha256_reader(pipe))
    }

    /// Copy to standard output as the data arrives. Concurrent stdout sinks run one after
    /// the other. Returns the bytes written.
    ///
    /// A stage must not itself drain a pipe to stdout while its own chain is being drained
    /// here; that inner sink would wait for this one.
    pub fn stdout(self) -> Result<u64> {
        let _serial = lock(&STDOUT_SINK);
        let mut out = StdoutChunks;
        let written = self.drain_to(&mut out)?;
        out.flush()?;
        Ok(written)
    }

    /// Write to `path`, truncating it. Returns the bytes written. The file is not touched
    /// when the pipe already failed.
    pub fn write_file(self, path: impl AsRef<Path>) -> Result<u64> {
        let path = path.as_ref().to_path_buf();
        self.consume(move |pipe| {
            let mut file =
                File::create(&path).with_context(|| format!("create {}", path.display()))?;
            Ok(io::copy(pipe, &mut file)?)
        })
    }

    /// Append to `path`, creating it if needed. Returns the bytes written.
    pub fn append_file(self, path: impl AsRef<Path>) -> Result<u64> {
        let path = path.as_ref().to_path_buf();
        self.consume(move |pipe| {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("open {} for append", path.display()))?;
            Ok(io::copy(pipe, &mut file)?)
        })
    }
}
