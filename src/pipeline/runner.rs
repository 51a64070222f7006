//! Stage runner: applies a transformation to a pipe, inline in batch mode or on its own
//! thread in streaming mode.
//!
//! Streaming stages are linked by bounded channels of byte chunks:
//! predecessor pipe → stage thread (transformation) → chunk channel → returned pipe.
//! Each `write` by a stage is one chunk, so the next stage sees a record as soon as it is
//! written, and a full channel blocks the writer.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use log::{debug, warn};
use std::io::{self, Read, Write};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread;

use super::chain::Chain;
use super::pipe::{Pipe, PipeState};
use super::source::Source;
use crate::PipeError;
use crate::utils::config::{PackagePaths, StreamingConsts};

/// Writer end of a stage channel.
struct ChunkWriter {
    tx: Sender<Vec<u8>>,
    chain: Arc<Chain>,
    /// Set once the receiving side is gone (downstream finished early, e.g. `first`).
    disconnected: bool,
}

impl Write for ChunkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.chain.has_error() {
            return Err(io::Error::other("pipeline aborted by an earlier error"));
        }
        if self.tx.send(buf.to_vec()).is_err() {
            self.disconnected = true;
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "downstream stage closed",
            ));
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Reader end of a stage channel. Ends when every sender is gone or the chain fails.
struct ChunkReader {
    rx: Receiver<Vec<u8>>,
    chain: Arc<Chain>,
    chunk: Vec<u8>,
    pos: usize,
}

impl ChunkReader {
    fn new(rx: Receiver<Vec<u8>>, chain: Arc<Chain>) -> Self {
        Self {
            rx,
            chain,
            chunk: Vec::new(),
            pos: 0,
        }
    }
}

impl Read for ChunkReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pos >= self.chunk.len() {
            match self.rx.recv_timeout(StreamingConsts::ERROR_POLL_INTERVAL) {
                Ok(chunk) => {
                    self.chunk = chunk;
                    self.pos = 0;
                }
                Err(RecvTimeoutError::Timeout) if self.chain.has_error() => return Ok(0),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Ok(0),
            }
        }
        let n = buf.len().min(self.chunk.len() - self.pos);
        buf[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Record a finished stage's outcome and release its input.
///
/// A failure only lands in the chain when nothing failed before it. A stage whose
/// downstream went away mid-write ends quietly, like a shell stage killed by SIGPIPE.
fn settle(
    chain: &Chain,
    stage: &str,
    outcome: anyhow::Result<()>,
    downstream_closed: bool,
    input: &mut Pipe,
) {
    let closed = input.close();
    if let Err(err) = outcome {
        if downstream_closed {
            debug!("{}: downstream closed, stopping", stage);
        } else {
            let err = PipeError::from(err);
            let msg = err.to_string();
            if chain.record_first(err) {
                warn!("{}: failed: {}", stage, msg);
            } else {
                debug!("{}: stopped after an earlier failure ({})", stage, msg);
            }
        }
    }
    if let Err(err) = closed {
        chain.record_first(err);
    }
}

impl Pipe {
    /// Apply a transformation that reads this pipe's data and writes the next stage's.
    ///
    /// This is the building block behind every combinator. Absent and failed pipes are
    /// returned unchanged without calling `f`. In batch mode `f` runs now and its output is
    /// buffered; in streaming mode `f` runs on a new thread and the returned pipe reads its
    /// output as it is produced. An error returned by `f` becomes the chain's error unless
    /// an earlier one exists.
    pub fn filter<F>(self, f: F) -> Pipe
    where
        F: FnOnce(&mut (dyn Read + Send), &mut (dyn Write + Send)) -> anyhow::Result<()>
            + Send
            + 'static,
    {
        match self.state {
            None => Pipe::absent(),
            Some(state) if state.chain.has_error() => Pipe::from_state(state),
            Some(state) if state.streaming => spawn_stage(state, f),
            Some(state) => run_inline(state, f),
        }
    }
}

fn run_inline<F>(state: PipeState, f: F) -> Pipe
where
    F: FnOnce(&mut (dyn Read + Send), &mut (dyn Write + Send)) -> anyhow::Result<()>,
{
    let chain = Arc::clone(&state.chain);
    let mut input = Pipe::from_state(state);
    let mut output = Vec::new();
    let outcome = f(&mut input, &mut output);
    settle(&chain, "batch stage", outcome, false, &mut input);
    Pipe::from_parts(Source::from_bytes(output), chain, false)
}

fn spawn_stage<F>(state: PipeState, f: F) -> Pipe
where
    F: FnOnce(&mut (dyn Read + Send), &mut (dyn Write + Send)) -> anyhow::Result<()>
        + Send
        + 'static,
{
    let chain = Arc::clone(&state.chain);
    let (tx, rx) = bounded::<Vec<u8>>(chain.channel_cap());
    let id = chain.next_stage_id();
    let name = PackagePaths::get().stage_thread_name(id);

    let stage_chain = Arc::clone(&chain);
    let stage_name = name.clone();
    let mut input = Pipe::from_state(state);
    let mut writer = ChunkWriter {
        tx,
        chain: Arc::clone(&chain),
        disconnected: false,
    };

    let spawned = thread::Builder::new().name(name).spawn(move || {
        debug!("{}: started", stage_name);
        let outcome = catch_unwind(AssertUnwindSafe(|| f(&mut input, &mut writer)))
            .unwrap_or_else(|_| Err(anyhow::anyhow!("{stage_name} panicked")));
        // Error goes in before the channel closes, so downstream never mistakes a failed
        // stage's truncated output for a clean end.
        settle(
            &stage_chain,
            &stage_name,
            outcome,
            writer.disconnected,
            &mut input,
        );
        drop(writer);
        debug!("{}: finished", stage_name);
    });

    match spawned {
        Ok(handle) => chain.register(id, handle),
        Err(err) => {
            chain.record_first(anyhow::Error::new(err).context("spawn stage thread").into());
        }
    }

    let source = Source::new(ChunkReader::new(rx, Arc::clone(&chain)));
    Pipe::from_parts(source, chain, true)
}
