//! The pipe value: optional state holding a source, the chain's error slot and the mode flag.

use std::fmt;
use std::io::{self, Read};
use std::sync::Arc;

use super::chain::Chain;
use super::source::Source;
use crate::{PipeError, Result};

/// State of a present pipe.
pub(crate) struct PipeState {
    pub(crate) source: Source,
    pub(crate) chain: Arc<Chain>,
    pub(crate) streaming: bool,
}

/// A stage of a Unix-style pipeline.
///
/// A pipe is either present or absent ([`Pipe::absent`]). Every method is defined for the
/// absent case and returns an empty/zero result instead of failing, so chains never need
/// to special-case a missing pipe.
///
/// Combinators take `self` by value: the next stage owns the previous one's source and is
/// the only thing that releases it. All pipes derived from one another share a single
/// sticky error; once it is set, reads report end-of-data and later stages stop.
///
/// ```ignore
/// let n = pipekit::Pipe::file("access.log").match_str("GET").count_lines()?;
/// let top = pipekit::Pipe::stream_start()
///     .exec("cat access.log")
///     .column(1)
///     .freq()
///     .first(10)
///     .string()?;
/// ```
pub struct Pipe {
    pub(crate) state: Option<PipeState>,
}

impl Pipe {
    /// Empty, non-streaming pipe.
    pub fn new() -> Self {
        Self::from_parts(Source::empty(), Chain::new(), false)
    }

    /// The absent pipe. Every operation on it is a no-op.
    pub fn absent() -> Self {
        Self { state: None }
    }

    /// Non-streaming pipe reading from `reader`.
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: Read + Send + 'static,
    {
        Self::new().with_reader(reader)
    }

    pub(crate) fn from_parts(source: Source, chain: Arc<Chain>, streaming: bool) -> Self {
        Self {
            state: Some(PipeState {
                source,
                chain,
                streaming,
            }),
        }
    }

    pub(crate) fn from_state(state: PipeState) -> Self {
        Self { state: Some(state) }
    }

    pub fn is_absent(&self) -> bool {
        self.state.is_none()
    }

    pub fn is_streaming(&self) -> bool {
        self.state.as_ref().is_some_and(|s| s.streaming)
    }

    /// The chain's sticky error, if any.
    pub fn error(&self) -> Option<PipeError> {
        self.state.as_ref().and_then(|s| s.chain.error())
    }

    /// Overwrite the sticky error. This is the explicit override: it replaces whatever was
    /// recorded before, unlike stage failures which only fill an empty slot.
    pub fn set_error<E>(&mut self, err: E)
    where
        E: Into<PipeError>,
    {
        if let Some(state) = &self.state {
            state.chain.set_error(Some(err.into()));
        }
    }

    /// Clear the sticky error.
    pub fn clear_error(&mut self) {
        if let Some(state) = &self.state {
            state.chain.set_error(None);
        }
    }

    /// [`Pipe::set_error`] and return the pipe.
    pub fn with_error<E>(mut self, err: E) -> Self
    where
        E: Into<PipeError>,
    {
        self.set_error(err);
        self
    }

    /// Exit status recorded in the error as `exit status <N>`; 0 when there is no error or
    /// it has any other shape.
    pub fn exit_status(&self) -> i32 {
        self.error().map_or(0, |e| e.exit_status())
    }

    /// Release the source. Safe to call repeatedly; the release action runs once.
    pub fn close(&mut self) -> Result<()> {
        match &mut self.state {
            Some(state) => state.source.close().map_err(PipeError::from),
            None => Ok(()),
        }
    }

    /// Read from `reader` from now on. Releases the previous source.
    pub fn with_reader<R>(self, reader: R) -> Self
    where
        R: Read + Send + 'static,
    {
        self.with_source(Source::new(reader))
    }

    /// Read from `source` from now on. Releases the previous source; use
    /// [`Pipe::take_source`] first to keep it.
    pub fn with_source(mut self, source: Source) -> Self {
        if let Some(state) = &mut self.state {
            state.source = source;
        }
        self
    }

    /// Detach the current source, leaving an empty one. None for an absent pipe.
    pub fn take_source(&mut self) -> Option<Source> {
        self.state
            .as_mut()
            .map(|s| std::mem::take(&mut s.source))
    }

    /// Fresh, empty pipe in streaming mode: every stage chained after it runs concurrently.
    pub fn stream_start() -> Self {
        Self::new().stream()
    }

    /// Switch on streaming mode. It stays on for every stage chained after this one until
    /// [`Pipe::synchronize`] or a sink.
    pub fn stream(mut self) -> Self {
        if let Some(state) = &mut self.state {
            state.streaming = true;
        }
        self
    }

    /// Channel capacity (in chunks) between streaming stages created after this call.
    pub fn with_channel_capacity(self, cap: usize) -> Self {
        if let Some(state) = &self.state {
            state.chain.set_channel_cap(cap);
        }
        self
    }

    /// Stage threads of this chain that have not been joined yet.
    pub fn pending_stages(&self) -> usize {
        self.state
            .as_ref()
            .map_or(0, |s| s.chain.running_stages())
    }
}

impl Default for Pipe {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads stop at end-of-data as soon as the chain has an error.
impl Read for Pipe {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.state {
            Some(state) if !state.chain.has_error() => state.source.read(buf),
            _ => Ok(0),
        }
    }
}

impl fmt::Debug for Pipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            None => f.write_str("Pipe(absent)"),
            Some(state) => f
                .debug_struct("Pipe")
                .field("source", &state.source)
                .field("streaming", &state.streaming)
                .field("error", &state.chain.error())
                .finish(),
        }
    }
}
