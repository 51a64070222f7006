//! Synchronizer and join: collapse a streaming chain back into buffered data.

use log::debug;
use std::io::{self, Write};
use std::sync::Arc;

use super::chain::Chain;
use super::pipe::Pipe;
use super::source::Source;
use crate::Result;

impl Pipe {
    /// Drain the pipe with `consume`, release it, join every stage thread of the chain and
    /// surface the chain's first error.
    ///
    /// Shared by all sinks. Absent pipes yield `T::default()`. If the chain already failed,
    /// `consume` is not called. The chain error takes precedence over `consume`'s own error.
    pub(crate) fn consume<T, F>(self, consume: F) -> Result<T>
    where
        T: Default,
        F: FnOnce(&mut Pipe) -> anyhow::Result<T>,
    {
        let Some(state) = self.state else {
            return Ok(T::default());
        };
        let chain = Arc::clone(&state.chain);
        let mut pipe = Pipe::from_state(state);
        let consumed = if chain.has_error() {
            Ok(T::default())
        } else {
            consume(&mut pipe)
        };
        // Release before joining: stages blocked on a full channel need the receiver gone.
        let closed = pipe.close();
        drop(pipe);
        chain.join_all();

        if let Some(err) = chain.error() {
            return Err(err);
        }
        let value = consumed?;
        closed?;
        Ok(value)
    }

    /// Copy everything into `w`. Returns the number of bytes copied.
    pub(crate) fn drain_to<W>(self, w: &mut W) -> Result<u64>
    where
        W: Write + ?Sized,
    {
        self.consume(|pipe| Ok(io::copy(pipe, w)?))
    }

    /// Block until every stage of the chain has finished; return the first error.
    ///
    /// Remaining output is discarded.
    pub fn wait(self) -> Result<()> {
        self.drain_to(&mut io::sink()).map(|n| {
            debug!("wait: chain finished, {} byte(s) discarded", n);
        })
    }

    /// Turn streaming off: drain the chain into memory and continue from a new,
    /// non-streaming pipe over the buffered bytes.
    ///
    /// Absent, failed and non-streaming pipes are returned unchanged. An error recorded
    /// while draining is carried by the returned pipe.
    pub fn synchronize(self) -> Pipe {
        let cap = match &self.state {
            Some(state) if state.streaming && !state.chain.has_error() => {
                state.chain.channel_cap()
            }
            _ => return self,
        };
        let mut buffered = Vec::new();
        let drained = self.drain_to(&mut buffered);

        let chain = Chain::new();
        chain.set_channel_cap(cap);
        if let Err(err) = drained {
            chain.set_error(Some(err));
        }
        debug!("synchronize: {} byte(s) buffered", buffered.len());
        Pipe::from_parts(Source::from_bytes(buffered), chain, false)
    }
}
