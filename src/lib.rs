//! pipekit: Unix-pipe style data pipelines
//!
//! A [`Pipe`] is one stage of a linear chain. Producers ([`Pipe::file`], [`Pipe::exec_cmd`],
//! [`Pipe::slice`], ...) start a chain, filters ([`Pipe::match_str`], [`Pipe::exec`],
//! [`Pipe::filter`], ...) extend it, and sinks ([`Pipe::string`], [`Pipe::stdout`],
//! [`Pipe::wait`], ...) drain it.
//!
//! - **Batch mode** (default): each filter runs to completion when it is chained.
//! - **Streaming mode** ([`Pipe::stream_start`] / [`Pipe::stream`]): each filter runs on its
//!   own thread, connected to its neighbours by bounded channels, like shell pipe stages.
//!   [`Pipe::synchronize`] drains the chain and switches back to batch mode.
//!
//! One sticky error is shared by the whole chain. The first stage to fail records it, every
//! later read looks like end-of-data, and sinks return it.

pub mod engine;
pub mod pipeline;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use pipeline::{Pipe, Releaser, Source};
pub use types::*;

/// Result alias used by the public pipekit API
pub type Result<T> = std::result::Result<T, PipeError>;
