//! Pipeline core: closable sources, the pipe value, the stage runner and the synchronizer.

pub(crate) mod chain;
pub mod pipe;
pub mod runner;
pub mod source;
pub mod sync;

pub use pipe::Pipe;
pub use source::{ReleaseFn, Releaser, Source};
