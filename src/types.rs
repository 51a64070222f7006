//! Public and internal types for the pipekit API and CLI.

use regex::Regex;
use std::io;
use std::sync::{Arc, LazyLock};
use thiserror::Error;

/// Matches the text a failed subprocess leaves in the error channel. Anchored at the end so
/// trailing junk after the digits does not count.
static EXIT_STATUS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"exit status (\d+)$").expect("exit status pattern compiles"));

/// Sticky terminal error of a pipe chain.
///
/// Clones share the same recorded failure and compare equal to each other; two separately
/// created errors never compare equal, even with the same text. The text form is the full
/// `anyhow` context chain (`outer: inner`).
#[derive(Clone, Debug, Error)]
#[error("{inner:#}")]
pub struct PipeError {
    inner: Arc<anyhow::Error>,
}

impl PipeError {
    /// Error from a plain message.
    pub fn msg<M>(message: M) -> Self
    where
        M: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        anyhow::Error::msg(message).into()
    }

    /// The wrapped `anyhow` error (for downcasting or walking the chain).
    pub fn as_anyhow(&self) -> &anyhow::Error {
        &self.inner
    }

    /// Exit status encoded in the text as `exit status <N>`, or 0 when the text does not end
    /// that way or the digits do not fit.
    pub fn exit_status(&self) -> i32 {
        let text = self.to_string();
        EXIT_STATUS_PATTERN
            .captures(&text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<i32>().ok())
            .unwrap_or(0)
    }
}

impl PartialEq for PipeError {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for PipeError {}

impl From<anyhow::Error> for PipeError {
    fn from(err: anyhow::Error) -> Self {
        Self {
            inner: Arc::new(err),
        }
    }
}

impl From<io::Error> for PipeError {
    fn from(err: io::Error) -> Self {
        anyhow::Error::new(err).into()
    }
}

impl From<String> for PipeError {
    fn from(message: String) -> Self {
        Self::msg(message)
    }
}

impl From<&str> for PipeError {
    fn from(message: &str) -> Self {
        Self::msg(message.to_string())
    }
}

/// Resolved CLI options: defaults, then `.pipekit.toml`, then flags.
#[derive(Clone, Debug, Default)]
pub struct ScriptOpts {
    /// Run every stage concurrently.
    pub stream: bool,
    /// Debug logging.
    pub verbose: bool,
    /// Chunk capacity of the channel between streaming stages. None keeps the default.
    pub channel_cap: Option<usize>,
}
