//! Closable source: a byte reader plus a release action that fires at most once.

use log::debug;
use std::fmt;
use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Release callback of a [`Source`].
pub type ReleaseFn = Box<dyn FnOnce() -> io::Result<()> + Send>;

struct ReleaseState {
    fired: AtomicBool,
    action: Mutex<Option<ReleaseFn>>,
}

/// Shared handle to a source's release action.
///
/// Clones may be handed to other threads. Whichever clone calls [`Releaser::release`] first
/// runs the action; every later call (from any clone) returns `Ok(())` without running it.
#[derive(Clone)]
pub struct Releaser {
    state: Arc<ReleaseState>,
}

impl Releaser {
    pub fn new<F>(action: F) -> Self
    where
        F: FnOnce() -> io::Result<()> + Send + 'static,
    {
        Self::from_action(Some(Box::new(action)))
    }

    /// Releaser with nothing to run (dropping the reader is the whole release).
    pub fn noop() -> Self {
        Self::from_action(None)
    }

    fn from_action(action: Option<ReleaseFn>) -> Self {
        Self {
            state: Arc::new(ReleaseState {
                fired: AtomicBool::new(false),
                action: Mutex::new(action),
            }),
        }
    }

    /// Run the release action unless it already ran.
    pub fn release(&self) -> io::Result<()> {
        if self.state.fired.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let action = self
            .state
            .action
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match action {
            Some(action) => action(),
            None => Ok(()),
        }
    }

    pub fn is_released(&self) -> bool {
        self.state.fired.load(Ordering::Acquire)
    }
}

impl Default for Releaser {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for Releaser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Releaser")
            .field("released", &self.is_released())
            .finish()
    }
}

/// Byte stream backing a pipe.
///
/// The reader is dropped and the release action fired once: when a read reports end-of-data,
/// on [`Source::close`], or on drop, whichever comes first. Reads after that return `Ok(0)`.
pub struct Source {
    reader: Option<Box<dyn Read + Send>>,
    releaser: Releaser,
}

impl Source {
    /// Source with no data.
    pub fn empty() -> Self {
        Self {
            reader: None,
            releaser: Releaser::noop(),
        }
    }

    /// Wrap a reader whose own drop is its release (files, cursors, channel receivers).
    pub fn new<R>(reader: R) -> Self
    where
        R: Read + Send + 'static,
    {
        Self {
            reader: Some(Box::new(reader)),
            releaser: Releaser::noop(),
        }
    }

    /// Wrap a reader with an extra release action, run after the reader is dropped.
    pub fn with_release<R, F>(reader: R, release: F) -> Self
    where
        R: Read + Send + 'static,
        F: FnOnce() -> io::Result<()> + Send + 'static,
    {
        Self {
            reader: Some(Box::new(reader)),
            releaser: Releaser::new(release),
        }
    }

    /// In-memory source over `bytes`.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::new(Cursor::new(bytes))
    }

    /// Handle that can release this source from elsewhere.
    pub fn releaser(&self) -> Releaser {
        self.releaser.clone()
    }

    pub fn is_released(&self) -> bool {
        self.releaser.is_released()
    }

    /// Drop the reader and fire the release action. Idempotent.
    pub fn close(&mut self) -> io::Result<()> {
        self.reader = None;
        self.releaser.release()
    }
}

impl Read for Source {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(0);
        };
        let n = reader.read(buf)?;
        if n == 0 && !buf.is_empty() {
            self.close()?;
        }
        Ok(n)
    }
}

impl Default for Source {
    fn default() -> Self {
        Self::empty()
    }
}

impl Drop for Source {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            debug!("release on drop failed: {}", e);
        }
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("open", &self.reader.is_some())
            .field("releaser", &self.releaser)
            .finish()
    }
}
