//! Chain state: the sticky error and stage threads shared by every pipe of one pipeline.

use log::{debug, warn};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use crate::PipeError;
use crate::utils::config::StreamingConsts;

/// Lock ignoring poison: a panicked stage is reported through the chain error, not by
/// taking the whole chain down with it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct StageHandle {
    id: usize,
    handle: JoinHandle<()>,
}

/// Shared by every pipe and stage thread of one chain. Pipes hold it through an `Arc`.
pub(crate) struct Chain {
    /// Mirrors `error.is_some()` for the per-read fast path. Only written under `error`'s lock.
    failed: AtomicBool,
    error: Mutex<Option<PipeError>>,
    stages: Mutex<Vec<StageHandle>>,
    next_stage: AtomicUsize,
    channel_cap: AtomicUsize,
}

impl Chain {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            failed: AtomicBool::new(false),
            error: Mutex::new(None),
            stages: Mutex::new(Vec::new()),
            next_stage: AtomicUsize::new(1),
            channel_cap: AtomicUsize::new(StreamingConsts::CHANNEL_CAP),
        })
    }

    pub(crate) fn error(&self) -> Option<PipeError> {
        lock(&self.error).clone()
    }

    pub(crate) fn has_error(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Overwrite (or clear) the error unconditionally.
    pub(crate) fn set_error(&self, err: Option<PipeError>) {
        let mut slot = lock(&self.error);
        self.failed.store(err.is_some(), Ordering::Release);
        *slot = err;
    }

    /// Store `err` only if no error is recorded yet. Returns whether it was stored.
    pub(crate) fn record_first(&self, err: PipeError) -> bool {
        let mut slot = lock(&self.error);
        if slot.is_some() {
            return false;
        }
        *slot = Some(err);
        self.failed.store(true, Ordering::Release);
        true
    }

    pub(crate) fn channel_cap(&self) -> usize {
        self.channel_cap.load(Ordering::Relaxed)
    }

    pub(crate) fn set_channel_cap(&self, cap: usize) {
        self.channel_cap.store(cap.max(1), Ordering::Relaxed);
    }

    pub(crate) fn next_stage_id(&self) -> usize {
        self.next_stage.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn register(&self, id: usize, handle: JoinHandle<()>) {
        lock(&self.stages).push(StageHandle { id, handle });
    }

    pub(crate) fn running_stages(&self) -> usize {
        lock(&self.stages).len()
    }

    /// Join every registered stage thread. A panicked stage is recorded as the chain error
    /// if nothing failed before it.
    pub(crate) fn join_all(&self) {
        loop {
            let stages = std::mem::take(&mut *lock(&self.stages));
            if stages.is_empty() {
                return;
            }
            debug!("joining {} stage thread(s)", stages.len());
            for StageHandle { id, handle } in stages {
                if handle.join().is_err() {
                    warn!("stage {} panicked", id);
                    self.record_first(PipeError::msg(format!("stage {id} panicked")));
                }
            }
        }
    }
}
