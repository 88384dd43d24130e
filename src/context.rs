//! The propagation context: both replicas, direction, and run-scoped state

use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::Direction;
use crate::progress::{OverallProgress, Progress, ProgressCallback, ProgressInfo};
use crate::replica::Replica;

/// Holds both replicas and everything that is scoped to one
/// `propagate_files` run: direction, abort flag, accumulated progress
/// records, and the progress callback.
///
/// `abort` is an `AtomicBool` rather than a plain `bool` even though the
/// engine itself is single-threaded: the host may set it from a signal
/// handler or a supervisory thread while the propagator is blocked in a
/// VIO call, so the flag must be safely settable from outside the
/// propagator's own call stack.
pub struct PropagateContext {
    /// The local filesystem replica.
    pub local: Replica,
    /// The remote replica.
    pub remote: Replica,
    /// Which replica is the source for the current pass.
    pub direction: Direction,
    /// Write-once cancellation flag, polled at entry boundaries.
    pub abort: AtomicBool,
    /// Progress records accumulated this run, to be handed to the state
    /// database at the end of the sync.
    pub progress_info: Vec<ProgressInfo>,
    /// Running totals published to the progress callback.
    pub overall_progress: OverallProgress,
    /// Optional progress observer.
    pub callback: Option<Box<dyn ProgressCallback>>,
}

impl PropagateContext {
    /// Build a context for one sync in `direction`, with no progress
    /// callback registered.
    #[must_use]
    pub fn new(local: Replica, remote: Replica, direction: Direction) -> Self {
        Self {
            local,
            remote,
            direction,
            abort: AtomicBool::new(false),
            progress_info: Vec::new(),
            overall_progress: OverallProgress::default(),
            callback: None,
        }
    }

    /// Register a progress callback.
    #[must_use]
    pub fn with_callback(mut self, callback: Box<dyn ProgressCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    /// `true` once the host has requested cancellation.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }

    /// Request cancellation. Safe to call from any thread.
    pub fn request_abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    /// Emit a progress notification, if a callback is registered.
    pub fn notify(&self, progress: Progress) {
        if let Some(callback) = &self.callback {
            callback.on_progress(&progress);
        }
    }

    /// Append a progress record for the statedb handoff at end of sync.
    pub fn record_progress(&mut self, info: ProgressInfo) {
        self.progress_info.push(info);
    }
}
