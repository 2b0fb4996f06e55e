//! Idle Task Scheduling
//!
//! Some native runtimes hold internal locks while they call back into the
//! core. Work that would re-enter those runtimes has to run later, from the
//! host's main event loop. [`IdleScheduler`] is the seam for that: on Tizen it
//! is backed by `g_idle_add`/`g_source_remove`.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::error::Result;

/// One-shot task executed on the next idle iteration of the host loop.
pub type IdleTask = Box<dyn FnOnce() + Send + 'static>;

/// Identifier of a scheduled idle source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdleSourceId(pub u32);

impl fmt::Display for IdleSourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "idle#{}", self.0)
    }
}

/// Idle scheduler trait
///
/// Implementations must run each task at most once, on the host's event loop
/// thread, and never synchronously inside [`IdleScheduler::schedule_idle`].
pub trait IdleScheduler: Send + Sync {
    /// Queue `task` for the next idle iteration.
    fn schedule_idle(&self, task: IdleTask) -> Result<IdleSourceId>;

    /// Remove a task that has not run yet.
    ///
    /// Returns `false` when the task already ran or was never scheduled.
    fn cancel(&self, id: IdleSourceId) -> bool;
}

/// Queue-backed scheduler drained explicitly by the embedder.
///
/// Useful for hosts that already own a loop and want to pump idle work
/// themselves, and for deterministic tests.
#[derive(Default)]
pub struct QueuedIdleScheduler {
    next_id: AtomicU32,
    queue: Mutex<VecDeque<(IdleSourceId, IdleTask)>>,
}

impl QueuedIdleScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks waiting to run
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run every task queued before this call.
    ///
    /// Tasks scheduled while draining wait for the next call. Returns the
    /// number of tasks executed.
    pub fn run_pending(&self) -> usize {
        let batch: Vec<_> = self.queue.lock().drain(..).collect();
        let count = batch.len();
        for (_, task) in batch {
            task();
        }
        count
    }
}

impl IdleScheduler for QueuedIdleScheduler {
    fn schedule_idle(&self, task: IdleTask) -> Result<IdleSourceId> {
        let id = IdleSourceId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.queue.lock().push_back((id, task));
        Ok(id)
    }

    fn cancel(&self, id: IdleSourceId) -> bool {
        let mut queue = self.queue.lock();
        let before = queue.len();
        queue.retain(|(queued, _)| *queued != id);
        queue.len() != before
    }
}

impl fmt::Debug for QueuedIdleScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedIdleScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}
