//! Per-loop work queue.
//!
//! Multi-producer FIFO drained by a single consumer, the loop's own thread.

use std::collections::VecDeque;
use std::mem;

use parking_lot::Mutex;
use tracing::trace;

use super::context::LoopContext;

/// A unit of deferred work, run once on the loop's thread.
pub type WorkItem = Box<dyn FnOnce(&mut LoopContext) + Send + 'static>;

/// A thread-safe FIFO of pending work items.
#[derive(Default)]
pub struct WorkQueue {
    /// Pending items, guarded by the queue's own mutex
    pending: Mutex<VecDeque<WorkItem>>,
}

impl WorkQueue {
    /// Create a new empty queue.
    #[inline]
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
        }
    }

    /// Append an item to the back of the queue.
    #[inline]
    pub fn push(
        &self,
        item: WorkItem,
    ) {
        self.pending.lock().push_back(item);
    }

    /// Claim every pending item, leaving a fresh empty queue behind.
    #[inline]
    pub fn take_all(&self) -> VecDeque<WorkItem> {
        mem::take(&mut *self.pending.lock())
    }

    /// Run one drain pass and return how many items it executed.
    ///
    /// Items are claimed under the lock and run after it is released, so
    /// anything pushed while they run waits for the next pass.
    pub fn drain(
        &self,
        cx: &mut LoopContext,
    ) -> usize {
        let claimed = self.take_all();
        let count = claimed.len();
        cx.begin_pass();
        trace!(loop_id = %cx.loop_ref().id(), count, "drain pass");
        for item in claimed {
            item(cx);
        }
        count
    }

    /// Drop every pending item without running it.
    pub fn discard(&self) -> usize {
        self.take_all().len()
    }

    /// Get the number of pending items.
    #[inline]
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Check if the queue is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

impl std::fmt::Debug for WorkQueue {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("WorkQueue")
            .field("pending", &self.len())
            .finish()
    }
}
