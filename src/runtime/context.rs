//! Execution context handed to work items.

use std::thread::ThreadId;

use super::handle::LoopRef;

/// Per-loop execution context.
///
/// Owned by the loop's thread and passed by `&mut` to every work item a
/// drain pass runs, so items can see which loop they run on and ask the
/// engine to stop it.
#[derive(Debug)]
pub struct LoopContext {
    loop_ref: LoopRef,
    drain_passes: u64,
    stop_requested: bool,
}

impl LoopContext {
    /// Create the context for a freshly registered loop.
    pub fn new(loop_ref: LoopRef) -> Self {
        Self {
            loop_ref,
            drain_passes: 0,
            stop_requested: false,
        }
    }

    /// The loop this context belongs to.
    #[inline]
    pub fn loop_ref(&self) -> &LoopRef {
        &self.loop_ref
    }

    /// Thread that owns the loop.
    #[inline]
    pub fn thread_id(&self) -> ThreadId {
        self.loop_ref.thread_id()
    }

    /// Number of drain passes started on this loop so far.
    #[inline]
    pub fn drain_passes(&self) -> u64 {
        self.drain_passes
    }

    pub(crate) fn begin_pass(&mut self) {
        self.drain_passes += 1;
    }

    /// Ask the engine to stop this loop once the current pass finishes.
    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    /// Whether a work item asked the loop to stop.
    #[inline]
    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }
}
