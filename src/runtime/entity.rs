//! Loop entity.

use std::sync::Arc;
use std::thread::ThreadId;

use super::activation::ActivationHandle;
use super::handle::{LoopId, LoopRef, NativeLoop};
use super::work::WorkQueue;

/// Registry-owned record of one live guest loop.
///
/// Built by the loop's start hook and dropped by its teardown hook. Outside
/// the registry a loop is only ever named by its [`LoopRef`].
#[derive(Debug)]
pub struct EventLoop {
    id: LoopId,
    native: NativeLoop,
    thread: ThreadId,
    /// Shared with the drain function bound to the activation port.
    queue: Arc<WorkQueue>,
    activation: ActivationHandle,
}

impl EventLoop {
    /// Assemble an entity from its parts.
    pub fn new(
        id: LoopId,
        native: NativeLoop,
        thread: ThreadId,
        queue: Arc<WorkQueue>,
        activation: ActivationHandle,
    ) -> Self {
        Self {
            id,
            native,
            thread,
            queue,
            activation,
        }
    }

    #[inline]
    pub fn id(&self) -> LoopId {
        self.id
    }

    #[inline]
    pub fn native(&self) -> NativeLoop {
        self.native
    }

    #[inline]
    pub fn thread_id(&self) -> ThreadId {
        self.thread
    }

    /// Non-owning view of this entity.
    #[inline]
    pub fn loop_ref(&self) -> LoopRef {
        LoopRef::new(self.id, self.native, self.thread)
    }

    #[inline]
    pub fn queue(&self) -> &WorkQueue {
        &self.queue
    }

    #[inline]
    pub fn activation(&self) -> &ActivationHandle {
        &self.activation
    }
}
