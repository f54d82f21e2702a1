//! Loop runtime
//!
//! Bookkeeping for live guest loops and the machinery that moves work onto
//! them.
//!
//! # Architecture
//!
//! - [`NativeLoop`](handle::NativeLoop) / [`LoopRef`](handle::LoopRef) - Loop identities
//! - [`EventLoop`](entity::EventLoop) - Registry-owned per-loop record
//! - [`LoopRegistry`](registry::LoopRegistry) - Ordered, reentrant-locked store of live loops
//! - [`WorkQueue`](work::WorkQueue) - Per-loop FIFO of pending work and its drain pass
//! - [`ActivationHandle`](activation::ActivationHandle) /
//!   [`ActivationPort`](activation::ActivationPort) - Cross-thread wake-up bridge
//! - [`LoopContext`](context::LoopContext) - What a work item sees when it runs

pub mod activation;
pub mod context;
pub mod entity;
pub mod handle;
pub mod registry;
pub mod work;

pub use activation::{
    ActivationHandle, ActivationPort, ActivationState, Dispatch, ReleaseMode, SignalMode,
    SignalStatus,
};
pub use context::LoopContext;
pub use entity::EventLoop;
pub use handle::{LoopId, LoopIdGenerator, LoopRef, NativeLoop};
pub use registry::LoopRegistry;
pub use work::{WorkItem, WorkQueue};

#[cfg(test)]
mod tests;
