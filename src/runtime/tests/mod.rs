//! runtime 模块单元测试


use std::sync::Arc;
use std::thread;

use crate::runtime::activation::channel;
use crate::runtime::{EventLoop, LoopContext, LoopRef, LoopRegistry, NativeLoop, WorkQueue};

/// Entity with a throwaway activation pair.
fn entity(
    registry: &LoopRegistry,
    raw: usize,
) -> EventLoop {
    let (handle, _port) = channel(format!("test loop {}", raw), |_| 0);
    EventLoop::new(
        registry.next_id(),
        NativeLoop::from_raw(raw),
        thread::current().id(),
        Arc::new(WorkQueue::new()),
        handle,
    )
}

/// Context for a loop that was never registered.
fn detached_context() -> LoopContext {
    let registry = LoopRegistry::new();
    LoopContext::new(LoopRef::new(
        registry.next_id(),
        NativeLoop::from_raw(0),
        thread::current().id(),
    ))
}
