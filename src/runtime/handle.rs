//! Loop identities.
//!
//! A guest loop is known by two values: the engine's own [`NativeLoop`]
//! handle, which is the lookup key, and a registry-issued [`LoopId`], which
//! tells apart two entities that happen to reuse the same native handle.
//! Callers only ever hold a [`LoopRef`], a copyable view of both.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::ThreadId;

/// Opaque identity of a guest loop as reported by the hosting engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeLoop(usize);

impl NativeLoop {
    /// Wrap a raw engine handle.
    #[inline]
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    /// Get the raw engine handle.
    #[inline]
    pub const fn as_raw(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NativeLoop {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Registry-issued loop id, unique for the lifetime of a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoopId(pub u64);

impl LoopId {
    /// Get the inner value.
    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for LoopId {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "Loop({})", self.0)
    }
}

/// Thread-safe [`LoopId`] generator.
#[derive(Debug, Default)]
pub struct LoopIdGenerator {
    next: AtomicU64,
}

impl LoopIdGenerator {
    /// Create a generator starting at zero.
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }

    /// Issue the next id.
    #[inline]
    pub fn next_id(&self) -> LoopId {
        LoopId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Non-owning reference to a registered loop.
///
/// Holding a `LoopRef` does not keep the loop alive. Anything acting on one
/// goes back through the registry, which rejects refs whose loop has torn
/// down, even if the engine has since reused the native handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoopRef {
    id: LoopId,
    native: NativeLoop,
    thread: ThreadId,
}

impl LoopRef {
    pub(crate) fn new(
        id: LoopId,
        native: NativeLoop,
        thread: ThreadId,
    ) -> Self {
        Self { id, native, thread }
    }

    /// Registry-issued id.
    #[inline]
    pub fn id(&self) -> LoopId {
        self.id
    }

    /// Engine handle the loop was registered under.
    #[inline]
    pub fn native(&self) -> NativeLoop {
        self.native
    }

    /// Thread that owns the loop.
    #[inline]
    pub fn thread_id(&self) -> ThreadId {
        self.thread
    }
}

impl std::fmt::Display for LoopRef {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{} [native {}]", self.id, self.native)
    }
}
