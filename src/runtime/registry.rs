//! Loop registry.
//!
//! Insertion-ordered store of live loops keyed by native handle. The first
//! entry is the main loop. Every operation takes one reentrant lock for its
//! own duration, and [`LoopRegistry::locked`] lets callers hold it across
//! several operations. Reentrancy matters because a teardown can run while
//! the same thread is already inside the lock.
//!
//! The lock is a `lock_api` type parameter, defaulting to parking_lot's
//! raw mutex and thread-id source.

use std::cell::RefCell;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::lock_api::{GetThreadId, RawMutex, ReentrantMutex};
use tracing::debug;

use super::entity::EventLoop;
use super::handle::{LoopId, LoopIdGenerator, LoopRef, NativeLoop};

type Entries = RefCell<IndexMap<NativeLoop, Arc<EventLoop>>>;

/// Registry of live loops.
pub struct LoopRegistry<R = parking_lot::RawMutex, G = parking_lot::RawThreadId>
where
    R: RawMutex,
    G: GetThreadId,
{
    entries: ReentrantMutex<R, G, Entries>,
    ids: LoopIdGenerator,
}

impl LoopRegistry {
    /// Create an empty registry locked by parking_lot.
    pub fn new() -> Self {
        Self::with_raw_lock()
    }
}

impl Default for LoopRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, G> LoopRegistry<R, G>
where
    R: RawMutex,
    G: GetThreadId,
{
    /// Create an empty registry guarded by the raw lock `R`.
    pub fn with_raw_lock() -> Self {
        Self {
            entries: ReentrantMutex::new(RefCell::new(IndexMap::new())),
            ids: LoopIdGenerator::new(),
        }
    }

    /// Run `f` while holding the registry lock.
    ///
    /// Registry calls made from inside `f` on the same thread reenter the lock.
    pub fn locked<T>(
        &self,
        f: impl FnOnce(&Self) -> T,
    ) -> T {
        let _guard = self.entries.lock();
        f(self)
    }

    /// Issue an id for an entity about to be registered.
    #[inline]
    pub fn next_id(&self) -> LoopId {
        self.ids.next_id()
    }

    /// Append `entity` to the registry.
    ///
    /// # Panics
    ///
    /// Panics if an entity with the same native handle is already present.
    pub fn register(
        &self,
        entity: EventLoop,
    ) -> LoopRef {
        let guard = self.entries.lock();
        let mut entries = guard.borrow_mut();
        let native = entity.native();
        assert!(
            !entries.contains_key(&native),
            "native loop {} is already registered",
            native
        );
        let loop_ref = entity.loop_ref();
        entries.insert(native, Arc::new(entity));
        debug!(loop_ref = %loop_ref, loops = entries.len(), "loop registered");
        loop_ref
    }

    /// Remove the loop `loop_ref` names. Returns false if it is not registered.
    pub fn unregister(
        &self,
        loop_ref: &LoopRef,
    ) -> bool {
        self.take(loop_ref).is_some()
    }

    /// Remove and return the entity `loop_ref` names.
    ///
    /// An entity registered under the same native handle with a different id
    /// is left in place.
    pub(crate) fn take(
        &self,
        loop_ref: &LoopRef,
    ) -> Option<Arc<EventLoop>> {
        let guard = self.entries.lock();
        let mut entries = guard.borrow_mut();
        let current = entries
            .get(&loop_ref.native())
            .is_some_and(|entity| entity.id() == loop_ref.id());
        if current {
            entries.shift_remove(&loop_ref.native())
        } else {
            None
        }
    }

    /// Find the loop registered under `native`.
    pub fn lookup(
        &self,
        native: NativeLoop,
    ) -> Option<LoopRef> {
        let guard = self.entries.lock();
        let entries = guard.borrow();
        entries.get(&native).map(|entity| entity.loop_ref())
    }

    /// The first registered loop.
    pub fn main_loop(&self) -> Option<LoopRef> {
        let guard = self.entries.lock();
        let entries = guard.borrow();
        entries.first().map(|(_, entity)| entity.loop_ref())
    }

    /// Point-in-time copy of every registered loop, in registration order.
    ///
    /// Entries may tear down as soon as this returns; check
    /// [`is_valid`](Self::is_valid) before acting on one.
    pub fn snapshot(&self) -> Vec<LoopRef> {
        let guard = self.entries.lock();
        let entries = guard.borrow();
        entries.values().map(|entity| entity.loop_ref()).collect()
    }

    /// Whether `loop_ref` names a currently registered loop.
    pub fn is_valid(
        &self,
        loop_ref: &LoopRef,
    ) -> bool {
        self.entity(loop_ref).is_some()
    }

    /// Shared handle to the entity `loop_ref` names, if it is still registered.
    pub(crate) fn entity(
        &self,
        loop_ref: &LoopRef,
    ) -> Option<Arc<EventLoop>> {
        let guard = self.entries.lock();
        let entries = guard.borrow();
        entries
            .get(&loop_ref.native())
            .filter(|entity| entity.id() == loop_ref.id())
            .cloned()
    }

    /// Number of registered loops.
    pub fn len(&self) -> usize {
        self.entries.lock().borrow().len()
    }

    /// Whether no loop is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R, G> std::fmt::Debug for LoopRegistry<R, G>
where
    R: RawMutex,
    G: GetThreadId,
{
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("LoopRegistry")
            .field("loops", &self.snapshot())
            .finish()
    }
}
