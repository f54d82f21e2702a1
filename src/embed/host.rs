//! Loop host: enqueue protocol and lifecycle hooks.

use std::sync::Arc;
use std::thread;

use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::embed::env::{EnvError, LoopEnv};
use crate::embed::errors::{EmbedError, EmbedResult, InitStage};
use crate::runtime::{
    activation, EventLoop, LoopContext, LoopRef, LoopRegistry, NativeLoop, ReleaseMode,
    SignalMode, WorkQueue,
};

/// Shared service that owns the loop registry.
///
/// Cloning is cheap; every clone talks to the same registry. The engine
/// calls [`on_loop_start`](Self::on_loop_start) from each loop's thread,
/// and any thread may enqueue work.
#[derive(Debug, Clone, Default)]
pub struct LoopHost {
    registry: Arc<LoopRegistry>,
    watchers: Arc<Mutex<Vec<Sender<LoopRef>>>>,
}

impl LoopHost {
    /// Create a host with a fresh registry.
    pub fn new() -> Self {
        Self::with_registry(Arc::new(LoopRegistry::new()))
    }

    /// Create a host around an existing registry.
    pub fn with_registry(registry: Arc<LoopRegistry>) -> Self {
        Self {
            registry,
            watchers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The registry this host manages.
    #[inline]
    pub fn registry(&self) -> &LoopRegistry {
        &self.registry
    }

    /// Queue `work` on the main loop.
    pub fn enqueue_on_main<F>(
        &self,
        work: F,
    ) -> EmbedResult<()>
    where
        F: FnOnce(&mut LoopContext) + Send + 'static,
    {
        self.registry.locked(|registry| {
            let main = registry.main_loop().ok_or(EmbedError::NoMainLoop)?;
            self.enqueue_on_loop(&main, work)
        })
    }

    /// Queue `work` on the loop `loop_ref` names and wake that loop.
    ///
    /// Returns as soon as the item is queued. The item runs exactly once on
    /// the loop's thread, or never if the loop tears down first.
    pub fn enqueue_on_loop<F>(
        &self,
        loop_ref: &LoopRef,
        work: F,
    ) -> EmbedResult<()>
    where
        F: FnOnce(&mut LoopContext) + Send + 'static,
    {
        self.registry.locked(|registry| {
            let entity = registry
                .entity(loop_ref)
                .ok_or(EmbedError::InvalidLoop(*loop_ref))?;
            entity.queue().push(Box::new(work));
            let status = entity.activation().signal(SignalMode::NonBlocking);
            trace!(loop_ref = %loop_ref, ?status, "work queued");
            if status.is_ok() {
                Ok(())
            } else {
                Err(EmbedError::ActivationFailure {
                    loop_ref: *loop_ref,
                    status,
                })
            }
        })
    }

    /// Start hook, called on a loop's own thread as the loop initializes.
    ///
    /// Nothing is registered unless every step succeeds.
    pub fn on_loop_start(
        &self,
        env: &dyn LoopEnv,
    ) -> EmbedResult<LoopRef> {
        let thread_id = thread::current().id();
        let native = env.native_loop().map_err(init_error(InitStage::NativeLoop))?;

        let queue = Arc::new(WorkQueue::new());
        let drain_queue = queue.clone();
        let (handle, port) = activation::channel(
            format!("guestloop queue activation: {:?}", thread_id),
            move |cx: &mut LoopContext| drain_queue.drain(cx),
        );
        env.attach_activation(port)
            .map_err(init_error(InitStage::Activation))?;

        let id = self.registry.next_id();
        let host = self.clone();
        let hook = Box::new(move || {
            // Keyed by id too: the native handle may be reused later.
            host.teardown_loop(&LoopRef::new(id, native, thread_id));
        });
        if let Err(source) = env.add_cleanup_hook(hook) {
            handle.release(ReleaseMode::Abort);
            return Err(init_error(InitStage::CleanupHook)(source));
        }

        let entity = EventLoop::new(id, native, thread_id, queue, handle);
        let loop_ref = self.registry.register(entity);
        debug!(loop_ref = %loop_ref, thread = ?thread_id, "loop started");
        self.watchers
            .lock()
            .retain(|watcher| watcher.send(loop_ref).is_ok());
        Ok(loop_ref)
    }

    /// Receive every loop registered from now on.
    ///
    /// Loops already in the registry are not replayed; check
    /// [`LoopRegistry::main_loop`] after subscribing.
    pub fn watch(&self) -> Receiver<LoopRef> {
        let (tx, rx) = unbounded();
        self.watchers.lock().push(tx);
        rx
    }

    /// Teardown hook. Returns false if no loop is registered under `native`.
    ///
    /// Pending work on the loop is dropped without running.
    pub fn on_loop_teardown(
        &self,
        native: NativeLoop,
    ) -> bool {
        self.registry.locked(|registry| match registry.lookup(native) {
            Some(loop_ref) => self.teardown_loop(&loop_ref),
            None => false,
        })
    }

    /// Tear down the loop `loop_ref` names. Returns false if that loop is no
    /// longer registered, even if another loop now holds its native handle.
    pub fn teardown_loop(
        &self,
        loop_ref: &LoopRef,
    ) -> bool {
        self.registry.locked(|registry| {
            let Some(entity) = registry.take(loop_ref) else {
                return false;
            };
            entity.activation().release(ReleaseMode::Abort);
            let discarded = entity.queue().discard();
            debug!(loop_ref = %entity.loop_ref(), discarded, "loop torn down");
            true
        })
    }
}

fn init_error(stage: InitStage) -> impl FnOnce(EnvError) -> EmbedError {
    move |source| {
        warn!(%stage, error = %source, "loop initialization failed");
        EmbedError::LoopInit { stage, source }
    }
}
