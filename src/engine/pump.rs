//! Caller-driven loop environment.
//!
//! A `LoopPump` is a [`LoopEnv`] that does nothing on its own: whoever owns
//! it decides when to wait for activations and when to run them. The
//! threaded engine drives one per loop thread; embedders with their own
//! event loop can pump it from there.

use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam::channel::{Receiver, Select, TryRecvError};
use tracing::debug;

use crate::embed::{CleanupHook, EnvError, LoopEnv};
use crate::runtime::{ActivationPort, Dispatch, LoopContext, NativeLoop};

static NEXT_NATIVE: AtomicUsize = AtomicUsize::new(1);

/// Why [`LoopPump::wait`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// An activation port is ready.
    Activation,
    /// The stop channel received a message or disconnected.
    Stop,
}

/// Caller-driven [`LoopEnv`].
pub struct LoopPump {
    native: NativeLoop,
    ports: RefCell<Vec<ActivationPort>>,
    cleanup_hooks: RefCell<Vec<CleanupHook>>,
    closed: Cell<bool>,
}

impl LoopPump {
    /// Create a pump with a fresh native handle.
    pub fn new() -> Self {
        Self::with_native(NativeLoop::from_raw(
            NEXT_NATIVE.fetch_add(1, Ordering::Relaxed),
        ))
    }

    /// Create a pump that reports `native` as its loop handle.
    pub fn with_native(native: NativeLoop) -> Self {
        Self {
            native,
            ports: RefCell::new(Vec::new()),
            cleanup_hooks: RefCell::new(Vec::new()),
            closed: Cell::new(false),
        }
    }

    #[inline]
    pub fn native(&self) -> NativeLoop {
        self.native
    }

    /// Number of attached activation ports that are still open.
    pub fn port_count(&self) -> usize {
        self.ports.borrow().len()
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    /// Dispatch every attached port once without blocking.
    ///
    /// Returns the number of work items executed. Ports whose handle is gone
    /// are dropped.
    pub fn run_pending(
        &self,
        cx: &mut LoopContext,
    ) -> usize {
        let mut executed = 0;
        self.ports.borrow_mut().retain_mut(|port| match port.dispatch(cx) {
            Dispatch::Idle => true,
            Dispatch::Drained(count) => {
                executed += count;
                true
            }
            Dispatch::Closed => {
                debug!(label = port.label(), "activation port closed");
                false
            }
        });
        executed
    }

    /// Block until a port is ready or `stop` fires.
    ///
    /// A stop message is consumed. Readiness on a port may be spurious;
    /// [`run_pending`](Self::run_pending) then finds nothing to do.
    pub fn wait(
        &self,
        stop: &Receiver<()>,
    ) -> Wake {
        let ports = self.ports.borrow();
        let mut select = Select::new();
        for port in ports.iter() {
            select.recv(port.receiver());
        }
        let stop_index = select.recv(stop);
        loop {
            if select.ready() != stop_index {
                return Wake::Activation;
            }
            // `ready` can report spuriously; only a message or a
            // disconnect counts as a stop.
            match stop.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => return Wake::Stop,
                Err(TryRecvError::Empty) => continue,
            }
        }
    }

    /// Run cleanup hooks, newest first, and drop every port. Idempotent.
    pub fn close(&self) {
        if self.closed.replace(true) {
            return;
        }
        let hooks = std::mem::take(&mut *self.cleanup_hooks.borrow_mut());
        for hook in hooks.into_iter().rev() {
            hook();
        }
        self.ports.borrow_mut().clear();
    }
}

impl Default for LoopPump {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LoopPump {
    fn drop(&mut self) {
        self.close();
    }
}

impl LoopEnv for LoopPump {
    fn native_loop(&self) -> Result<NativeLoop, EnvError> {
        if self.is_closed() {
            return Err(EnvError::LoopUnavailable);
        }
        Ok(self.native)
    }

    fn attach_activation(
        &self,
        port: ActivationPort,
    ) -> Result<(), EnvError> {
        if self.is_closed() {
            return Err(EnvError::Closing);
        }
        self.ports.borrow_mut().push(port);
        Ok(())
    }

    fn add_cleanup_hook(
        &self,
        hook: CleanupHook,
    ) -> Result<(), EnvError> {
        if self.is_closed() {
            return Err(EnvError::Closing);
        }
        self.cleanup_hooks.borrow_mut().push(hook);
        Ok(())
    }
}

impl std::fmt::Debug for LoopPump {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("LoopPump")
            .field("native", &self.native)
            .field("ports", &self.port_count())
            .field("closed", &self.closed.get())
            .finish()
    }
}
