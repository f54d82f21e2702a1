//! Activation bridge.
//!
//! An [`ActivationHandle`] is the cross-thread half: any thread may signal it
//! to ask a loop to run a drain pass. The matching [`ActivationPort`] lives on
//! the loop's thread and runs the drain function when a signal arrives.
//!
//! The channel between them holds at most one wake token. A signal raised
//! while a token is already pending reports [`SignalStatus::Saturated`]; the
//! pending pass will pick up whatever was queued before it runs, so several
//! signals coalesce into one pass.
//!
//! ```text
//! Idle ──signal──▶ Signaled ──dispatch──▶ Draining ──done──▶ Idle
//!                      ▲                      │
//!                      └──────signal──────────┘
//! ```

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use crossbeam::channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use parking_lot::{Condvar, Mutex};
use tracing::trace;

use super::context::LoopContext;

/// Drain function bound to a port. Returns how many items the pass ran.
pub type DrainFn = Box<dyn FnMut(&mut LoopContext) -> usize + Send + 'static>;

/// Activation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationState {
    /// Nothing pending.
    Idle,
    /// A wake token is pending.
    Signaled,
    /// The loop is running a drain pass.
    Draining,
}

/// How [`ActivationHandle::signal`] behaves when a token is already pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalMode {
    /// Report [`SignalStatus::Saturated`] immediately.
    NonBlocking,
    /// Wait until the loop has consumed the pending token.
    Blocking,
}

/// Outcome of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalStatus {
    /// A new wake token was queued.
    Delivered,
    /// A token was already pending; the pending pass covers this signal.
    Saturated,
    /// The handle has been released.
    Closing,
    /// The loop dropped its port.
    Closed,
}

impl SignalStatus {
    /// Whether the queued work is guaranteed a future drain pass.
    #[inline]
    pub fn is_ok(&self) -> bool {
        matches!(self, SignalStatus::Delivered | SignalStatus::Saturated)
    }
}

/// How a handle is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseMode {
    /// Refuse new signals but let an already-pending pass run.
    Release,
    /// Refuse new signals and discard any pending token.
    Abort,
}

const OPEN: u8 = 0;
const RELEASED: u8 = 1;
const ABORTED: u8 = 2;

/// Result of [`ActivationPort::dispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// No token was pending.
    Idle,
    /// A drain pass ran this many items.
    Drained(usize),
    /// The handle is gone; the loop should drop the port.
    Closed,
}

/// State shared by both halves.
///
/// The state lock is held across every channel send and receive, so `Idle`
/// always means no wake token is pending.
#[derive(Debug)]
struct Shared {
    label: String,
    state: Mutex<ActivationState>,
    /// Notified whenever the port consumes a token or goes away.
    consumed: Condvar,
    release: AtomicU8,
    port_dropped: AtomicBool,
}

impl Shared {
    fn release_mode(&self) -> u8 {
        self.release.load(Ordering::Acquire)
    }
}

/// Create a connected handle/port pair bound to `drain`.
pub fn channel<F>(
    label: impl Into<String>,
    drain: F,
) -> (ActivationHandle, ActivationPort)
where
    F: FnMut(&mut LoopContext) -> usize + Send + 'static,
{
    let (tx, rx) = bounded(1);
    let shared = Arc::new(Shared {
        label: label.into(),
        state: Mutex::new(ActivationState::Idle),
        consumed: Condvar::new(),
        release: AtomicU8::new(OPEN),
        port_dropped: AtomicBool::new(false),
    });
    let handle = ActivationHandle {
        tx,
        shared: shared.clone(),
    };
    let port = ActivationPort {
        rx,
        shared,
        drain: Box::new(drain),
    };
    (handle, port)
}

/// Cross-thread half of the activation bridge.
#[derive(Debug)]
pub struct ActivationHandle {
    tx: Sender<()>,
    shared: Arc<Shared>,
}

impl ActivationHandle {
    /// Label the handle was created with.
    pub fn label(&self) -> &str {
        &self.shared.label
    }

    /// Current state of the state machine.
    pub fn state(&self) -> ActivationState {
        *self.shared.state.lock()
    }

    /// Whether [`release`](Self::release) has been called.
    pub fn is_released(&self) -> bool {
        self.shared.release_mode() != OPEN
    }

    /// Ask the loop to run a drain pass.
    pub fn signal(
        &self,
        mode: SignalMode,
    ) -> SignalStatus {
        let mut state = self.shared.state.lock();
        let status = loop {
            if self.is_released() {
                break SignalStatus::Closing;
            }
            if self.shared.port_dropped.load(Ordering::Acquire) {
                break SignalStatus::Closed;
            }
            match self.tx.try_send(()) {
                Ok(()) => {
                    *state = ActivationState::Signaled;
                    break SignalStatus::Delivered;
                }
                Err(TrySendError::Full(())) => match mode {
                    SignalMode::NonBlocking => break SignalStatus::Saturated,
                    SignalMode::Blocking => self.shared.consumed.wait(&mut state),
                },
                Err(TrySendError::Disconnected(())) => break SignalStatus::Closed,
            }
        };
        drop(state);
        trace!(label = %self.shared.label, ?status, "activation signal");
        status
    }

    /// Release the handle. Only the first call has any effect.
    pub fn release(
        &self,
        mode: ReleaseMode,
    ) {
        let target = match mode {
            ReleaseMode::Release => RELEASED,
            ReleaseMode::Abort => ABORTED,
        };
        let released = self
            .shared
            .release
            .compare_exchange(OPEN, target, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if released {
            // Under the lock so a signaller about to wait cannot miss it.
            let _state = self.shared.state.lock();
            self.shared.consumed.notify_all();
        }
    }
}

impl Drop for ActivationHandle {
    fn drop(&mut self) {
        self.release(ReleaseMode::Abort);
    }
}

/// Loop-side half of the activation bridge.
pub struct ActivationPort {
    rx: Receiver<()>,
    shared: Arc<Shared>,
    drain: DrainFn,
}

impl ActivationPort {
    /// Label the pair was created with.
    pub fn label(&self) -> &str {
        &self.shared.label
    }

    /// Receiver to block on, e.g. from a `crossbeam::channel::Select`.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.rx
    }

    /// Consume a pending wake token, if any, and run the drain function.
    pub fn dispatch(
        &mut self,
        cx: &mut LoopContext,
    ) -> Dispatch {
        let mut state = self.shared.state.lock();
        match self.rx.try_recv() {
            Ok(()) => {
                self.shared.consumed.notify_all();
                if self.shared.release_mode() == ABORTED {
                    *state = ActivationState::Idle;
                    return Dispatch::Closed;
                }
                *state = ActivationState::Draining;
                drop(state);

                let count = (self.drain)(cx);

                // A signal raised during the pass left the state at Signaled.
                let mut state = self.shared.state.lock();
                if *state == ActivationState::Draining {
                    *state = ActivationState::Idle;
                }
                Dispatch::Drained(count)
            }
            Err(TryRecvError::Empty) if self.shared.release_mode() == OPEN => Dispatch::Idle,
            Err(_) => Dispatch::Closed,
        }
    }

    /// Whether the state and the channel agree: `Idle` with no token pending.
    #[cfg(test)]
    pub(crate) fn is_settled(&self) -> bool {
        let state = self.shared.state.lock();
        *state != ActivationState::Idle || self.rx.is_empty()
    }
}

impl Drop for ActivationPort {
    fn drop(&mut self) {
        let _state = self.shared.state.lock();
        self.shared.port_dropped.store(true, Ordering::Release);
        self.shared.consumed.notify_all();
    }
}

impl std::fmt::Debug for ActivationPort {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ActivationPort")
            .field("label", &self.shared.label)
            .field("state", &*self.shared.state.lock())
            .finish()
    }
}
