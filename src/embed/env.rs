//! Per-loop embedding API a hosting engine provides.

use thiserror::Error;

use crate::runtime::{ActivationPort, NativeLoop};

/// Hook run once when a loop tears down.
pub type CleanupHook = Box<dyn FnOnce() + Send + 'static>;

/// Errors a [`LoopEnv`] reports back to the start hook.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvError {
    #[error("loop handle is not available")]
    LoopUnavailable,

    #[error("loop is closing")]
    Closing,

    #[error("rejected by engine: {0}")]
    Rejected(String),
}

/// What the start hook needs from the engine running a loop.
///
/// Implementations are used from the loop's own thread only.
pub trait LoopEnv {
    /// Identity of the loop this environment belongs to.
    fn native_loop(&self) -> Result<NativeLoop, EnvError>;

    /// Take ownership of the loop side of an activation channel. The engine
    /// must call [`ActivationPort::dispatch`] whenever the port's receiver
    /// becomes ready.
    fn attach_activation(
        &self,
        port: ActivationPort,
    ) -> Result<(), EnvError>;

    /// Register `hook` to run when the loop tears down.
    fn add_cleanup_hook(
        &self,
        hook: CleanupHook,
    ) -> Result<(), EnvError>;
}
