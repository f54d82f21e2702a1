//! Embedding errors

use thiserror::Error;

use crate::embed::env::EnvError;
use crate::runtime::{LoopRef, SignalStatus};

/// Embedding result
pub type EmbedResult<T> = Result<T, EmbedError>;

/// Step of loop start-up that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStage {
    /// Resolving the native loop handle.
    NativeLoop,
    /// Attaching the activation port.
    Activation,
    /// Installing the teardown hook.
    CleanupHook,
}

impl std::fmt::Display for InitStage {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            InitStage::NativeLoop => write!(f, "native loop lookup"),
            InitStage::Activation => write!(f, "activation setup"),
            InitStage::CleanupHook => write!(f, "cleanup hook installation"),
        }
    }
}

/// Embedding errors
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("guest engine already started")]
    AlreadyStarted,

    #[error("too many arguments for the guest engine: {count}")]
    ArgumentOverflow { count: usize },

    #[error("main loop is not running")]
    NoMainLoop,

    #[error("attempting to queue work on invalid loop {0}")]
    InvalidLoop(LoopRef),

    #[error("failed to signal {loop_ref}: {status:?}")]
    ActivationFailure {
        loop_ref: LoopRef,
        status: SignalStatus,
    },

    #[error("loop initialization failed during {stage}: {source}")]
    LoopInit {
        stage: InitStage,
        #[source]
        source: EnvError,
    },

    #[error("failed to spawn launch thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("messaging is not available (event '{event}')")]
    MessagingUnavailable { event: String },
}
