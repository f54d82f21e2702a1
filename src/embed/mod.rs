//! Host-side embedding surface
//!
//! - [`LoopHost`] - enqueue protocol and loop lifecycle hooks
//! - [`LoopEnv`] - what an engine provides to each loop's start hook
//! - [`Launcher`] - starts a guest engine on a dedicated thread
//! - [`EventMessenger`] - named-event messaging boundary (not implemented)

pub mod env;
pub mod errors;
pub mod host;
pub mod launcher;
pub mod messaging;

pub use env::{CleanupHook, EnvError, LoopEnv};
pub use errors::{EmbedError, EmbedResult, InitStage};
pub use host::LoopHost;
pub use launcher::{
    argument_count, build_argv, merge_search_path, Launcher, StartConfig, BOOTSTRAP_ARGS,
    BOOTSTRAP_EXPRESSION, DEFAULT_SEARCH_PATH_VAR,
};
pub use messaging::{EventMessenger, EventReceiver, UnimplementedMessenger};
