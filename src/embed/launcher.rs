//! Guest engine launcher.
//!
//! Exports the module search path, builds the engine's argument vector and
//! runs the engine's blocking launch call on a dedicated thread. At most one
//! launch thread is active at a time.

use std::env;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{bounded, Receiver};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::embed::errors::{EmbedError, EmbedResult};
use crate::engine::GuestEngine;

/// Environment variable the module search path is exported through by default.
pub const DEFAULT_SEARCH_PATH_VAR: &str = "GUESTLOOP_PATH";

/// Expression the engine evaluates first; binds the native embedding module.
pub const BOOTSTRAP_EXPRESSION: &str = "\nconst native_embed = guestloop.binding(\"__native_embed\");\n";

/// Fixed arguments placed ahead of the caller's.
pub const BOOTSTRAP_ARGS: [&str; 3] = ["guestloop", "-e", BOOTSTRAP_EXPRESSION];

/// Start options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartConfig {
    /// Arguments passed to the engine after the bootstrap prefix
    #[serde(default)]
    pub process_arguments: Vec<String>,
    /// Paths prepended to the module search variable
    #[serde(default)]
    pub module_search_paths: Vec<String>,
}

/// Colon-join `paths` ahead of `previous`.
///
/// Returns `None` when there is nothing to add.
pub fn merge_search_path(
    paths: &[String],
    previous: Option<&str>,
) -> Option<String> {
    if paths.is_empty() {
        return None;
    }
    let mut merged = paths.join(":");
    if let Some(previous) = previous.filter(|p| !p.is_empty()) {
        merged.push(':');
        merged.push_str(previous);
    }
    Some(merged)
}

/// Argument count the engine will see, if it fits its signed 32-bit count.
pub fn argument_count(user_args: usize) -> EmbedResult<i32> {
    user_args
        .checked_add(BOOTSTRAP_ARGS.len())
        .and_then(|total| i32::try_from(total).ok())
        .ok_or(EmbedError::ArgumentOverflow { count: user_args })
}

/// Full argument vector: bootstrap prefix, then `args` in order.
pub fn build_argv(args: &[String]) -> Vec<String> {
    let mut argv = Vec::with_capacity(BOOTSTRAP_ARGS.len() + args.len());
    argv.extend(BOOTSTRAP_ARGS.iter().map(|arg| arg.to_string()));
    argv.extend(args.iter().cloned());
    argv
}

struct Launch {
    thread: JoinHandle<()>,
    /// Disconnects when the launch thread returns.
    done: Receiver<()>,
}

/// Starts a [`GuestEngine`] on its own thread.
pub struct Launcher {
    engine: Arc<dyn GuestEngine>,
    search_path_var: String,
    launch: Mutex<Option<Launch>>,
}

impl Launcher {
    /// Create a launcher for `engine`.
    pub fn new(engine: Arc<dyn GuestEngine>) -> Self {
        Self {
            engine,
            search_path_var: DEFAULT_SEARCH_PATH_VAR.to_string(),
            launch: Mutex::new(None),
        }
    }

    /// Export module search paths through `var` instead of the default.
    pub fn with_search_path_var(
        mut self,
        var: impl Into<String>,
    ) -> Self {
        self.search_path_var = var.into();
        self
    }

    /// Name of the module search variable.
    pub fn search_path_var(&self) -> &str {
        &self.search_path_var
    }

    /// Launch the engine.
    ///
    /// Fails with [`EmbedError::AlreadyStarted`] while a previous launch is
    /// still running and with [`EmbedError::ArgumentOverflow`] before touching
    /// the environment if the argument vector is too long.
    pub fn start(
        &self,
        config: &StartConfig,
    ) -> EmbedResult<()> {
        let mut launch = self.launch.lock();
        if let Some(current) = launch.take() {
            if !current.thread.is_finished() {
                *launch = Some(current);
                return Err(EmbedError::AlreadyStarted);
            }
            reap(current);
        }

        let argc = argument_count(config.process_arguments.len())?;
        self.export_search_paths(&config.module_search_paths);
        let argv = build_argv(&config.process_arguments);

        let engine = self.engine.clone();
        let (done_tx, done_rx) = bounded::<()>(0);
        let thread = thread::Builder::new()
            .name("guestloop-main".to_string())
            .spawn(move || {
                let _done = done_tx;
                info!(argc, "launching guest engine");
                let code = engine.launch(&argv);
                info!("guest engine exited with code {}", code);
            })?;

        *launch = Some(Launch {
            thread,
            done: done_rx,
        });
        Ok(())
    }

    /// Whether a launch thread is currently running.
    pub fn is_running(&self) -> bool {
        self.launch
            .lock()
            .as_ref()
            .is_some_and(|launch| !launch.thread.is_finished())
    }

    /// A receiver that disconnects when the current launch thread ends, or
    /// `None` if nothing was launched.
    pub fn exit_signal(&self) -> Option<Receiver<()>> {
        self.launch.lock().as_ref().map(|launch| launch.done.clone())
    }

    /// Block until the current launch thread ends. Returns false if there was
    /// nothing to wait for.
    ///
    /// The start mutex is not held while blocked, so a concurrent
    /// [`start`](Self::start) still reports [`EmbedError::AlreadyStarted`].
    pub fn wait(&self) -> bool {
        let done = match self.launch.lock().as_ref() {
            Some(launch) => launch.done.clone(),
            None => return false,
        };
        // Only ever disconnects.
        let _ = done.recv();

        let mut launch = self.launch.lock();
        if launch
            .as_ref()
            .is_some_and(|current| current.done.same_channel(&done))
        {
            if let Some(finished) = launch.take() {
                reap(finished);
            }
        }
        true
    }

    fn export_search_paths(
        &self,
        paths: &[String],
    ) {
        let previous = env::var(&self.search_path_var).ok();
        if let Some(merged) = merge_search_path(paths, previous.as_deref()) {
            debug!(var = %self.search_path_var, value = %merged, "module search path");
            env::set_var(&self.search_path_var, merged);
        }
    }
}

impl std::fmt::Debug for Launcher {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Launcher")
            .field("search_path_var", &self.search_path_var)
            .field("running", &self.is_running())
            .finish()
    }
}

fn reap(launch: Launch) {
    if launch.thread.join().is_err() {
        warn!("guest engine launch thread panicked");
    }
}
