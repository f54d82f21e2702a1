//! guestloop
//!
//! Embeds single-threaded guest run-loops in a host process and lets any
//! host thread schedule callbacks onto a specific loop's own thread.
//!
//! # Example
//!
//! ```no_run
//! use guestloop::util::config::HostConfig;
//!
//! fn main() -> guestloop::Result<()> {
//!     let embedding = guestloop::start(&HostConfig::default())?;
//!
//!     embedding.host.enqueue_on_main(|cx| {
//!         println!("hello from {}", cx.loop_ref());
//!         cx.request_stop();
//!     })?;
//!     embedding.launcher.wait();
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/guestloop")]
#![warn(rust_2018_idioms)]

// Public modules
pub mod embed;
pub mod engine;
pub mod runtime;

// Utility modules
pub mod util;

// Re-exports
pub use anyhow::{Context, Result};
pub use embed::{EmbedError, EmbedResult, Launcher, LoopEnv, LoopHost, StartConfig};
pub use engine::{GuestEngine, LoopPump, ThreadedEngine};
pub use runtime::{LoopContext, LoopRef, LoopRegistry, NativeLoop};

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::Select;
use tracing::debug;

use crate::util::config::HostConfig;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = "guestloop";

/// A started reference engine and the host its loops register with.
#[derive(Debug)]
pub struct Embedding {
    pub host: LoopHost,
    pub launcher: Launcher,
}

/// Start the reference engine as `config` describes and wait until its main
/// loop has registered.
pub fn start(config: &HostConfig) -> Result<Embedding> {
    let host = LoopHost::new();
    let engine = ThreadedEngine::new(host.clone()).with_worker_loops(config.worker_loops);
    let launcher =
        Launcher::new(Arc::new(engine)).with_search_path_var(config.search_path_var.clone());
    launcher
        .start(&config.start)
        .context("Failed to start guest engine")?;
    debug!(workers = config.worker_loops, "waiting for main loop");
    wait_for_main_loop(&host, &launcher, Duration::from_secs(10))?;
    Ok(Embedding { host, launcher })
}

/// Block until `host` has a main loop, the launch thread ends, or `timeout`
/// elapses.
pub fn wait_for_main_loop(
    host: &LoopHost,
    launcher: &Launcher,
    timeout: Duration,
) -> Result<LoopRef> {
    // Subscribe before checking so a registration in between is not missed.
    let registered = host.watch();
    if let Some(main) = host.registry().main_loop() {
        return Ok(main);
    }
    let Some(exited) = launcher.exit_signal() else {
        anyhow::bail!("guest engine is not running");
    };

    let deadline = Instant::now() + timeout;
    loop {
        let mut select = Select::new();
        let registered_index = select.recv(&registered);
        let exited_index = select.recv(&exited);
        let op = match select.select_deadline(deadline) {
            Ok(op) => op,
            Err(_) => anyhow::bail!("timed out waiting for the main loop"),
        };

        if op.index() == registered_index {
            // The host keeps the sender, so this never disconnects.
            let _ = op.recv(&registered);
            if let Some(main) = host.registry().main_loop() {
                return Ok(main);
            }
        } else if op.index() == exited_index {
            let _ = op.recv(&exited);
            // The engine may have registered just before exiting.
            return host
                .registry()
                .main_loop()
                .context("guest engine exited before its main loop started");
        }
    }
}
