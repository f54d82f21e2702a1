//! Reference engine: one thread per loop.

use std::io;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{bounded, Receiver, Sender};
use tracing::{debug, error, info};

use super::pump::{LoopPump, Wake};
use super::GuestEngine;
use crate::embed::LoopHost;
use crate::runtime::{LoopContext, LoopRef};

/// How a loop thread ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopExit {
    Stopped,
    InitFailed,
}

struct LoopThread {
    handle: JoinHandle<LoopExit>,
    stop: Sender<()>,
}

/// Engine that runs the main loop and `worker_loops` extra loops, each on
/// its own thread.
///
/// The main loop registers before any worker starts. A work item calling
/// [`LoopContext::request_stop`] on the main loop shuts the whole engine
/// down; on a worker it stops just that worker.
#[derive(Debug, Clone)]
pub struct ThreadedEngine {
    host: LoopHost,
    worker_loops: usize,
}

impl ThreadedEngine {
    /// Create an engine that registers its loops with `host`.
    pub fn new(host: LoopHost) -> Self {
        Self {
            host,
            worker_loops: 0,
        }
    }

    /// Run `count` worker loops next to the main loop.
    pub fn with_worker_loops(
        mut self,
        count: usize,
    ) -> Self {
        self.worker_loops = count;
        self
    }

    #[inline]
    pub fn host(&self) -> &LoopHost {
        &self.host
    }

    #[inline]
    pub fn worker_loops(&self) -> usize {
        self.worker_loops
    }

    /// Spawn loop `index` and wait until it has registered (or failed to).
    fn spawn_loop(
        &self,
        index: usize,
    ) -> io::Result<(LoopThread, Option<LoopRef>)> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (started_tx, started_rx) = bounded::<Option<LoopRef>>(1);
        let host = self.host.clone();
        let handle = thread::Builder::new()
            .name(format!("guestloop-loop-{}", index))
            .spawn(move || run_loop(host, stop_rx, started_tx))?;
        let started = started_rx.recv().ok().flatten();
        Ok((
            LoopThread {
                handle,
                stop: stop_tx,
            },
            started,
        ))
    }
}

impl GuestEngine for ThreadedEngine {
    fn launch(
        &self,
        argv: &[String],
    ) -> i32 {
        debug!(?argv, "guest engine arguments");

        let main = match self.spawn_loop(0) {
            Ok((main, Some(main_ref))) => {
                info!(loop_ref = %main_ref, "main loop running");
                main
            }
            Ok((main, None)) => {
                join_loop(main);
                return 1;
            }
            Err(err) => {
                error!(error = %err, "failed to spawn main loop thread");
                return 1;
            }
        };

        let mut code = 0;
        let mut workers = Vec::with_capacity(self.worker_loops);
        for index in 1..=self.worker_loops {
            match self.spawn_loop(index) {
                Ok((worker, started)) => {
                    if started.is_none() {
                        code = 1;
                    }
                    workers.push(worker);
                }
                Err(err) => {
                    error!(error = %err, index, "failed to spawn worker loop thread");
                    code = 1;
                }
            }
        }

        if !join_loop(main) {
            code = 1;
        }
        for worker in &workers {
            let _ = worker.stop.try_send(());
        }
        for worker in workers {
            if !join_loop(worker) {
                code = 1;
            }
        }
        code
    }
}

/// Join a loop thread. Returns true if it started and stopped cleanly.
fn join_loop(loop_thread: LoopThread) -> bool {
    match loop_thread.handle.join() {
        Ok(LoopExit::Stopped) => true,
        Ok(LoopExit::InitFailed) => false,
        Err(_) => {
            error!("loop thread panicked");
            false
        }
    }
}

fn run_loop(
    host: LoopHost,
    stop: Receiver<()>,
    started: Sender<Option<LoopRef>>,
) -> LoopExit {
    let pump = LoopPump::new();
    let loop_ref = match host.on_loop_start(&pump) {
        Ok(loop_ref) => loop_ref,
        Err(err) => {
            error!(error = %err, "loop failed to start");
            let _ = started.send(None);
            return LoopExit::InitFailed;
        }
    };
    let _ = started.send(Some(loop_ref));

    let mut cx = LoopContext::new(loop_ref);
    loop {
        match pump.wait(&stop) {
            Wake::Stop => break,
            Wake::Activation => {
                pump.run_pending(&mut cx);
                if cx.stop_requested() {
                    break;
                }
            }
        }
    }

    pump.close();
    debug!(loop_ref = %loop_ref, passes = cx.drain_passes(), "loop exited");
    LoopExit::Stopped
}
