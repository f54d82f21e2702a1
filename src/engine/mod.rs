//! Guest engines
//!
//! The launch call into a guest engine is opaque: it takes the argument
//! vector, blocks until the engine shuts down and returns an exit code.
//! [`ThreadedEngine`] is the engine this crate ships; it hosts loops on
//! dedicated threads and defines no guest semantics of its own.

pub mod pump;
pub mod threaded;

pub use pump::{LoopPump, Wake};
pub use threaded::ThreadedEngine;

/// A guest engine the [`Launcher`](crate::embed::Launcher) can start.
pub trait GuestEngine: Send + Sync + 'static {
    /// Run the engine to completion and return its exit code.
    fn launch(
        &self,
        argv: &[String],
    ) -> i32;
}

impl<F> GuestEngine for F
where
    F: Fn(&[String]) -> i32 + Send + Sync + 'static,
{
    fn launch(
        &self,
        argv: &[String],
    ) -> i32 {
        self(argv)
    }
}

#[cfg(test)]
mod tests;
