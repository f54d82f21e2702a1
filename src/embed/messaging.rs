//! Named-event messaging surface.
//!
//! Only the boundary is declared here. How events are matched, how a
//! response finds its request, and how receivers are registered per event
//! have not been designed yet, so the one implementation refuses every call.

use serde_json::Value;

use crate::embed::errors::{EmbedError, EmbedResult};

/// Callback invoked with an incoming event payload.
pub type EventReceiver = Box<dyn Fn(Value) + Send + Sync + 'static>;

/// Send/receive pair for named events between host and guest.
pub trait EventMessenger: Send + Sync {
    /// Send `payload` under `event`.
    fn send(
        &self,
        event: &str,
        payload: Value,
    ) -> EmbedResult<()>;

    /// Install `receiver` for `event`.
    fn set_receiver(
        &self,
        event: &str,
        receiver: EventReceiver,
    ) -> EmbedResult<()>;
}

/// Messenger that reports [`EmbedError::MessagingUnavailable`] for every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnimplementedMessenger;

impl EventMessenger for UnimplementedMessenger {
    fn send(
        &self,
        event: &str,
        _payload: Value,
    ) -> EmbedResult<()> {
        Err(EmbedError::MessagingUnavailable {
            event: event.to_string(),
        })
    }

    fn set_receiver(
        &self,
        event: &str,
        _receiver: EventReceiver,
    ) -> EmbedResult<()> {
        Err(EmbedError::MessagingUnavailable {
            event: event.to_string(),
        })
    }
}
