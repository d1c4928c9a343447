//! Capabilities a plugin uses to reach its host.
//!
//! Handlers depend on the [`Host`] trait rather than on the stdio transport,
//! so they can be exercised with a recording double. The channel's own
//! writer implements it by emitting event and `host_call` lines.

use crate::error::HostError;
use crate::protocol::Params;

/// Outbound capabilities available to handlers.
pub trait Host {
    /// Emits a plugin-defined event to the host.
    ///
    /// # Errors
    ///
    /// Returns an error if the event type is reserved, the payload sets an
    /// envelope key such as `type` or `messageId`, or the message cannot be
    /// delivered.
    fn emit_event(&mut self, event_type: &str, payload: Params) -> Result<(), HostError>;

    /// Asks the host to perform an action such as showing a notification.
    ///
    /// Calls are fire-and-forget: the host does not reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the call cannot be delivered.
    fn call_host_api(&mut self, method: &str, params: Params) -> Result<(), HostError>;
}

/// Host double that records everything sent through it.
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Default, Clone)]
pub struct RecordingHost {
    /// Events in emission order.
    pub events: Vec<(String, Params)>,
    /// Host API calls in emission order.
    pub calls: Vec<(String, Params)>,
}

#[cfg(any(test, feature = "test-support"))]
impl RecordingHost {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded events of the given type.
    #[must_use]
    pub fn events_of(&self, event_type: &str) -> Vec<&Params> {
        self.events
            .iter()
            .filter(|(kind, _)| kind == event_type)
            .map(|(_, payload)| payload)
            .collect()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Host for RecordingHost {
    fn emit_event(&mut self, event_type: &str, payload: Params) -> Result<(), HostError> {
        crate::protocol::check_event(event_type, &payload)?;
        self.events.push((event_type.to_owned(), payload));
        Ok(())
    }

    fn call_host_api(&mut self, method: &str, params: Params) -> Result<(), HostError> {
        self.calls.push((method.to_owned(), params));
        Ok(())
    }
}
