//! Handler context combining session state and host capabilities.

use crate::error::HostError;
use crate::host::Host;
use crate::protocol::{MessageId, Params};
use crate::session::{PluginIdentity, Session, Settings};

/// Everything a handler may touch while processing one message.
///
/// The channel builds a fresh context per message; tests can build one over
/// a hand-made [`Session`] and any [`Host`] double.
pub struct Context<'a> {
    session: &'a mut Session,
    host: &'a mut dyn Host,
    message_id: Option<&'a MessageId>,
}

impl<'a> Context<'a> {
    /// Creates a context for a message without a correlation token.
    pub fn new(session: &'a mut Session, host: &'a mut dyn Host) -> Self {
        Self {
            session,
            host,
            message_id: None,
        }
    }

    /// Attaches the correlation token of the message being handled.
    #[must_use]
    pub fn with_message_id(mut self, message_id: Option<&'a MessageId>) -> Self {
        self.message_id = message_id;
        self
    }

    /// Returns the correlation token of the message being handled.
    #[must_use]
    pub const fn message_id(&self) -> Option<&MessageId> {
        self.message_id
    }

    /// Returns the plugin identity.
    #[must_use]
    pub fn identity(&self) -> &PluginIdentity {
        self.session.identity()
    }

    /// Returns the session.
    #[must_use]
    pub fn session(&self) -> &Session {
        &*self.session
    }

    /// Returns the session for modification.
    pub fn session_mut(&mut self) -> &mut Session {
        &mut *self.session
    }

    /// Reads the host-provided settings.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        self.session.settings()
    }

    /// Returns the settings for modification.
    pub fn settings_mut(&mut self) -> &mut Settings {
        self.session.settings_mut()
    }

    /// Emits a plugin-defined event.
    ///
    /// # Errors
    ///
    /// See [`Host::emit_event`].
    pub fn emit_event(&mut self, event_type: &str, payload: Params) -> Result<(), HostError> {
        self.host.emit_event(event_type, payload)
    }

    /// Calls a host API.
    ///
    /// # Errors
    ///
    /// See [`Host::call_host_api`].
    pub fn call_host_api(&mut self, method: &str, params: Params) -> Result<(), HostError> {
        self.host.call_host_api(method, params)
    }
}
