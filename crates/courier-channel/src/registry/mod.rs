//! Handler registries for commands, host events and shutdown hooks.
//!
//! New commands are added by registration rather than by editing the
//! dispatch loop. Names are unique; a second registration under the same
//! name is rejected. Event handlers may not claim protocol message types.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use crate::context::Context;
use crate::error::{HandlerError, RegistryError};
use crate::protocol::{Params, is_reserved_type};
use crate::session::Session;

/// Name of the built-in identity command.
pub const GET_INFO: &str = "getInfo";

/// Handler for an `execute` command.
///
/// Implemented for plain functions and closures with the matching signature.
pub trait CommandHandler {
    /// Runs the command and returns its result payload.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] when the command cannot complete; the
    /// channel reports it as an `error` reply.
    fn call(&self, params: &Params, context: &mut Context<'_>) -> Result<Value, HandlerError>;
}

impl<F> CommandHandler for F
where
    F: Fn(&Params, &mut Context<'_>) -> Result<Value, HandlerError>,
{
    fn call(&self, params: &Params, context: &mut Context<'_>) -> Result<Value, HandlerError> {
        self(params, context)
    }
}

/// Handler for an inbound host event.
pub trait EventHandler {
    /// Reacts to the event. The payload is every field of the inbound
    /// message outside the envelope.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] when the event cannot be processed.
    fn call(&self, payload: &Params, context: &mut Context<'_>) -> Result<(), HandlerError>;
}

impl<F> EventHandler for F
where
    F: Fn(&Params, &mut Context<'_>) -> Result<(), HandlerError>,
{
    fn call(&self, payload: &Params, context: &mut Context<'_>) -> Result<(), HandlerError> {
        self(payload, context)
    }
}

/// Hook run when the channel terminates, before `shutdown_ack` is written.
pub trait ShutdownHook {
    /// Performs cleanup such as persisting settings.
    ///
    /// # Errors
    ///
    /// Failures are logged and do not prevent the acknowledgement.
    fn on_shutdown(&self, session: &mut Session) -> Result<(), HandlerError>;
}

impl<F> ShutdownHook for F
where
    F: Fn(&mut Session) -> Result<(), HandlerError>,
{
    fn on_shutdown(&self, session: &mut Session) -> Result<(), HandlerError> {
        self(session)
    }
}

/// Returns the static identity metadata of the plugin.
///
/// # Errors
///
/// Never fails; the signature matches [`CommandHandler`].
pub fn get_info(_params: &Params, context: &mut Context<'_>) -> Result<Value, HandlerError> {
    Ok(context.identity().info_payload())
}

/// Commands, event handlers and shutdown hooks known to a channel.
///
/// # Example
///
/// ```
/// use courier_channel::{Context, HandlerError, Params, Registry};
/// use serde_json::{Value, json};
///
/// fn echo(params: &Params, _context: &mut Context<'_>) -> Result<Value, HandlerError> {
///     Ok(json!({ "echo": params }))
/// }
///
/// let mut registry = Registry::with_builtins();
/// registry.register_command("echo", echo).expect("registration succeeds");
/// assert!(registry.has_command("getInfo"));
/// assert!(registry.register_command("echo", echo).is_err());
/// ```
#[derive(Default)]
pub struct Registry {
    commands: HashMap<String, Box<dyn CommandHandler>>,
    events: HashMap<String, Box<dyn EventHandler>>,
    shutdown_hooks: Vec<Box<dyn ShutdownHook>>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in `getInfo` command.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .commands
            .insert(GET_INFO.to_owned(), Box::new(get_info));
        registry
    }

    /// Registers a command handler.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateCommand`] if the name is taken and
    /// [`RegistryError::EmptyName`] if it is blank.
    pub fn register_command(
        &mut self,
        name: impl Into<String>,
        handler: impl CommandHandler + 'static,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.commands.contains_key(&name) {
            return Err(RegistryError::DuplicateCommand { name });
        }
        self.commands.insert(name, Box::new(handler));
        Ok(())
    }

    /// Registers a handler for an inbound event type.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::ReservedEventType`] for protocol message
    /// types and [`RegistryError::DuplicateEvent`] if the type is taken.
    pub fn register_event(
        &mut self,
        event_type: impl Into<String>,
        handler: impl EventHandler + 'static,
    ) -> Result<(), RegistryError> {
        let event_type = event_type.into();
        if is_reserved_type(&event_type) {
            return Err(RegistryError::ReservedEventType { event_type });
        }
        if self.events.contains_key(&event_type) {
            return Err(RegistryError::DuplicateEvent { event_type });
        }
        self.events.insert(event_type, Box::new(handler));
        Ok(())
    }

    /// Adds a hook run on termination. Hooks run in registration order.
    pub fn on_shutdown(&mut self, hook: impl ShutdownHook + 'static) {
        self.shutdown_hooks.push(Box::new(hook));
    }

    /// Looks up a command handler.
    #[must_use]
    pub fn command(&self, name: &str) -> Option<&dyn CommandHandler> {
        self.commands.get(name).map(Box::as_ref)
    }

    /// Looks up an event handler.
    #[must_use]
    pub fn event(&self, event_type: &str) -> Option<&dyn EventHandler> {
        self.events.get(event_type).map(Box::as_ref)
    }

    /// Returns `true` when a command with this name is registered.
    #[must_use]
    pub fn has_command(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Returns the registered command names in sorted order.
    #[must_use]
    pub fn command_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the registered event types in sorted order.
    #[must_use]
    pub fn event_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.events.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub(crate) fn shutdown_hooks(&self) -> impl Iterator<Item = &dyn ShutdownHook> {
        self.shutdown_hooks.iter().map(Box::as_ref)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Registry")
            .field("commands", &self.command_names())
            .field("events", &self.event_types())
            .field("shutdown_hooks", &self.shutdown_hooks.len())
            .finish()
    }
}
