//! The plugin side of the host-plugin message channel.
//!
//! [`Channel`] owns the read loop. It announces the plugin with a single
//! `ready` line, then reads one line at a time, dispatches it and writes the
//! reply before reading the next. Nothing a handler does can end the loop:
//! failures and panics become `error` replies. Only `shutdown`, end of input
//! or a broken output stream stop it.

mod writer;

use std::any::Any;
use std::io::{BufRead, Write};
use std::panic::{self, AssertUnwindSafe};

use serde_json::json;
use tracing::{debug, info, trace, warn};

use crate::context::Context;
use crate::error::{ChannelError, HandlerError};
use crate::protocol::{
    EXECUTE, InboundMessage, MessageId, PING, Params, ProtocolMessage, SHUTDOWN, timestamp_now,
};
use crate::registry::Registry;
use crate::session::Session;

pub use self::writer::MessageWriter;

/// Tracing target for channel operations.
pub(crate) const CHANNEL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::channel");

/// Lifecycle of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Created; nothing has been written yet.
    Uninitialized,
    /// `ready` has been written; no input consumed yet.
    Ready,
    /// Processing inbound messages.
    Active,
    /// Stopped; no further input is read.
    Terminated,
}

/// Why the read loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelExit {
    /// The host sent `shutdown` and the acknowledgement was written.
    Shutdown,
    /// The host closed the input stream.
    InputClosed,
}

/// Whether the loop should keep reading after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next line.
    Continue,
    /// Stop reading.
    Terminate,
}

/// Sequential message channel over a line-oriented byte stream.
///
/// # Example
///
/// ```
/// use std::io::Cursor;
///
/// use courier_channel::{Channel, ChannelExit, PluginIdentity, Registry, Session};
///
/// let input = Cursor::new(b"{\"type\":\"shutdown\",\"messageId\":\"x1\"}\n".to_vec());
/// let mut output = Vec::new();
/// let session = Session::new(PluginIdentity::new("demo", "1.0.0", "Demo", "Example"));
///
/// let mut channel = Channel::new(input, &mut output, session, Registry::with_builtins());
/// assert_eq!(channel.run().expect("channel runs"), ChannelExit::Shutdown);
/// drop(channel);
///
/// let text = String::from_utf8(output).expect("utf8");
/// assert!(text.starts_with(r#"{"type":"ready""#));
/// assert!(text.ends_with("{\"type\":\"shutdown_ack\",\"messageId\":\"x1\"}\n"));
/// ```
pub struct Channel<R, W> {
    reader: R,
    writer: MessageWriter<W>,
    session: Session,
    registry: Registry,
    state: ChannelState,
}

impl<R: BufRead, W: Write> Channel<R, W> {
    /// Creates a channel in the [`ChannelState::Uninitialized`] state.
    pub const fn new(reader: R, writer: W, session: Session, registry: Registry) -> Self {
        Self {
            reader,
            writer: MessageWriter::new(writer),
            session,
            registry,
            state: ChannelState::Uninitialized,
        }
    }

    /// Returns the current lifecycle state.
    pub const fn state(&self) -> ChannelState {
        self.state
    }

    /// Returns the session state.
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Consumes the channel, returning the session and the output stream.
    pub fn into_parts(self) -> (Session, W) {
        (self.session, self.writer.into_inner())
    }

    /// Writes the `ready` announcement.
    ///
    /// Only the first call writes anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the announcement cannot be written.
    pub fn announce(&mut self) -> Result<(), ChannelError> {
        if self.state != ChannelState::Uninitialized {
            debug!(target: CHANNEL_TARGET, state = ?self.state, "ready already announced");
            return Ok(());
        }

        let identity = self.session.identity();
        self.writer.write_message(&ProtocolMessage::Ready {
            plugin_id: identity.id().to_owned(),
            version: identity.version().to_owned(),
        })?;
        self.state = ChannelState::Ready;
        info!(
            target: CHANNEL_TARGET,
            plugin_id = identity.id(),
            version = identity.version(),
            "plugin ready"
        );
        Ok(())
    }

    /// Announces the plugin and processes input until termination.
    ///
    /// # Errors
    ///
    /// Returns an error only for transport failures: the input cannot be
    /// read or the output cannot be written.
    pub fn run(&mut self) -> Result<ChannelExit, ChannelError> {
        if self.state == ChannelState::Terminated {
            return Ok(ChannelExit::Shutdown);
        }
        self.activate()?;

        let mut buffer = Vec::new();
        loop {
            buffer.clear();
            let bytes_read = self
                .reader
                .read_until(b'\n', &mut buffer)
                .map_err(ChannelError::read)?;

            if bytes_read == 0 {
                info!(target: CHANNEL_TARGET, "host closed the input stream");
                self.run_shutdown_hooks();
                self.state = ChannelState::Terminated;
                return Ok(ChannelExit::InputClosed);
            }

            if self.handle_bytes(&buffer)? == Flow::Terminate {
                return Ok(ChannelExit::Shutdown);
            }
        }
    }

    /// Processes a single inbound line.
    ///
    /// Announces the plugin first if that has not happened yet. Lines
    /// arriving after termination are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if a reply cannot be written.
    pub fn handle_line(&mut self, line: &str) -> Result<Flow, ChannelError> {
        if self.state == ChannelState::Terminated {
            debug!(target: CHANNEL_TARGET, "ignoring input after termination");
            return Ok(Flow::Terminate);
        }
        self.activate()?;

        if line.trim().is_empty() {
            trace!(target: CHANNEL_TARGET, "skipping blank line");
            return Ok(Flow::Continue);
        }

        match InboundMessage::parse(line) {
            Ok(message) => self.dispatch(&message),
            Err(failure) => {
                warn!(target: CHANNEL_TARGET, reason = %failure, "malformed message");
                self.reply_error(
                    failure.message_id,
                    format!("Failed to parse message: {}", failure.reason),
                )?;
                Ok(Flow::Continue)
            }
        }
    }

    fn activate(&mut self) -> Result<(), ChannelError> {
        self.announce()?;
        if self.state == ChannelState::Ready {
            self.state = ChannelState::Active;
        }
        Ok(())
    }

    fn handle_bytes(&mut self, bytes: &[u8]) -> Result<Flow, ChannelError> {
        match std::str::from_utf8(bytes) {
            Ok(line) => self.handle_line(line),
            Err(error) => {
                warn!(target: CHANNEL_TARGET, %error, "inbound line is not UTF-8");
                self.reply_error(None, format!("Failed to parse message: {error}"))?;
                Ok(Flow::Continue)
            }
        }
    }

    fn dispatch(&mut self, message: &InboundMessage) -> Result<Flow, ChannelError> {
        debug!(
            target: CHANNEL_TARGET,
            kind = message.kind(),
            message_id = ?message.message_id(),
            "dispatching message"
        );

        match message.kind() {
            PING => self.handle_ping(message.message_id()),
            EXECUTE => self.handle_execute(message),
            SHUTDOWN => self.handle_shutdown(message.message_id()),
            _ => self.handle_other(message),
        }
    }

    fn handle_ping(&mut self, message_id: Option<&MessageId>) -> Result<Flow, ChannelError> {
        let Some(message_id) = message_id else {
            return self.reject_missing_id(PING);
        };

        match timestamp_now() {
            Ok(timestamp) => self.writer.write_message(&ProtocolMessage::Pong {
                message_id: message_id.clone(),
                timestamp,
            })?,
            Err(error) => self.reply_error(
                Some(message_id.clone()),
                format!("Error handling message: {error}"),
            )?,
        }
        Ok(Flow::Continue)
    }

    fn handle_execute(&mut self, message: &InboundMessage) -> Result<Flow, ChannelError> {
        let Some(message_id) = message.message_id() else {
            return self.reject_missing_id(EXECUTE);
        };
        let command = message.command().unwrap_or_default();

        let Some(handler) = self.registry.command(command) else {
            warn!(target: CHANNEL_TARGET, command, "unknown command");
            self.writer.write_message(&ProtocolMessage::Response {
                message_id: message_id.clone(),
                result: json!({ "error": format!("Unknown command: {command}") }),
            })?;
            return Ok(Flow::Continue);
        };

        let empty = Params::new();
        let params = message.params().unwrap_or(&empty);
        let mut context =
            Context::new(&mut self.session, &mut self.writer).with_message_id(Some(message_id));
        let outcome = invoke(|| handler.call(params, &mut context));

        match outcome {
            Ok(result) => {
                debug!(target: CHANNEL_TARGET, command, %message_id, "command succeeded");
                self.writer.write_message(&ProtocolMessage::Response {
                    message_id: message_id.clone(),
                    result,
                })?;
            }
            Err(error) => {
                warn!(target: CHANNEL_TARGET, command, %message_id, %error, "command failed");
                self.reply_error(
                    Some(message_id.clone()),
                    format!("Error handling message: {error}"),
                )?;
            }
        }
        Ok(Flow::Continue)
    }

    fn handle_shutdown(&mut self, message_id: Option<&MessageId>) -> Result<Flow, ChannelError> {
        let Some(message_id) = message_id else {
            return self.reject_missing_id(SHUTDOWN);
        };

        info!(target: CHANNEL_TARGET, %message_id, "shutdown requested");
        self.run_shutdown_hooks();
        self.writer.write_message(&ProtocolMessage::ShutdownAck {
            message_id: message_id.clone(),
        })?;
        self.state = ChannelState::Terminated;
        Ok(Flow::Terminate)
    }

    fn handle_other(&mut self, message: &InboundMessage) -> Result<Flow, ChannelError> {
        let kind = message.kind();
        let message_id = message.message_id();

        let Some(handler) = self.registry.event(kind) else {
            warn!(target: CHANNEL_TARGET, kind, "unknown message type");
            self.reply_error(message_id.cloned(), format!("Unknown message type: {kind}"))?;
            return Ok(Flow::Continue);
        };

        let mut context =
            Context::new(&mut self.session, &mut self.writer).with_message_id(message_id);
        let outcome = invoke(|| handler.call(message.payload(), &mut context));

        if let Err(error) = outcome {
            warn!(target: CHANNEL_TARGET, kind, %error, "event handler failed");
            self.reply_error(
                message_id.cloned(),
                format!("Error handling message: {error}"),
            )?;
        }
        Ok(Flow::Continue)
    }

    fn reject_missing_id(&mut self, kind: &str) -> Result<Flow, ChannelError> {
        warn!(target: CHANNEL_TARGET, kind, "request without messageId");
        self.reply_error(None, format!("Missing messageId for {kind} message"))?;
        Ok(Flow::Continue)
    }

    fn reply_error(
        &mut self,
        message_id: Option<MessageId>,
        error: String,
    ) -> Result<(), ChannelError> {
        self.writer
            .write_message(&ProtocolMessage::error(message_id, error))
    }

    fn run_shutdown_hooks(&mut self) {
        for hook in self.registry.shutdown_hooks() {
            if let Err(error) = invoke(|| hook.on_shutdown(&mut self.session)) {
                warn!(target: CHANNEL_TARGET, %error, "shutdown hook failed");
            }
        }
    }
}

/// Runs a handler, turning a panic into [`HandlerError::Panicked`].
fn invoke<T>(call: impl FnOnce() -> Result<T, HandlerError>) -> Result<T, HandlerError> {
    panic::catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|payload| {
        Err(HandlerError::Panicked {
            message: panic_message(payload.as_ref()),
        })
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|text| (*text).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| String::from("non-string panic payload"))
}
