//! Host-side driver for a plugin speaking the message protocol.
//!
//! [`PluginClient`] writes requests with generated `messageId` values and
//! reads replies until one carries the matching token. Events and host
//! calls arriving in between are buffered and can be drained with
//! [`PluginClient::take_pending`]. The client is blocking and handles one
//! outstanding request at a time, mirroring the plugin's sequential loop.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::error::HostError;
use crate::protocol::{InboundMessage, MessageId, OutboundMessage, Params, ProtocolMessage};

const CLIENT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::client");

/// Errors raised while talking to a plugin.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Reading from or writing to the plugin failed.
    #[error("plugin I/O failed: {0}")]
    Io(#[source] Arc<io::Error>),
    /// The plugin closed its output stream.
    #[error("plugin closed its output stream")]
    Closed,
    /// A line from the plugin was not a recognised message.
    #[error("plugin sent an undecodable line '{line}': {source}")]
    Decode {
        /// Raw line as received.
        line: String,
        /// Underlying parse error.
        #[source]
        source: Arc<serde_json::Error>,
    },
    /// A request could not be encoded.
    #[error("failed to encode request: {0}")]
    Encode(#[source] Arc<serde_json::Error>),
    /// The plugin answered the request with an `error` message.
    #[error("plugin reported an error: {message}")]
    Remote {
        /// Error text from the plugin.
        message: String,
    },
    /// An event could not be framed for sending.
    #[error("event rejected: {0}")]
    Event(#[from] HostError),
    /// The plugin answered with a message of the wrong kind.
    #[error("unexpected reply: {message}")]
    Unexpected {
        /// Description of what arrived.
        message: String,
    },
}

impl From<io::Error> for ClientError {
    fn from(error: io::Error) -> Self {
        Self::Io(Arc::new(error))
    }
}

/// Identity announced by the plugin's `ready` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    /// Plugin identifier.
    pub plugin_id: String,
    /// Plugin version.
    pub version: String,
}

/// Blocking client for a single plugin.
#[derive(Debug)]
pub struct PluginClient<R, W> {
    reader: R,
    writer: W,
    next_id: u64,
    pending: VecDeque<OutboundMessage>,
}

impl<R: BufRead, W: Write> PluginClient<R, W> {
    /// Wraps the plugin's output (`reader`) and input (`writer`) streams.
    pub const fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            next_id: 1,
            pending: VecDeque::new(),
        }
    }

    /// Waits for the `ready` announcement.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Unexpected`] if the first message is anything
    /// other than `ready`.
    pub fn await_ready(&mut self) -> Result<Announcement, ClientError> {
        match self.next_message()? {
            OutboundMessage::Protocol(ProtocolMessage::Ready {
                plugin_id,
                version,
            }) => Ok(Announcement { plugin_id, version }),
            other => Err(unexpected("ready", &other)),
        }
    }

    /// Sends `ping` and returns the timestamp from the `pong`.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails or the reply is not `pong`.
    pub fn ping(&mut self) -> Result<String, ClientError> {
        let message_id = self.allocate_id();
        self.send(&InboundMessage::ping(message_id.clone()))?;
        match self.await_reply(&message_id)? {
            ProtocolMessage::Pong { timestamp, .. } => Ok(timestamp),
            other => Err(unexpected("pong", &other.into())),
        }
    }

    /// Executes a command and returns its result payload.
    ///
    /// In-band failures such as an unknown command are part of the result.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Remote`] when the plugin replies with `error`.
    pub fn execute(&mut self, command: &str, params: Params) -> Result<Value, ClientError> {
        let message_id = self.allocate_id();
        self.send(&InboundMessage::execute(message_id.clone(), command, params))?;
        match self.await_reply(&message_id)? {
            ProtocolMessage::Response { result, .. } => Ok(result),
            other => Err(unexpected("response", &other.into())),
        }
    }

    /// Asks the plugin to stop and waits for the acknowledgement.
    ///
    /// # Errors
    ///
    /// Returns an error if the acknowledgement does not arrive.
    pub fn shutdown(&mut self) -> Result<(), ClientError> {
        let message_id = self.allocate_id();
        self.send(&InboundMessage::shutdown(message_id.clone()))?;
        match self.await_reply(&message_id)? {
            ProtocolMessage::ShutdownAck { .. } => Ok(()),
            other => Err(unexpected("shutdown_ack", &other.into())),
        }
    }

    /// Delivers a host event. Events have no reply.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Event`] when the type is reserved or the
    /// payload sets an envelope key, or an I/O error if it cannot be written.
    pub fn send_event(&mut self, event_type: &str, payload: Params) -> Result<(), ClientError> {
        let event = InboundMessage::event(event_type, payload)?;
        self.send(&event)
    }

    /// Writes a raw line, appending the terminator.
    ///
    /// # Errors
    ///
    /// Returns an error if the line cannot be written.
    pub fn send_raw(&mut self, line: &str) -> Result<(), ClientError> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Returns the next message, preferring buffered ones.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Closed`] at end of stream.
    pub fn next_message(&mut self) -> Result<OutboundMessage, ClientError> {
        if let Some(message) = self.pending.pop_front() {
            return Ok(message);
        }
        self.read_message()
    }

    /// Drains messages that arrived while waiting for replies.
    pub fn take_pending(&mut self) -> Vec<OutboundMessage> {
        self.pending.drain(..).collect()
    }

    /// Returns the wrapped streams.
    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.writer)
    }

    fn allocate_id(&mut self) -> MessageId {
        let id = MessageId::from(format!("req-{}", self.next_id));
        self.next_id += 1;
        id
    }

    fn send(&mut self, message: &InboundMessage) -> Result<(), ClientError> {
        let line =
            serde_json::to_string(message).map_err(|source| ClientError::Encode(Arc::new(source)))?;
        debug!(target: CLIENT_TARGET, kind = message.kind(), "sending request");
        self.send_raw(&line)
    }

    fn read_message(&mut self) -> Result<OutboundMessage, ClientError> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                return Err(ClientError::Closed);
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return serde_json::from_str(trimmed).map_err(|source| ClientError::Decode {
                line: trimmed.to_owned(),
                source: Arc::new(source),
            });
        }
    }

    fn await_reply(&mut self, expected: &MessageId) -> Result<ProtocolMessage, ClientError> {
        loop {
            let message = self.read_message()?;
            if message.message_id() != Some(expected) {
                self.pending.push_back(message);
                continue;
            }
            return match message {
                OutboundMessage::Protocol(ProtocolMessage::Error { error, .. }) => {
                    Err(ClientError::Remote { message: error })
                }
                OutboundMessage::Protocol(reply) => Ok(reply),
                OutboundMessage::Event(event) => Err(ClientError::Unexpected {
                    message: format!("event '{}' carried a reply token", event.event_type()),
                }),
            };
        }
    }
}

fn unexpected(expected: &str, message: &OutboundMessage) -> ClientError {
    let found = match message {
        OutboundMessage::Protocol(protocol) => format!("{protocol:?}"),
        OutboundMessage::Event(event) => format!("event '{}'", event.event_type()),
    };
    ClientError::Unexpected {
        message: format!("expected {expected}, found {found}"),
    }
}
