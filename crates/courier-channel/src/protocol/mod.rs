//! Wire types for the host-plugin message channel.
//!
//! Every message is one JSON object on one line of UTF-8 text. The host
//! writes [`InboundMessage`] lines to the plugin's stdin; the plugin writes
//! [`OutboundMessage`] lines to stdout. Request-shaped messages carry a
//! [`MessageId`] that the plugin echoes on the matching reply.

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::HostError;

/// Arbitrary key-value payload carried by commands and events.
pub type Params = Map<String, Value>;

/// Inbound liveness check.
pub const PING: &str = "ping";
/// Inbound command invocation.
pub const EXECUTE: &str = "execute";
/// Inbound termination request.
pub const SHUTDOWN: &str = "shutdown";

/// Message types owned by the protocol. Plugins may not register event
/// handlers or emit events under these names.
pub const RESERVED_TYPES: &[&str] = &[
    "ready",
    PING,
    "pong",
    EXECUTE,
    "response",
    "error",
    SHUTDOWN,
    "shutdown_ack",
    "host_call",
];

/// Returns `true` when `kind` names a protocol-level message type.
#[must_use]
pub fn is_reserved_type(kind: &str) -> bool {
    RESERVED_TYPES.contains(&kind)
}

/// Envelope fields an event payload may not carry. Payload fields are
/// inlined next to the `type` tag, so either key would forge the envelope.
pub const ENVELOPE_KEYS: &[&str] = &["type", "messageId"];

/// Returns the first envelope key present in an event payload.
#[must_use]
pub fn envelope_key(payload: &Params) -> Option<&'static str> {
    ENVELOPE_KEYS
        .iter()
        .copied()
        .find(|key| payload.contains_key(*key))
}

/// Opaque correlation token linking a request to its reply.
///
/// Hosts usually send strings; integers are accepted too and echoed back in
/// the same JSON form. Fractional numbers and integers outside the 64-bit
/// range are rejected, since they cannot be written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum MessageId {
    /// Textual identifier.
    Text(String),
    /// Numeric identifier.
    Number(serde_json::Number),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawMessageId {
    Text(String),
    Number(serde_json::Number),
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawMessageId::deserialize(deserializer)? {
            RawMessageId::Text(text) => Ok(Self::Text(text)),
            RawMessageId::Number(number) if number.is_i64() || number.is_u64() => {
                Ok(Self::Number(number))
            }
            RawMessageId::Number(number) => Err(D::Error::custom(format!(
                "messageId {number} is not a 64-bit integer"
            ))),
        }
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<u64> for MessageId {
    fn from(value: u64) -> Self {
        Self::Number(value.into())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => formatter.write_str(text),
            Self::Number(number) => write!(formatter, "{number}"),
        }
    }
}

/// Message sent from the host to the plugin.
///
/// Fields that are not part of the envelope (`type`, `messageId`, `command`,
/// `params`) are kept as the event payload so plugin-defined event types can
/// carry arbitrary data.
///
/// # Example
///
/// ```
/// use courier_channel::protocol::InboundMessage;
///
/// let message = InboundMessage::parse(r#"{"type":"ping","messageId":"abc"}"#)
///     .expect("valid ping");
/// assert_eq!(message.kind(), "ping");
/// assert_eq!(message.message_id().map(ToString::to_string).as_deref(), Some("abc"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message_id: Option<MessageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    params: Option<Params>,
    #[serde(flatten)]
    payload: Params,
}

impl InboundMessage {
    fn envelope(kind: impl Into<String>, message_id: Option<MessageId>) -> Self {
        Self {
            kind: kind.into(),
            message_id,
            command: None,
            params: None,
            payload: Params::new(),
        }
    }

    /// Builds a `ping` request.
    #[must_use]
    pub fn ping(message_id: impl Into<MessageId>) -> Self {
        Self::envelope(PING, Some(message_id.into()))
    }

    /// Builds an `execute` request.
    #[must_use]
    pub fn execute(
        message_id: impl Into<MessageId>,
        command: impl Into<String>,
        params: Params,
    ) -> Self {
        Self {
            command: Some(command.into()),
            params: Some(params),
            ..Self::envelope(EXECUTE, Some(message_id.into()))
        }
    }

    /// Builds a `shutdown` request.
    #[must_use]
    pub fn shutdown(message_id: impl Into<MessageId>) -> Self {
        Self::envelope(SHUTDOWN, Some(message_id.into()))
    }

    /// Builds a fire-and-forget host event.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::ReservedEventType`] when `kind` is a protocol
    /// type, or [`HostError::ReservedPayloadKey`] when the payload carries an
    /// envelope key.
    pub fn event(kind: impl Into<String>, payload: Params) -> Result<Self, HostError> {
        let kind = kind.into();
        check_event(&kind, &payload)?;
        Ok(Self {
            payload,
            ..Self::envelope(kind, None)
        })
    }

    /// Parses one line of input.
    ///
    /// Trailing whitespace, including the newline delimiter, is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ParseFailure`] when the line is not a JSON object matching
    /// the envelope. The failure carries the `messageId` whenever the object
    /// was well-formed enough to expose one.
    pub fn parse(line: &str) -> Result<Self, ParseFailure> {
        let value: Value = serde_json::from_str(line.trim_end()).map_err(|error| ParseFailure {
            message_id: None,
            reason: error.to_string(),
        })?;

        let Value::Object(object) = value else {
            return Err(ParseFailure {
                message_id: None,
                reason: String::from("expected a JSON object"),
            });
        };

        let message_id = object
            .get("messageId")
            .cloned()
            .and_then(|raw| serde_json::from_value::<MessageId>(raw).ok());

        serde_json::from_value(Value::Object(object)).map_err(|error| ParseFailure {
            message_id,
            reason: error.to_string(),
        })
    }

    /// Returns the message type tag.
    #[must_use]
    pub const fn kind(&self) -> &str {
        self.kind.as_str()
    }

    /// Returns the correlation token, when present.
    #[must_use]
    pub const fn message_id(&self) -> Option<&MessageId> {
        self.message_id.as_ref()
    }

    /// Returns the command name carried by an `execute` message.
    #[must_use]
    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    /// Returns the command parameters.
    #[must_use]
    pub const fn params(&self) -> Option<&Params> {
        self.params.as_ref()
    }

    /// Returns the fields outside the envelope.
    #[must_use]
    pub const fn payload(&self) -> &Params {
        &self.payload
    }
}

/// Reason an inbound line could not be turned into an [`InboundMessage`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParseFailure {
    /// Correlation token recovered from the payload, if any.
    pub message_id: Option<MessageId>,
    /// Parser diagnostic.
    pub reason: String,
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.reason)
    }
}

/// Protocol-level message written by the plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ProtocolMessage {
    /// Startup announcement, emitted once before any input is read.
    Ready {
        /// Plugin identifier.
        plugin_id: String,
        /// Plugin version.
        version: String,
    },
    /// Reply to `ping`.
    Pong {
        /// Echoed correlation token.
        message_id: MessageId,
        /// RFC 3339 timestamp taken when the reply was built.
        timestamp: String,
    },
    /// Successful reply to `execute`.
    Response {
        /// Echoed correlation token.
        message_id: MessageId,
        /// Command result payload.
        result: Value,
    },
    /// Failure report.
    Error {
        /// Correlation token of the failed message, when it could be read.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<MessageId>,
        /// Human-readable failure description.
        error: String,
    },
    /// Acknowledgement written immediately before the plugin terminates.
    ShutdownAck {
        /// Echoed correlation token.
        message_id: MessageId,
    },
    /// Fire-and-forget request for the host to perform an action.
    HostCall {
        /// Host API name, for example `show_notification`.
        method: String,
        /// Call arguments.
        params: Params,
    },
}

impl ProtocolMessage {
    /// Builds an `error` message.
    #[must_use]
    pub fn error(message_id: Option<MessageId>, error: impl Into<String>) -> Self {
        Self::Error {
            message_id,
            error: error.into(),
        }
    }
}

/// Checks that an event can be written without colliding with the envelope.
///
/// # Errors
///
/// Returns [`HostError::ReservedEventType`] or
/// [`HostError::ReservedPayloadKey`].
pub fn check_event(event_type: &str, payload: &Params) -> Result<(), HostError> {
    if is_reserved_type(event_type) {
        return Err(HostError::ReservedEventType {
            event_type: event_type.to_owned(),
        });
    }
    match envelope_key(payload) {
        Some(key) => Err(HostError::ReservedPayloadKey {
            event_type: event_type.to_owned(),
            key,
        }),
        None => Ok(()),
    }
}

/// Plugin-defined event, serialised with its payload fields inlined next to
/// the `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(flatten)]
    payload: Params,
}

impl EventMessage {
    /// Creates an event message.
    #[must_use]
    pub fn new(event_type: impl Into<String>, payload: Params) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }

    /// Returns the event type.
    #[must_use]
    pub const fn event_type(&self) -> &str {
        self.event_type.as_str()
    }

    /// Returns the event payload.
    #[must_use]
    pub const fn payload(&self) -> &Params {
        &self.payload
    }
}

/// Any message the plugin writes to stdout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    /// A protocol message.
    Protocol(ProtocolMessage),
    /// A plugin-defined event.
    Event(EventMessage),
}

impl OutboundMessage {
    /// Returns the correlation token carried by the message, if any.
    #[must_use]
    pub const fn message_id(&self) -> Option<&MessageId> {
        match self {
            Self::Protocol(
                ProtocolMessage::Pong { message_id, .. }
                | ProtocolMessage::Response { message_id, .. }
                | ProtocolMessage::ShutdownAck { message_id },
            ) => Some(message_id),
            Self::Protocol(ProtocolMessage::Error { message_id, .. }) => message_id.as_ref(),
            Self::Protocol(ProtocolMessage::Ready { .. } | ProtocolMessage::HostCall { .. })
            | Self::Event(_) => None,
        }
    }
}

impl From<ProtocolMessage> for OutboundMessage {
    fn from(message: ProtocolMessage) -> Self {
        Self::Protocol(message)
    }
}

impl From<EventMessage> for OutboundMessage {
    fn from(message: EventMessage) -> Self {
        Self::Event(message)
    }
}

/// Formats the current UTC time as an RFC 3339 (ISO 8601) timestamp.
///
/// # Errors
///
/// Returns an error if the clock value cannot be formatted.
pub fn timestamp_now() -> Result<String, time::error::Format> {
    OffsetDateTime::now_utc().format(&Rfc3339)
}
