//! Error types for the message channel.
//!
//! Only [`ChannelError`] ends the read loop. Everything a handler can fail
//! with is a [`HandlerError`], which the dispatch boundary turns into an
//! `error` reply tied to the originating `messageId`. I/O errors are wrapped
//! in `Arc` so the enums stay cheap to clone and small on the stack.

use std::io;
use std::sync::Arc;

use camino::Utf8PathBuf;
use thiserror::Error;

/// Transport failures that stop the channel.
#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    /// Reading from the inbound stream failed.
    #[error("failed to read from host: {source}")]
    Read {
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
    /// Writing or flushing an outbound line failed.
    #[error("failed to write to host: {source}")]
    Write {
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
    /// An outbound message could not be serialised.
    #[error("failed to serialise outbound message: {source}")]
    Serialize {
        /// Underlying serialisation error.
        #[source]
        source: Arc<serde_json::Error>,
    },
}

impl ChannelError {
    pub(crate) fn read(source: io::Error) -> Self {
        Self::Read {
            source: Arc::new(source),
        }
    }
}

/// Failures raised by the host capability interface.
#[derive(Debug, Clone, Error)]
pub enum HostError {
    /// The event or call could not be delivered to the host.
    #[error("failed to deliver message to host: {0}")]
    Delivery(#[source] ChannelError),
    /// The event type collides with a protocol message type.
    #[error("event type '{event_type}' is reserved by the protocol")]
    ReservedEventType {
        /// Offending type tag.
        event_type: String,
    },
    /// The event payload carries a field owned by the envelope.
    #[error("event '{event_type}' may not set envelope key '{key}'")]
    ReservedPayloadKey {
        /// Event type being emitted.
        event_type: String,
        /// Offending payload key.
        key: &'static str,
    },
}

impl From<ChannelError> for HostError {
    fn from(error: ChannelError) -> Self {
        Self::Delivery(error)
    }
}

/// Failures reported by command, event and shutdown handlers.
#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    /// The handler rejected its parameters.
    #[error("invalid params: {message}")]
    InvalidParams {
        /// Validation message.
        message: String,
    },
    /// The handler ran but could not complete.
    #[error("{message}")]
    Failed {
        /// Failure description.
        message: String,
    },
    /// A host capability call failed.
    #[error(transparent)]
    Host(#[from] HostError),
    /// The handler panicked.
    #[error("handler panicked: {message}")]
    Panicked {
        /// Panic payload rendered as text.
        message: String,
    },
}

impl HandlerError {
    /// Creates an invalid parameters error.
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams {
            message: message.into(),
        }
    }

    /// Creates a generic handler failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// Errors raised while populating handler registries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A command with the same name is already registered.
    #[error("command '{name}' is already registered")]
    DuplicateCommand {
        /// Command name.
        name: String,
    },
    /// An event handler with the same type is already registered.
    #[error("event handler for '{event_type}' is already registered")]
    DuplicateEvent {
        /// Event type.
        event_type: String,
    },
    /// The event type collides with a protocol message type.
    #[error("event type '{event_type}' is reserved by the protocol")]
    ReservedEventType {
        /// Event type.
        event_type: String,
    },
    /// Command names must not be blank.
    #[error("command name must not be empty")]
    EmptyName,
}

/// Errors raised by settings stores.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The settings file exists but could not be read.
    #[error("failed to read settings '{path}': {source}")]
    Read {
        /// Settings file path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
    /// The settings file could not be written.
    #[error("failed to write settings '{path}': {source}")]
    Write {
        /// Settings file path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
    /// The settings file is not valid JSON.
    #[error("settings '{path}' are not valid JSON: {source}")]
    Parse {
        /// Settings file path.
        path: Utf8PathBuf,
        /// Underlying parse error.
        #[source]
        source: Arc<serde_json::Error>,
    },
    /// The settings could not be encoded as JSON.
    #[error("failed to encode settings for '{path}': {source}")]
    Encode {
        /// Settings file path.
        path: Utf8PathBuf,
        /// Underlying serialisation error.
        #[source]
        source: Arc<serde_json::Error>,
    },
    /// The settings file holds JSON that is not an object.
    #[error("settings '{path}' must contain a JSON object")]
    NotAnObject {
        /// Settings file path.
        path: Utf8PathBuf,
    },
}
