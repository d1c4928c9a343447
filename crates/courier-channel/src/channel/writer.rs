//! Line-framed writer for outbound messages.

use std::io::Write;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{ChannelError, HostError};
use crate::host::Host;
use crate::protocol::{EventMessage, Params, ProtocolMessage, check_event};

/// Serialises messages as JSONL and flushes after every line.
///
/// Each message is rendered into a buffer first so a line reaches the
/// underlying stream in one write.
#[derive(Debug)]
pub struct MessageWriter<W> {
    writer: W,
}

impl<W: Write> MessageWriter<W> {
    /// Wraps an output stream.
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes one message as a single line and flushes it.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation, writing or flushing fails.
    pub fn write_message<T: Serialize>(&mut self, message: &T) -> Result<(), ChannelError> {
        let mut line = serde_json::to_vec(message).map_err(|source| ChannelError::Serialize {
            source: Arc::new(source),
        })?;
        line.push(b'\n');
        self.writer.write_all(&line).map_err(write_error)?;
        self.writer.flush().map_err(write_error)
    }

    /// Returns the wrapped stream.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn write_error(source: std::io::Error) -> ChannelError {
    ChannelError::Write {
        source: Arc::new(source),
    }
}

impl<W: Write> Host for MessageWriter<W> {
    fn emit_event(&mut self, event_type: &str, payload: Params) -> Result<(), HostError> {
        check_event(event_type, &payload)?;
        self.write_message(&EventMessage::new(event_type, payload))?;
        Ok(())
    }

    fn call_host_api(&mut self, method: &str, params: Params) -> Result<(), HostError> {
        self.write_message(&ProtocolMessage::HostCall {
            method: method.to_owned(),
            params,
        })?;
        Ok(())
    }
}
