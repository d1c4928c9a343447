//! Line-delimited JSON message channel between a host application and a
//! plugin process.
//!
//! A plugin reads requests from standard input and writes replies, events
//! and host calls to standard output, one JSON object per line. This crate
//! provides:
//!
//! - [`protocol`]: the message envelope and its wire encoding.
//! - [`Channel`]: the sequential read-dispatch-reply loop.
//! - [`Registry`]: named command, event and shutdown handlers.
//! - [`Session`] and [`Context`]: the state and capabilities handed to
//!   handlers.
//! - [`store`]: settings persistence across runs.
//! - [`PluginClient`]: the host side of the conversation, used to drive
//!   plugins from tests and tools.
//! - [`telemetry`]: logging to standard error.
//! - [`runtime`]: the shared startup sequence for plugin binaries.
//!
//! ```
//! use std::io::Cursor;
//!
//! use courier_channel::{Channel, Context, HandlerError, Params, PluginIdentity, Registry, Session};
//! use serde_json::{Value, json};
//!
//! fn process(params: &Params, _context: &mut Context<'_>) -> Result<Value, HandlerError> {
//!     Ok(json!({ "success": true, "processed": params.get("data") }))
//! }
//!
//! let mut registry = Registry::with_builtins();
//! registry.register_command("process", process).expect("unique command");
//!
//! let input = Cursor::new(
//!     b"{\"type\":\"execute\",\"messageId\":1,\"command\":\"process\",\"params\":{\"data\":2}}\n".to_vec(),
//! );
//! let mut output = Vec::new();
//! let session = Session::new(PluginIdentity::new("demo", "1.0.0", "Demo", "Example"));
//! Channel::new(input, &mut output, session, registry)
//!     .run()
//!     .expect("channel runs");
//!
//! let text = String::from_utf8(output).expect("utf8");
//! let reply: Value = serde_json::from_str(text.lines().nth(1).expect("reply line")).expect("json");
//! assert_eq!(reply["result"], json!({ "success": true, "processed": 2 }));
//! ```

mod channel;
pub mod client;
mod context;
mod error;
mod host;
pub mod protocol;
mod registry;
pub mod runtime;
mod session;
pub mod store;
pub mod telemetry;

pub use self::channel::{Channel, ChannelExit, ChannelState, Flow, MessageWriter};
pub use self::client::{Announcement, ClientError, PluginClient};
pub use self::context::Context;
pub use self::error::{ChannelError, HandlerError, HostError, RegistryError, StoreError};
pub use self::host::Host;
#[cfg(any(test, feature = "test-support"))]
pub use self::host::RecordingHost;
pub use self::protocol::{
    EventMessage, InboundMessage, MessageId, OutboundMessage, Params, ProtocolMessage,
};
pub use self::registry::{CommandHandler, EventHandler, GET_INFO, Registry, ShutdownHook, get_info};
pub use self::runtime::{Plugin, launch};
pub use self::session::{PluginIdentity, Session, Settings};
pub use self::store::{JsonFileStore, PersistSettings, SettingsStore};

#[cfg(test)]
mod tests;
