//! Process entry point shared by plugin binaries.
//!
//! [`launch`] loads configuration, installs telemetry, restores settings and
//! builds the handler registry before the channel announces itself. Any
//! failure up to that point ends the process with a failure exit code and
//! nothing on standard output, so the host never sees a `ready` from a
//! plugin that cannot serve requests.

use std::ffi::OsString;
use std::io::{BufRead, Write};
use std::process::ExitCode;
use std::rc::Rc;

use courier_config::Config;
use tracing::{error, info};

use crate::channel::{Channel, ChannelExit};
use crate::error::RegistryError;
use crate::protocol::Params;
use crate::registry::Registry;
use crate::session::{PluginIdentity, Session, Settings};
use crate::store::{JsonFileStore, PersistSettings, SettingsStore};
use crate::telemetry;

const RUNTIME_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::runtime");

/// A plugin served over the message channel.
pub trait Plugin {
    /// Identity reported by `ready` and `getInfo`.
    fn identity(&self) -> PluginIdentity;

    /// Settings used for keys the settings file does not provide.
    fn default_settings(&self) -> Params {
        Params::new()
    }

    /// Registers the plugin's commands, events and hooks.
    ///
    /// The store is the one the session was loaded from; handlers may keep
    /// it to persist changes immediately.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryError`] when a handler name is invalid or taken.
    fn register(
        &self,
        registry: &mut Registry,
        store: Rc<dyn SettingsStore>,
    ) -> Result<(), RegistryError>;
}

/// Runs a plugin to completion over the given streams.
///
/// `args` are the process arguments including the binary name. Startup
/// failures are written to `stderr` as a single line.
pub fn launch<P, I, R, W, E>(plugin: &P, args: I, reader: R, writer: W, stderr: &mut E) -> ExitCode
where
    P: Plugin,
    I: IntoIterator<Item = OsString>,
    R: BufRead,
    W: Write,
    E: Write,
{
    let config = match Config::load_from_args(args) {
        Ok(config) => config,
        Err(error) => return startup_failure(stderr, &format!("invalid configuration: {error}")),
    };
    if let Err(error) = telemetry::initialise(&config) {
        return startup_failure(stderr, &error.to_string());
    }

    let store: Rc<dyn SettingsStore> =
        Rc::new(JsonFileStore::new(config.settings_path().to_path_buf()));
    let session = match load_session(plugin, &*store) {
        Ok(session) => session,
        Err(message) => return startup_failure(stderr, &message),
    };

    let mut registry = Registry::with_builtins();
    if let Err(error) = plugin.register(&mut registry, Rc::clone(&store)) {
        return startup_failure(stderr, &format!("failed to register handlers: {error}"));
    }
    registry.on_shutdown(PersistSettings::new(store));

    let mut channel = Channel::new(reader, writer, session, registry);
    match channel.run() {
        Ok(ChannelExit::Shutdown) => {
            info!(target: RUNTIME_TARGET, "plugin stopped after shutdown request");
            ExitCode::SUCCESS
        }
        Ok(ChannelExit::InputClosed) => {
            info!(target: RUNTIME_TARGET, "plugin stopped at end of input");
            ExitCode::SUCCESS
        }
        Err(error) => {
            error!(target: RUNTIME_TARGET, %error, "channel failed");
            writeln!(stderr, "{error}").ok();
            ExitCode::FAILURE
        }
    }
}

/// Builds the initial session from stored settings and plugin defaults.
///
/// # Errors
///
/// Returns a description of the failure when stored settings exist but
/// cannot be used.
pub fn load_session<P: Plugin + ?Sized>(
    plugin: &P,
    store: &dyn SettingsStore,
) -> Result<Session, String> {
    let mut settings = match store.load() {
        Ok(Some(settings)) => settings,
        Ok(None) => {
            info!(target: RUNTIME_TARGET, "no stored settings, using defaults");
            Settings::new()
        }
        Err(error) => return Err(error.to_string()),
    };
    settings.fill_defaults(plugin.default_settings());
    Ok(Session::with_settings(plugin.identity(), settings))
}

fn startup_failure<E: Write>(stderr: &mut E, message: &str) -> ExitCode {
    error!(target: RUNTIME_TARGET, message, "plugin failed to start");
    writeln!(stderr, "{message}").ok();
    ExitCode::FAILURE
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use mockall::mock;
    use rstest::rstest;
    use serde_json::{Value, json};

    use super::*;
    use crate::Context;
    use crate::error::{HandlerError, StoreError};

    mock! {
        Store {}
        impl SettingsStore for Store {
            fn load(&self) -> Result<Option<Settings>, StoreError>;
            fn save(&self, settings: &Settings) -> Result<(), StoreError>;
        }
    }

    struct Greeter;

    fn greet(_params: &Params, context: &mut Context<'_>) -> Result<Value, HandlerError> {
        let name = context.settings().get_str("name").unwrap_or("nobody");
        Ok(json!({ "greeting": format!("hello {name}") }))
    }

    impl Plugin for Greeter {
        fn identity(&self) -> PluginIdentity {
            PluginIdentity::new("com.example.greeter", "0.2.0", "Greeter", "Says hello")
        }

        fn default_settings(&self) -> Params {
            let mut defaults = Params::new();
            defaults.insert(String::from("name"), json!("world"));
            defaults.insert(String::from("punctuation"), json!("!"));
            defaults
        }

        fn register(
            &self,
            registry: &mut Registry,
            _store: Rc<dyn SettingsStore>,
        ) -> Result<(), RegistryError> {
            registry.register_command("greet", greet)
        }
    }

    #[rstest]
    fn stored_settings_take_precedence_over_defaults() {
        let mut store = MockStore::new();
        store.expect_load().once().returning(|| {
            let mut stored = Settings::new();
            stored.insert("name", json!("Ada"));
            Ok(Some(stored))
        });

        let session = load_session(&Greeter, &store).expect("session");
        assert_eq!(session.settings().get_str("name"), Some("Ada"));
        assert_eq!(session.settings().get_str("punctuation"), Some("!"));
    }

    #[rstest]
    fn missing_settings_fall_back_to_defaults() {
        let mut store = MockStore::new();
        store.expect_load().once().returning(|| Ok(None));

        let session = load_session(&Greeter, &store).expect("session");
        assert_eq!(session.settings().get_str("name"), Some("world"));
        assert_eq!(session.identity().id(), "com.example.greeter");
    }

    #[rstest]
    fn unreadable_settings_are_reported() {
        let mut store = MockStore::new();
        store.expect_load().once().returning(|| {
            Err(StoreError::NotAnObject {
                path: camino::Utf8PathBuf::from("config.json"),
            })
        });

        let message = load_session(&Greeter, &store).expect_err("must fail");
        assert!(
            message.contains("must contain a JSON object"),
            "got: {message}"
        );
    }

    #[rstest]
    fn invalid_arguments_fail_before_ready() {
        let mut output = Vec::new();
        let mut stderr = Vec::new();
        let args = ["greeter", "--log-format", "sparkly"].map(OsString::from);

        let code = launch(
            &Greeter,
            args,
            Cursor::new(Vec::new()),
            &mut output,
            &mut stderr,
        );

        assert_eq!(code, ExitCode::FAILURE);
        assert!(output.is_empty());
        assert!(!stderr.is_empty());
    }
}
