//! Starting point for new out-of-process plugins.
//!
//! The template registers a single `process` command that echoes its `data`
//! parameter, alongside the built-in `getInfo`. Copy the crate, change the
//! identity constants and replace [`process`] with real work.

use std::ffi::OsString;
use std::io::{BufRead, Write};
use std::process::ExitCode;
use std::rc::Rc;

use courier_channel::{
    Context, HandlerError, Params, Plugin, PluginIdentity, Registry, RegistryError, SettingsStore,
};
use serde_json::{Value, json};

/// Plugin identifier reported to the host.
pub const PLUGIN_ID: &str = "com.example.template";
/// Plugin version reported to the host.
pub const PLUGIN_VERSION: &str = "1.0.0";
/// Display name.
pub const PLUGIN_NAME: &str = "Template Plugin";
/// Short description.
pub const PLUGIN_DESCRIPTION: &str = "Skeleton plugin speaking the courier message protocol";

/// The template plugin.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplatePlugin;

impl Plugin for TemplatePlugin {
    fn identity(&self) -> PluginIdentity {
        PluginIdentity::new(PLUGIN_ID, PLUGIN_VERSION, PLUGIN_NAME, PLUGIN_DESCRIPTION)
    }

    fn register(
        &self,
        registry: &mut Registry,
        _store: Rc<dyn SettingsStore>,
    ) -> Result<(), RegistryError> {
        registry.register_command("process", process)
    }
}

/// Echoes the `data` parameter back to the host.
///
/// # Errors
///
/// Never fails; the signature matches the command handler contract.
pub fn process(params: &Params, _context: &mut Context<'_>) -> Result<Value, HandlerError> {
    let data = params.get("data").cloned().unwrap_or(Value::Null);
    Ok(json!({ "success": true, "processed": data }))
}

/// Serves the template plugin until shutdown or end of input.
pub fn run<I, R, W, E>(args: I, reader: R, writer: W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    R: BufRead,
    W: Write,
    E: Write,
{
    courier_channel::launch(&TemplatePlugin, args, reader, writer, stderr)
}

#[cfg(test)]
mod tests {
    use courier_channel::{RecordingHost, Session};
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::object(json!({"n": 1}), json!({"n": 1}))]
    #[case::string(json!("text"), json!("text"))]
    fn process_echoes_data(#[case] data: Value, #[case] expected: Value) {
        let mut session = Session::new(TemplatePlugin.identity());
        let mut host = RecordingHost::new();
        let mut context = Context::new(&mut session, &mut host);
        let mut params = Params::new();
        params.insert(String::from("data"), data);

        let result = process(&params, &mut context).expect("process succeeds");

        assert_eq!(result, json!({ "success": true, "processed": expected }));
        assert!(host.events.is_empty());
    }

    #[rstest]
    fn process_without_data_returns_null() {
        let mut session = Session::new(TemplatePlugin.identity());
        let mut host = RecordingHost::new();
        let mut context = Context::new(&mut session, &mut host);

        let result = process(&Params::new(), &mut context).expect("process succeeds");

        assert_eq!(result, json!({ "success": true, "processed": null }));
    }

    #[rstest]
    fn registers_process_next_to_builtins() {
        let mut registry = Registry::with_builtins();
        let store: Rc<dyn SettingsStore> =
            Rc::new(courier_channel::JsonFileStore::new("unused.json"));
        TemplatePlugin
            .register(&mut registry, store)
            .expect("registration succeeds");

        assert_eq!(registry.command_names(), vec!["getInfo", "process"]);
    }
}
